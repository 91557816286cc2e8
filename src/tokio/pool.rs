use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::future::try_join_all;
use tokio::net::TcpStream;
use tracing::info;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::command::{cmd, float, int, text, uint};
use crate::protocol::convert;
use crate::protocol::reply::{MultiBulkReply, Reply, ZRangeResult, ZScoreBoundary};

use super::conn::{CallFlags, Conn};
use super::pubsub::Subscriber;
use super::transaction::Transaction;

/// A pool of pipelined Redis connections.
///
/// Every command picks the first connection that is not committed to a
/// blocking, subscribed or transactional conversation; the connection list is
/// rotated by one on each pick to spread load. When every connection is busy
/// the call fails with [`Error::PoolExhausted`].
pub struct Pool {
    conns: Mutex<Vec<Conn>>,
}

impl Pool {
    /// Establish `opts.poolsize` connections concurrently, authenticating and
    /// selecting the configured database on each.
    pub async fn create(opts: Opts) -> Result<Self> {
        opts.validate()?;
        let conns = try_join_all((0..opts.poolsize).map(|_| connect_one(&opts))).await?;
        info!(poolsize = opts.poolsize, "redis pool ready");
        Ok(Self {
            conns: Mutex::new(conns),
        })
    }

    /// Number of connections in the pool.
    pub fn poolsize(&self) -> usize {
        self.engines().len()
    }

    /// How many connections are currently in use.
    pub fn connections_in_use(&self) -> usize {
        self.engines().iter().filter(|c| c.is_busy()).count()
    }

    fn engines(&self) -> MutexGuard<'_, Vec<Conn>> {
        match self.conns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn acquire(&self) -> Result<Conn> {
        let mut conns = self.engines();
        conns.rotate_left(1);
        conns
            .iter()
            .find(|c| !c.is_busy() && !c.is_closed())
            .cloned()
            .ok_or(Error::PoolExhausted)
    }

    async fn run(&self, name: &'static str, args: Vec<Bytes>) -> Result<Reply> {
        self.acquire()?.call(name, args, CallFlags::default()).await
    }

    async fn run_blocking(&self, name: &'static str, args: Vec<Bytes>) -> Result<Reply> {
        self.acquire()?
            .call(
                name,
                args,
                CallFlags {
                    blocking: true,
                    ..CallFlags::default()
                },
            )
            .await
    }

    // Transactions

    /// Start a transaction: send WATCH for every given key, then MULTI. The
    /// connection is dedicated to the returned [`Transaction`] until `exec`
    /// or `discard`.
    pub async fn multi(&self, watch_keys: &[&str]) -> Result<Transaction> {
        let conn = self.acquire()?;
        let keys = watch_keys.iter().map(|k| text(k)).collect();
        let txn_id = conn.enter_multi(keys).await?;
        Ok(Transaction::new(conn, txn_id))
    }

    // Pub/Sub

    /// Listen for messages published to the given channels. The connection is
    /// dedicated to the returned [`Subscriber`] for good.
    pub async fn subscribe(&self, channels: &[&str]) -> Result<Subscriber> {
        let conn = self.acquire()?;
        let encoded: Vec<Bytes> = channels.iter().map(|c| text(c)).collect();
        let (_ack, receiver) = conn.subscribe(&encoded).await?;
        let receiver = receiver.ok_or_else(|| {
            Error::Protocol("subscription queue already taken".to_owned())
        })?;
        Ok(Subscriber::new(conn, receiver))
    }

    /// Post a message to a channel. Returns the number of clients that
    /// received it.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<i64> {
        let reply = self
            .run("publish", vec![cmd("PUBLISH"), text(channel), text(message)])
            .await?;
        convert::int("publish", reply)
    }

    // Strings

    /// Set the string value of a key.
    pub async fn set(&self, key: &str, value: &str) -> Result<String> {
        let reply = self.run("set", vec![cmd("SET"), text(key), text(value)]).await?;
        convert::status("set", reply)
    }

    /// Get the value of a key.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self.run("get", vec![cmd("GET"), text(key)]).await?;
        convert::opt_string("get", reply)
    }

    /// Returns the values of all specified keys.
    pub async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut args = vec![cmd("MGET")];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("mget", args).await?;
        convert::opt_string_list("mget", reply).await
    }

    /// Set the string value of a key and return its old value.
    pub async fn getset(&self, key: &str, value: &str) -> Result<Option<String>> {
        let reply = self
            .run("getset", vec![cmd("GETSET"), text(key), text(value)])
            .await?;
        convert::opt_string("getset", reply)
    }

    /// Returns the length of the string value stored at key.
    pub async fn strlen(&self, key: &str) -> Result<i64> {
        let reply = self.run("strlen", vec![cmd("STRLEN"), text(key)]).await?;
        convert::int("strlen", reply)
    }

    /// Append a value to a key.
    pub async fn append(&self, key: &str, value: &str) -> Result<i64> {
        let reply = self
            .run("append", vec![cmd("APPEND"), text(key), text(value)])
            .await?;
        convert::int("append", reply)
    }

    /// Increment the integer value of a key by one.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let reply = self.run("incr", vec![cmd("INCR"), text(key)]).await?;
        convert::int("incr", reply)
    }

    /// Increment the integer value of a key by the given amount.
    pub async fn incrby(&self, key: &str, increment: i64) -> Result<i64> {
        let reply = self
            .run("incrby", vec![cmd("INCRBY"), text(key), int(increment)])
            .await?;
        convert::int("incrby", reply)
    }

    /// Decrement the integer value of a key by one.
    pub async fn decr(&self, key: &str) -> Result<i64> {
        let reply = self.run("decr", vec![cmd("DECR"), text(key)]).await?;
        convert::int("decr", reply)
    }

    /// Decrement the integer value of a key by the given number.
    pub async fn decrby(&self, key: &str, decrement: i64) -> Result<i64> {
        let reply = self
            .run("decrby", vec![cmd("DECRBY"), text(key), int(decrement)])
            .await?;
        convert::int("decrby", reply)
    }

    // Bitmaps

    /// Sets or clears the bit at offset in the string value stored at key.
    /// Returns the previous bit value.
    pub async fn setbit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
        let reply = self
            .run(
                "setbit",
                vec![cmd("SETBIT"), text(key), uint(offset), int(i64::from(value))],
            )
            .await?;
        convert::bool("setbit", reply)
    }

    /// Returns the bit value at offset in the string value stored at key.
    pub async fn getbit(&self, key: &str, offset: u64) -> Result<bool> {
        let reply = self
            .run("getbit", vec![cmd("GETBIT"), text(key), uint(offset)])
            .await?;
        convert::bool("getbit", reply)
    }

    /// Count the number of set bits in a string.
    pub async fn bitcount(&self, key: &str) -> Result<i64> {
        self.bitcount_range(key, 0, -1).await
    }

    /// Count the number of set bits in a byte range of a string.
    pub async fn bitcount_range(&self, key: &str, start: i64, end: i64) -> Result<i64> {
        let reply = self
            .run(
                "bitcount",
                vec![cmd("BITCOUNT"), text(key), int(start), int(end)],
            )
            .await?;
        convert::int("bitcount", reply)
    }

    /// Perform a bitwise AND operation between multiple keys.
    pub async fn bitop_and(&self, destkey: &str, srckeys: &[&str]) -> Result<i64> {
        self.bitop("AND", destkey, srckeys).await
    }

    /// Perform a bitwise OR operation between multiple keys.
    pub async fn bitop_or(&self, destkey: &str, srckeys: &[&str]) -> Result<i64> {
        self.bitop("OR", destkey, srckeys).await
    }

    /// Perform a bitwise XOR operation between multiple keys.
    pub async fn bitop_xor(&self, destkey: &str, srckeys: &[&str]) -> Result<i64> {
        self.bitop("XOR", destkey, srckeys).await
    }

    async fn bitop(&self, op: &'static str, destkey: &str, srckeys: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("BITOP"), cmd(op), text(destkey)];
        args.extend(srckeys.iter().map(|k| text(k)));
        let reply = self.run("bitop", args).await?;
        convert::int("bitop", reply)
    }

    /// Perform a bitwise NOT operation on a key.
    pub async fn bitop_not(&self, destkey: &str, key: &str) -> Result<i64> {
        let reply = self
            .run(
                "bitop",
                vec![cmd("BITOP"), cmd("NOT"), text(destkey), text(key)],
            )
            .await?;
        convert::int("bitop", reply)
    }

    // Keys

    /// Determine if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let reply = self.run("exists", vec![cmd("EXISTS"), text(key)]).await?;
        convert::bool("exists", reply)
    }

    /// Delete one or more keys.
    pub async fn delete(&self, keys: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("DEL")];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("del", args).await?;
        convert::int("del", reply)
    }

    /// Move a key to another database.
    pub async fn move_key(&self, key: &str, database: u32) -> Result<i64> {
        let reply = self
            .run(
                "move",
                vec![cmd("MOVE"), text(key), uint(u64::from(database))],
            )
            .await?;
        convert::int("move", reply)
    }

    /// Rename a key.
    pub async fn rename(&self, key: &str, newkey: &str) -> Result<String> {
        let reply = self
            .run("rename", vec![cmd("RENAME"), text(key), text(newkey)])
            .await?;
        convert::status("rename", reply)
    }

    /// Rename a key, only if the new key does not exist.
    pub async fn renamenx(&self, key: &str, newkey: &str) -> Result<i64> {
        let reply = self
            .run("renamenx", vec![cmd("RENAMENX"), text(key), text(newkey)])
            .await?;
        convert::int("renamenx", reply)
    }

    /// Find all keys matching the given pattern. Returns the streaming
    /// multi bulk handle; iterate it or collect it.
    pub async fn keys(&self, pattern: &str) -> Result<MultiBulkReply> {
        let reply = self.run("keys", vec![cmd("KEYS"), text(pattern)]).await?;
        convert::multibulk("keys", reply)
    }

    /// Return a random key from the keyspace.
    pub async fn randomkey(&self) -> Result<Option<String>> {
        let reply = self.run("randomkey", vec![cmd("RANDOMKEY")]).await?;
        convert::opt_string("randomkey", reply)
    }

    /// Set a key's time to live in seconds.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<i64> {
        let reply = self
            .run("expire", vec![cmd("EXPIRE"), text(key), int(seconds)])
            .await?;
        convert::int("expire", reply)
    }

    /// Set a key's time to live in milliseconds.
    pub async fn pexpire(&self, key: &str, milliseconds: i64) -> Result<i64> {
        let reply = self
            .run("pexpire", vec![cmd("PEXPIRE"), text(key), int(milliseconds)])
            .await?;
        convert::int("pexpire", reply)
    }

    /// Set the expiration for a key as a UNIX timestamp.
    pub async fn expireat(&self, key: &str, timestamp: i64) -> Result<i64> {
        let reply = self
            .run("expireat", vec![cmd("EXPIREAT"), text(key), int(timestamp)])
            .await?;
        convert::int("expireat", reply)
    }

    /// Set the expiration for a key as a UNIX timestamp in milliseconds.
    pub async fn pexpireat(&self, key: &str, milliseconds_timestamp: i64) -> Result<i64> {
        let reply = self
            .run(
                "pexpireat",
                vec![cmd("PEXPIREAT"), text(key), int(milliseconds_timestamp)],
            )
            .await?;
        convert::int("pexpireat", reply)
    }

    /// Remove the expiration from a key.
    pub async fn persist(&self, key: &str) -> Result<i64> {
        let reply = self.run("persist", vec![cmd("PERSIST"), text(key)]).await?;
        convert::int("persist", reply)
    }

    /// Get the time to live for a key.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let reply = self.run("ttl", vec![cmd("TTL"), text(key)]).await?;
        convert::int("ttl", reply)
    }

    /// Get the time to live for a key in milliseconds.
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        let reply = self.run("pttl", vec![cmd("PTTL"), text(key)]).await?;
        convert::int("pttl", reply)
    }

    /// Determine the type stored at key.
    pub async fn key_type(&self, key: &str) -> Result<String> {
        let reply = self.run("type", vec![cmd("TYPE"), text(key)]).await?;
        convert::status("type", reply)
    }

    /// Return a serialized version of the value stored at key.
    pub async fn dump(&self, _key: &str) -> Result<Bytes> {
        Err(Error::NotSupported("dump"))
    }

    /// Inspect the internals of Redis objects.
    pub async fn object(&self, _subcommand: &str, _args: &[&str]) -> Result<Reply> {
        Err(Error::NotSupported("object"))
    }

    // Sets

    /// Add one or more members to a set.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("SADD"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        let reply = self.run("sadd", args).await?;
        convert::int("sadd", reply)
    }

    /// Remove one or more members from a set.
    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("SREM"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        let reply = self.run("srem", args).await?;
        convert::int("srem", reply)
    }

    /// Removes and returns a random element from the set stored at key.
    pub async fn spop(&self, key: &str) -> Result<Option<String>> {
        let reply = self.run("spop", vec![cmd("SPOP"), text(key)]).await?;
        convert::opt_string("spop", reply)
    }

    /// Get one or multiple random members from a set. Returns a list, even
    /// when count is 1.
    pub async fn srandmember(&self, key: &str, count: i64) -> Result<Vec<String>> {
        let reply = self
            .run("srandmember", vec![cmd("SRANDMEMBER"), text(key), int(count)])
            .await?;
        convert::string_list("srandmember", reply).await
    }

    /// Determine if a given value is a member of a set.
    pub async fn sismember(&self, key: &str, value: &str) -> Result<bool> {
        let reply = self
            .run("sismember", vec![cmd("SISMEMBER"), text(key), text(value)])
            .await?;
        convert::bool("sismember", reply)
    }

    /// Get the number of members in a set.
    pub async fn scard(&self, key: &str) -> Result<i64> {
        let reply = self.run("scard", vec![cmd("SCARD"), text(key)]).await?;
        convert::int("scard", reply)
    }

    /// Get all the members in a set.
    pub async fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        let reply = self.run("smembers", vec![cmd("SMEMBERS"), text(key)]).await?;
        convert::string_set("smembers", reply).await
    }

    /// Intersect multiple sets.
    pub async fn sinter(&self, keys: &[&str]) -> Result<HashSet<String>> {
        let mut args = vec![cmd("SINTER")];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sinter", args).await?;
        convert::string_set("sinter", reply).await
    }

    /// Intersect multiple sets and store the resulting set in a key.
    pub async fn sinterstore(&self, destination: &str, keys: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("SINTERSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sinterstore", args).await?;
        convert::int("sinterstore", reply)
    }

    /// Subtract multiple sets.
    pub async fn sdiff(&self, keys: &[&str]) -> Result<HashSet<String>> {
        let mut args = vec![cmd("SDIFF")];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sdiff", args).await?;
        convert::string_set("sdiff", reply).await
    }

    /// Subtract multiple sets and store the resulting set in a key.
    pub async fn sdiffstore(&self, destination: &str, keys: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("SDIFFSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sdiffstore", args).await?;
        convert::int("sdiffstore", reply)
    }

    /// Add multiple sets.
    pub async fn sunion(&self, keys: &[&str]) -> Result<HashSet<String>> {
        let mut args = vec![cmd("SUNION")];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sunion", args).await?;
        convert::string_set("sunion", reply).await
    }

    /// Add multiple sets and store the resulting set in a key.
    pub async fn sunionstore(&self, destination: &str, keys: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("SUNIONSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        let reply = self.run("sunionstore", args).await?;
        convert::int("sunionstore", reply)
    }

    /// Move a member from one set to another.
    pub async fn smove(&self, source: &str, destination: &str, value: &str) -> Result<i64> {
        let reply = self
            .run(
                "smove",
                vec![cmd("SMOVE"), text(source), text(destination), text(value)],
            )
            .await?;
        convert::int("smove", reply)
    }

    // Lists

    /// Prepend one or multiple values to a list.
    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("LPUSH"), text(key)];
        args.extend(values.iter().map(|v| text(v)));
        let reply = self.run("lpush", args).await?;
        convert::int("lpush", reply)
    }

    /// Prepend a value to a list, only if the list exists.
    pub async fn lpushx(&self, key: &str, value: &str) -> Result<i64> {
        let reply = self
            .run("lpushx", vec![cmd("LPUSHX"), text(key), text(value)])
            .await?;
        convert::int("lpushx", reply)
    }

    /// Append one or multiple values to a list.
    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("RPUSH"), text(key)];
        args.extend(values.iter().map(|v| text(v)));
        let reply = self.run("rpush", args).await?;
        convert::int("rpush", reply)
    }

    /// Append a value to a list, only if the list exists.
    pub async fn rpushx(&self, key: &str, value: &str) -> Result<i64> {
        let reply = self
            .run("rpushx", vec![cmd("RPUSHX"), text(key), text(value)])
            .await?;
        convert::int("rpushx", reply)
    }

    /// Returns the length of the list stored at key.
    pub async fn llen(&self, key: &str) -> Result<i64> {
        let reply = self.run("llen", vec![cmd("LLEN"), text(key)]).await?;
        convert::int("llen", reply)
    }

    /// Remove elements from a list.
    pub async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        let reply = self
            .run("lrem", vec![cmd("LREM"), text(key), int(count), text(value)])
            .await?;
        convert::int("lrem", reply)
    }

    /// Get a range of elements from a list.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let reply = self
            .run("lrange", vec![cmd("LRANGE"), text(key), int(start), int(stop)])
            .await?;
        convert::string_list("lrange", reply).await
    }

    /// Trim a list to the specified range.
    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<String> {
        let reply = self
            .run("ltrim", vec![cmd("LTRIM"), text(key), int(start), int(stop)])
            .await?;
        convert::status("ltrim", reply)
    }

    /// Remove and get the first element in a list.
    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let reply = self.run("lpop", vec![cmd("LPOP"), text(key)]).await?;
        convert::opt_string("lpop", reply)
    }

    /// Remove and get the last element in a list.
    pub async fn rpop(&self, key: &str) -> Result<Option<String>> {
        let reply = self.run("rpop", vec![cmd("RPOP"), text(key)]).await?;
        convert::opt_string("rpop", reply)
    }

    /// Remove the last element in a list, append it to another list and
    /// return it.
    pub async fn rpoplpush(&self, source: &str, destination: &str) -> Result<Option<String>> {
        let reply = self
            .run(
                "rpoplpush",
                vec![cmd("RPOPLPUSH"), text(source), text(destination)],
            )
            .await?;
        convert::opt_string("rpoplpush", reply)
    }

    /// Get an element from a list by its index.
    pub async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        let reply = self
            .run("lindex", vec![cmd("LINDEX"), text(key), int(index)])
            .await?;
        convert::opt_string("lindex", reply)
    }

    /// Remove and get the first element in a list, or block until one is
    /// available. Resolves to `[list_name, value]`, or `None` on timeout.
    pub async fn blpop(&self, keys: &[&str], timeout: i64) -> Result<Option<Vec<String>>> {
        self.blocking_pop("blpop", keys, timeout).await
    }

    /// Remove and get the last element in a list, or block until one is
    /// available. Resolves to `[list_name, value]`, or `None` on timeout.
    pub async fn brpop(&self, keys: &[&str], timeout: i64) -> Result<Option<Vec<String>>> {
        self.blocking_pop("brpop", keys, timeout).await
    }

    async fn blocking_pop(
        &self,
        name: &'static str,
        keys: &[&str],
        timeout: i64,
    ) -> Result<Option<Vec<String>>> {
        let mut args = vec![cmd(name)];
        args.extend(keys.iter().map(|k| text(k)));
        args.push(int(timeout));
        let reply = self.run_blocking(name, args).await?;
        convert::blocking_pop(name, reply).await
    }

    /// Pop a value from a list, push it to another list and return it, or
    /// block until one is available.
    pub async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: i64,
    ) -> Result<Option<String>> {
        let reply = self
            .run_blocking(
                "brpoplpush",
                vec![
                    cmd("BRPOPLPUSH"),
                    text(source),
                    text(destination),
                    int(timeout),
                ],
            )
            .await?;
        convert::opt_string("brpoplpush", reply)
    }

    /// Set the value of an element in a list by its index.
    pub async fn lset(&self, key: &str, index: i64, value: &str) -> Result<String> {
        let reply = self
            .run("lset", vec![cmd("LSET"), text(key), int(index), text(value)])
            .await?;
        convert::status("lset", reply)
    }

    /// Insert an element before or after another element in a list.
    pub async fn linsert(
        &self,
        key: &str,
        pivot: &str,
        value: &str,
        before: bool,
    ) -> Result<i64> {
        let position = if before { cmd("BEFORE") } else { cmd("AFTER") };
        let reply = self
            .run(
                "linsert",
                vec![cmd("LINSERT"), text(key), position, text(pivot), text(value)],
            )
            .await?;
        convert::int("linsert", reply)
    }

    // Sorted sets

    /// Add one or more members to a sorted set, or update their scores.
    pub async fn zadd(&self, key: &str, values: &[(&str, f64)]) -> Result<i64> {
        let mut args = vec![cmd("ZADD"), text(key)];
        for (member, score) in values {
            args.push(float(*score));
            args.push(text(member));
        }
        let reply = self.run("zadd", args).await?;
        convert::int("zadd", reply)
    }

    /// Return a range of members in a sorted set, by index, with their
    /// scores.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<ZRangeResult> {
        let reply = self
            .run(
                "zrange",
                vec![
                    cmd("ZRANGE"),
                    text(key),
                    int(start),
                    int(stop),
                    cmd("WITHSCORES"),
                ],
            )
            .await?;
        convert::zrange("zrange", reply)
    }

    /// Return a range of members in a sorted set, by score, with their
    /// scores.
    pub async fn zrangebyscore(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<ZRangeResult> {
        let reply = self
            .run(
                "zrangebyscore",
                vec![
                    cmd("ZRANGEBYSCORE"),
                    text(key),
                    min.encode(),
                    max.encode(),
                    cmd("WITHSCORES"),
                ],
            )
            .await?;
        convert::zrange("zrangebyscore", reply)
    }

    /// Return a range of members in a sorted set, by score, with scores
    /// ordered from high to low.
    pub async fn zrevrangebyscore(
        &self,
        key: &str,
        max: ZScoreBoundary,
        min: ZScoreBoundary,
    ) -> Result<ZRangeResult> {
        let reply = self
            .run(
                "zrevrangebyscore",
                vec![
                    cmd("ZREVRANGEBYSCORE"),
                    text(key),
                    max.encode(),
                    min.encode(),
                    cmd("WITHSCORES"),
                ],
            )
            .await?;
        convert::zrange("zrevrangebyscore", reply)
    }

    /// Remove all members in a sorted set within the given scores.
    pub async fn zremrangebyscore(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<i64> {
        let reply = self
            .run(
                "zremrangebyscore",
                vec![cmd("ZREMRANGEBYSCORE"), text(key), min.encode(), max.encode()],
            )
            .await?;
        convert::int("zremrangebyscore", reply)
    }

    /// Remove all members in a sorted set within the given indexes.
    pub async fn zremrangebyrank(&self, key: &str, min: i64, max: i64) -> Result<i64> {
        let reply = self
            .run(
                "zremrangebyrank",
                vec![cmd("ZREMRANGEBYRANK"), text(key), int(min), int(max)],
            )
            .await?;
        convert::int("zremrangebyrank", reply)
    }

    /// Count the members in a sorted set with scores within the given
    /// boundaries.
    pub async fn zcount(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<i64> {
        let reply = self
            .run(
                "zcount",
                vec![cmd("ZCOUNT"), text(key), min.encode(), max.encode()],
            )
            .await?;
        convert::int("zcount", reply)
    }

    /// Get the score associated with the given member in a sorted set.
    pub async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let reply = self
            .run("zscore", vec![cmd("ZSCORE"), text(key), text(member)])
            .await?;
        convert::opt_float("zscore", reply)
    }

    /// Get the number of members in a sorted set.
    pub async fn zcard(&self, key: &str) -> Result<i64> {
        let reply = self.run("zcard", vec![cmd("ZCARD"), text(key)]).await?;
        convert::int("zcard", reply)
    }

    /// Determine the index of a member in a sorted set.
    pub async fn zrank(&self, key: &str, member: &str) -> Result<Option<i64>> {
        let reply = self
            .run("zrank", vec![cmd("ZRANK"), text(key), text(member)])
            .await?;
        convert::opt_int("zrank", reply)
    }

    /// Determine the index of a member in a sorted set, with scores ordered
    /// from high to low.
    pub async fn zrevrank(&self, key: &str, member: &str) -> Result<Option<i64>> {
        let reply = self
            .run("zrevrank", vec![cmd("ZREVRANK"), text(key), text(member)])
            .await?;
        convert::opt_int("zrevrank", reply)
    }

    /// Increment the score of a member in a sorted set.
    pub async fn zincrby(&self, key: &str, increment: f64, member: &str) -> Result<f64> {
        let reply = self
            .run(
                "zincrby",
                vec![cmd("ZINCRBY"), text(key), float(increment), text(member)],
            )
            .await?;
        convert::float("zincrby", reply)
    }

    /// Remove one or more members from a sorted set.
    pub async fn zrem(&self, key: &str, members: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("ZREM"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        let reply = self.run("zrem", args).await?;
        convert::int("zrem", reply)
    }

    // Hashes

    /// Set the string value of a hash field.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<i64> {
        let reply = self
            .run("hset", vec![cmd("HSET"), text(key), text(field), text(value)])
            .await?;
        convert::int("hset", reply)
    }

    /// Set multiple hash fields to multiple values.
    pub async fn hmset(&self, key: &str, values: &[(&str, &str)]) -> Result<String> {
        let mut args = vec![cmd("HMSET"), text(key)];
        for (field, value) in values {
            args.push(text(field));
            args.push(text(value));
        }
        let reply = self.run("hmset", args).await?;
        convert::status("hmset", reply)
    }

    /// Set the value of a hash field, only if the field does not exist.
    pub async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<i64> {
        let reply = self
            .run(
                "hsetnx",
                vec![cmd("HSETNX"), text(key), text(field), text(value)],
            )
            .await?;
        convert::int("hsetnx", reply)
    }

    /// Delete one or more hash fields.
    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<i64> {
        let mut args = vec![cmd("HDEL"), text(key)];
        args.extend(fields.iter().map(|f| text(f)));
        let reply = self.run("hdel", args).await?;
        convert::int("hdel", reply)
    }

    /// Get the value of a hash field.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let reply = self
            .run("hget", vec![cmd("HGET"), text(key), text(field)])
            .await?;
        convert::opt_string("hget", reply)
    }

    /// Returns whether field is an existing field in the hash stored at key.
    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let reply = self
            .run("hexists", vec![cmd("HEXISTS"), text(key), text(field)])
            .await?;
        convert::bool("hexists", reply)
    }

    /// Get all the field names in a hash.
    pub async fn hkeys(&self, key: &str) -> Result<HashSet<String>> {
        let reply = self.run("hkeys", vec![cmd("HKEYS"), text(key)]).await?;
        convert::string_set("hkeys", reply).await
    }

    /// Get all the values in a hash.
    pub async fn hvals(&self, key: &str) -> Result<Vec<String>> {
        let reply = self.run("hvals", vec![cmd("HVALS"), text(key)]).await?;
        convert::string_list("hvals", reply).await
    }

    /// Returns the number of fields contained in the hash stored at key.
    pub async fn hlen(&self, key: &str) -> Result<i64> {
        let reply = self.run("hlen", vec![cmd("HLEN"), text(key)]).await?;
        convert::int("hlen", reply)
    }

    /// Get all fields and values of a hash.
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let reply = self.run("hgetall", vec![cmd("HGETALL"), text(key)]).await?;
        convert::string_map("hgetall", reply).await
    }

    /// Get the values of all the given hash fields.
    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let mut args = vec![cmd("HMGET"), text(key)];
        args.extend(fields.iter().map(|f| text(f)));
        let reply = self.run("hmget", args).await?;
        convert::opt_string_list("hmget", reply).await
    }

    /// Increment the integer value of a hash field by the given number.
    pub async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64> {
        let reply = self
            .run(
                "hincrby",
                vec![cmd("HINCRBY"), text(key), text(field), int(increment)],
            )
            .await?;
        convert::int("hincrby", reply)
    }

    /// Increment the float value of a hash field by the given amount.
    pub async fn hincrbyfloat(&self, key: &str, field: &str, increment: f64) -> Result<f64> {
        let reply = self
            .run(
                "hincrbyfloat",
                vec![cmd("HINCRBYFLOAT"), text(key), text(field), float(increment)],
            )
            .await?;
        convert::float("hincrbyfloat", reply)
    }

    // Server

    /// Ping the server. Returns PONG.
    pub async fn ping(&self) -> Result<String> {
        let reply = self.run("ping", vec![cmd("PING")]).await?;
        convert::status("ping", reply)
    }

    /// Echo the given string.
    pub async fn echo(&self, message: &str) -> Result<String> {
        let reply = self.run("echo", vec![cmd("ECHO"), text(message)]).await?;
        convert::string("echo", reply)
    }

    /// Synchronously save the dataset to disk.
    pub async fn save(&self) -> Result<String> {
        let reply = self.run("save", vec![cmd("SAVE")]).await?;
        convert::status("save", reply)
    }

    /// Asynchronously save the dataset to disk.
    pub async fn bgsave(&self) -> Result<String> {
        let reply = self.run("bgsave", vec![cmd("BGSAVE")]).await?;
        convert::status("bgsave", reply)
    }

    /// Get the UNIX timestamp of the last successful save to disk.
    pub async fn lastsave(&self) -> Result<i64> {
        let reply = self.run("lastsave", vec![cmd("LASTSAVE")]).await?;
        convert::int("lastsave", reply)
    }

    /// Return the number of keys in the currently selected database.
    pub async fn dbsize(&self) -> Result<i64> {
        let reply = self.run("dbsize", vec![cmd("DBSIZE")]).await?;
        convert::int("dbsize", reply)
    }

    /// Remove all keys from all databases.
    pub async fn flushall(&self) -> Result<String> {
        let reply = self.run("flushall", vec![cmd("FLUSHALL")]).await?;
        convert::status("flushall", reply)
    }

    /// Delete all the keys of the currently selected database.
    pub async fn flushdb(&self) -> Result<String> {
        let reply = self.run("flushdb", vec![cmd("FLUSHDB")]).await?;
        convert::status("flushdb", reply)
    }

    /// Change the selected database on one pooled connection. Connections
    /// are normally selected at create time via [`Opts::db`]; this only
    /// affects the connection that happens to execute it.
    pub async fn select(&self, db: u32) -> Result<String> {
        self.acquire()?.select(db).await
    }

    /// Authenticate one pooled connection. Connections are normally
    /// authenticated at create time via [`Opts::password`]; this only
    /// affects the connection that happens to execute it.
    pub async fn auth(&self, password: &str) -> Result<String> {
        self.acquire()?.auth(password).await
    }
}

async fn connect_one(opts: &Opts) -> Result<Conn> {
    let stream = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
    stream.set_nodelay(opts.tcp_nodelay)?;
    let conn = Conn::new(stream);
    if let Some(password) = &opts.password {
        conn.auth(password).await?;
    }
    if opts.db != 0 {
        conn.select(opts.db).await?;
    }
    Ok(conn)
}
