use std::collections::{HashMap, HashSet};
use std::future::IntoFuture;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::command::{cmd, float, int, text, uint};
use crate::protocol::convert;
use crate::protocol::reply::{MultiBulkReply, Reply, ZRangeResult, ZScoreBoundary};

use super::conn::Conn;

type Convert<T> = fn(&'static str, Reply) -> BoxFuture<'static, Result<T>>;

/// The deferred result of a command issued inside a transaction.
///
/// The server only answers `QUEUED` until EXEC runs; awaiting a `Queued`
/// value resolves once the transaction has been committed, with the
/// command's post-processing applied. On a WATCH abort it resolves to
/// [`Error::TransactionAborted`], on DISCARD to
/// [`Error::TransactionDiscarded`].
#[derive(Debug)]
pub struct Queued<T> {
    op: &'static str,
    rx: oneshot::Receiver<Result<Reply>>,
    convert: Convert<T>,
}

impl<T: Send + 'static> IntoFuture for Queued<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            match self.rx.await {
                Ok(result) => (self.convert)(self.op, result?).await,
                Err(_) => Err(Error::ConnectionLost(
                    "connection driver went away".to_owned(),
                )),
            }
        })
    }
}

/// A MULTI/EXEC transaction bound to one pooled connection.
///
/// Every command queues on the server and returns a [`Queued`] handle;
/// results become available after [`exec`](Self::exec):
///
/// ```rs
/// let txn = pool.multi(&[]).await?;
/// let first = txn.set("key", "value").await?;
/// let second = txn.incr("counter").await?;
/// txn.exec().await?;
/// assert_eq!(first.await?, "OK");
/// ```
pub struct Transaction {
    conn: Conn,
    id: u64,
}

impl Transaction {
    pub(crate) fn new(conn: Conn, id: u64) -> Self {
        Self { conn, id }
    }

    /// Queue one command and confirm the server answered `QUEUED`.
    async fn queue<T: Send + 'static>(
        &self,
        name: &'static str,
        args: Vec<Bytes>,
        convert: Convert<T>,
    ) -> Result<Queued<T>> {
        let (wire_rx, user_rx, entry_id) = self.conn.submit_queued(self.id, name, args).await?;

        let confirmed = match wire_rx.await {
            Ok(Ok(Reply::Status(status))) if status == "QUEUED" => Ok(()),
            Ok(Ok(other)) => Err(Error::Protocol(format!(
                "expected QUEUED reply to {name} inside a transaction, got {}",
                other.kind()
            ))),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::ConnectionLost(
                "connection driver went away".to_owned(),
            )),
        };

        match confirmed {
            Ok(()) => Ok(Queued {
                op: name,
                rx: user_rx,
                convert,
            }),
            Err(err) => {
                self.conn.forget_queued(self.id, entry_id).await;
                Err(err)
            }
        }
    }

    /// Execute all queued commands. Their [`Queued`] handles resolve in
    /// issue order once this returns.
    pub async fn exec(self) -> Result<()> {
        self.conn.exec_multi(self.id).await
    }

    /// Discard all queued commands; their handles fail with
    /// [`Error::TransactionDiscarded`].
    pub async fn discard(self) -> Result<()> {
        self.conn.discard_multi(self.id).await
    }

    /// Forget about all watched keys.
    pub async fn unwatch(&self) -> Result<()> {
        self.conn.unwatch_multi(self.id).await
    }

    // Strings

    /// Set the string value of a key.
    pub async fn set(&self, key: &str, value: &str) -> Result<Queued<String>> {
        self.queue("set", vec![cmd("SET"), text(key), text(value)], status_fut)
            .await
    }

    /// Get the value of a key.
    pub async fn get(&self, key: &str) -> Result<Queued<Option<String>>> {
        self.queue("get", vec![cmd("GET"), text(key)], opt_string_fut).await
    }

    /// Returns the values of all specified keys.
    pub async fn mget(&self, keys: &[&str]) -> Result<Queued<Vec<Option<String>>>> {
        let mut args = vec![cmd("MGET")];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("mget", args, opt_string_list_fut).await
    }

    /// Set the string value of a key and return its old value.
    pub async fn getset(&self, key: &str, value: &str) -> Result<Queued<Option<String>>> {
        self.queue(
            "getset",
            vec![cmd("GETSET"), text(key), text(value)],
            opt_string_fut,
        )
        .await
    }

    /// Returns the length of the string value stored at key.
    pub async fn strlen(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("strlen", vec![cmd("STRLEN"), text(key)], int_fut).await
    }

    /// Append a value to a key.
    pub async fn append(&self, key: &str, value: &str) -> Result<Queued<i64>> {
        self.queue("append", vec![cmd("APPEND"), text(key), text(value)], int_fut)
            .await
    }

    /// Increment the integer value of a key by one.
    pub async fn incr(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("incr", vec![cmd("INCR"), text(key)], int_fut).await
    }

    /// Increment the integer value of a key by the given amount.
    pub async fn incrby(&self, key: &str, increment: i64) -> Result<Queued<i64>> {
        self.queue("incrby", vec![cmd("INCRBY"), text(key), int(increment)], int_fut)
            .await
    }

    /// Decrement the integer value of a key by one.
    pub async fn decr(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("decr", vec![cmd("DECR"), text(key)], int_fut).await
    }

    /// Decrement the integer value of a key by the given number.
    pub async fn decrby(&self, key: &str, decrement: i64) -> Result<Queued<i64>> {
        self.queue("decrby", vec![cmd("DECRBY"), text(key), int(decrement)], int_fut)
            .await
    }

    // Bitmaps

    /// Sets or clears the bit at offset in the string value stored at key.
    pub async fn setbit(&self, key: &str, offset: u64, value: bool) -> Result<Queued<bool>> {
        self.queue(
            "setbit",
            vec![cmd("SETBIT"), text(key), uint(offset), int(i64::from(value))],
            bool_fut,
        )
        .await
    }

    /// Returns the bit value at offset in the string value stored at key.
    pub async fn getbit(&self, key: &str, offset: u64) -> Result<Queued<bool>> {
        self.queue("getbit", vec![cmd("GETBIT"), text(key), uint(offset)], bool_fut)
            .await
    }

    /// Count the number of set bits in a string.
    pub async fn bitcount(&self, key: &str) -> Result<Queued<i64>> {
        self.bitcount_range(key, 0, -1).await
    }

    /// Count the number of set bits in a byte range of a string.
    pub async fn bitcount_range(&self, key: &str, start: i64, end: i64) -> Result<Queued<i64>> {
        self.queue(
            "bitcount",
            vec![cmd("BITCOUNT"), text(key), int(start), int(end)],
            int_fut,
        )
        .await
    }

    /// Perform a bitwise AND operation between multiple keys.
    pub async fn bitop_and(&self, destkey: &str, srckeys: &[&str]) -> Result<Queued<i64>> {
        self.bitop("AND", destkey, srckeys).await
    }

    /// Perform a bitwise OR operation between multiple keys.
    pub async fn bitop_or(&self, destkey: &str, srckeys: &[&str]) -> Result<Queued<i64>> {
        self.bitop("OR", destkey, srckeys).await
    }

    /// Perform a bitwise XOR operation between multiple keys.
    pub async fn bitop_xor(&self, destkey: &str, srckeys: &[&str]) -> Result<Queued<i64>> {
        self.bitop("XOR", destkey, srckeys).await
    }

    async fn bitop(
        &self,
        op: &'static str,
        destkey: &str,
        srckeys: &[&str],
    ) -> Result<Queued<i64>> {
        let mut args = vec![cmd("BITOP"), cmd(op), text(destkey)];
        args.extend(srckeys.iter().map(|k| text(k)));
        self.queue("bitop", args, int_fut).await
    }

    /// Perform a bitwise NOT operation on a key.
    pub async fn bitop_not(&self, destkey: &str, key: &str) -> Result<Queued<i64>> {
        self.queue(
            "bitop",
            vec![cmd("BITOP"), cmd("NOT"), text(destkey), text(key)],
            int_fut,
        )
        .await
    }

    // Keys

    /// Determine if a key exists.
    pub async fn exists(&self, key: &str) -> Result<Queued<bool>> {
        self.queue("exists", vec![cmd("EXISTS"), text(key)], bool_fut).await
    }

    /// Delete one or more keys.
    pub async fn delete(&self, keys: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("DEL")];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("del", args, int_fut).await
    }

    /// Move a key to another database.
    pub async fn move_key(&self, key: &str, database: u32) -> Result<Queued<i64>> {
        self.queue(
            "move",
            vec![cmd("MOVE"), text(key), uint(u64::from(database))],
            int_fut,
        )
        .await
    }

    /// Rename a key.
    pub async fn rename(&self, key: &str, newkey: &str) -> Result<Queued<String>> {
        self.queue("rename", vec![cmd("RENAME"), text(key), text(newkey)], status_fut)
            .await
    }

    /// Rename a key, only if the new key does not exist.
    pub async fn renamenx(&self, key: &str, newkey: &str) -> Result<Queued<i64>> {
        self.queue(
            "renamenx",
            vec![cmd("RENAMENX"), text(key), text(newkey)],
            int_fut,
        )
        .await
    }

    /// Find all keys matching the given pattern.
    pub async fn keys(&self, pattern: &str) -> Result<Queued<MultiBulkReply>> {
        self.queue("keys", vec![cmd("KEYS"), text(pattern)], multibulk_fut).await
    }

    /// Return a random key from the keyspace.
    pub async fn randomkey(&self) -> Result<Queued<Option<String>>> {
        self.queue("randomkey", vec![cmd("RANDOMKEY")], opt_string_fut).await
    }

    /// Set a key's time to live in seconds.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<Queued<i64>> {
        self.queue("expire", vec![cmd("EXPIRE"), text(key), int(seconds)], int_fut)
            .await
    }

    /// Set a key's time to live in milliseconds.
    pub async fn pexpire(&self, key: &str, milliseconds: i64) -> Result<Queued<i64>> {
        self.queue(
            "pexpire",
            vec![cmd("PEXPIRE"), text(key), int(milliseconds)],
            int_fut,
        )
        .await
    }

    /// Set the expiration for a key as a UNIX timestamp.
    pub async fn expireat(&self, key: &str, timestamp: i64) -> Result<Queued<i64>> {
        self.queue(
            "expireat",
            vec![cmd("EXPIREAT"), text(key), int(timestamp)],
            int_fut,
        )
        .await
    }

    /// Set the expiration for a key as a UNIX timestamp in milliseconds.
    pub async fn pexpireat(&self, key: &str, milliseconds_timestamp: i64) -> Result<Queued<i64>> {
        self.queue(
            "pexpireat",
            vec![cmd("PEXPIREAT"), text(key), int(milliseconds_timestamp)],
            int_fut,
        )
        .await
    }

    /// Remove the expiration from a key.
    pub async fn persist(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("persist", vec![cmd("PERSIST"), text(key)], int_fut).await
    }

    /// Get the time to live for a key.
    pub async fn ttl(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("ttl", vec![cmd("TTL"), text(key)], int_fut).await
    }

    /// Get the time to live for a key in milliseconds.
    pub async fn pttl(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("pttl", vec![cmd("PTTL"), text(key)], int_fut).await
    }

    /// Determine the type stored at key.
    pub async fn key_type(&self, key: &str) -> Result<Queued<String>> {
        self.queue("type", vec![cmd("TYPE"), text(key)], status_fut).await
    }

    // Sets

    /// Add one or more members to a set.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("SADD"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        self.queue("sadd", args, int_fut).await
    }

    /// Remove one or more members from a set.
    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("SREM"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        self.queue("srem", args, int_fut).await
    }

    /// Removes and returns a random element from the set stored at key.
    pub async fn spop(&self, key: &str) -> Result<Queued<Option<String>>> {
        self.queue("spop", vec![cmd("SPOP"), text(key)], opt_string_fut).await
    }

    /// Get one or multiple random members from a set.
    pub async fn srandmember(&self, key: &str, count: i64) -> Result<Queued<Vec<String>>> {
        self.queue(
            "srandmember",
            vec![cmd("SRANDMEMBER"), text(key), int(count)],
            string_list_fut,
        )
        .await
    }

    /// Determine if a given value is a member of a set.
    pub async fn sismember(&self, key: &str, value: &str) -> Result<Queued<bool>> {
        self.queue(
            "sismember",
            vec![cmd("SISMEMBER"), text(key), text(value)],
            bool_fut,
        )
        .await
    }

    /// Get the number of members in a set.
    pub async fn scard(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("scard", vec![cmd("SCARD"), text(key)], int_fut).await
    }

    /// Get all the members in a set.
    pub async fn smembers(&self, key: &str) -> Result<Queued<HashSet<String>>> {
        self.queue("smembers", vec![cmd("SMEMBERS"), text(key)], string_set_fut)
            .await
    }

    /// Intersect multiple sets.
    pub async fn sinter(&self, keys: &[&str]) -> Result<Queued<HashSet<String>>> {
        let mut args = vec![cmd("SINTER")];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sinter", args, string_set_fut).await
    }

    /// Intersect multiple sets and store the resulting set in a key.
    pub async fn sinterstore(&self, destination: &str, keys: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("SINTERSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sinterstore", args, int_fut).await
    }

    /// Subtract multiple sets.
    pub async fn sdiff(&self, keys: &[&str]) -> Result<Queued<HashSet<String>>> {
        let mut args = vec![cmd("SDIFF")];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sdiff", args, string_set_fut).await
    }

    /// Subtract multiple sets and store the resulting set in a key.
    pub async fn sdiffstore(&self, destination: &str, keys: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("SDIFFSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sdiffstore", args, int_fut).await
    }

    /// Add multiple sets.
    pub async fn sunion(&self, keys: &[&str]) -> Result<Queued<HashSet<String>>> {
        let mut args = vec![cmd("SUNION")];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sunion", args, string_set_fut).await
    }

    /// Add multiple sets and store the resulting set in a key.
    pub async fn sunionstore(&self, destination: &str, keys: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("SUNIONSTORE"), text(destination)];
        args.extend(keys.iter().map(|k| text(k)));
        self.queue("sunionstore", args, int_fut).await
    }

    /// Move a member from one set to another.
    pub async fn smove(
        &self,
        source: &str,
        destination: &str,
        value: &str,
    ) -> Result<Queued<i64>> {
        self.queue(
            "smove",
            vec![cmd("SMOVE"), text(source), text(destination), text(value)],
            int_fut,
        )
        .await
    }

    // Lists

    /// Prepend one or multiple values to a list.
    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("LPUSH"), text(key)];
        args.extend(values.iter().map(|v| text(v)));
        self.queue("lpush", args, int_fut).await
    }

    /// Prepend a value to a list, only if the list exists.
    pub async fn lpushx(&self, key: &str, value: &str) -> Result<Queued<i64>> {
        self.queue("lpushx", vec![cmd("LPUSHX"), text(key), text(value)], int_fut)
            .await
    }

    /// Append one or multiple values to a list.
    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("RPUSH"), text(key)];
        args.extend(values.iter().map(|v| text(v)));
        self.queue("rpush", args, int_fut).await
    }

    /// Append a value to a list, only if the list exists.
    pub async fn rpushx(&self, key: &str, value: &str) -> Result<Queued<i64>> {
        self.queue("rpushx", vec![cmd("RPUSHX"), text(key), text(value)], int_fut)
            .await
    }

    /// Returns the length of the list stored at key.
    pub async fn llen(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("llen", vec![cmd("LLEN"), text(key)], int_fut).await
    }

    /// Remove elements from a list.
    pub async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<Queued<i64>> {
        self.queue(
            "lrem",
            vec![cmd("LREM"), text(key), int(count), text(value)],
            int_fut,
        )
        .await
    }

    /// Get a range of elements from a list.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Queued<Vec<String>>> {
        self.queue(
            "lrange",
            vec![cmd("LRANGE"), text(key), int(start), int(stop)],
            string_list_fut,
        )
        .await
    }

    /// Trim a list to the specified range.
    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<Queued<String>> {
        self.queue(
            "ltrim",
            vec![cmd("LTRIM"), text(key), int(start), int(stop)],
            status_fut,
        )
        .await
    }

    /// Remove and get the first element in a list.
    pub async fn lpop(&self, key: &str) -> Result<Queued<Option<String>>> {
        self.queue("lpop", vec![cmd("LPOP"), text(key)], opt_string_fut).await
    }

    /// Remove and get the last element in a list.
    pub async fn rpop(&self, key: &str) -> Result<Queued<Option<String>>> {
        self.queue("rpop", vec![cmd("RPOP"), text(key)], opt_string_fut).await
    }

    /// Remove the last element in a list, append it to another list and
    /// return it.
    pub async fn rpoplpush(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Queued<Option<String>>> {
        self.queue(
            "rpoplpush",
            vec![cmd("RPOPLPUSH"), text(source), text(destination)],
            opt_string_fut,
        )
        .await
    }

    /// Get an element from a list by its index.
    pub async fn lindex(&self, key: &str, index: i64) -> Result<Queued<Option<String>>> {
        self.queue(
            "lindex",
            vec![cmd("LINDEX"), text(key), int(index)],
            opt_string_fut,
        )
        .await
    }

    /// Remove and get the first element in a list, or block until one is
    /// available.
    pub async fn blpop(
        &self,
        keys: &[&str],
        timeout: i64,
    ) -> Result<Queued<Option<Vec<String>>>> {
        self.blocking_pop("blpop", keys, timeout).await
    }

    /// Remove and get the last element in a list, or block until one is
    /// available.
    pub async fn brpop(
        &self,
        keys: &[&str],
        timeout: i64,
    ) -> Result<Queued<Option<Vec<String>>>> {
        self.blocking_pop("brpop", keys, timeout).await
    }

    async fn blocking_pop(
        &self,
        name: &'static str,
        keys: &[&str],
        timeout: i64,
    ) -> Result<Queued<Option<Vec<String>>>> {
        let mut args = vec![cmd(name)];
        args.extend(keys.iter().map(|k| text(k)));
        args.push(int(timeout));
        self.queue(name, args, blocking_pop_fut).await
    }

    /// Pop a value from a list, push it to another list and return it, or
    /// block until one is available.
    pub async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: i64,
    ) -> Result<Queued<Option<String>>> {
        self.queue(
            "brpoplpush",
            vec![
                cmd("BRPOPLPUSH"),
                text(source),
                text(destination),
                int(timeout),
            ],
            opt_string_fut,
        )
        .await
    }

    /// Set the value of an element in a list by its index.
    pub async fn lset(&self, key: &str, index: i64, value: &str) -> Result<Queued<String>> {
        self.queue(
            "lset",
            vec![cmd("LSET"), text(key), int(index), text(value)],
            status_fut,
        )
        .await
    }

    /// Insert an element before or after another element in a list.
    pub async fn linsert(
        &self,
        key: &str,
        pivot: &str,
        value: &str,
        before: bool,
    ) -> Result<Queued<i64>> {
        let position = if before { cmd("BEFORE") } else { cmd("AFTER") };
        self.queue(
            "linsert",
            vec![cmd("LINSERT"), text(key), position, text(pivot), text(value)],
            int_fut,
        )
        .await
    }

    // Sorted sets

    /// Add one or more members to a sorted set, or update their scores.
    pub async fn zadd(&self, key: &str, values: &[(&str, f64)]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("ZADD"), text(key)];
        for (member, score) in values {
            args.push(float(*score));
            args.push(text(member));
        }
        self.queue("zadd", args, int_fut).await
    }

    /// Return a range of members in a sorted set, by index, with their
    /// scores.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Queued<ZRangeResult>> {
        self.queue(
            "zrange",
            vec![
                cmd("ZRANGE"),
                text(key),
                int(start),
                int(stop),
                cmd("WITHSCORES"),
            ],
            zrange_fut,
        )
        .await
    }

    /// Return a range of members in a sorted set, by score, with their
    /// scores.
    pub async fn zrangebyscore(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<Queued<ZRangeResult>> {
        self.queue(
            "zrangebyscore",
            vec![
                cmd("ZRANGEBYSCORE"),
                text(key),
                min.encode(),
                max.encode(),
                cmd("WITHSCORES"),
            ],
            zrange_fut,
        )
        .await
    }

    /// Return a range of members in a sorted set, by score, with scores
    /// ordered from high to low.
    pub async fn zrevrangebyscore(
        &self,
        key: &str,
        max: ZScoreBoundary,
        min: ZScoreBoundary,
    ) -> Result<Queued<ZRangeResult>> {
        self.queue(
            "zrevrangebyscore",
            vec![
                cmd("ZREVRANGEBYSCORE"),
                text(key),
                max.encode(),
                min.encode(),
                cmd("WITHSCORES"),
            ],
            zrange_fut,
        )
        .await
    }

    /// Remove all members in a sorted set within the given scores.
    pub async fn zremrangebyscore(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<Queued<i64>> {
        self.queue(
            "zremrangebyscore",
            vec![cmd("ZREMRANGEBYSCORE"), text(key), min.encode(), max.encode()],
            int_fut,
        )
        .await
    }

    /// Remove all members in a sorted set within the given indexes.
    pub async fn zremrangebyrank(&self, key: &str, min: i64, max: i64) -> Result<Queued<i64>> {
        self.queue(
            "zremrangebyrank",
            vec![cmd("ZREMRANGEBYRANK"), text(key), int(min), int(max)],
            int_fut,
        )
        .await
    }

    /// Count the members in a sorted set with scores within the given
    /// boundaries.
    pub async fn zcount(
        &self,
        key: &str,
        min: ZScoreBoundary,
        max: ZScoreBoundary,
    ) -> Result<Queued<i64>> {
        self.queue(
            "zcount",
            vec![cmd("ZCOUNT"), text(key), min.encode(), max.encode()],
            int_fut,
        )
        .await
    }

    /// Get the score associated with the given member in a sorted set.
    pub async fn zscore(&self, key: &str, member: &str) -> Result<Queued<Option<f64>>> {
        self.queue(
            "zscore",
            vec![cmd("ZSCORE"), text(key), text(member)],
            opt_float_fut,
        )
        .await
    }

    /// Get the number of members in a sorted set.
    pub async fn zcard(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("zcard", vec![cmd("ZCARD"), text(key)], int_fut).await
    }

    /// Determine the index of a member in a sorted set.
    pub async fn zrank(&self, key: &str, member: &str) -> Result<Queued<Option<i64>>> {
        self.queue("zrank", vec![cmd("ZRANK"), text(key), text(member)], opt_int_fut)
            .await
    }

    /// Determine the index of a member in a sorted set, with scores ordered
    /// from high to low.
    pub async fn zrevrank(&self, key: &str, member: &str) -> Result<Queued<Option<i64>>> {
        self.queue(
            "zrevrank",
            vec![cmd("ZREVRANK"), text(key), text(member)],
            opt_int_fut,
        )
        .await
    }

    /// Increment the score of a member in a sorted set.
    pub async fn zincrby(
        &self,
        key: &str,
        increment: f64,
        member: &str,
    ) -> Result<Queued<f64>> {
        self.queue(
            "zincrby",
            vec![cmd("ZINCRBY"), text(key), float(increment), text(member)],
            float_fut,
        )
        .await
    }

    /// Remove one or more members from a sorted set.
    pub async fn zrem(&self, key: &str, members: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("ZREM"), text(key)];
        args.extend(members.iter().map(|m| text(m)));
        self.queue("zrem", args, int_fut).await
    }

    // Hashes

    /// Set the string value of a hash field.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<Queued<i64>> {
        self.queue(
            "hset",
            vec![cmd("HSET"), text(key), text(field), text(value)],
            int_fut,
        )
        .await
    }

    /// Set multiple hash fields to multiple values.
    pub async fn hmset(&self, key: &str, values: &[(&str, &str)]) -> Result<Queued<String>> {
        let mut args = vec![cmd("HMSET"), text(key)];
        for (field, value) in values {
            args.push(text(field));
            args.push(text(value));
        }
        self.queue("hmset", args, status_fut).await
    }

    /// Set the value of a hash field, only if the field does not exist.
    pub async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<Queued<i64>> {
        self.queue(
            "hsetnx",
            vec![cmd("HSETNX"), text(key), text(field), text(value)],
            int_fut,
        )
        .await
    }

    /// Delete one or more hash fields.
    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<Queued<i64>> {
        let mut args = vec![cmd("HDEL"), text(key)];
        args.extend(fields.iter().map(|f| text(f)));
        self.queue("hdel", args, int_fut).await
    }

    /// Get the value of a hash field.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Queued<Option<String>>> {
        self.queue("hget", vec![cmd("HGET"), text(key), text(field)], opt_string_fut)
            .await
    }

    /// Returns whether field is an existing field in the hash stored at key.
    pub async fn hexists(&self, key: &str, field: &str) -> Result<Queued<bool>> {
        self.queue(
            "hexists",
            vec![cmd("HEXISTS"), text(key), text(field)],
            bool_fut,
        )
        .await
    }

    /// Get all the field names in a hash.
    pub async fn hkeys(&self, key: &str) -> Result<Queued<HashSet<String>>> {
        self.queue("hkeys", vec![cmd("HKEYS"), text(key)], string_set_fut).await
    }

    /// Get all the values in a hash.
    pub async fn hvals(&self, key: &str) -> Result<Queued<Vec<String>>> {
        self.queue("hvals", vec![cmd("HVALS"), text(key)], string_list_fut).await
    }

    /// Returns the number of fields contained in the hash stored at key.
    pub async fn hlen(&self, key: &str) -> Result<Queued<i64>> {
        self.queue("hlen", vec![cmd("HLEN"), text(key)], int_fut).await
    }

    /// Get all fields and values of a hash.
    pub async fn hgetall(&self, key: &str) -> Result<Queued<HashMap<String, String>>> {
        self.queue("hgetall", vec![cmd("HGETALL"), text(key)], string_map_fut)
            .await
    }

    /// Get the values of all the given hash fields.
    pub async fn hmget(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Queued<Vec<Option<String>>>> {
        let mut args = vec![cmd("HMGET"), text(key)];
        args.extend(fields.iter().map(|f| text(f)));
        self.queue("hmget", args, opt_string_list_fut).await
    }

    /// Increment the integer value of a hash field by the given number.
    pub async fn hincrby(
        &self,
        key: &str,
        field: &str,
        increment: i64,
    ) -> Result<Queued<i64>> {
        self.queue(
            "hincrby",
            vec![cmd("HINCRBY"), text(key), text(field), int(increment)],
            int_fut,
        )
        .await
    }

    /// Increment the float value of a hash field by the given amount.
    pub async fn hincrbyfloat(
        &self,
        key: &str,
        field: &str,
        increment: f64,
    ) -> Result<Queued<f64>> {
        self.queue(
            "hincrbyfloat",
            vec![cmd("HINCRBYFLOAT"), text(key), text(field), float(increment)],
            float_fut,
        )
        .await
    }

    // Pub/Sub and server

    /// Post a message to a channel.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<Queued<i64>> {
        self.queue(
            "publish",
            vec![cmd("PUBLISH"), text(channel), text(message)],
            int_fut,
        )
        .await
    }

    /// Ping the server.
    pub async fn ping(&self) -> Result<Queued<String>> {
        self.queue("ping", vec![cmd("PING")], status_fut).await
    }

    /// Echo the given string.
    pub async fn echo(&self, message: &str) -> Result<Queued<String>> {
        self.queue("echo", vec![cmd("ECHO"), text(message)], string_fut).await
    }

    /// Synchronously save the dataset to disk.
    pub async fn save(&self) -> Result<Queued<String>> {
        self.queue("save", vec![cmd("SAVE")], status_fut).await
    }

    /// Asynchronously save the dataset to disk.
    pub async fn bgsave(&self) -> Result<Queued<String>> {
        self.queue("bgsave", vec![cmd("BGSAVE")], status_fut).await
    }

    /// Get the UNIX timestamp of the last successful save to disk.
    pub async fn lastsave(&self) -> Result<Queued<i64>> {
        self.queue("lastsave", vec![cmd("LASTSAVE")], int_fut).await
    }

    /// Return the number of keys in the currently selected database.
    pub async fn dbsize(&self) -> Result<Queued<i64>> {
        self.queue("dbsize", vec![cmd("DBSIZE")], int_fut).await
    }

    /// Remove all keys from all databases.
    pub async fn flushall(&self) -> Result<Queued<String>> {
        self.queue("flushall", vec![cmd("FLUSHALL")], status_fut).await
    }

    /// Delete all the keys of the currently selected database.
    pub async fn flushdb(&self) -> Result<Queued<String>> {
        self.queue("flushdb", vec![cmd("FLUSHDB")], status_fut).await
    }
}

// Boxed conversion adapters so each queued command can carry its
// post-processor as a plain function pointer until EXEC time.

fn status_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<String>> {
    Box::pin(async move { convert::status(op, reply) })
}

fn string_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<String>> {
    Box::pin(async move { convert::string(op, reply) })
}

fn opt_string_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<Option<String>>> {
    Box::pin(async move { convert::opt_string(op, reply) })
}

fn int_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<i64>> {
    Box::pin(async move { convert::int(op, reply) })
}

fn opt_int_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<Option<i64>>> {
    Box::pin(async move { convert::opt_int(op, reply) })
}

fn bool_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<bool>> {
    Box::pin(async move { convert::bool(op, reply) })
}

fn float_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<f64>> {
    Box::pin(async move { convert::float(op, reply) })
}

fn opt_float_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<Option<f64>>> {
    Box::pin(async move { convert::opt_float(op, reply) })
}

fn multibulk_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<MultiBulkReply>> {
    Box::pin(async move { convert::multibulk(op, reply) })
}

fn string_list_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<Vec<String>>> {
    Box::pin(convert::string_list(op, reply))
}

fn opt_string_list_fut(
    op: &'static str,
    reply: Reply,
) -> BoxFuture<'static, Result<Vec<Option<String>>>> {
    Box::pin(convert::opt_string_list(op, reply))
}

fn string_set_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<HashSet<String>>> {
    Box::pin(convert::string_set(op, reply))
}

fn string_map_fut(
    op: &'static str,
    reply: Reply,
) -> BoxFuture<'static, Result<HashMap<String, String>>> {
    Box::pin(convert::string_map(op, reply))
}

fn blocking_pop_fut(
    op: &'static str,
    reply: Reply,
) -> BoxFuture<'static, Result<Option<Vec<String>>>> {
    Box::pin(convert::blocking_pop(op, reply))
}

fn zrange_fut(op: &'static str, reply: Reply) -> BoxFuture<'static, Result<ZRangeResult>> {
    Box::pin(async move { convert::zrange(op, reply) })
}
