use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An error reply (`-ERR ...`) from the Redis server. Only fails the
    /// command it answers; the connection keeps running.
    #[error("server error: {0}")]
    Server(String),

    /// A malformed RESP frame, or a reply that cannot be matched to a pending
    /// command. Fatal for the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport closed while work was outstanding. Every pending future
    /// on the connection fails with this.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a reply variant the command does not declare.
    #[error("{op}: expected {expected} reply, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
        op: &'static str,
    },

    /// A string value could not be decoded under the configured encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("connection is not inside a transaction")]
    NotInTransaction,

    #[error("a transaction is already active on this connection")]
    AlreadyInTransaction,

    /// EXEC returned nil: a watched key changed and the server rolled the
    /// transaction back.
    #[error("transaction aborted because a watched key changed")]
    TransactionAborted,

    #[error("transaction discarded")]
    TransactionDiscarded,

    #[error("all connections in the pool are in use")]
    PoolExhausted,

    #[error("command not supported: {0}")]
    NotSupported(&'static str),
}
