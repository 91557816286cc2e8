pub mod error;
mod opts;
pub mod protocol;
pub mod tokio;

pub use error::{Error, Result};
pub use opts::Opts;
pub use protocol::reply::{MultiBulkReply, PubSubMessage, Reply, ZRangeResult, ZScoreBoundary};
