mod conn;
mod pool;
mod pubsub;
mod transaction;

pub use pool::Pool;
pub use pubsub::Subscriber;
pub use transaction::{Queued, Transaction};
