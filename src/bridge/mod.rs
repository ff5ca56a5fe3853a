pub mod differ;
pub mod reconcile;
pub mod request;
pub mod response;
pub mod session;

pub use differ::{DedupPolicy, DiffOutcome};
pub use reconcile::{reconcile, StreamFrame, StreamTracker};
pub use session::{CachedSession, SessionRegistry};
