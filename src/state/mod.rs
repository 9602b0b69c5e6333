pub mod instance_lock;
pub mod marker;

pub use instance_lock::InstanceLock;
pub use marker::{FileMarker, InMemoryMarker, MarkerStore, SessionState};
