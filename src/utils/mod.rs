//! File system and terminal helpers
//!
//! - [`atomic`] - atomic replacement of the state file
//! - [`lock`] - the exclusive run lock next to the state file
//! - [`progress`] - download progress bars

pub mod atomic;
pub mod lock;
pub mod progress;

pub use atomic::atomic_write;
pub use lock::RunLock;
