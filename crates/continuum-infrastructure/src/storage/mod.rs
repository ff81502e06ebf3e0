//! Crash-safe file primitives shared by the stores.

mod atomic_toml;
mod atomic_write;
mod file_lock;

pub use atomic_toml::AtomicTomlFile;
pub use atomic_write::{create_new_atomic, write_atomic};
pub use file_lock::FileLock;
