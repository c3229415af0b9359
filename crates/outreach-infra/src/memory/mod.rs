//! Process-lifetime storage.

pub mod kv;

pub use kv::MemoryKvStore;
