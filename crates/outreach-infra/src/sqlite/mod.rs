//! SQLite storage: the split reader/writer pool and the durable `KvStore`.

pub mod kv;
pub mod pool;
