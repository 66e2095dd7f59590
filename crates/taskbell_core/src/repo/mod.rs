//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define storage contracts used by the persistence service.
//! - Isolate SQLite query details from service/business orchestration.

pub mod kv_repo;
