//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate persistence, validation and reminders into store operations.
//! - Keep UI/FFI layers decoupled from storage and platform details.

pub mod persistence;
pub mod reminder_scheduler;
pub mod task_store;
pub mod validator;
