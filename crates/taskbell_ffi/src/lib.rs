//! Flutter bridge for Taskbell core.

pub mod api;
