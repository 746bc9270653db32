//! CLI command implementations.

pub mod common;
pub mod download;
pub mod jobs;
pub mod submit;
pub mod targets;
pub mod watch;
pub mod workspace;
