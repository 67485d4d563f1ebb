//! Core modules: the checksummed journal, the evolution aggregate, resume
//! reconciliation and the shared primitives they sit on.

pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod journal;
pub mod output;
pub mod reporter;
pub mod resume;
pub mod signal;
pub mod store;
pub mod time;
