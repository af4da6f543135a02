//! ticketbench-core library.
//!
//! # Conventions
//!
//! - **Errors**: module errors are `thiserror` enums exposing `code()`;
//!   workflows that cross modules use `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).
//! - **Threads**: plain `std::thread` workers talking over `crossbeam-channel`;
//!   dropping a sender or receiver is how work is cancelled.

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod format;
pub mod rate_limit;
pub mod record;
pub mod rpc;
pub mod selection;
pub mod source;
pub mod workbench;

pub use error::{Cancelled, ErrorCode, is_cancelled};
pub use record::Record;
