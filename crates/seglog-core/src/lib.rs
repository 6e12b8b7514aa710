//! # seglog-core
//!
//! Shared error types for the seglog write-ahead log.
//!
//! This crate is an internal implementation detail of seglog. Users should
//! depend on the main `seglog` crate instead, which re-exports everything
//! needed for the public API.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{Error, Result};
