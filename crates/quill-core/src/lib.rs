//! Core types and trait definitions for the Quill blogging-club tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod assign;
pub mod calendar;
pub mod config;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod model;
pub mod roster;
pub mod store;

pub use error::{Error, OpError, Result};
