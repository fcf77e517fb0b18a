//! Feed ingestion — fetching each blog's RSS or Atom feed and folding new
//! entries into the store as posts.
//!
//! The pipeline is fetch ([`client`]), parse ([`parse`]), then reconcile
//! against already-stored posts ([`ingest`]). Summaries are sanitized at the
//! parse stage; nothing downstream ever re-inspects feed HTML.

mod client;
mod ingest;
mod parse;

pub mod error;

pub use client::{FeedClient, FetchOutcome};
pub use error::{Error, IngestError, Result};
pub use ingest::{DEDUP_WINDOW_SECS, fetch_all, fetch_posts};
pub use parse::{Candidate, parse_feed};
