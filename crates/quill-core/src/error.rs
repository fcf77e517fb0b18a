//! Error types for `quill-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid party window: {0}")]
  InvalidPartyWindow(String),

  #[error("unknown timezone: {0:?}")]
  UnknownTimezone(String),

  #[error("bad date range: {0}")]
  BadDateRange(String),

  #[error("bad start date {0:?}: {1}")]
  BadStartDate(String, String),

  #[error("yaml error: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for core operations that run against a [`crate::store::ClubStore`]
/// backend: either the backend failed, or the operation itself did.
#[derive(Debug, Error)]
pub enum OpError<E> {
  #[error("store error: {0}")]
  Store(E),

  #[error(transparent)]
  Core(#[from] Error),
}
