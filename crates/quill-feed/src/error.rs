//! Error types for `quill-feed`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("building http client: {0}")]
  Client(reqwest::Error),

  #[error("fetching {url}: {source}")]
  Http {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  /// The body parsed as neither RSS nor Atom.
  #[error("unrecognized feed format at {0}")]
  UnknownFormat(String),

  /// One entry was missing a required field. Never sinks its siblings.
  #[error("malformed entry: {0}")]
  MalformedPost(String),
}

/// An ingestion failure: either the feed side (isolated per blog) or the
/// store side (aborts the pass).
#[derive(Debug, Error)]
pub enum IngestError<E> {
  #[error("store error: {0}")]
  Store(E),

  #[error(transparent)]
  Feed(#[from] Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
