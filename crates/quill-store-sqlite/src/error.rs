//! Error type for `quill-store-sqlite`.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quill_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("blogger not found: {0}")]
  BloggerNotFound(i64),

  #[error("blog not found: {0}")]
  BlogNotFound(i64),

  #[error("post not found: {0}")]
  PostNotFound(i64),

  /// Another post by the same blogger already counts for this round.
  #[error("round {duedate} is already taken (post {post_id})")]
  RoundTaken {
    post_id: i64,
    duedate: NaiveDateTime,
  },

  /// The new party's round window overlaps an existing party's.
  #[error("party window overlaps party {0}")]
  PartyOverlap(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
