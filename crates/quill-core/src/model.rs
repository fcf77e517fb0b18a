//! Domain entities, keyed by integer ids assigned by the store.
//!
//! All persisted timestamps are naive UTC ("dbtime"); conversion to the
//! club timezone happens only in [`crate::calendar`].

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{Duedate, db_duedate, round_diff};

// ─── Blogger ─────────────────────────────────────────────────────────────────

/// A club participant. Owns zero or more blogs; deleting a blogger cascades
/// to their blogs and posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blogger {
  pub id:         i64,
  /// Unique display name.
  pub name:       String,
  /// When tracking begins for this participant.
  pub start_date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewBlogger {
  pub name:       String,
  pub start_date: NaiveDateTime,
}

// ─── Blog ────────────────────────────────────────────────────────────────────

/// One syndicated blog, owned by exactly one blogger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
  pub id:            i64,
  pub blogger_id:    i64,
  pub title:         String,
  /// Human-readable web page.
  pub page_url:      String,
  /// RSS or Atom feed.
  pub feed_url:      String,
  /// Cache tokens from the last successful fetch; sent back as
  /// `If-None-Match` / `If-Modified-Since`.
  pub etag:          Option<String>,
  pub last_modified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
  pub blogger_id: i64,
  pub title:      String,
  pub page_url:   String,
  pub feed_url:   String,
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// A blog post. `summary` is already sanitized; it is copied verbatim into
/// rendered output downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub id:         i64,
  pub blog_id:    i64,
  /// Publication time, naive UTC.
  pub timestamp:  NaiveDateTime,
  pub title:      String,
  pub summary:    String,
  pub page_url:   String,
  /// Feed-native id, when the feed provides one.
  pub guid:       Option<String>,
  /// The duedate of the round this post counts for; `None` until assignment
  /// runs, and permanently `None` for bonus posts.
  pub counts_for: Option<NaiveDateTime>,
}

impl Post {
  /// The round this post would count for if nothing else claimed it.
  pub fn due(&self, tz: Tz) -> Duedate {
    db_duedate(self.timestamp, tz)
  }

  /// Whole rounds between the post's natural round and the round it was
  /// assigned to; `None` when unassigned.
  pub fn rounds_late(&self, tz: Tz) -> Option<i64> {
    self
      .counts_for
      .map(|cf| round_diff(&self.due(tz), &Duedate::from_dbtime(cf, tz)))
  }
}

#[derive(Debug, Clone)]
pub struct NewPost {
  pub blog_id:   i64,
  pub timestamp: NaiveDateTime,
  pub title:     String,
  pub summary:   String,
  pub page_url:  String,
  pub guid:      Option<String>,
}

/// The mutable fields of a stored post, overwritten in place when a feed
/// edits an already-ingested entry.
#[derive(Debug, Clone)]
pub struct PostUpdate {
  pub title:    String,
  pub summary:  String,
  pub page_url: String,
  pub guid:     Option<String>,
}

// ─── Party ───────────────────────────────────────────────────────────────────

/// A debt-settling event. The inclusive `[first_duedate, last_duedate]`
/// window of rounds it closes out is frozen afterwards: those rounds can no
/// longer gain or lose posts, and they drop out of the open ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
  pub id:            i64,
  pub date:          NaiveDateTime,
  /// Amount spent at the party, in cents.
  pub spent:         i64,
  pub first_duedate: NaiveDateTime,
  pub last_duedate:  NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewParty {
  pub date:          NaiveDateTime,
  pub spent:         i64,
  pub first_duedate: NaiveDateTime,
  pub last_duedate:  NaiveDateTime,
}

// ─── Payment ─────────────────────────────────────────────────────────────────

/// Money credited to a blogger against a specific round. A forgiven entry
/// reduces what is owed without any cash changing hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
  pub id:         i64,
  pub blogger_id: i64,
  /// Cents.
  pub amount:     i64,
  /// The round this payment is credited toward.
  pub duedate:    NaiveDateTime,
  pub forgiven:   bool,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
  pub blogger_id: i64,
  pub amount:     i64,
  pub duedate:    NaiveDateTime,
  pub forgiven:   bool,
}
