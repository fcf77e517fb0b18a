//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are naive UTC formatted as `YYYY-MM-DD HH:MM:SS`; the format
//! sorts lexicographically in timestamp order, which the range queries in
//! `store.rs` rely on.

use chrono::NaiveDateTime;
use quill_core::model::{Blog, Blogger, Party, Payment, Post};

use crate::{Error, Result};

const DBTIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn encode_dt(dt: NaiveDateTime) -> String {
  dt.format(DBTIME_FMT).to_string()
}

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, DBTIME_FMT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_dt_opt(s: Option<&str>) -> Result<Option<NaiveDateTime>> {
  s.map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `bloggers` row.
pub struct RawBlogger {
  pub blogger_id: i64,
  pub name:       String,
  pub start_date: String,
}

impl RawBlogger {
  pub fn into_blogger(self) -> Result<Blogger> {
    Ok(Blogger {
      id:         self.blogger_id,
      name:       self.name,
      start_date: decode_dt(&self.start_date)?,
    })
  }
}

/// Raw strings read directly from a `blogs` row.
pub struct RawBlog {
  pub blog_id:       i64,
  pub blogger_id:    i64,
  pub title:         String,
  pub page_url:      String,
  pub feed_url:      String,
  pub etag:          Option<String>,
  pub last_modified: Option<String>,
}

impl RawBlog {
  pub fn into_blog(self) -> Blog {
    Blog {
      id:            self.blog_id,
      blogger_id:    self.blogger_id,
      title:         self.title,
      page_url:      self.page_url,
      feed_url:      self.feed_url,
      etag:          self.etag,
      last_modified: self.last_modified,
    }
  }
}

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub post_id:    i64,
  pub blog_id:    i64,
  pub timestamp:  String,
  pub title:      String,
  pub summary:    String,
  pub page_url:   String,
  pub guid:       Option<String>,
  pub counts_for: Option<String>,
}

impl RawPost {
  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      id:         self.post_id,
      blog_id:    self.blog_id,
      timestamp:  decode_dt(&self.timestamp)?,
      title:      self.title,
      summary:    self.summary,
      page_url:   self.page_url,
      guid:       self.guid,
      counts_for: decode_dt_opt(self.counts_for.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `parties` row.
pub struct RawParty {
  pub party_id:      i64,
  pub date:          String,
  pub spent:         i64,
  pub first_duedate: String,
  pub last_duedate:  String,
}

impl RawParty {
  pub fn into_party(self) -> Result<Party> {
    Ok(Party {
      id:            self.party_id,
      date:          decode_dt(&self.date)?,
      spent:         self.spent,
      first_duedate: decode_dt(&self.first_duedate)?,
      last_duedate:  decode_dt(&self.last_duedate)?,
    })
  }
}

/// Raw strings read directly from a `payments` row.
pub struct RawPayment {
  pub payment_id: i64,
  pub blogger_id: i64,
  pub amount:     i64,
  pub duedate:    String,
  pub forgiven:   bool,
}

impl RawPayment {
  pub fn into_payment(self) -> Result<Payment> {
    Ok(Payment {
      id:         self.payment_id,
      blogger_id: self.blogger_id,
      amount:     self.amount,
      duedate:    decode_dt(&self.duedate)?,
      forgiven:   self.forgiven,
    })
  }
}
