//! [`SqliteStore`] — the SQLite implementation of [`ClubStore`].

use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use rusqlite::OptionalExtension as _;

use quill_core::{
  model::{
    Blog, Blogger, NewBlog, NewBlogger, NewParty, NewPayment, NewPost, Party,
    Payment, Post, PostUpdate,
  },
  store::ClubStore,
};

use crate::{
  encode::{
    RawBlog, RawBlogger, RawParty, RawPayment, RawPost, decode_dt_opt,
    encode_dt,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row mapping helpers ─────────────────────────────────────────────────────

fn blogger_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBlogger> {
  Ok(RawBlogger {
    blogger_id: row.get(0)?,
    name:       row.get(1)?,
    start_date: row.get(2)?,
  })
}

fn blog_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBlog> {
  Ok(RawBlog {
    blog_id:       row.get(0)?,
    blogger_id:    row.get(1)?,
    title:         row.get(2)?,
    page_url:      row.get(3)?,
    feed_url:      row.get(4)?,
    etag:          row.get(5)?,
    last_modified: row.get(6)?,
  })
}

const BLOG_COLS: &str =
  "blog_id, blogger_id, title, page_url, feed_url, etag, last_modified";

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPost> {
  Ok(RawPost {
    post_id:    row.get(0)?,
    blog_id:    row.get(1)?,
    timestamp:  row.get(2)?,
    title:      row.get(3)?,
    summary:    row.get(4)?,
    page_url:   row.get(5)?,
    guid:       row.get(6)?,
    counts_for: row.get(7)?,
  })
}

const POST_COLS: &str =
  "post_id, blog_id, timestamp, title, summary, page_url, guid, counts_for";

/// Outcome of the claim transaction, reported from inside the closure so the
/// error mapping can happen outside it.
enum ClaimStatus {
  Claimed,
  Taken,
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quill club store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ClubStore impl ──────────────────────────────────────────────────────────

impl ClubStore for SqliteStore {
  type Error = Error;

  // ── Bloggers ──────────────────────────────────────────────────────────────

  async fn add_blogger(&self, input: NewBlogger) -> Result<Blogger> {
    let name      = input.name.clone();
    let start_str = encode_dt(input.start_date);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bloggers (name, start_date) VALUES (?1, ?2)",
          rusqlite::params![name, start_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Blogger {
      id,
      name: input.name,
      start_date: input.start_date,
    })
  }

  async fn get_blogger(&self, id: i64) -> Result<Option<Blogger>> {
    let raw: Option<RawBlogger> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT blogger_id, name, start_date FROM bloggers
             WHERE blogger_id = ?1",
            rusqlite::params![id],
            blogger_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBlogger::into_blogger).transpose()
  }

  async fn get_blogger_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> Result<Option<Blogger>> {
    let name = name.to_owned();

    let raw: Option<RawBlogger> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT blogger_id, name, start_date FROM bloggers
             WHERE name = ?1",
            rusqlite::params![name],
            blogger_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBlogger::into_blogger).transpose()
  }

  async fn list_bloggers(&self) -> Result<Vec<Blogger>> {
    let raws: Vec<RawBlogger> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT blogger_id, name, start_date FROM bloggers ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], blogger_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBlogger::into_blogger).collect()
  }

  async fn remove_blogger(&self, id: i64) -> Result<()> {
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM bloggers WHERE blogger_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(Error::BloggerNotFound(id));
    }
    Ok(())
  }

  async fn earliest_start_date(&self) -> Result<Option<NaiveDateTime>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MIN(start_date) FROM bloggers", [], |r| {
          r.get(0)
        })?)
      })
      .await?;

    decode_dt_opt(raw.as_deref())
  }

  // ── Blogs ─────────────────────────────────────────────────────────────────

  async fn add_blog(&self, input: NewBlog) -> Result<Blog> {
    let blogger_id = input.blogger_id;
    let title      = input.title.clone();
    let page_url   = input.page_url.clone();
    let feed_url   = input.feed_url.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO blogs (blogger_id, title, page_url, feed_url)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![blogger_id, title, page_url, feed_url],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Blog {
      id,
      blogger_id:    input.blogger_id,
      title:         input.title,
      page_url:      input.page_url,
      feed_url:      input.feed_url,
      etag:          None,
      last_modified: None,
    })
  }

  async fn get_blog(&self, id: i64) -> Result<Option<Blog>> {
    let raw: Option<RawBlog> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {BLOG_COLS} FROM blogs WHERE blog_id = ?1"),
            rusqlite::params![id],
            blog_from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawBlog::into_blog))
  }

  async fn list_blogs(&self) -> Result<Vec<Blog>> {
    let raws: Vec<RawBlog> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {BLOG_COLS} FROM blogs ORDER BY blog_id"))?;
        let rows = stmt
          .query_map([], blog_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawBlog::into_blog).collect())
  }

  async fn blogs_for(&self, blogger_id: i64) -> Result<Vec<Blog>> {
    let raws: Vec<RawBlog> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BLOG_COLS} FROM blogs WHERE blogger_id = ?1
           ORDER BY blog_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![blogger_id], blog_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawBlog::into_blog).collect())
  }

  async fn update_cache_tokens(
    &self,
    blog_id: i64,
    etag: Option<String>,
    last_modified: Option<String>,
  ) -> Result<()> {
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE blogs SET etag = ?2, last_modified = ?3 WHERE blog_id = ?1",
          rusqlite::params![blog_id, etag, last_modified],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(Error::BlogNotFound(blog_id));
    }
    Ok(())
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn insert_post(&self, input: NewPost) -> Result<Post> {
    let blog_id  = input.blog_id;
    let ts_str   = encode_dt(input.timestamp);
    let title    = input.title.clone();
    let summary  = input.summary.clone();
    let page_url = input.page_url.clone();
    let guid     = input.guid.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (blog_id, timestamp, title, summary, page_url, guid)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![blog_id, ts_str, title, summary, page_url, guid],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Post {
      id,
      blog_id:    input.blog_id,
      timestamp:  input.timestamp,
      title:      input.title,
      summary:    input.summary,
      page_url:   input.page_url,
      guid:       input.guid,
      counts_for: None,
    })
  }

  async fn update_post(&self, post_id: i64, update: PostUpdate) -> Result<()> {
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE posts
           SET title = ?2, summary = ?3, page_url = ?4, guid = ?5
           WHERE post_id = ?1",
          rusqlite::params![
            post_id,
            update.title,
            update.summary,
            update.page_url,
            update.guid,
          ],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(Error::PostNotFound(post_id));
    }
    Ok(())
  }

  async fn latest_post_timestamp(
    &self,
    blog_id: i64,
  ) -> Result<Option<NaiveDateTime>> {
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT MAX(timestamp) FROM posts WHERE blog_id = ?1",
          rusqlite::params![blog_id],
          |r| r.get(0),
        )?)
      })
      .await?;

    decode_dt_opt(raw.as_deref())
  }

  async fn posts_near(
    &self,
    blog_id: i64,
    ts: NaiveDateTime,
    window_secs: i64,
  ) -> Result<Vec<Post>> {
    let lo_str = encode_dt(ts - Duration::seconds(window_secs));
    let hi_str = encode_dt(ts + Duration::seconds(window_secs));

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POST_COLS} FROM posts
           WHERE blog_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
           ORDER BY timestamp"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![blog_id, lo_str, hi_str], post_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn post_by_page_url(
    &self,
    blog_id: i64,
    page_url: &str,
  ) -> Result<Option<Post>> {
    let page_url = page_url.to_owned();

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {POST_COLS} FROM posts
                 WHERE blog_id = ?1 AND page_url = ?2"
              ),
              rusqlite::params![blog_id, page_url],
              post_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn pending_posts(
    &self,
    since: NaiveDateTime,
    until: NaiveDateTime,
  ) -> Result<Vec<Post>> {
    let since_str = encode_dt(since);
    let until_str = encode_dt(until);

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POST_COLS} FROM posts
           WHERE counts_for IS NULL
             AND timestamp >= ?1 AND timestamp <= ?2
           ORDER BY timestamp, post_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since_str, until_str], post_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn round_taken(
    &self,
    blogger_id: i64,
    duedate: NaiveDateTime,
  ) -> Result<bool> {
    let due_str = encode_dt(duedate);

    let taken: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM posts p
               JOIN blogs b ON b.blog_id = p.blog_id
               WHERE b.blogger_id = ?1 AND p.counts_for = ?2
               LIMIT 1",
              rusqlite::params![blogger_id, due_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(taken)
  }

  async fn claim_round(
    &self,
    post_id: i64,
    duedate: NaiveDateTime,
  ) -> Result<()> {
    let due_str = encode_dt(duedate);

    // The uniqueness constraint crosses a join (blogger, not blog), so it
    // cannot live in the schema; enforce it in a transaction instead.
    let status = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let blogger_id: Option<i64> = tx
          .query_row(
            "SELECT b.blogger_id FROM posts p
             JOIN blogs b ON b.blog_id = p.blog_id
             WHERE p.post_id = ?1",
            rusqlite::params![post_id],
            |r| r.get(0),
          )
          .optional()?;

        let Some(blogger_id) = blogger_id else {
          return Ok(ClaimStatus::Missing);
        };

        let taken: bool = tx
          .query_row(
            "SELECT 1 FROM posts p
             JOIN blogs b ON b.blog_id = p.blog_id
             WHERE b.blogger_id = ?1 AND p.counts_for = ?2
             LIMIT 1",
            rusqlite::params![blogger_id, due_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if taken {
          return Ok(ClaimStatus::Taken);
        }

        tx.execute(
          "UPDATE posts SET counts_for = ?2 WHERE post_id = ?1",
          rusqlite::params![post_id, due_str],
        )?;
        tx.commit()?;

        Ok(ClaimStatus::Claimed)
      })
      .await?;

    match status {
      ClaimStatus::Claimed => Ok(()),
      ClaimStatus::Taken => Err(Error::RoundTaken { post_id, duedate }),
      ClaimStatus::Missing => Err(Error::PostNotFound(post_id)),
    }
  }

  async fn assigned_posts(
    &self,
    blogger_id: i64,
    first: NaiveDateTime,
    stop: NaiveDateTime,
  ) -> Result<Vec<Post>> {
    let first_str = encode_dt(first);
    let stop_str  = encode_dt(stop);

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.post_id, p.blog_id, p.timestamp, p.title, p.summary,
                  p.page_url, p.guid, p.counts_for
           FROM posts p
           JOIN blogs b ON b.blog_id = p.blog_id
           WHERE b.blogger_id = ?1
             AND p.counts_for >= ?2 AND p.counts_for < ?3
           ORDER BY p.counts_for DESC",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![blogger_id, first_str, stop_str],
            post_from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  // ── Parties ───────────────────────────────────────────────────────────────

  async fn add_party(&self, input: NewParty) -> Result<Party> {
    let date_str  = encode_dt(input.date);
    let spent     = input.spent;
    let first_str = encode_dt(input.first_duedate);
    let last_str  = encode_dt(input.last_duedate);

    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Window overlap check; the timestamp text format makes string
        // comparison equivalent to chronological comparison.
        let clash: Option<i64> = tx
          .query_row(
            "SELECT party_id FROM parties
             WHERE first_duedate <= ?2 AND last_duedate >= ?1
             LIMIT 1",
            rusqlite::params![first_str, last_str],
            |r| r.get(0),
          )
          .optional()?;

        if let Some(existing) = clash {
          return Ok(Err(existing));
        }

        tx.execute(
          "INSERT INTO parties (date, spent, first_duedate, last_duedate)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![date_str, spent, first_str, last_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Ok(id))
      })
      .await?;

    let id = outcome.map_err(Error::PartyOverlap)?;

    Ok(Party {
      id,
      date:          input.date,
      spent:         input.spent,
      first_duedate: input.first_duedate,
      last_duedate:  input.last_duedate,
    })
  }

  async fn list_parties(&self) -> Result<Vec<Party>> {
    let raws: Vec<RawParty> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT party_id, date, spent, first_duedate, last_duedate
           FROM parties ORDER BY first_duedate",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawParty {
              party_id:      row.get(0)?,
              date:          row.get(1)?,
              spent:         row.get(2)?,
              first_duedate: row.get(3)?,
              last_duedate:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParty::into_party).collect()
  }

  // ── Payments ──────────────────────────────────────────────────────────────

  async fn add_payment(&self, input: NewPayment) -> Result<Payment> {
    let blogger_id = input.blogger_id;
    let amount     = input.amount;
    let due_str    = encode_dt(input.duedate);
    let forgiven   = input.forgiven;

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO payments (blogger_id, amount, duedate, forgiven)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![blogger_id, amount, due_str, forgiven],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Payment {
      id,
      blogger_id: input.blogger_id,
      amount:     input.amount,
      duedate:    input.duedate,
      forgiven:   input.forgiven,
    })
  }

  async fn payments_between(
    &self,
    blogger_id: i64,
    first: NaiveDateTime,
    stop: NaiveDateTime,
  ) -> Result<Vec<Payment>> {
    let first_str = encode_dt(first);
    let stop_str  = encode_dt(stop);

    let raws: Vec<RawPayment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT payment_id, blogger_id, amount, duedate, forgiven
           FROM payments
           WHERE blogger_id = ?1 AND duedate >= ?2 AND duedate < ?3
           ORDER BY duedate",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![blogger_id, first_str, stop_str],
            |row| {
              Ok(RawPayment {
                payment_id: row.get(0)?,
                blogger_id: row.get(1)?,
                amount:     row.get(2)?,
                duedate:    row.get(3)?,
                forgiven:   row.get(4)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPayment::into_payment).collect()
  }
}
