//! The `ClubStore` trait — the query interface the accounting core runs
//! against.
//!
//! The trait is implemented by storage backends (e.g. `quill-store-sqlite`).
//! Ingestion, round assignment, and ledger computation depend on this
//! abstraction, not on any concrete backend, which keeps them testable
//! against an in-memory database.
//!
//! All methods return `Send` futures so the trait can be used from
//! multi-threaded async runtimes.

use std::future::Future;

use chrono::NaiveDateTime;

use crate::model::{
  Blog, Blogger, NewBlog, NewBlogger, NewParty, NewPayment, NewPost, Party,
  Payment, Post, PostUpdate,
};

pub trait ClubStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Bloggers ──────────────────────────────────────────────────────────

  /// Register a participant. Errors if the display name is taken.
  fn add_blogger(
    &self,
    input: NewBlogger,
  ) -> impl Future<Output = Result<Blogger, Self::Error>> + Send + '_;

  fn get_blogger(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Blogger>, Self::Error>> + Send + '_;

  fn get_blogger_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Blogger>, Self::Error>> + Send + 'a;

  /// All participants, ordered by name.
  fn list_bloggers(
    &self,
  ) -> impl Future<Output = Result<Vec<Blogger>, Self::Error>> + Send + '_;

  /// Delete a participant; owned blogs and posts go with them.
  fn remove_blogger(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The earliest participant start date, i.e. the beginning of tracked
  /// history. `None` while the club is empty.
  fn earliest_start_date(
    &self,
  ) -> impl Future<Output = Result<Option<NaiveDateTime>, Self::Error>> + Send + '_;

  // ── Blogs ─────────────────────────────────────────────────────────────

  fn add_blog(
    &self,
    input: NewBlog,
  ) -> impl Future<Output = Result<Blog, Self::Error>> + Send + '_;

  fn get_blog(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Blog>, Self::Error>> + Send + '_;

  fn list_blogs(
    &self,
  ) -> impl Future<Output = Result<Vec<Blog>, Self::Error>> + Send + '_;

  fn blogs_for(
    &self,
    blogger_id: i64,
  ) -> impl Future<Output = Result<Vec<Blog>, Self::Error>> + Send + '_;

  /// Persist the cache tokens returned by the latest successful fetch.
  fn update_cache_tokens(
    &self,
    blog_id: i64,
    etag: Option<String>,
    last_modified: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn insert_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Overwrite the mutable fields of a stored post (feed edited an entry).
  fn update_post(
    &self,
    post_id: i64,
    update: PostUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Timestamp of the newest stored post for a blog, if any.
  fn latest_post_timestamp(
    &self,
    blog_id: i64,
  ) -> impl Future<Output = Result<Option<NaiveDateTime>, Self::Error>> + Send + '_;

  /// Posts for `blog_id` whose timestamp is within `window_secs` of `ts`,
  /// either side. The dedup probe for update-in-place detection.
  fn posts_near(
    &self,
    blog_id: i64,
    ts: NaiveDateTime,
    window_secs: i64,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// The stored post for `blog_id` with this page URL, if any. Posts are
  /// unique per `(blog, page_url)`, so a candidate sharing a URL with a
  /// stored post is that post however far its timestamp has drifted.
  fn post_by_page_url<'a>(
    &'a self,
    blog_id: i64,
    page_url: &'a str,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + 'a;

  /// Unassigned posts with `since <= timestamp <= until`, across all blogs,
  /// in ascending timestamp order. Assignment MUST consume them in exactly
  /// this order to stay deterministic.
  fn pending_posts(
    &self,
    since: NaiveDateTime,
    until: NaiveDateTime,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// Whether some post by `blogger_id` already counts for `duedate`.
  fn round_taken(
    &self,
    blogger_id: i64,
    duedate: NaiveDateTime,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Set `counts_for` on a post, enforcing that no other post by the same
  /// blogger counts for the same round. Violations surface as a backend
  /// error and leave the store untouched.
  fn claim_round(
    &self,
    post_id: i64,
    duedate: NaiveDateTime,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Posts by `blogger_id` assigned to a round in `[first, stop)`, newest
  /// round first.
  fn assigned_posts(
    &self,
    blogger_id: i64,
    first: NaiveDateTime,
    stop: NaiveDateTime,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  // ── Parties ───────────────────────────────────────────────────────────

  /// Record a party. The transaction rejects a window overlapping an
  /// existing party's; contiguity with the latest settled round is the
  /// caller's concern, checked via `validate_new_party` before this call.
  fn add_party(
    &self,
    input: NewParty,
  ) -> impl Future<Output = Result<Party, Self::Error>> + Send + '_;

  /// All parties, ordered by `first_duedate` ascending.
  fn list_parties(
    &self,
  ) -> impl Future<Output = Result<Vec<Party>, Self::Error>> + Send + '_;

  // ── Payments ──────────────────────────────────────────────────────────

  fn add_payment(
    &self,
    input: NewPayment,
  ) -> impl Future<Output = Result<Payment, Self::Error>> + Send + '_;

  /// Payments by `blogger_id` credited to a round in `[first, stop)`.
  fn payments_between(
    &self,
    blogger_id: i64,
    first: NaiveDateTime,
    stop: NaiveDateTime,
  ) -> impl Future<Output = Result<Vec<Payment>, Self::Error>> + Send + '_;
}
