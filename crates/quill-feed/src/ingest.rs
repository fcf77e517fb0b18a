//! Reconciling parsed candidates against stored posts.

use quill_core::{
  model::{Blog, NewPost, Post, PostUpdate},
  store::ClubStore,
};
use tracing::{debug, info, warn};

use crate::{
  IngestError,
  client::{FeedClient, FetchOutcome},
  parse::{Candidate, parse_feed},
};

/// Feeds routinely tweak an entry's timestamp when it is edited; a stored
/// post and a candidate within this window of each other can be the same
/// post.
pub const DEDUP_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Fetch every blog's feed and ingest what is new.
///
/// Feed-side failures (network, format) are logged and skipped so one broken
/// blog cannot starve the rest; store-side failures abort the pass. Returns
/// the number of newly inserted posts.
pub async fn fetch_all<S: ClubStore>(
  store: &S,
  client: &FeedClient,
) -> Result<usize, IngestError<S::Error>> {
  let blogs = store.list_blogs().await.map_err(IngestError::Store)?;
  let mut inserted = 0;

  for blog in &blogs {
    match fetch_posts(store, client, blog).await {
      Ok(n) => inserted += n,
      Err(IngestError::Feed(err)) => {
        warn!(feed = %blog.feed_url, error = %err, "skipping blog this pass");
      }
      Err(err) => return Err(err),
    }
  }

  info!(blogs = blogs.len(), inserted, "feed ingestion pass complete");
  Ok(inserted)
}

/// Fetch one blog's feed and ingest its entries. Returns the number of
/// newly inserted posts.
pub async fn fetch_posts<S: ClubStore>(
  store: &S,
  client: &FeedClient,
  blog: &Blog,
) -> Result<usize, IngestError<S::Error>> {
  let outcome = client
    .fetch(&blog.feed_url, blog.etag.as_deref(), blog.last_modified.as_deref())
    .await?;

  let (body, etag, last_modified) = match outcome {
    FetchOutcome::NotModified => {
      debug!(feed = %blog.feed_url, "not modified");
      return Ok(0);
    }
    FetchOutcome::Fetched {
      body,
      etag,
      last_modified,
    } => (body, etag, last_modified),
  };

  let mut candidates = Vec::new();
  for entry in parse_feed(&blog.feed_url, &body)? {
    match entry {
      Ok(candidate) => candidates.push(candidate),
      Err(err) => {
        warn!(feed = %blog.feed_url, error = %err, "skipping entry");
      }
    }
  }
  // Newest first, so the early-exit below sees fresh entries before the
  // long-ingested tail.
  candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

  let newest_stored = store
    .latest_post_timestamp(blog.id)
    .await
    .map_err(IngestError::Store)?;

  let mut inserted = 0;
  for candidate in candidates {
    let near = store
      .posts_near(blog.id, candidate.timestamp, DEDUP_WINDOW_SECS)
      .await
      .map_err(IngestError::Store)?;

    if let Some(existing) = near.iter().find(|post| matches(post, &candidate)) {
      if differs(existing, &candidate) {
        debug!(post = %existing.page_url, "feed edited a stored post");
        store
          .update_post(existing.id, PostUpdate {
            title:    candidate.title,
            summary:  candidate.summary,
            page_url: candidate.page_url,
            guid:     candidate.guid,
          })
          .await
          .map_err(IngestError::Store)?;
      }
      continue;
    }

    // A feed can redate an entry right out of the dedup window; the URL
    // still names the stored post, and posts are unique per
    // `(blog, page_url)`, so inserting here would violate the store's
    // constraint.
    if let Some(existing) = store
      .post_by_page_url(blog.id, &candidate.page_url)
      .await
      .map_err(IngestError::Store)?
    {
      if differs(&existing, &candidate) {
        debug!(post = %existing.page_url, "feed redated a stored post");
        store
          .update_post(existing.id, PostUpdate {
            title:    candidate.title,
            summary:  candidate.summary,
            page_url: candidate.page_url,
            guid:     candidate.guid,
          })
          .await
          .map_err(IngestError::Store)?;
      }
      continue;
    }

    // Once candidates fall more than a dedup window behind the newest
    // stored post, the rest of the (sorted) tail is history we already
    // ingested; stop scanning.
    if let Some(newest) = newest_stored {
      if candidate.timestamp <= newest - chrono::Duration::seconds(DEDUP_WINDOW_SECS)
      {
        break;
      }
    }

    store
      .insert_post(NewPost {
        blog_id:   blog.id,
        timestamp: candidate.timestamp,
        title:     candidate.title,
        summary:   candidate.summary,
        page_url:  candidate.page_url,
        guid:      candidate.guid,
      })
      .await
      .map_err(IngestError::Store)?;
    inserted += 1;
  }

  store
    .update_cache_tokens(blog.id, etag, last_modified)
    .await
    .map_err(IngestError::Store)?;

  debug!(feed = %blog.feed_url, inserted, "ingested feed");
  Ok(inserted)
}

/// Whether a stored post and a candidate (already known to be close in
/// time) are the same post: any of guid, title, or url agreeing is enough
/// to survive a feed editing the other two.
fn matches(post: &Post, candidate: &Candidate) -> bool {
  if let (Some(a), Some(b)) = (post.guid.as_deref(), candidate.guid.as_deref())
  {
    if a == b {
      return true;
    }
  }
  post.title == candidate.title || post.page_url == candidate.page_url
}

fn differs(post: &Post, candidate: &Candidate) -> bool {
  post.title != candidate.title
    || post.summary != candidate.summary
    || post.page_url != candidate.page_url
    || post.guid != candidate.guid
}
