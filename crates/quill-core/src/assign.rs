//! Round assignment — mapping pending posts onto weekly rounds.
//!
//! Posts are processed in ascending timestamp order across all blogs, so
//! that earlier posts claim rounds before later ones; given the same data
//! the pass always reproduces the same mapping.

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::{
  OpError,
  calendar::{Duedate, db_duedate, duedate_seek},
  config::ClubConfig,
  model::{Party, Post},
  store::ClubStore,
};

/// Assign every pending post in `[since, until]` to a round.
///
/// `since` defaults to the earliest blogger start date and `until` to now.
/// Returns the number of posts that found a round; the remainder stay
/// unassigned as bonus posts.
pub async fn assign_rounds<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
  since: Option<NaiveDateTime>,
  until: Option<NaiveDateTime>,
) -> Result<usize, OpError<S::Error>> {
  let until = until.unwrap_or_else(|| Utc::now().naive_utc());
  let since = match since {
    Some(s) => s,
    None => match store.earliest_start_date().await.map_err(OpError::Store)? {
      Some(s) => s,
      // Nobody has joined yet; nothing to assign.
      None => return Ok(0),
    },
  };

  let parties = store.list_parties().await.map_err(OpError::Store)?;
  let posts = store
    .pending_posts(since, until)
    .await
    .map_err(OpError::Store)?;

  let mut assigned = 0;
  for post in &posts {
    if assign_round(store, cfg, &parties, post).await?.is_some() {
      assigned += 1;
    }
  }
  info!(
    pending = posts.len(),
    assigned, "round assignment pass complete"
  );
  Ok(assigned)
}

/// Find a round for one post to count for.
///
/// Walks candidate rounds most-recent-first, from the post's own round back
/// through the lateness window, so a post satisfies its own week before
/// reaching backward to cover a miss. Returns the claimed duedate, or
/// `None` when every candidate is taken or frozen (a bonus post).
pub async fn assign_round<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
  parties: &[Party],
  post: &Post,
) -> Result<Option<Duedate>, OpError<S::Error>> {
  let tz = cfg.timezone;

  let blogger_id = match store.get_blog(post.blog_id).await.map_err(OpError::Store)? {
    Some(blog) => blog.blogger_id,
    None => return Ok(None),
  };
  let start_due = match store.get_blogger(blogger_id).await.map_err(OpError::Store)? {
    Some(blogger) => db_duedate(blogger.start_date, tz),
    None => return Ok(None),
  };

  let due = post.due(tz);

  // The post's own round is the preferred candidate, unless it sits inside
  // a party window that has not been reached yet: settled rounds must not
  // be claimed, so the search starts just below the window.
  let mut youngest = due.clone();
  for party in parties {
    let first = Duedate::from_dbtime(party.first_duedate, tz);
    let last = Duedate::from_dbtime(party.last_duedate, tz);
    if first <= due && due <= last {
      youngest = duedate_seek(&first, -1);
    }
  }

  // The oldest candidate: at most `max_lateness` rounds back, never before
  // the blogger joined, never at or below a round a party already closed.
  let mut oldest = duedate_seek(&due, -cfg.max_lateness());
  if oldest < start_due {
    oldest = start_due;
  }
  for party in parties {
    let last = Duedate::from_dbtime(party.last_duedate, tz);
    if last <= youngest {
      let after = duedate_seek(&last, 1);
      if after > oldest {
        oldest = after;
      }
    }
  }

  let mut round = youngest;
  while round >= oldest {
    let taken = store
      .round_taken(blogger_id, round.dbtime())
      .await
      .map_err(OpError::Store)?;
    if !taken {
      store
        .claim_round(post.id, round.dbtime())
        .await
        .map_err(OpError::Store)?;
      debug!(post = %post.page_url, round = %round, "assigned post to round");
      return Ok(Some(round));
    }
    round = duedate_seek(&round, -1);
  }

  debug!(post = %post.page_url, "no open round; post is a bonus");
  Ok(None)
}
