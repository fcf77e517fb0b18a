//! Bulk import/export of blogger and blog registrations.
//!
//! The document format is a mapping from blogger display name to
//! `{start: YYYY-MM-DD, links: [[title, page_url, feed_url], ...]}`. Input
//! is parsed as YAML; output is dumped as JSON, which is a strict subset of
//! YAML, so a dump always re-imports. The round-trip property
//! `export(import(export(x))) == export(x)` holds.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, OpError, Result,
  calendar::to_dbtime,
  config::ClubConfig,
  model::{NewBlog, NewBlogger},
  store::ClubStore,
};

/// One blogger's registration in the interchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
  /// Join date, `YYYY-MM-DD`, in the club's local timezone.
  pub start: String,
  /// `[title, page_url, feed_url]` triples.
  pub links: Vec<(String, String, String)>,
}

/// The whole document. A `BTreeMap` keeps dumps deterministic.
pub type RosterDoc = BTreeMap<String, RosterEntry>;

pub fn parse_roster(text: &str) -> Result<RosterDoc> {
  Ok(serde_yaml::from_str(text)?)
}

pub fn dump_roster(doc: &RosterDoc) -> Result<String> {
  Ok(serde_json::to_string_pretty(doc)?)
}

/// Load a roster document into the store.
///
/// Start dates are day-precision local dates. They must be interpreted in
/// the club timezone before conversion to stored UTC: handing `YYYY-MM-DD`
/// straight to a UTC parser would register anyone west of UTC as having
/// started the previous day, and therefore the previous round.
pub async fn import_roster<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
  doc: &RosterDoc,
) -> Result<usize, OpError<S::Error>> {
  let tz = cfg.timezone;
  let mut imported = 0;

  for (name, entry) in doc {
    let date = NaiveDate::parse_from_str(&entry.start, "%Y-%m-%d")
      .map_err(|e| Error::BadStartDate(entry.start.clone(), e.to_string()))?;
    let local = match tz.from_local_datetime(&date.and_time(NaiveTime::MIN)) {
      chrono::LocalResult::Single(dt) => dt,
      chrono::LocalResult::Ambiguous(earlier, _) => earlier,
      chrono::LocalResult::None => {
        return Err(OpError::Core(Error::BadStartDate(
          entry.start.clone(),
          "midnight does not exist in the club timezone on this date".into(),
        )));
      }
    };

    let blogger = store
      .add_blogger(NewBlogger {
        name:       name.clone(),
        start_date: to_dbtime(&local),
      })
      .await
      .map_err(OpError::Store)?;

    for (title, page_url, feed_url) in &entry.links {
      store
        .add_blog(NewBlog {
          blogger_id: blogger.id,
          title:      title.clone(),
          page_url:   page_url.clone(),
          feed_url:   feed_url.clone(),
        })
        .await
        .map_err(OpError::Store)?;
    }
    imported += 1;
  }

  info!(bloggers = imported, "roster import complete");
  Ok(imported)
}

/// Inverse of [`import_roster`]: dump the store's registrations back into
/// the interchange shape.
pub async fn export_roster<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
) -> Result<RosterDoc, OpError<S::Error>> {
  let tz = cfg.timezone;
  let mut doc = RosterDoc::new();

  for blogger in store.list_bloggers().await.map_err(OpError::Store)? {
    let local = crate::calendar::from_dbtime(blogger.start_date, tz);
    let links = store
      .blogs_for(blogger.id)
      .await
      .map_err(OpError::Store)?
      .into_iter()
      .map(|b| (b.title, b.page_url, b.feed_url))
      .collect();
    doc.insert(blogger.name, RosterEntry {
      start: local.date_naive().format("%Y-%m-%d").to_string(),
      links,
    });
  }

  Ok(doc)
}
