//! Feed parsing — turning an RSS or Atom body into post candidates.
//!
//! A candidate needs a title, a link, and a publication date; an entry
//! missing any of the three yields a per-entry [`Error::MalformedPost`]
//! rather than failing the whole feed. Summaries are sanitized here, once,
//! on the way in.

use atom_syndication::TextType;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// A parsed feed entry, not yet reconciled against stored posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
  /// Publication time, naive UTC.
  pub timestamp: NaiveDateTime,
  pub title:     String,
  /// Sanitized HTML.
  pub summary:   String,
  pub page_url:  String,
  pub guid:      Option<String>,
}

/// Parse `body` as RSS, falling back to Atom. The outer error means the
/// body is neither; the per-entry errors are malformed entries the caller
/// should log and skip.
pub fn parse_feed(
  url: &str,
  body: &[u8],
) -> Result<Vec<Result<Candidate>>> {
  if let Ok(channel) = rss::Channel::read_from(body) {
    return Ok(channel.items().iter().map(from_rss_item).collect());
  }
  if let Ok(feed) = atom_syndication::Feed::read_from(body) {
    return Ok(feed.entries().iter().map(from_atom_entry).collect());
  }
  Err(Error::UnknownFormat(url.to_owned()))
}

fn from_rss_item(item: &rss::Item) -> Result<Candidate> {
  let title = item
    .title()
    .ok_or_else(|| Error::MalformedPost("item without a title".into()))?;
  let link = item.link().ok_or_else(|| {
    Error::MalformedPost(format!("item {title:?} without a link"))
  })?;
  let timestamp = rss_timestamp(item).ok_or_else(|| {
    Error::MalformedPost(format!("item {link} without a usable date"))
  })?;

  Ok(Candidate {
    timestamp,
    title: title.to_owned(),
    // RSS descriptions are HTML by convention.
    summary: item.description().map(ammonia::clean).unwrap_or_default(),
    page_url: link.to_owned(),
    guid: item.guid().map(|guid| guid.value().to_owned()),
  })
}

/// `pubDate` (RFC 2822) wins; Dublin Core dates (RFC 3339) are the fallback
/// for feeds that only carry `dc:date`.
fn rss_timestamp(item: &rss::Item) -> Option<NaiveDateTime> {
  if let Some(ts) = item
    .pub_date()
    .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
  {
    return Some(ts.with_timezone(&Utc).naive_utc());
  }
  item.dublin_core_ext().and_then(|dc| {
    dc.dates()
      .iter()
      .find_map(|value| DateTime::parse_from_rfc3339(value).ok())
      .map(|ts| ts.with_timezone(&Utc).naive_utc())
  })
}

fn from_atom_entry(entry: &atom_syndication::Entry) -> Result<Candidate> {
  let link = entry.links().first().ok_or_else(|| {
    Error::MalformedPost(format!("entry {} without a link", entry.id()))
  })?;
  // Atom requires `updated`; prefer the true publication time when given.
  let timestamp = entry
    .published()
    .unwrap_or_else(|| entry.updated())
    .with_timezone(&Utc)
    .naive_utc();

  Ok(Candidate {
    timestamp,
    title: entry.title().as_str().to_owned(),
    summary: entry.summary().map(sanitize_text).unwrap_or_default(),
    page_url: link.href().to_owned(),
    guid: Some(entry.id().to_owned()),
  })
}

/// Plain-text Atom content gets escaped; HTML (and anything else) gets
/// scrubbed.
fn sanitize_text(text: &atom_syndication::Text) -> String {
  match text.r#type {
    TextType::Text => ammonia::clean_text(text.as_str()),
    _ => ammonia::clean(text.as_str()),
  }
}
