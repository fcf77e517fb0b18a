//! HTTP fetching with conditional-request support.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{
  StatusCode,
  header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
};

use crate::{Error, Result};

const USER_AGENT: &str =
  concat!("quill/", env!("CARGO_PKG_VERSION"), " (feed fetcher)");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a conditional fetch.
#[derive(Debug)]
pub enum FetchOutcome {
  /// The server confirmed the cached copy is still current (HTTP 304).
  NotModified,
  /// A fresh body, with whatever cache tokens the server handed back.
  Fetched {
    body:          Bytes,
    etag:          Option<String>,
    last_modified: Option<String>,
  },
}

/// A feed fetcher wrapping a shared [`reqwest::Client`].
///
/// Cloning is cheap; the inner client pools connections.
#[derive(Clone)]
pub struct FeedClient {
  inner: reqwest::Client,
}

impl FeedClient {
  pub fn new() -> Result<Self> {
    let inner = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(Error::Client)?;
    Ok(Self { inner })
  }

  /// Fetch `url`, sending the cache tokens from the previous fetch so an
  /// unchanged feed costs a 304 instead of a full body.
  pub async fn fetch(
    &self,
    url: &str,
    etag: Option<&str>,
    last_modified: Option<&str>,
  ) -> Result<FetchOutcome> {
    let mut request = self.inner.get(url);
    if let Some(etag) = etag {
      request = request.header(IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = last_modified {
      request = request.header(IF_MODIFIED_SINCE, last_modified);
    }

    let response = request.send().await.map_err(|source| Error::Http {
      url: url.to_owned(),
      source,
    })?;

    if response.status() == StatusCode::NOT_MODIFIED {
      return Ok(FetchOutcome::NotModified);
    }
    let response =
      response
        .error_for_status()
        .map_err(|source| Error::Http {
          url: url.to_owned(),
          source,
        })?;

    let header = |name| {
      response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    };
    let etag = header(ETAG);
    let last_modified = header(LAST_MODIFIED);

    let body = response.bytes().await.map_err(|source| Error::Http {
      url: url.to_owned(),
      source,
    })?;

    Ok(FetchOutcome::Fetched {
      body,
      etag,
      last_modified,
    })
  }
}
