//! End-to-end ingestion tests against a mock HTTP server and a real
//! in-memory store.

use chrono::{NaiveDate, NaiveDateTime};
use quill_core::{
  model::{Blog, NewBlog, NewBlogger},
  store::ClubStore,
};
use quill_feed::{FeedClient, fetch_all};
use quill_store_sqlite::SqliteStore;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{header, method, path},
};

fn db(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(y, mo, d)
    .unwrap()
    .and_hms_opt(h, mi, 0)
    .unwrap()
}

/// `(title, link, guid, pub_date_rfc2822, description)` items into an RSS
/// body.
fn rss_feed(items: &[(&str, &str, &str, &str, &str)]) -> String {
  let items: String = items
    .iter()
    .map(|(title, link, guid, date, desc)| {
      format!(
        "<item><title>{title}</title><link>{link}</link>\
         <guid>{guid}</guid><pubDate>{date}</pubDate>\
         <description>{desc}</description></item>"
      )
    })
    .collect();
  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>A blog</title><link>http://example.com/</link>
<description>words</description>{items}</channel></rss>"#
  )
}

fn atom_feed(entries: &[(&str, &str, &str, &str)]) -> String {
  let entries: String = entries
    .iter()
    .map(|(title, link, id, published)| {
      format!(
        "<entry><title>{title}</title><id>{id}</id>\
         <link href=\"{link}\"/><published>{published}</published>\
         <updated>{published}</updated></entry>"
      )
    })
    .collect();
  format!(
    r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<title>A blog</title><id>urn:feed:a</id>
<updated>2015-04-16T12:00:00Z</updated>{entries}</feed>"#
  )
}

/// Register one blogger with one blog whose feed lives at `feed_url`.
async fn register(s: &SqliteStore, name: &str, feed_url: &str) -> Blog {
  let blogger = s
    .add_blogger(NewBlogger {
      name:       name.to_owned(),
      start_date: db(2015, 4, 1, 0, 0),
    })
    .await
    .unwrap();
  s.add_blog(NewBlog {
    blogger_id: blogger.id,
    title:      format!("{name}'s blog"),
    page_url:   format!("http://example.com/{name}"),
    feed_url:   feed_url.to_owned(),
  })
  .await
  .unwrap()
}

async fn all_posts(s: &SqliteStore) -> Vec<quill_core::model::Post> {
  s.pending_posts(db(2000, 1, 1, 0, 0), db(2030, 1, 1, 0, 0))
    .await
    .unwrap()
}

#[tokio::test]
async fn ingest_inserts_then_reingest_is_a_noop() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[
      (
        "Security Breach",
        "http://example.com/1",
        "urn:post:1",
        "Wed, 15 Apr 2015 12:00:00 GMT",
        "oops",
      ),
      (
        "Javascript",
        "http://example.com/2",
        "urn:post:2",
        "Thu, 16 Apr 2015 12:00:00 GMT",
        "semicolons",
      ),
    ])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 2);
  let posts = all_posts(&store).await;
  assert_eq!(posts.len(), 2);
  assert_eq!(posts[0].title, "Security Breach");
  assert_eq!(posts[0].timestamp, db(2015, 4, 15, 12, 0));

  // Same body again: every entry dedups against its stored post.
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 0);
  assert_eq!(all_posts(&store).await.len(), 2);
}

#[tokio::test]
async fn conditional_fetch_honors_etag() {
  let server = MockServer::start().await;
  // The full body is served exactly once, with a cache token.
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("etag", "\"v1\"")
        .set_body_string(rss_feed(&[(
          "Security Breach",
          "http://example.com/1",
          "urn:post:1",
          "Wed, 15 Apr 2015 12:00:00 GMT",
          "oops",
        )])),
    )
    .up_to_n_times(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .and(header("if-none-match", "\"v1\""))
    .respond_with(ResponseTemplate::new(304))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  let blog =
    register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  let blog = store.get_blog(blog.id).await.unwrap().unwrap();
  assert_eq!(blog.etag.as_deref(), Some("\"v1\""));

  // Second pass sends the token back and gets a 304; nothing changes.
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 0);
  assert_eq!(all_posts(&store).await.len(), 1);
}

#[tokio::test]
async fn edited_entry_updates_in_place() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Draft title",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "first cut",
    )])))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  // Same guid, new title and summary, timestamp nudged half an hour.
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Final title",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:30:00 GMT",
      "rewritten",
    )])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 0);

  let posts = all_posts(&store).await;
  assert_eq!(posts.len(), 1);
  assert_eq!(posts[0].title, "Final title");
  assert_eq!(posts[0].summary, "rewritten");
  // The stored publication time is the one first seen.
  assert_eq!(posts[0].timestamp, db(2015, 4, 15, 12, 0));
}

#[tokio::test]
async fn entries_sharing_only_a_link_dedup_in_place() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Draft title",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "first cut",
    )])))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  // Guid and title both rewritten; the link alone identifies the post.
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Final title",
      "http://example.com/1",
      "urn:post:1b",
      "Wed, 15 Apr 2015 12:30:00 GMT",
      "rewritten",
    )])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 0);

  let posts = all_posts(&store).await;
  assert_eq!(posts.len(), 1);
  assert_eq!(posts[0].title, "Final title");
  assert_eq!(posts[0].guid.as_deref(), Some("urn:post:1b"));
  assert_eq!(posts[0].timestamp, db(2015, 4, 15, 12, 0));
}

#[tokio::test]
async fn redated_entry_updates_in_place_and_spares_its_siblings() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/alice"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Draft title",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "first cut",
    )])))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  // Republished two days later with a fresh guid and title: well outside
  // the dedup window, but the same post by URL.
  Mock::given(method("GET"))
    .and(path("/alice"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Republished",
      "http://example.com/1",
      "urn:post:1b",
      "Fri, 17 Apr 2015 12:00:00 GMT",
      "moved",
    )])))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/bob"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Sourdough",
      "http://example.com/sourdough",
      "urn:post:sourdough",
      "Thu, 16 Apr 2015 12:00:00 GMT",
      "bread",
    )])))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/bob"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[
      (
        "Sourdough",
        "http://example.com/sourdough",
        "urn:post:sourdough",
        "Thu, 16 Apr 2015 12:00:00 GMT",
        "bread",
      ),
      (
        "Rye",
        "http://example.com/rye",
        "urn:post:rye",
        "Sat, 18 Apr 2015 12:00:00 GMT",
        "darker",
      ),
    ])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/alice", server.uri())).await;
  register(&store, "bob", &format!("{}/bob", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 2);

  // The redated entry must not abort the pass; bob's new post still lands.
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);

  let posts = all_posts(&store).await;
  assert_eq!(posts.len(), 3);
  assert_eq!(posts[0].title, "Republished");
  assert_eq!(posts[0].guid.as_deref(), Some("urn:post:1b"));
  // The stored publication time is still the one first seen.
  assert_eq!(posts[0].timestamp, db(2015, 4, 15, 12, 0));
  assert_eq!(posts[2].title, "Rye");
}

#[tokio::test]
async fn entries_without_guids_dedup_by_title() {
  let server = MockServer::start().await;
  let item = |date: &str| {
    format!(
      r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>A blog</title><link>http://example.com/</link>
<description>words</description>
<item><title>Security Breach</title><link>http://example.com/1</link>
<pubDate>{date}</pubDate><description>oops</description></item>
</channel></rss>"#
    )
  };
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_string(item("Wed, 15 Apr 2015 12:00:00 GMT")),
    )
    .up_to_n_times(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_string(item("Wed, 15 Apr 2015 12:30:00 GMT")),
    )
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 0);
  assert_eq!(all_posts(&store).await.len(), 1);
}

#[tokio::test]
async fn entry_sharing_nothing_is_a_new_post() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "First post",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "one",
    )])))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  // Close in time, but guid, title, and link all differ: a distinct post.
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Second post",
      "http://example.com/2",
      "urn:post:2",
      "Wed, 15 Apr 2015 12:30:00 GMT",
      "two",
    )])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  assert_eq!(all_posts(&store).await.len(), 2);
}

#[tokio::test]
async fn malformed_entry_does_not_sink_its_siblings() {
  let server = MockServer::start().await;
  let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>A blog</title><link>http://example.com/</link>
<description>words</description>
<item><title>Undated</title><link>http://example.com/0</link></item>
<item><title>Dated</title><link>http://example.com/1</link>
<guid>urn:post:1</guid><pubDate>Wed, 15 Apr 2015 12:00:00 GMT</pubDate>
<description>fine</description></item>
</channel></rss>"#;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(body))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();

  assert_eq!(fetch_all(&store, &client).await.unwrap(), 1);
  let posts = all_posts(&store).await;
  assert_eq!(posts.len(), 1);
  assert_eq!(posts[0].title, "Dated");
}

#[tokio::test]
async fn broken_feed_does_not_block_the_others() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/alice"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Security Breach",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "oops",
    )])))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/bob"))
    .respond_with(ResponseTemplate::new(200).set_body_string("not xml"))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/carol"))
    .respond_with(ResponseTemplate::new(200).set_body_string(atom_feed(&[(
      "Sourdough",
      "http://example.com/bread",
      "urn:post:bread",
      "2015-04-16T12:00:00Z",
    )])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/alice", server.uri())).await;
  register(&store, "bob", &format!("{}/bob", server.uri())).await;
  register(&store, "carol", &format!("{}/carol", server.uri())).await;
  let client = FeedClient::new().unwrap();

  // Bob's garbage feed is skipped; the other two land.
  assert_eq!(fetch_all(&store, &client).await.unwrap(), 2);
  let titles: Vec<_> = all_posts(&store)
    .await
    .into_iter()
    .map(|p| p.title)
    .collect();
  assert_eq!(titles, ["Security Breach", "Sourdough"]);
}

#[tokio::test]
async fn summaries_are_sanitized_on_ingest() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/feed"))
    .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
      "Styled",
      "http://example.com/1",
      "urn:post:1",
      "Wed, 15 Apr 2015 12:00:00 GMT",
      "&lt;p&gt;fine&lt;/p&gt;&lt;script&gt;alert(1)&lt;/script&gt;",
    )])))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  register(&store, "alice", &format!("{}/feed", server.uri())).await;
  let client = FeedClient::new().unwrap();
  fetch_all(&store, &client).await.unwrap();

  let posts = all_posts(&store).await;
  assert!(posts[0].summary.contains("<p>fine</p>"));
  assert!(!posts[0].summary.contains("script"));
}
