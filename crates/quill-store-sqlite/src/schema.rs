//! SQL schema for the Quill SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// All timestamps are naive UTC stored as `'YYYY-MM-DD HH:MM:SS'` text,
/// which sorts and range-filters correctly as plain strings.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS bloggers (
    blogger_id INTEGER PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    start_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blogs (
    blog_id       INTEGER PRIMARY KEY,
    blogger_id    INTEGER NOT NULL REFERENCES bloggers(blogger_id) ON DELETE CASCADE,
    title         TEXT NOT NULL,
    page_url      TEXT NOT NULL,
    feed_url      TEXT NOT NULL,
    etag          TEXT,
    last_modified TEXT
);

CREATE TABLE IF NOT EXISTS posts (
    post_id    INTEGER PRIMARY KEY,
    blog_id    INTEGER NOT NULL REFERENCES blogs(blog_id) ON DELETE CASCADE,
    timestamp  TEXT NOT NULL,
    title      TEXT NOT NULL,
    summary    TEXT NOT NULL,   -- sanitized before it gets here
    page_url   TEXT NOT NULL,
    guid       TEXT,
    counts_for TEXT,            -- duedate of the assigned round, or NULL
    UNIQUE (blog_id, guid),
    UNIQUE (blog_id, page_url)
);

CREATE TABLE IF NOT EXISTS parties (
    party_id      INTEGER PRIMARY KEY,
    date          TEXT NOT NULL,
    spent         INTEGER NOT NULL,
    first_duedate TEXT NOT NULL,
    last_duedate  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    payment_id INTEGER PRIMARY KEY,
    blogger_id INTEGER NOT NULL REFERENCES bloggers(blogger_id) ON DELETE CASCADE,
    amount     INTEGER NOT NULL,
    duedate    TEXT NOT NULL,
    forgiven   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS posts_blog_idx       ON posts(blog_id);
CREATE INDEX IF NOT EXISTS posts_timestamp_idx  ON posts(timestamp);
CREATE INDEX IF NOT EXISTS posts_counts_for_idx ON posts(counts_for);
CREATE INDEX IF NOT EXISTS payments_blogger_idx ON payments(blogger_id);

PRAGMA user_version = 1;
";
