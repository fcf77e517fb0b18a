//! Duedate arithmetic — mapping timestamps onto weekly accounting rounds.
//!
//! A guide to the temporal types used throughout the workspace:
//!
//! * A *dbtime* is a [`NaiveDateTime`]; these are what the store persists,
//!   and they are implicitly UTC.
//! * A *local time* is a `DateTime<Tz>` in the club's configured timezone.
//! * A [`Duedate`] is a local time that falls exactly on a round boundary:
//!   Sunday at local midnight, i.e. the instant that begins the following
//!   Monday. If `due` is a duedate, `duedate(due) == due` holds.
//!
//! Every computation that could cross a DST transition works in local
//! calendar units and re-normalises through [`local_duedate`] afterwards;
//! nothing here ever adds a raw `n * 604_800` seconds.

use chrono::{
  DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime,
  TimeZone, Utc,
};
use chrono_tz::Tz;

/// One round, in seconds, ignoring DST skew. Only used as the divisor in
/// [`round_diff`], where the result is rounded to absorb the skew.
const ROUND_LEN_SECS: i64 = 7 * 24 * 60 * 60;

// ─── Duedate ─────────────────────────────────────────────────────────────────

/// A validated round boundary in the club's timezone.
///
/// Construct one through [`duedate`], [`local_duedate`], or
/// [`Duedate::from_dbtime`]; the invariant that the wrapped instant is a
/// boundary is maintained by those constructors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duedate(DateTime<Tz>);

impl Duedate {
  /// Re-hydrate a duedate persisted as naive UTC.
  ///
  /// The value is re-normalised through [`local_duedate`], so a stored
  /// boundary maps to itself.
  pub fn from_dbtime(dbtime: NaiveDateTime, tz: Tz) -> Self {
    local_duedate(from_dbtime(dbtime, tz))
  }

  /// Like [`Duedate::from_dbtime`], but errors if the stored value is not
  /// already an exact boundary. Used to validate operator-supplied dates
  /// (party windows, report ranges).
  pub fn validate_dbtime(dbtime: NaiveDateTime, tz: Tz) -> crate::Result<Self> {
    let local = from_dbtime(dbtime, tz);
    let due = local_duedate(local.clone());
    if due.0 != local {
      return Err(crate::Error::BadDateRange(format!(
        "{dbtime} is not a round boundary"
      )));
    }
    Ok(due)
  }

  /// The boundary as the naive UTC value the store persists.
  pub fn dbtime(&self) -> NaiveDateTime {
    to_dbtime(&self.0)
  }

  /// The boundary as a local instant.
  pub fn local(&self) -> &DateTime<Tz> {
    &self.0
  }
}

impl std::fmt::Display for Duedate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // Label a round by the local date of its final day (the Sunday).
    let eve = self.0.date_naive() - Duration::days(1);
    write!(f, "{}", eve.format("%Y-%m-%d"))
  }
}

// ─── dbtime conversions ──────────────────────────────────────────────────────

/// Convert a local time to the naive-UTC representation the store persists.
pub fn to_dbtime(local: &DateTime<Tz>) -> NaiveDateTime {
  local.with_timezone(&Utc).naive_utc()
}

/// Convert a persisted naive-UTC timestamp to a local time.
pub fn from_dbtime(dbtime: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
  Utc.from_utc_datetime(&dbtime).with_timezone(&tz)
}

/// Resolve a naive local datetime in `tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// non-existent ones (DST spring-forward) slide forward an hour at a time
/// until they land on a valid instant.
fn resolve_local(mut naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
  loop {
    match tz.from_local_datetime(&naive) {
      LocalResult::Single(dt) => return dt,
      LocalResult::Ambiguous(earlier, _) => return earlier,
      LocalResult::None => naive = naive + Duration::hours(1),
    }
  }
}

// ─── Round arithmetic ────────────────────────────────────────────────────────

/// The duedate of the round a post published at `ts` (UTC) counts for.
pub fn duedate(ts: DateTime<Utc>, tz: Tz) -> Duedate {
  local_duedate(ts.with_timezone(&tz))
}

/// The duedate of the round a post published at naive-UTC `dbtime` counts for.
pub fn db_duedate(dbtime: NaiveDateTime, tz: Tz) -> Duedate {
  local_duedate(from_dbtime(dbtime, tz))
}

/// The smallest round boundary at or after `local`. Idempotent: a boundary
/// maps to itself.
pub fn local_duedate(local: DateTime<Tz>) -> Duedate {
  let tz = local.timezone();
  let date = local.date_naive();

  // Days until the next Monday; zero when `local` is already a Monday.
  let ahead = (7 - date.weekday().num_days_from_monday()) % 7;
  let mut boundary_date = date + Duration::days(i64::from(ahead));
  let mut boundary = resolve_local(boundary_date.and_time(NaiveTime::MIN), tz);

  // A Monday after midnight belongs to the week that ends next Monday.
  if boundary < local {
    boundary_date = boundary_date + Duration::days(7);
    boundary = resolve_local(boundary_date.and_time(NaiveTime::MIN), tz);
  }
  Duedate(boundary)
}

/// The duedate `count` rounds after `due`; negative counts seek backwards.
///
/// Computed with local calendar arithmetic so that crossing a DST transition
/// lands on the boundary, not an hour off it.
pub fn duedate_seek(due: &Duedate, count: i64) -> Duedate {
  let tz = due.0.timezone();
  let naive = due.0.naive_local() + Duration::weeks(count);
  local_duedate(resolve_local(naive, tz))
}

/// The whole number of rounds between two duedates.
///
/// Rounds to the nearest integer: when the interval crosses a DST boundary
/// it is not an exact number of weeks, but the residue is at most an hour.
pub fn round_diff(last: &Duedate, first: &Duedate) -> i64 {
  let secs = (last.0.clone() - first.0.clone()).num_seconds();
  (secs as f64 / ROUND_LEN_SECS as f64).round() as i64
}

/// The current moment as a local time.
pub fn now(tz: Tz) -> DateTime<Tz> {
  Utc::now().with_timezone(&tz)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono_tz::America::New_York;

  use super::*;

  fn db(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
      .unwrap()
      .and_hms_opt(h, mi, 0)
      .unwrap()
  }

  #[test]
  fn duedate_is_idempotent() {
    let samples = [
      db(2015, 4, 1, 0, 0),
      db(2015, 4, 19, 23, 59),
      db(2016, 11, 4, 12, 0),
      db(2016, 3, 13, 6, 30), // spring-forward morning
    ];
    for s in samples {
      let due = db_duedate(s, New_York);
      let again = local_duedate(due.local().clone());
      assert_eq!(due, again, "duedate not idempotent for {s}");
    }
  }

  #[test]
  fn duedate_lands_on_monday_midnight() {
    let due = db_duedate(db(2015, 4, 15, 0, 0), New_York);
    let local = due.local();
    assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2015, 4, 20).unwrap());
    assert_eq!(local.time(), NaiveTime::MIN);
  }

  #[test]
  fn boundary_counts_for_the_week_it_ends() {
    // Exactly Monday 00:00 local is the deadline for the preceding week.
    let boundary = resolve_local(db(2015, 4, 20, 0, 0), New_York);
    assert_eq!(local_duedate(boundary.clone()).local(), &boundary);

    // One second later belongs to the next round.
    let after = boundary + Duration::seconds(1);
    let next = local_duedate(after);
    assert_eq!(round_diff(&next, &local_duedate(boundary)), 1);
  }

  #[test]
  fn seek_roundtrips_across_dst() {
    // US DST ended 2016-11-06; the boundary before is EDT, after is EST.
    let due = db_duedate(db(2016, 11, 1, 12, 0), New_York);
    for n in [-8i64, -1, 1, 3, 8, 52] {
      let there = duedate_seek(&due, n);
      let back = duedate_seek(&there, -n);
      assert_eq!(back, due, "seek({n}) did not round-trip");
      assert_eq!(round_diff(&there, &due), n);
    }
  }

  #[test]
  fn round_diff_absorbs_dst_skew() {
    let before = db_duedate(db(2016, 10, 25, 0, 0), New_York); // Oct 31 EDT
    let after = db_duedate(db(2016, 11, 8, 0, 0), New_York); // Nov 14 EST
    // Two calendar weeks apart, even though the raw interval is 14d + 1h.
    assert_eq!(round_diff(&after, &before), 2);
    let raw = (after.local().clone() - before.local().clone()).num_seconds();
    assert_eq!(raw, 2 * ROUND_LEN_SECS + 3600);
  }

  #[test]
  fn dbtime_roundtrip() {
    let dbt = db(2015, 4, 20, 4, 0);
    let local = from_dbtime(dbt, New_York);
    assert_eq!(to_dbtime(&local), dbt);
  }

  #[test]
  fn validate_rejects_non_boundaries() {
    assert!(Duedate::validate_dbtime(db(2015, 4, 15, 0, 0), New_York).is_err());
    let boundary = db_duedate(db(2015, 4, 15, 0, 0), New_York).dbtime();
    assert!(Duedate::validate_dbtime(boundary, New_York).is_ok());
  }
}
