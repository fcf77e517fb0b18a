//! Ledger computation — per-blogger debt, payments, and forgiveness over a
//! range of rounds, plus the per-party report that splits history at each
//! debt-settling event.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::{
  Error, OpError,
  calendar::{Duedate, db_duedate, duedate_seek, local_duedate, now, round_diff},
  config::ClubConfig,
  model::{NewParty, Party},
  store::ClubStore,
};

// ─── Output types ────────────────────────────────────────────────────────────

/// One blogger's line in a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
  pub blogger:  String,
  /// Debt incurred over the range, capped at `max_debt`. Cents.
  pub incurred: i64,
  pub paid:     i64,
  pub forgiven: i64,
  pub owed:     i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTotals {
  pub incurred: i64,
  pub paid:     i64,
  pub forgiven: i64,
  pub owed:     i64,
}

/// A ledger over a half-open duedate range `[start, stop)`.
#[derive(Debug, Clone)]
pub struct Ledger {
  pub start:  Duedate,
  pub stop:   Duedate,
  pub rows:   Vec<LedgerRow>,
  pub totals: LedgerTotals,
}

/// One section of the party report: either the open ledger (no party yet)
/// or the ledger a specific party settled.
#[derive(Debug, Clone)]
pub struct PartyLedger {
  /// When the party happened; `None` for the open section.
  pub date:   Option<NaiveDateTime>,
  /// Amount spent at the party, cents; zero for the open section.
  pub spent:  i64,
  pub ledger: Ledger,
}

// ─── Ledger computation ──────────────────────────────────────────────────────

/// Build a ledger for the rounds in `[start, stop)`.
///
/// `start` defaults to the first round of tracked history and `stop` to the
/// current round. An empty club yields a degenerate all-zero ledger rather
/// than an error.
pub async fn build_ledger<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
  start: Option<Duedate>,
  stop: Option<Duedate>,
) -> Result<Ledger, OpError<S::Error>> {
  let tz = cfg.timezone;

  let stop = match stop {
    Some(d) => d,
    None => local_duedate(now(tz)),
  };
  let start = match start {
    Some(d) => d,
    None => match store.earliest_start_date().await.map_err(OpError::Store)? {
      Some(dbt) => db_duedate(dbt, tz),
      // No bloggers: any value works, the ledger below will be empty.
      None => stop.clone(),
    },
  };
  if start > stop {
    return Err(OpError::Core(Error::BadDateRange(format!(
      "ledger start {start} is after stop {stop}"
    ))));
  }

  let mut rows = Vec::new();
  let mut totals = LedgerTotals::default();

  let bloggers = store.list_bloggers().await.map_err(OpError::Store)?;
  for blogger in bloggers {
    if blogger.start_date >= stop.dbtime() {
      continue;
    }
    let mut first_due = db_duedate(blogger.start_date, tz);
    if first_due < start {
      first_due = start.clone();
    }

    let posts = store
      .assigned_posts(blogger.id, first_due.dbtime(), stop.dbtime())
      .await
      .map_err(OpError::Store)?;

    // A blogger whose first round begins at or after `stop` owes nothing
    // yet; `round_diff` would go negative below.
    let num_rounds = round_diff(&stop, &first_due).max(0);
    let missed = (num_rounds - posts.len() as i64).max(0);

    let mut incurred = cfg.debt_per_post * missed;
    for post in &posts {
      if let Some(late) = post.rounds_late(tz) {
        incurred += late * cfg.late_penalty;
      }
    }
    incurred = incurred.min(cfg.max_debt);

    let mut paid = 0;
    let mut forgiven = 0;
    let payments = store
      .payments_between(blogger.id, first_due.dbtime(), stop.dbtime())
      .await
      .map_err(OpError::Store)?;
    for payment in payments {
      if payment.forgiven {
        forgiven += payment.amount;
      } else {
        paid += payment.amount;
      }
    }

    let owed = incurred - paid - forgiven;
    debug!(blogger = %blogger.name, incurred, paid, forgiven, owed, "ledger row");

    totals.incurred += incurred;
    totals.paid += paid;
    totals.forgiven += forgiven;
    totals.owed += owed;
    rows.push(LedgerRow {
      blogger: blogger.name,
      incurred,
      paid,
      forgiven,
      owed,
    });
  }

  Ok(Ledger {
    start,
    stop,
    rows,
    totals,
  })
}

/// Build the full party report: the open ledger since the last settled
/// round, followed by one ledger per party (most recent party first), each
/// over the party's inclusive round window.
pub async fn party_report<S: ClubStore>(
  store: &S,
  cfg: &ClubConfig,
) -> Result<Vec<PartyLedger>, OpError<S::Error>> {
  let tz = cfg.timezone;
  let mut parties = store.list_parties().await.map_err(OpError::Store)?;
  // Most recent window first, matching how the report reads.
  parties.sort_by(|a, b| b.first_duedate.cmp(&a.first_duedate));

  let mut report = Vec::with_capacity(parties.len() + 1);

  // The open section: everything after the last settled round.
  let open_start = parties
    .first()
    .map(|p| duedate_seek(&Duedate::from_dbtime(p.last_duedate, tz), 1));
  report.push(PartyLedger {
    date:   None,
    spent:  0,
    ledger: build_ledger(store, cfg, open_start, None).await?,
  });

  for party in &parties {
    let first = Duedate::from_dbtime(party.first_duedate, tz);
    let last = Duedate::from_dbtime(party.last_duedate, tz);
    // The window is inclusive of `last`, so the half-open ledger stops one
    // round past it.
    let stop = duedate_seek(&last, 1);
    report.push(PartyLedger {
      date:   Some(party.date),
      spent:  party.spent,
      ledger: build_ledger(store, cfg, Some(first), Some(stop)).await?,
    });
  }

  Ok(report)
}

// ─── Party window validation ─────────────────────────────────────────────────

/// Check a new party window against the invariants: both endpoints are
/// valid duedates, the window is not inverted, and it neither overlaps an
/// existing window nor leaves a gap after the latest one.
pub fn validate_new_party(
  cfg: &ClubConfig,
  existing: &[Party],
  input: &NewParty,
) -> Result<(), Error> {
  let tz = cfg.timezone;
  let first = Duedate::validate_dbtime(input.first_duedate, tz)
    .map_err(|_| Error::InvalidPartyWindow(format!(
      "first_duedate {} is not a round boundary",
      input.first_duedate
    )))?;
  let last = Duedate::validate_dbtime(input.last_duedate, tz)
    .map_err(|_| Error::InvalidPartyWindow(format!(
      "last_duedate {} is not a round boundary",
      input.last_duedate
    )))?;
  if last < first {
    return Err(Error::InvalidPartyWindow(format!(
      "window ends ({last}) before it starts ({first})"
    )));
  }

  for party in existing {
    let p_first = Duedate::from_dbtime(party.first_duedate, tz);
    let p_last = Duedate::from_dbtime(party.last_duedate, tz);
    if first <= p_last && p_first <= last {
      return Err(Error::InvalidPartyWindow(format!(
        "window [{first}, {last}] overlaps existing party [{p_first}, {p_last}]"
      )));
    }
  }

  // Windows must stay contiguous: the new one starts right after the
  // latest settled round.
  if let Some(latest) = existing.iter().max_by_key(|p| p.last_duedate) {
    let expected = duedate_seek(&Duedate::from_dbtime(latest.last_duedate, tz), 1);
    if first != expected {
      return Err(Error::InvalidPartyWindow(format!(
        "window starts at {first}; expected {expected} to stay contiguous"
      )));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono_tz::America::New_York;

  use super::*;

  fn db(y: i32, mo: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
      .unwrap()
      .and_hms_opt(h, 0, 0)
      .unwrap()
  }

  fn party(id: i64, first: chrono::NaiveDateTime, last: chrono::NaiveDateTime) -> Party {
    Party {
      id,
      date: last,
      spent: 0,
      first_duedate: first,
      last_duedate: last,
    }
  }

  fn new_party(first: chrono::NaiveDateTime, last: chrono::NaiveDateTime) -> NewParty {
    NewParty {
      date: last,
      spent: 0,
      first_duedate: first,
      last_duedate: last,
    }
  }

  // Round boundaries in April 2015, Eastern time, are Mondays 00:00 EDT,
  // i.e. 04:00 UTC as stored.

  #[test]
  fn rejects_non_boundary_endpoints() {
    let cfg = ClubConfig::new(New_York);
    let err = validate_new_party(
      &cfg,
      &[],
      &new_party(db(2015, 4, 6, 0), db(2015, 4, 20, 4)),
    );
    assert!(matches!(err, Err(Error::InvalidPartyWindow(_))));
  }

  #[test]
  fn rejects_inverted_window() {
    let cfg = ClubConfig::new(New_York);
    let err = validate_new_party(
      &cfg,
      &[],
      &new_party(db(2015, 4, 20, 4), db(2015, 4, 6, 4)),
    );
    assert!(matches!(err, Err(Error::InvalidPartyWindow(_))));
  }

  #[test]
  fn rejects_overlap_and_gaps() {
    let cfg = ClubConfig::new(New_York);
    let existing = [party(1, db(2015, 4, 6, 4), db(2015, 4, 13, 4))];

    // Overlaps the settled window.
    assert!(
      validate_new_party(
        &cfg,
        &existing,
        &new_party(db(2015, 4, 13, 4), db(2015, 4, 27, 4)),
      )
      .is_err()
    );
    // Leaves the Apr 20 round unsettled.
    assert!(
      validate_new_party(
        &cfg,
        &existing,
        &new_party(db(2015, 4, 27, 4), db(2015, 5, 4, 4)),
      )
      .is_err()
    );
    // Contiguous: accepted.
    assert!(
      validate_new_party(
        &cfg,
        &existing,
        &new_party(db(2015, 4, 20, 4), db(2015, 4, 27, 4)),
      )
      .is_ok()
    );
  }

  #[test]
  fn first_party_may_start_anywhere() {
    let cfg = ClubConfig::new(New_York);
    assert!(
      validate_new_party(
        &cfg,
        &[],
        &new_party(db(2015, 4, 20, 4), db(2015, 4, 20, 4)),
      )
      .is_ok()
    );
  }
}
