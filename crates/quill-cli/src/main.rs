//! `quill` — operator CLI for the blogging-club ledger.
//!
//! Reads `quill.toml` (or the path given with `--config`), opens the SQLite
//! store, and runs one operation: roster import/export, feed ingestion,
//! round assignment, ledgers, parties, payments.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone as _};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use quill_core::{
  assign::assign_rounds,
  calendar::{Duedate, to_dbtime},
  config::ClubConfig,
  currency::format_usd,
  ledger::{Ledger, build_ledger, party_report, validate_new_party},
  model::{NewParty, NewPayment},
  roster::{dump_roster, export_roster, import_roster, parse_roster},
  store::ClubStore,
};
use quill_feed::{FeedClient, fetch_all};
use quill_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "quill", about = "Blogging-club accountability ledger")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, env = "QUILL_CONFIG", default_value = "quill.toml")]
  config: PathBuf,

  /// SQLite database path; overrides the config file.
  #[arg(long, env = "QUILL_DB")]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the database (or verify an existing one opens).
  InitDb,

  /// Import a YAML roster of bloggers and their blogs.
  Import {
    /// Roster file; see `export` for the shape.
    file: PathBuf,
  },

  /// Dump the registered bloggers and blogs as JSON (a YAML subset).
  Export {
    /// Write here instead of stdout.
    file: Option<PathBuf>,
  },

  /// Fetch every blog's feed and ingest new posts.
  FetchPosts,

  /// Assign pending posts to weekly rounds.
  AssignRounds {
    /// Only consider posts on or after this local date (YYYY-MM-DD).
    #[arg(long)]
    since: Option<String>,
    /// Only consider posts on or before this local date (YYYY-MM-DD).
    #[arg(long)]
    until: Option<String>,
  },

  /// Print the debt ledger over a range of rounds.
  Ledger {
    /// First round boundary, local YYYY-MM-DD (default: start of history).
    #[arg(long)]
    start: Option<String>,
    /// Stop round boundary, exclusive (default: the current round).
    #[arg(long)]
    stop:  Option<String>,
  },

  /// Print the open ledger plus one section per past party.
  PartyReport,

  /// Record a party settling an inclusive window of rounds.
  AddParty {
    /// When the party happened, local YYYY-MM-DD.
    #[arg(long)]
    date:  String,
    /// Amount spent, in cents.
    #[arg(long)]
    spent: i64,
    /// First settled round boundary, local YYYY-MM-DD (a Monday).
    #[arg(long)]
    first: String,
    /// Last settled round boundary, local YYYY-MM-DD (a Monday).
    #[arg(long)]
    last:  String,
  },

  /// Credit a payment (or forgiveness) against a blogger's round.
  AddPayment {
    /// Blogger display name.
    blogger: String,
    /// Amount, in cents.
    amount:  i64,
    /// Round boundary the payment counts toward, local YYYY-MM-DD.
    #[arg(long)]
    duedate: String,
    /// Record as forgiven debt instead of cash received.
    #[arg(long)]
    forgiven: bool,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the TOML config file. Everything has a default so a missing
/// file still works for a UTC club with the standard stakes.
#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
  db_path:       PathBuf,
  /// IANA timezone name, e.g. "America/New_York".
  timezone:      String,
  debt_per_post: Option<i64>,
  late_penalty:  Option<i64>,
  max_debt:      Option<i64>,
}

impl Default for ConfigFile {
  fn default() -> Self {
    Self {
      db_path:       PathBuf::from("quill.db"),
      timezone:      "UTC".to_owned(),
      debt_per_post: None,
      late_penalty:  None,
      max_debt:      None,
    }
  }
}

impl ConfigFile {
  fn club_config(&self) -> Result<ClubConfig> {
    let mut cfg = ClubConfig::with_timezone_name(&self.timezone)
      .with_context(|| format!("timezone {:?} in config", self.timezone))?;
    if let Some(v) = self.debt_per_post {
      cfg.debt_per_post = v;
    }
    if let Some(v) = self.late_penalty {
      cfg.late_penalty = v;
    }
    if let Some(v) = self.max_debt {
      cfg.max_debt = v;
    }
    Ok(cfg)
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let file_cfg: ConfigFile = if cli.config.exists() {
    let raw = std::fs::read_to_string(&cli.config)
      .with_context(|| format!("reading config file {}", cli.config.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };
  let cfg = file_cfg.club_config()?;
  let db_path = cli.db.unwrap_or(file_cfg.db_path);

  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("opening store at {}", db_path.display()))?;

  match cli.command {
    Command::InitDb => {
      println!("database ready at {}", db_path.display());
    }

    Command::Import { file } => {
      let text = std::fs::read_to_string(&file)
        .with_context(|| format!("reading roster {}", file.display()))?;
      let doc = parse_roster(&text).context("parsing roster")?;
      let n = import_roster(&store, &cfg, &doc)
        .await
        .context("importing roster")?;
      println!("imported {n} bloggers");
    }

    Command::Export { file } => {
      let doc = export_roster(&store, &cfg).await.context("exporting roster")?;
      let dumped = dump_roster(&doc)?;
      match file {
        Some(path) => std::fs::write(&path, dumped)
          .with_context(|| format!("writing roster {}", path.display()))?,
        None => println!("{dumped}"),
      }
    }

    Command::FetchPosts => {
      let client = FeedClient::new().context("building feed client")?;
      let n = fetch_all(&store, &client).await.context("fetching feeds")?;
      println!("ingested {n} new posts");
    }

    Command::AssignRounds { since, until } => {
      let since = since
        .map(|s| parse_local_date(&s, cfg.timezone))
        .transpose()?;
      let until = until
        .map(|s| parse_local_date(&s, cfg.timezone))
        .transpose()?;
      let n = assign_rounds(&store, &cfg, since, until)
        .await
        .context("assigning rounds")?;
      println!("assigned {n} posts to rounds");
    }

    Command::Ledger { start, stop } => {
      let start = start.map(|s| parse_duedate(&s, cfg.timezone)).transpose()?;
      let stop = stop.map(|s| parse_duedate(&s, cfg.timezone)).transpose()?;
      let ledger = build_ledger(&store, &cfg, start, stop)
        .await
        .context("building ledger")?;
      print_ledger(&ledger);
    }

    Command::PartyReport => {
      let report = party_report(&store, &cfg)
        .await
        .context("building party report")?;
      for section in &report {
        match section.date {
          None => println!("== Open ledger =="),
          Some(date) => println!(
            "== Party on {} (spent {}) ==",
            date.format("%Y-%m-%d"),
            format_usd(section.spent)
          ),
        }
        print_ledger(&section.ledger);
        println!();
      }
    }

    Command::AddParty {
      date,
      spent,
      first,
      last,
    } => {
      let input = NewParty {
        date: parse_local_date(&date, cfg.timezone)?,
        spent,
        first_duedate: parse_duedate(&first, cfg.timezone)?.dbtime(),
        last_duedate: parse_duedate(&last, cfg.timezone)?.dbtime(),
      };
      let existing = store.list_parties().await.context("listing parties")?;
      validate_new_party(&cfg, &existing, &input)?;
      let party = store.add_party(input).await.context("recording party")?;
      println!("recorded party {}", party.id);
    }

    Command::AddPayment {
      blogger,
      amount,
      duedate,
      forgiven,
    } => {
      let Some(blogger) = store
        .get_blogger_by_name(&blogger)
        .await
        .context("looking up blogger")?
      else {
        bail!("no blogger named {blogger:?}");
      };
      let payment = store
        .add_payment(NewPayment {
          blogger_id: blogger.id,
          amount,
          duedate: parse_duedate(&duedate, cfg.timezone)?.dbtime(),
          forgiven,
        })
        .await
        .context("recording payment")?;
      let kind = if payment.forgiven { "forgave" } else { "received" };
      println!(
        "{kind} {} from {} toward the {} round",
        format_usd(payment.amount),
        blogger.name,
        duedate
      );
    }
  }

  Ok(())
}

// ─── Argument parsing ─────────────────────────────────────────────────────────

/// Parse a `YYYY-MM-DD` operator argument as local midnight, stored UTC.
fn parse_local_date(s: &str, tz: Tz) -> Result<NaiveDateTime> {
  let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .with_context(|| format!("bad date {s:?}; expected YYYY-MM-DD"))?;
  let local = match tz.from_local_datetime(&date.and_time(NaiveTime::MIN)) {
    chrono::LocalResult::Single(dt) => dt,
    chrono::LocalResult::Ambiguous(earlier, _) => earlier,
    chrono::LocalResult::None => {
      bail!("midnight does not exist on {s} in {tz}")
    }
  };
  Ok(to_dbtime(&local))
}

/// Like [`parse_local_date`], but the date must be a round boundary.
fn parse_duedate(s: &str, tz: Tz) -> Result<Duedate> {
  let dbtime = parse_local_date(s, tz)?;
  Duedate::validate_dbtime(dbtime, tz)
    .with_context(|| format!("{s} is not a round boundary (a local Monday)"))
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_ledger(ledger: &Ledger) {
  println!("rounds {} .. {}", ledger.start, ledger.stop);
  println!(
    "{:<20} {:>10} {:>10} {:>10} {:>10}",
    "blogger", "incurred", "paid", "forgiven", "owed"
  );
  for row in &ledger.rows {
    println!(
      "{:<20} {:>10} {:>10} {:>10} {:>10}",
      row.blogger,
      format_usd(row.incurred),
      format_usd(row.paid),
      format_usd(row.forgiven),
      format_usd(row.owed)
    );
  }
  println!(
    "{:<20} {:>10} {:>10} {:>10} {:>10}",
    "total",
    format_usd(ledger.totals.incurred),
    format_usd(ledger.totals.paid),
    format_usd(ledger.totals.forgiven),
    format_usd(ledger.totals.owed)
  );
}
