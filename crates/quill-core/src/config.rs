//! Club-wide accounting parameters.
//!
//! Every function that needs the timezone or the debt constants takes a
//! [`ClubConfig`] explicitly; there is no ambient global configuration.

use std::str::FromStr;

use chrono_tz::Tz;

use crate::{Error, Result};

/// Parameters of the accountability scheme. All monetary values are integer
/// minor-currency units (cents).
#[derive(Debug, Clone)]
pub struct ClubConfig {
  /// Timezone used for all round-boundary computation.
  pub timezone:      Tz,
  /// Debt incurred for each round with no counted post.
  pub debt_per_post: i64,
  /// Additional debt per round of lateness on a counted post.
  pub late_penalty:  i64,
  /// Cap on a single blogger's incurred debt over one reporting window.
  pub max_debt:      i64,
}

impl ClubConfig {
  pub fn new(timezone: Tz) -> Self {
    Self {
      timezone,
      debt_per_post: 500,
      late_penalty: 100,
      max_debt: 3000,
    }
  }

  /// Parse the timezone by IANA name, e.g. `"America/New_York"`.
  pub fn with_timezone_name(name: &str) -> Result<Self> {
    let tz =
      Tz::from_str(name).map_err(|_| Error::UnknownTimezone(name.to_owned()))?;
    Ok(Self::new(tz))
  }

  /// How many rounds back a late post may still count for.
  ///
  /// Integer division is deliberate: the window is however many whole late
  /// penalties fit inside one missed-post debt.
  pub fn max_lateness(&self) -> i64 {
    self.debt_per_post / self.late_penalty
  }
}
