//! Formatting for integer-cent money amounts.

/// Format cents like `$5.23`. Integer arithmetic only; amounts round-trip
/// exactly through display.
pub fn format_usd(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let cents = cents.abs();
  format!("{sign}${}.{:02}", cents / 100, cents % 100)
}
