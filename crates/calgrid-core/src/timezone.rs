use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;

use crate::config::Config;
use crate::view::add_days;

pub const TIMEZONE_ENV_VAR: &str =
  "CALGRID_TIMEZONE";

/// Rendering timezone: the environment,
/// then the config file, then the host
/// zone. UTC is the last resort.
pub fn resolve_timezone(
  config: &Config
) -> Tz {
  let env = std::env::var(TIMEZONE_ENV_VAR)
    .ok();
  let host = host_timezone();
  resolve_timezone_from(
    env.as_deref(),
    config.timezone.as_deref(),
    host.as_deref()
  )
}

pub fn resolve_timezone_from(
  env: Option<&str>,
  configured: Option<&str>,
  host: Option<&str>
) -> Tz {
  if let Some(raw) = env
    && let Some(tz) =
      parse_timezone(raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  if let Some(raw) = host
    && let Some(tz) =
      parse_timezone(raw, "host")
  {
    return tz;
  }

  tracing::info!(
    "no usable timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
}

/// IANA id of the host zone: `$TZ` when
/// set, else what the OS reports.
fn host_timezone() -> Option<String> {
  if let Ok(raw) = std::env::var("TZ") {
    let id = raw
      .trim()
      .trim_start_matches(':');
    if !id.is_empty() {
      return Some(id.to_string());
    }
  }

  match iana_time_zone::get_timezone() {
    | Ok(id) => Some(id),
    | Err(err) => {
      tracing::debug!(
        error = %err,
        "host timezone unavailable"
      );
      None
    }
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured rendering timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn local_date(
  now: DateTime<Utc>,
  timezone: Tz
) -> NaiveDate {
  now.with_timezone(&timezone)
    .date_naive()
}

#[must_use]
pub fn today_in(timezone: Tz) -> NaiveDate {
  local_date(Utc::now(), timezone)
}

/// Parses an anchor date given on the
/// command line: `today`, `tomorrow`,
/// `yesterday` or `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_anchor_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "" => {
      Err(anyhow!(
        "anchor date cannot be empty"
      ))
    }
    | "today" => Ok(today),
    | "tomorrow" => {
      Ok(add_days(today, 1))
    }
    | "yesterday" => {
      Ok(add_days(today, -1))
    }
    | _ => {
      NaiveDate::parse_from_str(
        token, "%Y-%m-%d"
      )
      .with_context(|| {
        format!(
          "invalid date '{token}' \
           (expected YYYY-MM-DD, today, \
           tomorrow or yesterday)"
        )
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    local_date,
    parse_anchor_date,
    resolve_timezone_from
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn environment_wins_over_config() {
    assert_eq!(
      resolve_timezone_from(
        Some("Asia/Tokyo"),
        Some("Europe/Moscow"),
        Some("America/New_York")
      ),
      chrono_tz::Asia::Tokyo
    );
    assert_eq!(
      resolve_timezone_from(
        Some("Mars/Olympus"),
        Some("Europe/Moscow"),
        Some("America/New_York")
      ),
      chrono_tz::Europe::Moscow
    );
    assert_eq!(
      resolve_timezone_from(
        Some("  "),
        None,
        None
      ),
      chrono_tz::UTC
    );
  }

  #[test]
  fn host_zone_fills_in_before_utc() {
    assert_eq!(
      resolve_timezone_from(
        None,
        None,
        Some("America/New_York")
      ),
      chrono_tz::America::New_York
    );
    assert_eq!(
      resolve_timezone_from(
        None,
        Some("not a zone"),
        Some("America/New_York")
      ),
      chrono_tz::America::New_York
    );
    assert_eq!(
      resolve_timezone_from(
        None,
        None,
        Some("Local/Unknown")
      ),
      chrono_tz::UTC
    );
  }

  #[test]
  fn local_date_follows_the_zone() {
    let now = Utc
      .with_ymd_and_hms(
        2024, 3, 5, 22, 30, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      local_date(now, chrono_tz::UTC),
      day(2024, 3, 5)
    );
    assert_eq!(
      local_date(
        now,
        chrono_tz::Europe::Moscow
      ),
      day(2024, 3, 6)
    );
  }

  #[test]
  fn parses_anchor_dates() {
    let today = day(2024, 3, 1);
    assert_eq!(
      parse_anchor_date("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_anchor_date("Yesterday", today)
        .expect("yesterday"),
      day(2024, 2, 29)
    );
    assert_eq!(
      parse_anchor_date(
        "2024-12-25",
        today
      )
      .expect("explicit"),
      day(2024, 12, 25)
    );
    assert!(
      parse_anchor_date("25/12/2024", today)
        .is_err()
    );
  }
}
