//! Resolution of raw `date` / `dateTime`
//! values into local wall-clock time.
//!
//! Geometry works on `NaiveDateTime`
//! values already expressed in the
//! rendering timezone; ordering uses the
//! instant each one denotes.

use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use tracing::{
  trace,
  warn
};

use crate::event::{
  DateSpec,
  EventField,
  EventId,
  NormalizedEvent,
  RawEvent
};
use crate::layout::LayoutContext;

const NAIVE_DATE_TIME_FORMATS: [&str;
  3] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M"
];

/// A date field read in the rendering
/// timezone.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ResolvedTime {
  pub local:   NaiveDateTime,
  pub instant: DateTime<Utc>
}

/// Resolves one date field of `raw`. A
/// missing or unreadable field yields the
/// epoch.
pub fn normalize(
  raw: &RawEvent,
  field: EventField,
  timezone: Tz
) -> NaiveDateTime {
  resolve_field(raw, field, timezone)
    .local
}

pub fn resolve_field(
  raw: &RawEvent,
  field: EventField,
  timezone: Tz
) -> ResolvedTime {
  match raw.field(field) {
    | Some(spec) => {
      resolve_spec(spec, timezone)
    }
    | None => {
      trace!(
        ?field,
        "event field missing; using epoch"
      );
      epoch_resolved(timezone)
    }
  }
}

pub fn normalize_spec(
  spec: &DateSpec,
  timezone: Tz
) -> NaiveDateTime {
  resolve_spec(spec, timezone).local
}

pub fn resolve_spec(
  spec: &DateSpec,
  timezone: Tz
) -> ResolvedTime {
  if let Some(raw) = spec.date.as_deref()
  {
    if let Some(resolved) =
      parse_all_day(raw, timezone)
    {
      return resolved;
    }
    warn!(
      date = %raw,
      "unreadable all-day date; using epoch"
    );
  } else if let Some(raw) =
    spec.date_time.as_deref()
  {
    if let Some(resolved) =
      parse_date_time(raw, timezone)
    {
      return resolved;
    }
    warn!(
      date_time = %raw,
      "unreadable dateTime; using epoch"
    );
  } else {
    warn!(
      "event date has neither date nor \
       dateTime; using epoch"
    );
  }

  epoch_resolved(timezone)
}

#[tracing::instrument(
  level = "trace",
  skip(raw, ctx)
)]
pub fn normalize_event(
  id: EventId,
  raw: &RawEvent,
  ctx: &LayoutContext
) -> NormalizedEvent {
  let start = resolve_field(
    raw,
    EventField::Start,
    ctx.timezone
  );

  let end = match raw.end.as_ref() {
    | Some(spec) => {
      normalize_spec(spec, ctx.timezone)
    }
    | None => {
      start.local
        + Duration::minutes(i64::from(
          ctx.default_duration_minutes
        ))
    }
  };

  let end = if end < start.local {
    trace!(
      %id,
      start = %start.local,
      %end,
      "end before start; raising end"
    );
    start.local
  } else {
    end
  };

  let title = raw
    .summary
    .as_deref()
    .filter(|summary| {
      !summary.trim().is_empty()
    })
    .map(str::to_string)
    .unwrap_or_else(|| {
      ctx.untitled.clone()
    });

  NormalizedEvent {
    id,
    title,
    start: start.local,
    end,
    start_instant: start.instant,
    all_day: raw.start.is_all_day()
  }
}

pub fn normalize_events(
  raws: &[RawEvent],
  ctx: &LayoutContext
) -> Vec<NormalizedEvent> {
  raws
    .iter()
    .enumerate()
    .map(|(idx, raw)| {
      normalize_event(
        EventId(idx),
        raw,
        ctx
      )
    })
    .collect()
}

/// The epoch as seen on a wall clock in
/// `timezone`.
pub fn epoch_local(
  timezone: Tz
) -> NaiveDateTime {
  epoch_resolved(timezone).local
}

fn epoch_resolved(
  timezone: Tz
) -> ResolvedTime {
  let instant = DateTime::<Utc>::UNIX_EPOCH;
  ResolvedTime {
    local: instant
      .with_timezone(&timezone)
      .naive_local(),
    instant
  }
}

// Built from the y/m/d components; going
// through an UTC instant would move the
// day in zones west of Greenwich.
fn parse_all_day(
  raw: &str,
  timezone: Tz
) -> Option<ResolvedTime> {
  let local = NaiveDate::parse_from_str(
    raw.trim(),
    "%Y-%m-%d"
  )
  .ok()?
  .and_time(NaiveTime::MIN);

  // Midnight can fall in a DST gap; the
  // wall clock stays at midnight.
  let instant =
    local_wall_clock(local, timezone)
      .map(|resolved| resolved.instant)
      .unwrap_or_else(|| local.and_utc());
  Some(ResolvedTime { local, instant })
}

fn parse_date_time(
  raw: &str,
  timezone: Tz
) -> Option<ResolvedTime> {
  let trimmed = raw.trim();

  if let Ok(instant) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(ResolvedTime {
      local:   instant
        .with_timezone(&timezone)
        .naive_local(),
      instant: instant
        .with_timezone(&Utc)
    });
  }

  NAIVE_DATE_TIME_FORMATS
    .iter()
    .find_map(|format| {
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
      .ok()
    })
    .and_then(|naive| {
      local_wall_clock(naive, timezone)
    })
}

fn local_wall_clock(
  naive: NaiveDateTime,
  timezone: Tz
) -> Option<ResolvedTime> {
  let resolve = |at: NaiveDateTime| {
    timezone
      .from_local_datetime(&at)
      .earliest()
      .map(|local| {
        ResolvedTime {
          local:   local.naive_local(),
          instant: local
            .with_timezone(&Utc)
        }
      })
  };

  // DST gap: move forward past it.
  resolve(naive).or_else(|| {
    resolve(naive + Duration::hours(1))
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };
  use chrono_tz::Tz;

  use super::{
    epoch_local,
    normalize,
    normalize_event
  };
  use crate::event::{
    DateSpec,
    EventField,
    EventId,
    RawEvent
  };
  use crate::layout::LayoutContext;

  fn at(
    y: i32,
    m: u32,
    d: u32,
    h: u32,
    min: u32
  ) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
      .and_hms_opt(h, min, 0)
      .expect("valid time")
  }

  #[test]
  fn all_day_is_local_midnight_in_every_zone() {
    let raw = RawEvent::new(
      Some("Holiday"),
      DateSpec::all_day("2024-01-15"),
      None
    );
    for timezone in [
      chrono_tz::UTC,
      chrono_tz::America::Los_Angeles,
      chrono_tz::Pacific::Auckland,
      chrono_tz::Asia::Kolkata
    ] {
      assert_eq!(
        normalize(
          &raw,
          EventField::Start,
          timezone
        ),
        at(2024, 1, 15, 0, 0),
        "zone {timezone}"
      );
    }
  }

  #[test]
  fn date_time_is_projected_into_zone() {
    let raw = RawEvent::new(
      None,
      DateSpec::timed(
        "2024-03-05T09:30:00Z"
      ),
      None
    );
    let moscow: Tz =
      chrono_tz::Europe::Moscow;
    assert_eq!(
      normalize(
        &raw,
        EventField::Start,
        moscow
      ),
      at(2024, 3, 5, 12, 30)
    );
  }

  #[test]
  fn date_time_without_offset_is_wall_clock() {
    let raw = RawEvent::new(
      None,
      DateSpec::timed(
        "2024-03-05T09:30:00"
      ),
      None
    );
    assert_eq!(
      normalize(
        &raw,
        EventField::Start,
        chrono_tz::America::New_York
      ),
      at(2024, 3, 5, 9, 30)
    );
  }

  #[test]
  fn date_time_in_dst_gap_moves_forward() {
    let raw = RawEvent::new(
      None,
      DateSpec::timed(
        "2024-03-10T02:30:00"
      ),
      None
    );
    assert_eq!(
      normalize(
        &raw,
        EventField::Start,
        chrono_tz::America::New_York
      ),
      at(2024, 3, 10, 3, 30)
    );
  }

  #[test]
  fn malformed_dates_fall_back_to_epoch() {
    let timezone =
      chrono_tz::Europe::Berlin;
    for spec in [
      DateSpec::default(),
      DateSpec::all_day("15/01/2024"),
      DateSpec::timed("tomorrow-ish")
    ] {
      let raw = RawEvent::new(
        None, spec, None
      );
      assert_eq!(
        normalize(
          &raw,
          EventField::Start,
          timezone
        ),
        at(1970, 1, 1, 1, 0)
      );
    }
    assert_eq!(
      epoch_local(timezone),
      at(1970, 1, 1, 1, 0)
    );
  }

  #[test]
  fn missing_end_defaults_to_half_an_hour() {
    let ctx =
      LayoutContext::new(chrono_tz::UTC);
    let raw = RawEvent::new(
      Some("Standup"),
      DateSpec::timed(
        "2024-03-05T10:00:00Z"
      ),
      None
    );
    let event = normalize_event(
      EventId(3),
      &raw,
      &ctx
    );
    assert_eq!(event.id, EventId(3));
    assert_eq!(
      event.end,
      at(2024, 3, 5, 10, 30)
    );
    assert!(!event.all_day);
  }

  #[test]
  fn end_before_start_is_raised() {
    let ctx =
      LayoutContext::new(chrono_tz::UTC);
    let raw = RawEvent::new(
      Some("Broken"),
      DateSpec::timed(
        "2024-03-05T10:00:00Z"
      ),
      Some(DateSpec::default())
    );
    let event = normalize_event(
      EventId(0),
      &raw,
      &ctx
    );
    assert_eq!(event.end, event.start);
  }

  #[test]
  fn blank_summary_uses_placeholder() {
    let ctx =
      LayoutContext::new(chrono_tz::UTC);
    for summary in [None, Some("  ")] {
      let raw = RawEvent::new(
        summary,
        DateSpec::all_day("2024-01-15"),
        None
      );
      let event = normalize_event(
        EventId(0),
        &raw,
        &ctx
      );
      assert_eq!(event.title, "Untitled");
      assert!(event.all_day);
    }
  }
}
