//! The layout pipeline: normalize, then
//! partition, then compute geometry.

use std::collections::BTreeMap;

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::config::Config;
use crate::event::{
  EventId,
  NormalizedEvent,
  RawEvent
};
use crate::geometry::{
  DayIndicator,
  EventGeometry,
  OverlapPolicy,
  day_geometry,
  day_indicator
};
use crate::normalize::normalize_events;
use crate::partition::partition;
use crate::view::{
  ViewMode,
  ViewState,
  VisibleRange,
  week_start_day
};

pub const DEFAULT_MAX_DOTS: usize = 4;
pub const DEFAULT_MIN_DURATION_MINUTES:
  u32 = 15;
pub const DEFAULT_EVENT_DURATION_MINUTES:
  u32 = 30;
pub const DEFAULT_UNTITLED: &str =
  "Untitled";

/// Everything besides the events and the
/// view state that shapes a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutContext {
  pub timezone:                 Tz,
  pub week_start:               Weekday,
  pub max_dots:                 usize,
  pub min_duration_minutes:     u32,
  pub default_duration_minutes: u32,
  pub overlap:                  OverlapPolicy,
  pub untitled:                 String
}

impl LayoutContext {
  pub fn new(timezone: Tz) -> Self {
    Self {
      timezone,
      week_start: Weekday::Mon,
      max_dots: DEFAULT_MAX_DOTS,
      min_duration_minutes:
        DEFAULT_MIN_DURATION_MINUTES,
      default_duration_minutes:
        DEFAULT_EVENT_DURATION_MINUTES,
      overlap: OverlapPolicy::Stack,
      untitled: DEFAULT_UNTITLED
        .to_string()
    }
  }

  pub fn from_config(
    config: &Config,
    timezone: Tz
  ) -> Self {
    let policies = &config.policies;
    Self {
      timezone,
      week_start: week_start_day(
        &policies.week_start
      ),
      max_dots: policies.max_dots,
      min_duration_minutes: policies
        .min_duration_minutes,
      default_duration_minutes: policies
        .default_duration_minutes,
      overlap: policies.overlap,
      untitled: policies.untitled.clone()
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutBody {
  Month {
    indicators:
      BTreeMap<NaiveDate, DayIndicator>
  },
  Timeline {
    columns:
      BTreeMap<NaiveDate, Vec<EventGeometry>>
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct Layout {
  pub mode:          ViewMode,
  pub anchor:        NaiveDate,
  pub range:         VisibleRange,
  /// Indexed by `EventId`.
  pub events:        Vec<NormalizedEvent>,
  pub outside_range: usize,
  pub body:          LayoutBody
}

impl Layout {
  pub fn event(
    &self,
    id: EventId
  ) -> Option<&NormalizedEvent> {
    self.events.get(id.index())
  }

  pub fn indicator(
    &self,
    day: NaiveDate
  ) -> Option<&DayIndicator> {
    match &self.body {
      | LayoutBody::Month {
        indicators
      } => indicators.get(&day),
      | LayoutBody::Timeline {
        ..
      } => None
    }
  }

  pub fn column(
    &self,
    day: NaiveDate
  ) -> &[EventGeometry] {
    match &self.body {
      | LayoutBody::Timeline {
        columns
      } => {
        columns
          .get(&day)
          .map(Vec::as_slice)
          .unwrap_or(&[])
      }
      | LayoutBody::Month {
        ..
      } => &[]
    }
  }

  /// Geometry of `day` paired with the
  /// event it positions.
  pub fn blocks(
    &self,
    day: NaiveDate
  ) -> Vec<(&EventGeometry, &NormalizedEvent)>
  {
    self
      .column(day)
      .iter()
      .filter_map(|geometry| {
        self
          .event(geometry.event)
          .map(|event| (geometry, event))
      })
      .collect()
  }
}

#[tracing::instrument(
  skip_all,
  fields(
    mode = %state.mode,
    anchor = %state.anchor,
    events = raws.len()
  )
)]
pub fn compute_layout(
  raws: &[RawEvent],
  state: &ViewState,
  ctx: &LayoutContext
) -> Layout {
  let events =
    normalize_events(raws, ctx);
  let partitioned = partition(
    &events,
    state.mode,
    state.anchor,
    ctx.week_start
  );

  let body = match state.mode {
    | ViewMode::Month => {
      let focus_month = (
        state.anchor.year(),
        state.anchor.month()
      );
      let indicators = partitioned
        .buckets
        .iter()
        .map(|(day, bucket)| {
          let in_focus_month =
            (day.year(), day.month())
              == focus_month;
          (
            *day,
            day_indicator(
              *day,
              bucket,
              ctx.max_dots,
              in_focus_month
            )
          )
        })
        .collect();
      LayoutBody::Month { indicators }
    }
    | ViewMode::Week | ViewMode::Day => {
      let columns = partitioned
        .buckets
        .iter()
        .map(|(day, bucket)| {
          (
            *day,
            day_geometry(
              *day,
              bucket,
              ctx.min_duration_minutes,
              ctx.overlap
            )
          )
        })
        .collect();
      LayoutBody::Timeline { columns }
    }
  };

  tracing::debug!(
    days = partitioned.buckets.len(),
    outside_range =
      partitioned.outside_range,
    "layout computed"
  );

  Layout {
    mode: state.mode,
    anchor: state.anchor,
    range: partitioned.range,
    events,
    outside_range: partitioned
      .outside_range,
    body
  }
}
