use std::collections::BTreeMap;

use chrono::{
  NaiveDate,
  Weekday
};

use crate::event::NormalizedEvent;
use crate::view::{
  ViewMode,
  VisibleRange,
  visible_range
};

pub type DayBuckets =
  BTreeMap<NaiveDate, Vec<NormalizedEvent>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
  pub range:         VisibleRange,
  /// One entry per visible day, empty
  /// days included.
  pub buckets:       DayBuckets,
  pub outside_range: usize
}

impl Partition {
  pub fn bucket(
    &self,
    day: NaiveDate
  ) -> &[NormalizedEvent] {
    self
      .buckets
      .get(&day)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }
}

/// Orders by start instant. Stable: events
/// that start together keep their input
/// order.
pub fn sort_by_start(
  events: &mut [NormalizedEvent]
) {
  events.sort_by_key(|event| {
    event.start_instant
  });
}

#[tracing::instrument(
  level = "debug",
  skip(events),
  fields(events = events.len())
)]
pub fn partition(
  events: &[NormalizedEvent],
  mode: ViewMode,
  anchor: NaiveDate,
  week_start: Weekday
) -> Partition {
  let range = visible_range(
    mode, anchor, week_start
  );

  let mut sorted = events.to_vec();
  sort_by_start(&mut sorted);

  let mut buckets = range
    .days()
    .map(|day| (day, Vec::new()))
    .collect::<DayBuckets>();
  let mut outside_range = 0_usize;

  // An event lives only in the bucket of
  // the day it starts on.
  for event in sorted {
    match buckets
      .get_mut(&event.start.date())
    {
      | Some(bucket) => bucket.push(event),
      | None => {
        outside_range =
          outside_range.saturating_add(1);
      }
    }
  }

  tracing::debug!(
    start = %range.start,
    end = %range.end,
    days = buckets.len(),
    outside_range,
    "partitioned events"
  );

  Partition {
    range,
    buckets,
    outside_range
  }
}
