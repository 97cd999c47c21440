use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  NaiveDate,
  NaiveDateTime,
  NaiveTime
};
use serde::{
  Deserialize,
  Serialize
};

use crate::event::{
  EventId,
  NormalizedEvent
};

pub const MINUTES_PER_DAY: u32 = 1440;

/// How blocks that share a time range are
/// laid out relative to each other.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
  /// Every block spans the full column
  /// width; overlapping blocks cover each
  /// other.
  #[default]
  Stack,
  /// Overlapping blocks are placed side by
  /// side.
  Columns
}

impl OverlapPolicy {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Stack => "stack",
      | Self::Columns => "columns"
    }
  }
}

impl FromStr for OverlapPolicy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "stack" => Ok(Self::Stack),
      | "columns" => Ok(Self::Columns),
      | other => {
        Err(anyhow!(
          "unknown overlap policy \
           '{other}' (expected stack or \
           columns)"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct EventGeometry {
  pub event:              EventId,
  pub top_offset_minutes: u32,
  pub duration_minutes:   u32,
  pub column:             usize,
  pub column_count:       usize
}

impl EventGeometry {
  pub fn bottom_minutes(&self) -> u32 {
    self.top_offset_minutes
      + self.duration_minutes
  }

  fn overlaps(
    &self,
    other: &EventGeometry
  ) -> bool {
    self.top_offset_minutes
      < other.bottom_minutes()
      && other.top_offset_minutes
        < self.bottom_minutes()
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct DayIndicator {
  pub day:            NaiveDate,
  pub visible_count:  usize,
  pub overflow_count: usize,
  /// Every event of the day, earliest
  /// first.
  pub events:         Vec<EventId>,
  pub in_focus_month: bool
}

impl DayIndicator {
  pub fn total(&self) -> usize {
    self.events.len()
  }

  pub fn visible_events(
    &self
  ) -> &[EventId] {
    &self.events[..self.split_at()]
  }

  pub fn overflow_events(
    &self
  ) -> &[EventId] {
    &self.events[self.split_at()..]
  }

  /// Never past the end of `events`.
  fn split_at(&self) -> usize {
    self.visible_count.min(self.events.len())
  }
}

/// Minutes between the midnight that
/// opens `day` and `at`. Negative or past
/// 1440 when `at` falls on another day.
pub fn minutes_from_midnight(
  day: NaiveDate,
  at: NaiveDateTime
) -> i64 {
  (at - day.and_time(NaiveTime::MIN))
    .num_minutes()
}

fn clamp_to_day(minutes: i64) -> u32 {
  minutes
    .clamp(0, i64::from(MINUTES_PER_DAY))
    as u32
}

pub fn timed_geometry(
  day: NaiveDate,
  event: &NormalizedEvent,
  min_duration_minutes: u32
) -> EventGeometry {
  let start = clamp_to_day(
    minutes_from_midnight(
      day,
      event.start
    )
  );
  let end = clamp_to_day(
    minutes_from_midnight(day, event.end)
  );

  EventGeometry {
    event:              event.id,
    top_offset_minutes: start,
    duration_minutes:   end
      .saturating_sub(start)
      .max(min_duration_minutes),
    column:             0,
    column_count:       1
  }
}

/// Geometry for one day bucket, in bucket
/// order.
pub fn day_geometry(
  day: NaiveDate,
  bucket: &[NormalizedEvent],
  min_duration_minutes: u32,
  overlap: OverlapPolicy
) -> Vec<EventGeometry> {
  let mut blocks = bucket
    .iter()
    .map(|event| {
      timed_geometry(
        day,
        event,
        min_duration_minutes
      )
    })
    .collect::<Vec<_>>();

  if overlap == OverlapPolicy::Columns {
    assign_columns(&mut blocks);
  }

  tracing::trace!(
    %day,
    blocks = blocks.len(),
    overlap = overlap.as_key(),
    "computed day geometry"
  );
  blocks
}

// Greedy interval colouring. Blocks arrive
// sorted by top offset; each one takes the
// first column that is free at its top.
// Column counts are shared by every block
// of a cluster of transitively
// overlapping blocks.
fn assign_columns(
  blocks: &mut [EventGeometry]
) {
  let mut cluster_start = 0_usize;
  let mut cluster_bottom = 0_u32;
  let mut column_ends =
    Vec::<u32>::new();

  for idx in 0..blocks.len() {
    let top =
      blocks[idx].top_offset_minutes;
    if idx > cluster_start
      && top >= cluster_bottom
    {
      close_cluster(
        &mut blocks
          [cluster_start..idx],
        column_ends.len()
      );
      cluster_start = idx;
      column_ends.clear();
    }

    let bottom =
      blocks[idx].bottom_minutes();
    let column = column_ends
      .iter()
      .position(|end| *end <= top)
      .unwrap_or_else(|| {
        column_ends.push(top);
        column_ends.len() - 1
      });
    column_ends[column] = bottom;
    blocks[idx].column = column;

    cluster_bottom = if idx
      == cluster_start
    {
      bottom
    } else {
      cluster_bottom.max(bottom)
    };
  }

  let count = column_ends.len();
  close_cluster(
    &mut blocks[cluster_start..],
    count
  );
}

fn close_cluster(
  cluster: &mut [EventGeometry],
  column_count: usize
) {
  for block in cluster {
    block.column_count =
      column_count.max(1);
  }
}

pub fn day_indicator(
  day: NaiveDate,
  bucket: &[NormalizedEvent],
  max_dots: usize,
  in_focus_month: bool
) -> DayIndicator {
  let total = bucket.len();
  let visible_count = total.min(max_dots);

  DayIndicator {
    day,
    visible_count,
    overflow_count: total
      .saturating_sub(max_dots),
    events: bucket
      .iter()
      .map(|event| event.id)
      .collect(),
    in_focus_month
  }
}

/// True when no two blocks in the same
/// column overlap.
pub fn columns_are_disjoint(
  blocks: &[EventGeometry]
) -> bool {
  blocks.iter().enumerate().all(
    |(idx, block)| {
      blocks[idx + 1..].iter().all(
        |other| {
          other.column != block.column
            || !block.overlaps(other)
        }
      )
    }
  )
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };

  use super::{
    DayIndicator,
    OverlapPolicy,
    columns_are_disjoint,
    day_geometry,
    day_indicator,
    timed_geometry
  };
  use crate::event::{
    EventId,
    NormalizedEvent
  };

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d)
      .expect("valid date")
  }

  fn at(
    d: u32,
    h: u32,
    m: u32
  ) -> NaiveDateTime {
    day(d)
      .and_hms_opt(h, m, 0)
      .expect("valid time")
  }

  fn event(
    id: usize,
    start: NaiveDateTime,
    end: NaiveDateTime
  ) -> NormalizedEvent {
    NormalizedEvent {
      id: EventId(id),
      title: format!("event {id}"),
      start,
      end,
      start_instant: start.and_utc(),
      all_day: false
    }
  }

  #[test]
  fn end_past_midnight_is_clamped() {
    let late = event(
      0,
      at(5, 23, 50),
      at(6, 0, 20)
    );
    let geometry =
      timed_geometry(day(5), &late, 15);
    assert_eq!(
      geometry.top_offset_minutes,
      1430
    );
    assert_eq!(
      geometry.duration_minutes,
      15
    );
  }

  #[test]
  fn zero_length_event_gets_minimum_height() {
    let instant = event(
      0,
      at(5, 9, 0),
      at(5, 9, 0)
    );
    let geometry =
      timed_geometry(day(5), &instant, 15);
    assert_eq!(
      geometry.top_offset_minutes,
      540
    );
    assert_eq!(
      geometry.duration_minutes,
      15
    );
  }

  #[test]
  fn all_day_event_fills_the_day() {
    let mut holiday = event(
      0,
      at(5, 0, 0),
      at(6, 0, 0)
    );
    holiday.all_day = true;
    let geometry =
      timed_geometry(day(5), &holiday, 15);
    assert_eq!(
      geometry.top_offset_minutes,
      0
    );
    assert_eq!(
      geometry.duration_minutes,
      1440
    );
  }

  #[test]
  fn stack_policy_leaves_overlaps_alone() {
    let bucket = vec![
      event(0, at(5, 9, 0), at(5, 10, 0)),
      event(1, at(5, 9, 30), at(5, 11, 0))
    ];
    let blocks = day_geometry(
      day(5),
      &bucket,
      15,
      OverlapPolicy::Stack
    );
    assert!(blocks.iter().all(|block| {
      block.column == 0
        && block.column_count == 1
    }));
  }

  #[test]
  fn column_policy_separates_overlapping_blocks() {
    let bucket = vec![
      event(0, at(5, 9, 0), at(5, 10, 0)),
      event(1, at(5, 9, 30), at(5, 11, 0)),
      event(2, at(5, 10, 0), at(5, 10, 30)),
      event(3, at(5, 13, 0), at(5, 14, 0))
    ];
    let blocks = day_geometry(
      day(5),
      &bucket,
      15,
      OverlapPolicy::Columns
    );

    assert!(columns_are_disjoint(&blocks));
    let columns = blocks
      .iter()
      .map(|block| {
        (block.column, block.column_count)
      })
      .collect::<Vec<_>>();
    assert_eq!(
      columns,
      vec![(0, 2), (1, 2), (0, 2), (0, 1)]
    );
  }

  #[test]
  fn indicator_caps_visible_dots() {
    let bucket = (0..6)
      .map(|idx| {
        event(
          idx,
          at(5, 8 + idx as u32, 0),
          at(5, 9 + idx as u32, 0)
        )
      })
      .collect::<Vec<_>>();
    let indicator =
      day_indicator(day(5), &bucket, 4, true);
    assert_eq!(indicator.visible_count, 4);
    assert_eq!(indicator.overflow_count, 2);
    assert_eq!(
      indicator.visible_events(),
      &[
        EventId(0),
        EventId(1),
        EventId(2),
        EventId(3)
      ]
    );
    assert_eq!(
      indicator.overflow_events(),
      &[EventId(4), EventId(5)]
    );

    let quiet =
      day_indicator(day(6), &[], 4, false);
    assert_eq!(quiet.visible_count, 0);
    assert_eq!(quiet.overflow_count, 0);
  }

  #[test]
  fn inconsistent_indicator_does_not_panic() {
    let indicator = DayIndicator {
      day:            day(7),
      visible_count:  5,
      overflow_count: 0,
      events:         vec![
        EventId(0),
        EventId(1),
      ],
      in_focus_month: true
    };
    assert_eq!(
      indicator.visible_events(),
      &[EventId(0), EventId(1)]
    );
    assert!(
      indicator
        .overflow_events()
        .is_empty()
    );
  }

  #[test]
  fn overlap_policy_parses() {
    assert_eq!(
      "Columns"
        .parse::<OverlapPolicy>()
        .expect("parse policy"),
      OverlapPolicy::Columns
    );
    assert!(
      "grid"
        .parse::<OverlapPolicy>()
        .is_err()
    );
  }
}
