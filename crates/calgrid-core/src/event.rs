use std::fmt;

use chrono::{
  DateTime,
  Duration,
  NaiveDateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct DateSpec {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub date:      Option<String>,
  #[serde(
    default,
    rename = "dateTime",
    skip_serializing_if = "Option::is_none"
  )]
  pub date_time: Option<String>
}

impl DateSpec {
  pub fn all_day(
    date: impl Into<String>
  ) -> Self {
    Self {
      date:      Some(date.into()),
      date_time: None
    }
  }

  pub fn timed(
    date_time: impl Into<String>
  ) -> Self {
    Self {
      date:      None,
      date_time: Some(date_time.into())
    }
  }

  pub fn is_all_day(&self) -> bool {
    self.date.is_some()
  }
}

/// An event exactly as the event source
/// delivered it. Unknown fields are
/// ignored.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct RawEvent {
  #[serde(default)]
  pub summary:     Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub location:    Option<String>,
  #[serde(default)]
  pub start:       DateSpec,
  #[serde(default)]
  pub end:         Option<DateSpec>
}

impl RawEvent {
  pub fn new(
    summary: Option<&str>,
    start: DateSpec,
    end: Option<DateSpec>
  ) -> Self {
    Self {
      summary: summary
        .map(str::to_string),
      description: None,
      location: None,
      start,
      end
    }
  }

  pub fn field(
    &self,
    field: EventField
  ) -> Option<&DateSpec> {
    match field {
      | EventField::Start => {
        Some(&self.start)
      }
      | EventField::End => {
        self.end.as_ref()
      }
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum EventField {
  Start,
  End
}

/// Position of an event in the input of
/// the current render cycle.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub usize);

impl EventId {
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for EventId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(f, "#{}", self.0)
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
pub struct NormalizedEvent {
  pub id:            EventId,
  pub title:         String,
  /// Wall clock in the rendering timezone.
  pub start:         NaiveDateTime,
  pub end:           NaiveDateTime,
  /// The instant `start` denotes; events
  /// are ordered by it.
  pub start_instant: DateTime<Utc>,
  pub all_day:       bool
}

impl NormalizedEvent {
  pub fn duration(&self) -> Duration {
    self.end - self.start
  }
}
