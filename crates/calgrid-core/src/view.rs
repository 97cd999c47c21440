use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Days,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

pub const MONTH_GRID_DAYS: i64 = 42;
pub const WEEK_DAYS: i64 = 7;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Month,
  Week,
  Day
}

impl ViewMode {
  pub fn all() -> [Self; 3] {
    [Self::Month, Self::Week, Self::Day]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Month => "Month",
      | Self::Week => "Week",
      | Self::Day => "Day"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "month" => Some(Self::Month),
      | "week" => Some(Self::Week),
      | "day" => Some(Self::Day),
      | _ => None
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for ViewMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      anyhow!(
        "unknown view mode '{s}' \
         (expected month, week or day)"
      )
    })
  }
}

/// Inclusive day window shown by a view.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct VisibleRange {
  pub start: NaiveDate,
  pub end:   NaiveDate
}

impl VisibleRange {
  pub fn len_days(&self) -> i64 {
    (self.end - self.start).num_days()
      + 1
  }

  pub fn contains(
    &self,
    day: NaiveDate
  ) -> bool {
    self.start <= day && day <= self.end
  }

  pub fn end_exclusive(
    &self
  ) -> NaiveDate {
    add_days(self.end, 1)
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = NaiveDate>
  {
    let start = self.start;
    (0..self.len_days()).map(
      move |offset| {
        add_days(start, offset)
      }
    )
  }
}

pub fn visible_range(
  mode: ViewMode,
  anchor: NaiveDate,
  week_start: Weekday
) -> VisibleRange {
  let (start, days) = match mode {
    | ViewMode::Month => {
      let first = first_day_of_month(
        anchor.year(),
        anchor.month()
      );
      (
        start_of_week(first, week_start),
        MONTH_GRID_DAYS
      )
    }
    | ViewMode::Week => {
      (
        start_of_week(anchor, week_start),
        WEEK_DAYS
      )
    }
    | ViewMode::Day => (anchor, 1)
  };

  VisibleRange {
    start,
    end: add_days(start, days - 1)
  }
}

/// Mode and anchor date held by the
/// interaction layer between renders.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct ViewState {
  pub mode:   ViewMode,
  pub anchor: NaiveDate
}

impl ViewState {
  pub fn new(
    mode: ViewMode,
    anchor: NaiveDate
  ) -> Self {
    Self { mode, anchor }
  }

  pub fn visible_range(
    &self,
    week_start: Weekday
  ) -> VisibleRange {
    visible_range(
      self.mode,
      self.anchor,
      week_start
    )
  }

  pub fn navigate(
    &mut self,
    step: i64
  ) {
    self.anchor = match self.mode {
      | ViewMode::Month => {
        shift_months(self.anchor, step)
      }
      | ViewMode::Week => {
        step
          .checked_mul(WEEK_DAYS)
          .map(|days| {
            add_days(self.anchor, days)
          })
          .unwrap_or(self.anchor)
      }
      | ViewMode::Day => {
        add_days(self.anchor, step)
      }
    };
    tracing::debug!(
      mode = %self.mode,
      step,
      anchor = %self.anchor,
      "navigated view"
    );
  }

  pub fn previous(&mut self) {
    self.navigate(-1);
  }

  pub fn next(&mut self) {
    self.navigate(1);
  }

  pub fn switch_mode(
    &mut self,
    mode: ViewMode
  ) {
    self.mode = mode;
  }

  /// A click on a month cell or a week
  /// column opens that day.
  pub fn open_day(
    &mut self,
    day: NaiveDate
  ) {
    self.mode = ViewMode::Day;
    self.anchor = day;
  }

  pub fn pick_date(
    &mut self,
    day: NaiveDate
  ) {
    self.open_day(day);
  }

  pub fn period_label(
    &self,
    week_start: Weekday
  ) -> String {
    match self.mode {
      | ViewMode::Month => {
        self
          .anchor
          .format("%B %Y")
          .to_string()
      }
      | ViewMode::Week => {
        let range =
          self.visible_range(week_start);
        format!(
          "{} – {}",
          range.start.format("%d %b"),
          range.end.format("%d %b")
        )
      }
      | ViewMode::Day => {
        self
          .anchor
          .format("%d %B %Y")
          .to_string()
      }
    }
  }
}

pub fn week_start_day(
  raw: &str
) -> Weekday {
  if raw
    .trim()
    .eq_ignore_ascii_case("sunday")
  {
    Weekday::Sun
  } else {
    Weekday::Mon
  }
}

pub fn weekday_labels(
  week_start: Weekday
) -> [&'static str; 7] {
  match week_start {
    | Weekday::Sun => {
      [
        "Sun", "Mon", "Tue", "Wed",
        "Thu", "Fri", "Sat"
      ]
    }
    | _ => {
      [
        "Mon", "Tue", "Wed", "Thu",
        "Fri", "Sat", "Sun"
      ]
    }
  }
}

/// Moves by whole months, clamping the
/// day to the target month's length. A
/// shift past the calendar's reach leaves
/// `date` unchanged.
pub fn shift_months(
  date: NaiveDate,
  months: i64
) -> NaiveDate {
  let Some(total) = (i64::from(date.year())
    * 12
    + i64::from(date.month0()))
  .checked_add(months) else {
    return date;
  };
  let Ok(year) =
    i32::try_from(total.div_euclid(12))
  else {
    return date;
  };
  let month = total.rem_euclid(12) as u32 + 1;

  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  let magnitude = Days::new(days.unsigned_abs());
  let shifted = if days >= 0 {
    date.checked_add_days(magnitude)
  } else {
    date.checked_sub_days(magnitude)
  };
  shifted.unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}
