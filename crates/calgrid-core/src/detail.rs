use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};

use crate::event::{
  EventId,
  NormalizedEvent,
  RawEvent
};
use crate::layout::Layout;

const TIME_FORMAT: &str = "%H:%M";

/// What the interaction layer shows when an
/// event is clicked.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct EventDetail {
  pub id:          EventId,
  pub title:       String,
  pub time:        Option<String>,
  pub location:    Option<String>,
  pub description: Option<String>
}

pub fn time_range(
  event: &NormalizedEvent
) -> String {
  format!(
    "{} – {}",
    event.start.format(TIME_FORMAT),
    event.end.format(TIME_FORMAT)
  )
}

pub fn event_detail(
  event: &NormalizedEvent,
  raw: &RawEvent
) -> EventDetail {
  EventDetail {
    id:          event.id,
    title:       event.title.clone(),
    time:        (!event.all_day)
      .then(|| time_range(event)),
    location:    non_blank(
      raw.location.as_deref()
    ),
    description: non_blank(
      raw.description.as_deref()
    )
  }
}

/// `raws` must be the slice the layout was
/// computed from.
pub fn detail_for(
  layout: &Layout,
  raws: &[RawEvent],
  id: EventId
) -> Option<EventDetail> {
  let event = layout.event(id)?;
  let raw = raws.get(id.index())?;
  Some(event_detail(event, raw))
}

pub fn dot_tooltip(
  event: &NormalizedEvent,
  raw: &RawEvent
) -> String {
  let time = if event.all_day {
    String::new()
  } else {
    event
      .start
      .format(TIME_FORMAT)
      .to_string()
  };
  format!(
    "{time} {}",
    raw.summary.as_deref().unwrap_or("")
  )
  .trim()
  .to_string()
}

/// Summaries of every event of a month
/// cell, one per line, when the cell
/// overflows.
pub fn overflow_tooltip(
  layout: &Layout,
  raws: &[RawEvent],
  day: NaiveDate
) -> Option<String> {
  let indicator = layout.indicator(day)?;
  if indicator.overflow_count == 0 {
    return None;
  }

  Some(
    indicator
      .events
      .iter()
      .filter_map(|id| raws.get(id.index()))
      .map(|raw| {
        raw.summary.as_deref().unwrap_or("")
      })
      .collect::<Vec<_>>()
      .join("\n")
  )
}

fn non_blank(
  value: Option<&str>
) -> Option<String> {
  value
    .map(str::trim)
    .filter(|text| !text.is_empty())
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    detail_for,
    dot_tooltip,
    overflow_tooltip
  };
  use crate::event::{
    DateSpec,
    EventId,
    RawEvent
  };
  use crate::layout::{
    LayoutContext,
    compute_layout
  };
  use crate::view::{
    ViewMode,
    ViewState
  };

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d)
      .expect("valid date")
  }

  fn busy_day() -> Vec<RawEvent> {
    let mut raws = (0..5)
      .map(|idx| {
        RawEvent::new(
          Some(&format!("Call {idx}")),
          DateSpec::timed(format!(
            "2024-03-05T1{idx}:00:00Z"
          )),
          None
        )
      })
      .collect::<Vec<_>>();
    let mut offsite = RawEvent::new(
      Some("Offsite"),
      DateSpec::all_day("2024-03-06"),
      None
    );
    offsite.location =
      Some("Main office".to_string());
    offsite.description =
      Some("  ".to_string());
    raws.push(offsite);
    raws
  }

  #[test]
  fn detail_for_timed_and_all_day_events() {
    let raws = busy_day();
    let layout = compute_layout(
      &raws,
      &ViewState::new(
        ViewMode::Month,
        day(5)
      ),
      &LayoutContext::new(chrono_tz::UTC)
    );

    let call = detail_for(
      &layout,
      &raws,
      EventId(1)
    )
    .expect("known event");
    assert_eq!(call.title, "Call 1");
    assert_eq!(
      call.time.as_deref(),
      Some("11:00 – 11:30")
    );

    let offsite = detail_for(
      &layout,
      &raws,
      EventId(5)
    )
    .expect("known event");
    assert_eq!(offsite.time, None);
    assert_eq!(
      offsite.location.as_deref(),
      Some("Main office")
    );
    assert_eq!(offsite.description, None);

    assert!(
      detail_for(
        &layout,
        &raws,
        EventId(42)
      )
      .is_none()
    );
  }

  #[test]
  fn tooltips() {
    let raws = busy_day();
    let layout = compute_layout(
      &raws,
      &ViewState::new(
        ViewMode::Month,
        day(5)
      ),
      &LayoutContext::new(chrono_tz::UTC)
    );

    let first = layout
      .event(EventId(0))
      .expect("event");
    assert_eq!(
      dot_tooltip(first, &raws[0]),
      "10:00 Call 0"
    );
    let offsite = layout
      .event(EventId(5))
      .expect("event");
    assert_eq!(
      dot_tooltip(offsite, &raws[5]),
      "Offsite"
    );

    assert_eq!(
      overflow_tooltip(
        &layout,
        &raws,
        day(5)
      )
      .as_deref(),
      Some(
        "Call 0\nCall 1\nCall 2\nCall \
         3\nCall 4"
      )
    );
    assert_eq!(
      overflow_tooltip(
        &layout,
        &raws,
        day(6)
      ),
      None
    );
  }
}
