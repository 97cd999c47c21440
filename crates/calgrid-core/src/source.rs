//! Client side of the event source: query
//! construction, the HTTP fetch and
//! response decoding.

use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono::{
  NaiveDate,
  Weekday
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::event::RawEvent;
use crate::view::{
  ViewMode,
  ViewState
};

pub const DEFAULT_CALENDAR_ID: &str =
  "primary";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum QueryWindow {
  /// Month views ask for the whole grid.
  Range {
    start:         NaiveDate,
    end_exclusive: NaiveDate
  },
  /// Week and day views send the anchor
  /// and let the source expand it.
  Anchor(NaiveDate)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
  pub calendar_id: String,
  pub timezone:    Tz,
  pub mode:        ViewMode,
  pub window:      QueryWindow
}

impl FetchQuery {
  pub fn for_view(
    calendar_id: Option<&str>,
    timezone: Tz,
    state: &ViewState,
    week_start: Weekday
  ) -> Self {
    let window = match state.mode {
      | ViewMode::Month => {
        let range =
          state.visible_range(week_start);
        QueryWindow::Range {
          start:         range.start,
          end_exclusive: range
            .end_exclusive()
        }
      }
      | ViewMode::Week | ViewMode::Day => {
        QueryWindow::Anchor(state.anchor)
      }
    };

    Self {
      calendar_id: calendar_id
        .map(str::trim)
        .filter(|cid| !cid.is_empty())
        .unwrap_or(DEFAULT_CALENDAR_ID)
        .to_string(),
      timezone,
      mode: state.mode,
      window
    }
  }

  pub fn pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
      ("cid", self.calendar_id.clone()),
      (
        "tz",
        self.timezone.name().to_string()
      ),
      (
        "mode",
        self.mode.as_key().to_string()
      ),
    ];
    match self.window {
      | QueryWindow::Range {
        start,
        end_exclusive
      } => {
        pairs.push((
          "start",
          start
            .format(DATE_FORMAT)
            .to_string()
        ));
        pairs.push((
          "end",
          end_exclusive
            .format(DATE_FORMAT)
            .to_string()
        ));
      }
      | QueryWindow::Anchor(date) => {
        pairs.push((
          "date",
          date
            .format(DATE_FORMAT)
            .to_string()
        ));
      }
    }
    pairs
  }

  pub fn to_url(
    &self,
    endpoint: &str
  ) -> anyhow::Result<reqwest::Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
      bail!("event source endpoint is empty");
    }
    reqwest::Url::parse_with_params(
      endpoint,
      self.pairs()
    )
    .with_context(|| {
      format!(
        "invalid event source endpoint: \
         {endpoint}"
      )
    })
  }
}

#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(default)]
  events: Option<Vec<RawEvent>>,
  #[serde(default)]
  error:  Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
  Events(Vec<RawEvent>),
  Envelope(Envelope)
}

/// Decodes an `{"events": [...]}` or
/// `{"error": "..."}` response body. A
/// body with neither key holds no events.
pub fn decode_response(
  body: &str
) -> anyhow::Result<Vec<RawEvent>> {
  let envelope: Envelope =
    serde_json::from_str(body).context(
      "event source returned malformed \
       JSON"
    )?;
  unwrap_envelope(envelope)
}

/// Accepts either a bare event array or a
/// response envelope.
pub fn parse_events_document(
  text: &str
) -> anyhow::Result<Vec<RawEvent>> {
  let document: Document =
    serde_json::from_str(text).context(
      "failed to parse events document"
    )?;
  match document {
    | Document::Events(events) => {
      Ok(events)
    }
    | Document::Envelope(envelope) => {
      unwrap_envelope(envelope)
    }
  }
}

fn unwrap_envelope(
  envelope: Envelope
) -> anyhow::Result<Vec<RawEvent>> {
  if let Some(error) = envelope.error {
    return Err(anyhow!(
      "event source reported an error: \
       {error}"
    ));
  }
  Ok(envelope.events.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct HttpEventSource {
  endpoint: String,
  client:   reqwest::Client
}

impl HttpEventSource {
  pub fn new(
    endpoint: impl Into<String>,
    timeout: Duration
  ) -> anyhow::Result<Self> {
    let client =
      reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context(
          "failed building HTTP client \
           for the event source"
        )?;
    Ok(Self {
      endpoint: endpoint.into(),
      client
    })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  #[tracing::instrument(
    skip(self, query),
    fields(
      endpoint = %self.endpoint,
      mode = %query.mode
    )
  )]
  pub async fn fetch(
    &self,
    query: &FetchQuery
  ) -> anyhow::Result<Vec<RawEvent>> {
    let url =
      query.to_url(&self.endpoint)?;
    debug!(%url, "requesting events");

    let response = self
      .client
      .get(url.clone())
      .header(
        reqwest::header::ACCEPT,
        "application/json"
      )
      .send()
      .await
      .with_context(|| {
        format!(
          "failed requesting events from \
           {url}"
        )
      })?;

    let status = response.status();
    let body =
      response.text().await.with_context(
        || {
          format!(
            "failed reading event source \
             response body from {url}"
          )
        }
      )?;

    if !status.is_success() {
      warn!(
        %status,
        "event source returned an error \
         status"
      );
      bail!(
        "event source returned HTTP \
         {status}: {}",
        body.trim()
      );
    }

    let events = decode_response(&body)?;
    info!(
      events = events.len(),
      "fetched events"
    );
    Ok(events)
  }

  /// Runs `fetch` on a private
  /// current-thread runtime.
  pub fn fetch_blocking(
    &self,
    query: &FetchQuery
  ) -> anyhow::Result<Vec<RawEvent>> {
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed building async runtime \
         for the event source"
      )?
      .block_on(self.fetch(query))
  }
}
