use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::geometry::{
  MINUTES_PER_DAY,
  OverlapPolicy
};
use crate::layout::{
  DEFAULT_EVENT_DURATION_MINUTES,
  DEFAULT_MAX_DOTS,
  DEFAULT_MIN_DURATION_MINUTES,
  DEFAULT_UNTITLED
};
use crate::source::DEFAULT_CALENDAR_ID;
use crate::view::ViewMode;

const CONFIG_ENV_VAR: &str =
  "CALGRID_CONFIG";
const CONFIG_DIR_NAME: &str = "calgrid";
const CONFIG_FILE_NAME: &str =
  "calgrid.toml";

pub const OVERRIDE_KEYS: [&str; 13] = [
  "version",
  "timezone",
  "default_mode",
  "calendar_id",
  "color",
  "policies.week_start",
  "policies.max_dots",
  "policies.min_duration_minutes",
  "policies.default_duration_minutes",
  "policies.overlap",
  "policies.untitled",
  "source.endpoint",
  "source.timeout_secs"
];

fn default_version() -> u32 {
  1
}

fn default_true() -> bool {
  true
}

fn default_view_mode() -> ViewMode {
  ViewMode::Month
}

fn default_calendar_id() -> String {
  DEFAULT_CALENDAR_ID.to_string()
}

fn default_week_start() -> String {
  "monday".to_string()
}

fn default_max_dots() -> usize {
  DEFAULT_MAX_DOTS
}

fn default_min_duration_minutes() -> u32
{
  DEFAULT_MIN_DURATION_MINUTES
}

fn default_duration_minutes() -> u32 {
  DEFAULT_EVENT_DURATION_MINUTES
}

fn default_untitled() -> String {
  DEFAULT_UNTITLED.to_string()
}

fn default_endpoint() -> String {
  "http://localhost:8000/api/calendar"
    .to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct Config {
  #[serde(default = "default_version")]
  pub version:      u32,
  #[serde(default)]
  pub timezone:     Option<String>,
  #[serde(default = "default_view_mode")]
  pub default_mode: ViewMode,
  #[serde(
    default = "default_calendar_id"
  )]
  pub calendar_id:  String,
  #[serde(default = "default_true")]
  pub color:        bool,
  #[serde(default)]
  pub policies:     Policies,
  #[serde(default)]
  pub source:       SourceConfig,
  #[serde(skip)]
  pub loaded_from:  Option<PathBuf>
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct Policies {
  #[serde(default = "default_week_start")]
  pub week_start:               String,
  #[serde(default = "default_max_dots")]
  pub max_dots:                 usize,
  #[serde(
    default = "default_min_duration_minutes"
  )]
  pub min_duration_minutes:     u32,
  #[serde(
    default = "default_duration_minutes"
  )]
  pub default_duration_minutes: u32,
  #[serde(default)]
  pub overlap:                  OverlapPolicy,
  #[serde(default = "default_untitled")]
  pub untitled:                 String
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct SourceConfig {
  #[serde(default = "default_endpoint")]
  pub endpoint:     String,
  #[serde(
    default = "default_timeout_secs"
  )]
  pub timeout_secs: u64
}

impl Default for Config {
  fn default() -> Self {
    Self {
      version:      default_version(),
      timezone:     None,
      default_mode: default_view_mode(),
      calendar_id:  default_calendar_id(),
      color:        default_true(),
      policies:     Policies::default(),
      source:       SourceConfig::default(),
      loaded_from:  None
    }
  }
}

impl Default for Policies {
  fn default() -> Self {
    Self {
      week_start:               default_week_start(),
      max_dots:                 default_max_dots(),
      min_duration_minutes:
        default_min_duration_minutes(),
      default_duration_minutes:
        default_duration_minutes(),
      overlap:                  OverlapPolicy::default(),
      untitled:                 default_untitled()
    }
  }
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      endpoint:     default_endpoint(),
      timeout_secs: default_timeout_secs()
    }
  }
}

impl SourceConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(config_override)
    else {
      info!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut config =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "invalid config file {}",
            path.display()
          )
        })?;
    config.loaded_from = Some(path);
    Ok(config)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut config =
      toml::from_str::<Self>(text)
        .context(
          "failed parsing config TOML"
        )?;
    config.sanitize();
    debug!(
      version = config.version,
      timezone = ?config.timezone,
      week_start = %config.policies.week_start,
      overlap = config.policies.overlap.as_key(),
      "parsed config"
    );
    Ok(config)
  }

  /// Applies dotted `key=value` overrides,
  /// then sanitises again.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      self
        .apply_override(
          key.trim(),
          value.trim()
        )
        .with_context(|| {
          format!(
            "invalid override \
             {key}={value}"
          )
        })?;
    }
    self.sanitize();
    Ok(())
  }

  fn apply_override(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "version" => {
        self.version = value.parse()?;
      }
      | "timezone" => {
        self.timezone = (!value
          .is_empty())
        .then(|| value.to_string());
      }
      | "default_mode" => {
        self.default_mode =
          value.parse()?;
      }
      | "calendar_id" => {
        self.calendar_id =
          value.to_string();
      }
      | "color" => {
        self.color = parse_bool(value);
      }
      | "policies.week_start" => {
        self.policies.week_start =
          value.to_string();
      }
      | "policies.max_dots" => {
        self.policies.max_dots =
          value.parse()?;
      }
      | "policies.min_duration_minutes" => {
        self
          .policies
          .min_duration_minutes =
          value.parse()?;
      }
      | "policies.default_duration_minutes" => {
        self
          .policies
          .default_duration_minutes =
          value.parse()?;
      }
      | "policies.overlap" => {
        self.policies.overlap =
          value.parse()?;
      }
      | "policies.untitled" => {
        self.policies.untitled =
          value.to_string();
      }
      | "source.endpoint" => {
        self.source.endpoint =
          value.to_string();
      }
      | "source.timeout_secs" => {
        self.source.timeout_secs =
          value.parse()?;
      }
      | other => {
        return Err(anyhow!(
          "unknown config key '{other}' \
           (known keys: {})",
          OVERRIDE_KEYS.join(", ")
        ));
      }
    }
    Ok(())
  }

  pub fn sanitize(&mut self) {
    let policies = &mut self.policies;
    let week_start = policies
      .week_start
      .trim()
      .to_ascii_lowercase();
    policies.week_start =
      match week_start.as_str() {
        | "monday" | "sunday" => {
          week_start.clone()
        }
        | "" => default_week_start(),
        | other => {
          warn!(
            week_start = %other,
            "unsupported week start; using \
             monday"
          );
          default_week_start()
        }
      };

    if policies.max_dots == 0 {
      policies.max_dots =
        default_max_dots();
    }

    if policies.min_duration_minutes == 0 {
      policies.min_duration_minutes =
        default_min_duration_minutes();
    }
    if policies.min_duration_minutes
      > MINUTES_PER_DAY
    {
      policies.min_duration_minutes =
        MINUTES_PER_DAY;
    }

    if policies.default_duration_minutes
      == 0
    {
      policies.default_duration_minutes =
        default_duration_minutes();
    }

    if policies.untitled.trim().is_empty()
    {
      policies.untitled =
        default_untitled();
    }

    if self.calendar_id.trim().is_empty() {
      self.calendar_id =
        default_calendar_id();
    }

    if self.source.timeout_secs == 0 {
      self.source.timeout_secs =
        default_timeout_secs();
    }
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  let candidate = dirs::config_dir()?
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Some(candidate);
  }

  debug!(
    candidate = %candidate.display(),
    "default config file not present"
  );
  None
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::Config;
  use crate::geometry::OverlapPolicy;
  use crate::view::ViewMode;

  #[test]
  fn defaults_match_the_widget() {
    let config = Config::default();
    assert_eq!(config.policies.max_dots, 4);
    assert_eq!(
      config.policies.min_duration_minutes,
      15
    );
    assert_eq!(
      config
        .policies
        .default_duration_minutes,
      30
    );
    assert_eq!(
      config.policies.overlap,
      OverlapPolicy::Stack
    );
    assert_eq!(config.calendar_id, "primary");
    assert_eq!(
      config.default_mode,
      ViewMode::Month
    );
    assert_eq!(
      Config::from_toml_str("")
        .expect("empty config"),
      config
    );
  }

  #[test]
  fn loads_partial_file_and_sanitises() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path = dir.path().join("calgrid.toml");
    fs::write(
      &path,
      r#"
timezone = "Europe/Moscow"
default_mode = "week"

[policies]
week_start = "Sunday"
max_dots = 0
min_duration_minutes = 5000
overlap = "columns"
untitled = "  "

[source]
timeout_secs = 0
"#
    )
    .expect("write config");

    let config = Config::load(Some(&path))
      .expect("load config");
    assert_eq!(
      config.loaded_from.as_deref(),
      Some(path.as_path())
    );
    assert_eq!(
      config.timezone.as_deref(),
      Some("Europe/Moscow")
    );
    assert_eq!(
      config.default_mode,
      ViewMode::Week
    );
    assert_eq!(
      config.policies.week_start,
      "sunday"
    );
    assert_eq!(config.policies.max_dots, 4);
    assert_eq!(
      config.policies.min_duration_minutes,
      1440
    );
    assert_eq!(
      config.policies.overlap,
      OverlapPolicy::Columns
    );
    assert_eq!(
      config.policies.untitled,
      "Untitled"
    );
    assert_eq!(config.source.timeout_secs, 30);
  }

  #[test]
  fn missing_or_broken_files_are_errors() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let missing = dir.path().join("nope.toml");
    assert!(
      Config::load(Some(&missing)).is_err()
    );

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "max_dots = [")
      .expect("write config");
    let err = Config::load(Some(&broken))
      .expect_err("broken toml");
    assert!(
      format!("{err:#}")
        .contains("invalid config file")
    );
  }

  #[test]
  fn overrides_apply_dotted_keys() {
    let mut config = Config::default();
    config
      .apply_overrides([
        (
          "policies.max_dots".to_string(),
          "6".to_string()
        ),
        (
          "policies.overlap".to_string(),
          "columns".to_string()
        ),
        (
          "timezone".to_string(),
          "Asia/Tokyo".to_string()
        ),
        ("color".to_string(), "off".to_string()),
        (
          "policies.default_duration_minutes"
            .to_string(),
          "0".to_string()
        )
      ])
      .expect("apply overrides");

    assert_eq!(config.policies.max_dots, 6);
    assert_eq!(
      config.policies.overlap,
      OverlapPolicy::Columns
    );
    assert_eq!(
      config.timezone.as_deref(),
      Some("Asia/Tokyo")
    );
    assert!(!config.color);
    assert_eq!(
      config
        .policies
        .default_duration_minutes,
      30
    );
  }

  #[test]
  fn bad_overrides_are_rejected() {
    let mut config = Config::default();
    let err = config
      .apply_overrides([(
        "policies.dots".to_string(),
        "6".to_string()
      )])
      .expect_err("unknown key");
    assert!(
      format!("{err:#}")
        .contains("unknown config key")
    );

    assert!(
      config
        .apply_overrides([(
          "policies.max_dots".to_string(),
          "many".to_string()
        )])
        .is_err()
    );
    assert!(
      config
        .apply_overrides([(
          "default_mode".to_string(),
          "year".to_string()
        )])
        .is_err()
    );
  }
}
