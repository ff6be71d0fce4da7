//! Settings file and environment loading.
//!
//! A TOML settings file is layered under `CALPLAN_`-prefixed environment
//! variables (`CALPLAN_TIMEZONE`, `CALPLAN_CALENDARS__ESTUDIOS`, ...).
//! Relative paths in the file are resolved against the file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{CalPlanError, CalPlanResult};
use crate::routing::{CalendarTable, RoutingStrategy};

pub const DEFAULT_TIMEZONE: &str = "Europe/Madrid";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const ENV_PREFIX: &str = "CALPLAN";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_base_name() -> String {
    "plan_".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_client_secrets() -> PathBuf {
    PathBuf::from("secrets/calendar.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("secrets/token.toml")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleSettings {
    pub week_start: Option<String>,
    pub week_end: Option<String>,
    /// Date (`YYYY-MM-DD`) → shift, e.g. `"9:00-17:00"` or `"libranza"`
    #[serde(default)]
    pub work: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default = "default_output_dir")]
    pub json_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub ics_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            base_name: default_base_name(),
            json_dir: default_output_dir(),
            ics_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model")]
    pub name: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            name: default_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingSettings {
    #[serde(default)]
    pub strategy: RoutingStrategy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    #[serde(default = "default_client_secrets")]
    pub client_secrets: PathBuf,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        GoogleSettings {
            client_secrets: default_client_secrets(),
            token_cache: default_token_cache(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub calendars: BTreeMap<String, String>,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub routing: RoutingSettings,
    #[serde(default)]
    pub google: GoogleSettings,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl Settings {
    /// Load `path`, overridden by `CALPLAN_*` environment variables.
    pub fn load(path: &Path) -> CalPlanResult<Self> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__");
        Self::load_with_env(path, env)
    }

    fn load_with_env(path: &Path, env: Environment) -> CalPlanResult<Self> {
        if !path.exists() {
            return Err(CalPlanError::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let mut settings: Settings = Config::builder()
            .add_source(File::from(path))
            .add_source(env)
            .build()
            .map_err(|e| CalPlanError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalPlanError::Config(e.to_string()))?;

        settings.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(settings)
    }

    /// Expand `~` and anchor relative paths at the settings file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        }
    }

    pub fn timezone(&self) -> CalPlanResult<Tz> {
        self.timezone
            .trim()
            .parse()
            .map_err(|_| CalPlanError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn calendar_table(&self) -> CalendarTable {
        self.calendars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// API key from the settings, else from `GOOGLE_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.google_api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Start and end of the planned week, as written in the file.
    pub fn week(&self) -> CalPlanResult<(String, String)> {
        let start = required_date(self.schedule.week_start.as_deref(), "schedule.week_start")?;
        let end = required_date(self.schedule.week_end.as_deref(), "schedule.week_end")?;
        Ok((start, end))
    }

    fn output_name(&self, extension: &str) -> CalPlanResult<String> {
        let (start, end) = self.week()?;
        Ok(format!(
            "{}{}_{}.{}",
            self.output.base_name, start, end, extension
        ))
    }

    /// `<json_dir>/<base_name><week_start>_<week_end>.json`
    pub fn json_output(&self) -> CalPlanResult<PathBuf> {
        Ok(self
            .resolve_path(&self.output.json_dir)
            .join(self.output_name("json")?))
    }

    /// `<ics_dir>/<base_name><week_start>_<week_end>.ics`
    pub fn ics_output(&self) -> CalPlanResult<PathBuf> {
        Ok(self
            .resolve_path(&self.output.ics_dir)
            .join(self.output_name("ics")?))
    }

    pub fn client_secrets_path(&self) -> PathBuf {
        self.resolve_path(&self.google.client_secrets)
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.resolve_path(&self.google.token_cache)
    }
}

fn required_date(value: Option<&str>, key: &str) -> CalPlanResult<String> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CalPlanError::Config(format!("'{}' is not set", key)))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CalPlanError::InvalidDate(value.to_string()))?;
    Ok(value.to_string())
}
