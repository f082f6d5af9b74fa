//! Layered settings: built-in defaults, then `mediaplan.toml`, then
//! `MEDIAPLAN_*` variables, then explicit overrides. Every layer is a
//! [`ConfigPatch`] so later layers only replace the keys they set.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::PricingRates;

pub const CONFIG_FILE_NAME: &str = "mediaplan.toml";

const TAX_RATE_ENV: &str = "MEDIAPLAN_PRICING_TAX_RATE";
const NET_GROSS_FACTOR_ENV: &str = "MEDIAPLAN_PRICING_NET_GROSS_FACTOR";
const AUTOFILL_ENV: &str = "MEDIAPLAN_CALENDAR_AUTOFILL_DEFAULT";
const LOG_LEVEL_ENV: [&str; 2] = ["MEDIAPLAN_LOGGING_LEVEL", "MEDIAPLAN_LOG_LEVEL"];
const LOG_FORMAT_ENV: [&str; 2] = ["MEDIAPLAN_LOGGING_FORMAT", "MEDIAPLAN_LOG_FORMAT"];

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub net_gross_factor: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalendarConfig {
    /// Whether scenario calendar edits auto-fill forward when they do not say.
    pub autofill_default: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub tax_rate: Option<Decimal>,
    pub net_gross_factor: Option<Decimal>,
    pub autofill_default: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let rates = PricingRates::default();
        Self {
            pricing: PricingConfig {
                tax_rate: rates.tax_rate,
                net_gross_factor: rates.net_gross_factor,
            },
            calendar: CalendarConfig { autofill_default: false },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PricingConfig {
    pub fn rates(&self) -> PricingRates {
        PricingRates { tax_rate: self.tax_rate, net_gross_factor: self.net_gross_factor }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.merge(ConfigPatch::from_file(&path)?),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }
        config.merge(ConfigPatch::from_env()?);
        config.merge(ConfigPatch::from(options.overrides));

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pricing
            .rates()
            .validate()
            .map_err(|error| ConfigError::Validation(format!("pricing: {error}")))?;

        match self.logging.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "logging.level `{other}` must be one of trace|debug|info|warn|error"
            ))),
        }
    }

    fn merge(&mut self, patch: ConfigPatch) {
        let pricing = patch.pricing.unwrap_or_default();
        set(&mut self.pricing.tax_rate, pricing.tax_rate);
        set(&mut self.pricing.net_gross_factor, pricing.net_gross_factor);

        let calendar = patch.calendar.unwrap_or_default();
        set(&mut self.calendar.autofill_default, calendar.autofill_default);

        let logging = patch.logging.unwrap_or_default();
        set(&mut self.logging.level, logging.level);
        set(&mut self.logging.format, logging.format);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Config file in effect: `explicit_path` if it exists, otherwise
/// `./mediaplan.toml` or `./config/mediaplan.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), Path::new("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pricing: Option<PricingPatch>,
    calendar: Option<CalendarPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    tax_rate: Option<Decimal>,
    net_gross_factor: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    autofill_default: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let expanded = expand_env_refs(&raw)?;
        toml::from_str(&expanded)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let format = match first_env(&LOG_FORMAT_ENV) {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(Self {
            pricing: Some(PricingPatch {
                tax_rate: parse_env(TAX_RATE_ENV)?,
                net_gross_factor: parse_env(NET_GROSS_FACTOR_ENV)?,
            }),
            calendar: Some(CalendarPatch { autofill_default: parse_env(AUTOFILL_ENV)? }),
            logging: Some(LoggingPatch { level: first_env(&LOG_LEVEL_ENV), format }),
        })
    }
}

impl From<ConfigOverrides> for ConfigPatch {
    fn from(overrides: ConfigOverrides) -> Self {
        Self {
            pricing: Some(PricingPatch {
                tax_rate: overrides.tax_rate,
                net_gross_factor: overrides.net_gross_factor,
            }),
            calendar: Some(CalendarPatch { autofill_default: overrides.autofill_default }),
            logging: Some(LoggingPatch {
                level: overrides.log_level,
                format: overrides.log_format,
            }),
        }
    }
}

/// Replaces each `${NAME}` with the value of environment variable `NAME`.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &tail[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_owned() })?;
        expanded.push_str(&value);
        rest = &tail[end + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env_value(key))
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    env_value(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{
        expand_env_refs, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };

    static ENV: Mutex<()> = Mutex::new(());

    /// Runs `body` with exactly `vars` set among the variables the loader reads.
    fn scoped_env<R>(vars: &[(&str, &str)], body: impl FnOnce() -> R) -> R {
        let _held = ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let touched: Vec<&str> = [
            "MEDIAPLAN_PRICING_TAX_RATE",
            "MEDIAPLAN_PRICING_NET_GROSS_FACTOR",
            "MEDIAPLAN_CALENDAR_AUTOFILL_DEFAULT",
            "MEDIAPLAN_LOGGING_LEVEL",
            "MEDIAPLAN_LOG_LEVEL",
            "MEDIAPLAN_LOGGING_FORMAT",
            "MEDIAPLAN_LOG_FORMAT",
        ]
        .into_iter()
        .chain(vars.iter().map(|(key, _)| *key))
        .collect();

        touched.iter().for_each(|key| env::remove_var(key));
        vars.iter().for_each(|(key, value)| env::set_var(key, value));
        let outcome = body();
        touched.iter().for_each(|key| env::remove_var(key));
        outcome
    }

    fn config_file(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("mediaplan.toml");
        fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_carry_the_domain_rates() {
        let config = scoped_env(&[], || AppConfig::load(LoadOptions::default())).expect("load");

        assert_eq!(config.pricing.tax_rate, Decimal::new(19, 2));
        assert_eq!(config.pricing.net_gross_factor, Decimal::new(85, 2));
        assert!(!config.calendar.autofill_default);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_values_may_reference_environment_variables() {
        let (_dir, path) = config_file(
            "[pricing]\ntax_rate = \"${MEDIAPLAN_TEST_VAT}\"\n\n\
             [calendar]\nautofill_default = true\n",
        );
        let config =
            scoped_env(&[("MEDIAPLAN_TEST_VAT", "0.16")], || load_from(path)).expect("load");

        assert_eq!(config.pricing.tax_rate, Decimal::new(16, 2));
        assert!(config.calendar.autofill_default);
    }

    #[test]
    fn short_logging_variables_are_accepted() {
        let config = scoped_env(
            &[("MEDIAPLAN_LOG_LEVEL", "warn"), ("MEDIAPLAN_LOG_FORMAT", "json")],
            || AppConfig::load(LoadOptions::default()),
        )
        .expect("load");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn later_layers_replace_only_the_keys_they_set() {
        let (_dir, path) = config_file(
            "[pricing]\ntax_rate = \"0.10\"\nnet_gross_factor = \"0.90\"\n\n\
             [logging]\nlevel = \"warn\"\n",
        );
        let config = scoped_env(&[("MEDIAPLAN_PRICING_NET_GROSS_FACTOR", "0.80")], || {
            AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_owned()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
        })
        .expect("load");

        assert_eq!(config.pricing.tax_rate, Decimal::new(10, 2));
        assert_eq!(config.pricing.net_gross_factor, Decimal::new(80, 2));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn out_of_range_factor_fails_validation() {
        let error = scoped_env(&[], || {
            AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    net_gross_factor: Some(Decimal::ZERO),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
        })
        .expect_err("zero factor");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("net/gross")
        ));
    }

    #[test]
    fn unparseable_variable_is_named_in_the_error() {
        let error = scoped_env(&[("MEDIAPLAN_CALENDAR_AUTOFILL_DEFAULT", "sometimes")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect_err("not a bool");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, .. }
                if key == "MEDIAPLAN_CALENDAR_AUTOFILL_DEFAULT"
        ));
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist/mediaplan.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("file is required");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn unterminated_reference_is_rejected() {
        let error = expand_env_refs("level = \"${MEDIAPLAN_").expect_err("no closing brace");
        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }
}
