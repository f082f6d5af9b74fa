use std::env;
use std::fs;
use std::path::Path;

use mediaplan_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string()
    ];

    lines.push(render_line(
        "pricing.tax_rate",
        &config.pricing.tax_rate.to_string(),
        source("pricing.tax_rate", &["MEDIAPLAN_PRICING_TAX_RATE"]),
    ));
    lines.push(render_line(
        "pricing.net_gross_factor",
        &config.pricing.net_gross_factor.to_string(),
        source("pricing.net_gross_factor", &["MEDIAPLAN_PRICING_NET_GROSS_FACTOR"]),
    ));
    lines.push(render_line(
        "calendar.autofill_default",
        &config.calendar.autofill_default.to_string(),
        source("calendar.autofill_default", &["MEDIAPLAN_CALENDAR_AUTOFILL_DEFAULT"]),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["MEDIAPLAN_LOGGING_LEVEL", "MEDIAPLAN_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        source("logging.format", &["MEDIAPLAN_LOGGING_FORMAT", "MEDIAPLAN_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
