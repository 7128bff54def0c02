use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Files probed, in order, when no explicit config path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["autoprice.toml", "config/autoprice.toml"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Default competitor order for the priority-competitors strategy.
    pub priority_competitors_list: Vec<String>,
    pub use_price_rounder: bool,
    pub rounding_table_path: Option<PathBuf>,
    pub upper_margin_threshold: Decimal,
    pub lower_margin_threshold: Decimal,
    /// Strict line aggregation: a line price exists only when every member is priced.
    pub agg_line_price_only_where_existed: bool,
    pub competitors_fm_filter_threshold: Decimal,
    /// `-1` disables the filter.
    pub competitors_price_filter_threshold: Decimal,
    pub top_n: usize,
    pub parallel: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
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
    pub priority_competitors_list: Option<Vec<String>>,
    pub use_price_rounder: Option<bool>,
    pub rounding_table_path: Option<PathBuf>,
    pub parallel: Option<bool>,
    pub top_n: Option<usize>,
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

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            priority_competitors_list: vec![
                "competitor_1".to_string(),
                "competitor_2".to_string(),
                "competitor_3".to_string(),
            ],
            use_price_rounder: false,
            rounding_table_path: None,
            upper_margin_threshold: Decimal::new(5, 2),
            lower_margin_threshold: Decimal::new(5, 2),
            agg_line_price_only_where_existed: false,
            competitors_fm_filter_threshold: Decimal::new(5, 2),
            competitors_price_filter_threshold: Decimal::NEGATIVE_ONE,
            top_n: 5,
            parallel: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl std::str::FromStr for LogFormat {
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(pricing) = patch.pricing {
            if let Some(list) = pricing.priority_competitors_list {
                self.pricing.priority_competitors_list = list;
            }
            if let Some(use_price_rounder) = pricing.use_price_rounder {
                self.pricing.use_price_rounder = use_price_rounder;
            }
            if let Some(path) = pricing.rounding_table_path {
                self.pricing.rounding_table_path = Some(path);
            }
            if let Some(threshold) = pricing.upper_margin_threshold {
                self.pricing.upper_margin_threshold = threshold;
            }
            if let Some(threshold) = pricing.lower_margin_threshold {
                self.pricing.lower_margin_threshold = threshold;
            }
            if let Some(strict) = pricing.agg_line_price_only_where_existed {
                self.pricing.agg_line_price_only_where_existed = strict;
            }
            if let Some(threshold) = pricing.competitors_fm_filter_threshold {
                self.pricing.competitors_fm_filter_threshold = threshold;
            }
            if let Some(threshold) = pricing.competitors_price_filter_threshold {
                self.pricing.competitors_price_filter_threshold = threshold;
            }
            if let Some(top_n) = pricing.top_n {
                self.pricing.top_n = top_n;
            }
            if let Some(parallel) = pricing.parallel {
                self.pricing.parallel = parallel;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("AUTOPRICE_PRIORITY_COMPETITORS") {
            self.pricing.priority_competitors_list = split_list(&value);
        }
        if let Some(value) = read_env("AUTOPRICE_USE_PRICE_ROUNDER") {
            self.pricing.use_price_rounder = parse_bool("AUTOPRICE_USE_PRICE_ROUNDER", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_ROUNDING_TABLE_PATH") {
            self.pricing.rounding_table_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("AUTOPRICE_UPPER_MARGIN_THRESHOLD") {
            self.pricing.upper_margin_threshold =
                parse_decimal("AUTOPRICE_UPPER_MARGIN_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_LOWER_MARGIN_THRESHOLD") {
            self.pricing.lower_margin_threshold =
                parse_decimal("AUTOPRICE_LOWER_MARGIN_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_AGG_LINE_PRICE_ONLY_WHERE_EXISTED") {
            self.pricing.agg_line_price_only_where_existed =
                parse_bool("AUTOPRICE_AGG_LINE_PRICE_ONLY_WHERE_EXISTED", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_COMPETITORS_FM_FILTER_THRESHOLD") {
            self.pricing.competitors_fm_filter_threshold =
                parse_decimal("AUTOPRICE_COMPETITORS_FM_FILTER_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_COMPETITORS_PRICE_FILTER_THRESHOLD") {
            self.pricing.competitors_price_filter_threshold =
                parse_decimal("AUTOPRICE_COMPETITORS_PRICE_FILTER_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_TOP_N") {
            self.pricing.top_n = parse_usize("AUTOPRICE_TOP_N", &value)?;
        }
        if let Some(value) = read_env("AUTOPRICE_PARALLEL") {
            self.pricing.parallel = parse_bool("AUTOPRICE_PARALLEL", &value)?;
        }

        let log_level =
            read_env("AUTOPRICE_LOGGING_LEVEL").or_else(|| read_env("AUTOPRICE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AUTOPRICE_LOGGING_FORMAT").or_else(|| read_env("AUTOPRICE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(list) = overrides.priority_competitors_list {
            self.pricing.priority_competitors_list = list;
        }
        if let Some(use_price_rounder) = overrides.use_price_rounder {
            self.pricing.use_price_rounder = use_price_rounder;
        }
        if let Some(path) = overrides.rounding_table_path {
            self.pricing.rounding_table_path = Some(path);
        }
        if let Some(parallel) = overrides.parallel {
            self.pricing.parallel = parallel;
        }
        if let Some(top_n) = overrides.top_n {
            self.pricing.top_n = top_n;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The explicit path when it exists, otherwise the first default path found.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.priority_competitors_list.is_empty() {
        return Err(ConfigError::Validation(
            "pricing.priority_competitors_list must name at least one competitor".to_string(),
        ));
    }
    if pricing.priority_competitors_list.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "pricing.priority_competitors_list must not contain blank names".to_string(),
        ));
    }

    let non_negative = [
        ("pricing.upper_margin_threshold", pricing.upper_margin_threshold),
        ("pricing.lower_margin_threshold", pricing.lower_margin_threshold),
        ("pricing.competitors_fm_filter_threshold", pricing.competitors_fm_filter_threshold),
    ];
    for (key, value) in non_negative {
        if value < Decimal::ZERO {
            return Err(ConfigError::Validation(format!("{key} must not be negative")));
        }
    }

    let price_filter = pricing.competitors_price_filter_threshold;
    if price_filter < Decimal::ZERO && price_filter != Decimal::NEGATIVE_ONE {
        return Err(ConfigError::Validation(
            "pricing.competitors_price_filter_threshold must be non-negative or -1 (disabled)"
                .to_string(),
        ));
    }

    if pricing.top_n == 0 {
        return Err(ConfigError::Validation(
            "pricing.top_n must be greater than zero".to_string(),
        ));
    }

    if pricing.use_price_rounder && pricing.rounding_table_path.is_none() {
        return Err(ConfigError::Validation(
            "pricing.rounding_table_path is required when pricing.use_price_rounder is true"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(|name| name.trim().to_string()).collect()
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    priority_competitors_list: Option<Vec<String>>,
    use_price_rounder: Option<bool>,
    rounding_table_path: Option<PathBuf>,
    upper_margin_threshold: Option<Decimal>,
    lower_margin_threshold: Option<Decimal>,
    agg_line_price_only_where_existed: Option<bool>,
    competitors_fm_filter_threshold: Option<Decimal>,
    competitors_price_filter_threshold: Option<Decimal>,
    top_n: Option<usize>,
    parallel: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
