use std::env;
use std::fs;
use std::path::Path;

use autoprice_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run(config_path: Option<&Path>) -> String {
    let config = match AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = resolve_config_path(config_path);
    let file =
        FileSource { doc: load_config_file_doc(file_path.as_deref()), path: file_path.as_deref() };
    let pricing = &config.pricing;

    let rounding_table = pricing
        .rounding_table_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let entries: [(&str, String, &[&str]); 12] = [
        (
            "pricing.priority_competitors_list",
            pricing.priority_competitors_list.join(", "),
            &["AUTOPRICE_PRIORITY_COMPETITORS"],
        ),
        (
            "pricing.use_price_rounder",
            pricing.use_price_rounder.to_string(),
            &["AUTOPRICE_USE_PRICE_ROUNDER"],
        ),
        ("pricing.rounding_table_path", rounding_table, &["AUTOPRICE_ROUNDING_TABLE_PATH"]),
        (
            "pricing.upper_margin_threshold",
            pricing.upper_margin_threshold.to_string(),
            &["AUTOPRICE_UPPER_MARGIN_THRESHOLD"],
        ),
        (
            "pricing.lower_margin_threshold",
            pricing.lower_margin_threshold.to_string(),
            &["AUTOPRICE_LOWER_MARGIN_THRESHOLD"],
        ),
        (
            "pricing.agg_line_price_only_where_existed",
            pricing.agg_line_price_only_where_existed.to_string(),
            &["AUTOPRICE_AGG_LINE_PRICE_ONLY_WHERE_EXISTED"],
        ),
        (
            "pricing.competitors_fm_filter_threshold",
            pricing.competitors_fm_filter_threshold.to_string(),
            &["AUTOPRICE_COMPETITORS_FM_FILTER_THRESHOLD"],
        ),
        (
            "pricing.competitors_price_filter_threshold",
            pricing.competitors_price_filter_threshold.to_string(),
            &["AUTOPRICE_COMPETITORS_PRICE_FILTER_THRESHOLD"],
        ),
        ("pricing.top_n", pricing.top_n.to_string(), &["AUTOPRICE_TOP_N"]),
        ("pricing.parallel", pricing.parallel.to_string(), &["AUTOPRICE_PARALLEL"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["AUTOPRICE_LOGGING_LEVEL", "AUTOPRICE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["AUTOPRICE_LOGGING_FORMAT", "AUTOPRICE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        lines.push(render_line(key, &value, field_source(key, env_keys, &file)));
    }

    lines.join("\n")
}

struct FileSource<'a> {
    doc: Option<Value>,
    path: Option<&'a Path>,
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], file: &FileSource<'_>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &file.doc {
        if contains_path(doc, key_path) {
            let file_path = file
                .path
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_toml_documents() {
        let doc: toml::Value = "[pricing]\ntop_n = 3\n".parse().expect("valid toml");
        assert!(contains_path(&doc, "pricing.top_n"));
        assert!(!contains_path(&doc, "pricing.parallel"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
