use std::env;
use std::fs;
use std::path::Path;

use gatepass_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&str, String, &[&str]); 8] = [
        ("database.url", config.database.url.clone(), &["GATEPASS_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["GATEPASS_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["GATEPASS_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["GATEPASS_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["GATEPASS_SERVER_PORT", "PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["GATEPASS_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["GATEPASS_LOGGING_LEVEL", "GATEPASS_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["GATEPASS_LOGGING_FORMAT", "GATEPASS_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

/// The first env key present wins, mirroring the alias order `AppConfig::load` uses.
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

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source, render_line};
    use std::path::Path;
    use toml::Value;

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[server]\nport = 8080\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert!(!contains_path(&doc, "logging.level"));
    }

    #[test]
    fn file_source_names_the_file() {
        let doc: Value = "[logging]\nlevel = \"debug\"\n".parse().expect("toml");
        let source = field_source(
            "logging.level",
            &["GATEPASS_TEST_UNSET_LOGGING_LEVEL"],
            Some(&doc),
            Some(Path::new("gatepass.toml")),
        );
        assert_eq!(source, "file (gatepass.toml)");
        assert_eq!(
            field_source("logging.format", &[], Some(&doc), Some(Path::new("gatepass.toml"))),
            "default"
        );
    }

    #[test]
    fn lines_render_key_value_and_source() {
        assert_eq!(
            render_line("server.port", "5000", "default".to_string()),
            "- server.port = 5000 (source: default)"
        );
    }
}
