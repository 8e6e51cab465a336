use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use presswork_core::config::{
    env_key, pricing_rate_fields, AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE,
};
use secrecy::ExposeSecret;
use toml::Value;

/// Source attribution for config keys. Knows where the loaded file lives, if any.
struct Attribution {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl Attribution {
    fn detect() -> Self {
        let path = detect_config_path();
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn line(&self, key_path: &str, value: &str) -> String {
        self.line_with_env(key_path, value, &[env_key(key_path)])
    }

    fn line_with_env(&self, key_path: &str, value: &str, env_keys: &[String]) -> String {
        render_line(key_path, value, self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[String]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key.as_str()).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let mut config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let sources = Attribution::detect();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line("database.url", &config.database.url));
    lines.push(
        sources.line("database.max_connections", &config.database.max_connections.to_string()),
    );
    lines.push(sources.line("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(sources.line("server.bind_address", &config.server.bind_address));
    lines.push(sources.line("server.port", &config.server.port.to_string()));
    lines.push(sources.line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
    ));
    let api_token = match &config.server.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(sources.line("server.api_token", &api_token));

    lines.push(sources.line_with_env(
        "logging.level",
        &config.logging.level,
        &[env_key("logging.level"), env_key("log.level")],
    ));
    lines.push(sources.line_with_env(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &[env_key("logging.format"), env_key("log.format")],
    ));

    lines.push(sources.line("pricing.default_gsm", &config.pricing.default_gsm.to_string()));
    for (name, value) in pricing_rate_fields(&mut config.pricing) {
        lines.push(sources.line(&format!("pricing.{name}"), &value.to_string()));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.char_indices().nth(3) {
        Some((cut, _)) if trimmed.len() > 8 => format!("{}***", &trimmed[..cut]),
        _ => "<redacted>".to_string(),
    }
}
