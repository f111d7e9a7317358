//! Process-wide `tracing` subscriber setup.
//!
//! | Variable | Effect |
//! |---|---|
//! | `GENSTREAM_OBSERVABILITY_ENABLED` | `0`/`false`/`off` installs no subscriber |
//! | `GENSTREAM_LOG_LEVEL` | filter directive, wins over `RUST_LOG` |
//! | `GENSTREAM_JSON_LOG_PATH` | JSON lines to this file instead of compact stdout |

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INSTALLED: OnceCell<()> = OnceCell::new();

const JSON_LOG_FALLBACK_NAME: &str = "genstream.logs.jsonl";

/// Log output resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    directive: String,
    json_path: Option<PathBuf>,
}

impl LogSettings {
    fn resolve(default_level: &str, var: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = var("GENSTREAM_OBSERVABILITY_ENABLED")
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(true);
        let directive = var("GENSTREAM_LOG_LEVEL")
            .or_else(|| var("RUST_LOG"))
            .filter(|d| !d.trim().is_empty() && EnvFilter::try_new(d).is_ok())
            .unwrap_or_else(|| default_level.to_string());
        let json_path = var("GENSTREAM_JSON_LOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            directive,
            json_path,
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Splits a log file path into the directory and file name the appender
/// expects.
fn appender_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(JSON_LOG_FALLBACK_NAME)
        .to_string();
    (dir, file)
}

/// Installs the global subscriber on first call; later calls do nothing.
pub fn init_observability(default_level: &str) {
    INSTALLED.get_or_init(|| {
        let settings = LogSettings::resolve(default_level, |name| std::env::var(name).ok());
        if !settings.enabled {
            return;
        }
        let filter = EnvFilter::new(&settings.directive);

        match settings.json_path {
            Some(path) => {
                let (dir, file) = appender_target(&path);
                let _ = std::fs::create_dir_all(&dir);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
            None => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stdout);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::resolve("info", |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_enabled_console_at_given_level() {
        assert_eq!(
            resolve(&[]),
            LogSettings {
                enabled: true,
                directive: "info".into(),
                json_path: None,
            }
        );
    }

    #[test]
    fn crate_level_wins_over_rust_log_and_invalid_falls_back() {
        let settings = resolve(&[("GENSTREAM_LOG_LEVEL", "debug"), ("RUST_LOG", "warn")]);
        assert_eq!(settings.directive, "debug");
        assert_eq!(resolve(&[("RUST_LOG", "warn")]).directive, "warn");
        assert_eq!(resolve(&[("GENSTREAM_LOG_LEVEL", "[[bad")]).directive, "info");
    }

    #[test]
    fn switch_and_json_path_are_read() {
        let settings = resolve(&[
            ("GENSTREAM_OBSERVABILITY_ENABLED", " Off "),
            ("GENSTREAM_JSON_LOG_PATH", "logs/run.jsonl"),
        ]);
        assert!(!settings.enabled);
        assert_eq!(settings.json_path, Some(PathBuf::from("logs/run.jsonl")));
        assert!(resolve(&[("GENSTREAM_OBSERVABILITY_ENABLED", "maybe")]).enabled);
    }

    #[test]
    fn appender_target_splits_bare_file_names() {
        assert_eq!(
            appender_target(Path::new("run.jsonl")),
            (PathBuf::from("."), "run.jsonl".to_string())
        );
        assert_eq!(
            appender_target(Path::new("/var/log/genstream/out.jsonl")),
            (PathBuf::from("/var/log/genstream"), "out.jsonl".to_string())
        );
    }
}
