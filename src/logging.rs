//! Tracing setup for the server binary.
//!
//! `RUST_LOG`, when set, replaces the configured level entirely. Otherwise
//! Quill logs at `logging.level` with sqlx and hyper held at `warn`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn"];

/// Unknown names fall back to `info`.
fn level_from_name(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn default_directives(level: &str) -> String {
    let mut directives = vec![level_from_name(level).to_string().to_lowercase()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    directives.join(",")
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Log to stdout and to `config.file`. Restarts append to the same file.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = Arc::new(open_log_file(Path::new(&config.file))?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(env_filter(&config.level))
        .init();

    Ok(())
}

/// Stdout only, with colours. Used when the log file cannot be opened.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(env_filter(level))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_level_from_name() {
        assert_eq!(level_from_name("DEBUG"), Level::DEBUG);
        assert_eq!(level_from_name(" warning "), Level::WARN);
        assert_eq!(level_from_name("error"), Level::ERROR);
        assert_eq!(level_from_name("verbose"), Level::INFO);
    }

    #[test]
    fn test_default_directives_quiet_dependencies() {
        assert_eq!(default_directives("debug"), "debug,sqlx=warn,hyper=warn");
        assert_eq!(default_directives("nonsense"), "info,sqlx=warn,hyper=warn");
    }

    #[test]
    fn test_open_log_file_creates_dirs_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("quill.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }
}
