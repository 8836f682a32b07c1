use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_BASENAME: &str = "broadcast-stage.log";
const LOG_DIR_ENV: &str = "BROADCAST_STAGE_LOG_PATH";
const LOG_RETENTION_DAYS: u64 = 7;

/// Subsystem for macOS unified logging (os_log)
#[cfg(target_os = "macos")]
const OSLOG_SUBSYSTEM: &str = "dev.broadcast-stage.stage";

pub fn init_logging() -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    prune_old_logs(
        &log_dir,
        Duration::from_secs(60 * 60 * 24 * LOG_RETENTION_DAYS),
    );

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    // stdout carries the status line, so console logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    #[cfg(target_os = "macos")]
    {
        // Visible with `log stream --predicate 'subsystem == "dev.broadcast-stage.stage"'`
        let oslog_layer = tracing_oslog::OsLogger::new(OSLOG_SUBSYSTEM, "default");

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .with(oslog_layer)
            .init();
    }

    #[cfg(not(target_os = "macos"))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    }

    tracing::debug!("Logging to {:?}", log_dir);
    Ok(guard)
}

fn resolve_log_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(LOG_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let proj_dirs = ProjectDirs::from("dev", "broadcast-stage", "stage")
        .context("Failed to determine project directories for log path")?;

    #[cfg(target_os = "linux")]
    let base = proj_dirs
        .state_dir()
        .unwrap_or_else(|| proj_dirs.data_local_dir());

    #[cfg(not(target_os = "linux"))]
    let base = proj_dirs.data_local_dir();

    Ok(base.join("logs"))
}

fn prune_old_logs(log_dir: &Path, max_age: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return 0;
    };

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = path.file_name().and_then(|name| name.to_str());
        let Some(file_name) = file_name else {
            continue;
        };

        if !file_name.starts_with(LOG_FILE_BASENAME) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        if modified < cutoff && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_only_touches_old_log_files() {
        let dir = std::env::temp_dir().join(format!("stage-logs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let log = dir.join(format!("{}.2024-01-01", LOG_FILE_BASENAME));
        let other = dir.join("notes.txt");
        std::fs::write(&log, "old").unwrap();
        std::fs::write(&other, "keep").unwrap();

        // Nothing is older than a day yet
        assert_eq!(prune_old_logs(&dir, Duration::from_secs(60 * 60 * 24)), 0);
        assert!(log.exists());

        // With a zero retention every matching file is stale
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(prune_old_logs(&dir, Duration::ZERO), 1);
        assert!(!log.exists());
        assert!(other.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_ignored() {
        let dir = std::env::temp_dir().join(format!("stage-missing-{}", uuid::Uuid::new_v4()));
        assert_eq!(prune_old_logs(&dir, Duration::ZERO), 0);
    }
}
