use std::{
    env, fs, io,
    net::SocketAddr,
    panic,
    path::{Path, PathBuf},
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

const DEFAULT_LOG_DIR: &str = "/var/log/socialflow";

/// Keeps the non-blocking file writer alive; drop it only on shutdown.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// How long rolled log files are kept and how often the pruner wakes up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogRetention {
    pub days: u64,
    pub interval_minutes: u64,
}

impl LogRetention {
    pub fn from_env() -> Self {
        Self {
            days: env_or("LOG_RETENTION_DAYS", 14u64),
            interval_minutes: env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64),
        }
    }

    fn enabled(&self) -> bool {
        self.days > 0 && self.interval_minutes > 0
    }
}

pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_root = PathBuf::from(env_or_string("LOG_DIR", DEFAULT_LOG_DIR)).join(service_name);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, file_guard) = match open_rolling_writer(&log_root, service_name) {
        Some((writer, guard)) => (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard)),
        None => (None, None),
    };

    // Option<Layer> is itself a layer, so both shapes share one registry.
    let subscriber = Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    if file_guard.is_some() {
        spawn_log_cleanup(log_root, LogRetention::from_env());
    } else {
        tracing::warn!(service = service_name, "file logging disabled");
    }

    TracingGuards {
        _file_guard: file_guard,
    }
}

fn open_rolling_writer(
    log_root: &Path,
    service_name: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    fs::create_dir_all(log_root).ok()?;
    // The rolling appender panics when the directory is not writable.
    let appender = panic::catch_unwind(|| {
        tracing_appender::rolling::daily(log_root, format!("{service_name}.log"))
    })
    .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

/// Parse a typed environment value, falling back to `default` when unset or invalid.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

pub fn env_or_string(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Non-empty environment value, if any.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn spawn_log_cleanup(log_root: PathBuf, retention: LogRetention) {
    if !retention.enabled() {
        return;
    }

    let keep_for = Duration::from_secs(retention.days * 24 * 60 * 60);
    let interval = Duration::from_secs(retention.interval_minutes * 60);

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(keep_for) {
            let removed = cleanup_old_logs(&log_root, cutoff);
            if removed > 0 {
                tracing::info!(removed, "pruned old log files");
            }
        }
        thread::sleep(interval);
    });
}

/// Remove files under `root` last modified before `cutoff`. Returns how many were removed.
pub fn cleanup_old_logs(root: &Path, cutoff: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            removed += cleanup_old_logs(&path, cutoff);
            continue;
        }
        let modified = fs::metadata(&path).and_then(|metadata| metadata.modified());
        match modified {
            Ok(modified) if modified < cutoff => {
                if fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
            _ => {}
        }
    }
    removed
}

pub async fn bind_listener(port: u16) -> io::Result<TcpListener> {
    // Bind on all interfaces for container compatibility.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    Ok(listener)
}

pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm handler unavailable");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        env::set_var("SOCIALFLOW_TEST_PORT", "not-a-port");
        assert_eq!(env_or("SOCIALFLOW_TEST_PORT", 8080u16), 8080);
        env::set_var("SOCIALFLOW_TEST_PORT", "9090");
        assert_eq!(env_or("SOCIALFLOW_TEST_PORT", 8080u16), 9090);
        env::remove_var("SOCIALFLOW_TEST_PORT");
    }

    #[test]
    fn env_opt_ignores_blank_values() {
        env::set_var("SOCIALFLOW_TEST_BLANK", "   ");
        assert_eq!(env_opt("SOCIALFLOW_TEST_BLANK"), None);
        env::remove_var("SOCIALFLOW_TEST_BLANK");
    }

    #[test]
    fn cleanup_removes_only_stale_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join("a.log"), b"a").expect("write");
        fs::write(nested.join("b.log"), b"b").expect("write");

        let past = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(cleanup_old_logs(dir.path(), past), 0);

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(cleanup_old_logs(dir.path(), future), 2);
        assert!(!nested.join("b.log").exists());
    }

    #[test]
    fn retention_disabled_when_zero() {
        let retention = LogRetention {
            days: 0,
            interval_minutes: 60,
        };
        assert!(!retention.enabled());
    }
}
