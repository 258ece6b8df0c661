//! Runtime configuration, read from the environment at startup.

use std::time::Duration;

use crate::transport::ServerConfig;

/// Executable and fixed leading arguments used to launch a worker.
///
/// The request's `target` and `query` are appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["script.py".to_string()],
        }
    }
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-request bridge behavior.
///
/// Defaults: unbounded spawning, no timeout,
/// and workers outlive a dropped connection.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub worker: WorkerCommand,
    /// Cap on simultaneously running workers. `None` means unbounded.
    ///
    /// A worker orphaned by a dropped connection still counts until it exits.
    pub max_concurrent_workers: Option<usize>,
    /// Kill a worker that has not finished in time. `None` waits forever.
    pub worker_timeout: Option<Duration>,
    /// Kill the worker when the request future is dropped.
    pub kill_on_disconnect: bool,
}

impl BridgeConfig {
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }

    pub fn with_max_concurrent_workers(mut self, n: usize) -> Self {
        self.max_concurrent_workers = Some(n);
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    pub fn with_kill_on_disconnect(mut self, kill: bool) -> Self {
        self.kill_on_disconnect = kill;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub bridge: BridgeConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source. Unset or blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(host) = get("SCRAPE_BRIDGE_HOST") {
            settings.server.host = host;
        }
        if let Some(port) = get("SCRAPE_BRIDGE_PORT") {
            settings.server.port = parse("SCRAPE_BRIDGE_PORT", &port)?;
        }
        if let Some(cors) = get("SCRAPE_BRIDGE_CORS") {
            settings.server.cors = parse_bool("SCRAPE_BRIDGE_CORS", &cors)?;
        }

        if let Some(program) = get("SCRAPE_WORKER_PROGRAM") {
            settings.bridge.worker.program = program;
        }
        if let Some(args) = lookup("SCRAPE_WORKER_ARGS") {
            settings.bridge.worker.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(max) = get("SCRAPE_MAX_WORKERS") {
            let n: usize = parse("SCRAPE_MAX_WORKERS", &max)?;
            if n == 0 {
                return Err(ConfigError::Invalid {
                    var: "SCRAPE_MAX_WORKERS",
                    value: max,
                    reason: "must be at least 1".to_string(),
                });
            }
            settings.bridge.max_concurrent_workers = Some(n);
        }
        if let Some(secs) = get("SCRAPE_WORKER_TIMEOUT_SECS") {
            let secs: u64 = parse("SCRAPE_WORKER_TIMEOUT_SECS", &secs)?;
            settings.bridge.worker_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(kill) = get("SCRAPE_KILL_ON_DISCONNECT") {
            settings.bridge.kill_on_disconnect = parse_bool("SCRAPE_KILL_ON_DISCONNECT", &kill)?;
        }

        Ok(settings)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
