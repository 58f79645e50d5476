//! Execution Context Detection
//!
//! Decides which kind of host process the current code runs in. Detection is a pure
//! function of a [`HostEnvironment`] snapshot; [`detect`] memoises the result for the
//! lifetime of the process so every component sees the same answer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment variable carrying an explicit context name.
pub const ENV_EXECUTION_CONTEXT: &str = "UNIFORM_EXECUTION_CONTEXT";
/// Set when a main document is attached to this process.
pub const ENV_HOST_DOCUMENT: &str = "UNIFORM_HOST_DOCUMENT";
/// Set when the process runs inside a worker global scope.
pub const ENV_HOST_WORKER_SCOPE: &str = "UNIFORM_HOST_WORKER_SCOPE";
/// Set when the extension inter-process messaging runtime is reachable.
pub const ENV_HOST_EXTENSION_RUNTIME: &str = "UNIFORM_HOST_EXTENSION_RUNTIME";
/// Whether dedicated workers may be spawned from this process.
pub const ENV_HOST_DEDICATED_WORKERS: &str = "UNIFORM_HOST_DEDICATED_WORKERS";

/// Kind of host process the code runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionContext {
    Main,
    WorkerHost,
    ExtensionBackground,
    Unknown,
}

impl ExecutionContext {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionContext::Main => "main",
            ExecutionContext::WorkerHost => "worker-host",
            ExecutionContext::ExtensionBackground => "extension-background",
            ExecutionContext::Unknown => "unknown",
        }
    }

    pub const ALL: [ExecutionContext; 4] = [
        ExecutionContext::Main,
        ExecutionContext::WorkerHost,
        ExecutionContext::ExtensionBackground,
        ExecutionContext::Unknown,
    ];
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(ExecutionContext::Main),
            "worker-host" | "worker" => Ok(ExecutionContext::WorkerHost),
            "extension-background" | "chrome-extension" | "service-worker" => {
                Ok(ExecutionContext::ExtensionBackground)
            }
            "unknown" => Ok(ExecutionContext::Unknown),
            other => Err(format!(
                "unknown execution context '{}' (expected main, worker-host, extension-background or unknown)",
                other
            )),
        }
    }
}

/// Snapshot of the ambient host capabilities used for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Explicit context name; wins over every capability flag when it parses.
    pub context_hint: Option<String>,
    pub document: bool,
    pub worker_scope: bool,
    pub extension_runtime: bool,
    /// `None` means "use the context's default".
    pub dedicated_workers: Option<bool>,
}

impl HostEnvironment {
    /// Read the host flags from the process environment.
    pub fn from_env() -> Self {
        Self {
            context_hint: std::env::var(ENV_EXECUTION_CONTEXT)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            document: env_flag(ENV_HOST_DOCUMENT).unwrap_or(false),
            worker_scope: env_flag(ENV_HOST_WORKER_SCOPE).unwrap_or(false),
            extension_runtime: env_flag(ENV_HOST_EXTENSION_RUNTIME).unwrap_or(false),
            dedicated_workers: env_flag(ENV_HOST_DEDICATED_WORKERS),
        }
    }

    /// Whether dedicated workers can be spawned in `context`.
    ///
    /// Extension backgrounds run as service workers and cannot host dedicated workers
    /// unless the host says otherwise.
    pub fn supports_dedicated_workers(&self, context: ExecutionContext) -> bool {
        if let Some(explicit) = self.dedicated_workers {
            return explicit;
        }
        matches!(context, ExecutionContext::Main | ExecutionContext::WorkerHost)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Classify a host snapshot. Never fails: anything unrecognised is `Unknown`.
pub fn classify(host: &HostEnvironment) -> ExecutionContext {
    if let Some(hint) = host.context_hint.as_deref() {
        if let Ok(context) = hint.parse() {
            return context;
        }
    }

    if host.extension_runtime && !host.document {
        ExecutionContext::ExtensionBackground
    } else if host.worker_scope {
        ExecutionContext::WorkerHost
    } else if host.document {
        ExecutionContext::Main
    } else {
        ExecutionContext::Unknown
    }
}

static DETECTED: OnceLock<ExecutionContext> = OnceLock::new();

/// Detect the execution context of this process, once.
pub fn detect() -> ExecutionContext {
    *DETECTED.get_or_init(|| classify(&HostEnvironment::from_env()))
}
