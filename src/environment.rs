//! Process environment hints
//!
//! Whether we believe we're running inside a container. Read once per
//! process and only ever used for diagnostics; dispatch routing is decided
//! dynamically from the async runtime, never from this flag.

use std::path::Path;
use std::sync::OnceLock;

/// Marker file docker drops at the filesystem root
const DOCKERENV_PATH: &str = "/.dockerenv";

/// Environment variable images can set explicitly
const DOCKER_CONTAINER_VAR: &str = "DOCKER_CONTAINER";

static CURRENT: OnceLock<RuntimeEnvironment> = OnceLock::new();

/// Snapshot of the process environment taken at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeEnvironment {
    pub in_container: bool,
}

impl RuntimeEnvironment {
    /// Probe the environment now
    pub fn detect() -> Self {
        let flag = std::env::var(DOCKER_CONTAINER_VAR).ok();
        Self {
            in_container: Self::container_hint(Path::new(DOCKERENV_PATH).exists(), flag.as_deref()),
        }
    }

    /// Process-wide snapshot, probed on first access
    pub fn current() -> Self {
        *CURRENT.get_or_init(Self::detect)
    }

    /// Pin the process-wide snapshot (e.g. from config). Returns false if
    /// it was already read.
    pub fn init(env: RuntimeEnvironment) -> bool {
        CURRENT.set(env).is_ok()
    }

    /// Short label for log lines
    pub fn label(&self) -> &'static str {
        if self.in_container { "container" } else { "host" }
    }

    fn container_hint(dockerenv_exists: bool, flag: Option<&str>) -> bool {
        dockerenv_exists || flag.is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}
