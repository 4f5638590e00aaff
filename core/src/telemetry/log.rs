use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// `(component, key)` pairs already reported through [`LogManager::warn_once`].
static WARNED: OnceLock<Mutex<HashSet<(&'static str, String)>>> = OnceLock::new();

/// Component-scoped wrapper over the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn trace(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }

    /// Emits `message` the first time this component uses `key` in the
    /// process, returns whether it was logged.
    pub fn warn_once(&self, key: &str, message: &str) -> bool {
        let warned = WARNED.get_or_init(|| Mutex::new(HashSet::new()));
        let first = match warned.lock() {
            Ok(mut seen) => seen.insert((self.component, key.to_string())),
            Err(_) => false,
        };
        if first {
            self.warn(message);
        }
        first
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("skyrip")
    }
}
