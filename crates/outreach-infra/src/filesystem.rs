//! Data directory layout.

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "OUTREACH_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `OUTREACH_DATA_DIR` environment variable
/// 2. `~/.outreach`
/// 3. `.outreach` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    resolve_data_dir_from(std::env::var(DATA_DIR_ENV).ok())
}

fn resolve_data_dir_from(env_value: Option<String>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".outreach");
    }

    PathBuf::from(".outreach")
}
