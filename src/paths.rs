//! Path resolution for spingate
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. An explicit path (`--config` or `SPINGATE_CONFIG`)
//! 2. `XDG_CONFIG_HOME/spingate/config.toml` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\spingate\config.toml`
//!    - macOS/Linux: `~/.config/spingate/config.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File name of the client config inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the spingate config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("spingate");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("spingate"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("spingate"))
}

/// Resolve the client config file.
///
/// Returns the path and whether it was given explicitly.
pub fn config_file(explicit: Option<&Path>) -> Result<(PathBuf, bool)> {
    match explicit {
        Some(path) => Ok((expand(&path.to_string_lossy()), true)),
        None => Ok((config_dir()?.join(CONFIG_FILE_NAME), false)),
    }
}

/// Expand `~` and environment variables in a path.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Resolve `path` relative to the directory containing `base`.
pub fn relative_to(base: &Path, path: &Path) -> PathBuf {
    let path = expand(&path.to_string_lossy());
    if path.is_absolute() {
        return path;
    }
    base.parent()
        .map_or_else(|| path.clone(), |parent| parent.join(&path))
}

// ============================================================================
// Tests
// ============================================================================
