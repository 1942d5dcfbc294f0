//! Location of the moviedex config file.
//!
//! The file is optional; a missing file yields default TMDB and cache
//! settings, so resolving a path never checks that it exists.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Directory name under the user config root.
const APP_DIR: &str = "moviedex";

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Resolves where `config.toml` is read from.
///
/// Lookup order:
/// 1. `{dir}/config.toml` when `--dir` is given.
/// 2. `$XDG_CONFIG_HOME/moviedex/config.toml` when that variable is set.
/// 3. `$HOME/.config/moviedex/config.toml`.
///
/// # Errors
///
/// Returns an error if neither `--dir`, `XDG_CONFIG_HOME` nor `HOME` is available.
pub fn resolve_config_path(dir: Option<&Path>) -> Result<PathBuf> {
    config_path_from(
        dir,
        std::env::var_os("XDG_CONFIG_HOME").as_deref().map(Path::new),
        std::env::var_os("HOME").as_deref().map(Path::new),
    )
}

/// Applies the lookup order to already-read locations.
fn config_path_from(dir: Option<&Path>, xdg_config_home: Option<&Path>, home: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.join(CONFIG_FILE));
    }
    // An empty XDG_CONFIG_HOME counts as unset.
    if let Some(root) = xdg_config_home.filter(|root| !root.as_os_str().is_empty()) {
        return Ok(root.join(APP_DIR).join(CONFIG_FILE));
    }
    match home {
        Some(home) => Ok(home.join(".config").join(APP_DIR).join(CONFIG_FILE)),
        None => bail!("cannot locate config.toml: pass --dir or set HOME"),
    }
}
