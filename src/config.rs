//! Optional config file loading. Search order: ./qqbook.toml, then
//! $XDG_CONFIG_HOME/qqbook/config.toml (or ~/.config/qqbook/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override
/// defaults, and CLI flags override the config.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Base output directory when -o is not set. The book id is appended.
    pub output_dir: Option<PathBuf>,
    /// Browser executable path. If unset, an installed Chrome/Chromium is located automatically.
    pub browser_path: Option<PathBuf>,
    /// Browser profile directory carrying login cookies between runs.
    pub user_data_dir: Option<PathBuf>,
    /// Run the browser headless. Login requires a visible window, so this
    /// only makes sense once a logged-in profile exists.
    pub headless: Option<bool>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// User-Agent for image downloads.
    pub user_agent: Option<String>,
    /// Delay in milliseconds between chapter page loads.
    pub chapter_delay_ms: Option<u64>,
    /// Image request timeout in seconds.
    pub asset_timeout_secs: Option<u64>,
    /// Number of attempts per image for transient failures (default 3).
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2]).
    pub retry_backoff_secs: Option<Vec<u64>>,
}

/// Search order: (1) ./qqbook.toml, (2) $XDG_CONFIG_HOME/qqbook/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present
/// file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("qqbook.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("qqbook").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}
