//! Optional config file loading. Search order: ./tomatodl.toml, then
//! $XDG_CONFIG_HOME/tomatodl/config.toml (or ~/.config/tomatodl/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override
/// defaults, and CLI flags override config.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Pre-acquired session cookie sent with every request.
    pub cookie: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Worker-pool width for concurrent fetching.
    pub workers: Option<usize>,
    /// Maximum ids per bulk request.
    pub batch_size: Option<usize>,
    /// Sleep in seconds between retry rounds.
    pub round_backoff_secs: Option<u64>,
    /// Round cap for the retry loop. Unset retries until done.
    pub max_rounds: Option<u32>,
    /// Randomized per-request delay range in milliseconds, [min, max].
    pub jitter_ms: Option<[u64; 2]>,
    /// Paragraph indent for cleaned content (default four spaces).
    pub indent: Option<String>,
    /// Content-source endpoints.
    pub sources: SourcesConfig,
}

/// Per-source endpoint overrides. Unset URLs fall back to the built-in hosts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SourcesConfig {
    pub batch_url: Option<String>,
    pub batch_token: Option<String>,
    pub disable_batch: bool,
    pub jingluo_url: Option<String>,
    pub disable_jingluo: bool,
    pub fqweb_url: Option<String>,
    pub disable_fqweb: bool,
}

/// Search order: (1) ./tomatodl.toml, (2) $XDG_CONFIG_HOME/tomatodl/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present
/// file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("tomatodl.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("tomatodl").join("config.toml"));
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
