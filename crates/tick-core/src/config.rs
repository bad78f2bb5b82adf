use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOADING_DELAY_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert("api.url".to_string(), DEFAULT_API_URL.to_string());
        map.insert(
            "ui.loading_delay_ms".to_string(),
            DEFAULT_LOADING_DELAY_MS.to_string(),
        );
        map.insert("confirm.delete".to_string(), "on".to_string());
        map.insert("color".to_string(), "on".to_string());
        Self {
            map,
            loaded_files: vec![],
        }
    }
}

impl Config {
    #[tracing::instrument(skip(tickrc_override))]
    pub fn load(tickrc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        match resolve_tickrc_path(tickrc_override)? {
            Some(path) => {
                info!(tickrc = %path.display(), "loading tickrc");
                cfg.load_file(&path)?;
            }
            None => warn!("no tickrc found; using defaults"),
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn api_url(&self) -> String {
        self.get("api.url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn loading_delay(&self) -> anyhow::Result<Duration> {
        let Some(raw) = self.get("ui.loading_delay_ms") else {
            return Ok(Duration::from_millis(DEFAULT_LOADING_DELAY_MS));
        };
        let millis = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid ui.loading_delay_ms: {raw}"))?;
        Ok(Duration::from_millis(millis))
    }

    pub fn confirm_delete(&self) -> bool {
        self.get_bool("confirm.delete").unwrap_or(true)
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        for (line_num, raw_line) in text.lines().enumerate() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw_line.trim(),
            };
            if line.is_empty() {
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(override_path))]
fn resolve_tickrc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(tickrc_env) = std::env::var("TICKRC") {
        if tickrc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(tickrc_env)));
    }

    let Some(home) = dirs::home_dir() else {
        debug!("cannot determine home directory; skipping ~/.tickrc");
        return Ok(None);
    };
    let candidate = home.join(".tickrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}
