use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

pub const TODORC_ENV_VAR: &str = "TODORC";

/// Every setting `todo` reads, with its built-in value.
const SETTINGS: [(&str, &str); 6] = [
    ("data.location", "~/.todo"),
    ("storage.key", "tasks"),
    ("default.command", "list"),
    ("default.filter", "all"),
    ("color", "on"),
    ("timezone", "UTC"),
];

/// Effective settings: built-ins, then the todorc file, then overrides.
#[derive(Debug, Clone)]
pub struct Config {
    values: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: SETTINGS
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            source: None,
        }
    }
}

impl Config {
    #[tracing::instrument(skip(todorc))]
    pub fn load(todorc: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();

        let Some(path) = todorc_path(todorc) else {
            debug!("no todorc; using built-in settings");
            return Ok(cfg);
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        cfg.merge_todorc(&text)
            .with_context(|| format!("invalid todorc {}", path.display()))?;
        info!(todorc = %path.display(), "loaded todorc");

        cfg.source = Some(path);
        Ok(cfg)
    }

    /// Applies `key = value` lines. `#` starts a comment.
    fn merge_todorc(&mut self, text: &str) -> anyhow::Result<()> {
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("line {}: expected `key = value`, got `{line}`", idx + 1))?;
            self.set(key.trim(), value.trim());
        }
        Ok(())
    }

    /// Sets one value. An `rc.` prefix is accepted; unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        let key = key.strip_prefix("rc.").unwrap_or(key);
        if !SETTINGS.iter().any(|(known, _)| *known == key) {
            warn!(key, "unknown setting ignored");
            return;
        }

        debug!(key, value, "setting");
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            self.set(&key, &value);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// Settings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// `--data` wins over `data.location`; both fall back to `~/.todo`.
    pub fn data_dir(&self, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
        let chosen = override_dir.map(Path::to_path_buf).or_else(|| {
            self.get("data.location")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        });

        match chosen {
            Some(path) => Ok(expand_tilde(&path)),
            None => dirs::home_dir()
                .map(|home| home.join(".todo"))
                .ok_or_else(|| anyhow!("cannot determine home directory")),
        }
    }
}

/// `--todorc`, then `$TODORC` (`/dev/null` disables), then `~/.todorc` if present.
fn todorc_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    match std::env::var_os(TODORC_ENV_VAR) {
        Some(value) if value == "/dev/null" => None,
        Some(value) => Some(expand_tilde(Path::new(&value))),
        None => dirs::home_dir()
            .map(|home| home.join(".todorc"))
            .filter(|path| path.is_file()),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
