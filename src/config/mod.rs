use std::{
    collections::HashMap,
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Defaults, overlaid by the rc file at `config_path`, overlaid by env.
    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        if let Ok(text) = fs::read_to_string(config_path) {
            map.extend(parse_rc(&text));
        }

        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path: config_path.to_path_buf() }
    }

    /// Build a config from explicit pairs on top of the defaults, ignoring the
    /// environment and any rc file.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_secs(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Returns `None` for unset keys and for the `auto` sentinel.
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key)
            .filter(|v| !v.trim().is_empty() && v != "auto")
            .map(PathBuf::from)
    }

    pub fn plot_output_path(&self) -> PathBuf {
        self.get_path("PLOT_OUTPUT_PATH")
            .unwrap_or_else(|| env::temp_dir().join("statlab").join("plots"))
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_rc(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "PRETTIFY_MARKDOWN",
        "R_BINARY",
        "R_ASSET_PATH",
        "R_INIT_TIMEOUT",
        "PLOT_WIDTH",
        "PLOT_HEIGHT",
        "PLOT_OUTPUT_PATH",
        "LOG_LEVEL",
    ];

    KEYS.contains(&k) || k.starts_with("STATLAB_") || k.starts_with("OPENAI_")
}

fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("statlab")
}

fn default_config_path() -> PathBuf {
    config_dir().join(".statlabrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("R_INIT_TIMEOUT".into(), "60".into());
    m.insert("PLOT_WIDTH".into(), "640".into());
    m.insert("PLOT_HEIGHT".into(), "480".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("R_BINARY".into(), "R".into());
    m.insert("R_ASSET_PATH".into(), "auto".into());
    m.insert("PLOT_OUTPUT_PATH".into(), "auto".into());
    m.insert("LOG_LEVEL".into(), "warn".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m
}
