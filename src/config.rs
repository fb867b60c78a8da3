use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub exec: ExecConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecConfig {
    pub shell: String,
    pub quiet: bool,
    /// "none", "bytes" or "text".
    pub capture: String,
    pub encoding: String,
    pub pipefail: bool,
    pub capture_stderr: bool,
    pub cwd: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: "sh".into(),
            quiet: false,
            capture: "none".into(),
            encoding: "utf-8".into(),
            pipefail: false,
            capture_stderr: false,
            cwd: None,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub list_separator: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            list_separator: " ".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".into(),
            file: "~/.local/share/shl/shl.log".into(),
        }
    }
}

// ── Overlay types (user config, all fields optional) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    exec: ExecOverlay,
    #[serde(default)]
    render: RenderOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct ExecOverlay {
    shell: Option<String>,
    quiet: Option<bool>,
    capture: Option<String>,
    encoding: Option<String>,
    pipefail: Option<bool>,
    capture_stderr: Option<bool>,
    cwd: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    remove_env: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderOverlay {
    list_separator: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    enabled: Option<bool>,
    level: Option<String>,
    file: Option<String>,
}

/// Expand `~` and `$VARS` in a configured path. Unknown variables leave the
/// text as written.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        Self::from_toml(DEFAULT_CONFIG).unwrap_or_else(|e| {
            eprintln!("shl: embedded config is invalid: {e}");
            Self::default()
        })
    }

    /// Parse a complete config; missing keys take their built-in defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/shl/config.toml (if exists)
    ///
    /// Scalars override; `[exec.env]` entries are added and `remove_env`
    /// drops inherited ones.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Try to load user overlay from ~/.config/shl/config.toml.
    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/shl/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("shl: config parse error: {e}");
                None
            }
        }
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let e = overlay.exec;
        set(&mut self.exec.shell, e.shell);
        set(&mut self.exec.quiet, e.quiet);
        set(&mut self.exec.capture, e.capture);
        set(&mut self.exec.encoding, e.encoding);
        set(&mut self.exec.pipefail, e.pipefail);
        set(&mut self.exec.capture_stderr, e.capture_stderr);
        if e.cwd.is_some() {
            self.exec.cwd = e.cwd;
        }
        self.exec.env.retain(|k, _| !e.remove_env.contains(k));
        self.exec.env.extend(e.env);

        set(&mut self.render.list_separator, overlay.render.list_separator);

        let l = overlay.logging;
        set(&mut self.logging.enabled, l.enabled);
        set(&mut self.logging.level, l.level);
        set(&mut self.logging.file, l.file);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
