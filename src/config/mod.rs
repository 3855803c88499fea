// User settings - timer defaults, theme, volume cap, parental controls
// Loaded from a TOML file, with sensible defaults when it's missing.
// These are defaults and preferences only; live playback state never
// round-trips through here.

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timer_duration_minutes: u32,
    pub enable_sleep_mode: bool,
    pub theme: String,
    pub max_volume_level: u32,
    pub parental_control_enabled: bool,
    /// Absent means no PIN is set; writing `None` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parental_control_pin: Option<String>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_duration_minutes: 30,
            enable_sleep_mode: true,
            theme: "light".to_string(),
            max_volume_level: 100,
            parental_control_enabled: false,
            parental_control_pin: None,
            path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = fs::read_to_string(path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.path = Some(path.to_path_buf());
            Ok(config)
        } else {
            let mut config = Config::default();
            config.path = Some(path.to_path_buf());
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("lullabox");

        Ok(config_dir.join("config.toml"))
    }
}
