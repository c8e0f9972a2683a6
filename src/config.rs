// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{HabitatError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";
const HABITAT_HOME_ENV: &str = "HABITAT_HOME";
const DEFAULT_HOME_DIR: &str = ".habitat";

const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 3;
const DEFAULT_DISPLAY_TIMEOUT_MS: u64 = 2000;
const DEFAULT_ZIP_BUNDLE_SUFFIX: &str = "pyz";
const DEFAULT_SCRIPT_SUFFIX: &str = "py";
const DEFAULT_KIOSK_ACCOUNT: &str = "darrin deyoung";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HabitatConfig {
    #[serde(skip)]
    habitat_home: PathBuf,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub interactive: InteractiveConfig,

    #[serde(default)]
    pub gui: GuiConfig,

    #[serde(default)]
    pub classify: ClassifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Hard limit for the shell spawn probe
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    /// Connect/read limit for display server round trips
    #[serde(default = "default_display_timeout_ms")]
    pub display_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
            display_timeout_ms: DEFAULT_DISPLAY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveConfig {
    /// Account names of retail demo machines that cannot open consoles
    #[serde(default = "default_kiosk_accounts")]
    pub kiosk_accounts: Vec<String>,

    /// CI marker variables checked in addition to the built-in list
    #[serde(default)]
    pub extra_ci_markers: Vec<String>,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            kiosk_accounts: default_kiosk_accounts(),
            extra_ci_markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuiConfig {
    /// Termux normally has no display server; set when an X server app is in use
    #[serde(default)]
    pub termux_has_gui: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default = "default_zip_bundle_suffix")]
    pub zip_bundle_suffix: String,

    #[serde(default = "default_script_suffix")]
    pub script_suffix: String,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            zip_bundle_suffix: default_zip_bundle_suffix(),
            script_suffix: default_script_suffix(),
        }
    }
}

fn default_shell_timeout_secs() -> u64 {
    DEFAULT_SHELL_TIMEOUT_SECS
}

fn default_display_timeout_ms() -> u64 {
    DEFAULT_DISPLAY_TIMEOUT_MS
}

fn default_kiosk_accounts() -> Vec<String> {
    vec![DEFAULT_KIOSK_ACCOUNT.to_string()]
}

fn default_zip_bundle_suffix() -> String {
    DEFAULT_ZIP_BUNDLE_SUFFIX.to_string()
}

fn default_script_suffix() -> String {
    DEFAULT_SCRIPT_SUFFIX.to_string()
}

impl HabitatConfig {
    /// Load configuration from `<habitat_home>/config.toml`, layered under
    /// `HABITAT_*` environment variables (`HABITAT_PROBE__SHELL_TIMEOUT_SECS=5`).
    pub fn load(habitat_home: &Path) -> Result<Self> {
        let config_path = habitat_home.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            log::debug!("Loading config from {config_path:?}");
        } else {
            log::debug!("Config file not found at {config_path:?}, using defaults");
        }

        let settings = Config::builder()
            .add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("HABITAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("interactive.kiosk_accounts")
                    .with_list_parse_key("interactive.extra_ci_markers"),
            )
            .build()?;

        let mut config: HabitatConfig = settings.try_deserialize()?;
        config.habitat_home = habitat_home.to_path_buf();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn habitat_home(&self) -> &Path {
        &self.habitat_home
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.shell_timeout_secs)
    }

    pub fn display_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.display_timeout_ms)
    }

    fn normalize(&mut self) {
        for suffix in [
            &mut self.classify.zip_bundle_suffix,
            &mut self.classify.script_suffix,
        ] {
            *suffix = suffix.trim().trim_start_matches('.').to_string();
        }
        for account in &mut self.interactive.kiosk_accounts {
            *account = account.trim().to_lowercase();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.probe.shell_timeout_secs == 0 {
            return Err(HabitatError::InvalidConfig(
                "probe.shell_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.probe.display_timeout_ms == 0 {
            return Err(HabitatError::InvalidConfig(
                "probe.display_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.classify.zip_bundle_suffix.is_empty() || self.classify.script_suffix.is_empty() {
            return Err(HabitatError::InvalidConfig(
                "classify suffixes must not be empty".to_string(),
            ));
        }
        if self
            .classify
            .zip_bundle_suffix
            .eq_ignore_ascii_case(&self.classify.script_suffix)
        {
            return Err(HabitatError::InvalidConfig(format!(
                "classify.zip_bundle_suffix and classify.script_suffix are both '{}'",
                self.classify.script_suffix
            )));
        }
        Ok(())
    }
}

/// Resolve the habitat home directory: `$HABITAT_HOME`, else `~/.habitat`.
pub fn habitat_home() -> Result<PathBuf> {
    if let Ok(home) = env::var(HABITAT_HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir()
        .map(|home| home.join(DEFAULT_HOME_DIR))
        .ok_or_else(|| HabitatError::ConfigError("Unable to determine home directory".to_string()))
}

/// Load the configuration for the current user.
pub fn new_habitat_config() -> Result<HabitatConfig> {
    let home = habitat_home()?;
    HabitatConfig::load(&home)
}
