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

//! Runtime capability probes.
//!
//! Every probe is total: failures of any kind, panics included, become
//! `false`. Answers are memoized per [`CapabilityProbe`] until reset.

pub mod browser;
pub mod display;
pub mod plot;
pub mod shell;
pub mod terminal;

use crate::config::HabitatConfig;
use crate::memo::Memo;
use crate::platform::PlatformIdentifier;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub use shell::ShellProbeFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SpawnShell,
    ShellAvailable,
    InteractiveTerminal,
    CiOrNoninteractive,
    GuiPlotting,
    HeadlessImageExport,
    WebBrowser,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::SpawnShell,
        Capability::ShellAvailable,
        Capability::InteractiveTerminal,
        Capability::CiOrNoninteractive,
        Capability::GuiPlotting,
        Capability::HeadlessImageExport,
        Capability::WebBrowser,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::SpawnShell => "can_spawn_shell",
            Capability::ShellAvailable => "shell_available",
            Capability::InteractiveTerminal => "interactive_terminal_available",
            Capability::CiOrNoninteractive => "ci_or_noninteractive",
            Capability::GuiPlotting => "gui_plotting_available",
            Capability::HeadlessImageExport => "headless_image_export_available",
            Capability::WebBrowser => "web_browser_available",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityState {
    pub value: bool,
    pub computed: bool,
}

/// Snapshot of every memo slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags(BTreeMap<Capability, CapabilityState>);

impl CapabilityFlags {
    pub fn get(&self, capability: Capability) -> CapabilityState {
        self.0.get(&capability).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, CapabilityState)> + '_ {
        self.0.iter().map(|(capability, state)| (*capability, *state))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySettings {
    pub shell_timeout: Duration,
    pub display_timeout: Duration,
    pub kiosk_accounts: Vec<String>,
    pub extra_ci_markers: Vec<String>,
    pub termux_has_gui: bool,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self::from_config(&HabitatConfig::default())
    }
}

impl CapabilitySettings {
    pub fn from_config(config: &HabitatConfig) -> Self {
        Self {
            shell_timeout: config.shell_timeout(),
            display_timeout: config.display_timeout(),
            kiosk_accounts: config.interactive.kiosk_accounts.clone(),
            extra_ci_markers: config.interactive.extra_ci_markers.clone(),
            termux_has_gui: config.gui.termux_has_gui,
        }
    }
}

pub struct CapabilityProbe {
    settings: CapabilitySettings,
    platform: Arc<PlatformIdentifier>,
    serving: bool,
    terminal: Option<bool>,
    spawn_shell: Memo,
    shell_available: Memo,
    interactive_terminal: Memo,
    ci_or_noninteractive: Memo,
    gui_plotting: Memo,
    headless_export: Memo,
    web_browser: Memo,
}

impl fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("settings", &self.settings)
            .field("serving", &self.serving)
            .field("flags", &self.flags())
            .finish_non_exhaustive()
    }
}

impl CapabilityProbe {
    /// `serving` marks a process that is busy serving network requests and
    /// therefore cannot take interactive input.
    pub fn new(settings: CapabilitySettings, platform: Arc<PlatformIdentifier>, serving: bool) -> Self {
        Self {
            settings,
            platform,
            serving,
            terminal: None,
            spawn_shell: Memo::new(),
            shell_available: Memo::new(),
            interactive_terminal: Memo::new(),
            ci_or_noninteractive: Memo::new(),
            gui_plotting: Memo::new(),
            headless_export: Memo::new(),
            web_browser: Memo::new(),
        }
    }

    /// Override terminal detection for hosts that manage their own
    /// pseudo-terminal.
    pub fn with_terminal(mut self, attached: bool) -> Self {
        self.terminal = Some(attached);
        self
    }

    pub fn settings(&self) -> &CapabilitySettings {
        &self.settings
    }

    pub fn check(&self, capability: Capability) -> bool {
        match capability {
            Capability::SpawnShell => self.can_spawn_shell(),
            Capability::ShellAvailable => self.shell_available(),
            Capability::InteractiveTerminal => self.interactive_terminal_available(),
            Capability::CiOrNoninteractive => self.ci_or_noninteractive(),
            Capability::GuiPlotting => self.gui_plotting_available(),
            Capability::HeadlessImageExport => self.headless_image_export_available(),
            Capability::WebBrowser => self.web_browser_available(),
        }
    }

    pub fn can_spawn_shell(&self) -> bool {
        self.spawn_shell
            .get_or_compute(|| shell::can_spawn_shell(self.settings.shell_timeout))
    }

    pub fn shell_available(&self) -> bool {
        self.shell_available.get_or_compute(shell::shell_available)
    }

    pub fn interactive_terminal_available(&self) -> bool {
        self.interactive_terminal.get_or_compute(|| {
            let system = self.platform.system();
            if terminal::is_kiosk_account(
                system,
                self.platform.is_windows(),
                &self.settings.kiosk_accounts,
            ) {
                return false;
            }
            if !self.terminal_attached() {
                log::debug!("stdin/stdout are not both terminals");
                return false;
            }
            if self.serving {
                log::debug!("Process is serving requests");
                return false;
            }
            self.can_spawn_shell()
        })
    }

    pub fn ci_or_noninteractive(&self) -> bool {
        self.ci_or_noninteractive.get_or_compute(|| {
            if !self.terminal_attached() {
                return true;
            }
            let system = self.platform.system();
            if let Some(marker) = terminal::active_ci_marker(system, &self.settings.extra_ci_markers) {
                log::debug!("CI marker {marker} is set");
                return true;
            }
            terminal::in_container(system)
        })
    }

    pub fn gui_plotting_available(&self) -> bool {
        self.gui_plotting.get_or_compute(|| {
            if self.platform.is_termux() && !self.settings.termux_has_gui {
                log::debug!("Termux without a configured display server");
                return false;
            }

            let system = self.platform.system();
            let timeout = self.settings.display_timeout;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                display::present_figure(system, timeout, &plot::Figure::sample())
            }));
            match outcome {
                Ok(Ok(backend)) => {
                    log::debug!("GUI plotting available through {backend:?}");
                    true
                }
                Ok(Err(e)) => {
                    log::debug!("GUI plotting unavailable: {e}");
                    false
                }
                Err(_) => {
                    log::debug!("GUI plotting probe panicked");
                    false
                }
            }
        })
    }

    pub fn headless_image_export_available(&self) -> bool {
        self.headless_export.get_or_compute(|| {
            let dir = std::env::temp_dir();
            match panic::catch_unwind(|| plot::export_sample_png_in(&dir)) {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    log::debug!("Headless export failed: {e}");
                    false
                }
                Err(_) => {
                    log::debug!("Headless export probe panicked");
                    false
                }
            }
        })
    }

    pub fn web_browser_available(&self) -> bool {
        self.web_browser.get_or_compute(|| {
            browser::web_browser_available(
                self.platform.system(),
                self.platform.is_termux(),
                self.platform.is_windows(),
            )
        })
    }

    pub fn reset(&self, capability: Capability) {
        self.slot(capability).reset();
    }

    pub fn reset_all(&self) {
        for capability in Capability::ALL {
            self.reset(capability);
        }
    }

    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags(
            Capability::ALL
                .into_iter()
                .map(|capability| {
                    let cached = self.slot(capability).peek();
                    let state = CapabilityState {
                        value: cached.unwrap_or(false),
                        computed: cached.is_some(),
                    };
                    (capability, state)
                })
                .collect(),
        )
    }

    fn slot(&self, capability: Capability) -> &Memo {
        match capability {
            Capability::SpawnShell => &self.spawn_shell,
            Capability::ShellAvailable => &self.shell_available,
            Capability::InteractiveTerminal => &self.interactive_terminal,
            Capability::CiOrNoninteractive => &self.ci_or_noninteractive,
            Capability::GuiPlotting => &self.gui_plotting,
            Capability::HeadlessImageExport => &self.headless_export,
            Capability::WebBrowser => &self.web_browser,
        }
    }

    fn terminal_attached(&self) -> bool {
        self.terminal.unwrap_or_else(terminal::stdio_is_terminal)
    }
}
