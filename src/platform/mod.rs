//! Host platform identification.
//!
//! The generic family (Windows, macOS, Linux, FreeBSD) comes from the build
//! target. On top of that at most one Linux variant is reported, chosen by
//! walking the variant predicates in a fixed order.

pub mod constants;
pub mod detection;
pub mod probe;
pub mod process;

use crate::memo::Memo;
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;

pub use probe::{HostSystem, SystemProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTag {
    Windows,
    MacOs,
    Linux,
    FreeBsd,
    Wsl,
    Termux,
    Android,
    IshAlpine,
    SandboxedMobileIde,
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformTag::Windows => "Windows",
            PlatformTag::MacOs => "macOS",
            PlatformTag::Linux => "Linux",
            PlatformTag::FreeBsd => "FreeBSD",
            PlatformTag::Wsl => "WSL",
            PlatformTag::Termux => "Termux",
            PlatformTag::Android => "Android",
            PlatformTag::IshAlpine => "iSH Alpine",
            PlatformTag::SandboxedMobileIde => "sandboxed mobile IDE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformReport {
    pub family: Option<PlatformTag>,
    pub variant: Option<PlatformTag>,
}

impl fmt::Display for PlatformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.family, self.variant) {
            (Some(family), Some(variant)) => write!(f, "{family} ({variant})"),
            (Some(family), None) => write!(f, "{family}"),
            (None, Some(variant)) => write!(f, "{variant}"),
            (None, None) => f.write_str("unknown"),
        }
    }
}

pub struct PlatformIdentifier {
    system: Box<dyn SystemProbe>,
    interpreter: Option<PathBuf>,
    windows: Memo,
    macos: Memo,
    linux: Memo,
    freebsd: Memo,
    wsl: Memo,
    termux: Memo,
    android: Memo,
    ish_alpine: Memo,
    mobile_ide: Memo,
}

impl fmt::Debug for PlatformIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformIdentifier")
            .field("interpreter", &self.interpreter)
            .finish_non_exhaustive()
    }
}

impl Default for PlatformIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformIdentifier {
    /// Identify the machine this process runs on.
    pub fn new() -> Self {
        let interpreter = env::current_exe().ok();
        Self::with_system(HostSystem, interpreter)
    }

    pub fn with_system(system: impl SystemProbe + 'static, interpreter: Option<PathBuf>) -> Self {
        Self {
            system: Box::new(system),
            interpreter,
            windows: Memo::new(),
            macos: Memo::new(),
            linux: Memo::new(),
            freebsd: Memo::new(),
            wsl: Memo::new(),
            termux: Memo::new(),
            android: Memo::new(),
            ish_alpine: Memo::new(),
            mobile_ide: Memo::new(),
        }
    }

    /// The evidence source, shared with other probes.
    pub fn system(&self) -> &dyn SystemProbe {
        self.system.as_ref()
    }

    pub fn interpreter(&self) -> Option<&std::path::Path> {
        self.interpreter.as_deref()
    }

    pub fn is_windows(&self) -> bool {
        self.windows
            .get_or_compute(|| detection::is_windows(self.system.as_ref()))
    }

    pub fn is_macos(&self) -> bool {
        self.macos
            .get_or_compute(|| detection::is_macos(self.system.as_ref()))
    }

    pub fn is_linux(&self) -> bool {
        self.linux
            .get_or_compute(|| detection::is_linux(self.system.as_ref()))
    }

    pub fn is_freebsd(&self) -> bool {
        self.freebsd
            .get_or_compute(|| detection::is_freebsd(self.system.as_ref()))
    }

    pub fn is_wsl(&self) -> bool {
        self.wsl.get_or_compute(|| detection::is_wsl(self.system.as_ref()))
    }

    pub fn is_termux(&self) -> bool {
        self.termux
            .get_or_compute(|| detection::is_termux(self.system.as_ref()))
    }

    pub fn is_android(&self) -> bool {
        self.android
            .get_or_compute(|| detection::is_android(self.system.as_ref()))
    }

    pub fn is_ish_alpine(&self) -> bool {
        self.ish_alpine
            .get_or_compute(|| detection::is_ish_alpine(self.system.as_ref()))
    }

    pub fn is_sandboxed_mobile_ide(&self) -> bool {
        self.mobile_ide.get_or_compute(|| {
            detection::is_sandboxed_mobile_ide(
                self.system.as_ref(),
                self.is_android(),
                self.interpreter.as_deref(),
            )
        })
    }

    pub fn family(&self) -> Option<PlatformTag> {
        if self.is_windows() {
            Some(PlatformTag::Windows)
        } else if self.is_macos() {
            Some(PlatformTag::MacOs)
        } else if self.is_freebsd() {
            Some(PlatformTag::FreeBsd)
        } else if self.is_linux() {
            Some(PlatformTag::Linux)
        } else {
            None
        }
    }

    /// The first matching Linux variant, most specific first.
    pub fn variant(&self) -> Option<PlatformTag> {
        let checks: [(PlatformTag, fn(&Self) -> bool); 5] = [
            (PlatformTag::Wsl, Self::is_wsl),
            (PlatformTag::IshAlpine, Self::is_ish_alpine),
            (PlatformTag::Termux, Self::is_termux),
            (PlatformTag::SandboxedMobileIde, Self::is_sandboxed_mobile_ide),
            (PlatformTag::Android, Self::is_android),
        ];
        checks
            .into_iter()
            .find_map(|(tag, check)| check(self).then_some(tag))
    }

    pub fn identify(&self) -> PlatformReport {
        let report = PlatformReport {
            family: self.family(),
            variant: self.variant(),
        };
        log::debug!("Platform: {report:?}");
        report
    }

    /// Forget every memoized answer.
    pub fn reset(&self) {
        for memo in [
            &self.windows,
            &self.macos,
            &self.linux,
            &self.freebsd,
            &self.wsl,
            &self.termux,
            &self.android,
            &self.ish_alpine,
            &self.mobile_ide,
        ] {
            memo.reset();
        }
    }
}
