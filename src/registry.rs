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

//! Named checks, for listing and for running by name.

use crate::classify::FormatClassification;
use crate::error::{HabitatError, Result};
use crate::habitat::Habitat;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Build,
    Platform,
    Capability,
    Executable,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 4] = [
        CheckCategory::Build,
        CheckCategory::Platform,
        CheckCategory::Capability,
        CheckCategory::Executable,
    ];
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckCategory::Build => "build",
            CheckCategory::Platform => "platform",
            CheckCategory::Capability => "capability",
            CheckCategory::Executable => "executable",
        };
        f.write_str(name)
    }
}

/// Checks receive the path under inspection; only executable checks use it.
pub type CheckHandler = fn(&Habitat, Option<&Path>) -> bool;

#[derive(Clone, Copy)]
pub struct CheckEntry {
    pub name: &'static str,
    pub category: CheckCategory,
    pub description: &'static str,
    pub handler: CheckHandler,
}

impl fmt::Debug for CheckEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckEntry")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl CheckEntry {
    pub fn run(&self, habitat: &Habitat, path: Option<&Path>) -> bool {
        let value = (self.handler)(habitat, path);
        log::debug!("{} = {value}", self.name);
        value
    }
}

macro_rules! check {
    ($name:literal, $category:ident, $description:literal, $handler:path) => {
        CheckEntry {
            name: $name,
            category: CheckCategory::$category,
            description: $description,
            handler: $handler,
        }
    };
}

pub static CHECKS: &[CheckEntry] = &[
    check!("is_frozen", Build, "Running from a bundler bootloader", is_frozen),
    check!("is_single_file_bundle", Build, "Running from a one-file bundle extraction directory", is_single_file_bundle),
    check!("is_sandboxed_package", Build, "Process has an MSIX/AppX package identity", is_sandboxed_package),
    check!("on_windows", Platform, "Windows", on_windows),
    check!("on_macos", Platform, "macOS", on_macos),
    check!("on_linux", Platform, "Linux kernel (Android included)", on_linux),
    check!("on_freebsd", Platform, "FreeBSD", on_freebsd),
    check!("on_wsl", Platform, "Windows Subsystem for Linux", on_wsl),
    check!("on_termux", Platform, "Termux on Android", on_termux),
    check!("on_android", Platform, "Android", on_android),
    check!("on_ish_alpine", Platform, "iSH Alpine on iOS", on_ish_alpine),
    check!("on_sandboxed_mobile_ide", Platform, "Interpreter hosted by an Android IDE app", on_sandboxed_mobile_ide),
    check!("can_spawn_shell", Capability, "A no-op shell command exits cleanly", can_spawn_shell),
    check!("shell_available", Capability, "The default shell is on PATH", shell_available),
    check!("interactive_terminal_available", Capability, "Prompts on stdin/stdout will reach a user", interactive_terminal_available),
    check!("ci_or_noninteractive", Capability, "CI, container, or no terminal attached", ci_or_noninteractive),
    check!("gui_plotting_available", Capability, "A display server accepts a window round trip", gui_plotting_available),
    check!("headless_image_export_available", Capability, "A figure renders to PNG in memory", headless_image_export_available),
    check!("web_browser_available", Capability, "A browser launcher is available", web_browser_available),
    check!("path_is_valid", Executable, "Path is an existing, standalone regular file", path_is_valid),
    check!("is_elf", Executable, "ELF header", is_elf),
    check!("is_pe", Executable, "PE (MZ) header", is_pe),
    check!("is_macho", Executable, "Mach-O header", is_macho),
    check!("is_zip_bundle", Executable, "Zip application bundle", is_zip_bundle),
    check!("is_plain_script", Executable, "Plain source script", is_plain_script),
    check!("is_isolated_install", Executable, "Managed by an isolated-install tool", is_isolated_install),
    check!("is_source_tree", Executable, "Inside a version-control work tree", is_source_tree),
];

pub fn find_check(name: &str) -> Option<&'static CheckEntry> {
    CHECKS.iter().find(|entry| entry.name == name)
}

pub fn checks_in(category: CheckCategory) -> impl Iterator<Item = &'static CheckEntry> {
    CHECKS.iter().filter(move |entry| entry.category == category)
}

pub fn run_check(habitat: &Habitat, name: &str, path: Option<&Path>) -> Result<bool> {
    let entry = find_check(name).ok_or_else(|| HabitatError::UnknownCheck(name.to_string()))?;
    Ok(entry.run(habitat, path))
}

fn is_frozen(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.detector().is_frozen()
}

fn is_single_file_bundle(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.detector().is_single_file_bundle()
}

fn is_sandboxed_package(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.detector().is_sandboxed_package()
}

fn on_windows(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_windows()
}

fn on_macos(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_macos()
}

fn on_linux(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_linux()
}

fn on_freebsd(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_freebsd()
}

fn on_wsl(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_wsl()
}

fn on_termux(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_termux()
}

fn on_android(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_android()
}

fn on_ish_alpine(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_ish_alpine()
}

fn on_sandboxed_mobile_ide(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.platform().is_sandboxed_mobile_ide()
}

fn can_spawn_shell(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().can_spawn_shell()
}

fn shell_available(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().shell_available()
}

fn interactive_terminal_available(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().interactive_terminal_available()
}

fn ci_or_noninteractive(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().ci_or_noninteractive()
}

fn gui_plotting_available(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().gui_plotting_available()
}

fn headless_image_export_available(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().headless_image_export_available()
}

fn web_browser_available(habitat: &Habitat, _: Option<&Path>) -> bool {
    habitat.capabilities().web_browser_available()
}

fn path_is_valid(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.resolve(path).valid
}

fn is_elf(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.classify(path) == FormatClassification::Elf
}

fn is_pe(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.classify(path) == FormatClassification::Pe
}

fn is_macho(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.classify(path) == FormatClassification::MachO
}

fn is_zip_bundle(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.classify(path) == FormatClassification::ZipArchive
}

fn is_plain_script(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.classify(path) == FormatClassification::PlainScript
}

fn is_isolated_install(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.detector().is_isolated_install(path)
}

fn is_source_tree(habitat: &Habitat, path: Option<&Path>) -> bool {
    habitat.detector().is_source_tree(path)
}
