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

//! Binary format family classification from header bytes.
//!
//! Only the leading signature is inspected. Zip bundles are the exception:
//! a matching file name is not enough, the archive's central directory must
//! also parse.

pub mod archive;
pub mod magic;

use crate::config::ClassifyConfig;
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub use archive::is_valid_zip;
pub use magic::read_magic_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatClassification {
    Elf,
    Pe,
    MachO,
    ZipArchive,
    PlainScript,
    Unknown,
}

impl fmt::Display for FormatClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatClassification::Elf => write!(f, "ELF"),
            FormatClassification::Pe => write!(f, "PE"),
            FormatClassification::MachO => write!(f, "Mach-O"),
            FormatClassification::ZipArchive => write!(f, "zip archive"),
            FormatClassification::PlainScript => write!(f, "plain script"),
            FormatClassification::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicByteClassifier {
    zip_bundle_suffix: String,
    script_suffix: String,
}

impl Default for MagicByteClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifyConfig::default())
    }
}

impl MagicByteClassifier {
    pub fn new(zip_bundle_suffix: impl Into<String>, script_suffix: impl Into<String>) -> Self {
        Self {
            zip_bundle_suffix: zip_bundle_suffix.into(),
            script_suffix: script_suffix.into(),
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self::new(&config.zip_bundle_suffix, &config.script_suffix)
    }

    /// Classify the file at `path`. Any read failure yields `Unknown`.
    pub fn classify(&self, path: &Path) -> FormatClassification {
        let Some(header) = read_magic_bytes(path, magic::HEADER_LEN) else {
            return FormatClassification::Unknown;
        };

        let classification = if magic::is_elf_header(&header) {
            FormatClassification::Elf
        } else if magic::is_pe_header(&header) {
            FormatClassification::Pe
        } else if magic::is_macho_header(&header) {
            FormatClassification::MachO
        } else if has_suffix(path, &self.zip_bundle_suffix) && is_valid_zip(path) {
            FormatClassification::ZipArchive
        } else if has_suffix(path, &self.script_suffix) {
            FormatClassification::PlainScript
        } else {
            FormatClassification::Unknown
        };

        log::debug!("{} classified as {classification}", path.display());
        classification
    }

    pub fn is_elf(&self, path: &Path) -> bool {
        self.classify(path) == FormatClassification::Elf
    }

    pub fn is_pe(&self, path: &Path) -> bool {
        self.classify(path) == FormatClassification::Pe
    }

    pub fn is_macho(&self, path: &Path) -> bool {
        self.classify(path) == FormatClassification::MachO
    }

    pub fn is_zip_bundle(&self, path: &Path) -> bool {
        self.classify(path) == FormatClassification::ZipArchive
    }

    pub fn is_plain_script(&self, path: &Path) -> bool {
        self.classify(path) == FormatClassification::PlainScript
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_ascii_lowercase();
    let suffix = format!(".{}", suffix.to_ascii_lowercase());
    name.len() > suffix.len() && name.ends_with(&suffix)
}
