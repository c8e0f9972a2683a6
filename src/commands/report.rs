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

use crate::error::Result;
use crate::habitat::{Habitat, Inspection};
use crate::platform::PlatformReport;
use crate::registry::{CheckCategory, checks_in};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub value: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryReport {
    pub category: CheckCategory,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub platform: PlatformReport,
    pub interpreter: Option<PathBuf>,
    pub inspection: Inspection,
    pub categories: Vec<CategoryReport>,
}

impl Report {
    pub fn collect(habitat: &Habitat, path: Option<&Path>) -> Self {
        let categories = CheckCategory::ALL
            .into_iter()
            .map(|category| CategoryReport {
                category,
                checks: checks_in(category)
                    .map(|entry| CheckResult {
                        name: entry.name,
                        value: entry.run(habitat, path),
                    })
                    .collect(),
            })
            .collect();

        Self {
            platform: habitat.platform().identify(),
            interpreter: habitat.interpreter_path(),
            inspection: habitat.inspect(path),
            categories,
        }
    }
}

pub struct ReportCommand<'a> {
    habitat: &'a Habitat,
}

impl<'a> ReportCommand<'a> {
    pub fn new(habitat: &'a Habitat) -> Result<Self> {
        Ok(Self { habitat })
    }

    pub fn execute(&self, path: Option<&Path>, json: bool) -> Result<()> {
        let report = Report::collect(self.habitat, path);
        let mut stdout = std::io::stdout();
        if json {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
        } else {
            format_human_readable(&mut stdout, &report)?;
        }
        Ok(())
    }
}

pub fn format_human_readable<W: Write>(writer: &mut W, report: &Report) -> std::io::Result<()> {
    writeln!(writer, "\nHabitat Report")?;
    writeln!(writer, "==============")?;
    writeln!(writer)?;
    writeln!(writer, "Platform:    {}", report.platform)?;
    if let Some(interpreter) = &report.interpreter {
        writeln!(writer, "Interpreter: {}", interpreter.display())?;
    }
    let inspection = &report.inspection;
    match &inspection.resolved {
        Some(resolved) => writeln!(writer, "Path:        {}", resolved.display())?,
        None => writeln!(
            writer,
            "Path:        {} (unresolved)",
            inspection.raw.as_deref().unwrap_or("-")
        )?,
    }
    writeln!(writer, "Format:      {}", inspection.format)?;
    writeln!(writer, "Packaging:   {}", inspection.packaging)?;
    writeln!(writer)?;

    for group in &report.categories {
        let title = group.category.to_string();
        writeln!(writer, "{title}")?;
        writeln!(writer, "{}", "-".repeat(title.len()))?;
        for check in &group.checks {
            let symbol = if check.value { "✓".green() } else { "✗".red() };
            writeln!(writer, "{symbol} {}", check.name)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
