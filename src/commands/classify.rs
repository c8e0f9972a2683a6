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
use crate::habitat::Habitat;
use std::path::Path;

pub struct ClassifyCommand<'a> {
    habitat: &'a Habitat,
}

impl<'a> ClassifyCommand<'a> {
    pub fn new(habitat: &'a Habitat) -> Result<Self> {
        Ok(Self { habitat })
    }

    pub fn execute(&self, path: &Path, json: bool) -> Result<()> {
        if path.is_dir() {
            return Err(HabitatError::NotAFile(path.display().to_string()));
        }
        let inspection = self.habitat.inspect(Some(path));
        if !inspection.exists {
            return Err(HabitatError::PathNotFound(path.display().to_string()));
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        } else {
            println!("format:    {}", inspection.format);
            println!("packaging: {}", inspection.packaging);
            if !inspection.valid {
                println!("note:      not a standalone executable path");
            }
        }
        Ok(())
    }
}
