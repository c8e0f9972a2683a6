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
use crate::habitat::Habitat;
use crate::registry::run_check;
use std::path::Path;

pub struct CheckCommand<'a> {
    habitat: &'a Habitat,
}

impl<'a> CheckCommand<'a> {
    pub fn new(habitat: &'a Habitat) -> Result<Self> {
        Ok(Self { habitat })
    }

    /// Prints the answer and returns it so the caller can pick the exit code.
    pub fn execute(&self, name: &str, path: Option<&Path>) -> Result<bool> {
        let value = run_check(self.habitat, name, path)?;
        println!("{value}");
        Ok(value)
    }
}
