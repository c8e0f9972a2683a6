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

use std::sync::{Mutex, MutexGuard};

/// A resettable, compute-once boolean.
///
/// The lock is held while the value is computed, so concurrent callers of
/// the same slot wait for the first computation instead of repeating it.
#[derive(Debug, Default)]
pub struct Memo {
    slot: Mutex<Option<bool>>,
}

impl Memo {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> bool) -> bool {
        let mut slot = self.lock();
        if let Some(value) = *slot {
            return value;
        }
        let value = compute();
        *slot = Some(value);
        value
    }

    /// The cached value, if any, without computing.
    pub fn peek(&self) -> Option<bool> {
        *self.lock()
    }

    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<bool>> {
        // A panic inside `compute` never stored a value; the slot is still
        // consistent.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
