// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A byte size that (de)serializes as a plain integer but prints in the
/// largest whole unit that divides it evenly.
///
/// Used for config fields such as max HTTP body size, where `100.mb()` reads
/// better at the call site than a bare `104857600`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    #[must_use]
    pub const fn b(n: u64) -> Self { Self(n) }

    #[must_use]
    pub const fn kb(n: u64) -> Self { Self(n * 1024) }

    #[must_use]
    pub const fn mb(n: u64) -> Self { Self(n * 1024 * 1024) }

    #[must_use]
    pub const fn gb(n: u64) -> Self { Self(n * 1024 * 1024 * 1024) }

    #[must_use]
    pub const fn as_bytes(self) -> u64 { self.0 }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(&str, u64); 4] = [
            ("GiB", 1024 * 1024 * 1024),
            ("MiB", 1024 * 1024),
            ("KiB", 1024),
            ("B", 1),
        ];
        for (name, scale) in UNITS {
            if self.0 >= scale && self.0 % scale == 0 {
                return write!(f, "{}{name}", self.0 / scale);
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl Default for ReadableSize {
    fn default() -> Self { Self::mb(1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_largest_whole_unit() {
        assert_eq!(ReadableSize::mb(100).to_string(), "100MiB");
        assert_eq!(ReadableSize::b(512).to_string(), "512B");
        assert_eq!(ReadableSize::kb(2048).to_string(), "2MiB");
    }

    #[test]
    fn serializes_transparently() {
        let size = ReadableSize::mb(8);
        let json = serde_json::to_string(&size).unwrap();
        assert_eq!(json, "8388608");
        let back: ReadableSize = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);
    }
}
