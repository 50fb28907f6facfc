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

use derive_more::{AsRef, Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, From, AsRef, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Builds an id from a caller-supplied string, as opposed to generating one.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }

            /// Generates a fresh random id.
            #[must_use]
            pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

            #[must_use]
            pub fn as_str(&self) -> &str { &self.0 }

            #[must_use]
            pub fn into_inner(self) -> String { self.0 }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self { Self(raw.to_owned()) }
        }
    };
}

// Task ids are caller-assigned at submission time and must be unique within a
// driver; the driver never generates one on the submitter's behalf.
string_id!(TaskId, "Identifies a task, assigned by the submitter.");

// Worker, session and artifact ids are driver- or worker-generated.
string_id!(WorkerId, "Identifies a registered worker.");
string_id!(SessionId, "Identifies a worker-local execution session.");
string_id!(ArtifactId, "Identifies a content-addressed task artifact.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_assigned_id_round_trips_through_json() {
        let id = TaskId::from("build-frontend");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"build-frontend\"");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(WorkerId::generate(), WorkerId::generate());
    }
}
