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

use std::path::Path;

use chrono::Utc;
use relay_types::{Artifact, ArtifactId};
use sha2::{Digest, Sha256};
use snafu::ResultExt;
use walkdir::WalkDir;

use crate::error::{Result, SnapshotSnafu};

/// Walks `workspace` and turns every regular file into an [`Artifact`],
/// hashing its content so identical outputs across retries get a stable
/// `content_hash`. Hidden directories (dotfiles) are skipped, matching the
/// intent that build caches and VCS metadata never count as output.
pub fn snapshot_workspace(workspace: &Path) -> Result<Vec<Artifact>> {
    if !workspace.exists() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(workspace)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.context(SnapshotSnafu { path: workspace.display().to_string() })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(_) => continue, // best-effort: unreadable files are skipped, not fatal
        };
        let relative_path = entry
            .path()
            .strip_prefix(workspace)
            .unwrap_or(entry.path())
            .display()
            .to_string();

        artifacts.push(Artifact {
            id: ArtifactId::generate(),
            artifact_type: "file".to_string(),
            name: entry.file_name().to_string_lossy().into_owned(),
            relative_path,
            size_bytes: bytes.len() as u64,
            content_hash: hex_sha256(&bytes),
            created_at: Utc::now(),
            mime_type: guess_mime_type(entry.path()),
        });
    }
    Ok(artifacts)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.') && name != ".")
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn guess_mime_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let mime = match ext {
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "rs" | "py" | "js" | "ts" | "go" => "text/x-source-code",
        "log" => "text/plain",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir_snapshot::with_tempdir;

    use super::*;

    mod tempdir_snapshot {
        use std::path::PathBuf;

        pub fn with_tempdir(f: impl FnOnce(&PathBuf)) {
            let dir = std::env::temp_dir().join(format!("relay-executor-test-{}", uuid_like()));
            std::fs::create_dir_all(&dir).unwrap();
            f(&dir);
            let _ = std::fs::remove_dir_all(&dir);
        }

        fn uuid_like() -> u64 {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
        }
    }

    #[test]
    fn snapshot_empty_workspace_returns_no_artifacts() {
        let missing = Path::new("/nonexistent/relay-executor-workspace");
        assert!(snapshot_workspace(missing).unwrap().is_empty());
    }

    #[test]
    fn snapshot_hashes_file_contents() {
        with_tempdir(|dir| {
            let file_path = dir.join("output.txt");
            let mut file = std::fs::File::create(&file_path).unwrap();
            file.write_all(b"hello artifact").unwrap();
            drop(file);

            let artifacts = snapshot_workspace(dir).unwrap();
            assert_eq!(artifacts.len(), 1);
            assert_eq!(artifacts[0].relative_path, "output.txt");
            assert_eq!(artifacts[0].size_bytes, 14);
            assert!(!artifacts[0].content_hash.is_empty());
        });
    }

    #[test]
    fn snapshot_skips_hidden_directories() {
        with_tempdir(|dir| {
            std::fs::create_dir_all(dir.join(".git")).unwrap();
            std::fs::write(dir.join(".git").join("HEAD"), b"ref: refs/heads/main").unwrap();
            std::fs::write(dir.join("main.rs"), b"fn main() {}").unwrap();

            let artifacts = snapshot_workspace(dir).unwrap();
            assert_eq!(artifacts.len(), 1);
            assert_eq!(artifacts[0].name, "main.rs");
        });
    }
}
