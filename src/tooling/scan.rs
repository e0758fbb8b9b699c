//! Repository tree description for agent context

use crate::tooling::{RepositoryScanner, ToolError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories that never help the agent and can be very large
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "__pycache__"];

/// Renders a sorted, indented file tree with bounded depth and size
#[derive(Debug, Clone)]
pub struct FileTreeScanner {
    max_depth: usize,
    max_entries: usize,
}

impl Default for FileTreeScanner {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_entries: 400,
        }
    }
}

impl FileTreeScanner {
    pub fn new(max_depth: usize, max_entries: usize) -> Self {
        Self {
            max_depth,
            max_entries,
        }
    }

    /// Blocking tree walk
    pub fn describe(&self, root: &Path) -> Result<String, ToolError> {
        let metadata = std::fs::metadata(root).map_err(|e| ToolError::Scan {
            path: root.display().to_string(),
            message: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(ToolError::Scan {
                path: root.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let mut lines = Vec::new();
        let mut truncated = false;
        self.walk(root, 0, &mut lines, &mut truncated);

        if truncated {
            lines.push(format!("... (listing truncated at {} entries)", self.max_entries));
        }

        debug!("Scanned {} entries under {}", lines.len(), root.display());
        Ok(lines.join("\n"))
    }

    fn walk(&self, dir: &Path, depth: usize, lines: &mut Vec<String>, truncated: &mut bool) {
        let mut entries: Vec<(String, PathBuf, bool)> = match std::fs::read_dir(dir) {
            Ok(read) => read
                .filter_map(|e| e.ok())
                .map(|e| {
                    let path = e.path();
                    let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    (e.file_name().to_string_lossy().into_owned(), path, is_dir)
                })
                .collect(),
            // Unreadable subdirectories are listed but not descended into
            Err(_) => return,
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let indent = "  ".repeat(depth);
        for (name, path, is_dir) in entries {
            if lines.len() >= self.max_entries {
                *truncated = true;
                return;
            }

            if is_dir {
                if SKIPPED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                lines.push(format!("{}{}/", indent, name));
                if depth + 1 < self.max_depth {
                    self.walk(&path, depth + 1, lines, truncated);
                }
            } else {
                lines.push(format!("{}{}", indent, name));
            }
        }
    }
}

#[async_trait]
impl RepositoryScanner for FileTreeScanner {
    async fn scan(&self, root: &Path) -> Result<String, ToolError> {
        let scanner = self.clone();
        let root = root.to_path_buf();
        let path = root.display().to_string();

        tokio::task::spawn_blocking(move || scanner.describe(&root))
            .await
            .map_err(|e| ToolError::Scan {
                path,
                message: e.to_string(),
            })?
    }
}
