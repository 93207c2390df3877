// src/project/store.rs
// Filesystem store for cloned projects. Every project is one subdirectory of
// the configured clone root, with a metadata sidecar under `.recast/`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::github::RepoCandidate;

const SIDECAR_DIR: &str = ".recast";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project not found: {0}")]
    NotFound(String),

    #[error("invalid project name: {0}")]
    InvalidName(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("file is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Metadata snapshot written next to a fresh clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Stable attachment id, minted at clone time.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    pub cloned_at: DateTime<Utc>,
}

impl ProjectMetadata {
    pub fn from_candidate(candidate: &RepoCandidate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: candidate.name.clone(),
            full_name: candidate.full_name.clone(),
            description: candidate.description.clone(),
            html_url: candidate.html_url.clone(),
            clone_url: candidate.clone_url.clone(),
            language: candidate.language.clone(),
            stars: candidate.stars,
            forks: candidate.forks,
            topics: candidate.topics.clone(),
            cloned_at: Utc::now(),
        }
    }
}

/// One entry in a project listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    pub is_git_repo: bool,
    pub metadata: Option<ProjectMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNodeType {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub node_type: FileNodeType,
    pub size: Option<u64>,
}

#[derive(Clone)]
pub struct ProjectStore {
    clone_dir: PathBuf,
}

impl ProjectStore {
    /// Create a store rooted at `clone_dir` (created if missing).
    pub fn new<P: AsRef<Path>>(clone_dir: P) -> Self {
        let _ = fs::create_dir_all(&clone_dir);
        Self {
            clone_dir: clone_dir.as_ref().to_path_buf(),
        }
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    /// Project names become path components, so anything that could escape
    /// the clone root is refused outright.
    pub fn validate_name(name: &str) -> Result<(), ProjectError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return Err(ProjectError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    pub fn project_path(&self, name: &str) -> Result<PathBuf, ProjectError> {
        Self::validate_name(name)?;
        Ok(self.clone_dir.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.project_path(name).map(|p| p.is_dir()).unwrap_or(false)
    }

    pub async fn write_metadata(
        &self,
        name: &str,
        metadata: &ProjectMetadata,
    ) -> Result<(), ProjectError> {
        let sidecar = self.project_path(name)?.join(SIDECAR_DIR);
        tokio::fs::create_dir_all(&sidecar).await?;
        let body = serde_json::to_vec_pretty(metadata)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        tokio::fs::write(sidecar.join(METADATA_FILE), body).await?;
        Ok(())
    }

    pub async fn read_metadata(&self, name: &str) -> Option<ProjectMetadata> {
        let path = self.project_path(name).ok()?.join(SIDECAR_DIR).join(METADATA_FILE);
        let body = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&body).ok()
    }

    /// All cloned projects, with metadata when the sidecar is readable.
    pub async fn list_projects(&self) -> Result<Vec<ProjectInfo>, ProjectError> {
        let mut projects = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.clone_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            projects.push(ProjectInfo {
                is_git_repo: path.join(".git").is_dir(),
                metadata: self.read_metadata(&name).await,
                path: path.to_string_lossy().to_string(),
                name,
            });
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    /// Flat file tree for a project, skipping `.git` and the sidecar.
    pub fn file_tree(&self, name: &str) -> Result<Vec<FileNode>, ProjectError> {
        let root = self.project_path(name)?;
        if !root.is_dir() {
            return Err(ProjectError::NotFound(name.to_string()));
        }

        let mut nodes = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                name != ".git" && name != SIDECAR_DIR
            })
            .filter_map(|e| e.ok())
        {
            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let node_type = if entry.file_type().is_dir() {
                FileNodeType::Directory
            } else {
                FileNodeType::File
            };
            nodes.push(FileNode {
                name: entry.file_name().to_string_lossy().to_string(),
                size: match node_type {
                    FileNodeType::File => entry.metadata().ok().map(|m| m.len()),
                    FileNodeType::Directory => None,
                },
                path: rel,
                node_type,
            });
        }
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(nodes)
    }

    /// Read one file, refusing anything that resolves outside the project
    /// directory (symlinks and `..` both canonicalize away).
    pub async fn read_file(&self, name: &str, rel_path: &str) -> Result<String, ProjectError> {
        let root = self.project_path(name)?;
        if !root.is_dir() {
            return Err(ProjectError::NotFound(name.to_string()));
        }
        let root = root.canonicalize()?;
        let candidate = root.join(rel_path);
        let resolved = candidate
            .canonicalize()
            .map_err(|_| ProjectError::FileNotFound(rel_path.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(ProjectError::AccessDenied(rel_path.to_string()));
        }
        if !resolved.is_file() {
            return Err(ProjectError::FileNotFound(rel_path.to_string()));
        }
        let bytes = tokio::fs::read(&resolved).await?;
        String::from_utf8(bytes).map_err(|_| ProjectError::NotUtf8(rel_path.to_string()))
    }

    pub async fn remove_project(&self, name: &str) -> Result<(), ProjectError> {
        let path = self.project_path(name)?;
        if !path.is_dir() {
            return Err(ProjectError::NotFound(name.to_string()));
        }
        tokio::fs::remove_dir_all(path).await?;
        Ok(())
    }

    /// Total on-disk size of a project in bytes; 0 when absent.
    pub fn project_size(&self, name: &str) -> u64 {
        let Ok(root) = self.project_path(name) else { return 0 };
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }
}

/// Source files eligible for the rewrite pipeline: known text extensions,
/// under the size cap, outside `.git` and the sidecar.
pub fn collect_source_files(root: &Path, max_bytes: u64) -> Vec<PathBuf> {
    const EXTENSIONS: &[&str] = &[
        "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "rb", "php",
        "cs", "swift", "kt", "scala", "sh",
    ];

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            name != ".git" && name != SIDECAR_DIR && name != "node_modules" && name != "target"
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTENSIONS.contains(&ext))
                .unwrap_or(false)
        })
        .filter(|e| e.metadata().map(|m| m.len() <= max_bytes).unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
