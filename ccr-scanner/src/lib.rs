//! Resource discovery for `ccr-scanner`.
//!
//! [`discover_agents`] lists agent definition files and [`scan_workflows`]
//! lists workflow directories with their descriptor metadata. Both are
//! tolerant: missing directories yield nothing, unreadable entries and broken
//! descriptors are logged and skipped, and neither ever fails the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ccr_core::ResourceLayout;
use thiserror::Error;
use walkdir::WalkDir;

/// Primary workflow descriptor, tagged with `# CCR-WORKFLOW-ID: <uuid>`.
pub const WORKFLOW_DESCRIPTOR: &str = "workflow.yaml";
/// Markdown instructions file, tagged with `<!-- CCR-WORKFLOW-ID: <uuid> -->`.
pub const WORKFLOW_INSTRUCTIONS: &str = "instructions.md";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A workflow directory found under `<bmad>/bmm/workflows/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedWorkflow {
    /// `name` from the descriptor, or the directory name.
    pub name: String,
    /// `description` from the descriptor, or `""`.
    pub description: String,
    /// Absolute path of the workflow directory.
    pub dir: PathBuf,
    /// `workflow.yaml`, if the directory has one.
    pub descriptor: Option<PathBuf>,
    /// `instructions.md`, if the directory has one.
    pub instructions: Option<PathBuf>,
}

/// Why a workflow directory was skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("descriptor {path} is empty")]
    EmptyDescriptor { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Absolute paths of every `<project>/<bmad>/bmm/agents/*.md`, sorted.
///
/// Symlinked agent files are followed. A permission error on an agents
/// directory is logged and yields nothing for that directory.
pub fn discover_agents(project: &Path, layout: &ResourceLayout) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for dir in layout.agent_dirs(project) {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot read agents directory {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry in {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "md") {
                continue;
            }
            // `Path::is_file` follows symlinks; a dangling link is not an agent.
            if path.is_file() {
                found.insert(path);
            } else {
                tracing::debug!("skipping {}: not a regular file", path.display());
            }
        }
    }
    found.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WorkflowFiles {
    descriptor: Option<PathBuf>,
    instructions: Option<PathBuf>,
}

/// Every workflow directory under `<project>/<bmad>/bmm/workflows/`, at any
/// depth, sorted by directory.
///
/// A directory qualifies if it contains `workflow.yaml`, or failing that
/// `instructions.md`. Directories whose descriptor is empty or unparsable are
/// skipped with a warning.
pub fn scan_workflows(project: &Path, layout: &ResourceLayout) -> Vec<ScannedWorkflow> {
    let mut dirs: BTreeMap<PathBuf, WorkflowFiles> = BTreeMap::new();

    for root in layout.workflow_dirs(project) {
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable path under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(parent) = path.parent() else {
                continue;
            };
            let is_descriptor = match entry.file_name().to_str() {
                Some(WORKFLOW_DESCRIPTOR) => true,
                Some(WORKFLOW_INSTRUCTIONS) => false,
                _ => continue,
            };
            let files = dirs.entry(parent.to_path_buf()).or_default();
            if is_descriptor {
                files.descriptor = Some(path.to_path_buf());
            } else {
                files.instructions = Some(path.to_path_buf());
            }
        }
    }

    let mut workflows = Vec::with_capacity(dirs.len());
    for (dir, files) in dirs {
        match describe(&dir, files) {
            Ok(workflow) => workflows.push(workflow),
            Err(e) => tracing::warn!("skipping workflow {}: {e}", dir.display()),
        }
    }
    workflows
}

fn describe(dir: &Path, files: WorkflowFiles) -> Result<ScannedWorkflow, ScanError> {
    let meta = match (&files.descriptor, &files.instructions) {
        (Some(descriptor), _) => parse_descriptor(descriptor)?,
        (None, Some(instructions)) => parse_front_matter(instructions)?,
        (None, None) => DescriptorMeta::default(),
    };
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ScannedWorkflow {
        name: meta.name.unwrap_or(dir_name),
        description: meta.description.unwrap_or_default(),
        dir: dir.to_path_buf(),
        descriptor: files.descriptor,
        instructions: files.instructions,
    })
}

// ---------------------------------------------------------------------------
// Descriptor parsing
// ---------------------------------------------------------------------------

/// The two fields read from a workflow descriptor. Blank values count as
/// missing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DescriptorMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Parse `workflow.yaml`. Comment lines (including the identifier tag) are
/// ignored; a document with no content is [`ScanError::EmptyDescriptor`].
pub fn parse_descriptor(path: &Path) -> Result<DescriptorMeta, ScanError> {
    let text = read(path)?;
    parse_yaml_meta(path, &text)
}

/// Markdown fallback: YAML front matter between leading `---` fences, if any.
/// A leading HTML comment line (the identifier tag) is skipped first.
pub fn parse_front_matter(path: &Path) -> Result<DescriptorMeta, ScanError> {
    let text = read(path)?;
    let mut body = text.as_str();
    while let Some(first) = body.lines().next() {
        if !first.trim_start().starts_with("<!--") {
            break;
        }
        body = body.get(first.len()..).unwrap_or("").trim_start_matches(['\r', '\n']);
    }

    let Some(rest) = body.strip_prefix("---") else {
        return Ok(DescriptorMeta::default());
    };
    let Some(end) = rest.find("\n---") else {
        return Ok(DescriptorMeta::default());
    };
    match parse_yaml_meta(path, &rest[..end]) {
        Ok(meta) => Ok(meta),
        Err(ScanError::EmptyDescriptor { .. }) => Ok(DescriptorMeta::default()),
        Err(e) => Err(e),
    }
}

fn read(path: &Path) -> Result<String, ScanError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::InvalidData => ScanError::Parse {
            path: path.to_path_buf(),
            message: "not valid UTF-8".to_string(),
        },
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn parse_yaml_meta(path: &Path, text: &str) -> Result<DescriptorMeta, ScanError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| ScanError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mapping = match value {
        serde_yaml::Value::Null => {
            return Err(ScanError::EmptyDescriptor {
                path: path.to_path_buf(),
            })
        }
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => {
            return Err(ScanError::Parse {
                path: path.to_path_buf(),
                message: "top level is not a mapping".to_string(),
            })
        }
    };
    Ok(DescriptorMeta {
        name: scalar(mapping.get("name")),
        description: scalar(mapping.get("description")),
    })
}

fn scalar(value: Option<&serde_yaml::Value>) -> Option<String> {
    let s = match value? {
        serde_yaml::Value::String(s) => s.trim().to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
