//! Identifier injection.
//!
//! Every agent and workflow file carries exactly one identifier tag:
//!
//! ```text
//! agents/*.md         ...content...\n\n<!-- CCR-AGENT-ID: <uuid> -->
//! workflow.yaml       # CCR-WORKFLOW-ID: <uuid>\n...content...
//! instructions.md     <!-- CCR-WORKFLOW-ID: <uuid> -->\n...content...
//! ```
//!
//! Injection is idempotent: a file that already has a tag is never rewritten.
//! New tags are written through [`ccr_core::atomic::write_atomic`], so the
//! original bytes are either fully preserved alongside the tag or untouched.

use std::fs;
use std::path::Path;

use ccr_core::{atomic, validate, ResourceId};
use ccr_scanner::ScannedWorkflow;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{io_err, ManagerError};

static AGENT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--\s*CCR-AGENT-ID:\s*([^\s>]*)\s*-->").expect("agent tag pattern compiles")
});

static WORKFLOW_YAML_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#\s*CCR-WORKFLOW-ID:\s*(\S*)\s*$").expect("yaml tag pattern compiles")
});

// First line only: a tag further down is prose, not an identifier.
static WORKFLOW_MD_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A\x{FEFF}?[ \t]*<!--[ \t]*CCR-WORKFLOW-ID:[ \t]*([^\s>]*)[ \t]*-->")
        .expect("md tag pattern compiles")
});

/// How a tag is recognised and where a new one goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    /// `<!-- CCR-AGENT-ID: … -->` appended after one blank line.
    Agent,
    /// `# CCR-WORKFLOW-ID: …` as the first line.
    WorkflowYaml,
    /// `<!-- CCR-WORKFLOW-ID: … -->` as the first line.
    WorkflowMarkdown,
}

impl TagStyle {
    fn pattern(self) -> &'static Regex {
        match self {
            TagStyle::Agent => &AGENT_TAG,
            TagStyle::WorkflowYaml => &WORKFLOW_YAML_TAG,
            TagStyle::WorkflowMarkdown => &WORKFLOW_MD_TAG,
        }
    }

    pub fn render(self, id: &ResourceId) -> String {
        match self {
            TagStyle::Agent => format!("<!-- CCR-AGENT-ID: {id} -->"),
            TagStyle::WorkflowYaml => format!("# CCR-WORKFLOW-ID: {id}"),
            TagStyle::WorkflowMarkdown => format!("<!-- CCR-WORKFLOW-ID: {id} -->"),
        }
    }

    /// Raw value of the tag identifying `text`, unvalidated.
    ///
    /// Agent tags are appended, so the last well-formed one wins. A malformed
    /// agent tag is only reported when it ends the file; elsewhere in the
    /// body it is treated as ordinary text.
    pub fn find(self, text: &str) -> Option<&str> {
        match self {
            TagStyle::Agent => {
                let tags: Vec<_> = self.pattern().captures_iter(text).collect();
                let valid = tags
                    .iter()
                    .rev()
                    .filter_map(|c| c.get(1))
                    .find(|v| validate::is_valid_id(v.as_str()));
                if let Some(value) = valid {
                    return Some(value.as_str());
                }
                tags.last()
                    .filter(|c| c.get(0).is_some_and(|m| text[m.end()..].trim().is_empty()))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str())
            }
            TagStyle::WorkflowYaml | TagStyle::WorkflowMarkdown => self
                .pattern()
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
        }
    }

    pub fn insert(self, content: &str, tag: &str) -> String {
        match self {
            TagStyle::Agent => append_tag(content, tag),
            TagStyle::WorkflowYaml | TagStyle::WorkflowMarkdown => prepend_tag(content, tag),
        }
    }
}

/// Result of [`ensure_agent_id`] / [`ensure_workflow_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub id: ResourceId,
    /// `true` when a new tag was written during this call.
    pub written: bool,
}

/// Append `tag` so that exactly one blank line separates it from `content`.
///
/// An empty file becomes just the tag. Line endings follow the file: CRLF
/// content gets CRLF separators.
pub fn append_tag(content: &str, tag: &str) -> String {
    if content.is_empty() {
        return tag.to_string();
    }
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing = content
        .bytes()
        .rev()
        .take_while(|b| matches!(b, b'\n' | b'\r'))
        .filter(|b| *b == b'\n')
        .count();
    let separator = match trailing {
        0 => newline.repeat(2),
        1 => newline.to_string(),
        _ => String::new(),
    };
    format!("{content}{separator}{tag}")
}

/// Insert `tag` as the first line of `content`.
pub fn prepend_tag(content: &str, tag: &str) -> String {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    format!("{tag}{newline}{content}")
}

/// Read and validate the tag in `path`, if any.
pub fn read_tag(path: &Path, style: TagStyle) -> Result<Option<ResourceId>, ManagerError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    existing_tag(path, &text, style)
}

fn existing_tag(path: &Path, text: &str, style: TagStyle) -> Result<Option<ResourceId>, ManagerError> {
    match style.find(text) {
        None => Ok(None),
        Some(value) if validate::is_valid_id(value) => Ok(Some(ResourceId::from(value))),
        Some(value) => Err(ManagerError::InvalidTag {
            path: path.to_path_buf(),
            value: value.to_string(),
        }),
    }
}

/// Return the agent file's identifier, tagging the file first if needed.
pub fn ensure_agent_id(path: &Path) -> Result<Injection, ManagerError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if let Some(id) = existing_tag(path, &text, TagStyle::Agent)? {
        return Ok(Injection { id, written: false });
    }
    let id = write_new_tag(path, &text, TagStyle::Agent)?;
    Ok(Injection { id, written: true })
}

/// Return the workflow's identifier, tagging one of its files if needed.
///
/// Tags are looked for in `workflow.yaml` and `instructions.md`. When both
/// carry a tag and they disagree, `workflow.yaml` wins and the mismatch is
/// logged. A new tag goes into `workflow.yaml` when it exists, otherwise into
/// `instructions.md`.
pub fn ensure_workflow_id(workflow: &ScannedWorkflow) -> Result<Injection, ManagerError> {
    let yaml = match &workflow.descriptor {
        Some(path) => Some((path, fs::read_to_string(path).map_err(|e| io_err(path, e))?)),
        None => None,
    };
    let markdown = match &workflow.instructions {
        Some(path) => Some((path, fs::read_to_string(path).map_err(|e| io_err(path, e))?)),
        None => None,
    };

    let yaml_tag = match &yaml {
        Some((path, text)) => existing_tag(path, text, TagStyle::WorkflowYaml)?,
        None => None,
    };
    let md_tag = match &markdown {
        Some((path, text)) => existing_tag(path, text, TagStyle::WorkflowMarkdown)?,
        None => None,
    };

    match (yaml_tag, md_tag) {
        (Some(y), Some(m)) => {
            if !y.matches(&m.0) {
                tracing::warn!(
                    "workflow {} has conflicting identifiers ({y} in {}, {m} in {}); using {y}",
                    workflow.dir.display(),
                    ccr_scanner::WORKFLOW_DESCRIPTOR,
                    ccr_scanner::WORKFLOW_INSTRUCTIONS,
                );
            }
            return Ok(Injection { id: y, written: false });
        }
        (Some(id), None) | (None, Some(id)) => return Ok(Injection { id, written: false }),
        (None, None) => {}
    }

    let id = match (&yaml, &markdown) {
        (Some((path, text)), _) => write_new_tag(path, text, TagStyle::WorkflowYaml)?,
        (None, Some((path, text))) => write_new_tag(path, text, TagStyle::WorkflowMarkdown)?,
        (None, None) => {
            return Err(io_err(
                &workflow.dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no workflow descriptor"),
            ))
        }
    };
    Ok(Injection { id, written: true })
}

fn write_new_tag(path: &Path, text: &str, style: TagStyle) -> Result<ResourceId, ManagerError> {
    ensure_writable(path)?;
    let id = ResourceId::generate();
    validate::validate_id(&id.0)?;
    let updated = style.insert(text, &style.render(&id));
    // Replace the link target, not the link itself.
    let target = path.canonicalize().map_err(|e| io_err(path, e))?;
    atomic::write_atomic(&target, updated.as_bytes()).map_err(|e| io_err(path, e))?;
    tracing::info!("tagged {} with {id}", path.display());
    Ok(id)
}

fn ensure_writable(path: &Path) -> Result<(), ManagerError> {
    let meta = fs::metadata(path).map_err(|e| io_err(path, e))?;
    if meta.permissions().readonly() {
        return Err(ManagerError::PermissionDenied {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
