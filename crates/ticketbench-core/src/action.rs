//! Bulk operations that can be queued against records.
//!
//! An [`ActionBase`] is a fully parameterized operation template: "add label
//! `ops`", "link to FOO-1 as blocker". The workbench pairs action bases with
//! records; the executor runs each pair through an [`ActionBackend`].

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::record::Record;

/// The catalog of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    AddComment,
    AddLabel,
    AssignUser,
    LinkRecords,
    Navigate,
}

impl ActionKind {
    pub const ALL: [Self; 5] = [
        Self::AddComment,
        Self::AddLabel,
        Self::AssignUser,
        Self::LinkRecords,
        Self::Navigate,
    ];

    /// Stable key, also the `kind` tag of serialized action bases.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AddComment => "addComment",
            Self::AddLabel => "addLabel",
            Self::AssignUser => "assignUser",
            Self::LinkRecords => "linkRecords",
            Self::Navigate => "navigate",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AddComment => "Add comment",
            Self::AddLabel => "Add label",
            Self::AssignUser => "Assign user",
            Self::LinkRecords => "Link issue",
            Self::Navigate => "Open in browser",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A directed relation type offered by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkType {
    pub name: String,
    /// Phrase read from the inward side, e.g. "is blocked by".
    pub inward: String,
    /// Phrase read from the outward side, e.g. "blocks".
    pub outward: String,
}

/// A fully parameterized operation.
///
/// Two action bases are duplicates iff their [`canonical`](Self::canonical)
/// forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "camelCase")]
pub enum ActionBase {
    AddComment {
        comment: String,
    },
    AddLabel {
        label: String,
    },
    AssignUser {
        user: String,
    },
    #[serde(rename_all = "camelCase")]
    LinkRecords {
        subject_id: String,
        subject_key: String,
        link_type: LinkType,
        subject_is_inward: bool,
        #[serde(default)]
        comment: String,
    },
    Navigate,
}

/// Errors from executing one action against one record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("could not open browser: {0}")]
    Browser(String),
}

impl ActionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Request(_) => ErrorCode::RemoteRequestFailed,
            Self::Decode(_) => ErrorCode::RemoteDecodeFailed,
            Self::Browser(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// The remote mutations an action base can perform.
pub trait ActionBackend: Send + Sync {
    fn add_comment(&self, record: &Record, comment: &str) -> Result<(), ActionError>;

    fn add_label(&self, record: &Record, label: &str) -> Result<(), ActionError>;

    fn assign_user(&self, record: &Record, user: &str) -> Result<(), ActionError>;

    /// Create a `link_type` link from `inward_id` to `outward_id`.
    fn link_records(
        &self,
        link_type: &LinkType,
        inward_id: &str,
        outward_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ActionError>;

    fn open_in_browser(&self, record: &Record) -> Result<(), ActionError>;

    /// Link types offered by the tracker.
    fn link_types(&self) -> Result<Vec<LinkType>, ActionError>;
}

/// Interactive questions asked while building an action base.
///
/// Implementations return [`Cancelled`](crate::error::Cancelled) (wrapped in
/// `anyhow`) when the user backs out.
pub trait ActionPrompts {
    /// Free text; may be empty.
    fn text(&mut self, prompt: &str) -> Result<String>;

    fn pick_label(&mut self) -> Result<String>;

    fn pick_user(&mut self) -> Result<String>;

    /// The record other records get linked to.
    fn pick_link_subject(&mut self) -> Result<Arc<Record>>;

    /// A link type and whether `subject` sits on its inward side.
    fn pick_link_type(&mut self, subject: &Record) -> Result<(LinkType, bool)>;
}

impl ActionBase {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::AddComment { .. } => ActionKind::AddComment,
            Self::AddLabel { .. } => ActionKind::AddLabel,
            Self::AssignUser { .. } => ActionKind::AssignUser,
            Self::LinkRecords { .. } => ActionKind::LinkRecords,
            Self::Navigate => ActionKind::Navigate,
        }
    }

    /// Parameters as a JSON object (`null` for parameterless kinds).
    #[must_use]
    pub fn params(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("params").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Inverse of [`Self::params`].
    ///
    /// # Errors
    ///
    /// Fails when `params` does not match the shape `kind` expects.
    pub fn from_params(kind: ActionKind, params: Value) -> Result<Self, serde_json::Error> {
        let mut tagged = serde_json::Map::new();
        tagged.insert("kind".into(), Value::String(kind.key().into()));
        if !params.is_null() {
            tagged.insert("params".into(), params);
        }
        serde_json::from_value(Value::Object(tagged))
    }

    /// Kind key plus parameters; equal strings mean duplicate actions.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{} {}", self.kind().key(), self.params())
    }

    /// Human description, naming `record` when given.
    #[must_use]
    pub fn describe(&self, record: Option<&Record>) -> String {
        let target = record.map_or("issue", |record| record.key.as_str());
        match self {
            Self::AddComment { comment } => {
                format!("Add comment to {target}: {}", first_line(comment))
            }
            Self::AddLabel { label } => format!("Add label '{label}' to {target}"),
            Self::AssignUser { user } => format!("Assign {target} to {user}"),
            Self::LinkRecords {
                subject_key,
                link_type,
                subject_is_inward,
                ..
            } => {
                let phrase = if *subject_is_inward {
                    &link_type.inward
                } else {
                    &link_type.outward
                };
                format!("Add link: {subject_key} {phrase} {target}")
            }
            Self::Navigate => format!("Open {target} in browser"),
        }
    }

    /// Build an action base of `kind` by asking `prompts`.
    ///
    /// # Errors
    ///
    /// Propagates prompt errors (including cancellation) and rejects an empty
    /// comment for [`ActionKind::AddComment`].
    pub fn build(kind: ActionKind, prompts: &mut dyn ActionPrompts) -> Result<Self> {
        let base = match kind {
            ActionKind::AddComment => {
                let comment = prompts.text("Leave a comment")?;
                if comment.trim().is_empty() {
                    bail!("comment can not be empty");
                }
                Self::AddComment { comment }
            }
            ActionKind::AddLabel => Self::AddLabel {
                label: prompts.pick_label().context("picking a label")?,
            },
            ActionKind::AssignUser => Self::AssignUser {
                user: prompts.pick_user().context("picking a user")?,
            },
            ActionKind::LinkRecords => {
                let subject = prompts.pick_link_subject()?;
                let (link_type, subject_is_inward) = prompts.pick_link_type(&subject)?;
                let comment = prompts.text("Leave a comment (optional)")?;
                Self::LinkRecords {
                    subject_id: subject.id.clone(),
                    subject_key: subject.key.clone(),
                    link_type,
                    subject_is_inward,
                    comment,
                }
            }
            ActionKind::Navigate => Self::Navigate,
        };
        Ok(base)
    }

    /// Run this action against `record`.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports.
    pub fn execute(&self, record: &Record, backend: &dyn ActionBackend) -> Result<(), ActionError> {
        match self {
            Self::AddComment { comment } => backend.add_comment(record, comment),
            Self::AddLabel { label } => backend.add_label(record, label),
            Self::AssignUser { user } => backend.assign_user(record, user),
            Self::LinkRecords {
                subject_id,
                link_type,
                subject_is_inward,
                comment,
                ..
            } => {
                let (inward, outward) = if *subject_is_inward {
                    (subject_id.as_str(), record.id.as_str())
                } else {
                    (record.id.as_str(), subject_id.as_str())
                };
                let comment = Some(comment.as_str()).filter(|c| !c.trim().is_empty());
                backend.link_records(link_type, inward, outward, comment)
            }
            Self::Navigate => backend.open_in_browser(record),
        }
    }
}

impl fmt::Display for ActionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None))
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
