//! Audit log records for identity-changing operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::item::ItemId;
use crate::error::CatalogError;

/// Kind of identity change recorded against an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Match,
    Unmatch,
    Merge,
    Unmerge,
    Recast,
    Unlink,
    Delete,
    Undelete,
    Repair,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Match => "match",
            AuditAction::Unmatch => "unmatch",
            AuditAction::Merge => "merge",
            AuditAction::Unmerge => "unmerge",
            AuditAction::Recast => "recast",
            AuditAction::Unlink => "unlink",
            AuditAction::Delete => "delete",
            AuditAction::Undelete => "undelete",
            AuditAction::Repair => "repair",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "match" => AuditAction::Match,
            "unmatch" => AuditAction::Unmatch,
            "merge" => AuditAction::Merge,
            "unmerge" => AuditAction::Unmerge,
            "recast" => AuditAction::Recast,
            "unlink" => AuditAction::Unlink,
            "delete" => AuditAction::Delete,
            "undelete" => AuditAction::Undelete,
            "repair" => AuditAction::Repair,
            other => return Err(CatalogError::storage(format!("unknown audit action: {other}"))),
        })
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub item: ItemId,
    pub action: AuditAction,
    pub before: Option<String>,
    pub after: Option<String>,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(item: ItemId, action: AuditAction) -> Self {
        Self {
            item,
            action,
            before: None,
            after: None,
            actor: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the before/after pair.
    pub fn change(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}
