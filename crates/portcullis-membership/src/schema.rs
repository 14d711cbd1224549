//! Versioned row schema returned by the membership store.
//!
//! The join from `workspace_members` to `workspaces` yields at most one
//! workspace per row. [`MembershipRowV1`] declares that cardinality: the
//! `workspace` field is an object or `null`. Any other shape (an array in
//! particular) fails deserialization and therefore the whole query.

use chrono::{DateTime, Utc};
use portcullis_core::{Membership, Role, WorkspaceSummary};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `select` clause matching [`MembershipRowV1`].
pub const MEMBERSHIP_SELECT_V1: &str =
    "workspace_id,role,created_at,workspace:workspaces(id,name,slug)";

/// Joined workspace columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRowV1 {
    /// Workspace id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}

/// One `workspace_members` row with its joined workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRowV1 {
    /// Workspace id.
    pub workspace_id: String,
    /// Member role.
    pub role: Role,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Joined workspace; `None` when the join did not resolve.
    #[serde(default, deserialize_with = "object_or_null")]
    pub workspace: Option<WorkspaceRowV1>,
}

impl MembershipRowV1 {
    /// Converts the row into a [`Membership`]. Rows whose workspace did not
    /// resolve yield `None`.
    pub fn into_membership(self) -> Option<Membership> {
        let workspace = self.workspace?;
        Some(Membership {
            workspace_id: self.workspace_id,
            role: self.role,
            workspace: WorkspaceSummary {
                id: workspace.id,
                name: workspace.name,
                slug: workspace.slug,
            },
            created_at: self.created_at,
        })
    }
}

impl From<Membership> for MembershipRowV1 {
    fn from(m: Membership) -> Self {
        Self {
            workspace_id: m.workspace_id,
            role: m.role,
            created_at: m.created_at,
            workspace: Some(WorkspaceRowV1 {
                id: m.workspace.id,
                name: m.workspace.name,
                slug: m.workspace.slug,
            }),
        }
    }
}

fn object_or_null<'de, D>(deserializer: D) -> Result<Option<WorkspaceRowV1>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value @ Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "workspace must be an object or null, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses a store response body into rows.
pub fn parse_rows(body: &[u8]) -> Result<Vec<MembershipRowV1>, serde_json::Error> {
    serde_json::from_slice(body)
}
