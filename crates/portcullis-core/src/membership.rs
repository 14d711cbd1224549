//! Workspace membership types.

use crate::routing::AuthState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A caller's role within a workspace, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including deletion of the workspace.
    Owner,
    /// Manages members and workspace resources.
    Admin,
    /// Regular member.
    Member,
    /// Read-only access.
    Viewer,
}

impl Role {
    /// Numeric rank; higher outranks lower.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Admin => 2,
            Self::Member => 1,
            Self::Viewer => 0,
        }
    }

    /// Returns `true` if this role is `min` or higher.
    #[must_use]
    pub const fn at_least(&self, min: Role) -> bool {
        self.rank() >= min.rank()
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Summary of the workspace a membership points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSummary {
    /// Workspace id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}

/// A resolved membership. Always references an existing workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Workspace id.
    pub workspace_id: String,
    /// Caller's role in the workspace.
    pub role: Role,
    /// Joined workspace summary.
    pub workspace: WorkspaceSummary,
    /// When the membership was created.
    pub created_at: DateTime<Utc>,
}

/// Membership existence as the gate sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    /// The caller belongs to no workspace.
    None,
    /// The caller belongs to this many workspaces (at least one).
    Some(usize),
    /// The lookup failed. Routed as if there were no workspace.
    Unknown,
}

impl WorkspaceState {
    /// Only a confirmed membership counts.
    #[must_use]
    pub const fn has_workspace(&self) -> bool {
        matches!(self, Self::Some(_))
    }

    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Some(_) => "some",
            Self::Unknown => "unknown",
        }
    }
}

impl From<WorkspaceState> for AuthState {
    fn from(state: WorkspaceState) -> Self {
        if state.has_workspace() {
            Self::AuthenticatedWithWorkspace
        } else {
            Self::AuthenticatedNoWorkspace
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Owner.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Admin));
        assert!(!Role::Member.at_least(Role::Admin));
        assert!(Role::Viewer.at_least(Role::Viewer));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let r: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(r, Role::Viewer);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
        assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
    }

    #[test]
    fn test_workspace_state_fails_closed() {
        assert!(WorkspaceState::Some(2).has_workspace());
        assert!(!WorkspaceState::None.has_workspace());
        assert!(!WorkspaceState::Unknown.has_workspace());
        assert_eq!(
            AuthState::from(WorkspaceState::Unknown),
            AuthState::AuthenticatedNoWorkspace
        );
        assert_eq!(
            AuthState::from(WorkspaceState::Some(1)),
            AuthState::AuthenticatedWithWorkspace
        );
    }
}
