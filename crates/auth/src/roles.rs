use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide role attached to an identity.
///
/// Serialized in the upper-snake form used on the wire (`"PROJECT_MANAGER"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalRole {
    Admin,
    ProjectManager,
    Employee,
}

/// Role held within a single project via a membership record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectRole {
    Owner,
    Editor,
    Viewer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl GlobalRole {
    pub const ALL: [GlobalRole; 3] = [GlobalRole::Admin, GlobalRole::ProjectManager, GlobalRole::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::Admin => "ADMIN",
            GlobalRole::ProjectManager => "PROJECT_MANAGER",
            GlobalRole::Employee => "EMPLOYEE",
        }
    }
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 3] = [ProjectRole::Owner, ProjectRole::Editor, ProjectRole::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "OWNER",
            ProjectRole::Editor => "EDITOR",
            ProjectRole::Viewer => "VIEWER",
        }
    }
}

// Parsing is exact: decoded tokens and stored rows must carry the canonical
// spelling, anything else is rejected rather than coerced.
impl FromStr for GlobalRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlobalRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl FromStr for ProjectRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl core::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
