//! Domain vocabulary shared between the store backends and the HTTP API.
//!
//! Wire values (`"2g"`, `"wireless"`, `"completed"`, ...) are fixed: they
//! appear in persisted rows and cached breakdown snapshots, so older data
//! must keep deserializing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Radio/transport technology tag assigned to every processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    #[serde(rename = "2g")]
    G2,
    #[serde(rename = "3g")]
    G3,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "5g")]
    G5,
    #[serde(rename = "other")]
    Other,
}

impl Technology {
    /// All technologies, in breakdown display order.
    pub const ALL: [Technology; 5] = [
        Technology::G2,
        Technology::G3,
        Technology::Lte,
        Technology::G5,
        Technology::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::G2 => "2g",
            Technology::G3 => "3g",
            Technology::Lte => "lte",
            Technology::G5 => "5g",
            Technology::Other => "other",
        }
    }

    /// True for the four radio access technologies (everything but `other`).
    pub fn is_radio(&self) -> bool {
        !matches!(self, Technology::Other)
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2g" => Ok(Technology::G2),
            "3g" => Ok(Technology::G3),
            "lte" => Ok(Technology::Lte),
            "5g" => Ok(Technology::G5),
            "other" => Ok(Technology::Other),
            other => Err(Error::Internal(format!("unknown technology tag: {other}"))),
        }
    }
}

/// Asset category tag. Every row gets exactly one of these three; ambiguous
/// rows default to wireless rather than an "unknown" bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wireless,
    Transport,
    Wireline,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Transport, Category::Wireless, Category::Wireline];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Wireless => "wireless",
            Category::Transport => "transport",
            Category::Wireline => "wireline",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wireless" => Ok(Category::Wireless),
            "transport" => Ok(Category::Transport),
            "wireline" => Ok(Category::Wireline),
            other => Err(Error::Internal(format!("unknown category tag: {other}"))),
        }
    }
}

/// Lifecycle status of an import (one file-upload event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportStatus::Pending),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            other => Err(Error::Internal(format!("unknown import status: {other}"))),
        }
    }
}

/// Which backend served a store operation.
///
/// Reported in API responses so clients can tell when the server is running
/// on the in-memory fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    #[serde(rename = "sqlite")]
    Durable,
    #[serde(rename = "in-memory")]
    Memory,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Durable => "sqlite",
            StorageMode::Memory => "in-memory",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
