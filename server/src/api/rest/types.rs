//! Shared types for REST API
//!
//! Request/response bodies of the storage admin endpoint. Field names are
//! camelCase on the wire.

use crate::storage::ItemError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CopyFile,
    MoveFile,
    RenameFile,
    MoveFolder,
    RenameFolder,
    CreateFolder,
}

pub const VALID_OPERATIONS: &[&str] = &[
    "copyFile",
    "moveFile",
    "renameFile",
    "moveFolder",
    "renameFolder",
    "createFolder",
];

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CopyFile => "copyFile",
            Operation::MoveFile => "moveFile",
            Operation::RenameFile => "renameFile",
            Operation::MoveFolder => "moveFolder",
            Operation::RenameFolder => "renameFolder",
            Operation::CreateFolder => "createFolder",
        }
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copyFile" => Ok(Operation::CopyFile),
            "moveFile" => Ok(Operation::MoveFile),
            "renameFile" => Ok(Operation::RenameFile),
            "moveFolder" => Ok(Operation::MoveFolder),
            "renameFolder" => Ok(Operation::RenameFolder),
            "createFolder" => Ok(Operation::CreateFolder),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// POST body. Which fields are required depends on `operation`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: Option<String>,
    pub source_path: Option<String>,
    pub dest_path: Option<String>,
    pub new_name: Option<String>,
}

/// DELETE body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub file_path: Option<String>,
    pub is_folder: Option<bool>,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ItemError>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ItemError>>,
}
