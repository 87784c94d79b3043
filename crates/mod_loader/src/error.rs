use serde::{Deserialize, Serialize};

/// Failure reported by extension-authored code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtensionError {
    #[error("Extension failed: {0}")]
    Failed(String),
    #[error("Extension panicked: {0}")]
    Panicked(String),
    #[error("Extension does not support unloading")]
    Unsupported,
}

impl ExtensionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<mod_hooks::HookError> for ExtensionError {
    fn from(err: mod_hooks::HookError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Terminal failure recorded on an extension instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ErrorState {
    #[error("construct failed: {0}")]
    ConstructFailed(String),
    #[error("initialize failed: {0}")]
    InitializeFailed(String),
    #[error("unload failed: {0}")]
    UnloadFailed(String),
}

impl ErrorState {
    pub fn reason(&self) -> &str {
        match self {
            ErrorState::ConstructFailed(reason)
            | ErrorState::InitializeFailed(reason)
            | ErrorState::UnloadFailed(reason) => reason,
        }
    }
}

/// A declared resource request that cannot be planned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("resource request has no group")]
    MissingGroup,
    #[error("invalid resource path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

/// Failure reported by a [`crate::ResourceHost`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Resource group not found: {0}")]
    UnknownGroup(String),
    #[error("Failed to open resource group {group}: {reason}")]
    OpenFailed { group: String, reason: String },
    #[error("Failed to close resource group {group}: {reason}")]
    CloseFailed { group: String, reason: String },
}

/// Misuse of the runtime API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Extension not found: {0}")]
    UnknownExtension(String),
    #[error("Startup has already run")]
    AlreadyStarted,
}
