//! Remote procedure call seams
//!
//! The panel talks to the backend through two collaborators: a command
//! transport for module-scoped commands, and a config source for fetching
//! module configuration snapshots. Both are traits so the network layer
//! stays outside this crate.

use crate::domain::audio::ModuleConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by remote calls
#[derive(Debug, Error)]
pub enum RpcError {
    /// No response within the request timeout
    #[error("Command {command} timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    /// The backend processed the command and refused it
    #[error("Command {command} rejected: {message}")]
    Rejected { command: String, message: String },

    /// The request never reached the backend, or the reply was lost
    #[error("Transport error: {0}")]
    Transport(String),

    /// The reply could not be decoded into the expected shape
    #[error("Invalid response to {command}: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// A command addressed to a backend module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub command: String,

    /// Module the command is routed to
    #[serde(rename = "to")]
    pub module: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// `None` means the transport default
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            module: module.into(),
            params: None,
            timeout: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Reply envelope returned by the backend for every command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub error: bool,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Value,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            error: false,
            message: None,
            data,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            data: Value::Null,
        }
    }

    /// Unwrap the envelope into its payload
    pub fn into_data(self, command: &str) -> Result<Value> {
        if self.error {
            return Err(RpcError::Rejected {
                command: command.to_string(),
                message: self
                    .message
                    .unwrap_or_else(|| "no reason given".to_string()),
            });
        }
        Ok(self.data)
    }
}

/// Transport carrying module commands to the backend
///
/// Implementations enforce `CommandRequest::timeout` and never retry.
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse>;
}

/// Source of module configuration snapshots
#[async_trait::async_trait]
pub trait ModuleConfigSource: Send + Sync {
    /// Current configuration of a module, possibly cached
    async fn get_module_config(&self, module: &str) -> Result<ModuleConfig>;

    /// Fresh configuration of a module, bypassing any cache
    async fn reload_module_config(&self, module: &str) -> Result<ModuleConfig>;
}
