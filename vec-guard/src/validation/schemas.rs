//! Schemas applied at trust boundaries

use serde::{Deserialize, Serialize};

use super::SchemaError;

/// Largest accepted user command, in characters
pub const MAX_USER_COMMAND_LEN: usize = 10_000;
/// Largest accepted path, in characters
pub const MAX_PATH_LEN: usize = 4096;
/// Largest accepted file or response body, in characters
pub const MAX_CONTENT_LEN: usize = 10_000_000;
/// Largest accepted environment variable value, in characters
pub const MAX_ENV_VAR_LEN: usize = 32_768;

/// Validates a raw string and produces a typed value
pub trait Schema {
    type Output;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn validate(&self, input: &str) -> Result<Self::Output, SchemaError>;
}

fn check_len(input: &str, min: usize, max: usize) -> Result<(), SchemaError> {
    let len = input.chars().count();
    if len < min {
        return Err(SchemaError::TooShort { min });
    }
    if len > max {
        return Err(SchemaError::TooLong { max });
    }
    Ok(())
}

/// Direct user commands; surrounding whitespace is trimmed first
#[derive(Debug, Clone, Copy, Default)]
pub struct UserCommandSchema;

impl Schema for UserCommandSchema {
    type Output = String;

    fn name(&self) -> &'static str {
        "user_command"
    }

    fn validate(&self, input: &str) -> Result<String, SchemaError> {
        let trimmed = input.trim();
        check_len(trimmed, 1, MAX_USER_COMMAND_LEN)?;
        Ok(trimmed.to_string())
    }
}

/// File paths; null bytes are rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePathSchema;

impl Schema for FilePathSchema {
    type Output = String;

    fn name(&self) -> &'static str {
        "file_path"
    }

    fn validate(&self, input: &str) -> Result<String, SchemaError> {
        check_len(input, 1, MAX_PATH_LEN)?;
        if input.contains('\0') {
            return Err(SchemaError::NullByte);
        }
        Ok(input.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentSchema;

impl Schema for FileContentSchema {
    type Output = String;

    fn name(&self) -> &'static str {
        "file_content"
    }

    fn validate(&self, input: &str) -> Result<String, SchemaError> {
        check_len(input, 0, MAX_CONTENT_LEN)?;
        Ok(input.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVarSchema;

impl Schema for EnvironmentVarSchema {
    type Output = String;

    fn name(&self) -> &'static str {
        "environment_var"
    }

    fn validate(&self, input: &str) -> Result<String, SchemaError> {
        check_len(input, 0, MAX_ENV_VAR_LEN)?;
        Ok(input.to_string())
    }
}

/// Parsed network API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub status: u16,
    pub body: String,
}

/// JSON `{ "status": number, "body": string }`
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkResponseSchema;

impl Schema for NetworkResponseSchema {
    type Output = NetworkResponse;

    fn name(&self) -> &'static str {
        "network_response"
    }

    fn validate(&self, input: &str) -> Result<NetworkResponse, SchemaError> {
        let response: NetworkResponse =
            serde_json::from_str(input).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        check_len(&response.body, 0, MAX_CONTENT_LEN)?;
        Ok(response)
    }
}
