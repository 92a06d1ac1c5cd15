use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Destination on the remote tier, written as `bucket[/prefix]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl RemoteLocation {
    pub fn new(bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Object key for a file stored at `relative_path` under the media root.
    pub fn key_for(&self, relative_path: &str) -> String {
        let relative_path = relative_path.trim_start_matches('/');
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, relative_path),
            None => relative_path.to_string(),
        }
    }
}

impl FromStr for RemoteLocation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        let (bucket, prefix) = match trimmed.split_once('/') {
            Some((bucket, prefix)) => (bucket, Some(prefix.trim_matches('/').to_string())),
            None => (trimmed, None),
        };
        if bucket.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "remote location '{}' has no bucket",
                s
            )));
        }
        Ok(RemoteLocation::new(bucket, prefix))
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}/{}", self.bucket, prefix),
            None => write!(f, "{}", self.bucket),
        }
    }
}

/// Temporary AWS credentials as pasted by a user, e.g. the output of
/// `aws sts get-session-token`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    pub expiration: DateTime<Utc>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsDocument {
    Wrapped {
        #[serde(rename = "Credentials")]
        credentials: RemoteCredentials,
    },
    Bare(RemoteCredentials),
}

impl RemoteCredentials {
    /// Parse credentials JSON, accepting either the bare object or one nested
    /// under a `Credentials` key.
    pub fn parse(json: &str) -> Result<Self, AppError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|_| AppError::InvalidInput("AWS credentials are not valid JSON".into()))?;
        let document: CredentialsDocument = serde_json::from_value(value).map_err(|e| {
            AppError::InvalidInput(format!("AWS credentials validation failed: {}", e))
        })?;
        Ok(match document {
            CredentialsDocument::Wrapped { credentials } => credentials,
            CredentialsDocument::Bare(credentials) => credentials,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.expiration <= Utc::now()
    }

    pub fn remote_location(&self) -> Result<Option<RemoteLocation>, AppError> {
        self.location.as_deref().map(str::parse).transpose()
    }
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .field("region_name", &self.region_name)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
