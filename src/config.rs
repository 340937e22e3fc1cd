// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! # Configuration Module
//!
//! Strongly typed settings for the geofencing authorizer. Settings are read
//! once from a JSON document and validated before any listener starts, so a
//! bad endpoint or listener address stops the process at startup instead of
//! failing requests later.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

// Malformed JSON and wrong field types are misconfiguration like any other.
impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::InvalidConfig(format!("failed to parse configuration: {}", e))
    }
}

/// Settings for the geolocation provider client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Base URL of the provider; lookups go to `{endpoint}/{ip}`.
    pub endpoint: String,

    /// Upper bound for a whole lookup, including waiting for a connection.
    pub request_timeout_ms: u64,

    /// Maximum number of outbound connections, idle or in flight.
    pub connection_pool_size: usize,

    /// How long an idle pooled connection is kept before it is closed.
    pub idle_connection_timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_ms: 1000,
            connection_pool_size: 50,
            idle_connection_timeout_secs: 30,
        }
    }
}

impl LookupConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }

    /// The endpoint without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "lookup endpoint is required".to_string(),
            ));
        }

        let url = Url::parse(self.base_url()).map_err(|e| {
            ConfigError::InvalidConfig(format!("lookup endpoint {:?}: {}", self.endpoint, e))
        })?;
        // The pooled client speaks plain HTTP only.
        if url.scheme() != "http" {
            return Err(ConfigError::InvalidConfig(format!(
                "lookup endpoint scheme must be http, got {}",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidConfig(format!(
                "lookup endpoint {:?} has no host",
                self.endpoint
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.connection_pool_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "connection_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.idle_connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "idle_connection_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Listener addresses for the authorization and health check servers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub health_check_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            health_check_address: "0.0.0.0:80".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("address", &self.address),
            ("health_check_address", &self.health_check_address),
        ] {
            value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidConfig(format!("server {} {:?}: {}", field, value, e))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub lookup: LookupConfig,
    pub server: ServerConfig,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Resolves settings for the binary.
    ///
    /// An explicit path wins, then the `GEOFENCING_CONFIG` path, then the
    /// defaults with the endpoint taken from `GEOFENCING_ENDPOINT` if set.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var("GEOFENCING_CONFIG") {
            return Self::from_file(path);
        }

        let mut settings = Settings::default();
        if let Ok(endpoint) = std::env::var("GEOFENCING_ENDPOINT") {
            settings.lookup.endpoint = endpoint;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lookup.validate()?;
        self.server.validate()
    }
}
