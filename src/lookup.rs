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
//! # Geolocation Lookup Module
//!
//! This module talks to the external geolocation provider. Every lookup is a
//! single `GET {endpoint}/{ip}` over a shared, pooled HTTP client and is
//! bounded by the configured request timeout.
//!
//! ## Overview
//!
//! - [`GeoLookup`] is the seam the authorizer depends on, so tests (or a
//!   caching layer) can stand in for the network client.
//! - [`GeoLookupClient`] is the hyper-backed implementation. The number of
//!   outbound connections is capped by `connection_pool_size`: idle
//!   connections through the pool limit, in-flight lookups through a
//!   semaphore.
//! - There are no retries and no caching; one failed attempt is final.

use crate::config::{ConfigError, LookupConfig};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Geolocation provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("Geolocation provider did not answer within {0:?}")]
    ProviderTimeout(Duration),
    #[error("Malformed geolocation response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Success,
    Fail,
}

/// A resolved provider answer.
///
/// Only the coordinates, country code, region and city feed the decision;
/// the remaining provider fields are carried along untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocationRecord {
    pub query: String,
    pub status: LookupStatus,
    pub message: Option<String>,
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub region_name: String,
    pub city: String,
    pub zip: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub isp: String,
    pub org: String,
    pub autonomous_system: String,
}

impl GeoLocationRecord {
    pub fn is_success(&self) -> bool {
        self.status == LookupStatus::Success
    }
}

// Wire shape of the provider's JSON body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderResponse {
    #[serde(default)]
    query: String,
    status: LookupStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: String,
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    region_name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    zip: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    isp: String,
    #[serde(default)]
    org: String,
    #[serde(default, rename = "as")]
    autonomous_system: String,
}

/// Decodes a provider body into a record.
///
/// `status` is always required. A successful answer must also carry both
/// coordinates; string fields default to empty.
pub fn decode_response(body: &[u8]) -> Result<GeoLocationRecord, LookupError> {
    let wire: ProviderResponse = serde_json::from_slice(body)
        .map_err(|e| LookupError::MalformedResponse(e.to_string()))?;

    let (latitude, longitude) = match (wire.status, wire.lat, wire.lon) {
        (LookupStatus::Success, Some(lat), Some(lon)) => (lat, lon),
        (LookupStatus::Success, _, _) => {
            return Err(LookupError::MalformedResponse(
                "successful response without lat/lon".to_string(),
            ))
        }
        (LookupStatus::Fail, lat, lon) => (lat.unwrap_or_default(), lon.unwrap_or_default()),
    };

    Ok(GeoLocationRecord {
        query: wire.query,
        status: wire.status,
        message: wire.message,
        country: wire.country,
        country_code: wire.country_code,
        region: wire.region,
        region_name: wire.region_name,
        city: wire.city,
        zip: wire.zip,
        latitude,
        longitude,
        timezone: wire.timezone,
        isp: wire.isp,
        org: wire.org,
        autonomous_system: wire.autonomous_system,
    })
}

#[async_trait]
pub trait GeoLookup: Send + Sync + 'static {
    async fn lookup(&self, ip: &str) -> Result<GeoLocationRecord, LookupError>;

    /// Releases outbound resources. Lookups made afterwards fail.
    fn close(&self) {}
}

pub struct GeoLookupClient {
    client: Client<HttpConnector, Body>,
    base_url: Url,
    request_timeout: Duration,
    permits: Semaphore,
}

impl GeoLookupClient {
    pub fn new(config: &LookupConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let base_url = Url::parse(config.base_url())
            .map_err(|e| ConfigError::InvalidConfig(format!("lookup endpoint: {}", e)))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.request_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder()
            .pool_idle_timeout(config.idle_connection_timeout())
            .pool_max_idle_per_host(config.connection_pool_size)
            .build(connector);

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout(),
            permits: Semaphore::new(config.connection_pool_size),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Builds `{endpoint}/{ip}`, percent-encoding the address as one path
    /// segment so a malformed address still yields a well-formed request.
    ///
    /// Dot segments are refused: URL normalization would drop them and the
    /// provider would resolve the caller instead.
    fn uri_for(&self, ip: &str) -> Result<Uri, LookupError> {
        if ip == "." || ip == ".." {
            return Err(LookupError::ProviderUnreachable(format!(
                "refusing dot segment {:?} as lookup address",
                ip
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LookupError::ProviderUnreachable(format!(
                    "endpoint {} cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(ip);

        url.as_str()
            .parse::<Uri>()
            .map_err(|e| LookupError::ProviderUnreachable(format!("invalid lookup uri: {}", e)))
    }

    async fn fetch(&self, uri: Uri) -> Result<GeoLocationRecord, LookupError> {
        // Held until the body is read so the connection count stays bounded.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LookupError::ProviderUnreachable("lookup client closed".to_string()))?;

        let response = self
            .client
            .get(uri)
            .await
            .map_err(|e| LookupError::ProviderUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::ProviderUnreachable(format!(
                "provider answered {}",
                status
            )));
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| LookupError::ProviderUnreachable(e.to_string()))?;

        decode_response(&body)
    }
}

#[async_trait]
impl GeoLookup for GeoLookupClient {
    async fn lookup(&self, ip: &str) -> Result<GeoLocationRecord, LookupError> {
        let uri = self.uri_for(ip)?;
        debug!("Looking up {} via {}", ip, uri);

        match tokio::time::timeout(self.request_timeout, self.fetch(uri)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::ProviderTimeout(self.request_timeout)),
        }
    }

    fn close(&self) {
        self.permits.close();
    }
}
