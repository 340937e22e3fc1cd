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
use crate::config::{ConfigError, LookupConfig};
use crate::decision::{self, Decision};
use crate::extract;
use crate::headers::RequestHeaders;
use crate::lookup::{GeoLookup, GeoLookupClient};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// Decides whether a request may proceed, given its headers.
///
/// Implementations must be callable from many tasks at once; failures are
/// folded into a deny rather than returned.
#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    async fn authorize(&self, headers: &RequestHeaders) -> Decision;
}

/// Allows requests whose client address resolves to a location, and tags
/// them with an `x-geolocation` header.
#[derive(Clone)]
pub struct GeoFencingAuthorizer {
    lookup: Arc<dyn GeoLookup>,
}

impl GeoFencingAuthorizer {
    /// Builds the authorizer around a pooled provider client.
    pub fn new(config: &LookupConfig) -> Result<Self, ConfigError> {
        let client = GeoLookupClient::new(config)?;
        info!(
            "Parsed geofencing config: endpoint={}, timeout={:?}, pool_size={}",
            config.base_url(),
            config.request_timeout(),
            config.connection_pool_size
        );
        Ok(Self::with_lookup(client))
    }

    pub fn with_lookup<L: GeoLookup>(lookup: L) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Releases the lookup client; later requests are denied.
    pub fn close(&self) {
        self.lookup.close();
    }
}

#[async_trait]
impl Authorizer for GeoFencingAuthorizer {
    async fn authorize(&self, headers: &RequestHeaders) -> Decision {
        let ip = match extract::client_ip(headers) {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Could not get client address, denying access: {}", e);
                return Decision::deny();
            }
        };
        debug!("ip address: {}", ip);

        let outcome = self.lookup.lookup(&ip).await;
        debug!("geolocation outcome for {}: {:?}", ip, outcome);

        decision::build(&outcome)
    }
}
