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
use crate::lookup::{GeoLocationRecord, LookupError};
use log::warn;

pub const GEOLOCATION_HEADER: &str = "x-geolocation";

/// The allow/deny outcome for one request.
///
/// Header additions only exist on an allow, and a header name appears at
/// most once (names compare case-insensitively).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    allowed: bool,
    header_additions: Vec<(String, String)>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            header_additions: Vec::new(),
        }
    }

    pub fn deny() -> Self {
        Self::default()
    }

    /// Adds a header to an allow, replacing an earlier value of the same
    /// name. A deny ignores it.
    pub fn with_header(mut self, name: &str, value: String) -> Self {
        if !self.allowed {
            return self;
        }
        match self
            .header_additions
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.header_additions.push((name.to_string(), value)),
        }
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn header_additions(&self) -> &[(String, String)] {
        &self.header_additions
    }
}

/// `lat=..;lon=..;country=..;region=..;city=..`, always in that order and
/// always with every key, empty values included.
pub fn geolocation_header_value(record: &GeoLocationRecord) -> String {
    format!(
        "lat={};lon={};country={};region={};city={}",
        record.latitude, record.longitude, record.country_code, record.region, record.city
    )
}

/// Fail-closed policy: only a successful lookup allows the request.
pub fn build(outcome: &Result<GeoLocationRecord, LookupError>) -> Decision {
    match outcome {
        Ok(record) if record.is_success() => Decision::allow()
            .with_header(GEOLOCATION_HEADER, geolocation_header_value(record)),
        Ok(record) => {
            warn!(
                "Geolocation lookup for {:?} failed ({}), denying access",
                record.query,
                record.message.as_deref().unwrap_or("no message")
            );
            Decision::deny()
        }
        Err(e) => {
            warn!("Could not get geolocation data, denying access: {}", e);
            Decision::deny()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::decode_response;
    use crate::testing::{FAIL, LONDON};
    use std::time::Duration;

    fn record(body: &str) -> GeoLocationRecord {
        decode_response(body.as_bytes()).expect("valid provider body")
    }

    #[test]
    fn test_success_allows_with_geolocation_header() {
        let decision = build(&Ok(record(LONDON)));

        assert!(decision.is_allowed());
        assert_eq!(
            decision.header_additions(),
            &[(
                "x-geolocation".to_string(),
                "lat=51.5;lon=-0.12;country=GB;region=ENG;city=London".to_string()
            )]
        );
    }

    #[test]
    fn test_empty_fields_keep_their_keys() {
        let decision = build(&Ok(record(r#"{"status":"success","lat":52,"lon":0}"#)));

        assert_eq!(
            decision.header_additions()[0].1,
            "lat=52;lon=0;country=;region=;city="
        );
    }

    #[test]
    fn test_fail_status_denies() {
        let decision = build(&Ok(record(FAIL)));

        assert!(!decision.is_allowed());
        assert!(decision.header_additions().is_empty());
    }

    #[test]
    fn test_every_lookup_error_denies() {
        for error in [
            LookupError::ProviderUnreachable("connection refused".to_string()),
            LookupError::ProviderTimeout(Duration::from_secs(1)),
            LookupError::MalformedResponse("expected value".to_string()),
        ] {
            let decision = build(&Err(error));
            assert_eq!(decision, Decision::deny());
        }
    }

    #[test]
    fn test_with_header_replaces_same_name() {
        let decision = Decision::allow()
            .with_header("X-Geolocation", "first".to_string())
            .with_header("x-geolocation", "second".to_string())
            .with_header("x-other", "value".to_string());

        assert_eq!(decision.header_additions().len(), 2);
        assert_eq!(decision.header_additions()[0].1, "second");
    }

    #[test]
    fn test_deny_ignores_headers() {
        let decision = Decision::deny().with_header("x-geolocation", "value".to_string());
        assert!(decision.header_additions().is_empty());
    }
}
