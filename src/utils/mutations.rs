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
//! # Mutations Utility Module
//!
//! This module turns authorization decisions into the HTTP responses Envoy's
//! `ext_authz` filter expects from an HTTP authorization service.
//!
//! ## Overview
//!
//! - An allow is a `200 OK`. Every header on it is a candidate for copying
//!   into the upstream request (subject to Envoy's `allowed_upstream_headers`).
//! - A deny is a bare `403 Forbidden`. It carries no body and no hint of why
//!   the request was refused.

use crate::decision::Decision;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Body, Response, StatusCode};
use log::warn;

/// Creates an allow response carrying the given headers.
///
/// Values are taken as raw bytes so non-ASCII text (a city name, say) is
/// passed through unchanged.
///
/// # Arguments
///
/// * `headers_to_add` - (name, value) pairs to set on the response
///
/// # Returns
///
/// The response, or the name of the first header that cannot be encoded
pub fn add_header_response(headers_to_add: &[(String, String)]) -> Result<Response<Body>, String> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;

    for (key, value) in headers_to_add {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| key.clone())?;
        let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| key.clone())?;
        response.headers_mut().insert(name, value);
    }

    Ok(response)
}

/// Creates the deny response: `403 Forbidden` with an empty body.
pub fn add_denied_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}

/// Renders a decision. An allow whose headers cannot be encoded is denied.
pub fn decision_response(decision: &Decision) -> Response<Body> {
    if !decision.is_allowed() {
        return add_denied_response();
    }

    match add_header_response(decision.header_additions()) {
        Ok(response) => response,
        Err(header) => {
            warn!("Header {} is not encodable, denying access", header);
            add_denied_response()
        }
    }
}
