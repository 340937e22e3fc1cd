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
use crate::headers::RequestHeaders;
use thiserror::Error;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no x-forwarded-for header")]
    NoClientIp,
}

/// Returns the client address from the forwarded-for chain.
///
/// The chain is client-first, so the first comma-separated element is the
/// candidate. The address is not validated; a malformed one simply fails
/// the lookup later.
pub fn client_ip(headers: &RequestHeaders) -> Result<String, ExtractError> {
    let chain = headers
        .get(FORWARDED_FOR_HEADER)
        .ok_or(ExtractError::NoClientIp)?;

    let first = chain.split(',').next().unwrap_or_default().trim();
    if first.is_empty() {
        return Err(ExtractError::NoClientIp);
    }

    Ok(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: &str, value: &str) -> RequestHeaders {
        vec![(name, value)].into_iter().collect()
    }

    #[test]
    fn test_first_element_of_chain() {
        let headers = headers_with("X-Forwarded-For", "1.2.3.4, 5.6.7.8");
        assert_eq!(client_ip(&headers), Ok("1.2.3.4".to_string()));
    }

    #[test]
    fn test_single_address_is_trimmed() {
        let headers = headers_with("x-forwarded-for", "  9.9.9.9 ");
        assert_eq!(client_ip(&headers), Ok("9.9.9.9".to_string()));
    }

    #[test]
    fn test_ipv6_address() {
        let headers = headers_with("x-forwarded-for", "2001:db8::1,10.0.0.1");
        assert_eq!(client_ip(&headers), Ok("2001:db8::1".to_string()));
    }

    #[test]
    fn test_missing_header() {
        let headers = headers_with("Host", "example.com");
        assert_eq!(client_ip(&headers), Err(ExtractError::NoClientIp));
    }

    #[test]
    fn test_blank_header() {
        assert_eq!(
            client_ip(&headers_with("x-forwarded-for", "")),
            Err(ExtractError::NoClientIp)
        );
        assert_eq!(
            client_ip(&headers_with("x-forwarded-for", "   ")),
            Err(ExtractError::NoClientIp)
        );
    }

    #[test]
    fn test_leading_separator_yields_no_client_ip() {
        let headers = headers_with("x-forwarded-for", " , 5.6.7.8");
        assert_eq!(client_ip(&headers), Err(ExtractError::NoClientIp));
    }

    #[test]
    fn test_malformed_address_is_passed_through() {
        let headers = headers_with("x-forwarded-for", "not-an-ip, 5.6.7.8");
        assert_eq!(client_ip(&headers), Ok("not-an-ip".to_string()));
    }
}
