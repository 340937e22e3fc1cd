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
//! Envoy external authorization service that allows requests whose client
//! address resolves to a geographic location, and denies everything else.
//!
//! Per request: take the client address from `X-Forwarded-For`, look it up
//! with the geolocation provider, allow with an `x-geolocation` header on a
//! successful lookup, deny otherwise.

pub mod authorizer;
pub mod config;
pub mod decision;
pub mod extract;
pub mod headers;
pub mod lookup;
pub mod server;
pub mod service;
pub mod utils;

#[cfg(test)]
mod testing;
