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
use crate::authorizer::Authorizer;
use crate::headers::RequestHeaders;
use crate::utils::mutations;
use hyper::{Body, Request, Response};
use log::debug;
use std::convert::Infallible;
use std::sync::Arc;

/// Adapts Envoy's HTTP authorization check to an [`Authorizer`].
///
/// Envoy forwards the headers of the request under evaluation; the method
/// and path of the check are not used. Dropping the returned future (the
/// downstream went away) drops the lookup with it.
#[derive(Clone)]
pub struct ExtAuthzService {
    authorizer: Arc<dyn Authorizer>,
}

impl ExtAuthzService {
    pub fn new<A: Authorizer>(authorizer: A) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
        }
    }

    pub async fn check(&self, request: Request<Body>) -> Result<Response<Body>, Infallible> {
        let headers = RequestHeaders::from(request.headers());
        let decision = self.authorizer.authorize(&headers).await;
        debug!(
            "{} {} -> allowed={}",
            request.method(),
            request.uri().path(),
            decision.is_allowed()
        );
        Ok(mutations::decision_response(&decision))
    }
}
