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
//! Test doubles shared by the module tests: a fake geolocation provider
//! served over real HTTP, and in-process `GeoLookup` fakes.

use crate::lookup::{decode_response, GeoLocationRecord, GeoLookup, LookupError};
use async_trait::async_trait;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const LONDON: &str =
    r#"{"status":"success","lat":51.5,"lon":-0.12,"countryCode":"GB","region":"ENG","city":"London"}"#;

pub const FAIL: &str = r#"{"status":"fail"}"#;

pub struct FakeReply {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl FakeReply {
    pub fn json(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct FakeProvider {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl FakeProvider {
    /// Base URL to configure the lookup client with.
    pub fn endpoint(&self) -> String {
        format!("http://{}/json", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `handler` on an ephemeral local port. The handler receives the
/// request path, e.g. `/json/1.2.3.4`.
pub fn spawn_provider<F>(handler: F) -> FakeProvider
where
    F: Fn(&str) -> FakeReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake provider");
    let addr = listener.local_addr().expect("fake provider address");
    let handler = Arc::new(handler);
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let make_service = make_service_fn(move |_| {
        let handler = handler.clone();
        let counter = counter.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = (*handler)(req.uri().path());
                async move {
                    if !reply.delay.is_zero() {
                        tokio::time::sleep(reply.delay).await;
                    }
                    let mut response = Response::new(Body::from(reply.body));
                    *response.status_mut() = reply.status;
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::from_tcp(listener)
        .expect("fake provider listener")
        .serve(make_service);
    tokio::spawn(server);

    FakeProvider { addr, hits }
}

/// An endpoint nothing listens on.
pub fn unused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{}/json", addr)
}

/// Answers every lookup with a canned outcome and counts calls.
pub struct StaticLookup {
    outcome: Result<GeoLocationRecord, LookupError>,
    calls: Arc<AtomicUsize>,
}

impl StaticLookup {
    pub fn body(body: &str) -> Self {
        Self::outcome(decode_response(body.as_bytes()))
    }

    pub fn outcome(outcome: Result<GeoLocationRecord, LookupError>) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl GeoLookup for StaticLookup {
    async fn lookup(&self, _ip: &str) -> Result<GeoLocationRecord, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
