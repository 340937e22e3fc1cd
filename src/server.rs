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
//! # CalloutServer Module
//!
//! This module provides the server infrastructure for running an Envoy
//! external authorization service over HTTP, plus a health check endpoint.
//!
//! ## Overview
//!
//! The `CalloutServer` is responsible for:
//!
//! - Running the authorization listener that Envoy's `ext_authz` filter
//!   (HTTP service mode) sends its checks to
//! - Running a simple HTTP health check endpoint
//!
//! Envoy only forwards a handful of headers by default, so the filter must
//! list `x-forwarded-for` in its allowed request headers and `x-geolocation`
//! in its allowed upstream headers.

use crate::authorizer::Authorizer;
use crate::config::ServerConfig;
use crate::service::ExtAuthzService;
use futures::Stream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server as HyperServer};
use log::{error, info};
use std::convert::Infallible;
use std::error;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::net::TcpListener;

/// Outcome of a listener task. Listeners only return on failure.
pub type ServerResult = Result<(), Box<dyn error::Error + Send + Sync>>;

/// Server for hosting the authorization service.
///
/// Each listener runs in its own task and can be spawned separately.
#[derive(Clone)]
pub struct CalloutServer {
    config: ServerConfig,
}

/// Adapts a `TcpListener` to hyper's `accept::from_stream`.
struct TcpListenerStream {
    listener: TcpListener,
}

impl Stream for TcpListenerStream {
    type Item = Result<tokio::net::TcpStream, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.listener.poll_accept(cx) {
            Poll::Ready(Ok((socket, _addr))) => Poll::Ready(Some(Ok(socket))),
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Serves authorization checks on an already bound listener.
pub async fn serve_authz<A: Authorizer>(
    listener: TcpListener,
    authorizer: A,
) -> Result<(), hyper::Error> {
    let service = ExtAuthzService::new(authorizer);

    let make_service = make_service_fn(move |_| {
        let service = service.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                let service = service.clone();
                async move { service.check(request).await }
            }))
        }
    });

    HyperServer::builder(hyper::server::accept::from_stream(TcpListenerStream {
        listener,
    }))
    .serve(make_service)
    .await
}

impl CalloutServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Spawns the authorization listener in a new task.
    ///
    /// The task ends with the listener's error, e.g. when the address cannot
    /// be bound.
    pub async fn spawn_authz<A: Authorizer>(
        &self,
        authorizer: A,
    ) -> tokio::task::JoinHandle<ServerResult> {
        let server = self.clone();
        tokio::spawn(async move {
            let result = server.start_authz(authorizer).await;
            if let Err(e) = &result {
                error!("Failed to start authorization server: {}", e);
            }
            result
        })
    }

    /// Spawns the health check HTTP server in a new task.
    ///
    /// The server answers every request with an empty 200 OK.
    pub async fn spawn_health_check(&self) -> tokio::task::JoinHandle<ServerResult> {
        let server = self.clone();
        tokio::spawn(async move {
            let result = server.start_health_check().await;
            if let Err(e) = &result {
                error!("Failed to start health check server: {}", e);
            }
            result
        })
    }

    async fn start_authz<A: Authorizer>(&self, authorizer: A) -> ServerResult {
        let listener = TcpListener::bind(&self.config.address).await?;
        info!("Starting authorization server on {}", self.config.address);

        serve_authz(listener, authorizer).await?;
        Ok(())
    }

    async fn start_health_check(&self) -> ServerResult {
        let listener = TcpListener::bind(&self.config.health_check_address).await?;
        info!(
            "Starting health check server on {}",
            self.config.health_check_address
        );

        let make_service = make_service_fn(|_| async {
            Ok::<_, Infallible>(service_fn(|_| async {
                Ok::<_, Infallible>(Response::new(Body::from("")))
            }))
        });

        let server = HyperServer::builder(hyper::server::accept::from_stream(TcpListenerStream {
            listener,
        }))
        .serve(make_service);

        server.await?;
        Ok(())
    }
}
