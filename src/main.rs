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
use anyhow::{anyhow, Context};
use ext_authz::{
    authorizer::GeoFencingAuthorizer,
    config::Settings,
    server::{CalloutServer, ServerResult},
};
use log::info;
use tokio::task::JoinError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Optional path to a JSON settings file
    let args: Vec<String> = std::env::args().collect();
    let settings =
        Settings::load(args.get(1).map(String::as_str)).context("failed to load settings")?;

    let authorizer = GeoFencingAuthorizer::new(&settings.lookup)?;
    let server = CalloutServer::new(settings.server);

    let authz = server.spawn_authz(authorizer.clone()).await;
    let health = server.spawn_health_check().await;

    // Either listener ending takes the whole process down.
    let outcome = tokio::select! {
        joined = authz => listener_stopped("authorization", joined),
        joined = health => listener_stopped("health check", joined),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    authorizer.close();
    outcome
}

fn listener_stopped(
    name: &str,
    joined: Result<ServerResult, JoinError>,
) -> anyhow::Result<()> {
    match joined {
        Ok(Ok(())) => Err(anyhow!("{} server stopped", name)),
        Ok(Err(e)) => Err(anyhow!("{} server failed: {}", name, e)),
        Err(e) => Err(e).with_context(|| format!("{} server task failed", name)),
    }
}
