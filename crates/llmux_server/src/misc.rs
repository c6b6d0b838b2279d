/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Minor gateway services: the health probe.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reads the version defined in Cargo.toml at compile time in the format
/// `MAJOR.MINOR.PATCH_BUILD`
#[macro_export]
macro_rules! cargo_crate_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

/// The health probe body.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Health {
    /// Always `ok` while the process can answer at all.
    pub status: String,

    /// The gateway version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// GET `/healthz`: unauthenticated liveness probe.
#[utoipa::path(
get,
path = "/healthz",
responses(
(status = 200, description = "OK", body = Health)
),
)]
pub async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        version: Some(cargo_crate_version!().to_string()),
    })
}

#[cfg(test)]
mod test {
    use axum::routing::get;
    use axum::Router;
    use axum_test::TestServer;

    use super::*;

    #[tokio::test]
    async fn test_axum_router() {
        let router = Router::new().route("/healthz", get(healthz));
        let server = TestServer::new(router).expect("cannot instantiate TestServer");

        let response = server.get("/healthz").await;
        response.assert_status_ok();

        let health: Health = response.json();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version.as_deref(), Some(cargo_crate_version!()));
    }
}
