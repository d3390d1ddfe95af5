// This file is part of the terraform-provider-ciphertrust project
//
// Copyright (C) The terraform-provider-ciphertrust authors, 2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tf_provider::Diagnostics;
use tokio::sync::RwLock;

mod error;
pub mod http;

pub use error::{ApiError, Result};

/// REST verbs exposed by CipherTrust Manager
///
/// Paths are relative to the configured address, eg: `api/v1/cckm/oci/keys`.
/// Implementations classify failures into [`ApiError`] so callers never match
/// on error text.
#[async_trait]
pub trait CipherTrustApi: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch a single object
    async fn get(&self, path: &str) -> Result<Value>;

    /// Fetch a collection, filtered by query parameters
    async fn list(&self, path: &str, filters: &[(&str, &str)]) -> Result<Value>;

    /// Post a JSON payload
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// Post without payload, used by action endpoints (`/enable`, `/refresh`, ...)
    async fn post_no_data(&self, path: &str) -> Result<Value>;

    /// Patch an object with a JSON payload
    async fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    /// Renew the authentication token before it expires
    async fn refresh_token(&self) -> Result<()>;
}

/// Page returned by collection endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub resources: Vec<T>,
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Client shared between the provider and its resources.
///
/// Resources are instantiated before the provider is configured, so they hold
/// this handle and resolve the client on each call.
#[derive(Debug, Clone, Default)]
pub struct ApiHandle {
    inner: Arc<RwLock<Option<Arc<dyn CipherTrustApi>>>>,
}

impl ApiHandle {
    pub async fn set(&self, api: Arc<dyn CipherTrustApi>) {
        *self.inner.write().await = Some(api);
    }

    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<dyn CipherTrustApi>> {
        let api = self.inner.read().await.clone();
        if api.is_none() {
            diags.root_error(
                "Provider not configured",
                "The CipherTrust provider must be configured before resources can be managed.",
            );
        }
        api
    }
}
