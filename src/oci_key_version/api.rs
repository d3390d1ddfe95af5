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

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::client::{decode, CipherTrustApi, Result};
use crate::lifecycle::LifecycleState;
use crate::oci_key::api::OciKeys;
use crate::poll::{FetchMode, StateSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OciKeyVersionParams {
    #[serde(default)]
    pub lifecycle_state: LifecycleState,
    #[serde(default)]
    pub time_created: String,
}

/// Version of an OCI key as mirrored by CipherTrust Manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OciKeyVersion {
    pub id: String,
    /// OCID of the key version
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub oci_key_version_params: OciKeyVersionParams,
}

impl OciKeyVersion {
    pub fn state(&self) -> &LifecycleState {
        &self.oci_key_version_params.lifecycle_state
    }
}

/// Typed access to the versions of one OCI key
#[derive(Debug, Clone, Copy)]
pub struct OciKeyVersions<'a> {
    api: &'a dyn CipherTrustApi,
    key: &'a str,
}

impl<'a> OciKeyVersions<'a> {
    pub fn new(api: &'a dyn CipherTrustApi, key: &'a str) -> Self {
        Self { api, key }
    }

    pub fn key(&self) -> &str {
        self.key
    }

    fn path(&self) -> String {
        format!("{}/{}/versions", crate::oci_key::api::KEYS_PATH, self.key)
    }

    pub async fn get(&self, id: &str) -> Result<OciKeyVersion> {
        decode(self.api.get(&format!("{}/{id}", self.path())).await?)
    }

    /// Resynchronize the parent key from OCI, then read the version
    pub async fn fetch(&self, id: &str, mode: FetchMode) -> Result<OciKeyVersion> {
        if mode == FetchMode::Refresh {
            OciKeys::new(self.api).refresh(self.key).await?;
        }
        self.get(id).await
    }

    pub async fn create(&self) -> Result<OciKeyVersion> {
        decode(self.api.post(&self.path(), &json!({})).await?)
    }

    pub async fn schedule_deletion(&self, id: &str, days: i64) -> Result<OciKeyVersion> {
        decode(
            self.api
                .post(
                    &format!("{}/{id}/schedule-deletion", self.path()),
                    &json!({ "days": days }),
                )
                .await?,
        )
    }
}

#[async_trait]
impl<'a> StateSource for OciKeyVersions<'a> {
    async fn fetch_state(&self, handle: &str, mode: FetchMode) -> Result<LifecycleState> {
        Ok(self
            .fetch(handle, mode)
            .await?
            .oci_key_version_params
            .lifecycle_state)
    }

    async fn refresh_token(&self) -> Result<()> {
        self.api.refresh_token().await
    }
}
