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

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{decode, CipherTrustApi, ListPage, Result};
use crate::lifecycle::LifecycleState;
use crate::poll::{FetchMode, StateSource};

pub(crate) const KEYS_PATH: &str = "api/v1/cckm/oci/keys";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShape {
    #[serde(default)]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OciKeyParams {
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub lifecycle_state: LifecycleState,
    #[serde(default)]
    pub current_key_version: String,
    #[serde(default)]
    pub protection_mode: String,
    #[serde(default)]
    pub key_shape: KeyShape,
    #[serde(default)]
    pub freeform_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub is_auto_rotation_enabled: bool,
}

/// OCI key as mirrored by CipherTrust Manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OciKey {
    pub id: String,
    /// OCID of the key in OCI
    #[serde(default)]
    pub key_id: String,
    /// CipherTrust Manager vault resource
    #[serde(default)]
    pub vault: String,
    #[serde(default)]
    pub oci_params: OciKeyParams,
}

impl OciKey {
    pub fn state(&self) -> &LifecycleState {
        &self.oci_params.lifecycle_state
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateKeyParams {
    pub compartment_id: String,
    pub display_name: String,
    pub key_shape: KeyShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_mode: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub freeform_tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateKey {
    pub vault: String,
    pub oci_params: CreateKeyParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

impl KeyPatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.freeform_tags.is_none()
    }
}

/// Typed access to the OCI key endpoints
#[derive(Debug, Clone, Copy)]
pub struct OciKeys<'a> {
    api: &'a dyn CipherTrustApi,
}

impl<'a> OciKeys<'a> {
    pub fn new(api: &'a dyn CipherTrustApi) -> Self {
        Self { api }
    }

    fn path(id: &str, action: &str) -> String {
        format!("{KEYS_PATH}/{id}/{action}")
    }

    pub async fn get(&self, id: &str) -> Result<OciKey> {
        decode(self.api.get(&format!("{KEYS_PATH}/{id}")).await?)
    }

    /// Resynchronize the key from OCI and return the fresh copy
    pub async fn refresh(&self, id: &str) -> Result<OciKey> {
        decode(self.api.post_no_data(&Self::path(id, "refresh")).await?)
    }

    pub async fn fetch(&self, id: &str, mode: FetchMode) -> Result<OciKey> {
        match mode {
            FetchMode::Refresh => self.refresh(id).await,
            FetchMode::Read => self.get(id).await,
        }
    }

    pub async fn find(&self, vault: &str, name: &str) -> Result<Vec<OciKey>> {
        let page: ListPage<OciKey> = decode(
            self.api
                .list(KEYS_PATH, &[("vault_id", vault), ("display_name", name)])
                .await?,
        )?;
        Ok(page.resources)
    }

    pub async fn create(&self, request: &CreateKey) -> Result<OciKey> {
        decode(self.api.post(KEYS_PATH, &json!(request)).await?)
    }

    pub async fn enable(&self, id: &str) -> Result<OciKey> {
        decode(self.api.post_no_data(&Self::path(id, "enable")).await?)
    }

    pub async fn disable(&self, id: &str) -> Result<OciKey> {
        decode(self.api.post_no_data(&Self::path(id, "disable")).await?)
    }

    pub async fn set_auto_rotation(&self, id: &str, enabled: bool) -> Result<OciKey> {
        let action = if enabled {
            "enable-auto-rotation"
        } else {
            "disable-auto-rotation"
        };
        decode(self.api.post_no_data(&Self::path(id, action)).await?)
    }

    pub async fn patch(&self, id: &str, patch: &KeyPatch) -> Result<OciKey> {
        decode(
            self.api
                .patch(&format!("{KEYS_PATH}/{id}"), &json!(patch))
                .await?,
        )
    }

    pub async fn change_compartment(&self, id: &str, compartment_id: &str) -> Result<OciKey> {
        decode(
            self.api
                .post(
                    &Self::path(id, "change-compartment"),
                    &json!({ "compartment_id": compartment_id }),
                )
                .await?,
        )
    }

    pub async fn schedule_deletion(&self, id: &str, days: i64) -> Result<OciKey> {
        decode(
            self.api
                .post(
                    &Self::path(id, "schedule-deletion"),
                    &json!({ "days": days }),
                )
                .await?,
        )
    }
}

#[async_trait]
impl<'a> StateSource for OciKeys<'a> {
    async fn fetch_state(&self, handle: &str, mode: FetchMode) -> Result<LifecycleState> {
        Ok(self.fetch(handle, mode).await?.oci_params.lifecycle_state)
    }

    async fn refresh_token(&self) -> Result<()> {
        self.api.refresh_token().await
    }
}
