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

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{decode, CipherTrustApi, Result};

const VAULTS_PATH: &str = "api/v1/cckm/oci/vaults";

/// Subject of an access control entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(String),
    Group(String),
}

impl Principal {
    fn matches(&self, acl: &VaultAcl) -> bool {
        match self {
            Principal::User(user) => acl.user_id.as_deref() == Some(user.as_str()),
            Principal::Group(group) => acl.group.as_deref() == Some(group.as_str()),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::User(user) => write!(f, "user:{user}"),
            Principal::Group(group) => write!(f, "group:{group}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VaultAcl {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub actions: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OciVault {
    pub id: String,
    #[serde(default)]
    pub acls: Vec<VaultAcl>,
}

impl OciVault {
    /// Actions granted to `principal`, empty when it has no entry
    pub fn actions(&self, principal: &Principal) -> BTreeSet<String> {
        self.acls
            .iter()
            .filter(|acl| principal.matches(acl))
            .flat_map(|acl| acl.actions.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub actions: BTreeSet<String>,
    pub permit: bool,
}

impl AclUpdate {
    pub fn new(principal: &Principal, actions: BTreeSet<String>, permit: bool) -> Self {
        let (user_id, group) = match principal {
            Principal::User(user) => (Some(user.clone()), None),
            Principal::Group(group) => (None, Some(group.clone())),
        };
        Self {
            user_id,
            group,
            actions,
            permit,
        }
    }
}

/// Typed access to the OCI vault endpoints
#[derive(Debug, Clone, Copy)]
pub struct OciVaults<'a> {
    api: &'a dyn CipherTrustApi,
}

impl<'a> OciVaults<'a> {
    pub fn new(api: &'a dyn CipherTrustApi) -> Self {
        Self { api }
    }

    pub async fn get(&self, id: &str) -> Result<OciVault> {
        decode(self.api.get(&format!("{VAULTS_PATH}/{id}")).await?)
    }

    pub async fn update_acls(&self, id: &str, updates: &[AclUpdate]) -> Result<OciVault> {
        decode(
            self.api
                .post(
                    &format!("{VAULTS_PATH}/{id}/update-acls"),
                    &json!({ "acls": updates }),
                )
                .await?,
        )
    }
}
