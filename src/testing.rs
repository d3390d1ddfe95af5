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

//! In-memory CipherTrust Manager used by the unit tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{ApiError, CipherTrustApi, Result};

/// Mirrors OCI keys, key versions and vaults.
///
/// State-changing calls put the object in a transient state that lasts for
/// `settle_after` fetches before the final state is reached.
#[derive(Debug, Default)]
pub(crate) struct FakeCm {
    inner: Mutex<FakeState>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub keys: BTreeMap<String, Value>,
    pub versions: BTreeMap<String, Value>,
    pub vaults: BTreeMap<String, Value>,
    /// Upcoming lifecycle states per object id, one applied per fetch
    pub pending: BTreeMap<String, VecDeque<String>>,
    /// Every call, as `METHOD path`
    pub calls: Vec<String>,
    /// Status returned for a given `METHOD path`
    pub failures: BTreeMap<String, (u16, String)>,
    pub settle_after: usize,
    pub token_refreshes: usize,
    next_id: usize,
}

impl FakeCm {
    pub(crate) fn new() -> Self {
        let fake = Self::default();
        fake.state().settle_after = 2;
        fake
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn with_key(self, id: &str, state: &str, compartment: &str) -> Self {
        self.state().keys.insert(
            id.to_owned(),
            json!({
                "id": id,
                "key_id": format!("ocid1.key.oc1..{id}"),
                "vault": "vault-1",
                "oci_params": {
                    "compartment_id": compartment,
                    "display_name": id,
                    "lifecycle_state": state,
                    "current_key_version": format!("ocid1.keyversion.oc1..{id}"),
                    "protection_mode": "HSM",
                    "key_shape": {"algorithm": "AES", "length": 32},
                    "freeform_tags": {},
                    "is_auto_rotation_enabled": false,
                },
            }),
        );
        self
    }

    pub(crate) fn with_version(self, key: &str, id: &str, state: &str) -> Self {
        self.state().versions.insert(
            id.to_owned(),
            json!({
                "id": id,
                "version_id": format!("ocid1.keyversion.oc1..{id}"),
                "cckm_key_id": key,
                "oci_key_version_params": {"lifecycle_state": state},
            }),
        );
        self
    }

    pub(crate) fn with_vault(self, id: &str, acls: Value) -> Self {
        self.state()
            .vaults
            .insert(id.to_owned(), json!({"id": id, "acls": acls}));
        self
    }

    pub(crate) fn fail(self, call: &str, status: u16, body: &str) -> Self {
        self.state()
            .failures
            .insert(call.to_owned(), (status, body.to_owned()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls other than reads and refreshes
    pub(crate) fn state_changes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("GET ") && !call.ends_with("/refresh"))
            .collect()
    }

    pub(crate) fn key_state(&self, id: &str) -> String {
        self.state().keys[id]["oci_params"]["lifecycle_state"]
            .as_str()
            .unwrap_or_default()
            .to_owned()
    }

    fn handle(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut state = self.state();
        let call = format!("{method} {path}");
        state.calls.push(call.clone());
        if let Some((status, body)) = state.failures.get(&call) {
            return Err(ApiError::from_response(*status, body));
        }

        let segments: Vec<&str> = path
            .trim_start_matches("api/v1/cckm/oci/")
            .split('/')
            .collect();
        match (method, segments.as_slice()) {
            ("GET", ["keys"]) => Ok(json!({
                "total": state.keys.len(),
                "resources": state.keys.values().cloned().collect::<Vec<_>>(),
            })),
            ("POST", ["keys"]) => {
                state.next_id += 1;
                let id = format!("key-{}", state.next_id);
                let mut key = body.cloned().unwrap_or_default();
                key["id"] = json!(id);
                key["key_id"] = json!(format!("ocid1.key.oc1..{id}"));
                key["oci_params"]["lifecycle_state"] = json!("CREATING");
                key["oci_params"]["current_key_version"] = json!("ocid1.keyversion.oc1..1");
                state.keys.insert(id.clone(), key.clone());
                state.transition(&id, "CREATING", "ENABLED");
                Ok(key)
            }
            ("GET", ["keys", id]) => state.fetch_key(id),
            ("POST", ["keys", id, "refresh"]) => state.fetch_key(id),
            ("PATCH", ["keys", id]) => {
                let patch = body.cloned().unwrap_or_default();
                let key = state.key_mut(id)?;
                if let Some(name) = patch.get("display_name") {
                    key["oci_params"]["display_name"] = name.clone();
                }
                if let Some(tags) = patch.get("freeform_tags") {
                    key["oci_params"]["freeform_tags"] = tags.clone();
                }
                state.start(id, "UPDATING")
            }
            ("POST", ["keys", id, "enable"]) => state.start_transition(id, "ENABLING", "ENABLED"),
            ("POST", ["keys", id, "disable"]) => {
                state.start_transition(id, "DISABLING", "DISABLED")
            }
            ("POST", ["keys", id, rotation @ ("enable-auto-rotation" | "disable-auto-rotation")]) => {
                let enabled = *rotation == "enable-auto-rotation";
                state.key_mut(id)?["oci_params"]["is_auto_rotation_enabled"] = json!(enabled);
                state.start(id, "UPDATING")
            }
            ("POST", ["keys", id, "change-compartment"]) => {
                let compartment = body
                    .and_then(|body| body.get("compartment_id"))
                    .cloned()
                    .unwrap_or_default();
                state.key_mut(id)?["oci_params"]["compartment_id"] = compartment;
                state.start(id, "CHANGING_COMPARTMENT")
            }
            ("POST", ["keys", id, "schedule-deletion"]) => {
                state.key_mut(id)?;
                state.start_transition(id, "SCHEDULING_DELETION", "PENDING_DELETION")
            }
            ("POST", ["keys", key, "versions"]) => {
                state.key_mut(key)?;
                state.next_id += 1;
                let id = format!("version-{}", state.next_id);
                let version = json!({
                    "id": id,
                    "version_id": format!("ocid1.keyversion.oc1..{id}"),
                    "cckm_key_id": key,
                    "oci_key_version_params": {"lifecycle_state": "CREATING"},
                });
                state.versions.insert(id.clone(), version.clone());
                state.transition(&id, "CREATING", "ENABLED");
                Ok(version)
            }
            ("GET", ["keys", _, "versions", id]) => state.fetch_version(id),
            ("POST", ["keys", _, "versions", id, "schedule-deletion"]) => {
                state.fetch_version(id)?;
                state.transition(id, "SCHEDULING_DELETION", "PENDING_DELETION");
                state.fetch_version(id)
            }
            ("GET", ["vaults", id]) => state
                .vaults
                .get(*id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("vault {id}"))),
            ("POST", ["vaults", id, "update-acls"]) => {
                let updates = body
                    .and_then(|body| body.get("acls"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let vault = state
                    .vaults
                    .get_mut(*id)
                    .ok_or_else(|| ApiError::NotFound(format!("vault {id}")))?;
                apply_acls(vault, &updates);
                Ok(vault.clone())
            }
            _ => Err(ApiError::Status {
                status: 400,
                message: format!("unexpected call {call}"),
            }),
        }
    }
}

impl FakeState {
    fn key_mut(&mut self, id: &str) -> Result<&mut Value> {
        self.keys
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("key {id}")))
    }

    fn advance(&mut self, id: &str) -> Option<String> {
        self.pending.get_mut(id)?.pop_front()
    }

    fn fetch_key(&mut self, id: &str) -> Result<Value> {
        let next = self.advance(id);
        let key = self.key_mut(id)?;
        if let Some(next) = next {
            key["oci_params"]["lifecycle_state"] = json!(next);
        }
        Ok(key.clone())
    }

    fn fetch_version(&mut self, id: &str) -> Result<Value> {
        let next = self.advance(id);
        let version = self
            .versions
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("version {id}")))?;
        if let Some(next) = next {
            version["oci_key_version_params"]["lifecycle_state"] = json!(next);
        }
        Ok(version.clone())
    }

    fn transition(&mut self, id: &str, transient: &str, target: &str) {
        let mut states: VecDeque<String> = std::iter::repeat(transient.to_owned())
            .take(self.settle_after)
            .collect();
        states.push_back(target.to_owned());
        self.pending.insert(id.to_owned(), states);
    }

    fn start_transition(&mut self, id: &str, transient: &str, target: &str) -> Result<Value> {
        let key = self.key_mut(id)?;
        key["oci_params"]["lifecycle_state"] = json!(transient);
        let response = key.clone();
        self.transition(id, transient, target);
        Ok(response)
    }

    /// Transient state returning to the current stable state
    fn start(&mut self, id: &str, transient: &str) -> Result<Value> {
        let current = self.key_mut(id)?["oci_params"]["lifecycle_state"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        self.start_transition(id, transient, &current)
    }
}

fn apply_acls(vault: &mut Value, updates: &[Value]) {
    let mut acls: Vec<Value> = vault["acls"].as_array().cloned().unwrap_or_default();
    for update in updates {
        let permit = update["permit"].as_bool().unwrap_or(true);
        let actions: Vec<&str> = update["actions"]
            .as_array()
            .map(|actions| actions.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let position = acls
            .iter()
            .position(|acl| acl["user_id"] == update["user_id"] && acl["group"] == update["group"]);
        let acl = match position {
            Some(position) => &mut acls[position],
            None => {
                acls.push(json!({
                    "user_id": update["user_id"],
                    "group": update["group"],
                    "actions": [],
                }));
                let last = acls.len() - 1;
                &mut acls[last]
            }
        };
        let mut current: Vec<String> = acl["actions"]
            .as_array()
            .map(|actions| {
                actions
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if permit {
            for action in actions {
                if !current.iter().any(|current| current == action) {
                    current.push(action.to_owned());
                }
            }
        } else {
            current.retain(|current| !actions.contains(&current.as_str()));
        }
        acl["actions"] = json!(current);
    }
    acls.retain(|acl| acl["actions"].as_array().is_some_and(|a| !a.is_empty()));
    vault["acls"] = json!(acls);
}

#[async_trait]
impl CipherTrustApi for FakeCm {
    async fn get(&self, path: &str) -> Result<Value> {
        self.handle("GET", path, None)
    }

    async fn list(&self, path: &str, _filters: &[(&str, &str)]) -> Result<Value> {
        self.handle("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.handle("POST", path, Some(body))
    }

    async fn post_no_data(&self, path: &str) -> Result<Value> {
        self.handle("POST", path, None)
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.handle("PATCH", path, Some(body))
    }

    async fn refresh_token(&self) -> Result<()> {
        self.state().token_refreshes += 1;
        Ok(())
    }
}
