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
use std::future::Future;

use tf_provider::Diagnostics;
use tracing::{debug, info};

use crate::client::{ApiError, Result};
use crate::lifecycle::LifecycleState;
use crate::poll::{FetchMode, PollOutcome, Poller, WaitFor};
use crate::utils::detail;

use super::api::{CreateKey, KeyPatch, OciKey, OciKeys};

/// Lifecycle-related attributes requested for a key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredKey {
    pub name: String,
    pub compartment_id: String,
    pub enabled: bool,
    pub auto_rotation: bool,
    pub freeform_tags: BTreeMap<String, String>,
}

/// Drives an OCI key through its lifecycle transitions.
///
/// Every transition is followed by a poll until the key leaves the transient
/// state it was put in, as OCI rejects calls on a key that is still changing.
#[derive(Debug, Clone, Copy)]
pub struct KeyLifecycle<'a> {
    keys: OciKeys<'a>,
    poller: Poller,
}

/// A transition could not be confirmed and later steps must not be attempted
#[derive(Debug)]
struct Aborted;

impl<'a> KeyLifecycle<'a> {
    pub fn new(keys: OciKeys<'a>, poller: Poller) -> Self {
        Self { keys, poller }
    }

    /// Create a key and wait for OCI to enable it, then apply the remaining attributes
    pub async fn create(
        &self,
        diags: &mut Diagnostics,
        request: &CreateKey,
        desired: &DesiredKey,
    ) -> Option<OciKey> {
        let key = match self.keys.create(request).await {
            Ok(key) => key,
            Err(err) => {
                diags.root_error(
                    "Failed to create OCI key",
                    detail(
                        &err,
                        [
                            ("vault", request.vault.as_str()),
                            ("display_name", request.oci_params.display_name.as_str()),
                        ],
                    ),
                );
                return None;
            }
        };
        info!(id = %key.id, key_id = %key.key_id, "OCI key created");

        // once posted, the key is always returned so that it lands in the state
        let outcome = self
            .poll(diags, &key.id, WaitFor::Reach(LifecycleState::Enabled), "create")
            .await;
        match outcome {
            Ok(PollOutcome::Converged(state)) => {
                let mut key = key;
                key.oci_params.lifecycle_state = state;
                let fallback = key.clone();
                self.reconcile(diags, &key.id, desired)
                    .await
                    .or(Some(fallback))
            }
            Ok(_) | Err(Aborted) => self.keys.get(&key.id).await.ok().or(Some(key)),
        }
    }

    /// Bring the key to the desired state.
    ///
    /// The key is refreshed first, then transitions are issued in this order:
    /// enable, auto rotation, name and tags, compartment, disable.
    /// Failed calls are reported as warnings and the remaining steps still run.
    pub async fn reconcile(
        &self,
        diags: &mut Diagnostics,
        id: &str,
        desired: &DesiredKey,
    ) -> Option<OciKey> {
        let mut key = match self.keys.refresh(id).await {
            Ok(key) => key,
            Err(err) => {
                diags.root_error(
                    "Failed to refresh OCI key",
                    detail(&err, [("id", id)]),
                );
                return None;
            }
        };

        if key.state().is_transient() {
            let state = key.state().clone();
            let outcome = self
                .poll(diags, id, WaitFor::Leave(state), "refresh")
                .await
                .ok()?;
            key.oci_params.lifecycle_state = outcome.state().clone();
        }

        if let Err(Aborted) = self.apply(diags, &mut key, desired).await {
            return None;
        }

        match self.keys.get(id).await {
            Ok(key) => Some(key),
            Err(err) => {
                diags.root_warning("Failed to read OCI key", detail(&err, [("id", id)]));
                Some(key)
            }
        }
    }

    async fn apply(
        &self,
        diags: &mut Diagnostics,
        key: &mut OciKey,
        desired: &DesiredKey,
    ) -> std::result::Result<(), Aborted> {
        let id = key.id.clone();

        if desired.enabled && key.state() == &LifecycleState::Disabled {
            self.step(diags, key, "enable", LifecycleState::Enabling, self.keys.enable(&id))
                .await?;
        }

        if desired.auto_rotation != key.oci_params.is_auto_rotation_enabled {
            let action = if desired.auto_rotation {
                "enable auto rotation"
            } else {
                "disable auto rotation"
            };
            let call = self.keys.set_auto_rotation(&id, desired.auto_rotation);
            if self
                .step(diags, key, action, LifecycleState::Updating, call)
                .await?
            {
                key.oci_params.is_auto_rotation_enabled = desired.auto_rotation;
            }
        }

        let patch = KeyPatch {
            display_name: (desired.name != key.oci_params.display_name)
                .then(|| desired.name.clone()),
            freeform_tags: (desired.freeform_tags != key.oci_params.freeform_tags)
                .then(|| desired.freeform_tags.clone()),
        };
        if !patch.is_empty() {
            self.step(diags, key, "update", LifecycleState::Updating, self.keys.patch(&id, &patch))
                .await?;
        }

        if desired.compartment_id != key.oci_params.compartment_id {
            let call = self.keys.change_compartment(&id, &desired.compartment_id);
            self.step(diags, key, "change compartment", LifecycleState::ChangingCompartment, call)
                .await?;
        }

        if !desired.enabled && key.state() == &LifecycleState::Enabled {
            self.step(diags, key, "disable", LifecycleState::Disabling, self.keys.disable(&id))
                .await?;
        }

        Ok(())
    }

    /// Issue a transition and wait for the key to settle.
    ///
    /// Returns whether the call was accepted. The key is updated with the
    /// response and the settled lifecycle state.
    async fn step<F>(
        &self,
        diags: &mut Diagnostics,
        key: &mut OciKey,
        action: &str,
        transient: LifecycleState,
        call: F,
    ) -> std::result::Result<bool, Aborted>
    where
        F: Future<Output = Result<OciKey>>,
    {
        debug!(id = %key.id, action, state = %key.state(), "issuing key transition");
        let response = match call.await {
            Ok(response) => response,
            Err(err) => {
                diags.root_warning(
                    format!("Failed to {action} OCI key"),
                    detail(
                        &err,
                        [
                            ("id", key.id.as_str()),
                            ("key_id", key.key_id.as_str()),
                            ("lifecycle_state", key.state().as_str()),
                        ],
                    ),
                );
                return Ok(false);
            }
        };

        let transient = if response.state().is_transient() {
            response.state().clone()
        } else {
            transient
        };
        let id = key.id.clone();
        *key = OciKey { id, ..response };

        let outcome = self
            .poll(diags, &key.id, WaitFor::Leave(transient), action)
            .await?;
        key.oci_params.lifecycle_state = outcome.state().clone();
        Ok(true)
    }

    /// Wait for a key transition, reporting timeouts and unexpected states
    async fn poll(
        &self,
        diags: &mut Diagnostics,
        id: &str,
        wait: WaitFor,
        action: &str,
    ) -> std::result::Result<PollOutcome, Aborted> {
        let outcome = match self
            .poller
            .await_state(&self.keys, id, &wait, FetchMode::Refresh)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let summary = match err {
                    ApiError::Unauthorized(_) => "Failed to refresh the authentication token",
                    _ => "Failed to read OCI key state",
                };
                diags.root_error(summary, detail(&err, [("id", id), ("action", action)]));
                return Err(Aborted);
            }
        };

        match &outcome {
            PollOutcome::Converged(state) => {
                debug!(id, action, %state, "OCI key settled");
            }
            PollOutcome::TimedOut(state) => {
                diags.root_error(
                    format!("Timed out waiting for OCI key to {action}"),
                    detail(
                        format!(
                            "The key is still {state} after {}s, increase `timeout` and apply again.",
                            self.poller.timeout().as_secs()
                        ),
                        [("id", id), ("lifecycle_state", state.as_str())],
                    ),
                );
                return Err(Aborted);
            }
            PollOutcome::Failed(state) => {
                diags.root_error(
                    format!("OCI key failed to {action}"),
                    detail(
                        format!("The key ended up {state}."),
                        [("id", id), ("lifecycle_state", state.as_str())],
                    ),
                );
                return Err(Aborted);
            }
            PollOutcome::Unexpected(state) => {
                diags.root_warning(
                    format!("OCI key in unexpected state after {action}"),
                    detail(
                        format!("The key is {state}, it may need to be inspected manually."),
                        [("id", id), ("lifecycle_state", state.as_str())],
                    ),
                );
            }
        }
        Ok(outcome)
    }

    /// Schedule the deletion of a key.
    ///
    /// A key already scheduled for deletion, or already gone, is not an error.
    pub async fn schedule_deletion(&self, diags: &mut Diagnostics, id: &str, days: i64) {
        let key = match self.keys.refresh(id).await {
            Ok(key) => key,
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "OCI key already deleted",
                    detail(&err, [("id", id)]),
                );
                return;
            }
            Err(err) => {
                diags.root_error("Failed to refresh OCI key", detail(&err, [("id", id)]));
                return;
            }
        };

        if key.state().is_deletion() {
            diags.root_warning(
                "OCI key already scheduled for deletion",
                detail(
                    format!("The key is {}, no deletion request was sent.", key.state()),
                    [("id", id), ("key_id", key.key_id.as_str())],
                ),
            );
            return;
        }

        match self.keys.schedule_deletion(id, days).await {
            Ok(key) => {
                info!(id, key_id = %key.key_id, days, "OCI key deletion scheduled");
            }
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "OCI key already deleted",
                    detail(&err, [("id", id), ("key_id", key.key_id.as_str())]),
                );
            }
            Err(err) => {
                diags.root_error(
                    "Failed to schedule OCI key deletion",
                    detail(&err, [("id", id), ("key_id", key.key_id.as_str())]),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tf_provider::Diagnostics;

    use super::{DesiredKey, KeyLifecycle};
    use crate::lifecycle::LifecycleState;
    use crate::oci_key::api::{CreateKey, CreateKeyParams, KeyShape, OciKeys};
    use crate::poll::Poller;
    use crate::testing::FakeCm;

    fn lifecycle(fake: &FakeCm) -> KeyLifecycle<'_> {
        KeyLifecycle::new(
            OciKeys::new(fake),
            Poller::with_retries(10, Duration::from_secs(10)),
        )
    }

    fn desired(compartment: &str, enabled: bool) -> DesiredKey {
        DesiredKey {
            name: "key-123".to_owned(),
            compartment_id: compartment.to_owned(),
            enabled,
            auto_rotation: false,
            freeform_tags: Default::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disable_after_compartment_change() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        let mut diags = Diagnostics::default();

        let key = lifecycle(&fake)
            .reconcile(&mut diags, "key-123", &desired("compartment-b", false))
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert!(diags.warnings.is_empty());
        assert_eq!(
            fake.state_changes(),
            [
                "POST api/v1/cckm/oci/keys/key-123/change-compartment",
                "POST api/v1/cckm/oci/keys/key-123/disable",
            ]
        );
        assert_eq!(key.state(), &LifecycleState::Disabled);
        assert_eq!(key.oci_params.compartment_id, "compartment-b");
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_do() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        let mut diags = Diagnostics::default();

        let key = lifecycle(&fake)
            .reconcile(&mut diags, "key-123", &desired("compartment-a", true))
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert!(fake.state_changes().is_empty());
        assert_eq!(
            fake.calls(),
            [
                "POST api/v1/cckm/oci/keys/key-123/refresh",
                "GET api/v1/cckm/oci/keys/key-123",
            ]
        );
        assert_eq!(key.state(), &LifecycleState::Enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn enable_then_patch() {
        let fake = FakeCm::new().with_key("key-123", "DISABLED", "compartment-a");
        let mut diags = Diagnostics::default();
        let mut desired = desired("compartment-a", true);
        desired.name = "renamed".to_owned();
        desired.auto_rotation = true;

        let key = lifecycle(&fake)
            .reconcile(&mut diags, "key-123", &desired)
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(
            fake.state_changes(),
            [
                "POST api/v1/cckm/oci/keys/key-123/enable",
                "POST api/v1/cckm/oci/keys/key-123/enable-auto-rotation",
                "PATCH api/v1/cckm/oci/keys/key-123",
            ]
        );
        assert_eq!(key.state(), &LifecycleState::Enabled);
        assert_eq!(key.oci_params.display_name, "renamed");
        assert!(key.oci_params.is_auto_rotation_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_is_a_warning() {
        let fake = FakeCm::new()
            .with_key("key-123", "ENABLED", "compartment-a")
            .fail(
                "POST api/v1/cckm/oci/keys/key-123/change-compartment",
                400,
                r#"{"codeDesc":"NCERRInvalidParamValue","message":"compartment"}"#,
            );
        let mut diags = Diagnostics::default();

        let key = lifecycle(&fake)
            .reconcile(&mut diags, "key-123", &desired("compartment-b", false))
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
        // the disable still happens
        assert_eq!(key.state(), &LifecycleState::Disabled);
        assert_eq!(key.oci_params.compartment_id, "compartment-a");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_stops_the_sequence() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        fake.state().settle_after = 100;
        let mut diags = Diagnostics::default();

        let key = lifecycle(&fake)
            .reconcile(&mut diags, "key-123", &desired("compartment-b", false))
            .await;

        assert!(key.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            fake.state_changes(),
            ["POST api/v1/cckm/oci/keys/key-123/change-compartment"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_enabled() {
        let fake = FakeCm::new();
        let mut diags = Diagnostics::default();
        let request = CreateKey {
            vault: "vault-1".to_owned(),
            oci_params: CreateKeyParams {
                compartment_id: "compartment-a".to_owned(),
                display_name: "key-123".to_owned(),
                key_shape: KeyShape {
                    algorithm: "AES".to_owned(),
                    length: Some(32),
                    curve_id: None,
                },
                ..Default::default()
            },
        };

        let key = lifecycle(&fake)
            .create(&mut diags, &request, &desired("compartment-a", false))
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(key.state(), &LifecycleState::Disabled);
        assert_eq!(
            fake.state_changes(),
            [
                "POST api/v1/cckm/oci/keys",
                "POST api/v1/cckm/oci/keys/key-1/disable",
            ]
        );
    }

    fn create_request() -> CreateKey {
        CreateKey {
            vault: "vault-1".to_owned(),
            oci_params: CreateKeyParams {
                compartment_id: "compartment-a".to_owned(),
                display_name: "key-123".to_owned(),
                key_shape: KeyShape {
                    algorithm: "AES".to_owned(),
                    length: Some(32),
                    curve_id: None,
                },
                ..Default::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn created_key_kept_when_wait_fails() {
        let fake = FakeCm::new().fail(
            "POST api/v1/cckm/oci/keys/key-1/refresh",
            500,
            r#"{"codeDesc":"NCERRInternalServerError","message":"boom"}"#,
        );
        let mut diags = Diagnostics::default();

        let key = lifecycle(&fake)
            .create(&mut diags, &create_request(), &desired("compartment-a", true))
            .await;

        assert_eq!(diags.errors.len(), 1);
        assert_eq!(key.map(|key| key.id).as_deref(), Some("key-1"));
        assert!(fake.state().keys.contains_key("key-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_deletion() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        let mut diags = Diagnostics::default();

        lifecycle(&fake)
            .schedule_deletion(&mut diags, "key-123", 7)
            .await;

        assert!(diags.errors.is_empty());
        assert!(diags.warnings.is_empty());
        assert_eq!(
            fake.state_changes(),
            ["POST api/v1/cckm/oci/keys/key-123/schedule-deletion"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_is_idempotent() {
        let fake = FakeCm::new().with_key("key-123", "PENDING_DELETION", "compartment-a");
        let mut diags = Diagnostics::default();

        lifecycle(&fake)
            .schedule_deletion(&mut diags, "key-123", 7)
            .await;

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
        assert!(fake.state_changes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_of_missing_key() {
        let fake = FakeCm::new();
        let mut diags = Diagnostics::default();

        lifecycle(&fake)
            .schedule_deletion(&mut diags, "key-404", 7)
            .await;

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_not_found_from_vendor_code() {
        let fake = FakeCm::new()
            .with_key("key-123", "ENABLED", "compartment-a")
            .fail(
                "POST api/v1/cckm/oci/keys/key-123/schedule-deletion",
                400,
                r#"{"code":5,"codeDesc":"NCERRResourceNotFound: Resource not found"}"#,
            );
        let mut diags = Diagnostics::default();

        lifecycle(&fake)
            .schedule_deletion(&mut diags, "key-123", 7)
            .await;

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }
}
