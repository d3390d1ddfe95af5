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

use tf_provider::Diagnostics;
use tracing::info;

use crate::lifecycle::LifecycleState;
use crate::poll::{FetchMode, PollOutcome, Poller, WaitFor};
use crate::utils::detail;

use super::api::{OciKeyVersion, OciKeyVersions};

#[derive(Debug, Clone, Copy)]
pub struct VersionLifecycle<'a> {
    versions: OciKeyVersions<'a>,
    poller: Poller,
}

impl<'a> VersionLifecycle<'a> {
    pub fn new(versions: OciKeyVersions<'a>, poller: Poller) -> Self {
        Self { versions, poller }
    }

    /// Create a new version and wait until OCI enables it
    pub async fn create(&self, diags: &mut Diagnostics) -> Option<OciKeyVersion> {
        let key = self.versions.key();
        let version = match self.versions.create().await {
            Ok(version) => version,
            Err(err) => {
                diags.root_error(
                    "Failed to create OCI key version",
                    detail(&err, [("cckm_key_id", key)]),
                );
                return None;
            }
        };
        info!(key, id = %version.id, "OCI key version created");

        let wait = WaitFor::Reach(LifecycleState::Enabled);
        let outcome = match self
            .poller
            .await_state(&self.versions, &version.id, &wait, FetchMode::Refresh)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                diags.root_error(
                    "Failed to read OCI key version state",
                    detail(&err, [("cckm_key_id", key), ("id", version.id.as_str())]),
                );
                // the version exists, it must still be recorded
                return Some(version);
            }
        };

        let context = [
            ("cckm_key_id", key),
            ("id", version.id.as_str()),
            ("lifecycle_state", outcome.state().as_str()),
        ];
        match &outcome {
            PollOutcome::Converged(_) => {}
            PollOutcome::Failed(state) => {
                diags.root_error(
                    "OCI key version failed to be created",
                    detail(format!("The version ended up {state}."), context),
                );
            }
            PollOutcome::TimedOut(state) | PollOutcome::Unexpected(state) => {
                diags.root_warning(
                    "OCI key version not enabled",
                    detail(
                        format!(
                            "The version is still {state} after {}s, it may need to be inspected manually.",
                            self.poller.timeout().as_secs()
                        ),
                        context,
                    ),
                );
            }
        }

        let mut version = version;
        version.oci_key_version_params.lifecycle_state = outcome.state().clone();
        Some(version)
    }

    /// Schedule the deletion of a version, tolerating versions already gone
    pub async fn schedule_deletion(&self, diags: &mut Diagnostics, id: &str, days: i64) {
        let key = self.versions.key();
        let context = [("cckm_key_id", key), ("id", id)];

        let version = match self.versions.get(id).await {
            Ok(version) => version,
            Err(err) if err.is_not_found() => {
                diags.root_warning("OCI key version already deleted", detail(&err, context));
                return;
            }
            Err(err) => {
                diags.root_error("Failed to read OCI key version", detail(&err, context));
                return;
            }
        };

        if version.state().is_deletion() {
            diags.root_warning(
                "OCI key version already scheduled for deletion",
                detail(
                    format!("The version is {}, no deletion request was sent.", version.state()),
                    context,
                ),
            );
            return;
        }

        match self.versions.schedule_deletion(id, days).await {
            Ok(_) => info!(key, id, days, "OCI key version deletion scheduled"),
            Err(err) if err.is_not_found() => {
                diags.root_warning("OCI key version already deleted", detail(&err, context));
            }
            Err(err) => {
                diags.root_error(
                    "Failed to schedule OCI key version deletion",
                    detail(&err, context),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tf_provider::Diagnostics;

    use super::VersionLifecycle;
    use crate::lifecycle::LifecycleState;
    use crate::oci_key_version::api::OciKeyVersions;
    use crate::poll::Poller;
    use crate::testing::FakeCm;

    fn poller() -> Poller {
        Poller::with_retries(10, Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_enabled() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        let mut diags = Diagnostics::default();

        let version = VersionLifecycle::new(OciKeyVersions::new(&fake, "key-123"), poller())
            .create(&mut diags)
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert!(diags.warnings.is_empty());
        assert_eq!(version.state(), &LifecycleState::Enabled);
        assert_eq!(
            fake.state_changes(),
            ["POST api/v1/cckm/oci/keys/key-123/versions"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_not_enabled_in_time() {
        let fake = FakeCm::new().with_key("key-123", "ENABLED", "compartment-a");
        fake.state().settle_after = 50;
        let mut diags = Diagnostics::default();

        let version = VersionLifecycle::new(OciKeyVersions::new(&fake, "key-123"), poller())
            .create(&mut diags)
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
        assert_eq!(version.state(), &LifecycleState::Creating);
    }

    #[tokio::test(start_paused = true)]
    async fn created_version_kept_when_wait_fails() {
        let fake = FakeCm::new()
            .with_key("key-123", "ENABLED", "compartment-a")
            .fail(
                "POST api/v1/cckm/oci/keys/key-123/refresh",
                500,
                r#"{"codeDesc":"NCERRInternalServerError","message":"boom"}"#,
            );
        let mut diags = Diagnostics::default();

        let version = VersionLifecycle::new(OciKeyVersions::new(&fake, "key-123"), poller())
            .create(&mut diags)
            .await;

        assert_eq!(diags.errors.len(), 1);
        assert_eq!(version.map(|version| version.id).as_deref(), Some("version-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion() {
        let fake = FakeCm::new()
            .with_key("key-123", "ENABLED", "compartment-a")
            .with_version("key-123", "v1", "ENABLED")
            .with_version("key-123", "v2", "PENDING_DELETION");
        let versions = OciKeyVersions::new(&fake, "key-123");
        let lifecycle = VersionLifecycle::new(versions, poller());

        let mut diags = Diagnostics::default();
        lifecycle.schedule_deletion(&mut diags, "v1", 7).await;
        assert!(diags.errors.is_empty());
        assert!(diags.warnings.is_empty());

        let mut diags = Diagnostics::default();
        lifecycle.schedule_deletion(&mut diags, "v2", 7).await;
        lifecycle.schedule_deletion(&mut diags, "v3", 7).await;
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 2);

        assert_eq!(
            fake.state_changes(),
            ["POST api/v1/cckm/oci/keys/key-123/versions/v1/schedule-deletion"]
        );
    }
}
