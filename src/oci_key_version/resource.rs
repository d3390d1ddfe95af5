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

use std::borrow::Cow;

use async_trait::async_trait;

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::client::ApiHandle;
use crate::utils::{detail, WithNormalize, WithSchema};

use super::api::OciKeyVersions;
use super::lifecycle::VersionLifecycle;
use super::state::OciKeyVersionState;

#[derive(Debug, Default, Clone)]
pub struct OciKeyVersionResource {
    pub(super) api: ApiHandle,
}

impl OciKeyVersionResource {
    pub fn new(api: ApiHandle) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for OciKeyVersionResource {
    type State<'a> = OciKeyVersionState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OciKeyVersionState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(days) = config.schedule_deletion_days {
            if !(7..=30).contains(&days) {
                diags.error(
                    "Invalid deletion delay",
                    format!("`schedule_deletion_days` must be between 7 and 30, got {days}"),
                    AttributePath::new("schedule_deletion_days"),
                );
            }
        }
        if let Value::Value(timeout) = config.timeout {
            if timeout <= 0 {
                diags.error_short(
                    "`timeout` must be a positive number of seconds",
                    AttributePath::new("timeout"),
                );
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.api.get(diags).await?;
        let versions = OciKeyVersions::new(api.as_ref(), state.cckm_key_id.as_str());
        let context = [
            ("cckm_key_id", state.cckm_key_id.as_str()),
            ("id", state.id.as_str()),
        ];

        let version = match versions.get(state.id.as_str()).await {
            Ok(version) => version,
            Err(err) if err.is_not_found() => {
                diags.root_warning("OCI key version removed from state", detail(&err, context));
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read OCI key version", detail(&err, context));
                return None;
            }
        };

        if version.state().is_deletion() {
            diags.root_warning(
                "OCI key version removed from state",
                detail(format!("The version is {}.", version.state()), context),
            );
            return None;
        }

        let mut state = state.clone();
        state.refresh_from(&version);
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state.clone();
        state.id = Value::Unknown;
        state.normalize(diags);

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        let mut state = proposed_state.clone();
        state.normalize(diags);

        let trigger_replace = if prior_state.cckm_key_id != proposed_state.cckm_key_id {
            vec![AttributePath::new("cckm_key_id")]
        } else {
            Vec::new()
        };

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.api.get(diags).await?;
        let versions = OciKeyVersions::new(api.as_ref(), planned_state.cckm_key_id.as_str());

        let version = VersionLifecycle::new(versions, planned_state.poller())
            .create(diags)
            .await?;

        let mut state = planned_state.clone();
        state.refresh_from(&version);
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        // Only local settings can change in place
        let state = Self::State {
            id: prior_state.id,
            version_id: prior_state.version_id,
            lifecycle_state: prior_state.lifecycle_state,
            ..planned_state
        };
        Some((state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let api = self.api.get(diags).await?;
        let versions = OciKeyVersions::new(api.as_ref(), state.cckm_key_id.as_str());

        VersionLifecycle::new(versions, state.poller())
            .schedule_deletion(diags, state.id.as_str(), state.deletion_days())
            .await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some((key, version)) = id.split_once(':') else {
            diags.root_error(
                "Invalid import ID",
                format!("Expected `<cckm_key_id>:<version id>`, got `{id}`"),
            );
            return None;
        };

        let state = Self::State {
            id: Value::Value(Cow::Owned(version.to_owned())),
            cckm_key_id: Value::Value(Cow::Owned(key.to_owned())),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
