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
use crate::utils::{detail, WithNormalize, WithSchema, WithValidate};

use super::api::OciKeys;
use super::lifecycle::KeyLifecycle;
use super::state::OciKeyState;

#[derive(Debug, Default, Clone)]
pub struct OciKeyResource {
    pub(super) api: ApiHandle,
}

impl OciKeyResource {
    pub fn new(api: ApiHandle) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for OciKeyResource {
    type State<'a> = OciKeyState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OciKeyState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default()).await;

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
        let keys = OciKeys::new(api.as_ref());

        let key = match keys.get(state.id.as_str()).await {
            Ok(key) => key,
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "OCI key removed from state",
                    detail(&err, [("id", state.id.as_str())]),
                );
                return None;
            }
            Err(err) => {
                diags.root_error(
                    "Failed to read OCI key",
                    detail(&err, [("id", state.id.as_str())]),
                );
                return None;
            }
        };

        if key.state().is_deletion() {
            diags.root_warning(
                "OCI key removed from state",
                detail(
                    format!("The key is {}.", key.state()),
                    [("id", key.id.as_str()), ("key_id", key.key_id.as_str())],
                ),
            );
            return None;
        }

        let mut state = state.clone();
        state.refresh_from(&key);
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

        let mut trigger_replace = Vec::new();
        if prior_state.vault != proposed_state.vault {
            trigger_replace.push(AttributePath::new("vault"));
        }
        if prior_state.algorithm != proposed_state.algorithm {
            trigger_replace.push(AttributePath::new("algorithm"));
        }
        if prior_state.length != proposed_state.length && !proposed_state.length.is_null() {
            trigger_replace.push(AttributePath::new("length"));
        }
        if prior_state.curve_id != proposed_state.curve_id && !proposed_state.curve_id.is_null() {
            trigger_replace.push(AttributePath::new("curve_id"));
        }
        if prior_state.protection_mode != proposed_state.protection_mode
            && !proposed_state.protection_mode.is_null()
        {
            trigger_replace.push(AttributePath::new("protection_mode"));
        }

        if prior_state.desired() != proposed_state.desired() {
            state.lifecycle_state = Value::Unknown;
        }

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
        let lifecycle = KeyLifecycle::new(OciKeys::new(api.as_ref()), planned_state.poller());

        let key = lifecycle
            .create(
                diags,
                &planned_state.create_request(),
                &planned_state.desired(),
            )
            .await?;

        let mut state = planned_state.clone();
        state.refresh_from(&key);
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.api.get(diags).await?;
        let lifecycle = KeyLifecycle::new(OciKeys::new(api.as_ref()), planned_state.poller());

        let key = lifecycle
            .reconcile(diags, prior_state.id.as_str(), &planned_state.desired())
            .await?;

        let mut state = planned_state.clone();
        state.refresh_from(&key);
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
        let lifecycle = KeyLifecycle::new(OciKeys::new(api.as_ref()), state.poller());

        lifecycle
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
        if id.is_empty() {
            diags.root_error_short("Import ID must be the CipherTrust Manager key ID");
            return None;
        }
        let state = Self::State {
            id: Value::Value(Cow::Owned(id)),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
