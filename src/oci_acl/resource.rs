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

use tf_provider::value::ValueEmpty;
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::client::ApiHandle;
use crate::mutex::KeyedMutex;
use crate::utils::{detail, WithNormalize, WithSchema, WithValidate};

use super::acls::VaultAcls;
use super::api::{OciVaults, Principal};
use super::state::OciAclState;

#[derive(Debug, Default, Clone)]
pub struct OciAclResource {
    pub(super) api: ApiHandle,
    pub(super) locks: Arc<KeyedMutex>,
}

impl OciAclResource {
    pub fn new(api: ApiHandle, locks: Arc<KeyedMutex>) -> Self {
        Self { api, locks }
    }
}

fn principal_of(diags: &mut Diagnostics, state: &OciAclState) -> Option<Principal> {
    let principal = state.principal();
    if principal.is_none() {
        diags.root_error_short("Exactly one of `user_id` or `group` must be set");
    }
    principal
}

#[async_trait]
impl Resource for OciAclResource {
    type State<'a> = OciAclState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OciAclState::schema())
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
        let principal = principal_of(diags, &state)?;
        let api = self.api.get(diags).await?;
        let acls = VaultAcls::new(OciVaults::new(api.as_ref()), &self.locks);

        let granted = acls
            .read(diags, state.vault_id.as_str(), &principal)
            .await?;
        let actions = state.managed(granted);
        if actions.is_empty() {
            diags.root_warning(
                "OCI vault ACL removed from state",
                detail(
                    "The principal has no action left on the vault.",
                    [("vault_id", state.vault_id.as_str()), ("id", state.id.as_str())],
                ),
            );
            return None;
        }

        let mut state = state.clone();
        state.refresh_from(&principal, actions);
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
        for (name, prior, proposed) in [
            ("vault_id", &prior_state.vault_id, &proposed_state.vault_id),
            ("user_id", &prior_state.user_id, &proposed_state.user_id),
            ("group", &prior_state.group, &proposed_state.group),
        ] {
            if prior != proposed {
                trigger_replace.push(AttributePath::new(name));
            }
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
        let principal = principal_of(diags, &planned_state)?;
        let api = self.api.get(diags).await?;
        let acls = VaultAcls::new(OciVaults::new(api.as_ref()), &self.locks);

        let actions = acls
            .set(
                diags,
                planned_state.vault_id.as_str(),
                &principal,
                &Default::default(),
                &planned_state.action_set(),
            )
            .await?;

        let mut state = planned_state.clone();
        state.refresh_from(&principal, actions);
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
        let principal = principal_of(diags, &planned_state)?;
        let api = self.api.get(diags).await?;
        let acls = VaultAcls::new(OciVaults::new(api.as_ref()), &self.locks);

        let actions = acls
            .set(
                diags,
                planned_state.vault_id.as_str(),
                &principal,
                &prior_state.action_set(),
                &planned_state.action_set(),
            )
            .await?;

        let mut state = planned_state.clone();
        state.refresh_from(&principal, actions);
        Some((state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let principal = principal_of(diags, &state)?;
        let api = self.api.get(diags).await?;
        let acls = VaultAcls::new(OciVaults::new(api.as_ref()), &self.locks);

        acls.revoke(
            diags,
            state.vault_id.as_str(),
            &principal,
            &state.action_set(),
        )
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
        match OciAclState::from_import_id(&id) {
            Some(state) => Some((state, Default::default())),
            None => {
                diags.root_error(
                    "Invalid import ID",
                    format!("Expected `<vault_id>:user:<id>` or `<vault_id>:group:<name>`, got `{id}`"),
                );
                None
            }
        }
    }
}
