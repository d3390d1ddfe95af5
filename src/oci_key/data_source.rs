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

use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::client::ApiHandle;
use crate::utils::{detail, WithSchema};

use super::api::{OciKey, OciKeys};
use super::state::OciKeyDataState;

#[derive(Debug, Default, Clone)]
pub struct OciKeyDataSource {
    pub(super) api: ApiHandle,
}

impl OciKeyDataSource {
    pub fn new(api: ApiHandle) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for OciKeyDataSource {
    type State<'a> = OciKeyDataState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OciKeyDataState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let by_id = !config.id.is_null();
        let by_name = !config.vault.is_null() || !config.name.is_null();
        if by_id == by_name {
            diags.root_error_short("Exactly one of `id` or `vault` and `name` must be set");
        } else if by_name && (config.vault.is_null() || config.name.is_null()) {
            let missing = if config.vault.is_null() { "vault" } else { "name" };
            diags.error_short(
                "`vault` and `name` must be set together",
                AttributePath::new(missing),
            );
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let api = self.api.get(diags).await?;
        let keys = OciKeys::new(api.as_ref());

        let key = if config.id.is_null() {
            find_one(diags, &keys, config.vault.as_str(), config.name.as_str()).await?
        } else {
            match keys.get(config.id.as_str()).await {
                Ok(key) => key,
                Err(err) => {
                    diags.error(
                        "Failed to read OCI key",
                        detail(&err, [("id", config.id.as_str())]),
                        AttributePath::new("id"),
                    );
                    return None;
                }
            }
        };

        let mut state = config.clone();
        state.refresh_from(&key);
        Some(state)
    }
}

async fn find_one(
    diags: &mut Diagnostics,
    keys: &OciKeys<'_>,
    vault: &str,
    name: &str,
) -> Option<OciKey> {
    let context = [("vault", vault), ("name", name)];
    let found = match keys.find(vault, name).await {
        Ok(found) => found,
        Err(err) => {
            diags.root_error("Failed to list OCI keys", detail(&err, context));
            return None;
        }
    };

    // the list filter is a prefix match
    let mut found: Vec<OciKey> = found
        .into_iter()
        .filter(|key| key.oci_params.display_name == name && !key.state().is_deletion())
        .collect();
    match found.len() {
        1 => found.pop(),
        0 => {
            diags.error(
                "OCI key not found",
                detail("No key with this name exists in the vault.", context),
                AttributePath::new("name"),
            );
            None
        }
        n => {
            diags.error(
                "OCI key name is ambiguous",
                detail(format!("{n} keys share this name, use `id` instead."), context),
                AttributePath::new("name"),
            );
            None
        }
    }
}
