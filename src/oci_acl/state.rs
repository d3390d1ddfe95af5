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
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{attribute, DisplayJoinable, WithNormalize, WithSchema, WithValidate};

use super::api::Principal;

const ACTIONS: [&str; 12] = [
    "view",
    "keycreate",
    "keyupload",
    "keyupdate",
    "keyenable",
    "keydisable",
    "keydelete",
    "keyrestore",
    "keysynchronize",
    "keydestroy",
    "keyversioncreate",
    "keyversiondelete",
];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciAclState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub vault_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub user_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub group: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub actions: ValueList<ValueString<'a>>,
}

impl<'a> OciAclState<'a> {
    pub fn principal(&self) -> Option<Principal> {
        match (&self.user_id, &self.group) {
            (Value::Value(user), Value::Null) => Some(Principal::User(user.to_string())),
            (Value::Null, Value::Value(group)) => Some(Principal::Group(group.to_string())),
            _ => None,
        }
    }

    /// Known actions of the entry, unknown elements are skipped
    pub fn action_set(&self) -> BTreeSet<String> {
        match &self.actions {
            Value::Value(actions) => actions
                .iter()
                .filter_map(known)
                .map(|action| action.to_string())
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Restrict actions read from the vault to the ones this entry manages.
    ///
    /// An imported entry has no actions yet and adopts everything granted.
    pub fn managed(&self, granted: BTreeSet<String>) -> BTreeSet<String> {
        if self.actions.is_null() {
            return granted;
        }
        let managed = self.action_set();
        granted
            .into_iter()
            .filter(|action| managed.contains(action))
            .collect()
    }

    pub fn refresh_from(&mut self, principal: &Principal, actions: BTreeSet<String>) {
        self.id = Value::Value(Cow::Owned(format!("{}:{principal}", self.vault_id.as_str())));
        self.actions = Value::Value(
            actions
                .into_iter()
                .map(|action| Value::Value(Cow::Owned(action)))
                .collect(),
        );
    }

    /// Parse `<vault_id>:user:<id>` or `<vault_id>:group:<name>`
    pub fn from_import_id(id: &str) -> Option<Self> {
        let (vault, principal) = id.split_once(':')?;
        let (kind, name) = principal.split_once(':')?;
        if vault.is_empty() || name.is_empty() {
            return None;
        }
        let name = Value::Value(Cow::Owned(name.to_owned()));
        let (user_id, group) = match kind {
            "user" => (name, Value::Null),
            "group" => (Value::Null, name),
            _ => return None,
        };
        Some(Self {
            id: Value::Value(Cow::Owned(id.to_owned())),
            vault_id: Value::Value(Cow::Owned(vault.to_owned())),
            user_id,
            group,
            actions: Value::Null,
        })
    }
}

fn known<'b>(action: &'b ValueString<'_>) -> Option<&'b str> {
    match action {
        Value::Value(action) => Some(&**action),
        _ => None,
    }
}

#[async_trait]
impl<'a> WithValidate for OciAclState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if self.user_id.is_null() == self.group.is_null() {
            diags.error_short(
                "Exactly one of `user_id` or `group` must be set",
                attr_path.clone().attribute("user_id"),
            );
        }

        if let Value::Value(actions) = &self.actions {
            for action in actions.iter().filter_map(known) {
                if !ACTIONS.contains(&action) {
                    diags.error(
                        "Unsupported vault action",
                        format!(
                            "`{action}` is not supported, expected one of: {}",
                            ACTIONS.iter().join_with(", ")
                        ),
                        attr_path.clone().attribute("actions"),
                    );
                }
            }
        }
    }
}

impl<'a> WithNormalize for OciAclState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.id.is_null() {
            self.id = Value::Unknown;
        }
    }
}

impl<'a> WithSchema for OciAclState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "Vault ID and principal of the entry"),
                    "vault_id" => attribute(AttributeType::String, Required, "CipherTrust Manager resource ID of the vault"),
                    "user_id" => attribute(AttributeType::String, Optional, "CipherTrust Manager user the actions are granted to"),
                    "group" => attribute(AttributeType::String, Optional, "CipherTrust Manager group the actions are granted to"),
                    "actions" => attribute(AttributeType::Set(Box::new(AttributeType::String)), Required, "Actions granted on the vault"),
                },
                blocks: Default::default(),
                description: Description::plain("Access control entry of an OCI vault managed through CipherTrust Manager"),
                deprecated: false,
            },
        }
    }
}
