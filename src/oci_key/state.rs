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
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueBool, ValueMap, ValueNumber, ValueString};
use tf_provider::map;
use tf_provider::schema::{Block, Description, Schema};

use crate::lifecycle::LifecycleState;
use crate::poll::Poller;
use crate::utils::{attribute, WithSchema};

use super::api::{CreateKey, CreateKeyParams, KeyShape, OciKey};
use super::lifecycle::DesiredKey;

pub(super) const DEFAULT_DELETION_DAYS: i64 = 7;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciKeyState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub vault: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub compartment_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub algorithm: ValueString<'a>,
    pub length: ValueNumber,
    #[serde(borrow = "'a")]
    pub curve_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub protection_mode: ValueString<'a>,
    pub enable_key: ValueBool,
    pub enable_auto_rotation: ValueBool,
    #[serde(borrow = "'a")]
    pub freeform_tags: ValueMap<'a, ValueString<'a>>,
    pub schedule_deletion_days: ValueNumber,
    pub timeout: ValueNumber,
    #[serde(borrow = "'a")]
    pub key_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub lifecycle_state: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub current_key_version: ValueString<'a>,
}

/// Lookup of an existing OCI key
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciKeyDataState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub vault: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub compartment_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub algorithm: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub protection_mode: ValueString<'a>,
    pub enabled: ValueBool,
    pub auto_rotation: ValueBool,
    #[serde(borrow = "'a")]
    pub freeform_tags: ValueMap<'a, ValueString<'a>>,
    #[serde(borrow = "'a")]
    pub key_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub lifecycle_state: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub current_key_version: ValueString<'a>,
}

fn string<'a>(value: &str) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.to_owned()))
}

fn tags<'a>(tags: &ValueMap<'a, ValueString<'a>>) -> BTreeMap<String, String> {
    tags.as_ref()
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| Some((k.to_string(), v.as_ref_option()?.to_string())))
        .collect()
}

fn tags_value<'a>(tags: &BTreeMap<String, String>) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        tags.iter()
            .map(|(k, v)| (Cow::Owned(k.clone()), string(v)))
            .collect(),
    )
}

fn is_enabled(state: &LifecycleState) -> bool {
    !matches!(
        state,
        LifecycleState::Disabled | LifecycleState::Disabling
    )
}

impl<'a> OciKeyState<'a> {
    pub fn desired(&self) -> DesiredKey {
        DesiredKey {
            name: self.name.as_str().to_owned(),
            compartment_id: self.compartment_id.as_str().to_owned(),
            enabled: self.enable_key.as_ref().copied().unwrap_or(true),
            auto_rotation: self.enable_auto_rotation.as_ref().copied().unwrap_or(false),
            freeform_tags: tags(&self.freeform_tags),
        }
    }

    pub fn create_request(&self) -> CreateKey {
        CreateKey {
            vault: self.vault.as_str().to_owned(),
            oci_params: CreateKeyParams {
                compartment_id: self.compartment_id.as_str().to_owned(),
                display_name: self.name.as_str().to_owned(),
                key_shape: KeyShape {
                    algorithm: self.algorithm.as_str().to_uppercase(),
                    length: self.length.as_ref_option().copied(),
                    curve_id: self.curve_id.as_ref_option().map(|curve| curve.to_string()),
                },
                protection_mode: self.protection_mode.as_ref_option().map(|mode| mode.to_string()),
                freeform_tags: tags(&self.freeform_tags),
            },
        }
    }

    pub fn poller(&self) -> Poller {
        self.timeout
            .as_ref()
            .map_or_else(Poller::default, |timeout| Poller::from_timeout_secs(*timeout))
    }

    pub fn deletion_days(&self) -> i64 {
        self.schedule_deletion_days
            .as_ref()
            .copied()
            .unwrap_or(DEFAULT_DELETION_DAYS)
    }

    /// Copy the remote key into the state.
    ///
    /// Optional attributes left unset in the configuration stay unset as long
    /// as the remote value matches their default.
    pub fn refresh_from(&mut self, key: &OciKey) {
        let params = &key.oci_params;

        self.id = string(&key.id);
        self.key_id = string(&key.key_id);
        self.lifecycle_state = string(params.lifecycle_state.as_str());
        self.current_key_version = string(&params.current_key_version);
        if !key.vault.is_empty() {
            self.vault = string(&key.vault);
        }
        self.name = string(&params.display_name);
        self.compartment_id = string(&params.compartment_id);
        if !params.key_shape.algorithm.is_empty() {
            self.algorithm = string(&params.key_shape.algorithm);
        }
        if let (Value::Value(_), Some(length)) = (&self.length, params.key_shape.length) {
            self.length = Value::Value(length);
        }
        if let (Value::Value(_), Some(curve_id)) = (&self.curve_id, &params.key_shape.curve_id) {
            self.curve_id = string(curve_id);
        }
        if !params.protection_mode.is_empty() {
            self.protection_mode = string(&params.protection_mode);
        }

        let enabled = is_enabled(&params.lifecycle_state);
        if !(self.enable_key.is_null() && enabled) {
            self.enable_key = Value::Value(enabled);
        }
        let rotation = params.is_auto_rotation_enabled;
        if !(self.enable_auto_rotation.is_null() && !rotation) {
            self.enable_auto_rotation = Value::Value(rotation);
        }
        if !(self.freeform_tags.is_null() && params.freeform_tags.is_empty()) {
            self.freeform_tags = tags_value(&params.freeform_tags);
        }
    }
}

impl<'a> OciKeyDataState<'a> {
    pub fn refresh_from(&mut self, key: &OciKey) {
        let params = &key.oci_params;

        self.id = string(&key.id);
        self.vault = string(&key.vault);
        self.name = string(&params.display_name);
        self.compartment_id = string(&params.compartment_id);
        self.algorithm = string(&params.key_shape.algorithm);
        self.protection_mode = string(&params.protection_mode);
        self.enabled = Value::Value(is_enabled(&params.lifecycle_state));
        self.auto_rotation = Value::Value(params.is_auto_rotation_enabled);
        self.freeform_tags = tags_value(&params.freeform_tags);
        self.key_id = string(&key.key_id);
        self.lifecycle_state = string(params.lifecycle_state.as_str());
        self.current_key_version = string(&params.current_key_version);
    }
}

impl<'a> WithSchema for OciKeyState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "CipherTrust Manager resource ID of the key"),
                    "vault" => attribute(AttributeType::String, Required, "CipherTrust Manager vault the key is created in"),
                    "name" => attribute(AttributeType::String, Required, "Display name of the key"),
                    "compartment_id" => attribute(AttributeType::String, Required, "OCID of the compartment holding the key"),
                    "algorithm" => attribute(AttributeType::String, Required, "Key algorithm: AES, RSA or ECDSA"),
                    "length" => attribute(AttributeType::Number, Optional, "Key length in bytes"),
                    "curve_id" => attribute(AttributeType::String, Optional, "Curve of ECDSA keys, eg: NIST_P256"),
                    "protection_mode" => attribute(AttributeType::String, OptionalComputed, "HSM or SOFTWARE"),
                    "enable_key" => attribute(AttributeType::Bool, Optional, "Whether the key is enabled (default: true)"),
                    "enable_auto_rotation" => attribute(AttributeType::Bool, Optional, "Whether OCI rotates the key automatically (default: false)"),
                    "freeform_tags" => attribute(AttributeType::Map(Box::new(AttributeType::String)), Optional, "Free-form tags of the key"),
                    "schedule_deletion_days" => attribute(AttributeType::Number, Optional, "Days before the key is deleted once destroyed, between 7 and 30 (default: 7)"),
                    "timeout" => attribute(AttributeType::Number, Optional, "Seconds to wait for a lifecycle transition (default: 600)"),
                    "key_id" => attribute(AttributeType::String, Computed, "OCID of the key"),
                    "lifecycle_state" => attribute(AttributeType::String, Computed, "Lifecycle state of the key in OCI"),
                    "current_key_version" => attribute(AttributeType::String, Computed, "OCID of the current key version"),
                },
                blocks: Default::default(),
                description: Description::plain("OCI key managed through CipherTrust Manager"),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithSchema for OciKeyDataState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, OptionalComputed};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, OptionalComputed, "CipherTrust Manager resource ID of the key"),
                    "vault" => attribute(AttributeType::String, OptionalComputed, "Vault to search the key in, with `name`"),
                    "name" => attribute(AttributeType::String, OptionalComputed, "Display name of the key, with `vault`"),
                    "compartment_id" => attribute(AttributeType::String, Computed, "OCID of the compartment holding the key"),
                    "algorithm" => attribute(AttributeType::String, Computed, "Key algorithm"),
                    "protection_mode" => attribute(AttributeType::String, Computed, "HSM or SOFTWARE"),
                    "enabled" => attribute(AttributeType::Bool, Computed, "Whether the key is enabled"),
                    "auto_rotation" => attribute(AttributeType::Bool, Computed, "Whether OCI rotates the key automatically"),
                    "freeform_tags" => attribute(AttributeType::Map(Box::new(AttributeType::String)), Computed, "Free-form tags of the key"),
                    "key_id" => attribute(AttributeType::String, Computed, "OCID of the key"),
                    "lifecycle_state" => attribute(AttributeType::String, Computed, "Lifecycle state of the key in OCI"),
                    "current_key_version" => attribute(AttributeType::String, Computed, "OCID of the current key version"),
                },
                blocks: Default::default(),
                description: Description::plain("Lookup of an OCI key known to CipherTrust Manager"),
                deprecated: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use tf_provider::value::Value;

    use super::OciKeyState;
    use crate::lifecycle::LifecycleState;
    use crate::oci_key::api::{OciKey, OciKeyParams};

    fn key(state: LifecycleState) -> OciKey {
        OciKey {
            id: "key-123".to_owned(),
            key_id: "ocid1.key.oc1..key-123".to_owned(),
            vault: "vault-1".to_owned(),
            oci_params: OciKeyParams {
                compartment_id: "compartment-a".to_owned(),
                display_name: "tf-key".to_owned(),
                lifecycle_state: state,
                protection_mode: "HSM".to_owned(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn unset_defaults_stay_unset() {
        let mut state = OciKeyState::default();
        state.refresh_from(&key(LifecycleState::Enabled));

        assert!(state.enable_key.is_null());
        assert!(state.enable_auto_rotation.is_null());
        assert!(state.freeform_tags.is_null());
        assert_eq!(state.lifecycle_state.as_str(), "ENABLED");
        assert_eq!(state.protection_mode.as_str(), "HSM");
    }

    #[test]
    fn drift_is_reported() {
        let mut state = OciKeyState::default();
        state.refresh_from(&key(LifecycleState::Disabled));

        assert_eq!(state.enable_key, Value::Value(false));
        assert_eq!(state.name.as_str(), "tf-key");
    }

    #[test]
    fn desired_defaults() {
        let state = OciKeyState {
            name: Value::Value(Cow::Borrowed("tf-key")),
            compartment_id: Value::Value(Cow::Borrowed("compartment-a")),
            ..Default::default()
        };
        let desired = state.desired();

        assert!(desired.enabled);
        assert!(!desired.auto_rotation);
        assert!(desired.freeform_tags.is_empty());
        assert_eq!(state.deletion_days(), 7);
        assert_eq!(state.poller().retries(), 60);
    }
}
