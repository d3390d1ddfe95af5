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

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueNumber, ValueString};
use tf_provider::map;
use tf_provider::schema::{Block, Description, Schema};

use crate::poll::Poller;
use crate::utils::{attribute, WithNormalize, WithSchema};

use super::api::OciKeyVersion;

const DEFAULT_DELETION_DAYS: i64 = 7;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciKeyVersionState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub cckm_key_id: ValueString<'a>,
    pub schedule_deletion_days: ValueNumber,
    pub timeout: ValueNumber,
    #[serde(borrow = "'a")]
    pub version_id: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub lifecycle_state: ValueString<'a>,
}

impl<'a> OciKeyVersionState<'a> {
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

    pub fn refresh_from(&mut self, version: &OciKeyVersion) {
        self.id = Value::Value(Cow::Owned(version.id.clone()));
        self.version_id = Value::Value(Cow::Owned(version.version_id.clone()));
        self.lifecycle_state = Value::Value(Cow::Owned(version.state().to_string()));
    }
}

impl<'a> WithNormalize for OciKeyVersionState<'a> {
    fn normalize(&mut self, _diags: &mut tf_provider::Diagnostics) {
        if self.id.is_null() {
            self.id = Value::Unknown;
        }
        if self.version_id.is_null() {
            self.version_id = Value::Unknown;
        }
        if self.lifecycle_state.is_null() {
            self.lifecycle_state = Value::Unknown;
        }
    }
}

impl<'a> WithSchema for OciKeyVersionState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "CipherTrust Manager resource ID of the key version"),
                    "cckm_key_id" => attribute(AttributeType::String, Required, "CipherTrust Manager resource ID of the key"),
                    "schedule_deletion_days" => attribute(AttributeType::Number, Optional, "Days before the version is deleted once destroyed, between 7 and 30 (default: 7)"),
                    "timeout" => attribute(AttributeType::Number, Optional, "Seconds to wait for the version to be enabled (default: 600)"),
                    "version_id" => attribute(AttributeType::String, Computed, "OCID of the key version"),
                    "lifecycle_state" => attribute(AttributeType::String, Computed, "Lifecycle state of the key version in OCI"),
                },
                blocks: Default::default(),
                description: Description::plain("Version of an OCI key managed through CipherTrust Manager"),
                deprecated: false,
            },
        }
    }
}
