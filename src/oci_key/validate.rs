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
use tf_provider::value::Value;
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::{DisplayJoinable, WithValidate};

use super::state::OciKeyState;

const ALGORITHMS: [&str; 3] = ["AES", "RSA", "ECDSA"];
const PROTECTION_MODES: [&str; 2] = ["HSM", "SOFTWARE"];

#[async_trait]
impl<'a> WithValidate for OciKeyState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(algorithm) = &self.algorithm {
            let algorithm: &str = algorithm;
            if !ALGORITHMS.contains(&algorithm) {
                diags.error(
                    "Unsupported key algorithm",
                    format!(
                        "`{algorithm}` is not supported, expected one of: {}",
                        ALGORITHMS.iter().join_with(", ")
                    ),
                    attr_path.clone().attribute("algorithm"),
                );
            } else if algorithm == "ECDSA" && self.curve_id.is_null() {
                diags.error_short(
                    "`curve_id` is required for ECDSA keys",
                    attr_path.clone().attribute("curve_id"),
                );
            }
        }

        if let Value::Value(mode) = &self.protection_mode {
            let mode: &str = mode;
            if !PROTECTION_MODES.contains(&mode) {
                diags.error(
                    "Unsupported protection mode",
                    format!(
                        "`{mode}` is not supported, expected one of: {}",
                        PROTECTION_MODES.iter().join_with(", ")
                    ),
                    attr_path.clone().attribute("protection_mode"),
                );
            }
        }

        if let Value::Value(days) = self.schedule_deletion_days {
            if !(7..=30).contains(&days) {
                diags.error(
                    "Invalid deletion delay",
                    format!("`schedule_deletion_days` must be between 7 and 30, got {days}"),
                    attr_path.clone().attribute("schedule_deletion_days"),
                );
            }
        }

        if let Value::Value(timeout) = self.timeout {
            if timeout <= 0 {
                diags.error_short(
                    "`timeout` must be a positive number of seconds",
                    attr_path.attribute("timeout"),
                );
            }
        }
    }
}
