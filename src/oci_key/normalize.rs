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

use tf_provider::{value::Value, Diagnostics};

use crate::utils::WithNormalize;

use super::state::OciKeyState;

impl<'a> WithNormalize for OciKeyState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.id.is_null() {
            self.id = Value::Unknown;
        }
        if self.key_id.is_null() {
            self.key_id = Value::Unknown;
        }
        if self.lifecycle_state.is_null() {
            self.lifecycle_state = Value::Unknown;
        }
        if self.current_key_version.is_null() {
            self.current_key_version = Value::Unknown;
        }
        if self.protection_mode.is_null() {
            self.protection_mode = Value::Unknown;
        }
    }
}
