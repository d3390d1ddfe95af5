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

use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state reported by OCI for keys and key versions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Creating,
    Enabling,
    Enabled,
    Disabling,
    Disabled,
    Updating,
    Deleting,
    Deleted,
    SchedulingDeletion,
    PendingDeletion,
    CancellingDeletion,
    ChangingCompartment,
    BackupInProgress,
    Restoring,
    Other(String),
}

impl LifecycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Creating => "CREATING",
            LifecycleState::Enabling => "ENABLING",
            LifecycleState::Enabled => "ENABLED",
            LifecycleState::Disabling => "DISABLING",
            LifecycleState::Disabled => "DISABLED",
            LifecycleState::Updating => "UPDATING",
            LifecycleState::Deleting => "DELETING",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::SchedulingDeletion => "SCHEDULING_DELETION",
            LifecycleState::PendingDeletion => "PENDING_DELETION",
            LifecycleState::CancellingDeletion => "CANCELLING_DELETION",
            LifecycleState::ChangingCompartment => "CHANGING_COMPARTMENT",
            LifecycleState::BackupInProgress => "BACKUP_IN_PROGRESS",
            LifecycleState::Restoring => "RESTORING",
            LifecycleState::Other(state) => state,
        }
    }

    /// The backend rejects dependent calls while the object is in one of these states
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LifecycleState::Creating
                | LifecycleState::Enabling
                | LifecycleState::Disabling
                | LifecycleState::Updating
                | LifecycleState::Deleting
                | LifecycleState::SchedulingDeletion
                | LifecycleState::CancellingDeletion
                | LifecycleState::ChangingCompartment
                | LifecycleState::BackupInProgress
                | LifecycleState::Restoring
        )
    }

    /// Deletion has been requested or completed
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            LifecycleState::Deleting
                | LifecycleState::Deleted
                | LifecycleState::SchedulingDeletion
                | LifecycleState::PendingDeletion
        )
    }
}

impl From<&str> for LifecycleState {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "CREATING" => LifecycleState::Creating,
            "ENABLING" => LifecycleState::Enabling,
            "ENABLED" => LifecycleState::Enabled,
            "DISABLING" => LifecycleState::Disabling,
            "DISABLED" => LifecycleState::Disabled,
            "UPDATING" => LifecycleState::Updating,
            "DELETING" => LifecycleState::Deleting,
            "DELETED" => LifecycleState::Deleted,
            "SCHEDULING_DELETION" => LifecycleState::SchedulingDeletion,
            "PENDING_DELETION" => LifecycleState::PendingDeletion,
            "CANCELLING_DELETION" => LifecycleState::CancellingDeletion,
            "CHANGING_COMPARTMENT" => LifecycleState::ChangingCompartment,
            "BACKUP_IN_PROGRESS" => LifecycleState::BackupInProgress,
            "RESTORING" => LifecycleState::Restoring,
            _ => LifecycleState::Other(value.to_owned()),
        }
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Other(String::new())
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LifecycleState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LifecycleState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = String::deserialize(deserializer)?;
        Ok(LifecycleState::from(state.as_str()))
    }
}
