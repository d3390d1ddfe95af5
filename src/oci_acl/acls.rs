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

use std::collections::BTreeSet;

use tf_provider::Diagnostics;
use tracing::{debug, info};

use crate::mutex::KeyedMutex;
use crate::utils::{detail, DisplayJoinable};

use super::api::{AclUpdate, OciVaults, Principal};

/// Access control entries of OCI vaults.
///
/// CipherTrust Manager applies ACL changes as add/remove deltas on the whole
/// vault list, so every read-modify-write holds the vault lock.
#[derive(Debug, Clone, Copy)]
pub struct VaultAcls<'a> {
    vaults: OciVaults<'a>,
    locks: &'a KeyedMutex,
}

impl<'a> VaultAcls<'a> {
    pub fn new(vaults: OciVaults<'a>, locks: &'a KeyedMutex) -> Self {
        Self { vaults, locks }
    }

    /// Actions currently granted, `None` when the vault does not exist anymore
    pub async fn read(
        &self,
        diags: &mut Diagnostics,
        vault: &str,
        principal: &Principal,
    ) -> Option<BTreeSet<String>> {
        let principal_name = principal.to_string();
        match self.vaults.get(vault).await {
            Ok(found) => Some(found.actions(principal)),
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "OCI vault not found",
                    detail(&err, [("vault_id", vault), ("principal", principal_name.as_str())]),
                );
                None
            }
            Err(err) => {
                diags.root_error(
                    "Failed to read OCI vault",
                    detail(&err, [("vault_id", vault), ("principal", principal_name.as_str())]),
                );
                None
            }
        }
    }

    /// Grant exactly `desired` to `principal`, among the actions it manages.
    ///
    /// `managed` holds the actions previously granted through this entry; actions
    /// granted outside of it are left untouched. Returns the desired actions the
    /// vault now grants, never the unmanaged ones.
    pub async fn set(
        &self,
        diags: &mut Diagnostics,
        vault: &str,
        principal: &Principal,
        managed: &BTreeSet<String>,
        desired: &BTreeSet<String>,
    ) -> Option<BTreeSet<String>> {
        let principal_name = principal.to_string();
        let context = [("vault_id", vault), ("principal", principal_name.as_str())];
        let _guard = self.locks.lock(vault).await;

        let current = match self.vaults.get(vault).await {
            Ok(found) => found.actions(principal),
            Err(err) => {
                diags.root_error("Failed to read OCI vault", detail(&err, context));
                return None;
            }
        };

        let grant: BTreeSet<String> = desired.difference(&current).cloned().collect();
        let revoke: BTreeSet<String> = managed
            .intersection(&current)
            .filter(|action| !desired.contains(*action))
            .cloned()
            .collect();

        let mut updates = Vec::new();
        if !grant.is_empty() {
            updates.push(AclUpdate::new(principal, grant.clone(), true));
        }
        if !revoke.is_empty() {
            updates.push(AclUpdate::new(principal, revoke.clone(), false));
        }
        if updates.is_empty() {
            debug!(vault, principal = %principal, "ACL already up to date");
            return Some(current.intersection(desired).cloned().collect());
        }

        match self.vaults.update_acls(vault, &updates).await {
            Ok(found) => {
                info!(
                    vault,
                    principal = %principal,
                    "ACL updated, granted [{}], revoked [{}]",
                    grant.iter().join_with(", "),
                    revoke.iter().join_with(", ")
                );
                Some(found.actions(principal).intersection(desired).cloned().collect())
            }
            Err(err) => {
                diags.root_error("Failed to update OCI vault ACL", detail(&err, context));
                None
            }
        }
    }

    /// Revoke `actions` from `principal`, a missing vault is already revoked
    pub async fn revoke(
        &self,
        diags: &mut Diagnostics,
        vault: &str,
        principal: &Principal,
        actions: &BTreeSet<String>,
    ) {
        if actions.is_empty() {
            return;
        }
        let principal_name = principal.to_string();
        let context = [("vault_id", vault), ("principal", principal_name.as_str())];
        let _guard = self.locks.lock(vault).await;

        let update = AclUpdate::new(principal, actions.clone(), false);
        match self.vaults.update_acls(vault, &[update]).await {
            Ok(_) => info!(vault, principal = %principal, "ACL revoked"),
            Err(err) if err.is_not_found() => {
                diags.root_warning("OCI vault already deleted", detail(&err, context));
            }
            Err(err) => {
                diags.root_error("Failed to revoke OCI vault ACL", detail(&err, context));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tf_provider::Diagnostics;

    use super::VaultAcls;
    use crate::mutex::KeyedMutex;
    use crate::oci_acl::api::{OciVaults, Principal};
    use crate::testing::FakeCm;

    fn actions(actions: &[&str]) -> BTreeSet<String> {
        actions.iter().map(|action| action.to_string()).collect()
    }

    #[tokio::test]
    async fn grant_and_revoke() {
        let fake = FakeCm::new().with_vault(
            "vault-1",
            json!([{"user_id": "u1", "group": null, "actions": ["view"]}]),
        );
        let locks = KeyedMutex::new();
        let acls = VaultAcls::new(OciVaults::new(&fake), &locks);
        let user = Principal::User("u1".to_owned());
        let mut diags = Diagnostics::default();

        let granted = acls
            .set(
                &mut diags,
                "vault-1",
                &user,
                &actions(&["view"]),
                &actions(&["keycreate", "keyupdate"]),
            )
            .await
            .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(granted, actions(&["keycreate", "keyupdate"]));
        assert_eq!(
            fake.state_changes(),
            ["POST api/v1/cckm/oci/vaults/vault-1/update-acls"]
        );
    }

    #[tokio::test]
    async fn unmanaged_actions_are_kept() {
        let fake = FakeCm::new().with_vault(
            "vault-1",
            json!([{"user_id": "u1", "group": null, "actions": ["view", "keydelete"]}]),
        );
        let locks = KeyedMutex::new();
        let acls = VaultAcls::new(OciVaults::new(&fake), &locks);
        let user = Principal::User("u1".to_owned());
        let mut diags = Diagnostics::default();

        let granted = acls
            .set(&mut diags, "vault-1", &user, &actions(&["view"]), &actions(&[]))
            .await
            .unwrap();

        assert!(granted.is_empty());
        assert_eq!(
            fake.state().vaults["vault-1"]["acls"][0]["actions"],
            json!(["keydelete"])
        );
    }

    #[tokio::test]
    async fn unmanaged_actions_stay_out_of_result() {
        let fake = FakeCm::new().with_vault(
            "vault-1",
            json!([{"user_id": "u1", "group": null, "actions": ["view", "keydelete"]}]),
        );
        let locks = KeyedMutex::new();
        let acls = VaultAcls::new(OciVaults::new(&fake), &locks);
        let user = Principal::User("u1".to_owned());
        let mut diags = Diagnostics::default();

        let granted = acls
            .set(&mut diags, "vault-1", &user, &BTreeSet::new(), &actions(&["view"]))
            .await
            .unwrap();
        assert_eq!(granted, actions(&["view"]));
        assert!(fake.state_changes().is_empty());

        let granted = acls
            .set(
                &mut diags,
                "vault-1",
                &user,
                &actions(&["view"]),
                &actions(&["view", "keycreate"]),
            )
            .await
            .unwrap();
        assert_eq!(granted, actions(&["keycreate", "view"]));
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn no_update_when_in_sync() {
        let fake = FakeCm::new().with_vault(
            "vault-1",
            json!([{"user_id": "u1", "group": null, "actions": ["view"]}]),
        );
        let locks = KeyedMutex::new();
        let acls = VaultAcls::new(OciVaults::new(&fake), &locks);
        let mut diags = Diagnostics::default();

        acls.set(
            &mut diags,
            "vault-1",
            &Principal::User("u1".to_owned()),
            &actions(&["view"]),
            &actions(&["view"]),
        )
        .await
        .unwrap();

        assert!(fake.state_changes().is_empty());
    }

    #[tokio::test]
    async fn revoke_on_missing_vault_releases_lock() {
        let fake = FakeCm::new();
        let locks = KeyedMutex::new();
        let acls = VaultAcls::new(OciVaults::new(&fake), &locks);
        let mut diags = Diagnostics::default();

        acls.revoke(
            &mut diags,
            "vault-404",
            &Principal::Group("admins".to_owned()),
            &actions(&["view"]),
        )
        .await;

        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
        let again = tokio::time::timeout(Duration::from_secs(1), locks.lock("vault-404")).await;
        assert!(again.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_on_one_vault() {
        let fake = Arc::new(FakeCm::new().with_vault("vault-1", json!([])));
        let locks = Arc::new(KeyedMutex::new());

        let tasks = (0..8).map(|i| {
            let fake = fake.clone();
            let locks = locks.clone();
            tokio::spawn(async move {
                let acls = VaultAcls::new(OciVaults::new(fake.as_ref()), &locks);
                let mut diags = Diagnostics::default();
                acls.set(
                    &mut diags,
                    "vault-1",
                    &Principal::User(format!("u{i}")),
                    &BTreeSet::new(),
                    &actions(&["view"]),
                )
                .await
                .is_some()
            })
        });

        for result in futures::future::join_all(tasks).await {
            assert!(matches!(result, Ok(true)));
        }

        let vault = fake.state().vaults["vault-1"].clone();
        assert_eq!(vault["acls"].as_array().map(Vec::len), Some(8));
    }
}
