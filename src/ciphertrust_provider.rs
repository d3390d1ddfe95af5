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
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueBool, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::value::ValueEmpty;
use tf_provider::{map, AttributePath, Diagnostics, Provider};
use tracing::info;

use crate::client::http::{ClientConfig, HttpClient};
use crate::client::ApiHandle;
use crate::mutex::KeyedMutex;
use crate::oci_acl::OciAclResource;
use crate::oci_key::{OciKeyDataSource, OciKeyResource};
use crate::oci_key_version::OciKeyVersionResource;
use crate::utils::attribute;

const DEFAULT_DOMAIN: &str = "root";
const DEFAULT_REST_API_TIMEOUT: i64 = 60;

#[derive(Debug, Default, Clone)]
pub struct CipherTrustProvider {
    api: ApiHandle,
    locks: Arc<KeyedMutex>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherTrustConfig<'a> {
    #[serde(borrow = "'a")]
    pub address: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub username: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub password: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub domain: ValueString<'a>,
    #[serde(borrow = "'a")]
    pub auth_domain: ValueString<'a>,
    pub no_ssl_verify: ValueBool,
    pub rest_api_timeout: ValueNumber,
}

fn setting(value: &ValueString, env: impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    match value {
        Value::Value(value) if !value.is_empty() => Some(value.to_string()),
        _ => env(var).filter(|value| !value.is_empty()),
    }
}

impl<'a> CipherTrustConfig<'a> {
    /// Resolve the settings, falling back to `CM_*` variables from `env`
    fn resolve(
        &self,
        diags: &mut Diagnostics,
        env: impl Fn(&str) -> Option<String> + Copy,
    ) -> Option<ClientConfig> {
        let mut required = |value: &ValueString, name: &'static str, var: &str| {
            let resolved = setting(value, env, var);
            if resolved.is_none() {
                diags.error(
                    "Missing provider setting",
                    format!("Set `{name}` in the provider block or the `{var}` environment variable."),
                    AttributePath::new(name),
                );
            }
            resolved
        };
        let address = required(&self.address, "address", "CM_ADDRESS");
        let username = required(&self.username, "username", "CM_USERNAME");
        let password = required(&self.password, "password", "CM_PASSWORD");

        let no_ssl_verify = match self.no_ssl_verify {
            Value::Value(no_ssl_verify) => no_ssl_verify,
            _ => env("CM_NO_SSL_VERIFY")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let timeout = match self.rest_api_timeout {
            Value::Value(timeout) => Some(timeout),
            _ => match env("CM_REST_API_TIMEOUT") {
                Some(value) => match value.parse::<i64>() {
                    Ok(timeout) => Some(timeout),
                    Err(err) => {
                        diags.error(
                            "Invalid `rest_api_timeout`",
                            format!("`CM_REST_API_TIMEOUT` is not a number of seconds: {err}"),
                            AttributePath::new("rest_api_timeout"),
                        );
                        None
                    }
                },
                None => Some(DEFAULT_REST_API_TIMEOUT),
            },
        };
        if let Some(timeout) = timeout {
            if timeout <= 0 {
                diags.error_short(
                    "`rest_api_timeout` must be a positive number of seconds",
                    AttributePath::new("rest_api_timeout"),
                );
            }
        }

        if !diags.errors.is_empty() {
            return None;
        }
        Some(ClientConfig {
            address: address?,
            username: username?,
            password: password?,
            domain: setting(&self.domain, env, "CM_DOMAIN")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned()),
            auth_domain: setting(&self.auth_domain, env, "CM_AUTH_DOMAIN")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned()),
            no_ssl_verify,
            request_timeout: Duration::from_secs(timeout?.unsigned_abs()),
        })
    }
}

fn from_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

#[async_trait]
impl Provider for CipherTrustProvider {
    type Config<'a> = CipherTrustConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        use AttributeConstraint::Optional;
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "address" => attribute(AttributeType::String, Optional, "CipherTrust Manager URL (env: CM_ADDRESS)"),
                    "username" => attribute(AttributeType::String, Optional, "CipherTrust Manager user (env: CM_USERNAME)"),
                    "password" => Attribute {
                        sensitive: true,
                        ..attribute(AttributeType::String, Optional, "Password of the user (env: CM_PASSWORD)")
                    },
                    "domain" => attribute(AttributeType::String, Optional, "Domain of the resources (env: CM_DOMAIN, default: root)"),
                    "auth_domain" => attribute(AttributeType::String, Optional, "Domain the user authenticates in (env: CM_AUTH_DOMAIN, default: root)"),
                    "no_ssl_verify" => attribute(AttributeType::Bool, Optional, "Skip TLS certificate verification (env: CM_NO_SSL_VERIFY)"),
                    "rest_api_timeout" => attribute(AttributeType::Number, Optional, "Seconds before an API request times out (env: CM_REST_API_TIMEOUT, default: 60)"),
                },
                blocks: Default::default(),
                description: Description::plain("ciphertrust"),
                deprecated: false,
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        // unknown values get resolved at configure time
        let has_unknown = [&config.address, &config.username, &config.password]
            .iter()
            .any(|value| matches!(value, Value::Unknown));
        if has_unknown {
            return Some(());
        }
        config.resolve(diags, from_env).map(|_| ())
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let client_config = config.resolve(diags, from_env)?;
        info!(
            address = %client_config.address,
            terraform_version = %terraform_version,
            "configuring CipherTrust Manager client"
        );

        match HttpClient::new(client_config) {
            Ok(client) => {
                self.api.set(Arc::new(client)).await;
                Some(())
            }
            Err(err) => {
                diags.root_error("Failed to configure CipherTrust Manager client", err.to_string());
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::DynamicResource>>>
    {
        Some(map! {
            "ciphertrust_oci_key" => OciKeyResource::new(self.api.clone()),
            "ciphertrust_oci_key_version" => OciKeyVersionResource::new(self.api.clone()),
            "ciphertrust_oci_acl" => OciAclResource::new(self.api.clone(), self.locks.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::DynamicDataSource>>,
    > {
        Some(map! {
            "ciphertrust_oci_key" => OciKeyDataSource::new(self.api.clone()),
        })
    }
}
