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

use anyhow::Result;
use tf_provider::serve;
use tracing_subscriber::EnvFilter;

use crate::ciphertrust_provider::CipherTrustProvider;

mod ciphertrust_provider;
mod client;
mod lifecycle;
mod mutex;
mod oci_acl;
mod oci_key;
mod oci_key_version;
mod poll;
#[cfg(test)]
mod testing;
mod utils;

const LOG_FILTER_ENV: &str = "TF_LOG_PROVIDER_CIPHERTRUST";

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved to the plugin handshake
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();

    serve("ciphertrust", CipherTrustProvider::default()).await
}
