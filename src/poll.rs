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

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::Result;
use crate::lifecycle::LifecycleState;

/// How the remote object is re-fetched on each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Ask CipherTrust Manager to resynchronize the object from OCI first
    Refresh,
    /// Plain read of the last known object
    Read,
}

/// Condition the poller waits for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    /// Wait until the object is no longer in this state
    Leave(LifecycleState),
    /// Wait until the object reaches this state
    Reach(LifecycleState),
}

impl WaitFor {
    fn pending(&self, state: &LifecycleState) -> bool {
        match self {
            WaitFor::Leave(source) => state == source,
            WaitFor::Reach(target) => state != target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The awaited condition holds, with the last fetched state
    Converged(LifecycleState),
    /// The object never left the awaited state
    TimedOut(LifecycleState),
    /// The object never reached its target and ended up being deleted
    Failed(LifecycleState),
    /// The object never reached its target, but is not known to be broken
    Unexpected(LifecycleState),
}

impl PollOutcome {
    pub fn state(&self) -> &LifecycleState {
        match self {
            PollOutcome::Converged(state)
            | PollOutcome::TimedOut(state)
            | PollOutcome::Failed(state)
            | PollOutcome::Unexpected(state) => state,
        }
    }
}

/// Remote object whose lifecycle state can be observed
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn fetch_state(&self, handle: &str, mode: FetchMode) -> Result<LifecycleState>;

    async fn refresh_token(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    token_refresh_after: Duration,
    retries: u64,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl Poller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_TOKEN_REFRESH: Duration = Duration::from_secs(180);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(timeout: Duration) -> Self {
        Self::with_interval(timeout, Self::DEFAULT_INTERVAL)
    }

    /// The retry budget is the number of whole intervals fitting in `timeout`.
    ///
    /// A zero interval polls back to back with an unbounded budget.
    pub fn with_interval(timeout: Duration, interval: Duration) -> Self {
        let retries = timeout
            .as_millis()
            .checked_div(interval.as_millis())
            .map_or(u64::MAX, |retries| u64::try_from(retries).unwrap_or(u64::MAX));
        Self::with_retries(retries, interval)
    }

    pub fn with_retries(retries: u64, interval: Duration) -> Self {
        Self {
            interval,
            token_refresh_after: Self::DEFAULT_TOKEN_REFRESH,
            retries,
        }
    }

    /// Build a poller from a timeout in seconds as given in a resource configuration
    pub fn from_timeout_secs(timeout: i64) -> Self {
        match u64::try_from(timeout) {
            Ok(secs) if secs > 0 => Self::new(Duration::from_secs(secs)),
            _ => Self::default(),
        }
    }

    pub fn token_refresh_after(mut self, token_refresh_after: Duration) -> Self {
        self.token_refresh_after = token_refresh_after;
        self
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn timeout(&self) -> Duration {
        self.interval
            .saturating_mul(u32::try_from(self.retries).unwrap_or(u32::MAX))
    }

    /// Poll `handle` until `wait` is satisfied or the retry budget is exhausted.
    ///
    /// Errors while fetching the state or renewing the token abort the poll.
    pub async fn await_state<S>(
        &self,
        source: &S,
        handle: &str,
        wait: &WaitFor,
        mode: FetchMode,
    ) -> Result<PollOutcome>
    where
        S: StateSource + ?Sized,
    {
        let mut state = source.fetch_state(handle, mode).await?;
        let mut last_refresh = Instant::now();
        let mut attempt = 0;

        while wait.pending(&state) && attempt < self.retries {
            attempt += 1;
            tokio::time::sleep(self.interval).await;

            if last_refresh.elapsed() > self.token_refresh_after {
                info!(handle, "refreshing authentication token while waiting");
                if let Err(err) = source.refresh_token().await {
                    warn!(handle, "token refresh failed, giving up: {err}");
                    return Err(err);
                }
                last_refresh = Instant::now();
            }

            state = source.fetch_state(handle, mode).await?;
            debug!(handle, %state, attempt, retries = self.retries, "polled lifecycle state");
        }

        Ok(match wait {
            _ if !wait.pending(&state) => PollOutcome::Converged(state),
            WaitFor::Leave(_) => PollOutcome::TimedOut(state),
            WaitFor::Reach(_) if state.is_deletion() => PollOutcome::Failed(state),
            WaitFor::Reach(_) => PollOutcome::Unexpected(state),
        })
    }
}
