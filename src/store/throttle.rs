//! Call-rate throttling for the remote store
//!
//! Implements a shared token bucket using the Governor crate. Every worker
//! goes through the same limiter, so the aggregate call rate stays under the
//! remote API quota no matter how many workers run.

use super::{DocumentStore, Node, PermissionGrant, Role};
use crate::error::Result;
use governor::clock::{Clock, DefaultClock};
use governor::{state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Token-bucket limiter for remote API calls
pub struct ApiLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    clock: DefaultClock,
    calls_per_minute: u32,
}

impl ApiLimiter {
    /// Create a limiter allowing `calls_per_second` calls, with bursts of the same size
    ///
    /// # Example
    /// ```
    /// use dualcopy::store::ApiLimiter;
    /// let limiter = ApiLimiter::new(10);
    /// assert!(limiter.try_acquire());
    /// ```
    pub fn new(calls_per_second: u32) -> Self {
        Self::per_minute(calls_per_second.max(1).saturating_mul(60))
    }

    /// Create a limiter allowing exactly `calls_per_minute` calls per minute.
    ///
    /// Tokens refill one every `60s / calls_per_minute`; the burst is one
    /// second's worth of calls, and never less than one call.
    pub fn per_minute(calls_per_minute: u32) -> Self {
        let calls = calls_per_minute.max(1);
        let burst = NonZeroU32::new(calls / 60).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(Duration::from_secs(60) / calls)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst);

        let clock = DefaultClock::default();
        let limiter = RateLimiter::direct_with_clock(quota, &clock);

        Self {
            limiter: Arc::new(limiter),
            clock,
            calls_per_minute: calls,
        }
    }

    /// Parse a rate such as `"10"`, `"10/s"` or `"90/m"` into calls per minute
    pub fn parse_calls_per_minute(rate: &str) -> Option<u32> {
        let rate = rate.trim().to_lowercase();
        let (num_str, per_minute) = match rate.split_once('/') {
            Some((n, "s")) | Some((n, "sec")) => (n, false),
            Some((n, "m")) | Some((n, "min")) => (n, true),
            Some(_) => return None,
            None => (rate.as_str(), false),
        };

        let num: u32 = num_str.trim().parse().ok()?;
        if num == 0 {
            return None;
        }
        if per_minute {
            Some(num)
        } else {
            num.checked_mul(60)
        }
    }

    /// Configured calls per minute
    pub fn calls_per_minute(&self) -> u32 {
        self.calls_per_minute
    }

    /// Block until a call is allowed
    pub fn wait(&self) {
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }

    /// Take a token if one is available
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Clone for ApiLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            clock: self.clock.clone(),
            calls_per_minute: self.calls_per_minute,
        }
    }
}

/// Store wrapper that takes a limiter token before every call
pub struct ThrottledStore {
    inner: Arc<dyn DocumentStore>,
    limiter: ApiLimiter,
}

impl ThrottledStore {
    /// Wrap `inner` with `limiter`
    pub fn new(inner: Arc<dyn DocumentStore>, limiter: ApiLimiter) -> Self {
        Self { inner, limiter }
    }
}

impl DocumentStore for ThrottledStore {
    fn get_node(&self, id: &str) -> Result<Node> {
        self.limiter.wait();
        self.inner.get_node(id)
    }

    fn list_children(&self, folder_id: &str) -> Result<Vec<Node>> {
        self.limiter.wait();
        self.inner.list_children(folder_id)
    }

    fn create_folder(&self, parent_id: &str, name: &str) -> Result<Node> {
        self.limiter.wait();
        self.inner.create_folder(parent_id, name)
    }

    fn copy_file(&self, file_id: &str, dest_folder_id: &str) -> Result<Node> {
        self.limiter.wait();
        self.inner.copy_file(file_id, dest_folder_id)
    }

    fn list_permissions(&self, node_id: &str) -> Result<Vec<PermissionGrant>> {
        self.limiter.wait();
        self.inner.list_permissions(node_id)
    }

    fn insert_permission(
        &self,
        node_id: &str,
        identity: &str,
        role: Role,
        notify: bool,
    ) -> Result<PermissionGrant> {
        self.limiter.wait();
        self.inner.insert_permission(node_id, identity, role, notify)
    }

    fn remove_permission(&self, node_id: &str, grant_id: &str) -> Result<()> {
        self.limiter.wait();
        self.inner.remove_permission(node_id, grant_id)
    }

    fn current_identity(&self) -> Result<String> {
        self.limiter.wait();
        self.inner.current_identity()
    }
}
