// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-call options and per-method defaults.
//!
//! Generated clients ship a default configuration for each method: a timeout,
//! some metadata, and a retry policy. Applications may override any of these
//! for a single call using [CallOptions]. Before the call is made, the options
//! are completed with the method defaults via
//! [CallOptions::apply_defaults]. Values set by the application always win.

use crate::retry_policy::RetryPolicy;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::Duration;

/// A set of options configuring a single call.
///
/// # Example
/// ```
/// # use google_cloud_gapic_common::options::{CallOptions, MethodConfig};
/// # use google_cloud_gapic_common::retry_policy::RetryPolicy;
/// use std::time::Duration;
/// let mut options = CallOptions::default();
/// options.set_timeout(Duration::from_secs(5));
///
/// let defaults = MethodConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_retry_policy(RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]));
/// options.apply_defaults(&defaults);
/// assert_eq!(options.timeout(), Some(Duration::from_secs(5)));
/// assert!(options.retry_policy().is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallOptions {
    timeout: Option<Duration>,
    metadata: HashMap<String, String>,
    retry_policy: Option<RetryPolicy>,
}

impl CallOptions {
    /// The overall deadline for the call, including any retries.
    ///
    /// `None` means the call has no deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout<V: Into<Duration>>(&mut self, v: V) {
        self.timeout = Some(v.into());
    }

    /// Removes any timeout, the call will not have a deadline unless a default
    /// is applied.
    pub fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    /// The metadata sent with each attempt.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Adds (or replaces) a metadata entry.
    pub fn set_metadata<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn set_retry_policy<V: Into<RetryPolicy>>(&mut self, v: V) {
        self.retry_policy = Some(v.into());
    }

    /// Fills any unset option from the method defaults.
    ///
    /// The timeout is only used if no timeout is set. Metadata entries are
    /// merged, and entries already in `self` win. The retry policy is
    /// completed using [RetryPolicy::apply_defaults], and created if needed.
    pub fn apply_defaults(&mut self, defaults: &MethodConfig) -> &mut Self {
        self.timeout = self.timeout.or(defaults.timeout);
        for (k, v) in &defaults.metadata {
            self.metadata
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        self.retry_policy
            .get_or_insert_with(RetryPolicy::default)
            .apply_defaults(&defaults.retry_policy);
        self
    }

    /// Returns a copy of these options where the fields set in `other`
    /// override.
    ///
    /// Metadata entries are merged, entries in `other` win.
    pub fn merge(&self, other: &CallOptions) -> CallOptions {
        let mut metadata = self.metadata.clone();
        metadata.extend(other.metadata.clone());
        CallOptions {
            timeout: other.timeout.or(self.timeout),
            metadata,
            retry_policy: other
                .retry_policy
                .clone()
                .or_else(|| self.retry_policy.clone()),
        }
    }
}

/// The default configuration for a method.
///
/// Generated clients ship these defaults as JSON, with durations expressed as
/// (fractional) seconds:
///
/// ```
/// # use google_cloud_gapic_common::options::MethodConfig;
/// # use google_cloud_gapic_common::error::rpc::Code;
/// use std::time::Duration;
/// let config = serde_json::from_value::<MethodConfig>(serde_json::json!({
///     "timeout": 60.0,
///     "metadata": {"x-goog-request-params": "name=projects/p"},
///     "retry_policy": {
///         "initial_delay": 1.0,
///         "multiplier": 1.3,
///         "max_delay": 15.0,
///         "retry_codes": ["UNAVAILABLE", 4]
///     }
/// }))?;
/// assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
/// assert_eq!(
///     config.retry_policy().retry_codes(),
///     &[Code::Unavailable, Code::DeadlineExceeded]
/// );
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MethodConfig {
    #[serde(deserialize_with = "deserialize_timeout")]
    timeout: Option<Duration>,
    metadata: HashMap<String, String>,
    retry_policy: RetryPolicy,
}

impl MethodConfig {
    /// The default timeout, `None` if the method has no deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = Some(v.into());
        self
    }

    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_retry_policy<V: Into<RetryPolicy>>(mut self, v: V) -> Self {
        self.retry_policy = v.into();
        self
    }
}

// Negative (and null) timeouts disable the deadline.
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) if v < 0.0 => Ok(None),
        Some(v) => crate::retry_policy::seconds(v)
            .map(Some)
            .map_err(D::Error::custom),
    }
}
