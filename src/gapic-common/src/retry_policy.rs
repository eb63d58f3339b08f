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

//! Defines the retry policy used by wrapped RPCs.
//!
//! Generated clients retry an RPC when it fails with a transient error, that
//! is, when the service (or a REST transport) returns one of the status codes
//! configured for the method. Between attempts the client waits, and the wait
//! grows with each attempt: this is [exponential backoff] capped at a maximum
//! delay, without jitter.
//!
//! The policy does not limit the number of attempts. The retry loop in
//! [RpcCall][crate::rpc_call::RpcCall] stops when the call deadline expires.
//!
//! # Example
//! ```
//! # use google_cloud_gapic_common::retry_policy::RetryPolicy;
//! # use google_cloud_gapic_common::error::{Error, rpc::{Code, Status}};
//! use std::time::Duration;
//! # tokio_test::block_on(async {
//! let mut policy = RetryPolicy::new()
//!     .with_retry_codes(["UNAVAILABLE"])
//!     .with_initial_delay(Duration::from_millis(1))
//!     .with_multiplier(2.0)
//!     .with_max_delay(Duration::from_millis(4));
//! let error = Error::service(Status::default().set_code(Code::Unavailable));
//! assert!(policy.should_retry(&error).await);
//! assert_eq!(policy.delay(), Duration::from_millis(2));
//! # });
//! ```
//!
//! [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

use crate::error::Error as RpcError;
use crate::error::rpc::Code;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MULTIPLIER: f64 = 1.3;
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(15);

/// The error type for invalid retry policy configurations.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("the multiplier ({0}) should be >= 1.0")]
    InvalidMultiplier(f64),
    #[error("the delay ({0}) should be a non-negative number of seconds")]
    InvalidDelay(f64),
    #[error(
        "the maximum delay ({maximum:?}) should be greater than or equal to the initial delay ({initial:?})"
    )]
    EmptyRange { maximum: Duration, initial: Duration },
}

/// A status code in a retry policy, given as a [Code], a name, or a number.
///
/// Retry configurations shipped with generated clients name the codes, e.g.
/// `"UNAVAILABLE"`, while hand-written configurations often use the numeric
/// value, e.g. `14`. Both resolve to the same [Code].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RetryCode {
    #[serde(skip)]
    Code(Code),
    Name(String),
    Number(i32),
}

impl RetryCode {
    /// Resolves the value using the canonical status code table.
    pub fn resolve(&self) -> Option<Code> {
        match self {
            Self::Code(c) => Some(*c),
            Self::Name(n) => Code::try_from(n.as_str()).ok(),
            Self::Number(n) => Code::from_ordinal(*n),
        }
    }
}

impl From<Code> for RetryCode {
    fn from(value: Code) -> Self {
        Self::Code(value)
    }
}

impl From<&str> for RetryCode {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for RetryCode {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<i32> for RetryCode {
    fn from(value: i32) -> Self {
        Self::Number(value)
    }
}

/// Decides if a failed RPC is retried, and waits before the next attempt.
///
/// Each field is optional. Unset fields use a default: an initial delay of one
/// second, a multiplier of 1.3, and a maximum delay of 15 seconds. Without
/// retry codes no error is retryable. Unset fields can be filled from another
/// policy with [apply_defaults][RetryPolicy::apply_defaults].
///
/// The policy is stateful: each successful [should_retry][RetryPolicy::should_retry]
/// grows the delay for the next one. Create (or clone) a policy for each call.
///
/// # Example
/// ```
/// # use google_cloud_gapic_common::retry_policy::RetryPolicy;
/// use std::time::Duration;
/// let policy = RetryPolicy::new().with_retry_codes(["UNAVAILABLE", "DEADLINE_EXCEEDED"]);
/// assert_eq!(policy.delay(), Duration::from_secs(1));
/// assert_eq!(policy.max_delay(), Duration::from_secs(15));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "RetryPolicyConfig")]
pub struct RetryPolicy {
    retry_codes: Option<Vec<Code>>,
    initial_delay: Option<Duration>,
    multiplier: Option<f64>,
    max_delay: Option<Duration>,
    delay: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy with all fields unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retryable status codes.
    ///
    /// Names and numbers are resolved with the canonical status code table.
    /// Values outside the table are dropped.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gapic_common::retry_policy::RetryPolicy;
    /// # use google_cloud_gapic_common::error::rpc::Code;
    /// let by_name = RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]);
    /// let by_number = RetryPolicy::new().with_retry_codes([14]);
    /// assert_eq!(by_name.retry_codes(), by_number.retry_codes());
    /// assert_eq!(by_name.retry_codes(), &[Code::Unavailable]);
    /// ```
    pub fn with_retry_codes<I, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RetryCode>,
    {
        self.retry_codes = Some(resolve_codes(v.into_iter().map(Into::into)));
        self
    }

    /// Sets the delay before the first retry.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = Some(v.into());
        self
    }

    /// Sets the growth factor for the delay.
    pub fn with_multiplier<V: Into<f64>>(mut self, v: V) -> Self {
        self.multiplier = Some(v.into());
        self
    }

    /// Sets the upper bound for the delay.
    pub fn with_max_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.max_delay = Some(v.into());
        self
    }

    /// The retryable status codes, empty if unset.
    pub fn retry_codes(&self) -> &[Code] {
        self.retry_codes.as_deref().unwrap_or_default()
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier.unwrap_or(DEFAULT_MULTIPLIER)
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay.unwrap_or(DEFAULT_MAX_DELAY)
    }

    /// The wait before the next retry.
    pub fn delay(&self) -> Duration {
        self.delay.unwrap_or_else(|| self.initial_delay())
    }

    /// Verifies the effective configuration produces a non-decreasing delay
    /// sequence.
    pub fn validate(&self) -> Result<(), Error> {
        let multiplier = self.multiplier();
        if !(multiplier >= 1.0 && multiplier.is_finite()) {
            return Err(Error::InvalidMultiplier(multiplier));
        }
        if self.max_delay() < self.initial_delay() {
            return Err(Error::EmptyRange {
                maximum: self.max_delay(),
                initial: self.initial_delay(),
            });
        }
        Ok(())
    }

    /// Fills any unset field from `defaults`.
    ///
    /// Fields already set, including an explicitly empty set of retry codes,
    /// are not changed.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gapic_common::retry_policy::RetryPolicy;
    /// use std::time::Duration;
    /// let mut policy = RetryPolicy::new().with_initial_delay(Duration::from_secs(5));
    /// let defaults = RetryPolicy::new()
    ///     .with_initial_delay(Duration::from_secs(1))
    ///     .with_retry_codes(["UNAVAILABLE"]);
    /// policy.apply_defaults(&defaults);
    /// assert_eq!(policy.initial_delay(), Duration::from_secs(5));
    /// assert_eq!(policy.retry_codes().len(), 1);
    /// ```
    pub fn apply_defaults(&mut self, defaults: &RetryPolicy) -> &mut Self {
        if self.retry_codes.is_none() {
            self.retry_codes = defaults.retry_codes.clone();
        }
        self.initial_delay = self.initial_delay.or(defaults.initial_delay);
        self.multiplier = self.multiplier.or(defaults.multiplier);
        self.max_delay = self.max_delay.or(defaults.max_delay);
        self
    }

    /// Returns true if `error` has one of the retryable status codes.
    ///
    /// Only errors in the transport status family have a code, see
    /// [Error::code][crate::error::Error::code]. Anything else is never
    /// retryable.
    pub fn is_retryable(&self, error: &RpcError) -> bool {
        error
            .code()
            .is_some_and(|code| self.retry_codes().contains(&code))
    }

    /// Decides if the call that failed with `error` should be retried.
    ///
    /// If the error is retryable, waits for [delay][RetryPolicy::delay], grows
    /// the delay for the next call, and returns `true`. Otherwise returns
    /// `false` immediately, without changing the policy.
    ///
    /// The wait uses [tokio::time::sleep] and does not block the thread.
    pub async fn should_retry(&mut self, error: &RpcError) -> bool {
        self.should_retry_with(error, tokio::time::sleep).await
    }

    /// Like [should_retry][RetryPolicy::should_retry], using `sleep` to wait.
    pub async fn should_retry_with<S, F>(&mut self, error: &RpcError, sleep: S) -> bool
    where
        S: FnOnce(Duration) -> F,
        F: Future<Output = ()>,
    {
        if !self.is_retryable(error) {
            return false;
        }
        sleep(self.delay()).await;
        self.delay = Some(self.next_delay());
        true
    }

    fn next_delay(&self) -> Duration {
        let current = self.delay();
        let maximum = self.max_delay();
        let multiplier = self.multiplier();
        if current >= maximum || maximum.div_duration_f64(current) <= multiplier {
            maximum
        } else {
            // .mul_f64() cannot panic: the product is below `maximum`.
            current.mul_f64(multiplier.max(0.0))
        }
    }
}

fn resolve_codes<I>(codes: I) -> Vec<Code>
where
    I: Iterator<Item = RetryCode>,
{
    let mut resolved = Vec::new();
    for code in codes {
        match code.resolve() {
            Some(c) if !resolved.contains(&c) => resolved.push(c),
            Some(_) => {}
            None => tracing::warn!(?code, "ignoring unknown retry code"),
        }
    }
    resolved
}

// The configuration shape shipped with generated clients: delays are
// (fractional) seconds.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RetryPolicyConfig {
    retry_codes: Option<Vec<RetryCode>>,
    initial_delay: Option<f64>,
    multiplier: Option<f64>,
    max_delay: Option<f64>,
}

impl TryFrom<RetryPolicyConfig> for RetryPolicy {
    type Error = Error;

    fn try_from(value: RetryPolicyConfig) -> Result<Self, Self::Error> {
        let policy = RetryPolicy {
            retry_codes: value.retry_codes.map(|c| resolve_codes(c.into_iter())),
            initial_delay: value.initial_delay.map(seconds).transpose()?,
            multiplier: value.multiplier,
            max_delay: value.max_delay.map(seconds).transpose()?,
            delay: None,
        };
        policy.validate()?;
        Ok(policy)
    }
}

pub(crate) fn seconds(v: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(v).map_err(|_| Error::InvalidDelay(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::error::rpc::Status;
    use serde_json::json;
    use test_case::test_case;

    static_assertions::assert_impl_all!(RetryPolicy: Clone, Send, Sync, std::fmt::Debug);

    fn unavailable() -> RpcError {
        RpcError::service(Status::default().set_code(Code::Unavailable).set_message("try-again"))
    }

    fn permission_denied() -> RpcError {
        RpcError::service(
            Status::default()
                .set_code(Code::PermissionDenied)
                .set_message("uh-oh"),
        )
    }

    // Runs `should_retry_with()` and returns the decision and the wait, if any.
    async fn decide(policy: &mut RetryPolicy, error: &RpcError) -> (bool, Option<Duration>) {
        let mut waited = None;
        let retry = policy
            .should_retry_with(error, |d| {
                waited = Some(d);
                async {}
            })
            .await;
        (retry, waited)
    }

    fn assert_close(got: Duration, want: Duration) {
        let diff = if got > want { got - want } else { want - got };
        assert!(
            diff <= Duration::from_micros(1),
            "got={got:?}, want={want:?}"
        );
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::new();
        assert!(policy.retry_codes().is_empty(), "{policy:?}");
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.multiplier(), 1.3);
        assert_eq!(policy.max_delay(), Duration::from_secs(15));
        assert_eq!(policy.delay(), Duration::from_secs(1));
        assert_eq!(policy.validate(), Ok(()));
    }

    #[test]
    fn setters() {
        let policy = RetryPolicy::new()
            .with_retry_codes([Code::Unavailable, Code::DeadlineExceeded])
            .with_initial_delay(Duration::from_millis(250))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(4));
        assert_eq!(
            policy.retry_codes(),
            &[Code::Unavailable, Code::DeadlineExceeded]
        );
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
        assert_eq!(policy.multiplier(), 2.0);
        assert_eq!(policy.max_delay(), Duration::from_secs(4));
        assert_eq!(policy.delay(), Duration::from_millis(250));
    }

    #[test]
    fn names_and_numbers_are_equivalent() {
        let by_name = RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]);
        let by_number = RetryPolicy::new().with_retry_codes([14]);
        let by_code = RetryPolicy::new().with_retry_codes([Code::Unavailable]);
        assert_eq!(by_name, by_number);
        assert_eq!(by_name, by_code);
    }

    #[test]
    fn unknown_codes_are_dropped() {
        let policy = RetryPolicy::new().with_retry_codes([
            RetryCode::from("NOT-A-CODE"),
            RetryCode::from(99),
            RetryCode::from(-1),
            RetryCode::from("ABORTED"),
            RetryCode::from(10),
        ]);
        assert_eq!(policy.retry_codes(), &[Code::Aborted]);
    }

    #[test_case(RetryCode::from(Code::Internal), Some(Code::Internal))]
    #[test_case(RetryCode::from("INTERNAL"), Some(Code::Internal))]
    #[test_case(RetryCode::from(String::from("INTERNAL")), Some(Code::Internal))]
    #[test_case(RetryCode::from(13), Some(Code::Internal))]
    #[test_case(RetryCode::from("internal"), None)]
    #[test_case(RetryCode::from(17), None)]
    fn retry_code_resolve(input: RetryCode, want: Option<Code>) {
        assert_eq!(input.resolve(), want);
    }

    #[tokio::test]
    async fn non_transport_errors_never_retry() {
        let mut policy = RetryPolicy::new().with_retry_codes([Code::Unavailable, Code::Unknown]);
        for error in [
            RpcError::io("connection reset"),
            RpcError::timeout("deadline"),
            RpcError::deser("bad payload"),
            RpcError::other("application error"),
        ] {
            let (retry, waited) = decide(&mut policy, &error).await;
            assert!(!retry, "{error:?}");
            assert_eq!(waited, None, "{error:?}");
            assert_eq!(policy.delay(), Duration::from_secs(1));
        }
    }

    #[tokio::test]
    async fn unlisted_code_does_not_retry() {
        let mut policy = RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]);
        let before = policy.clone();
        let (retry, waited) = decide(&mut policy, &permission_denied()).await;
        assert!(!retry);
        assert_eq!(waited, None);
        assert_eq!(policy, before);
    }

    #[tokio::test]
    async fn without_codes_nothing_retries() {
        let mut policy = RetryPolicy::new();
        let (retry, waited) = decide(&mut policy, &unavailable()).await;
        assert!(!retry);
        assert_eq!(waited, None);
    }

    #[tokio::test]
    async fn retryable_error_grows_delay() {
        let mut policy = RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]);
        let mut previous = policy.delay();
        for _ in 0..20 {
            let (retry, waited) = decide(&mut policy, &unavailable()).await;
            assert!(retry);
            assert_eq!(waited, Some(previous));
            let want = std::cmp::min(previous.mul_f64(1.3), Duration::from_secs(15));
            assert_close(policy.delay(), want);
            assert!(policy.delay() >= previous, "{policy:?}");
            assert!(policy.delay() <= Duration::from_secs(15), "{policy:?}");
            previous = policy.delay();
        }
        assert_eq!(policy.delay(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn default_delay_sequence() {
        let mut policy = RetryPolicy::new().with_retry_codes([14]);
        let mut waits = Vec::new();
        for _ in 0..4 {
            let (retry, waited) = decide(&mut policy, &unavailable()).await;
            assert!(retry);
            waits.extend(waited);
        }
        let want = [1.0, 1.3, 1.69, 2.197].map(Duration::from_secs_f64);
        assert_eq!(waits.len(), want.len());
        for (got, want) in waits.into_iter().zip(want) {
            assert_close(got, want);
        }
    }

    #[tokio::test]
    async fn http_errors_use_status_codes() {
        let mut policy = RetryPolicy::new()
            .with_retry_codes(["UNAVAILABLE"])
            .with_initial_delay(Duration::from_millis(10));

        let plain = RpcError::http(HttpError::new(503, Default::default(), None));
        assert!(decide(&mut policy, &plain).await.0);

        let payload = json!({"error": {"code": 500, "status": "UNAVAILABLE", "message": "x"}});
        let with_status = RpcError::http(HttpError::new(
            500,
            Default::default(),
            Some(bytes::Bytes::from_owner(payload.to_string())),
        ));
        assert!(decide(&mut policy, &with_status).await.0);

        let not_found = RpcError::http(HttpError::new(404, Default::default(), None));
        assert!(!decide(&mut policy, &not_found).await.0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_sleeps() {
        let mut policy = RetryPolicy::new()
            .with_retry_codes(["UNAVAILABLE"])
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_millis(300));
        let start = tokio::time::Instant::now();
        assert!(policy.should_retry(&unavailable()).await);
        assert!(start.elapsed() >= Duration::from_millis(100), "{start:?}");
        assert!(policy.should_retry(&unavailable()).await);
        assert!(start.elapsed() >= Duration::from_millis(300), "{start:?}");
        assert_eq!(policy.delay(), Duration::from_millis(300));

        let before = start.elapsed();
        assert!(!policy.should_retry(&permission_denied()).await);
        assert_eq!(start.elapsed(), before);
    }

    #[tokio::test]
    async fn end_to_end_capped_sequence() {
        let mut policy = RetryPolicy::new()
            .with_retry_codes(["UNAVAILABLE"])
            .with_initial_delay(Duration::from_secs_f64(0.01))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs_f64(0.1));
        let mut waits = Vec::new();
        for _ in 0..5 {
            let (retry, waited) = decide(&mut policy, &unavailable()).await;
            assert!(retry);
            waits.extend(waited);
        }
        let want = [10, 20, 40, 80, 100].map(Duration::from_millis);
        assert_eq!(waits.len(), want.len());
        for (got, want) in waits.into_iter().zip(want) {
            assert_close(got, want);
        }

        let (retry, waited) = decide(&mut policy, &permission_denied()).await;
        assert!(!retry);
        assert_eq!(waited, None);
    }

    #[test]
    fn apply_defaults_keeps_set_fields() {
        let mut policy = RetryPolicy::new().with_initial_delay(Duration::from_secs(5));
        let defaults = RetryPolicy::new()
            .with_retry_codes(["UNAVAILABLE", "DEADLINE_EXCEEDED"])
            .with_initial_delay(Duration::from_secs(1))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(60));
        policy.apply_defaults(&defaults);
        assert_eq!(policy.initial_delay(), Duration::from_secs(5));
        assert_eq!(policy.delay(), Duration::from_secs(5));
        assert_eq!(
            policy.retry_codes(),
            &[Code::Unavailable, Code::DeadlineExceeded]
        );
        assert_eq!(policy.multiplier(), 2.0);
        assert_eq!(policy.max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn apply_defaults_keeps_empty_codes() {
        let empty: [i32; 0] = [];
        let mut policy = RetryPolicy::new().with_retry_codes(empty);
        policy.apply_defaults(&RetryPolicy::new().with_retry_codes(["UNAVAILABLE"]));
        assert!(policy.retry_codes().is_empty(), "{policy:?}");
    }

    #[test]
    fn apply_defaults_from_unset() {
        let mut policy = RetryPolicy::new().with_multiplier(1.5);
        policy.apply_defaults(&RetryPolicy::new());
        assert_eq!(policy, RetryPolicy::new().with_multiplier(1.5));
    }

    #[test]
    fn validate() {
        let policy = RetryPolicy::new().with_multiplier(0.5);
        assert!(
            matches!(policy.validate(), Err(Error::InvalidMultiplier(_))),
            "{policy:?}"
        );
        let policy = RetryPolicy::new().with_multiplier(f64::NAN);
        assert!(
            matches!(policy.validate(), Err(Error::InvalidMultiplier(_))),
            "{policy:?}"
        );
        let policy = RetryPolicy::new().with_initial_delay(Duration::from_secs(30));
        assert!(
            matches!(policy.validate(), Err(Error::EmptyRange { .. })),
            "{policy:?}"
        );
    }

    #[test]
    fn deserialize() -> anyhow::Result<()> {
        let input = json!({
            "initial_delay": 0.5,
            "multiplier": 2.0,
            "max_delay": 10.0,
            "retry_codes": ["UNAVAILABLE", 4, "NOT-A-CODE"]
        });
        let got = serde_json::from_value::<RetryPolicy>(input)?;
        let want = RetryPolicy::new()
            .with_retry_codes([Code::Unavailable, Code::DeadlineExceeded])
            .with_initial_delay(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));
        assert_eq!(got, want);

        let got = serde_json::from_value::<RetryPolicy>(json!({}))?;
        assert_eq!(got, RetryPolicy::new());
        Ok(())
    }

    #[test_case(json!({"initial_delay": -1.0}); "negative delay")]
    #[test_case(json!({"multiplier": 0.9}); "small multiplier")]
    #[test_case(json!({"initial_delay": 20.0, "max_delay": 10.0}); "empty range")]
    #[test_case(json!({"retry_codes": "UNAVAILABLE"}); "codes not a list")]
    fn deserialize_errors(input: serde_json::Value) {
        let got = serde_json::from_value::<RetryPolicy>(input);
        assert!(got.is_err(), "{got:?}");
    }
}
