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

//! Wraps a transport method with deadlines and retries.
//!
//! Generated clients wrap each transport method (a "stub method") in an
//! [RpcCall]. The wrapper computes the call deadline, invokes the stub, and
//! consults the [RetryPolicy] after each failure. Retries continue until the
//! call succeeds, fails with a non-retryable error, or runs out of time.

use crate::Result;
use crate::error::Error;
use crate::options::{CallOptions, MethodConfig};
use crate::retry_policy::RetryPolicy;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// The options for a single attempt, passed to the stub method.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct AttemptOptions {
    timeout: Option<Duration>,
    metadata: HashMap<String, String>,
    attempt: u32,
}

impl AttemptOptions {
    /// The time remaining before the call deadline, if any.
    ///
    /// Transports should use this as the timeout for the attempt.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The metadata to send with the request.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// The attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Calls a stub method, retrying transient failures until the deadline.
///
/// # Example
/// ```
/// # use google_cloud_gapic_common::Result;
/// # use google_cloud_gapic_common::rpc_call::{AttemptOptions, RpcCall};
/// # use google_cloud_gapic_common::options::CallOptions;
/// # tokio_test::block_on(async {
/// let call = RpcCall::new(async |request: String, _options: AttemptOptions| -> Result<String> {
///     Ok(format!("hello {request}"))
/// });
/// let response = call.call("world".to_string(), CallOptions::default()).await?;
/// assert_eq!(response, "hello world");
/// # Ok::<(), google_cloud_gapic_common::error::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct RpcCall<F> {
    stub: F,
    defaults: Option<MethodConfig>,
}

impl<F> RpcCall<F> {
    /// Wraps `stub`, which makes a single attempt of the RPC.
    pub fn new(stub: F) -> Self {
        Self {
            stub,
            defaults: None,
        }
    }

    /// Sets the method defaults applied to the options of each call.
    pub fn with_method_config(mut self, v: MethodConfig) -> Self {
        self.defaults = Some(v);
        self
    }

    /// Makes the call, retrying as configured in `options`.
    ///
    /// The stub receives a clone of `request` on each attempt. Non-retryable
    /// errors are returned unchanged. If the deadline expires the result is a
    /// timeout error, and [Error::root_cause] returns the last retried error.
    pub async fn call<Request, Response>(
        &self,
        request: Request,
        options: CallOptions,
    ) -> Result<Response>
    where
        F: AsyncFn(Request, AttemptOptions) -> Result<Response>,
        Request: Clone,
    {
        self.call_with_sleep(request, options, tokio::time::sleep)
            .await
    }

    /// Like [call][RpcCall::call], using `sleep` to wait between attempts.
    pub async fn call_with_sleep<Request, Response, S, SF>(
        &self,
        request: Request,
        mut options: CallOptions,
        sleep: S,
    ) -> Result<Response>
    where
        F: AsyncFn(Request, AttemptOptions) -> Result<Response>,
        Request: Clone,
        S: Fn(Duration) -> SF,
        SF: Future<Output = ()>,
    {
        if let Some(defaults) = &self.defaults {
            options.apply_defaults(defaults);
        }
        // A timeout too large to represent means there is no deadline.
        let deadline = options
            .timeout()
            .and_then(|t| Instant::now().checked_add(t));
        let mut policy = options.retry_policy().cloned().unwrap_or_default();
        let mut retried: Option<Error> = None;
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let attempt_options = AttemptOptions {
                timeout: remaining,
                metadata: options.metadata().clone(),
                attempt,
            };
            let pending = (self.stub)(request.clone(), attempt_options);
            let result = match remaining {
                None => pending.await,
                Some(r) => match tokio::time::timeout(r, pending).await {
                    Ok(result) => result,
                    Err(elapsed) => Err(Error::timeout(elapsed)),
                },
            };
            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if error.is_timeout() {
                return Err(with_retried(error, retried));
            }
            if !policy.is_retryable(&error) {
                return Err(error);
            }
            if sleeps_past(deadline, &policy) {
                tracing::debug!(
                    attempt,
                    code = ?error.code(),
                    delay = ?policy.delay(),
                    "not enough time left to retry"
                );
                return Err(Error::timeout(format!(
                    "the call deadline expired after {attempt} attempt(s)"
                ))
                .with_root_cause(error));
            }
            tracing::debug!(
                attempt,
                code = ?error.code(),
                delay = ?policy.delay(),
                "retrying after transient error"
            );
            if !policy.should_retry_with(&error, &sleep).await {
                return Err(error);
            }
            retried = Some(error);
        }
    }
}

fn sleeps_past(deadline: Option<Instant>, policy: &RetryPolicy) -> bool {
    deadline.is_some_and(|d| {
        Instant::now()
            .checked_add(policy.delay())
            .is_none_or(|wakeup| wakeup >= d)
    })
}

fn with_retried(error: Error, retried: Option<Error>) -> Error {
    match retried {
        Some(cause) => error.with_root_cause(cause),
        None => error,
    }
}
