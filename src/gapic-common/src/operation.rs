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

//! Types to manage long-running operations (LROs).
//!
//! Some RPCs start a long-running operation in the service and return
//! immediately. The service returns an operation name, and the client polls
//! the operation until it completes. The [Operation] type wraps the last known
//! state of the operation with typed accessors, and polls it using an
//! [OperationsClient].

use crate::Result;
use crate::error::Error;
use crate::error::rpc::Status;
use crate::options::CallOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::Instant;

/// The state of a long-running operation, as returned by the service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct LongRunningOperation {
    /// The server-assigned name.
    pub name: String,
    /// Service-specific progress information, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// If false, the operation is still in progress.
    pub done: bool,
    /// The error result, set only when `done` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    /// The successful result, set only when `done` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl LongRunningOperation {
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    pub fn set_metadata<T: Into<serde_json::Value>>(mut self, v: T) -> Self {
        self.metadata = Some(v.into());
        self
    }

    pub fn set_done(mut self, v: bool) -> Self {
        self.done = v;
        self
    }

    pub fn set_error(mut self, v: Status) -> Self {
        self.error = Some(v);
        self.response = None;
        self
    }

    pub fn set_response<T: Into<serde_json::Value>>(mut self, v: T) -> Self {
        self.response = Some(v.into());
        self.error = None;
        self
    }
}

/// The service used to poll, cancel, and delete long-running operations.
///
/// Generated clients implement this trait using their transport, typically
/// wrapping each method in an [RpcCall][crate::rpc_call::RpcCall].
pub trait OperationsClient: Send + Sync {
    /// Gets the latest state of the operation.
    fn get_operation(
        &self,
        name: String,
        options: CallOptions,
    ) -> impl Future<Output = Result<LongRunningOperation>> + Send;

    /// Starts asynchronous cancellation of the operation.
    fn cancel_operation(
        &self,
        name: String,
        options: CallOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Deletes the operation. The client is no longer interested in it.
    fn delete_operation(
        &self,
        name: String,
        options: CallOptions,
    ) -> impl Future<Output = Result<()>> + Send;
}

type Callback<R, M, C> = Box<dyn FnOnce(&Operation<R, M, C>) + Send>;

/// A long-running operation with typed responses.
///
/// # Parameters
/// * `R` - the response type, returned when the operation completes
///   successfully.
/// * `M` - the metadata type, returned while the operation is in progress.
/// * `C` - the client used to poll the operation.
pub struct Operation<R, M, C> {
    inner: LongRunningOperation,
    client: C,
    options: CallOptions,
    callbacks: Vec<Callback<R, M, C>>,
    response: PhantomData<R>,
    metadata: PhantomData<M>,
}

impl<R, M, C> std::fmt::Debug for Operation<R, M, C>
where
    C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("inner", &self.inner)
            .field("client", &self.client)
            .field("options", &self.options)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl<R, M, C> Operation<R, M, C>
where
    R: DeserializeOwned,
    M: DeserializeOwned,
    C: OperationsClient,
{
    /// Wraps `inner`, using `client` to poll it.
    pub fn new(inner: LongRunningOperation, client: C) -> Self {
        Self {
            inner,
            client,
            options: CallOptions::default(),
            callbacks: Vec::new(),
            response: PhantomData,
            metadata: PhantomData,
        }
    }

    /// Sets the options used on each call to the [OperationsClient].
    pub fn with_options(mut self, v: CallOptions) -> Self {
        self.options = v;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The latest state returned by the service.
    pub fn state(&self) -> &LongRunningOperation {
        &self.inner
    }

    pub fn is_done(&self) -> bool {
        self.inner.done
    }

    /// The operation completed with an error.
    pub fn is_error(&self) -> bool {
        self.is_done() && self.inner.error.is_some()
    }

    /// The operation completed successfully.
    pub fn is_response(&self) -> bool {
        self.is_done() && self.inner.response.is_some()
    }

    /// The error status, if the operation failed.
    pub fn error(&self) -> Option<&Status> {
        self.inner.error.as_ref()
    }

    /// The typed response, if the operation completed successfully.
    pub fn response(&self) -> Result<Option<R>> {
        self.inner.response.as_ref().map(deser).transpose()
    }

    /// The typed metadata, if the service returned any.
    pub fn metadata(&self) -> Result<Option<M>> {
        self.inner.metadata.as_ref().map(deser).transpose()
    }

    /// The outcome of the operation, `None` while it is in progress.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gapic_common::operation::{LongRunningOperation, Operation, OperationsClient};
    /// # use google_cloud_gapic_common::options::CallOptions;
    /// # use google_cloud_gapic_common::Result;
    /// # struct Client;
    /// # impl OperationsClient for Client {
    /// #     async fn get_operation(&self, _: String, _: CallOptions) -> Result<LongRunningOperation> { unimplemented!() }
    /// #     async fn cancel_operation(&self, _: String, _: CallOptions) -> Result<()> { unimplemented!() }
    /// #     async fn delete_operation(&self, _: String, _: CallOptions) -> Result<()> { unimplemented!() }
    /// # }
    /// let state = LongRunningOperation::default()
    ///     .set_name("operations/123")
    ///     .set_done(true)
    ///     .set_response(serde_json::json!("the answer"));
    /// let op = Operation::<String, (), _>::new(state, Client);
    /// match op.results() {
    ///     None => println!("still running"),
    ///     Some(Ok(r)) => println!("success: {r}"),
    ///     Some(Err(e)) => println!("failed: {e}"),
    /// }
    /// ```
    pub fn results(&self) -> Option<Result<R>> {
        if !self.is_done() {
            return None;
        }
        if let Some(status) = self.error() {
            return Some(Err(Error::service(status.clone())));
        }
        self.response().transpose()
    }

    /// Registers `callback` to run when the operation is done.
    ///
    /// Callbacks run in registration order, when [reload][Operation::reload]
    /// finds the operation done. If the operation is already done the
    /// callback runs immediately.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gapic_common::operation::{LongRunningOperation, Operation, OperationsClient};
    /// # use google_cloud_gapic_common::options::CallOptions;
    /// # use google_cloud_gapic_common::Result;
    /// # struct Client;
    /// # impl OperationsClient for Client {
    /// #     async fn get_operation(&self, _: String, _: CallOptions) -> Result<LongRunningOperation> { unimplemented!() }
    /// #     async fn cancel_operation(&self, _: String, _: CallOptions) -> Result<()> { unimplemented!() }
    /// #     async fn delete_operation(&self, _: String, _: CallOptions) -> Result<()> { unimplemented!() }
    /// # }
    /// let state = LongRunningOperation::default()
    ///     .set_name("operations/123")
    ///     .set_done(true)
    ///     .set_response(serde_json::json!("the answer"));
    /// let mut op = Operation::<String, (), _>::new(state, Client);
    /// op.on_done(|op| println!("{} is done", op.name()));
    /// ```
    pub fn on_done<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        if self.is_done() {
            callback(&*self);
        } else {
            self.callbacks.push(Box::new(callback));
        }
        self
    }

    /// Fetches the latest state of the operation.
    ///
    /// Runs the callbacks registered with [on_done][Operation::on_done] if
    /// the operation is now done.
    pub async fn reload(&mut self) -> Result<&mut Self> {
        let name = self.inner.name.clone();
        self.inner = self
            .client
            .get_operation(name, self.options.clone())
            .await?;
        if self.is_done() {
            for callback in std::mem::take(&mut self.callbacks) {
                callback(&*self);
            }
        }
        Ok(self)
    }

    /// Starts asynchronous cancellation of the operation.
    ///
    /// The service makes a best effort to cancel the operation. Use
    /// [reload][Operation::reload] to learn if the cancellation succeeded.
    pub async fn cancel(&self) -> Result<()> {
        self.client
            .cancel_operation(self.inner.name.clone(), self.options.clone())
            .await
    }

    /// Deletes the operation in the service.
    pub async fn delete(&self) -> Result<()> {
        self.client
            .delete_operation(self.inner.name.clone(), self.options.clone())
            .await
    }

    /// Polls the operation until it is done, or until `policy` gives up.
    ///
    /// Errors while polling are returned immediately. Use
    /// [is_done][Operation::is_done] to learn if the operation completed.
    pub async fn wait_until_done(&mut self, policy: PollingPolicy) -> Result<&mut Self> {
        self.wait_until_done_with(policy, tokio::time::sleep).await
    }

    /// Like [wait_until_done][Operation::wait_until_done], using `sleep` to
    /// wait between polls.
    pub async fn wait_until_done_with<S, SF>(
        &mut self,
        mut policy: PollingPolicy,
        sleep: S,
    ) -> Result<&mut Self>
    where
        S: Fn(Duration) -> SF,
        SF: Future<Output = ()>,
    {
        while !self.is_done() {
            self.reload().await?;
            if self.is_done() {
                break;
            }
            tracing::debug!(name = self.name(), delay = ?policy.delay(), "operation in progress");
            if !policy.wait_with(&sleep).await {
                break;
            }
        }
        Ok(self)
    }
}

fn deser<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T> {
    T::deserialize(value).map_err(Error::deser)
}

/// Controls how often, and for how long, an operation is polled.
///
/// The delay between polls starts at 10 seconds and grows by 1.3 after each
/// poll, up to 5 minutes. The policy stops polling after one hour.
///
/// # Example
/// ```
/// # use google_cloud_gapic_common::operation::PollingPolicy;
/// use std::time::Duration;
/// let policy = PollingPolicy::default()
///     .with_initial_delay(Duration::from_secs(1))
///     .with_timeout(Duration::from_secs(60));
/// assert_eq!(policy.delay(), Duration::from_secs(1));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PollingPolicy {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    timeout: Duration,
    delay: Option<Duration>,
    start: Option<Instant>,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            multiplier: 1.3,
            max_delay: Duration::from_secs(300),
            timeout: Duration::from_secs(3600),
            delay: None,
            start: None,
        }
    }
}

impl PollingPolicy {
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    pub fn with_multiplier<V: Into<f64>>(mut self, v: V) -> Self {
        self.multiplier = v.into();
        self
    }

    pub fn with_max_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.max_delay = v.into();
        self
    }

    /// The total time spent waiting for the operation.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    /// The wait before the next poll.
    pub fn delay(&self) -> Duration {
        self.delay.unwrap_or(self.initial_delay)
    }

    /// Waits before the next poll. Returns false, without waiting, if the
    /// wait would exceed the timeout.
    ///
    /// The timeout starts on the first call.
    pub async fn wait(&mut self) -> bool {
        self.wait_with(tokio::time::sleep).await
    }

    /// Like [wait][PollingPolicy::wait], using `sleep` to wait.
    pub async fn wait_with<S, F>(&mut self, sleep: S) -> bool
    where
        S: FnOnce(Duration) -> F,
        F: Future<Output = ()>,
    {
        let start = *self.start.get_or_insert_with(Instant::now);
        let delay = self.delay();
        match start.elapsed().checked_add(delay) {
            Some(end) if end <= self.timeout => {}
            _ => return false,
        }
        sleep(delay).await;
        self.delay = Some(self.next_delay(delay));
        true
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let multiplier = self.multiplier.max(1.0);
        if current >= self.max_delay || self.max_delay.div_duration_f64(current) <= multiplier {
            self.max_delay
        } else {
            // .mul_f64() cannot panic: the product is below `max_delay`.
            current.mul_f64(multiplier)
        }
    }
}
