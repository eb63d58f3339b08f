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

//! Common runtime for generated Google API clients.
//!
//! This crate contains the types and functions shared by generated clients:
//! the error types, the retry policy for RPCs, per-call options, the wrapper
//! that applies deadlines and retries to each transport method, and helpers
//! for long-running operations.
//!
//! Most applications use these types indirectly, via the generated clients.
//! Applications may want to change the [RetryPolicy][retry_policy::RetryPolicy]
//! or the timeout for some calls, see [CallOptions][options::CallOptions].

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by generated clients.
pub mod error;

pub mod operation;
pub mod options;
pub mod retry_policy;
pub mod rpc_call;
