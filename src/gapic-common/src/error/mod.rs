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

//! The error types returned by wrapped RPCs.

mod core_error;
mod http_error;
pub use core_error::*;
pub use http_error::*;

/// Status codes and status payloads returned by services.
///
/// # Examples
///
/// ```
/// # use google_cloud_gapic_common::error;
/// use error::Error;
/// use error::rpc::Code;
/// fn handle_error(e: Error) {
///     if e.code() == Some(Code::Unavailable) {
///         println!("the service is unavailable, try again later")
///     }
/// }
/// ```
pub mod rpc;
