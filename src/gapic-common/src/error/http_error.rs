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

use super::rpc::{Code, Status};
use bytes::Bytes;
use std::collections::HashMap;

/// An error describing a non-2xx HTTP response from a REST transport.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HttpError {
    status_code: u16,
    payload: Option<Bytes>,
    headers: HashMap<String, String>,
}

impl HttpError {
    /// Creates a new [HttpError] with the given status code, headers, and payload.
    pub fn new(status_code: u16, headers: HashMap<String, String>, payload: Option<Bytes>) -> Self {
        Self {
            status_code,
            headers,
            payload,
        }
    }

    /// Returns the HTTP status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Returns the payload, if any.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The RPC status code equivalent to this response.
    ///
    /// Google Cloud REST services include the canonical status name in the
    /// payload. Proxies and load balancers may not, in that case the HTTP
    /// status code is mapped using [Code::from_http_status].
    pub fn code(&self) -> Code {
        self.payload
            .as_ref()
            .and_then(super::rpc::named_code)
            .unwrap_or_else(|| Code::from_http_status(self.status_code))
    }

    /// The [Status] in the payload, if the payload contains one.
    pub fn status(&self) -> Option<Status> {
        self.payload.as_ref().and_then(|p| Status::try_from(p).ok())
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HTTP error: code={}, headers={:?}",
            self.status_code, self.headers
        )?;
        if let Some(payload) = self.payload() {
            if let Some(status) = self.status() {
                return write!(f, ", payload:\n{status:?}");
            }
            write!(f, ", payload:\n{payload:?}")?;
        };
        Ok(())
    }
}

impl std::error::Error for HttpError {}
