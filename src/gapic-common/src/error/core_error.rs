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

use super::HttpError;
use super::rpc::{Code, Status};
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by wrapped RPCs.
///
/// Errors come from several sources: the service may return a status, a REST
/// transport may return a non-2xx response, the call may run past its
/// deadline, or the transport may fail to send the request at all.
///
/// Only the first two carry a status [Code], and only those are candidates for
/// a retry. See [RetryPolicy][crate::retry_policy::RetryPolicy].
///
/// # Example
/// ```
/// use google_cloud_gapic_common::error::Error;
/// match example_function() {
///     Err(e) if matches!(e.status(), Some(_)) => {
///         println!("service error {e}, debug using {:?}", e.status().unwrap());
///     },
///     Err(e) if e.is_timeout() => { println!("not enough time {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     # use google_cloud_gapic_common::error::rpc::{Code, Status};
///     # Err(Error::service(Status::default().set_code(Code::NotFound).set_message("NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
    root_cause: Option<Box<Error>>,
}

impl Error {
    /// Creates an error with the status returned by the service.
    ///
    /// # Example
    /// ```
    /// use google_cloud_gapic_common::error::Error;
    /// use google_cloud_gapic_common::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// assert_eq!(error.code(), Some(Code::NotFound));
    /// ```
    pub fn service(status: Status) -> Self {
        Self::new(ErrorKind::Service(Box::new(status)), None)
    }

    /// Creates an error from a non-2xx HTTP response.
    pub fn http(error: HttpError) -> Self {
        Self::new(ErrorKind::Http(Box::new(error)), None)
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use google_cloud_gapic_common::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Timeout, Some(source.into()))
    }

    /// Creates an error representing a transport failure without a response.
    ///
    /// Examples include refused connections, or a connection dropped before
    /// the response is received.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Io, Some(source.into()))
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Deserialization, Some(source.into()))
    }

    /// Creates an error for anything else, e.g. application errors returned
    /// from a stub method.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Other, Some(source.into()))
    }

    fn new(kind: ErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            root_cause: None,
        }
    }

    /// Attaches the error that caused this one.
    pub(crate) fn with_root_cause(mut self, root_cause: Error) -> Self {
        self.root_cause = Some(Box::new(root_cause));
        self
    }

    /// The request could not be completed before its deadline.
    ///
    /// Note that the request may or may not have reached the service.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause is a timeout based on the latency observed when
    /// the service is not under load. If the call was retried,
    /// [root_cause][Error::root_cause] holds the last retried error and is the
    /// best starting point.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// The transport failed without receiving a response.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// The [Status] returned by the service, if any.
    ///
    /// # Example
    /// ```
    /// use google_cloud_gapic_common::error::{Error, rpc::{Code, Status}};
    /// let error = Error::service(Status::default().set_code(Code::NotFound));
    /// if let Some(status) = error.status() {
    ///     if status.code == Code::NotFound {
    ///         println!("cannot find the thing: {}", status.message);
    ///     }
    /// }
    /// ```
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// The HTTP response, if this error was created from one.
    pub fn http_error(&self) -> Option<&HttpError> {
        match &self.kind {
            ErrorKind::Http(h) => Some(h.as_ref()),
            _ => None,
        }
    }

    /// The HTTP status code, if any.
    pub fn http_status_code(&self) -> Option<u16> {
        self.http_error().map(HttpError::status_code)
    }

    /// The RPC status code.
    ///
    /// Only errors in the transport status family, that is, errors created
    /// by [Error::service] or [Error::http], have a code. All other errors
    /// return `None`.
    ///
    /// # Example
    /// ```
    /// use google_cloud_gapic_common::error::{Error, HttpError, rpc::Code};
    /// let error = Error::http(HttpError::new(503, Default::default(), None));
    /// assert_eq!(error.code(), Some(Code::Unavailable));
    /// assert_eq!(Error::io("connection reset").code(), None);
    /// ```
    pub fn code(&self) -> Option<Code> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.code),
            ErrorKind::Http(h) => Some(h.code()),
            _ => None,
        }
    }

    /// The last error retried before this error was returned, if any.
    pub fn root_cause(&self) -> Option<&Error> {
        self.root_cause.as_deref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Service(s), _) => write!(
                f,
                "the service reports an error with code {} described as: {}",
                s.code, s.message
            ),
            (ErrorKind::Http(h), _) => match h.status() {
                Some(s) => write!(
                    f,
                    "the HTTP transport reports a [{}] error with code {} described as: {}",
                    h.status_code(),
                    s.code,
                    s.message
                ),
                None => write!(
                    f,
                    "the HTTP transport reports a [{}] error",
                    h.status_code()
                ),
            },
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Io, Some(e)) => write!(f, "the transport reports an error: {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let ErrorKind::Http(h) = &self.kind {
            return Some(h.as_ref() as &(dyn std::error::Error));
        }
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Service(Box<Status>),
    Http(Box<HttpError>),
    Timeout,
    Io,
    Deserialization,
    Other,
}
