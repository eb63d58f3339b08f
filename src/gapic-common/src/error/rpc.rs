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

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// The status returned by a failed RPC.
///
/// gRPC transports report a [Code] and a message. REST transports report the
/// same information wrapped in a JSON `{"error": {...}}` object, see
/// [Status::try_from] for that format.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Status {
    /// The status code.
    pub code: Code,

    /// A developer-facing error message.
    pub message: String,
}

impl Status {
    /// Sets the value for [code][Status::code].
    pub fn set_code<T: Into<Code>>(mut self, v: T) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the value for [message][Status::message].
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }
}

/// The canonical RPC status codes.
///
/// The numeric values and the names are an external contract: retry policies
/// may name retryable codes either way, and both forms must resolve to the
/// same value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Code {
    /// Not an error; returned on success.
    Ok = 0,

    /// The operation was cancelled, typically by the caller.
    Cancelled = 1,

    /// Unknown error, including errors from unknown error spaces.
    #[default]
    Unknown = 2,

    /// The client specified an invalid argument.
    InvalidArgument = 3,

    /// The deadline expired before the operation could complete.
    ///
    /// For operations that change the state of the system this may be returned
    /// even if the operation completed successfully.
    DeadlineExceeded = 4,

    /// Some requested entity was not found.
    NotFound = 5,

    /// The entity that a client attempted to create already exists.
    AlreadyExists = 6,

    /// The caller does not have permission to execute the operation.
    PermissionDenied = 7,

    /// Some resource has been exhausted, e.g. a per-user quota.
    ResourceExhausted = 8,

    /// The system is not in a state required for the operation's execution.
    FailedPrecondition = 9,

    /// The operation was aborted, typically due to a concurrency issue.
    Aborted = 10,

    /// The operation was attempted past the valid range.
    OutOfRange = 11,

    /// The operation is not implemented or not enabled in this service.
    Unimplemented = 12,

    /// Internal errors.
    Internal = 13,

    /// The service is currently unavailable.
    ///
    /// This is most likely a transient condition, which can be corrected by
    /// retrying with a backoff.
    Unavailable = 14,

    /// Unrecoverable data loss or corruption.
    DataLoss = 15,

    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    /// The canonical name, e.g. `"UNAVAILABLE"`.
    pub fn name(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Returns the code for `value`, or `None` if `value` is not in `0..=16`.
    ///
    /// Unlike `From<i32>`, this does not fold unknown values into
    /// [Code::Unknown].
    pub fn from_ordinal(value: i32) -> Option<Self> {
        let code = match value {
            0 => Code::Ok,
            1 => Code::Cancelled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code from a REST transport to a [Code].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gapic_common::error::rpc::Code;
    /// assert_eq!(Code::from_http_status(503), Code::Unavailable);
    /// assert_eq!(Code::from_http_status(204), Code::Ok);
    /// assert_eq!(Code::from_http_status(418), Code::Unknown);
    /// ```
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => Code::Ok,
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            409 => Code::Aborted,
            412 => Code::FailedPrecondition,
            416 => Code::OutOfRange,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            500 => Code::Internal,
            501 => Code::Unimplemented,
            503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            _ => Code::Unknown,
        }
    }
}

impl std::convert::From<i32> for Code {
    fn from(value: i32) -> Self {
        Self::from_ordinal(value).unwrap_or_default()
    }
}

impl std::convert::From<Code> for i32 {
    fn from(value: Code) -> i32 {
        value as i32
    }
}

impl std::convert::From<Code> for String {
    fn from(value: Code) -> String {
        value.name().to_string()
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::convert::TryFrom<&str> for Code {
    type Error = String;
    fn try_from(value: &str) -> std::result::Result<Code, Self::Error> {
        match value {
            "OK" => Ok(Code::Ok),
            "CANCELLED" => Ok(Code::Cancelled),
            "UNKNOWN" => Ok(Code::Unknown),
            "INVALID_ARGUMENT" => Ok(Code::InvalidArgument),
            "DEADLINE_EXCEEDED" => Ok(Code::DeadlineExceeded),
            "NOT_FOUND" => Ok(Code::NotFound),
            "ALREADY_EXISTS" => Ok(Code::AlreadyExists),
            "PERMISSION_DENIED" => Ok(Code::PermissionDenied),
            "RESOURCE_EXHAUSTED" => Ok(Code::ResourceExhausted),
            "FAILED_PRECONDITION" => Ok(Code::FailedPrecondition),
            "ABORTED" => Ok(Code::Aborted),
            "OUT_OF_RANGE" => Ok(Code::OutOfRange),
            "UNIMPLEMENTED" => Ok(Code::Unimplemented),
            "INTERNAL" => Ok(Code::Internal),
            "UNAVAILABLE" => Ok(Code::Unavailable),
            "DATA_LOSS" => Ok(Code::DataLoss),
            "UNAUTHENTICATED" => Ok(Code::Unauthenticated),
            _ => Err(format!("unknown status code value {value}")),
        }
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i32::deserialize(deserializer).map(Code::from)
    }
}

// REST transports wrap the status in an `error` field, and report the code
// as a name in `status`. The numeric `code` is the HTTP status.
#[derive(Clone, Debug, Deserialize)]
struct ErrorWrapper {
    error: WrapperStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct WrapperStatus {
    code: i32,
    message: String,
    status: Option<String>,
}

/// The code named by the `status` field of a REST error payload.
///
/// Returns `None` if the payload is not an error payload, or if it does not
/// name a valid status.
pub(crate) fn named_code(payload: &bytes::Bytes) -> Option<Code> {
    let wrapper = serde_json::from_slice::<ErrorWrapper>(payload).ok()?;
    wrapper
        .error
        .status
        .as_deref()
        .and_then(|name| Code::try_from(name).ok())
}

impl TryFrom<&bytes::Bytes> for Status {
    type Error = Error;

    fn try_from(value: &bytes::Bytes) -> Result<Self, Self::Error> {
        let wrapper = serde_json::from_slice::<ErrorWrapper>(value)
            .map(|w| w.error)
            .map_err(Error::deser)?;
        let code = match wrapper.status.as_deref().map(Code::try_from) {
            Some(Ok(code)) => code,
            Some(Err(_)) | None => u16::try_from(wrapper.code)
                .map(Code::from_http_status)
                .unwrap_or_default(),
        };
        Ok(Status {
            code,
            message: wrapper.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;
    type Result<T> = anyhow::Result<T>;

    const SAMPLE_PAYLOAD: &[u8] = b"{\n  \"error\": {\n    \"code\": 503,\n    \"message\": \"The service is currently unavailable.\",\n    \"status\": \"UNAVAILABLE\"\n  }\n}\n";
    const INVALID_STATUS_PAYLOAD: &[u8] =
        b"{\"error\": {\"code\": 404, \"message\": \"gone\", \"status\": \"NOT-A-STATUS\"}}";

    #[test]
    fn status_basic_setters() {
        let got = Status::default()
            .set_code(Code::Unavailable)
            .set_message("try-again");
        let want = Status {
            code: Code::Unavailable,
            message: "try-again".into(),
        };
        assert_eq!(got, want);

        let got = Status::default().set_code(14);
        assert_eq!(got.code, Code::Unavailable);
    }

    #[test]
    fn status_serde() -> Result<()> {
        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("missing");
        let got = serde_json::to_value(&status)?;
        assert_eq!(got, json!({"code": 5, "message": "missing"}));
        let roundtrip = serde_json::from_value::<Status>(got)?;
        assert_eq!(roundtrip, status);
        Ok(())
    }

    #[test]
    fn try_from_bytes() -> Result<()> {
        let got = Status::try_from(&bytes::Bytes::from_static(SAMPLE_PAYLOAD))?;
        let want = Status::default()
            .set_code(Code::Unavailable)
            .set_message("The service is currently unavailable.");
        assert_eq!(got, want);

        let got = Status::try_from(&bytes::Bytes::from_static(b"\"error\": 1234"));
        let err = got.unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");

        let got = Status::try_from(&bytes::Bytes::from_static(b"{\"missing-error\": 1234}"));
        let err = got.unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");

        // Without a valid status name the HTTP code is used.
        let got = Status::try_from(&bytes::Bytes::from_static(INVALID_STATUS_PAYLOAD))?;
        assert_eq!(got.code, Code::NotFound);
        Ok(())
    }

    #[test]
    fn code_to_string() {
        let got = String::from(Code::AlreadyExists);
        let want = "ALREADY_EXISTS";
        assert_eq!(got, want);
    }

    #[test_case("OK", 0)]
    #[test_case("CANCELLED", 1)]
    #[test_case("UNKNOWN", 2)]
    #[test_case("INVALID_ARGUMENT", 3)]
    #[test_case("DEADLINE_EXCEEDED", 4)]
    #[test_case("NOT_FOUND", 5)]
    #[test_case("ALREADY_EXISTS", 6)]
    #[test_case("PERMISSION_DENIED", 7)]
    #[test_case("RESOURCE_EXHAUSTED", 8)]
    #[test_case("FAILED_PRECONDITION", 9)]
    #[test_case("ABORTED", 10)]
    #[test_case("OUT_OF_RANGE", 11)]
    #[test_case("UNIMPLEMENTED", 12)]
    #[test_case("INTERNAL", 13)]
    #[test_case("UNAVAILABLE", 14)]
    #[test_case("DATA_LOSS", 15)]
    #[test_case("UNAUTHENTICATED", 16)]
    fn name_table(name: &str, ordinal: i32) -> Result<()> {
        let code = Code::try_from(name).map_err(anyhow::Error::msg)?;
        assert_eq!(code as i32, ordinal);
        assert_eq!(Code::from_ordinal(ordinal), Some(code));
        assert_eq!(Code::from(ordinal), code);
        assert_eq!(code.name(), name);
        assert_eq!(&format!("{code}"), name);
        Ok(())
    }

    #[test_case(-1)]
    #[test_case(17)]
    #[test_case(i32::MAX)]
    fn ordinal_out_of_range(input: i32) {
        assert_eq!(Code::from_ordinal(input), None);
        assert_eq!(Code::from(input), Code::Unknown);
    }

    #[test_case(200, Code::Ok)]
    #[test_case(299, Code::Ok)]
    #[test_case(400, Code::InvalidArgument)]
    #[test_case(401, Code::Unauthenticated)]
    #[test_case(403, Code::PermissionDenied)]
    #[test_case(404, Code::NotFound)]
    #[test_case(409, Code::Aborted)]
    #[test_case(412, Code::FailedPrecondition)]
    #[test_case(416, Code::OutOfRange)]
    #[test_case(429, Code::ResourceExhausted)]
    #[test_case(499, Code::Cancelled)]
    #[test_case(500, Code::Internal)]
    #[test_case(501, Code::Unimplemented)]
    #[test_case(503, Code::Unavailable)]
    #[test_case(504, Code::DeadlineExceeded)]
    #[test_case(302, Code::Unknown)]
    #[test_case(502, Code::Unknown)]
    fn http_mapping(status: u16, want: Code) {
        assert_eq!(Code::from_http_status(status), want);
    }

    #[test]
    fn code_try_from_string_error() {
        let err = Code::try_from("INVALID-NOT-A-CODE");
        assert!(
            matches!(&err, Err(s) if s.contains("INVALID-NOT-A-CODE")),
            "expected error in try_from, got {err:?}"
        );
    }

    #[test]
    fn code_serialize() -> Result<()> {
        let got = serde_json::to_value(Code::Unavailable)?;
        assert_eq!(got, json!(14));
        let got = serde_json::from_value::<Code>(json!(4))?;
        assert_eq!(got, Code::DeadlineExceeded);
        Ok(())
    }

    #[test]
    fn code_deserialize_unknown() -> Result<()> {
        let input = json!(-17);
        let code = serde_json::from_value::<Code>(input)?;
        assert_eq!(code, Code::Unknown);

        let err = serde_json::from_value::<Code>(json!({"k": "v"}));
        assert!(err.is_err(), "expected an error, got {err:?}");
        Ok(())
    }
}
