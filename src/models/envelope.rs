use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MALFORMED_RESPONSE_MESSAGE;

/// Error payload carried by a failed envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApiError {
    /// Builds an error from the HTTP status alone, for responses that carry no error body.
    ///
    /// A success status cannot describe a failure, so a backend that answers
    /// 2xx with `ok: false` and no error gets the generic invalid-response error.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            return ApiError {
                code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                message: MALFORMED_RESPONSE_MESSAGE.to_string(),
                description: Some(format!("backend reported failure with status {}", status)),
            };
        }
        ApiError {
            code: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
            description: None,
        }
    }
}

/// The uniform `{ok, data, error}` shape returned by every client operation.
///
/// `ok == true` never carries an error, and `ok == false` never carries data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub ok: bool,
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(rename = "requestID", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    pub fn success(data: Option<Value>) -> Self {
        Envelope {
            ok: true,
            data,
            error: None,
            timestamp: None,
            request_id: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Envelope {
            ok: false,
            data: None,
            error: Some(error),
            timestamp: None,
            request_id: None,
        }
    }

    /// Envelope for a response whose body carries nothing worth parsing.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Envelope::success(None)
        } else {
            Envelope::failure(ApiError::from_status(status))
        }
    }

    /// Normalizes a raw HTTP response into an envelope.
    ///
    /// 204 skips the body entirely. An empty body falls back to the status. A
    /// missing or non-boolean `ok` field is filled from the transport success
    /// flag. Only a non-empty body that is not JSON is an error.
    pub fn from_response(status: StatusCode, body: &str) -> Result<Self, serde_json::Error> {
        if status == StatusCode::NO_CONTENT {
            return Ok(Envelope {
                ok: status.is_success(),
                ..Envelope::success(None)
            });
        }
        if body.trim().is_empty() {
            return Ok(Envelope::from_status(status));
        }

        let value: Value = serde_json::from_str(body)?;
        match value {
            Value::Object(map) => Ok(Self::from_object(status, map)),
            // Bare JSON (array, string...) is treated as the payload itself.
            other if status.is_success() => Ok(Envelope::success(Some(other))),
            _ => Ok(Envelope::from_status(status)),
        }
    }

    fn from_object(status: StatusCode, mut map: Map<String, Value>) -> Self {
        let ok = map
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| status.is_success());
        let data = map.remove("data").filter(|v| !v.is_null());
        let error = map
            .remove("error")
            .and_then(|v| serde_json::from_value::<ApiError>(v).ok());
        let timestamp = map.remove("timestamp").filter(|v| !v.is_null());
        let request_id = map
            .remove("requestID")
            .and_then(|v| v.as_str().map(str::to_string));

        let (data, error) = if ok {
            (data, None)
        } else {
            (None, Some(error.unwrap_or_else(|| ApiError::from_status(status))))
        };

        Envelope {
            ok,
            data,
            error,
            timestamp,
            request_id,
        }
    }

    /// The error code, when this is a failure envelope.
    pub fn error_code(&self) -> Option<u16> {
        self.error.as_ref().map(|e| e.code)
    }
}
