// This file is part of the terraform-provider-ciphertrust project
//
// Copyright (C) The terraform-provider-ciphertrust authors, 2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Vendor error code returned when the targeted object does not exist
const NOT_FOUND_CODE: &str = "NCERRResourceNotFound";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("CipherTrust Manager returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request to CipherTrust Manager failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode CipherTrust Manager response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Classify a non-success response.
    ///
    /// CipherTrust Manager reports some missing objects with a 4xx status other
    /// than 404, so the vendor error code is checked as well.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| body.to_owned());

        if status == 404 || body.contains(NOT_FOUND_CODE) {
            ApiError::NotFound(message)
        } else if status == 401 {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Status { status, message }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default, rename = "codeDesc")]
    code_desc: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        match (self.code_desc, self.message) {
            (Some(desc), Some(message)) => Some(format!("{desc}: {message}")),
            (Some(desc), None) => Some(desc),
            (None, Some(message)) => Some(match self.code {
                Some(code) => format!("[{code}] {message}"),
                None => message,
            }),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::ApiError;

    #[rstest]
    #[case(404, "", true)]
    #[case(400, r#"{"code":5,"codeDesc":"NCERRResourceNotFound: Resource not found"}"#, true)]
    #[case(400, r#"{"code":7,"codeDesc":"NCERRInvalidParamValue","message":"bad"}"#, false)]
    #[case(500, "internal", false)]
    fn not_found_classification(#[case] status: u16, #[case] body: &str, #[case] expected: bool) {
        assert_eq!(ApiError::from_response(status, body).is_not_found(), expected);
    }

    #[test]
    fn unauthorized() {
        let err = ApiError::from_response(401, r#"{"message":"token expired"}"#);
        assert!(matches!(err, ApiError::Unauthorized(msg) if msg == "token expired"));
    }

    #[test]
    fn status_keeps_vendor_message() {
        let err = ApiError::from_response(
            409,
            r#"{"code":11,"codeDesc":"NCERRConflict","message":"key is updating"}"#,
        );
        assert_eq!(
            err.to_string(),
            "CipherTrust Manager returned status 409: NCERRConflict: key is updating"
        );
    }
}
