use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session expired, sign in again")]
    Unauthorized,

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Builds a status error, preferring the `detail` field of a JSON error body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get("detail").and_then(|d| d.as_str()).map(String::from));
        let message = detail.unwrap_or_else(|| {
            format!(
                "Error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
        });
        ApiError::Status { status, message }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_field_is_used_as_message() {
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, r#"{"detail":"Comentario vacio"}"#);
        assert_eq!(err.to_string(), "Comentario vacio");
    }

    #[test]
    fn non_json_body_falls_back_to_status_line() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(err.to_string(), "Error 404: Not Found");
    }

    #[test]
    fn unauthorized_is_its_own_variant() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
