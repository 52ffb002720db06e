use super::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

/// `Json` body extractor whose rejections render as `{"detail": ...}` like
/// every other API error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::custom(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        query: String,
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_field_is_unprocessable() {
        let err = ApiJson::<Payload>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();

        assert_eq!(err.status_code, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("query"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let err = ApiJson::<Payload>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();

        assert_eq!(err.status_code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_body_is_extracted() {
        let ApiJson(payload) =
            ApiJson::<Payload>::from_request(json_request(r#"{"query":"hi"}"#), &())
                .await
                .unwrap();

        assert_eq!(payload.query, "hi");
    }
}
