use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Validates the bearer token and stores the [`User`] in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use assert_matches::assert_matches;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_matches!(bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_matches!(bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn middleware_admits_only_valid_tokens() {
        use axum::{middleware, routing::get, Extension, Router, http::StatusCode};
        use tower::ServiceExt;

        use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};

        let config = TestConfig::default().to_arc();
        let app = Router::new()
            .route("/", get(|Extension(user): Extension<User>| async move { user.id }))
            .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

        let anonymous = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let user = TestUser::patient("patient@example.com");
        let forged = JwtTestUtils::create_invalid_signature_token(&user);
        let request = Request::builder()
            .uri("/")
            .header(AUTHORIZATION, format!("Bearer {}", forged))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, None);
        let request = Request::builder()
            .uri("/")
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::OK);
    }
}
