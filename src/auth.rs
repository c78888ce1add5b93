use axum_extra::extract::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::ApiError;

/// Bearer header, falling back to a `?token=` query parameter for clients
/// such as calendar apps that cannot set headers.
pub fn verify_token(
    expected: &str,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    query_token: Option<&str>,
) -> Result<(), ApiError> {
    let provided = auth
        .as_ref()
        .map(|TypedHeader(header)| header.token())
        .or(query_token)
        .filter(|token| !token.is_empty());
    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "Invalid authentication token".into(),
        )),
    }
}
