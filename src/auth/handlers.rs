use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, Credentials, PublicUser},
        extractors::{AuthUser, AUTH_COOKIE},
        services::{AuthError, AuthSession},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/api/user/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    let Json(creds) = payload.map_err(bad_json)?;
    let session = state
        .auth
        .register(&creds.login, &creds.password)
        .await
        .map_err(auth_error)?;
    issue(session)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    let Json(creds) = payload.map_err(bad_json)?;
    let session = state
        .auth
        .login(&creds.login, &creds.password)
        .await
        .map_err(auth_error)?;
    issue(session)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.auth.get_user(user_id).await.map_err(|e| match e {
        AuthError::UserNotFound => {
            warn!(user_id, "token subject no longer resolves");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        }
        other => auth_error(other),
    })?;
    Ok(Json(PublicUser::from(user)))
}

/// Hands the token out on every channel the client may use: the
/// `Authorization` header, an HttpOnly cookie and the JSON body.
fn issue(session: AuthSession) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    let AuthSession { user, token } = session;

    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
        error!(error = %e, "token is not a valid header value");
        internal()
    })?;
    let cookie = HeaderValue::from_str(&format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict"
    ))
    .map_err(|e| {
        error!(error = %e, "token is not a valid cookie value");
        internal()
    })?;
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(header::SET_COOKIE, cookie);

    Ok((
        headers,
        Json(AuthResponse {
            token,
            user: PublicUser::from(user),
        }),
    ))
}

fn bad_json(rejection: JsonRejection) -> (StatusCode, String) {
    warn!(error = %rejection, "malformed credentials body");
    (StatusCode::BAD_REQUEST, "Malformed request body".into())
}

fn auth_error(err: AuthError) -> (StatusCode, String) {
    match err {
        AuthError::EmptyCredentials => (
            StatusCode::BAD_REQUEST,
            "Login and password are required".into(),
        ),
        AuthError::AlreadyExists => (StatusCode::CONFLICT, "Login already taken".into()),
        AuthError::InvalidCredentials | AuthError::InvalidToken => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
        }
        AuthError::UserNotFound
        | AuthError::Store(_)
        | AuthError::Hashing(_)
        | AuthError::Signing(_) => internal(),
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
