use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, PublicUser, RefreshRequest, RegisterRequest, RegisterResponse,
            TokenPairResponse,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password,
        repo::User,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let creds = payload.validate()?;

    // No existence pre-check: the unique index on email is authoritative and
    // a conflicting insert comes back as UserExists.
    let user = User::create(&state.db, &creds.email, &creds.password).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created",
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let creds = payload.validate()?;

    // Unknown email and wrong password take the same exit so the response
    // never reveals which one it was.
    let Some((user, stored_hash)) = User::find_by_email(&state.db, &creds.email).await? else {
        warn!(email = %creds.email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !password::verify_password(&creds.password, &stored_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.issue_pair(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(TokenPairResponse {
        refresh: pair.refresh,
        access: pair.access,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let token = payload.validate()?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&token).map_err(|_| {
        warn!("refresh with invalid token");
        ApiError::InvalidCredentials
    })?;

    // Tokens are self-contained, so the new pair is minted straight from the
    // verified claims without a store read.
    let user = User {
        id: claims.user_id,
        email: claims.email,
    };
    let pair = keys.issue_pair(&user)?;

    info!(user_id = %user.id, "token pair refreshed");
    Ok(Json(TokenPairResponse {
        refresh: pair.refresh,
        access: pair.access,
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::state::AppState;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    // These tests exercise only paths that fail before any store query, so
    // the fake state's lazy pool is never driven to connect.

    #[tokio::test]
    async fn register_with_malformed_email_is_400_without_store_call() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(post_json(
                "/register",
                serde_json::json!({ "email": "not-an-email", "password": "secret1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["email"][0], "Enter a valid email address.");
    }

    #[tokio::test]
    async fn login_with_missing_fields_lists_each_field() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(post_json("/login", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["email"][0], "This field is required.");
        assert_eq!(json["password"][0], "This field is required.");
    }

    #[tokio::test]
    async fn refresh_with_garbage_token_is_401() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(post_json(
                "/refresh",
                serde_json::json!({ "refresh": "not-a-real-token" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn refresh_round_trips_a_pair_issued_from_claims() {
        use crate::auth::jwt::JwtKeys;
        use crate::auth::repo::User;
        use axum::extract::FromRef;

        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "a@x.com".into(),
        };
        let pair = keys.issue_pair(&user).expect("issue pair");

        let app = build_app(state);
        let response = app
            .oneshot(post_json(
                "/refresh",
                serde_json::json!({ "refresh": pair.refresh }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let access = json["access"].as_str().unwrap();
        let refresh = json["refresh"].as_str().unwrap();
        assert!(!access.is_empty());
        assert!(!refresh.is_empty());
        assert_ne!(access, refresh);

        let claims = keys.verify(access).expect("new access token verifies");
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, "a@x.com");
    }

    #[tokio::test]
    async fn refresh_rejects_an_access_token() {
        use crate::auth::jwt::JwtKeys;
        use axum::extract::FromRef;

        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys
            .sign_access(uuid::Uuid::new_v4(), "a@x.com")
            .expect("sign access");

        let app = build_app(state);
        let response = app
            .oneshot(post_json("/refresh", serde_json::json!({ "refresh": token })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_without_bearer_token_is_401() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
