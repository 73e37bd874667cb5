//! Registration and profile handlers

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::{notice, read_upload, rejected, FormJson, Notice};
use crate::AppState;
use libris_common::{
    auth::AuthContext,
    db::ProfileView,
    errors::Result,
    forms::{ProfileForm, RegisterForm},
};

/// A new account together with a token for it
#[derive(Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub account: ProfileView,
    pub token: String,
}

/// Create a user and its profile
pub async fn register(
    State(state): State<AppState>,
    FormJson(form): FormJson<RegisterForm>,
) -> Result<(StatusCode, Json<Notice<RegisterResponse>>)> {
    let account = state
        .repo
        .register_user(form)
        .await
        .inspect_err(|e| rejected("register", e))?;
    let token = state
        .jwt
        .generate_token(account.user.id, &account.user.username)?;

    Ok((
        StatusCode::CREATED,
        notice(
            "Your account was created successfully.",
            RegisterResponse { account, token },
        ),
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ProfileView>> {
    Ok(Json(state.repo.get_profile(auth.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    FormJson(form): FormJson<ProfileForm>,
) -> Result<Json<Notice<ProfileView>>> {
    let view = state
        .repo
        .update_profile(auth.user_id, form)
        .await
        .inspect_err(|e| rejected("profile", e))?;
    Ok(notice("Your profile has been updated successfully.", view))
}

/// Replace the avatar from the multipart part `avatar`
pub async fn update_avatar(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<Notice<ProfileView>>> {
    let upload = read_upload(&mut multipart, "avatar").await?;
    let view = state
        .repo
        .update_avatar(auth.user_id, upload)
        .await
        .inspect_err(|e| rejected("avatar", e))?;
    Ok(notice("Your avatar has been updated successfully.", view))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_register_returns_usable_token() {
        let app = TestApp::new().await;
        let response = app
            .send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/accounts/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"username": "ursula", "email": "ursula@example.com"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json(response).await;
        let token = body["data"]["token"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["user"]["username"], "ursula");

        let profile = app.get("/profile", &token).await;
        assert_eq!(profile.status(), StatusCode::OK);
        assert_eq!(json(profile).await["user"]["email"], "ursula@example.com");
    }

    #[tokio::test]
    async fn test_profile_requires_token() {
        let app = TestApp::new().await;
        let response = app
            .send(Request::get("/profile").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.get("/profile", "not-a-token").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_bad_email() {
        let app = TestApp::new().await;
        let token = app.token("ursula").await;

        let response = app
            .post("/profile/update", &token, json!({"email": "nope"}))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"]["details"]["fields"]["email"].is_array());
    }

    #[tokio::test]
    async fn test_avatar_upload_is_resized() {
        let app = TestApp::new().await;
        let token = app.token("ursula").await;

        let response = app
            .upload("/profile/avatar", &token, "avatar", "me.jpg", &jpeg(800, 600))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let avatar = body["data"]["profile"]["avatar"].as_str().unwrap();
        assert!(avatar.ends_with(".png"));
        let img = image::open(app.state.repo.images().absolute(avatar)).unwrap();
        assert_eq!((img.width(), img.height()), (200, 150));
    }

    #[tokio::test]
    async fn test_oversized_avatar_is_rejected() {
        let app = TestApp::new().await;
        let token = app.token("ursula").await;
        let before = json(app.get("/profile", &token).await).await;

        let bytes = vec![0u8; 5 * 1024 * 1024];
        let response = app
            .upload("/profile/avatar", &token, "avatar", "big.jpg", &bytes)
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"]["details"]["fields"]["avatar"].is_array());

        let after = json(app.get("/profile", &token).await).await;
        assert_eq!(before["profile"]["avatar"], after["profile"]["avatar"]);
    }
}
