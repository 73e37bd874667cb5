//! Author handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{notice, read_upload, rejected, FormJson, Notice};
use crate::AppState;
use libris_common::{
    auth::AuthContext,
    db::{models::Author, GroupDetail},
    errors::Result,
    forms::AuthorForm,
};

pub async fn list_authors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Author>>> {
    Ok(Json(state.repo.list_authors(auth.user_id).await?))
}

/// The author and the books written by them
pub async fn get_author(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GroupDetail<Author>>> {
    Ok(Json(state.repo.get_author(auth.user_id, id).await?))
}

/// Blank form
pub async fn new_author(_auth: AuthContext) -> Json<AuthorForm> {
    Json(AuthorForm::default())
}

pub async fn create_author(
    State(state): State<AppState>,
    auth: AuthContext,
    FormJson(form): FormJson<AuthorForm>,
) -> Result<(StatusCode, Json<Notice<Author>>)> {
    let author = state
        .repo
        .create_author(auth.user_id, form)
        .await
        .inspect_err(|e| rejected("author", e))?;

    tracing::info!(
        author_id = %author.id,
        request_id = %auth.request_id,
        "Author added"
    );

    Ok((
        StatusCode::CREATED,
        notice("The author was added successfully.", author),
    ))
}

/// Current values to edit
pub async fn edit_author(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Author>> {
    let detail = state.repo.get_author(auth.user_id, id).await?;
    Ok(Json(detail.record))
}

pub async fn update_author(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<AuthorForm>,
) -> Result<Json<Notice<Author>>> {
    let author = state
        .repo
        .update_author(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("author", e))?;
    Ok(notice("The author was updated successfully.", author))
}

pub async fn delete_author(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Notice<Uuid>>> {
    state.repo.delete_author(auth.user_id, id).await?;
    Ok(notice("The author was deleted successfully.", id))
}

/// Replace the headshot from the multipart part `headshot`
pub async fn update_headshot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Notice<Author>>> {
    let upload = read_upload(&mut multipart, "headshot").await?;
    let author = state
        .repo
        .update_headshot(auth.user_id, id, upload)
        .await
        .inspect_err(|e| rejected("headshot", e))?;
    Ok(notice("The headshot was updated successfully.", author))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_and_list_authors() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;

        let response = app
            .post("/author/add", &token, json!({"name": "Ursula K. Le Guin"}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json(response).await;
        assert_eq!(body["message"], "The author was added successfully.");
        // The normalized key stays internal
        assert!(body["data"].get("name_key").is_none());

        let list = json(app.get("/authors", &token).await).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_author_is_422() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;
        app.post("/author/add", &token, json!({"name": "Borges"})).await;

        let response = app
            .post("/author/add", &token, json!({"name": "  BORGES! "}))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert_eq!(
            body["error"]["details"]["fields"]["name"][0],
            "Author with this name already exists!"
        );
    }

    #[tokio::test]
    async fn test_death_before_birth_is_422() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;

        let response = app
            .post(
                "/author/add",
                &token,
                json!({"name": "Nobody", "date_of_birth": "1950-01-01", "date_of_death": "1900-01-01"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"]["details"]["fields"]["date_of_death"].is_array());
    }

    #[tokio::test]
    async fn test_other_users_author_is_404() {
        let app = TestApp::new().await;
        let alice = app.token("alice").await;
        let bob = app.token("bob").await;

        let created = json(app.post("/author/add", &alice, json!({"name": "Borges"})).await).await;
        let id = created["data"]["id"].as_str().unwrap();

        let response = app.get(&format!("/author/{id}"), &bob).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app
            .post(&format!("/author/delete/{id}"), &bob, json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_referenced_author_cannot_be_deleted() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;

        let author = json(app.post("/author/add", &token, json!({"name": "Borges"})).await).await;
        let id = author["data"]["id"].as_str().unwrap().to_string();
        let response = app
            .post(
                "/book/add",
                &token,
                json!({"isbn": "9780306406157", "title": "Ficciones", "author_id": id}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .post(&format!("/author/delete/{id}"), &token, json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json(response).await;
        assert_eq!(
            body["error"]["message"],
            "The author cannot be deleted because there are books associated with this author."
        );

        let detail = json(app.get(&format!("/author/{id}"), &token).await).await;
        assert_eq!(detail["books"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_headshot_rejects_wrong_extension() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;
        let author = json(app.post("/author/add", &token, json!({"name": "Borges"})).await).await;
        let id = author["data"]["id"].as_str().unwrap();

        let response = app
            .upload(
                &format!("/author/{id}/headshot"),
                &token,
                "headshot",
                "face.gif",
                &jpeg(10, 10),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"]["details"]["fields"]["headshot"].is_array());
    }
}
