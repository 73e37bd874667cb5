//! Library view handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::AppState;
use libris_common::{
    auth::AuthContext,
    db::{LibraryPage, LibraryView},
    errors::Result,
};

/// One of the named library views; unknown names are 404
pub async fn library(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(view): Path<String>,
) -> Result<Json<LibraryPage>> {
    let view: LibraryView = view.parse()?;
    Ok(Json(state.repo.library(auth.user_id, view).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn titles(page: &Value) -> Vec<String> {
        page["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_views_follow_status_and_rating() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;

        let mut ids = Vec::new();
        for (isbn, title) in [
            ("9780306406157", "A"),
            ("9781861972712", "B"),
            ("9780131103627", "C"),
        ] {
            let created = json(
                app.post("/book/add", &token, json!({"isbn": isbn, "title": title}))
                    .await,
            )
            .await;
            ids.push(created["data"]["id"].as_str().unwrap().to_string());
        }
        let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

        app.post(&format!("/book/{a}/status/update"), &token, json!({"status": "wish"}))
            .await;
        app.post(&format!("/book/{b}/status/update"), &token, json!({"status": "loaned"}))
            .await;
        app.post(&format!("/book/{b}/rate"), &token, json!({"rating": 4}))
            .await;
        app.post(&format!("/book/{c}/status/update"), &token, json!({"status": "sold"}))
            .await;

        let favourites = json(app.get("/library/favourites", &token).await).await;
        assert_eq!(titles(&favourites), ["B"]);
        assert_eq!(favourites["count"], 1);

        let wishlist = json(app.get("/library/wishlist", &token).await).await;
        assert_eq!(titles(&wishlist), ["A"]);

        let sold = json(app.get("/library/sold", &token).await).await;
        assert_eq!(titles(&sold), ["C"]);

        let all = json(app.get("/library/all", &token).await).await;
        assert_eq!(titles(&all), ["B"]);
    }

    #[tokio::test]
    async fn test_unknown_view_is_404() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;
        let response = app.get("/library/attic", &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_views_are_per_user() {
        let app = TestApp::new().await;
        let alice = app.token("alice").await;
        let bob = app.token("bob").await;
        app.post("/book/add", &alice, json!({"isbn": "9780306406157", "title": "Mine"}))
            .await;

        let page = json(app.get("/library/all", &bob).await).await;
        assert!(titles(&page).is_empty());
    }
}
