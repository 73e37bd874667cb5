//! Book handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::{notice, read_upload, rejected, FormJson, Notice};
use crate::AppState;
use libris_common::{
    auth::AuthContext,
    db::{
        models::{Book, Price, Rating, Status},
        BookDetail, BookOptions, LibraryEntry,
    },
    errors::Result,
    forms::{BookForm, PriceForm, RatingForm, StatusForm},
};

/// Form payload for editing: current values plus the available choices
#[derive(Serialize)]
pub struct BookEditor {
    pub book: Book,
    pub options: BookOptions,
}

/// Every book of the user with their rating and status
pub async fn list_books(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<LibraryEntry>>> {
    Ok(Json(state.repo.list_books(auth.user_id).await?))
}

pub async fn get_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<BookDetail>> {
    Ok(Json(state.repo.get_book(auth.user_id, id).await?))
}

/// Choices for a new book
pub async fn new_book(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<BookOptions>> {
    Ok(Json(state.repo.book_options(auth.user_id).await?))
}

pub async fn create_book(
    State(state): State<AppState>,
    auth: AuthContext,
    FormJson(form): FormJson<BookForm>,
) -> Result<(StatusCode, Json<Notice<Book>>)> {
    let book = state
        .repo
        .create_book(auth.user_id, form)
        .await
        .inspect_err(|e| rejected("book", e))?;

    tracing::info!(
        book_id = %book.id,
        isbn = %book.isbn,
        request_id = %auth.request_id,
        "Book added"
    );

    Ok((
        StatusCode::CREATED,
        notice("The book was added successfully.", book),
    ))
}

pub async fn edit_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<BookEditor>> {
    let detail = state.repo.get_book(auth.user_id, id).await?;
    let options = state.repo.book_options(auth.user_id).await?;
    Ok(Json(BookEditor {
        book: detail.book,
        options,
    }))
}

pub async fn update_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<BookForm>,
) -> Result<Json<Notice<Book>>> {
    let book = state
        .repo
        .update_book(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("book", e))?;
    Ok(notice("The book was updated successfully.", book))
}

pub async fn delete_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Notice<Uuid>>> {
    state.repo.delete_book(auth.user_id, id).await?;
    Ok(notice("The book was deleted successfully.", id))
}

/// Replace the cover from the multipart part `cover`
pub async fn update_cover(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Notice<Book>>> {
    let upload = read_upload(&mut multipart, "cover").await?;
    let book = state
        .repo
        .update_cover(auth.user_id, id, upload)
        .await
        .inspect_err(|e| rejected("cover", e))?;
    Ok(notice("The cover was updated successfully.", book))
}

pub async fn rate_book(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<RatingForm>,
) -> Result<Json<Notice<Rating>>> {
    let rating = state
        .repo
        .rate_book(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("rating", e))?;
    Ok(notice("The rating was updated successfully.", rating))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<StatusForm>,
) -> Result<Json<Notice<Status>>> {
    let status = state
        .repo
        .set_status(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("status", e))?;
    Ok(notice("The status was updated successfully.", status))
}

pub async fn update_price(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<PriceForm>,
) -> Result<Json<Notice<Price>>> {
    let price = state
        .repo
        .set_price(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("price", e))?;
    Ok(notice("The price was updated successfully.", price))
}
