//! Publisher, genre, collection and section handlers
//!
//! The four groups share one handler shape; only the form, the record and
//! the detail payload differ.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{notice, rejected, FormJson, Notice};
use crate::AppState;
use libris_common::{
    auth::AuthContext,
    db::{
        models::{Collection, Genre, Publisher, Section},
        CollectionDetail, GroupDetail, Membership,
    },
    errors::Result,
    forms::{DescribedForm, MembershipForm, NameForm},
};

macro_rules! group_handlers {
    (
        label: $label:literal,
        record: $record:ty,
        detail: $detail:ty,
        form: $form:ty,
        handlers: [$list:ident, $get:ident, $new:ident, $create:ident, $edit:ident, $update:ident, $delete:ident],
        repo: [$repo_list:ident, $repo_get:ident, $repo_create:ident, $repo_update:ident, $repo_delete:ident] $(,)?
    ) => {
        pub async fn $list(
            State(state): State<AppState>,
            auth: AuthContext,
        ) -> Result<Json<Vec<$record>>> {
            Ok(Json(state.repo.$repo_list(auth.user_id).await?))
        }

        pub async fn $get(
            State(state): State<AppState>,
            auth: AuthContext,
            Path(id): Path<Uuid>,
        ) -> Result<Json<$detail>> {
            Ok(Json(state.repo.$repo_get(auth.user_id, id).await?))
        }

        pub async fn $new(_auth: AuthContext) -> Json<$form> {
            Json(<$form>::default())
        }

        pub async fn $create(
            State(state): State<AppState>,
            auth: AuthContext,
            FormJson(form): FormJson<$form>,
        ) -> Result<(StatusCode, Json<Notice<$record>>)> {
            let record = state
                .repo
                .$repo_create(auth.user_id, form)
                .await
                .inspect_err(|e| rejected($label, e))?;
            Ok((
                StatusCode::CREATED,
                notice(concat!("The ", $label, " was added successfully."), record),
            ))
        }

        pub async fn $edit(
            State(state): State<AppState>,
            auth: AuthContext,
            Path(id): Path<Uuid>,
        ) -> Result<Json<$record>> {
            let detail = state.repo.$repo_get(auth.user_id, id).await?;
            Ok(Json(detail.record))
        }

        pub async fn $update(
            State(state): State<AppState>,
            auth: AuthContext,
            Path(id): Path<Uuid>,
            FormJson(form): FormJson<$form>,
        ) -> Result<Json<Notice<$record>>> {
            let record = state
                .repo
                .$repo_update(auth.user_id, id, form)
                .await
                .inspect_err(|e| rejected($label, e))?;
            Ok(notice(concat!("The ", $label, " was updated successfully."), record))
        }

        pub async fn $delete(
            State(state): State<AppState>,
            auth: AuthContext,
            Path(id): Path<Uuid>,
        ) -> Result<Json<Notice<Uuid>>> {
            state.repo.$repo_delete(auth.user_id, id).await?;
            Ok(notice(concat!("The ", $label, " was deleted successfully."), id))
        }
    };
}

group_handlers! {
    label: "publisher",
    record: Publisher,
    detail: GroupDetail<Publisher>,
    form: DescribedForm,
    handlers: [list_publishers, get_publisher, new_publisher, create_publisher, edit_publisher, update_publisher, delete_publisher],
    repo: [list_publishers, get_publisher, create_publisher, update_publisher, delete_publisher],
}

group_handlers! {
    label: "genre",
    record: Genre,
    detail: GroupDetail<Genre>,
    form: NameForm,
    handlers: [list_genres, get_genre, new_genre, create_genre, edit_genre, update_genre, delete_genre],
    repo: [list_genres, get_genre, create_genre, update_genre, delete_genre],
}

group_handlers! {
    label: "collection",
    record: Collection,
    detail: CollectionDetail,
    form: DescribedForm,
    handlers: [list_collections, get_collection, new_collection, create_collection, edit_collection, update_collection, delete_collection],
    repo: [list_collections, get_collection, create_collection, update_collection, delete_collection],
}

group_handlers! {
    label: "section",
    record: Section,
    detail: GroupDetail<Section>,
    form: NameForm,
    handlers: [list_sections, get_section, new_section, create_section, edit_section, update_section, delete_section],
    repo: [list_sections, get_section, create_section, update_section, delete_section],
}

// ============================================================================
// Membership
// ============================================================================

pub async fn collection_books(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Membership>> {
    Ok(Json(state.repo.collection_books(auth.user_id, id).await?))
}

pub async fn set_collection_books(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<MembershipForm>,
) -> Result<Json<Notice<Membership>>> {
    let membership = state
        .repo
        .set_collection_books(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("collection_books", e))?;
    Ok(notice("The collection books were updated successfully.", membership))
}

pub async fn section_books(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Membership>> {
    Ok(Json(state.repo.section_books(auth.user_id, id).await?))
}

pub async fn set_section_books(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    FormJson(form): FormJson<MembershipForm>,
) -> Result<Json<Notice<Membership>>> {
    let membership = state
        .repo
        .set_section_books(auth.user_id, id, form)
        .await
        .inspect_err(|e| rejected("section_books", e))?;
    Ok(notice("The section books were updated successfully.", membership))
}
