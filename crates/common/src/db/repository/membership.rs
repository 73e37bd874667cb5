//! Collection and section membership editing
//!
//! A selection replaces the membership: selected books point at the group,
//! current members left out are detached. Both steps share a transaction.

use super::*;
use crate::forms::MembershipForm;
use crate::metrics::record_write;
use sea_orm::sea_query::Expr;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub group_id: Uuid,
    /// Books currently in the group
    pub members: Vec<Uuid>,
    /// Every book of the owner, ordered by title
    pub candidates: Vec<BookChoice>,
}

/// Selected books that `owner` actually owns
async fn owned_selection<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    selection: &BTreeSet<Uuid>,
) -> Result<Vec<Book>> {
    if selection.is_empty() {
        return Ok(Vec::new());
    }

    let books = BookEntity::find()
        .filter(BookColumn::UserId.eq(owner))
        .filter(BookColumn::Id.is_in(selection.iter().copied()))
        .all(conn)
        .await?;

    if books.len() != selection.len() {
        let found: BTreeSet<Uuid> = books.iter().map(|b| b.id).collect();
        let mut errors = crate::errors::FormErrors::new();
        for missing in selection.difference(&found) {
            errors.add(
                "books",
                format!("Select a valid choice. {missing} is not one of the available choices."),
            );
        }
        return Err(AppError::Validation(errors));
    }

    Ok(books)
}

/// Point `column` of the selected books at `group_id`, detaching the rest
async fn replace_members<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    column: BookColumn,
    group_id: Uuid,
    selection: &BTreeSet<Uuid>,
) -> Result<()> {
    let mut detach = BookEntity::update_many()
        .col_expr(column, Expr::value(Option::<Uuid>::None))
        .filter(BookColumn::UserId.eq(owner))
        .filter(column.eq(group_id));
    if !selection.is_empty() {
        detach = detach.filter(BookColumn::Id.is_not_in(selection.iter().copied()));
    }
    detach.exec(conn).await?;

    if !selection.is_empty() {
        BookEntity::update_many()
            .col_expr(column, Expr::value(Some(group_id)))
            .col_expr(BookColumn::UpdatedAt, Expr::value(now()))
            .filter(BookColumn::UserId.eq(owner))
            .filter(BookColumn::Id.is_in(selection.iter().copied()))
            .exec(conn)
            .await
            .map_err(|e| unique_violation(e, "book", "books"))?;
    }

    Ok(())
}

impl Repository {
    // ========================================================================
    // Membership Operations
    // ========================================================================

    async fn membership(&self, owner: Uuid, column: BookColumn, group_id: Uuid) -> Result<Membership> {
        let books = BookEntity::find()
            .filter(BookColumn::UserId.eq(owner))
            .order_by_asc(BookColumn::Title)
            .all(self.read_conn())
            .await?;

        let members = books
            .iter()
            .filter(|b| match column {
                BookColumn::CollectionId => b.collection_id == Some(group_id),
                _ => b.section_id == Some(group_id),
            })
            .map(|b| b.id)
            .collect();
        let candidates = books
            .into_iter()
            .map(|b| BookChoice {
                id: b.id,
                title: b.title,
            })
            .collect();

        Ok(Membership {
            group_id,
            members,
            candidates,
        })
    }

    pub async fn collection_books(&self, owner: Uuid, id: Uuid) -> Result<Membership> {
        find_owned::<CollectionEntity, _>(
            self.read_conn(),
            "collection",
            CollectionColumn::Id,
            CollectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        self.membership(owner, BookColumn::CollectionId, id).await
    }

    pub async fn section_books(&self, owner: Uuid, id: Uuid) -> Result<Membership> {
        find_owned::<SectionEntity, _>(
            self.read_conn(),
            "section",
            SectionColumn::Id,
            SectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        self.membership(owner, BookColumn::SectionId, id).await
    }

    /// Replace the books of a collection.
    ///
    /// Two selected books sharing a volume number cannot both belong to the
    /// collection.
    pub async fn set_collection_books(
        &self,
        owner: Uuid,
        id: Uuid,
        form: MembershipForm,
    ) -> Result<Membership> {
        let selection: BTreeSet<Uuid> = form.books.into_iter().collect();

        let txn = self.write_conn().begin().await?;
        find_owned::<CollectionEntity, _>(
            &txn,
            "collection",
            CollectionColumn::Id,
            CollectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = owned_selection(&txn, owner, &selection).await?;

        let mut volumes: HashMap<i32, &str> = HashMap::new();
        for book in &books {
            if let Some(volume) = book.volume_number {
                if let Some(other) = volumes.insert(volume, &book.title) {
                    return Err(AppError::field(
                        "books",
                        format!(
                            "\"{}\" and \"{}\" both have volume number {}.",
                            other, book.title, volume
                        ),
                    ));
                }
            }
        }

        replace_members(&txn, owner, BookColumn::CollectionId, id, &selection).await?;
        txn.commit().await?;

        record_write("collection", "update");
        info!(collection_id = %id, user_id = %owner, books = selection.len(), "Collection books updated");
        self.membership(owner, BookColumn::CollectionId, id).await
    }

    pub async fn set_section_books(
        &self,
        owner: Uuid,
        id: Uuid,
        form: MembershipForm,
    ) -> Result<Membership> {
        let selection: BTreeSet<Uuid> = form.books.into_iter().collect();

        let txn = self.write_conn().begin().await?;
        find_owned::<SectionEntity, _>(
            &txn,
            "section",
            SectionColumn::Id,
            SectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        owned_selection(&txn, owner, &selection).await?;
        replace_members(&txn, owner, BookColumn::SectionId, id, &selection).await?;
        txn.commit().await?;

        record_write("section", "update");
        info!(section_id = %id, user_id = %owner, books = selection.len(), "Section books updated");
        self.membership(owner, BookColumn::SectionId, id).await
    }
}
