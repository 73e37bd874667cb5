//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling and transaction support. Every query is scoped to the
//! owning user; a record owned by someone else is reported as not found.

mod accounts;
mod authors;
mod books;
mod groups;
mod library;
mod membership;

pub use accounts::ProfileView;
pub use books::{BookChoice, BookDetail, BookOptions, Choice};
pub use groups::{CollectionDetail, GroupDetail};
pub use library::{LibraryEntry, LibraryPage, LibraryView};
pub use membership::Membership;

use crate::config::MediaConfig;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::imaging::{ImageKind, ImageProcessor};
use crate::metrics::record_protected_delete;
use crate::validation::normalize_text;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
    images: ImageProcessor,
    media: Arc<MediaConfig>,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool, media: MediaConfig) -> Self {
        Self {
            pool,
            images: ImageProcessor::new(&media),
            media: Arc::new(media),
        }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    pub fn images(&self) -> &ImageProcessor {
        &self.images
    }

    pub fn media(&self) -> &MediaConfig {
        &self.media
    }

    /// Remove an image file replaced by a committed write
    fn release_image(&self, kind: ImageKind, superseded: Option<String>) {
        if let Some(old) = superseded {
            self.images.discard(kind, &old);
        }
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Shared Helpers
    // ========================================================================

    /// Delete a record that books may reference.
    ///
    /// The reference check and the delete run in one transaction. A foreign
    /// key violation raised by a concurrent insert is reported the same way
    /// as a reference found by the check.
    async fn delete_protected<E>(
        &self,
        label: &'static str,
        id_column: E::Column,
        user_column: E::Column,
        book_column: BookColumn,
        owner: Uuid,
        id: Uuid,
    ) -> Result<E::Model>
    where
        E: EntityTrait,
    {
        let message = format!(
            "The {label} cannot be deleted because there are books associated with this {label}."
        );

        let txn = self.write_conn().begin().await?;
        let record = find_owned::<E, _>(&txn, label, id_column, user_column, owner, id).await?;

        let in_use = BookEntity::find()
            .filter(book_column.eq(id))
            .count(&txn)
            .await?;
        if in_use > 0 {
            record_protected_delete(label);
            warn!(entity = label, id = %id, books = in_use, "Refusing to delete referenced record");
            return Err(AppError::Protected { message });
        }

        E::delete_many()
            .filter(id_column.eq(id))
            .filter(user_column.eq(owner))
            .exec(&txn)
            .await
            .map_err(|e| protected_violation(e, label, &message))?;

        txn.commit()
            .await
            .map_err(|e| protected_violation(e, label, &message))?;

        Ok(record)
    }
}

/// Current timestamp in the column representation
fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

/// Fetch a record owned by `owner`, or report it as not found
async fn find_owned<E, C>(
    conn: &C,
    label: &'static str,
    id_column: E::Column,
    user_column: E::Column,
    owner: Uuid,
    id: Uuid,
) -> Result<E::Model>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    E::find()
        .filter(id_column.eq(id))
        .filter(user_column.eq(owner))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(label, id))
}

/// Check that no other record of the owner normalizes to the same value.
///
/// Every stored value is normalized on the fly, so comparisons follow the
/// current normalization rules even for rows written under older ones.
#[allow(clippy::too_many_arguments)]
async fn ensure_unique<E, C>(
    conn: &C,
    label: &'static str,
    field: &'static str,
    value_column: E::Column,
    user_column: E::Column,
    id_column: E::Column,
    owner: Uuid,
    excluding: Option<Uuid>,
    value: &str,
) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let mut query = E::find()
        .select_only()
        .column(value_column)
        .filter(user_column.eq(owner));
    if let Some(id) = excluding {
        query = query.filter(id_column.ne(id));
    }

    let existing: Vec<String> = query.into_tuple().all(conn).await?;
    let key = normalize_text(value);

    if existing.iter().any(|v| normalize_text(v) == key) {
        return Err(duplicate(label, field));
    }
    Ok(())
}

fn duplicate(label: &str, field: &str) -> AppError {
    let mut chars = label.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    AppError::field(field, format!("{label} with this {field} already exists!"))
}

/// Map a unique index violation onto the duplicate field error
fn unique_violation(err: DbErr, label: &'static str, field: &'static str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            warn!(entity = label, field, detail = %detail, "Unique index rejected write");
            duplicate(label, field)
        }
        _ => AppError::Database(err),
    }
}

/// SQLite reports a `RESTRICT` foreign key as a trigger constraint (1811),
/// which `sql_err` does not classify, so its message is matched as well.
fn is_foreign_key_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
        || err.to_string().contains("FOREIGN KEY constraint failed")
}

/// Map a foreign key violation onto the protected delete error
fn protected_violation(err: DbErr, label: &'static str, message: &str) -> AppError {
    if is_foreign_key_violation(&err) {
        record_protected_delete(label);
        warn!(entity = label, error = %err, "Foreign key rejected delete");
        AppError::Protected {
            message: message.to_string(),
        }
    } else {
        AppError::Database(err)
    }
}

/// Books of `owner` whose `column` points at `id`, ordered by title
async fn books_referencing<C: ConnectionTrait>(
    conn: &C,
    column: BookColumn,
    owner: Uuid,
    id: Uuid,
) -> Result<Vec<Book>> {
    BookEntity::find()
        .filter(BookColumn::UserId.eq(owner))
        .filter(column.eq(id))
        .order_by_asc(BookColumn::Title)
        .all(conn)
        .await
        .map_err(Into::into)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::forms::RegisterForm;
    use tempfile::TempDir;

    /// Repository over a fresh in-memory database and media directory
    pub async fn repository() -> (Repository, TempDir) {
        let media_root = TempDir::new().unwrap();
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        let repo = Repository::new(pool, MediaConfig::with_root(media_root.path()));
        (repo, media_root)
    }

    pub async fn user(repo: &Repository, username: &str) -> Uuid {
        let view = repo
            .register_user(RegisterForm {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .unwrap();
        view.user.id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_duplicate_message() {
        let err = duplicate("author", "name");
        assert_eq!(
            err.form_errors().unwrap().messages("name"),
            ["Author with this name already exists!"]
        );
    }

    #[tokio::test]
    async fn test_ping_and_schema_idempotent() {
        let (repo, _media) = repository().await;
        repo.ping().await.unwrap();
        // Creating the schema again is a no-op
        crate::db::create_schema(repo.write_conn()).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_key_violation_is_protected() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;
        let author = repo
            .create_author(
                owner,
                crate::forms::AuthorForm {
                    name: "Borges".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        repo.create_book(
            owner,
            crate::forms::BookForm {
                isbn: "9780306406157".into(),
                title: "Ficciones".into(),
                author_id: Some(author.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Delete without the reference count, as a racing insert would leave it
        let err = AuthorEntity::delete_by_id(author.id)
            .exec(repo.write_conn())
            .await
            .unwrap_err();
        let err = protected_violation(err, "author", "The author cannot be deleted.");
        assert!(
            matches!(&err, AppError::Protected { message } if message == "The author cannot be deleted."),
            "unexpected error: {err:?}"
        );
        assert_eq!(repo.list_authors(owner).await.unwrap().len(), 1);
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        let err = protected_violation(DbErr::Custom("boom".into()), "genre", "nope");
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_find_owned_hides_other_users_rows() {
        let (repo, _media) = repository().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;

        let genre = repo
            .create_genre(alice, crate::forms::NameForm { name: "Poetry".into() })
            .await
            .unwrap();

        let err = repo.get_genre(bob, genre.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
