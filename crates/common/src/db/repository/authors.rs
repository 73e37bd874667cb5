//! Authors and their headshots

use super::*;
use crate::forms::AuthorForm;
use crate::imaging::ImageSource;
use crate::metrics::{record_image, record_write};
use crate::validation::{check_upload, Upload};
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use std::time::Instant;
use tracing::info;

impl Repository {
    // ========================================================================
    // Author Operations
    // ========================================================================

    pub async fn list_authors(&self, owner: Uuid) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .filter(AuthorColumn::UserId.eq(owner))
            .order_by_asc(AuthorColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_author(&self, owner: Uuid, id: Uuid) -> Result<GroupDetail<Author>> {
        let conn = self.read_conn();
        let record = find_owned::<AuthorEntity, _>(
            conn,
            "author",
            AuthorColumn::Id,
            AuthorColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = books_referencing(conn, BookColumn::AuthorId, owner, id).await?;
        Ok(GroupDetail { record, books })
    }

    pub async fn create_author(&self, owner: Uuid, form: AuthorForm) -> Result<Author> {
        form.clean()?;
        let name = form.name.trim().to_string();

        let txn = self.write_conn().begin().await?;
        ensure_unique::<AuthorEntity, _>(
            &txn,
            "author",
            "name",
            AuthorColumn::Name,
            AuthorColumn::UserId,
            AuthorColumn::Id,
            owner,
            None,
            &name,
        )
        .await?;

        let now = now();
        let default_headshot = self.images.default_path(ImageKind::Headshot).to_string();
        let author = AuthorActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name_key: Set(normalize_text(&name)),
            name: Set(name),
            date_of_birth: Set(form.date_of_birth),
            date_of_death: Set(form.date_of_death),
            summary: Set(trimmed(form.summary)),
            headshot: Set(default_headshot.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_violation(e, "author", "name"))?;

        let (author, superseded) = self
            .store_headshot(&txn, author, ImageSource::Stored(Some(default_headshot)))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Headshot, superseded);

        record_write("author", "create");
        info!(author_id = %author.id, user_id = %owner, "Author created");
        Ok(author)
    }

    pub async fn update_author(&self, owner: Uuid, id: Uuid, form: AuthorForm) -> Result<Author> {
        form.clean()?;
        let name = form.name.trim().to_string();

        let txn = self.write_conn().begin().await?;
        let existing = find_owned::<AuthorEntity, _>(
            &txn,
            "author",
            AuthorColumn::Id,
            AuthorColumn::UserId,
            owner,
            id,
        )
        .await?;
        ensure_unique::<AuthorEntity, _>(
            &txn,
            "author",
            "name",
            AuthorColumn::Name,
            AuthorColumn::UserId,
            AuthorColumn::Id,
            owner,
            Some(id),
            &name,
        )
        .await?;

        let current_headshot = existing.headshot.clone();
        let mut active = existing.into_active_model();
        active.name_key = Set(normalize_text(&name));
        active.name = Set(name);
        active.date_of_birth = Set(form.date_of_birth);
        active.date_of_death = Set(form.date_of_death);
        active.summary = Set(trimmed(form.summary));
        active.updated_at = Set(now());
        let author = active
            .update(&txn)
            .await
            .map_err(|e| unique_violation(e, "author", "name"))?;

        let (author, superseded) = self
            .store_headshot(&txn, author, ImageSource::Stored(Some(current_headshot)))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Headshot, superseded);

        record_write("author", "update");
        info!(author_id = %id, user_id = %owner, "Author updated");
        Ok(author)
    }

    pub async fn update_headshot(&self, owner: Uuid, id: Uuid, upload: Upload) -> Result<Author> {
        check_upload("headshot", &upload, &self.media)?;

        let txn = self.write_conn().begin().await?;
        let author = find_owned::<AuthorEntity, _>(
            &txn,
            "author",
            AuthorColumn::Id,
            AuthorColumn::UserId,
            owner,
            id,
        )
        .await?;
        let (author, superseded) = self
            .store_headshot(&txn, author, ImageSource::Upload(upload.bytes))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Headshot, superseded);

        info!(author_id = %id, headshot = %author.headshot, "Headshot updated");
        Ok(author)
    }

    pub async fn delete_author(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let author = self
            .delete_protected::<AuthorEntity>(
                "author",
                AuthorColumn::Id,
                AuthorColumn::UserId,
                BookColumn::AuthorId,
                owner,
                id,
            )
            .await?;

        self.images.discard(ImageKind::Headshot, &author.headshot);
        record_write("author", "delete");
        info!(author_id = %id, user_id = %owner, "Author deleted");
        Ok(())
    }

    /// Write the canonical headshot; returns the author and any replaced file
    async fn store_headshot<C: ConnectionTrait>(
        &self,
        conn: &C,
        author: Author,
        source: ImageSource,
    ) -> Result<(Author, Option<String>)> {
        let started = Instant::now();
        let canonical = ImageProcessor::headshot_path(author.user_id, author.id);
        let stored = self
            .images
            .store_blocking(ImageKind::Headshot, canonical, source)
            .await?;
        if stored.unchanged {
            return Ok((author, None));
        }
        record_image(started.elapsed().as_secs_f64(), "headshot", stored.fell_back);

        let mut active = author.into_active_model();
        active.headshot = Set(stored.path);
        Ok((active.update(conn).await?, stored.superseded))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::NaiveDate;

    fn form(name: &str) -> AuthorForm {
        AuthorForm {
            name: name.to_string(),
            date_of_birth: None,
            date_of_death: None,
            summary: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_is_per_user() {
        let (repo, _media) = repository().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;

        repo.create_author(alice, form("Gabriel García Márquez")).await.unwrap();

        let err = repo
            .create_author(alice, form("  gabriel GARCIA marquez! "))
            .await
            .unwrap_err();
        assert_eq!(
            err.form_errors().unwrap().messages("name"),
            ["Author with this name already exists!"]
        );

        // Same name for another user is fine
        repo.create_author(bob, form("Gabriel García Márquez")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_keeps_own_name() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;
        let author = repo.create_author(owner, form("Le Guin")).await.unwrap();

        let mut update = form("Le Guin");
        update.date_of_birth = NaiveDate::from_ymd_opt(1929, 10, 21);
        let updated = repo.update_author(owner, author.id, update).await.unwrap();
        assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1929, 10, 21));
        // Canonical headshot already in place
        assert_eq!(updated.headshot, author.headshot);
    }

    #[tokio::test]
    async fn test_create_stores_canonical_headshot() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;
        let author = repo.create_author(owner, form("Borges")).await.unwrap();

        assert_eq!(author.headshot, ImageProcessor::headshot_path(owner, author.id));
        assert!(repo.images().absolute(&author.headshot).exists());
    }

    #[tokio::test]
    async fn test_other_user_cannot_update() {
        let (repo, _media) = repository().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let author = repo.create_author(alice, form("Borges")).await.unwrap();

        let err = repo.update_author(bob, author.id, form("Mine")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_unreferenced_author() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;
        let author = repo.create_author(owner, form("Borges")).await.unwrap();
        let headshot = repo.images().absolute(&author.headshot);

        repo.delete_author(owner, author.id).await.unwrap();
        assert!(repo.list_authors(owner).await.unwrap().is_empty());
        assert!(!headshot.exists());
    }
}
