//! Publishers, genres, collections and sections
//!
//! Plain named records that books point at. All four share the same
//! uniqueness and protected-delete rules.

use super::*;
use crate::forms::{DescribedForm, NameForm};
use crate::metrics::record_write;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::Serialize;
use tracing::info;

/// A record together with the books pointing at it
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail<T> {
    pub record: T,
    pub books: Vec<Book>,
}

/// A collection with its visible members, in volume order
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetail {
    pub record: Collection,
    pub books: Vec<LibraryEntry>,
}

impl Repository {
    // ========================================================================
    // Publisher Operations
    // ========================================================================

    pub async fn list_publishers(&self, owner: Uuid) -> Result<Vec<Publisher>> {
        PublisherEntity::find()
            .filter(PublisherColumn::UserId.eq(owner))
            .order_by_asc(PublisherColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_publisher(&self, owner: Uuid, id: Uuid) -> Result<GroupDetail<Publisher>> {
        let conn = self.read_conn();
        let record = find_owned::<PublisherEntity, _>(
            conn,
            "publisher",
            PublisherColumn::Id,
            PublisherColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = books_referencing(conn, BookColumn::PublisherId, owner, id).await?;
        Ok(GroupDetail { record, books })
    }

    pub async fn create_publisher(&self, owner: Uuid, form: DescribedForm) -> Result<Publisher> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        ensure_unique::<PublisherEntity, _>(
            conn,
            "publisher",
            "name",
            PublisherColumn::Name,
            PublisherColumn::UserId,
            PublisherColumn::Id,
            owner,
            None,
            &name,
        )
        .await?;

        let now = now();
        let publisher = PublisherActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name_key: Set(normalize_text(&name)),
            name: Set(name),
            description: Set(trimmed(form.description)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| unique_violation(e, "publisher", "name"))?;

        record_write("publisher", "create");
        info!(publisher_id = %publisher.id, user_id = %owner, "Publisher created");
        Ok(publisher)
    }

    pub async fn update_publisher(
        &self,
        owner: Uuid,
        id: Uuid,
        form: DescribedForm,
    ) -> Result<Publisher> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        let existing = find_owned::<PublisherEntity, _>(
            conn,
            "publisher",
            PublisherColumn::Id,
            PublisherColumn::UserId,
            owner,
            id,
        )
        .await?;
        ensure_unique::<PublisherEntity, _>(
            conn,
            "publisher",
            "name",
            PublisherColumn::Name,
            PublisherColumn::UserId,
            PublisherColumn::Id,
            owner,
            Some(id),
            &name,
        )
        .await?;

        let mut active = existing.into_active_model();
        active.name_key = Set(normalize_text(&name));
        active.name = Set(name);
        active.description = Set(trimmed(form.description));
        active.updated_at = Set(now());
        let publisher = active
            .update(conn)
            .await
            .map_err(|e| unique_violation(e, "publisher", "name"))?;

        record_write("publisher", "update");
        info!(publisher_id = %id, user_id = %owner, "Publisher updated");
        Ok(publisher)
    }

    pub async fn delete_publisher(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_protected::<PublisherEntity>(
            "publisher",
            PublisherColumn::Id,
            PublisherColumn::UserId,
            BookColumn::PublisherId,
            owner,
            id,
        )
        .await?;

        record_write("publisher", "delete");
        info!(publisher_id = %id, user_id = %owner, "Publisher deleted");
        Ok(())
    }

    // ========================================================================
    // Genre Operations
    // ========================================================================

    pub async fn list_genres(&self, owner: Uuid) -> Result<Vec<Genre>> {
        GenreEntity::find()
            .filter(GenreColumn::UserId.eq(owner))
            .order_by_asc(GenreColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_genre(&self, owner: Uuid, id: Uuid) -> Result<GroupDetail<Genre>> {
        let conn = self.read_conn();
        let record = find_owned::<GenreEntity, _>(
            conn,
            "genre",
            GenreColumn::Id,
            GenreColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = books_referencing(conn, BookColumn::GenreId, owner, id).await?;
        Ok(GroupDetail { record, books })
    }

    pub async fn create_genre(&self, owner: Uuid, form: NameForm) -> Result<Genre> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        ensure_unique::<GenreEntity, _>(
            conn,
            "genre",
            "name",
            GenreColumn::Name,
            GenreColumn::UserId,
            GenreColumn::Id,
            owner,
            None,
            &name,
        )
        .await?;

        let now = now();
        let genre = GenreActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name_key: Set(normalize_text(&name)),
            name: Set(name),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| unique_violation(e, "genre", "name"))?;

        record_write("genre", "create");
        info!(genre_id = %genre.id, user_id = %owner, "Genre created");
        Ok(genre)
    }

    pub async fn update_genre(&self, owner: Uuid, id: Uuid, form: NameForm) -> Result<Genre> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        let existing = find_owned::<GenreEntity, _>(
            conn,
            "genre",
            GenreColumn::Id,
            GenreColumn::UserId,
            owner,
            id,
        )
        .await?;
        ensure_unique::<GenreEntity, _>(
            conn,
            "genre",
            "name",
            GenreColumn::Name,
            GenreColumn::UserId,
            GenreColumn::Id,
            owner,
            Some(id),
            &name,
        )
        .await?;

        let mut active = existing.into_active_model();
        active.name_key = Set(normalize_text(&name));
        active.name = Set(name);
        active.updated_at = Set(now());
        let genre = active
            .update(conn)
            .await
            .map_err(|e| unique_violation(e, "genre", "name"))?;

        record_write("genre", "update");
        info!(genre_id = %id, user_id = %owner, "Genre updated");
        Ok(genre)
    }

    pub async fn delete_genre(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_protected::<GenreEntity>(
            "genre",
            GenreColumn::Id,
            GenreColumn::UserId,
            BookColumn::GenreId,
            owner,
            id,
        )
        .await?;

        record_write("genre", "delete");
        info!(genre_id = %id, user_id = %owner, "Genre deleted");
        Ok(())
    }

    // ========================================================================
    // Collection Operations
    // ========================================================================

    pub async fn list_collections(&self, owner: Uuid) -> Result<Vec<Collection>> {
        CollectionEntity::find()
            .filter(CollectionColumn::UserId.eq(owner))
            .order_by_asc(CollectionColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Collection with the members a reader can currently pick up
    pub async fn get_collection(&self, owner: Uuid, id: Uuid) -> Result<CollectionDetail> {
        let conn = self.read_conn();
        let record = find_owned::<CollectionEntity, _>(
            conn,
            "collection",
            CollectionColumn::Id,
            CollectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = super::library::collection_members(conn, owner, id).await?;
        Ok(CollectionDetail { record, books })
    }

    pub async fn create_collection(&self, owner: Uuid, form: DescribedForm) -> Result<Collection> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        ensure_unique::<CollectionEntity, _>(
            conn,
            "collection",
            "name",
            CollectionColumn::Name,
            CollectionColumn::UserId,
            CollectionColumn::Id,
            owner,
            None,
            &name,
        )
        .await?;

        let now = now();
        let collection = CollectionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name_key: Set(normalize_text(&name)),
            name: Set(name),
            description: Set(trimmed(form.description)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| unique_violation(e, "collection", "name"))?;

        record_write("collection", "create");
        info!(collection_id = %collection.id, user_id = %owner, "Collection created");
        Ok(collection)
    }

    pub async fn update_collection(
        &self,
        owner: Uuid,
        id: Uuid,
        form: DescribedForm,
    ) -> Result<Collection> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        let existing = find_owned::<CollectionEntity, _>(
            conn,
            "collection",
            CollectionColumn::Id,
            CollectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        ensure_unique::<CollectionEntity, _>(
            conn,
            "collection",
            "name",
            CollectionColumn::Name,
            CollectionColumn::UserId,
            CollectionColumn::Id,
            owner,
            Some(id),
            &name,
        )
        .await?;

        let mut active = existing.into_active_model();
        active.name_key = Set(normalize_text(&name));
        active.name = Set(name);
        active.description = Set(trimmed(form.description));
        active.updated_at = Set(now());
        let collection = active
            .update(conn)
            .await
            .map_err(|e| unique_violation(e, "collection", "name"))?;

        record_write("collection", "update");
        info!(collection_id = %id, user_id = %owner, "Collection updated");
        Ok(collection)
    }

    pub async fn delete_collection(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_protected::<CollectionEntity>(
            "collection",
            CollectionColumn::Id,
            CollectionColumn::UserId,
            BookColumn::CollectionId,
            owner,
            id,
        )
        .await?;

        record_write("collection", "delete");
        info!(collection_id = %id, user_id = %owner, "Collection deleted");
        Ok(())
    }

    // ========================================================================
    // Section Operations
    // ========================================================================

    pub async fn list_sections(&self, owner: Uuid) -> Result<Vec<Section>> {
        SectionEntity::find()
            .filter(SectionColumn::UserId.eq(owner))
            .order_by_asc(SectionColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_section(&self, owner: Uuid, id: Uuid) -> Result<GroupDetail<Section>> {
        let conn = self.read_conn();
        let record = find_owned::<SectionEntity, _>(
            conn,
            "section",
            SectionColumn::Id,
            SectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        let books = books_referencing(conn, BookColumn::SectionId, owner, id).await?;
        Ok(GroupDetail { record, books })
    }

    pub async fn create_section(&self, owner: Uuid, form: NameForm) -> Result<Section> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        ensure_unique::<SectionEntity, _>(
            conn,
            "section",
            "name",
            SectionColumn::Name,
            SectionColumn::UserId,
            SectionColumn::Id,
            owner,
            None,
            &name,
        )
        .await?;

        let now = now();
        let section = SectionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name_key: Set(normalize_text(&name)),
            name: Set(name),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| unique_violation(e, "section", "name"))?;

        record_write("section", "create");
        info!(section_id = %section.id, user_id = %owner, "Section created");
        Ok(section)
    }

    pub async fn update_section(&self, owner: Uuid, id: Uuid, form: NameForm) -> Result<Section> {
        form.clean()?;
        let name = form.name.trim().to_string();
        let conn = self.write_conn();

        let existing = find_owned::<SectionEntity, _>(
            conn,
            "section",
            SectionColumn::Id,
            SectionColumn::UserId,
            owner,
            id,
        )
        .await?;
        ensure_unique::<SectionEntity, _>(
            conn,
            "section",
            "name",
            SectionColumn::Name,
            SectionColumn::UserId,
            SectionColumn::Id,
            owner,
            Some(id),
            &name,
        )
        .await?;

        let mut active = existing.into_active_model();
        active.name_key = Set(normalize_text(&name));
        active.name = Set(name);
        active.updated_at = Set(now());
        let section = active
            .update(conn)
            .await
            .map_err(|e| unique_violation(e, "section", "name"))?;

        record_write("section", "update");
        info!(section_id = %id, user_id = %owner, "Section updated");
        Ok(section)
    }

    pub async fn delete_section(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_protected::<SectionEntity>(
            "section",
            SectionColumn::Id,
            SectionColumn::UserId,
            BookColumn::SectionId,
            owner,
            id,
        )
        .await?;

        record_write("section", "delete");
        info!(section_id = %id, user_id = %owner, "Section deleted");
        Ok(())
    }
}
