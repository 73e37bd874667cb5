//! Schema creation from the entity definitions
//!
//! Tables are created in foreign-key order, then the composite unique
//! indexes that entity attributes cannot express. Every statement is
//! `IF NOT EXISTS`, so running this on each start is safe.

use super::models::*;
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

pub async fn create_schema(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, UserEntity).await?;
    create_table(db, &schema, ProfileEntity).await?;
    create_table(db, &schema, AuthorEntity).await?;
    create_table(db, &schema, PublisherEntity).await?;
    create_table(db, &schema, GenreEntity).await?;
    create_table(db, &schema, CollectionEntity).await?;
    create_table(db, &schema, SectionEntity).await?;
    create_table(db, &schema, BookEntity).await?;
    create_table(db, &schema, RatingEntity).await?;
    create_table(db, &schema, StatusEntity).await?;
    create_table(db, &schema, PriceEntity).await?;

    for index in unique_indexes() {
        db.execute(db.get_database_backend().build(&index)).await?;
    }

    info!("Database schema ready");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    debug!(table = entity.table_name(), "Table ensured");
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("ux_authors_user_name")
            .table(AuthorEntity)
            .col(AuthorColumn::UserId)
            .col(AuthorColumn::NameKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_publishers_user_name")
            .table(PublisherEntity)
            .col(PublisherColumn::UserId)
            .col(PublisherColumn::NameKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_genres_user_name")
            .table(GenreEntity)
            .col(GenreColumn::UserId)
            .col(GenreColumn::NameKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_collections_user_name")
            .table(CollectionEntity)
            .col(CollectionColumn::UserId)
            .col(CollectionColumn::NameKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_sections_user_name")
            .table(SectionEntity)
            .col(SectionColumn::UserId)
            .col(SectionColumn::NameKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_books_user_isbn")
            .table(BookEntity)
            .col(BookColumn::UserId)
            .col(BookColumn::Isbn)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_books_user_title")
            .table(BookEntity)
            .col(BookColumn::UserId)
            .col(BookColumn::TitleKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_books_collection_volume")
            .table(BookEntity)
            .col(BookColumn::CollectionId)
            .col(BookColumn::VolumeNumber)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_ratings_user_book")
            .table(RatingEntity)
            .col(RatingColumn::UserId)
            .col(RatingColumn::BookId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_statuses_user_book")
            .table(StatusEntity)
            .col(StatusColumn::UserId)
            .col(StatusColumn::BookId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_prices_user_book")
            .table(PriceEntity)
            .col(PriceColumn::UserId)
            .col(PriceColumn::BookId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}
