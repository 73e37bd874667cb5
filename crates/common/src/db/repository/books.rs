//! Books and their per-user rating, status and price rows

use super::*;
use crate::errors::FormErrors;
use crate::forms::{BookForm, PriceForm, RatingForm, StatusForm};
use crate::imaging::ImageSource;
use crate::metrics::{record_image, record_write};
use crate::validation::{check_upload, Upload};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// A selectable value with its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

impl Choice {
    fn new(value: &'static str, label: &'static str) -> Self {
        Self { value, label }
    }
}

/// Book reference used by pickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookChoice {
    pub id: Uuid,
    pub title: String,
}

/// Everything the book form can pick from
#[derive(Debug, Clone, Serialize)]
pub struct BookOptions {
    pub authors: Vec<Author>,
    pub publishers: Vec<Publisher>,
    pub genres: Vec<Genre>,
    pub collections: Vec<Collection>,
    pub sections: Vec<Section>,
    pub categories: Vec<Choice>,
    pub statuses: Vec<Choice>,
    pub currencies: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub publisher: Option<Publisher>,
    pub genre: Option<Genre>,
    pub collection: Option<Collection>,
    pub section: Option<Section>,
    /// Requester's rating, 0 when unset
    pub rating: i32,
    /// Requester's status, empty when unset
    pub status: String,
    pub price: Option<Price>,
    /// Mean of every user's rating, two decimals
    pub average_rating: f64,
    pub rating_count: u64,
}

/// Mean rounded to two decimals; 0 for no ratings
fn average(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Fold a validation failure into `errors`; other errors pass through
fn collect(errors: &mut FormErrors, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(AppError::Validation(found)) => {
            errors.merge(found);
            Ok(())
        }
        Err(other) => Err(other),
    }
}

/// Check that an optional reference points at a row of `owner`
async fn check_choice<E, C>(
    conn: &C,
    errors: &mut FormErrors,
    field: &'static str,
    id_column: E::Column,
    user_column: E::Column,
    owner: Uuid,
    id: Option<Uuid>,
) -> Result<()>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let Some(id) = id else {
        return Ok(());
    };
    let found = E::find()
        .filter(id_column.eq(id))
        .filter(user_column.eq(owner))
        .count(conn)
        .await?;
    if found == 0 {
        errors.add(field, INVALID_CHOICE);
    }
    Ok(())
}

/// Database-backed checks on a book form
async fn check_book_form<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    form: &BookForm,
    excluding: Option<Uuid>,
) -> Result<()> {
    let mut errors = FormErrors::new();

    let isbn = ensure_unique::<BookEntity, _>(
        conn,
        "book",
        "isbn",
        BookColumn::Isbn,
        BookColumn::UserId,
        BookColumn::Id,
        owner,
        excluding,
        form.isbn.trim(),
    )
    .await;
    collect(&mut errors, isbn)?;

    let title = ensure_unique::<BookEntity, _>(
        conn,
        "book",
        "title",
        BookColumn::Title,
        BookColumn::UserId,
        BookColumn::Id,
        owner,
        excluding,
        form.title.trim(),
    )
    .await;
    collect(&mut errors, title)?;

    check_choice::<AuthorEntity, _>(
        conn,
        &mut errors,
        "author_id",
        AuthorColumn::Id,
        AuthorColumn::UserId,
        owner,
        form.author_id,
    )
    .await?;
    check_choice::<PublisherEntity, _>(
        conn,
        &mut errors,
        "publisher_id",
        PublisherColumn::Id,
        PublisherColumn::UserId,
        owner,
        form.publisher_id,
    )
    .await?;
    check_choice::<GenreEntity, _>(
        conn,
        &mut errors,
        "genre_id",
        GenreColumn::Id,
        GenreColumn::UserId,
        owner,
        form.genre_id,
    )
    .await?;
    check_choice::<CollectionEntity, _>(
        conn,
        &mut errors,
        "collection_id",
        CollectionColumn::Id,
        CollectionColumn::UserId,
        owner,
        form.collection_id,
    )
    .await?;
    check_choice::<SectionEntity, _>(
        conn,
        &mut errors,
        "section_id",
        SectionColumn::Id,
        SectionColumn::UserId,
        owner,
        form.section_id,
    )
    .await?;

    if let (Some(collection_id), Some(volume)) = (form.collection_id, form.volume_number) {
        let mut clash = BookEntity::find()
            .filter(BookColumn::CollectionId.eq(collection_id))
            .filter(BookColumn::VolumeNumber.eq(volume));
        if let Some(id) = excluding {
            clash = clash.filter(BookColumn::Id.ne(id));
        }
        if clash.count(conn).await? > 0 {
            errors.add(
                "volume_number",
                "Book with this Collection and Volume number already exists.",
            );
        }
    }

    errors.into_result()
}

/// Map a write failure on `books` to the field the violated index guards
fn book_write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            let field = if detail.contains("isbn") {
                "isbn"
            } else if detail.contains("volume") {
                "volume_number"
            } else {
                "title"
            };
            duplicate("book", field)
        }
        _ => AppError::Database(err),
    }
}

impl Repository {
    // ========================================================================
    // Book Operations
    // ========================================================================

    /// Choices offered by the book form
    pub async fn book_options(&self, owner: Uuid) -> Result<BookOptions> {
        Ok(BookOptions {
            authors: self.list_authors(owner).await?,
            publishers: self.list_publishers(owner).await?,
            genres: self.list_genres(owner).await?,
            collections: self.list_collections(owner).await?,
            sections: self.list_sections(owner).await?,
            categories: Category::ALL
                .iter()
                .map(|c| Choice::new(c.as_str(), c.label()))
                .collect(),
            statuses: BookStatus::ALL
                .iter()
                .map(|s| Choice::new(s.as_str(), s.label()))
                .collect(),
            currencies: Currency::ALL
                .iter()
                .map(|c| Choice::new(c.as_str(), c.label()))
                .collect(),
        })
    }

    pub async fn get_book(&self, owner: Uuid, id: Uuid) -> Result<BookDetail> {
        let conn = self.read_conn();
        let book = find_owned::<BookEntity, _>(conn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
            .await?;

        let author = match book.author_id {
            Some(id) => AuthorEntity::find_by_id(id).one(conn).await?,
            None => None,
        };
        let publisher = match book.publisher_id {
            Some(id) => PublisherEntity::find_by_id(id).one(conn).await?,
            None => None,
        };
        let genre = match book.genre_id {
            Some(id) => GenreEntity::find_by_id(id).one(conn).await?,
            None => None,
        };
        let collection = match book.collection_id {
            Some(id) => CollectionEntity::find_by_id(id).one(conn).await?,
            None => None,
        };
        let section = match book.section_id {
            Some(id) => SectionEntity::find_by_id(id).one(conn).await?,
            None => None,
        };

        let rating = RatingEntity::find()
            .filter(RatingColumn::UserId.eq(owner))
            .filter(RatingColumn::BookId.eq(id))
            .one(conn)
            .await?
            .map(|r| r.rating)
            .unwrap_or(0);
        let status = StatusEntity::find()
            .filter(StatusColumn::UserId.eq(owner))
            .filter(StatusColumn::BookId.eq(id))
            .one(conn)
            .await?
            .map(|s| s.status)
            .unwrap_or_default();
        let price = PriceEntity::find()
            .filter(PriceColumn::UserId.eq(owner))
            .filter(PriceColumn::BookId.eq(id))
            .one(conn)
            .await?;

        let all_ratings: Vec<i32> = RatingEntity::find()
            .select_only()
            .column(RatingColumn::Rating)
            .filter(RatingColumn::BookId.eq(id))
            .into_tuple()
            .all(conn)
            .await?;

        Ok(BookDetail {
            book,
            author,
            publisher,
            genre,
            collection,
            section,
            rating,
            status,
            price,
            average_rating: average(&all_ratings),
            rating_count: all_ratings.len() as u64,
        })
    }

    /// Create a book with its default rating, status and price rows
    pub async fn create_book(&self, owner: Uuid, form: BookForm) -> Result<Book> {
        form.clean()?;

        let txn = self.write_conn().begin().await?;
        check_book_form(&txn, owner, &form, None).await?;

        let now = now();
        let title = form.title.trim().to_string();
        let default_cover = self.images.default_path(ImageKind::Cover).to_string();
        let book = BookActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            isbn: Set(form.isbn.trim().to_string()),
            title_key: Set(normalize_text(&title)),
            title: Set(title),
            author_id: Set(form.author_id),
            publisher_id: Set(form.publisher_id),
            genre_id: Set(form.genre_id),
            collection_id: Set(form.collection_id),
            volume_number: Set(form.volume_number),
            section_id: Set(form.section_id),
            copyright_year: Set(form.copyright_year),
            edition: Set(form.edition),
            category: Set(form.category.into()),
            language: Set(trimmed(form.language)),
            comments: Set(trimmed(form.comments)),
            cover_image: Set(default_cover.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(book_write_error)?;

        RatingActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(book.id),
            rating: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        StatusActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(book.id),
            status: Set(BookStatus::Available.into()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        PriceActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(book.id),
            currency: Set(Currency::Eur.into()),
            purchase_price_cents: Set(0),
            sale_price_cents: Set(0),
            purchase_date: Set(None),
            source: Set(PriceSource::Purchase.into()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let (book, superseded) = self
            .store_cover(&txn, book, ImageSource::Stored(Some(default_cover)))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Cover, superseded);

        record_write("book", "create");
        info!(book_id = %book.id, user_id = %owner, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    /// Update a book; an ISBN change moves the cover to its new canonical path
    pub async fn update_book(&self, owner: Uuid, id: Uuid, form: BookForm) -> Result<Book> {
        form.clean()?;

        let txn = self.write_conn().begin().await?;
        let existing =
            find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
                .await?;
        check_book_form(&txn, owner, &form, Some(id)).await?;

        let current_cover = existing.cover_image.clone();
        let title = form.title.trim().to_string();
        let mut active = existing.into_active_model();
        active.isbn = Set(form.isbn.trim().to_string());
        active.title_key = Set(normalize_text(&title));
        active.title = Set(title);
        active.author_id = Set(form.author_id);
        active.publisher_id = Set(form.publisher_id);
        active.genre_id = Set(form.genre_id);
        active.collection_id = Set(form.collection_id);
        active.volume_number = Set(form.volume_number);
        active.section_id = Set(form.section_id);
        active.copyright_year = Set(form.copyright_year);
        active.edition = Set(form.edition);
        active.category = Set(form.category.into());
        active.language = Set(trimmed(form.language));
        active.comments = Set(trimmed(form.comments));
        active.updated_at = Set(now());
        let book = active.update(&txn).await.map_err(book_write_error)?;

        let (book, superseded) = self
            .store_cover(&txn, book, ImageSource::Stored(Some(current_cover)))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Cover, superseded);

        record_write("book", "update");
        info!(book_id = %id, user_id = %owner, "Book updated");
        Ok(book)
    }

    pub async fn update_cover(&self, owner: Uuid, id: Uuid, upload: Upload) -> Result<Book> {
        check_upload("cover_image", &upload, &self.media)?;

        let txn = self.write_conn().begin().await?;
        let book =
            find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
                .await?;
        let (book, superseded) = self
            .store_cover(&txn, book, ImageSource::Upload(upload.bytes))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Cover, superseded);

        info!(book_id = %id, cover = %book.cover_image, "Cover updated");
        Ok(book)
    }

    /// Delete a book; its rating, status and price rows cascade
    pub async fn delete_book(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;
        let book =
            find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
                .await?;
        BookEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        self.images.discard(ImageKind::Cover, &book.cover_image);
        record_write("book", "delete");
        info!(book_id = %id, user_id = %owner, "Book deleted");
        Ok(())
    }

    // ========================================================================
    // Per-user Book Attributes
    // ========================================================================

    /// Set the requester's rating; the first write creates the row
    pub async fn rate_book(&self, owner: Uuid, id: Uuid, form: RatingForm) -> Result<Rating> {
        form.clean()?;
        let txn = self.write_conn().begin().await?;
        find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
            .await?;

        let now = now();
        RatingEntity::insert(RatingActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(id),
            rating: Set(form.rating),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([RatingColumn::UserId, RatingColumn::BookId])
                .update_columns([RatingColumn::Rating, RatingColumn::UpdatedAt])
                .to_owned(),
        )
        .exec(&txn)
        .await?;

        let rating = RatingEntity::find()
            .filter(RatingColumn::UserId.eq(owner))
            .filter(RatingColumn::BookId.eq(id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("rating", id))?;
        txn.commit().await?;

        info!(book_id = %id, user_id = %owner, rating = form.rating, "Book rated");
        Ok(rating)
    }

    pub async fn set_status(&self, owner: Uuid, id: Uuid, form: StatusForm) -> Result<Status> {
        let txn = self.write_conn().begin().await?;
        find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
            .await?;

        let now = now();
        StatusEntity::insert(StatusActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(id),
            status: Set(form.status.into()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([StatusColumn::UserId, StatusColumn::BookId])
                .update_columns([StatusColumn::Status, StatusColumn::UpdatedAt])
                .to_owned(),
        )
        .exec(&txn)
        .await?;

        let status = StatusEntity::find()
            .filter(StatusColumn::UserId.eq(owner))
            .filter(StatusColumn::BookId.eq(id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("status", id))?;
        txn.commit().await?;

        info!(book_id = %id, user_id = %owner, status = %form.status, "Book status updated");
        Ok(status)
    }

    pub async fn set_price(&self, owner: Uuid, id: Uuid, form: PriceForm) -> Result<Price> {
        form.clean()?;
        let txn = self.write_conn().begin().await?;
        find_owned::<BookEntity, _>(&txn, "book", BookColumn::Id, BookColumn::UserId, owner, id)
            .await?;

        let now = now();
        PriceEntity::insert(PriceActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            book_id: Set(id),
            currency: Set(form.currency.into()),
            purchase_price_cents: Set(form.purchase_price_cents),
            sale_price_cents: Set(form.sale_price_cents),
            purchase_date: Set(form.purchase_date),
            source: Set(form.source.into()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([PriceColumn::UserId, PriceColumn::BookId])
                .update_columns([
                    PriceColumn::Currency,
                    PriceColumn::PurchasePriceCents,
                    PriceColumn::SalePriceCents,
                    PriceColumn::PurchaseDate,
                    PriceColumn::Source,
                    PriceColumn::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(&txn)
        .await?;

        let price = PriceEntity::find()
            .filter(PriceColumn::UserId.eq(owner))
            .filter(PriceColumn::BookId.eq(id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("price", id))?;
        txn.commit().await?;

        info!(book_id = %id, user_id = %owner, currency = %form.currency, "Book price updated");
        Ok(price)
    }

    /// Write the canonical cover; returns the book and any replaced file
    async fn store_cover<C: ConnectionTrait>(
        &self,
        conn: &C,
        book: Book,
        source: ImageSource,
    ) -> Result<(Book, Option<String>)> {
        let started = Instant::now();
        let canonical = ImageProcessor::cover_path(book.user_id, &book.isbn);
        let stored = self
            .images
            .store_blocking(ImageKind::Cover, canonical, source)
            .await?;
        if stored.unchanged {
            return Ok((book, None));
        }
        record_image(started.elapsed().as_secs_f64(), "cover", stored.fell_back);

        let mut active = book.into_active_model();
        active.cover_image = Set(stored.path);
        Ok((active.update(conn).await?, stored.superseded))
    }
}
