//! Library views over the per-user book attributes
//!
//! Rating and status live in one-row-per-(user, book) tables. Each entry is
//! the book left-joined against the requester's rows, so a missing rating
//! reads as 0 and a missing status as the empty string.

use super::*;
use sea_orm::sea_query::{Alias, Condition, Expr, Func, JoinType, Order, Query, SelectStatement};
use sea_orm::{FromQueryResult, Statement};
use serde::Serialize;
use std::str::FromStr;

/// A book as seen by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct LibraryEntry {
    pub id: Uuid,
    pub isbn: String,
    pub title: String,
    pub author_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub volume_number: Option<i32>,
    pub cover_image: String,
    pub rating: i32,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryView {
    All,
    Favourites,
    Wishlist,
    ToRead,
    Loaned,
    Sale,
    Sold,
}

/// Books a reader can currently pick up
const ON_HAND: &[BookStatus] = &[
    BookStatus::ToRead,
    BookStatus::Available,
    BookStatus::Loaned,
    BookStatus::ForSale,
];

/// Lowest rating that makes a favourite
pub const FAVOURITE_RATING: i32 = 3;

impl LibraryView {
    /// Statuses a book must have to appear in the view
    pub fn statuses(&self) -> &'static [BookStatus] {
        match self {
            LibraryView::All => &[
                BookStatus::ToRead,
                BookStatus::Available,
                BookStatus::Reserved,
                BookStatus::Loaned,
                BookStatus::ForSale,
                BookStatus::NotFound,
            ],
            LibraryView::Favourites => ON_HAND,
            LibraryView::Wishlist => &[BookStatus::Wish],
            LibraryView::ToRead => &[BookStatus::ToRead],
            LibraryView::Loaned => &[BookStatus::Loaned],
            LibraryView::Sale => &[BookStatus::ForSale],
            LibraryView::Sold => &[BookStatus::Sold],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryView::All => "all",
            LibraryView::Favourites => "favourites",
            LibraryView::Wishlist => "wishlist",
            LibraryView::ToRead => "toread",
            LibraryView::Loaned => "loaned",
            LibraryView::Sale => "sale",
            LibraryView::Sold => "sold",
        }
    }
}

impl FromStr for LibraryView {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(LibraryView::All),
            "favourites" => Ok(LibraryView::Favourites),
            "wishlist" => Ok(LibraryView::Wishlist),
            "toread" => Ok(LibraryView::ToRead),
            "loaned" => Ok(LibraryView::Loaned),
            "sale" => Ok(LibraryView::Sale),
            "sold" => Ok(LibraryView::Sold),
            other => Err(AppError::not_found("library view", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryPage {
    pub view: LibraryView,
    pub count: usize,
    pub books: Vec<LibraryEntry>,
}

enum Ordering {
    Title,
    RatingDesc,
    Volume,
}

/// Annotated book select for `owner`, optionally filtered by status
fn entries_query(
    owner: Uuid,
    statuses: Option<&[BookStatus]>,
    min_rating: Option<i32>,
    collection: Option<Uuid>,
    ordering: Ordering,
) -> SelectStatement {
    let mut query = Query::select();
    query
        .columns([
            (BookEntity, BookColumn::Id),
            (BookEntity, BookColumn::Isbn),
            (BookEntity, BookColumn::Title),
            (BookEntity, BookColumn::AuthorId),
            (BookEntity, BookColumn::CollectionId),
            (BookEntity, BookColumn::VolumeNumber),
            (BookEntity, BookColumn::CoverImage),
        ])
        .expr_as(
            Func::coalesce([
                Expr::col((RatingEntity, RatingColumn::Rating)).into(),
                Expr::val(0).into(),
            ]),
            Alias::new("rating"),
        )
        .expr_as(
            Func::coalesce([
                Expr::col((StatusEntity, StatusColumn::Status)).into(),
                Expr::val("").into(),
            ]),
            Alias::new("status"),
        )
        .from(BookEntity)
        .join(
            JoinType::LeftJoin,
            RatingEntity,
            Condition::all()
                .add(Expr::col((RatingEntity, RatingColumn::BookId)).equals((BookEntity, BookColumn::Id)))
                .add(Expr::col((RatingEntity, RatingColumn::UserId)).eq(owner)),
        )
        .join(
            JoinType::LeftJoin,
            StatusEntity,
            Condition::all()
                .add(Expr::col((StatusEntity, StatusColumn::BookId)).equals((BookEntity, BookColumn::Id)))
                .add(Expr::col((StatusEntity, StatusColumn::UserId)).eq(owner)),
        )
        .and_where(Expr::col((BookEntity, BookColumn::UserId)).eq(owner));

    if let Some(statuses) = statuses {
        query.and_where(
            Expr::col((StatusEntity, StatusColumn::Status))
                .is_in(statuses.iter().map(|s| s.as_str())),
        );
    }

    if let Some(min) = min_rating {
        query.and_where(Expr::col((RatingEntity, RatingColumn::Rating)).gte(min));
    }
    if let Some(collection_id) = collection {
        query.and_where(Expr::col((BookEntity, BookColumn::CollectionId)).eq(collection_id));
    }

    match ordering {
        Ordering::Title => {}
        Ordering::RatingDesc => {
            query.order_by((RatingEntity, RatingColumn::Rating), Order::Desc);
        }
        Ordering::Volume => {
            query.order_by((BookEntity, BookColumn::VolumeNumber), Order::Asc);
        }
    }
    query.order_by((BookEntity, BookColumn::Title), Order::Asc);

    query
}

async fn fetch<C: ConnectionTrait>(conn: &C, query: &SelectStatement) -> Result<Vec<LibraryEntry>> {
    let stmt: Statement = conn.get_database_backend().build(query);
    LibraryEntry::find_by_statement(stmt)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Members of a collection a reader can pick up, in volume order
pub(super) async fn collection_members<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    collection_id: Uuid,
) -> Result<Vec<LibraryEntry>> {
    let query = entries_query(owner, Some(ON_HAND), None, Some(collection_id), Ordering::Volume);
    fetch(conn, &query).await
}

impl Repository {
    // ========================================================================
    // Library Views
    // ========================================================================

    pub async fn library(&self, owner: Uuid, view: LibraryView) -> Result<LibraryPage> {
        let query = match view {
            LibraryView::Favourites => entries_query(
                owner,
                Some(view.statuses()),
                Some(FAVOURITE_RATING),
                None,
                Ordering::RatingDesc,
            ),
            _ => entries_query(owner, Some(view.statuses()), None, None, Ordering::Title),
        };

        let books = fetch(self.read_conn(), &query).await?;
        Ok(LibraryPage {
            view,
            count: books.len(),
            books,
        })
    }

    /// Every book of `owner` with its annotations, ordered by title
    pub async fn list_books(&self, owner: Uuid) -> Result<Vec<LibraryEntry>> {
        let query = entries_query(owner, None, None, None, Ordering::Title);
        fetch(self.read_conn(), &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::forms::{BookForm, DescribedForm, RatingForm, StatusForm};

    async fn book(repo: &Repository, owner: Uuid, isbn: &str, title: &str) -> Uuid {
        repo.create_book(
            owner,
            BookForm {
                isbn: isbn.into(),
                title: title.into(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    fn titles(page: &LibraryPage) -> Vec<&str> {
        page.books.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_view_names_round_trip() {
        for view in [
            LibraryView::All,
            LibraryView::Favourites,
            LibraryView::Wishlist,
            LibraryView::ToRead,
            LibraryView::Loaned,
            LibraryView::Sale,
            LibraryView::Sold,
        ] {
            assert_eq!(view.as_str().parse::<LibraryView>().unwrap(), view);
        }
        assert!("archive".parse::<LibraryView>().is_err());
    }

    #[tokio::test]
    async fn test_views_filter_by_status_and_rating() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;

        let a = book(&repo, owner, "9780306406157", "A").await;
        let b = book(&repo, owner, "9781861972712", "B").await;
        let c = book(&repo, owner, "9780200000000", "C").await;

        repo.set_status(owner, a, StatusForm { status: BookStatus::Wish }).await.unwrap();
        repo.set_status(owner, b, StatusForm { status: BookStatus::Loaned }).await.unwrap();
        repo.rate_book(owner, b, RatingForm { rating: 4 }).await.unwrap();
        repo.set_status(owner, c, StatusForm { status: BookStatus::Sold }).await.unwrap();

        let favourites = repo.library(owner, LibraryView::Favourites).await.unwrap();
        assert_eq!(titles(&favourites), ["B"]);
        assert_eq!(favourites.count, 1);
        assert_eq!(favourites.books[0].rating, 4);

        let wishlist = repo.library(owner, LibraryView::Wishlist).await.unwrap();
        assert_eq!(titles(&wishlist), ["A"]);

        let sold = repo.library(owner, LibraryView::Sold).await.unwrap();
        assert_eq!(titles(&sold), ["C"]);

        // Wish and sold are not in the main view
        let all = repo.library(owner, LibraryView::All).await.unwrap();
        assert_eq!(titles(&all), ["B"]);
    }

    #[tokio::test]
    async fn test_favourites_ordered_by_rating() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;

        let low = book(&repo, owner, "9780306406157", "Aardvark").await;
        let high = book(&repo, owner, "9781861972712", "Zebra").await;
        let unrated = book(&repo, owner, "9780200000000", "Middle").await;
        repo.rate_book(owner, low, RatingForm { rating: 3 }).await.unwrap();
        repo.rate_book(owner, high, RatingForm { rating: 5 }).await.unwrap();
        repo.rate_book(owner, unrated, RatingForm { rating: 2 }).await.unwrap();

        let page = repo.library(owner, LibraryView::Favourites).await.unwrap();
        assert_eq!(titles(&page), ["Zebra", "Aardvark"]);
    }

    #[tokio::test]
    async fn test_annotations_are_per_user() {
        let (repo, _media) = repository().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        book(&repo, alice, "9780306406157", "Mine").await;

        assert!(repo.list_books(bob).await.unwrap().is_empty());

        let books = repo.list_books(alice).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].rating, 0);
        assert_eq!(books[0].status, "available");
    }

    #[tokio::test]
    async fn test_collection_members_in_volume_order() {
        let (repo, _media) = repository().await;
        let owner = user(&repo, "alice").await;
        let saga = repo
            .create_collection(
                owner,
                DescribedForm {
                    name: "Foundation".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        for (isbn, title, volume) in [
            ("9780306406157", "Second Foundation", 3),
            ("9781861972712", "Foundation", 1),
            ("9780200000000", "Foundation and Empire", 2),
        ] {
            repo.create_book(
                owner,
                BookForm {
                    isbn: isbn.into(),
                    title: title.into(),
                    collection_id: Some(saga.id),
                    volume_number: Some(volume),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let books = repo.list_books(owner).await.unwrap();
        let empire = books.iter().find(|b| b.volume_number == Some(2)).unwrap().id;
        repo.set_status(owner, empire, StatusForm { status: BookStatus::Sold })
            .await
            .unwrap();

        let detail = repo.get_collection(owner, saga.id).await.unwrap();
        let volumes: Vec<_> = detail.books.iter().map(|b| b.volume_number).collect();
        assert_eq!(volumes, [Some(1), Some(3)]);
    }
}
