//! SeaORM entity models
//!
//! Database entities for Libris

mod author;
mod book;
mod choices;
mod collection;
mod genre;
mod price;
mod profile;
mod publisher;
mod rating;
mod section;
mod status;
mod user;

pub use choices::{BookStatus, Category, Currency, PriceSource};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
};

pub use profile::{
    ActiveModel as ProfileActiveModel, Column as ProfileColumn, Entity as ProfileEntity,
    Model as Profile,
};

pub use author::{
    ActiveModel as AuthorActiveModel, Column as AuthorColumn, Entity as AuthorEntity,
    Model as Author,
};

pub use publisher::{
    ActiveModel as PublisherActiveModel, Column as PublisherColumn, Entity as PublisherEntity,
    Model as Publisher,
};

pub use genre::{
    ActiveModel as GenreActiveModel, Column as GenreColumn, Entity as GenreEntity,
    Model as Genre,
};

pub use collection::{
    ActiveModel as CollectionActiveModel, Column as CollectionColumn,
    Entity as CollectionEntity, Model as Collection,
};

pub use section::{
    ActiveModel as SectionActiveModel, Column as SectionColumn, Entity as SectionEntity,
    Model as Section,
};

pub use book::{
    ActiveModel as BookActiveModel, Column as BookColumn, Entity as BookEntity, Model as Book,
};

pub use rating::{
    ActiveModel as RatingActiveModel, Column as RatingColumn, Entity as RatingEntity,
    Model as Rating,
};

pub use status::{
    ActiveModel as StatusActiveModel, Column as StatusColumn, Entity as StatusEntity,
    Model as Status,
};

pub use price::{
    ActiveModel as PriceActiveModel, Column as PriceColumn, Entity as PriceEntity,
    Model as Price,
};
