//! Submitted form payloads
//!
//! Each form validates what it can see on its own (`clean`); checks that
//! need the database (uniqueness, ownership of referenced rows, volume
//! numbers) run in the repository.

use crate::db::models::{BookStatus, Category, Currency, PriceSource};
use crate::errors::{FormErrors, Result};
use crate::validation::isbn13_field;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const REQUIRED: &str = "This field is required.";

/// Field-level validator errors as a mutable collection
fn field_errors<T: Validate>(form: &T) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(e) => e.into(),
    }
}

fn require_text(errors: &mut FormErrors, field: &str, value: &str) {
    if value.trim().is_empty() && !errors.has(field) {
        errors.add(field, REQUIRED);
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

impl RegisterForm {
    pub fn clean(&self) -> Result<()> {
        let mut errors = field_errors(self);
        require_text(&mut errors, "username", &self.username);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ProfileForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

impl ProfileForm {
    pub fn clean(&self) -> Result<()> {
        field_errors(self).into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct AuthorForm {
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub name: String,

    pub date_of_birth: Option<NaiveDate>,

    pub date_of_death: Option<NaiveDate>,

    #[validate(length(max = 2000))]
    pub summary: Option<String>,
}

impl AuthorForm {
    pub fn clean(&self) -> Result<()> {
        let mut errors = field_errors(self);
        require_text(&mut errors, "name", &self.name);
        if let (Some(born), Some(died)) = (self.date_of_birth, self.date_of_death) {
            if died < born {
                errors.add("date_of_death", "Date of death cannot be before date of birth.");
            }
        }
        errors.into_result()
    }
}

/// Form shared by publishers and collections
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct DescribedForm {
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub name: String,

    #[validate(length(max = 500, message = "Ensure this value has at most 500 characters."))]
    pub description: Option<String>,
}

impl DescribedForm {
    pub fn clean(&self) -> Result<()> {
        let mut errors = field_errors(self);
        require_text(&mut errors, "name", &self.name);
        errors.into_result()
    }
}

/// Form shared by genres and sections
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct NameForm {
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub name: String,
}

impl NameForm {
    pub fn clean(&self) -> Result<()> {
        let mut errors = field_errors(self);
        require_text(&mut errors, "name", &self.name);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct BookForm {
    #[serde(default)]
    #[validate(custom(function = "isbn13_field"))]
    pub isbn: String,

    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub title: String,

    pub author_id: Option<Uuid>,

    pub publisher_id: Option<Uuid>,

    pub genre_id: Option<Uuid>,

    pub collection_id: Option<Uuid>,

    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub volume_number: Option<i32>,

    pub section_id: Option<Uuid>,

    #[validate(range(min = 0, max = 9999, message = "Enter a valid year."))]
    pub copyright_year: Option<i32>,

    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub edition: Option<i32>,

    #[serde(default)]
    pub category: Category,

    #[validate(length(max = 7, message = "Ensure this value has at most 7 characters."))]
    pub language: Option<String>,

    #[validate(length(max = 500, message = "Ensure this value has at most 500 characters."))]
    pub comments: Option<String>,
}

impl BookForm {
    pub fn clean(&self) -> Result<()> {
        let mut errors = field_errors(self);
        require_text(&mut errors, "title", &self.title);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RatingForm {
    #[validate(range(min = 0, max = 5, message = "Requires a number between 0 and 5."))]
    pub rating: i32,
}

impl RatingForm {
    pub fn clean(&self) -> Result<()> {
        field_errors(self).into_result()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusForm {
    pub status: BookStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PriceForm {
    #[serde(default)]
    pub currency: Currency,

    #[serde(default)]
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub purchase_price_cents: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub sale_price_cents: i64,

    pub purchase_date: Option<NaiveDate>,

    #[serde(default)]
    pub source: PriceSource,
}

impl PriceForm {
    pub fn clean(&self) -> Result<()> {
        field_errors(self).into_result()
    }
}

/// Book selection for a collection or section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MembershipForm {
    #[serde(default)]
    pub books: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn book(isbn: &str, title: &str) -> BookForm {
        BookForm {
            isbn: isbn.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_book_form_isbn_errors() {
        assert!(book("9780306406157", "Dune").clean().is_ok());

        let err = book("9780306406158", "Dune").clean().unwrap_err();
        let fields = err.form_errors().unwrap();
        assert_eq!(fields.messages("isbn"), ["Invalid ISBN-13 checksum."]);

        let err = book("", "Dune").clean().unwrap_err();
        assert_eq!(
            err.form_errors().unwrap().messages("isbn"),
            ["Invalid ISBN-13 format."]
        );
    }

    #[test]
    fn test_book_form_isbn_runs_through_derive() {
        let errors = book("978030640615", "Dune").validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields["isbn"][0].code, "invalid_format");
    }

    #[test]
    fn test_book_form_requires_title() {
        let err = book("9780306406157", "   ").clean().unwrap_err();
        assert!(err.form_errors().unwrap().has("title"));
    }

    #[test]
    fn test_book_form_volume_must_be_positive() {
        let mut form = book("9780306406157", "Dune");
        form.volume_number = Some(0);
        let err = form.clean().unwrap_err();
        assert!(err.form_errors().unwrap().has("volume_number"));
    }

    #[test]
    fn test_author_dates_ordered() {
        let form = AuthorForm {
            name: "Ursula K. Le Guin".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1929, 10, 21),
            date_of_death: NaiveDate::from_ymd_opt(1920, 1, 22),
            summary: None,
        };
        let err = form.clean().unwrap_err();
        assert!(err.form_errors().unwrap().has("date_of_death"));
    }

    #[test]
    fn test_rating_range() {
        assert!(RatingForm { rating: 5 }.clean().is_ok());
        assert!(RatingForm { rating: 0 }.clean().is_ok());
        assert!(matches!(
            RatingForm { rating: 6 }.clean(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = NameForm { name: String::new() }.clean().unwrap_err();
        assert_eq!(err.form_errors().unwrap().messages("name"), [REQUIRED]);
    }

    #[test]
    fn test_register_email() {
        let form = RegisterForm {
            username: "reader".to_string(),
            email: "not-an-email".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        assert!(form.clean().unwrap_err().form_errors().unwrap().has("email"));
    }

    #[test]
    fn test_price_defaults_from_json() {
        let form: PriceForm = serde_json::from_str("{}").unwrap();
        assert_eq!(form.currency, Currency::Eur);
        assert_eq!(form.source, PriceSource::Purchase);
        assert_eq!(form.purchase_price_cents, 0);
    }
}
