//! Closed value sets stored as text columns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_choice {
    (
        $(#[$meta:meta])*
        $name:ident, $default:ident {
            $($variant:ident => $text:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored column value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Human readable label
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("Select a valid choice. {} is not one of the available choices.", other)),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                s.parse().unwrap_or_default()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

string_choice! {
    /// Per-user ownership status of a book
    BookStatus, Available {
        Wish => "wish", "Wish";
        ToRead => "to-read", "To read";
        Available => "available", "Available";
        Reserved => "reserved", "Reserved";
        Loaned => "loaned", "Loaned";
        ForSale => "for-sale", "For sale";
        Sold => "sold", "Sold";
        NotFound => "not-found", "Not found";
    }
}

string_choice! {
    Category, Fiction {
        Fiction => "fiction", "Fiction";
        NonFiction => "non-fiction", "Non-fiction";
    }
}

string_choice! {
    Currency, Eur {
        Usd => "USD", "US Dollar";
        Eur => "EUR", "Euro";
        Gbp => "GBP", "British Pound";
        Jpy => "JPY", "Japanese Yen";
        Aud => "AUD", "Australian Dollar";
        Cad => "CAD", "Canadian Dollar";
        Chf => "CHF", "Swiss Franc";
        Cny => "CNY", "Chinese Yuan";
        Sek => "SEK", "Swedish Krona";
        Nzd => "NZD", "New Zealand Dollar";
    }
}

string_choice! {
    /// Whether a price was paid or only looked up
    PriceSource, Purchase {
        Purchase => "purchase", "Purchase";
        Reference => "reference", "Reference";
    }
}
