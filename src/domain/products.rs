//! Catalog records and the fields accepted when creating one.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Records returned for one listing page.
pub const PAGE_SIZE: u32 = 8;

pub const MIN_PRICE: u32 = 50;
pub const MAX_PRICE: u32 = 1_049;

const MAX_NAME_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 2_000;

/// One item of a listing page.
///
/// `id` is unique within the page it was returned in and increases in
/// construction order; it is not a global identity across pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProductRecord {
    pub id: u32,
    pub name: String,
    pub price: u32,
    pub description: String,
}

/// Fields submitted when creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: u32,
    #[serde(default)]
    pub description: String,
}

impl NewProduct {
    /// Trim the free-text fields and enforce the write-side invariants.
    pub fn validated(self) -> Result<Self, DomainError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(DomainError::validation(format!(
                "product name must be at most {MAX_NAME_CHARS} characters"
            )));
        }
        if self.price == 0 {
            return Err(DomainError::validation(
                "product price must be greater than zero",
            ));
        }

        let description = self.description.trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(DomainError::validation(format!(
                "product description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        Ok(Self {
            name,
            price: self.price,
            description,
        })
    }
}
