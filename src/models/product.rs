use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::util::double_option;

/// Price bounds in cents (0.01 to 99999.99).
pub const MIN_PRICE_CENTS: i64 = 1;
pub const MAX_PRICE_CENTS: i64 = 9_999_999;

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 30;
const NOTES_MAX_CHARS: usize = 9999;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    /// Days of access a purchase grants
    pub usage_days: i32,
    /// Shareable checksummed code, assigned once at creation
    pub url_code: String,
    pub is_active: bool,
    pub purchase_count: i64,
    pub view_count: i64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub usage_days: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_price(self.price_cents)?;
        validate_usage_days(self.usage_days)?;
        validate_notes(self.notes.as_deref())
    }
}

/// Partial update. `url_code` and the counters are deliberately absent.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub usage_days: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price_cents {
            validate_price(price)?;
        }
        if let Some(days) = self.usage_days {
            validate_usage_days(days)?;
        }
        if let Some(ref notes) = self.notes {
            validate_notes(notes.as_deref())?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "Product name must be {}-{} characters",
            NAME_MIN_CHARS, NAME_MAX_CHARS
        )));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<()> {
    if !(MIN_PRICE_CENTS..=MAX_PRICE_CENTS).contains(&price_cents) {
        return Err(AppError::BadRequest(
            "Product price must be between 0.01 and 99999.99".into(),
        ));
    }
    Ok(())
}

fn validate_usage_days(days: i32) -> Result<()> {
    if days < 0 {
        return Err(AppError::BadRequest("usage_days cannot be negative".into()));
    }
    Ok(())
}

fn validate_notes(notes: Option<&str>) -> Result<()> {
    if notes.is_some_and(|n| n.chars().count() > NOTES_MAX_CHARS) {
        return Err(AppError::BadRequest(format!(
            "Product notes cannot exceed {} characters",
            NOTES_MAX_CHARS
        )));
    }
    Ok(())
}

/// What the public product page exposes.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProduct {
    pub url_code: String,
    pub name: String,
    pub price_cents: i64,
    pub usage_days: i32,
}

impl From<Product> for PublicProduct {
    fn from(product: Product) -> Self {
        Self {
            url_code: product.url_code,
            name: product.name,
            price_cents: product.price_cents,
            usage_days: product.usage_days,
        }
    }
}
