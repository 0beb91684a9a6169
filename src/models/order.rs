use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{AppError, Result};
use crate::util::double_option;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Canceled,
}

impl PaymentStatus {
    /// `paid` and `canceled` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub payment_code: String,
    /// Null once the product has been deleted; the snapshot below survives.
    pub product_id: Option<String>,
    pub product_name: String,
    pub product_price_cents: i64,
    pub product_usage_days: i32,
    pub total_amount_cents: i64,
    pub customer_service: Option<String>,
    pub buyer_nickname: String,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_company: String,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    #[serde(skip_serializing)]
    pub payment_link: Option<String>,
    pub payment_link_issued_at: Option<i64>,
    pub payment_link_expires_at: Option<i64>,
    pub payment_link_used: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub product_id: String,
    /// Defaults to the product's price at creation time
    #[serde(default)]
    pub total_amount_cents: Option<i64>,
    #[serde(default)]
    pub customer_service: Option<String>,
    #[serde(default)]
    pub buyer_nickname: Option<String>,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_company: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub const DEFAULT_BUYER_NICKNAME: &str = "unknown";

impl CreateOrder {
    pub fn validate(&self) -> Result<()> {
        require_len("buyer_name", &self.buyer_name, 1, 8)?;
        require_len("buyer_phone", &self.buyer_phone, 1, 11)?;
        require_len("buyer_company", &self.buyer_company, 1, 50)?;
        if let Some(ref nickname) = self.buyer_nickname {
            require_len("buyer_nickname", nickname, 1, 20)?;
        }
        if let Some(ref cs) = self.customer_service {
            require_len("customer_service", cs, 0, 255)?;
        }
        if let Some(ref notes) = self.notes {
            require_len("notes", notes, 0, 3000)?;
        }
        if self.total_amount_cents.is_some_and(|amount| amount < 0) {
            return Err(AppError::BadRequest(
                "total_amount_cents cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

fn require_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::BadRequest(format!(
            "{} must be {}-{} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// Editable order details. Codes, status and link fields are not.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrder {
    #[serde(default, deserialize_with = "double_option")]
    pub customer_service: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateOrder {
    pub fn validate(&self) -> Result<()> {
        if let Some(Some(ref cs)) = self.customer_service {
            require_len("customer_service", cs, 0, 255)?;
        }
        if let Some(Some(ref notes)) = self.notes {
            require_len("notes", notes, 0, 3000)?;
        }
        Ok(())
    }
}

/// Link handed back to the admin after issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedLink {
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Buyer-facing view of an order reached through a payment link.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_number: String,
    pub payment_code: String,
    pub product_name: String,
    pub product_usage_days: i32,
    pub total_amount_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_link_expires_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            order_number: order.order_number,
            payment_code: order.payment_code,
            product_name: order.product_name,
            product_usage_days: order.product_usage_days,
            total_amount_cents: order.total_amount_cents,
            payment_status: order.payment_status,
            payment_link_expires_at: order.payment_link_expires_at,
            completed_at: order.completed_at,
        }
    }
}
