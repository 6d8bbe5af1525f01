use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::utils::error::AppError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_ITEM_NAME_CHARS: usize = 255;
/// Upper bound for a single expense; keeps cent rounding exact and finite.
pub const MAX_AMOUNT: f64 = 999_999_999_999.99;

/// Gasto registrado por um usuário
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Expense {
    pub id: String,

    pub item_name: String,

    /// Currency amount, two decimal places
    pub amount: f64,

    #[schema(value_type = String, format = Date, example = "2024-01-15")]
    pub date: NaiveDate,

    /// Owner (User.user_id)
    pub user_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new expense; the owner comes from the session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub item_name: String,
    pub amount: f64,
    pub date: NaiveDate,
}

/// POST /expenses body.
///
/// `amount` and `date` are kept loose so a wrong type becomes a field
/// error (422) instead of a body parse failure.
#[derive(Debug, Default, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateExpenseRequest {
    #[validate(
        required(message = "The item name field is required."),
        custom(function = "validate_item_name")
    )]
    #[schema(example = "Coffee")]
    pub item_name: Option<String>,

    #[validate(
        required(message = "The amount field is required."),
        custom(function = "validate_amount")
    )]
    #[schema(value_type = f64, example = 4.5)]
    pub amount: Option<serde_json::Value>,

    #[validate(
        required(message = "The date field is required."),
        custom(function = "validate_date")
    )]
    #[schema(value_type = String, format = Date, example = "2024-01-15")]
    pub date: Option<serde_json::Value>,
}

impl CreateExpenseRequest {
    /// Runs the validation rules and produces the typed payload.
    pub fn into_new_expense(self) -> Result<NewExpense, AppError> {
        self.validate()?;

        let item_name = self
            .item_name
            .map(|name| name.trim().to_string())
            .ok_or_else(|| AppError::invalid_field("item_name", "The item name field is required."))?;
        let amount = self
            .amount
            .as_ref()
            .and_then(parse_amount)
            .ok_or_else(|| AppError::invalid_field("amount", "The amount field must be a number."))?;
        let date = self
            .date
            .as_ref()
            .and_then(parse_date)
            .ok_or_else(|| AppError::invalid_field("date", "The date field must be a valid date."))?;

        let amount = round_cents(amount);
        if !amount.is_finite() || !(0.0..=MAX_AMOUNT).contains(&amount) {
            return Err(AppError::invalid_field(
                "amount",
                "The amount field must not be greater than 999999999999.99.",
            ));
        }

        Ok(NewExpense {
            item_name,
            amount,
            date,
        })
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_item_name(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(field_error("required", "The item name field is required."));
    }
    if trimmed.chars().count() > MAX_ITEM_NAME_CHARS {
        return Err(field_error(
            "length",
            "The item name field must not be greater than 255 characters.",
        ));
    }
    Ok(())
}

fn validate_amount(value: &serde_json::Value) -> Result<(), ValidationError> {
    match parse_amount(value) {
        None => Err(field_error("numeric", "The amount field must be a number.")),
        Some(amount) if amount < 0.0 => Err(field_error(
            "min",
            "The amount field must be at least 0.",
        )),
        Some(amount) if amount > MAX_AMOUNT => Err(field_error(
            "max",
            "The amount field must not be greater than 999999999999.99.",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_date(value: &serde_json::Value) -> Result<(), ValidationError> {
    parse_date(value)
        .map(|_| ())
        .ok_or_else(|| field_error("date", "The date field must be a valid date."))
}

/// Accepts a JSON number or a numeric string ("4.50").
pub fn parse_amount(value: &serde_json::Value) -> Option<f64> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

pub fn parse_date(value: &serde_json::Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
