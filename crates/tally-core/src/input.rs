//! # Request Inputs
//!
//! Raw inputs as they arrive from a client, and the validated drafts the
//! service layer works with.
//!
//! ```text
//!   ProductInput ──validate──► ProductDraft ──► INSERT / UPDATE
//!   CustomerInput ─validate──► CustomerDraft ─► INSERT / UPDATE
//!   StockRequest ──validate──► StockEntry ────► ledger engine
//!   BalanceRequest ─validate─► BalanceEntry ──► ledger engine
//! ```
//!
//! Every `validate` collects all field errors at once and never looks at
//! stored state.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ValidationError, ValidationErrors};
use crate::money::Money;
use crate::types::{CustomerTransactionType, EntityStatus, InventoryTransactionType};
use crate::validation::{
    is_blank, parse_amount, parse_non_negative_integer, parse_non_negative_money,
    parse_quantity, sanitize_optional, validate_email, validate_phone, validate_required,
};

// =============================================================================
// Products
// =============================================================================

/// Product create/update body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    /// Explicit code. Generated when absent. Ignored on update.
    pub code: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub unit_cost: Option<Value>,
    pub selling_price: Option<Value>,
    pub critical_stock_level: Option<Value>,
    /// Opening stock. Only honoured on create.
    pub current_stock: Option<Value>,
    /// Only honoured on update.
    pub status: Option<String>,
}

/// A validated product body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub code: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub unit: String,
    pub unit_cost: Money,
    pub selling_price: Money,
    pub critical_stock_level: i64,
    pub opening_stock: i64,
    pub status: Option<EntityStatus>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<ProductDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.check(validate_required("name", self.name.as_deref()));
        let category = errors.check(validate_required("category", self.category.as_deref()));
        let unit = errors.check(validate_required("unit", self.unit.as_deref()));

        let unit_cost = money_or_zero(&mut errors, "unit_cost", self.unit_cost.as_ref());
        let selling_price = money_or_zero(&mut errors, "selling_price", self.selling_price.as_ref());
        let critical_stock_level = integer_or_zero(
            &mut errors,
            "critical_stock_level",
            self.critical_stock_level.as_ref(),
        );
        let opening_stock =
            integer_or_zero(&mut errors, "current_stock", self.current_stock.as_ref());
        let status = self
            .status
            .as_deref()
            .and_then(|s| errors.check(s.parse::<EntityStatus>()));

        errors.into_result()?;

        Ok(ProductDraft {
            code: sanitize_optional(self.code.as_deref()),
            name: name.unwrap_or_default(),
            brand: sanitize_optional(self.brand.as_deref()),
            category: category.unwrap_or_default(),
            unit: unit.unwrap_or_default(),
            unit_cost,
            selling_price,
            critical_stock_level,
            opening_stock,
            status,
        })
    }
}

// =============================================================================
// Customers
// =============================================================================

/// Customer create/update body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInput {
    /// Explicit code. Generated when absent. Ignored on update.
    pub code: Option<String>,
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    /// Owning sales rep (user id).
    pub sales_rep: Option<String>,
    pub payment_terms_limit: Option<Value>,
    pub balance_risk_limit: Option<Value>,
    /// Only honoured on update.
    pub status: Option<String>,
}

/// A validated customer body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDraft {
    pub code: Option<String>,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub sales_rep: Option<String>,
    pub payment_terms_limit: i64,
    pub balance_risk_limit: Money,
    pub status: Option<EntityStatus>,
}

impl CustomerInput {
    pub fn validate(&self) -> Result<CustomerDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.check(validate_required("name", self.name.as_deref()));

        let email = sanitize_optional(self.email.as_deref());
        if let Some(email) = &email {
            errors.check(validate_email(email));
        }

        let phone = sanitize_optional(self.phone.as_deref());
        if let Some(phone) = &phone {
            errors.check(validate_phone(phone));
        }

        let payment_terms_limit = integer_or_zero(
            &mut errors,
            "payment_terms_limit",
            self.payment_terms_limit.as_ref(),
        );
        let balance_risk_limit =
            money_or_zero(&mut errors, "balance_risk_limit", self.balance_risk_limit.as_ref());
        let status = self
            .status
            .as_deref()
            .and_then(|s| errors.check(s.parse::<EntityStatus>()));

        errors.into_result()?;

        Ok(CustomerDraft {
            code: sanitize_optional(self.code.as_deref()),
            name: name.unwrap_or_default(),
            contact_person: sanitize_optional(self.contact_person.as_deref()),
            email,
            phone,
            address: sanitize_optional(self.address.as_deref()),
            city: sanitize_optional(self.city.as_deref()),
            region: sanitize_optional(self.region.as_deref()),
            country: sanitize_optional(self.country.as_deref()),
            sales_rep: sanitize_optional(self.sales_rep.as_deref()),
            payment_terms_limit,
            balance_risk_limit,
            status,
        })
    }
}

// =============================================================================
// Ledger Requests
// =============================================================================

/// Body of a stock mutation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockRequest {
    pub transaction_type: Option<String>,
    pub quantity: Option<Value>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// A validated stock mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockEntry {
    pub transaction_type: InventoryTransactionType,
    /// Non-zero, sign as submitted.
    pub quantity: i64,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl StockRequest {
    pub fn validate(&self) -> Result<StockEntry, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let transaction_type = errors.check(required_type::<InventoryTransactionType>(
            self.transaction_type.as_deref(),
        ));
        let quantity = errors.check(parse_quantity(non_null(self.quantity.as_ref())));

        errors.into_result()?;

        match (transaction_type, quantity) {
            (Some(transaction_type), Some(quantity)) => Ok(StockEntry {
                transaction_type,
                quantity,
                reference_number: sanitize_optional(self.reference_number.as_deref()),
                notes: sanitize_optional(self.notes.as_deref()),
            }),
            _ => Err(ValidationError::required("transaction_type").into()),
        }
    }
}

/// Body of a balance mutation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceRequest {
    pub transaction_type: Option<String>,
    pub amount: Option<Value>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// A validated balance mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub transaction_type: CustomerTransactionType,
    /// Strictly positive.
    pub amount: Money,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl BalanceRequest {
    pub fn validate(&self) -> Result<BalanceEntry, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let transaction_type = errors.check(required_type::<CustomerTransactionType>(
            self.transaction_type.as_deref(),
        ));
        let amount = errors.check(parse_amount(non_null(self.amount.as_ref())));

        errors.into_result()?;

        match (transaction_type, amount) {
            (Some(transaction_type), Some(amount)) => Ok(BalanceEntry {
                transaction_type,
                amount,
                reference_number: sanitize_optional(self.reference_number.as_deref()),
                notes: sanitize_optional(self.notes.as_deref()),
            }),
            _ => Err(ValidationError::required("transaction_type").into()),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn required_type<T>(input: Option<&str>) -> Result<T, ValidationError>
where
    T: std::str::FromStr<Err = ValidationError>,
{
    match input.map(str::trim) {
        None | Some("") => Err(ValidationError::required("transaction_type")),
        Some(s) => s.parse(),
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn money_or_zero(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Money {
    if is_blank(value) {
        return Money::zero();
    }
    value
        .and_then(|v| errors.check(parse_non_negative_money(field, v)))
        .unwrap_or_default()
}

fn integer_or_zero(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> i64 {
    if is_blank(value) {
        return 0;
    }
    value
        .and_then(|v| errors.check(parse_non_negative_integer(field, v)))
        .unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
