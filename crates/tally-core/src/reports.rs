//! # Report Aggregation
//!
//! Pure aggregation over ledger rows already fetched by the query layer.
//! Nothing here holds state of its own; every figure is derived from
//! persisted transactions.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{
    CustomerTransaction, CustomerTransactionDetail, CustomerTransactionType,
    InventoryTransaction, InventoryTransactionDetail, InventoryTransactionType,
};

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive calendar-day range, interpreted in UTC.
///
/// `start` covers its whole day from midnight, `end` covers its whole day
/// through the last instant before the next midnight. Either side may be
/// open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    /// ## Errors
    /// `start > end` → [`ValidationError::InvalidFormat`] on `start_date`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ValidationError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ValidationError::invalid_format(
                    "start_date",
                    "must not be after end_date",
                ));
            }
        }
        Ok(DateRange { start, end })
    }

    /// Parses optional `YYYY-MM-DD` strings.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let start = parse_day("start_date", start)?;
        let end = parse_day("end_date", end)?;
        DateRange::new(start, end)
    }

    /// First instant included, if bounded.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.start.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// First instant NOT included (midnight after `end`), if bounded.
    pub fn ends_before(&self) -> Option<DateTime<Utc>> {
        self.end.map(|d| {
            d.checked_add_days(Days::new(1))
                .unwrap_or(NaiveDate::MAX)
                .and_time(NaiveTime::MIN)
                .and_utc()
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.starts_at().map_or(true, |s| at >= s) && self.ends_before().map_or(true, |e| at < e)
    }
}

fn parse_day(field: &str, input: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::invalid_format(field, "expected YYYY-MM-DD")),
    }
}

// =============================================================================
// Inventory Report
// =============================================================================

/// Totals of an inventory report.
///
/// Adjustments are counted as transactions but move neither total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_transactions: i64,
    pub total_stock_in: i64,
    pub total_stock_out: i64,
    /// `total_stock_in - total_stock_out`.
    pub net_change: i64,
}

impl InventorySummary {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a InventoryTransaction>,
    {
        let mut summary = InventorySummary::default();
        for tx in transactions {
            summary.total_transactions += 1;
            let magnitude = tx.quantity.saturating_abs();
            match tx.transaction_type {
                InventoryTransactionType::StockIn => {
                    summary.total_stock_in = summary.total_stock_in.saturating_add(magnitude)
                }
                InventoryTransactionType::StockOut => {
                    summary.total_stock_out = summary.total_stock_out.saturating_add(magnitude)
                }
                InventoryTransactionType::Adjustment => {}
            }
        }
        summary.net_change = summary.total_stock_in - summary.total_stock_out;
        summary
    }
}

/// Inventory transactions in a period, newest first, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryReport {
    pub transactions: Vec<InventoryTransactionDetail>,
    pub summary: InventorySummary,
}

impl InventoryReport {
    pub fn new(transactions: Vec<InventoryTransactionDetail>) -> Self {
        let summary = InventorySummary::from_transactions(transactions.iter().map(|d| &d.transaction));
        InventoryReport {
            transactions,
            summary,
        }
    }
}

// =============================================================================
// Customer Report
// =============================================================================

/// Totals of a customer report, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub total_transactions: i64,
    pub total_sales_cents: i64,
    pub total_payments_cents: i64,
    pub total_credit_notes_cents: i64,
    /// `sales - payments - credit notes`.
    pub net_outstanding_cents: i64,
}

impl CustomerSummary {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a CustomerTransaction>,
    {
        let mut sales = Money::zero();
        let mut payments = Money::zero();
        let mut credit_notes = Money::zero();
        let mut count = 0;

        for tx in transactions {
            count += 1;
            match tx.transaction_type {
                CustomerTransactionType::Sale => sales += tx.amount(),
                CustomerTransactionType::Payment => payments += tx.amount(),
                CustomerTransactionType::CreditNote => credit_notes += tx.amount(),
            }
        }

        CustomerSummary {
            total_transactions: count,
            total_sales_cents: sales.cents(),
            total_payments_cents: payments.cents(),
            total_credit_notes_cents: credit_notes.cents(),
            net_outstanding_cents: (sales - payments - credit_notes).cents(),
        }
    }
}

/// Customer transactions in a period, newest first, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerReport {
    pub transactions: Vec<CustomerTransactionDetail>,
    pub summary: CustomerSummary,
}

impl CustomerReport {
    pub fn new(transactions: Vec<CustomerTransactionDetail>) -> Self {
        let summary = CustomerSummary::from_transactions(transactions.iter().map(|d| &d.transaction));
        CustomerReport {
            transactions,
            summary,
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetrics {
    pub total: i64,
    pub active: i64,
    pub low_stock: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetrics {
    pub total: i64,
    pub active: i64,
    pub at_risk: i64,
    pub total_outstanding_cents: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMetrics {
    /// Σ current_stock × unit_cost over active products.
    pub total_value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub inventory_transactions: Vec<InventoryTransactionDetail>,
    pub customer_transactions: Vec<CustomerTransactionDetail>,
}

/// Landing-page figures. Customer figures are scoped for sales reps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub products: ProductMetrics,
    pub customers: CustomerMetrics,
    pub inventory: InventoryMetrics,
    pub recent_activity: RecentActivity,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inv(kind: InventoryTransactionType, quantity: i64) -> InventoryTransaction {
        InventoryTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: "p1".to_string(),
            transaction_type: kind,
            quantity,
            transaction_date: Utc::now(),
            reference_number: None,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn cust(kind: CustomerTransactionType, cents: i64) -> CustomerTransaction {
        CustomerTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: "c1".to_string(),
            transaction_type: kind,
            amount_cents: cents,
            transaction_date: Utc::now(),
            reference_number: None,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_inventory_summary() {
        use InventoryTransactionType::*;
        let txs = vec![inv(StockIn, 100), inv(StockOut, -30), inv(Adjustment, 10), inv(StockIn, 5)];
        let summary = InventorySummary::from_transactions(&txs);
        assert_eq!(
            summary,
            InventorySummary {
                total_transactions: 4,
                total_stock_in: 105,
                total_stock_out: 30,
                net_change: 75,
            }
        );
    }

    #[test]
    fn test_customer_summary() {
        use CustomerTransactionType::*;
        let txs = vec![
            cust(Sale, 20000),
            cust(Payment, 5000),
            cust(CreditNote, 2000),
            cust(Payment, 50000),
        ];
        let summary = CustomerSummary::from_transactions(&txs);
        assert_eq!(summary.total_transactions, 4);
        assert_eq!(summary.total_sales_cents, 20000);
        assert_eq!(summary.total_payments_cents, 55000);
        assert_eq!(summary.total_credit_notes_cents, 2000);
        assert_eq!(summary.net_outstanding_cents, -37000);
    }

    #[test]
    fn test_date_range_is_inclusive_of_whole_days() {
        let range = DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap();

        let first = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();

        assert!(range.contains(first));
        assert!(range.contains(last));
        assert!(!range.contains(after));
        assert!(!range.contains(before));
        assert_eq!(range.ends_before(), Some(after));
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::parse(Some("2024-04-01"), Some("2024-03-01")).is_err());
        assert!(DateRange::parse(Some("03/01/2024"), None).is_err());

        let open = DateRange::parse(None, Some("")).unwrap();
        assert_eq!(open.starts_at(), None);
        assert_eq!(open.ends_before(), None);
        assert!(open.contains(Utc::now()));
    }
}
