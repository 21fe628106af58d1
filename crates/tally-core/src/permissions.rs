//! # Permission Engine
//!
//! A static role → capability table plus the single row-level ownership
//! rule of the system.
//!
//! ## Access Check Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  request(user, permission, customer?)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  has_permission(role, permission) ── false ──► Forbidden               │
//! │       │ true                                                            │
//! │       ▼                                                                 │
//! │  customer-scoped?  ── no ──► proceed                                   │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  can_access_customer(role, user_id, customer) ── false ──► Forbidden   │
//! │       │ true                                                            │
//! │       ▼                                                                 │
//! │  proceed (read or mutate)                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Table
//! ```text
//!                       admin  manager  sales_rep  viewer
//! product:create          ✓       ✓
//! product:read            ✓       ✓         ✓        ✓
//! product:update          ✓       ✓
//! product:delete          ✓
//! product:stock:adjust    ✓       ✓
//! customer:create         ✓       ✓         ✓
//! customer:read           ✓       ✓         ✓        ✓
//! customer:update         ✓       ✓         ✓
//! customer:delete         ✓
//! customer:transaction    ✓       ✓         ✓
//! report:view             ✓       ✓         ✓        ✓
//! report:export           ✓       ✓
//! audit:view              ✓
//! ```
//! Roles do not inherit from each other; every cell above is spelled out in
//! [`has_permission`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{Customer, Role};

// =============================================================================
// Permission
// =============================================================================

/// A capability that can be granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Permission {
    #[serde(rename = "product:create")]
    ProductCreate,
    #[serde(rename = "product:read")]
    ProductRead,
    #[serde(rename = "product:update")]
    ProductUpdate,
    #[serde(rename = "product:delete")]
    ProductDelete,
    #[serde(rename = "product:stock:adjust")]
    ProductStockAdjust,
    #[serde(rename = "customer:create")]
    CustomerCreate,
    #[serde(rename = "customer:read")]
    CustomerRead,
    #[serde(rename = "customer:update")]
    CustomerUpdate,
    #[serde(rename = "customer:delete")]
    CustomerDelete,
    #[serde(rename = "customer:transaction")]
    CustomerTransaction,
    #[serde(rename = "report:view")]
    ReportView,
    #[serde(rename = "report:export")]
    ReportExport,
    #[serde(rename = "audit:view")]
    AuditView,
}

impl Permission {
    /// Every permission, in table order.
    pub const ALL: &'static [Permission] = &[
        Permission::ProductCreate,
        Permission::ProductRead,
        Permission::ProductUpdate,
        Permission::ProductDelete,
        Permission::ProductStockAdjust,
        Permission::CustomerCreate,
        Permission::CustomerRead,
        Permission::CustomerUpdate,
        Permission::CustomerDelete,
        Permission::CustomerTransaction,
        Permission::ReportView,
        Permission::ReportExport,
        Permission::AuditView,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::ProductCreate => "product:create",
            Permission::ProductRead => "product:read",
            Permission::ProductUpdate => "product:update",
            Permission::ProductDelete => "product:delete",
            Permission::ProductStockAdjust => "product:stock:adjust",
            Permission::CustomerCreate => "customer:create",
            Permission::CustomerRead => "customer:read",
            Permission::CustomerUpdate => "customer:update",
            Permission::CustomerDelete => "customer:delete",
            Permission::CustomerTransaction => "customer:transaction",
            Permission::ReportView => "report:view",
            Permission::ReportExport => "report:export",
            Permission::AuditView => "audit:view",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "permission".to_string(),
                allowed: Permission::ALL.iter().map(|p| p.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Role → Permission Table
// =============================================================================

/// Returns whether `role` holds `permission`.
///
/// Pure lookup: no allocation, no failure mode.
///
/// ## Example
/// ```rust
/// use tally_core::permissions::{has_permission, Permission};
/// use tally_core::Role;
///
/// assert!(has_permission(Role::SalesRep, Permission::CustomerTransaction));
/// assert!(!has_permission(Role::SalesRep, Permission::ProductStockAdjust));
/// assert!(!has_permission(Role::Manager, Permission::AuditView));
/// ```
pub const fn has_permission(role: Role, permission: Permission) -> bool {
    use Permission::*;

    match role {
        Role::Admin => true,
        Role::Manager => !matches!(permission, ProductDelete | CustomerDelete | AuditView),
        Role::SalesRep => matches!(
            permission,
            ProductRead
                | CustomerCreate
                | CustomerRead
                | CustomerUpdate
                | CustomerTransaction
                | ReportView
        ),
        Role::Viewer => matches!(permission, ProductRead | CustomerRead | ReportView),
    }
}

/// String form of [`has_permission`] for untyped callers.
///
/// Unknown roles and unknown permissions are simply `false`.
pub fn has_permission_str(role: &str, permission: &str) -> bool {
    match (role.parse::<Role>(), permission.parse::<Permission>()) {
        (Ok(role), Ok(permission)) => has_permission(role, permission),
        _ => false,
    }
}

/// All permissions a role holds, in table order.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    Permission::ALL
        .iter()
        .copied()
        .filter(|p| has_permission(role, *p))
        .collect()
}

// =============================================================================
// Row-Level Ownership
// =============================================================================

/// Row-level check for customer-scoped operations.
///
/// Admin, manager and viewer pass unconditionally (viewers are still
/// stopped from mutating by [`has_permission`]). A sales rep passes only
/// for customers whose owning rep is the caller.
///
/// Must be evaluated after [`has_permission`] and before any
/// customer-scoped read or mutation.
pub fn can_access_customer(role: Role, user_id: &str, customer: &Customer) -> bool {
    can_access_owned_by(role, user_id, customer.sales_rep.as_deref())
}

/// [`can_access_customer`] over just the owning-rep reference.
pub fn can_access_owned_by(role: Role, user_id: &str, sales_rep: Option<&str>) -> bool {
    match role {
        Role::Admin | Role::Manager | Role::Viewer => true,
        Role::SalesRep => sales_rep == Some(user_id),
    }
}

/// Whether list and report queries must be narrowed to the caller's own
/// customers. Returns the owning-rep id to filter on.
///
/// This is the query-side twin of [`can_access_customer`]: the filter goes
/// into the SQL `WHERE` clause instead of post-filtering rows.
pub fn customer_scope(role: Role, user_id: &str) -> Option<&str> {
    match role {
        Role::SalesRep => Some(user_id),
        Role::Admin | Role::Manager | Role::Viewer => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityStatus;
    use chrono::Utc;

    fn customer_owned_by(rep: Option<&str>) -> Customer {
        Customer {
            id: "c1".to_string(),
            code: "CUS000001".to_string(),
            name: "Acme".to_string(),
            contact_person: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            region: None,
            country: None,
            sales_rep: rep.map(str::to_string),
            payment_terms_limit: 30,
            balance_risk_limit_cents: 0,
            current_balance_cents: 0,
            status: EntityStatus::Active,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_holds_everything() {
        assert_eq!(permissions_for(Role::Admin).len(), Permission::ALL.len());
    }

    #[test]
    fn test_manager_table() {
        let denied: Vec<_> = Permission::ALL
            .iter()
            .filter(|p| !has_permission(Role::Manager, **p))
            .map(|p| p.as_str())
            .collect();
        assert_eq!(denied, vec!["product:delete", "customer:delete", "audit:view"]);
    }

    #[test]
    fn test_sales_rep_table() {
        let granted: Vec<_> = permissions_for(Role::SalesRep)
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(
            granted,
            vec![
                "product:read",
                "customer:create",
                "customer:read",
                "customer:update",
                "customer:transaction",
                "report:view",
            ]
        );
    }

    #[test]
    fn test_viewer_table() {
        let granted: Vec<_> = permissions_for(Role::Viewer)
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(granted, vec!["product:read", "customer:read", "report:view"]);
    }

    #[test]
    fn test_unknown_role_or_permission_is_denied() {
        assert!(has_permission_str("admin", "product:delete"));
        assert!(!has_permission_str("superuser", "product:read"));
        assert!(!has_permission_str("admin", "product:explode"));
    }

    #[test]
    fn test_permission_strings_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), *p);
            assert_eq!(
                serde_json::to_string(p).unwrap(),
                format!("\"{}\"", p.as_str())
            );
        }
    }

    #[test]
    fn test_row_level_check() {
        let mine = customer_owned_by(Some("rep-1"));
        let theirs = customer_owned_by(Some("rep-2"));
        let unowned = customer_owned_by(None);

        assert!(can_access_customer(Role::SalesRep, "rep-1", &mine));
        assert!(!can_access_customer(Role::SalesRep, "rep-1", &theirs));
        assert!(!can_access_customer(Role::SalesRep, "rep-1", &unowned));

        for role in [Role::Admin, Role::Manager, Role::Viewer] {
            assert!(can_access_customer(role, "anyone", &theirs));
            assert!(can_access_customer(role, "anyone", &unowned));
        }
    }

    #[test]
    fn test_customer_scope() {
        assert_eq!(customer_scope(Role::SalesRep, "rep-1"), Some("rep-1"));
        assert_eq!(customer_scope(Role::Manager, "m-1"), None);
    }
}
