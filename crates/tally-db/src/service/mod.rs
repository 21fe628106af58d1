//! # Service Layer
//!
//! Every externally reachable operation, composed the same way:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Operation Pipeline                                   │
//! │                                                                         │
//! │  RequestContext { user, client_ip }                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. has_permission(role, permission)     ✗ → Forbidden                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. load row                             ✗ → NotFound                  │
//! │     can_access_customer (customers only) ✗ → Forbidden                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. validate input                       ✗ → Validation                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. mutate (repository or LedgerEngine)  ✗ → InsufficientStock,        │
//! │       │                                      DuplicateCode, Inactive    │
//! │       ▼                                                                 │
//! │  5. audit (best effort, never fails the operation)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::warn;

use crate::audit::{AuditEvent, AuditRecorder};
use crate::pool::Database;
use tally_core::permissions::{has_permission, Permission};
use tally_core::{EntityStatus, User, ValidationError};

pub mod audit_log;
pub mod customers;
pub mod error;
pub mod products;
pub mod reports;

pub use audit_log::AuditLogService;
pub use customers::CustomerService;
pub use error::{ServiceError, ServiceResult};
pub use products::ProductService;
pub use reports::ReportService;

/// Who is calling, and from where.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
    pub client_ip: String,
}

impl RequestContext {
    pub fn new(user: User, client_ip: impl Into<String>) -> Self {
        RequestContext {
            user,
            client_ip: client_ip.into(),
        }
    }

    /// Fails with `Forbidden` unless the caller's role holds `permission`.
    pub fn require(&self, permission: Permission) -> ServiceResult<()> {
        if has_permission(self.user.role, permission) {
            return Ok(());
        }

        warn!(
            user_id = %self.user.id,
            role = %self.user.role,
            permission = %permission,
            "Permission denied"
        );
        Err(ServiceError::Forbidden)
    }
}

/// Entry point to every service.
///
/// ## Usage
/// ```rust,ignore
/// let services = Services::new(db.clone(), AuditRecorder::new(db.audit_logs(), AuditMode::Background));
///
/// let movement = services.products().adjust_stock(&ctx, &product_id, &request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Services {
    db: Database,
    audit: AuditRecorder,
}

impl Services {
    pub fn new(db: Database, audit: AuditRecorder) -> Self {
        Services { db, audit }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn audit_recorder(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn products(&self) -> ProductService<'_> {
        ProductService::new(self)
    }

    pub fn customers(&self) -> CustomerService<'_> {
        CustomerService::new(self)
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(self)
    }

    pub fn audit_log(&self) -> AuditLogService<'_> {
        AuditLogService::new(self)
    }

    /// Records an audit event attributed to the caller.
    pub(crate) async fn record(&self, ctx: &RequestContext, event: AuditEvent) {
        self.audit
            .record(event.by(&ctx.user.id).from_ip(&ctx.client_ip))
            .await;
    }
}

/// Resolves a list `status` filter.
///
/// Absent means active only, `"all"` means any status.
pub(crate) fn status_filter(raw: Option<&str>) -> ServiceResult<Option<EntityStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Some(EntityStatus::Active)),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s
            .parse::<EntityStatus>()
            .map(Some)
            .map_err(|_| {
                ServiceError::invalid(ValidationError::NotAllowed {
                    field: "status".to_string(),
                    allowed: vec![
                        "active".to_string(),
                        "inactive".to_string(),
                        "all".to_string(),
                    ],
                })
            }),
    }
}
