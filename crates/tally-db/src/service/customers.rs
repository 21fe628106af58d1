//! Customer operations: CRUD with row-level ownership, balance movements
//! and history.
//!
//! Every customer-scoped read or write runs `can_access_customer` after the
//! role check. List queries push the same rule into SQL through
//! `customer_scope`.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::{status_filter, RequestContext, ServiceError, ServiceResult, Services};
use crate::audit::AuditEvent;
use crate::ledger::LedgerError;
use crate::repository::customer::generate_customer_id;
use crate::repository::CustomerFilter;
use tally_core::codes::{generate_code, CUSTOMER_CODE_PREFIX};
use tally_core::input::{BalanceRequest, CustomerInput};
use tally_core::permissions::{can_access_customer, customer_scope, Permission};
use tally_core::{
    AuditAction, AuditEntityType, BalanceMovement, Customer, CustomerTransaction,
    CustomerWithHistory, Page, PageRequest, Role, ValidationError, RECENT_TRANSACTIONS_LIMIT,
};

const MAX_CODE_ATTEMPTS: u32 = 3;

/// Query-string filters for customer listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    /// `active` (default), `inactive` or `all`.
    pub status: Option<String>,
}

pub struct CustomerService<'a> {
    services: &'a Services,
}

impl<'a> CustomerService<'a> {
    pub(crate) fn new(services: &'a Services) -> Self {
        CustomerService { services }
    }

    /// Creates a customer. A sales rep always becomes the owning rep.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: &CustomerInput,
    ) -> ServiceResult<Customer> {
        ctx.require(Permission::CustomerCreate)?;
        let draft = input.validate()?;

        let sales_rep = match ctx.user.role {
            Role::SalesRep => Some(ctx.user.id.clone()),
            _ => self.known_rep(draft.sales_rep.clone()).await?,
        };

        let now = Utc::now();
        let mut customer = Customer {
            id: generate_customer_id(),
            code: draft
                .code
                .clone()
                .unwrap_or_else(|| generate_code(CUSTOMER_CODE_PREFIX)),
            name: draft.name,
            contact_person: draft.contact_person,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            city: draft.city,
            region: draft.region,
            country: draft.country,
            sales_rep,
            payment_terms_limit: draft.payment_terms_limit,
            balance_risk_limit_cents: draft.balance_risk_limit.cents(),
            current_balance_cents: 0,
            status: draft.status.unwrap_or_default(),
            created_by: Some(ctx.user.id.clone()),
            created_at: now,
            updated_at: now,
        };

        let mut attempts = 0;
        let customer = loop {
            attempts += 1;
            match self
                .services
                .db()
                .ledger()
                .create_customer(customer.clone())
                .await
            {
                Ok(created) => break created,
                Err(LedgerError::Database(e)) => {
                    match ServiceError::from_insert(e, "customers.code", "Customer") {
                        ServiceError::DuplicateCode { .. }
                            if draft.code.is_none() && attempts < MAX_CODE_ATTEMPTS =>
                        {
                            customer.code = generate_code(CUSTOMER_CODE_PREFIX);
                        }
                        other => return Err(other),
                    }
                }
                Err(other) => return Err(other.into()),
            }
        };

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Create,
                    AuditEntityType::Customer,
                    &customer.id,
                    None,
                    Some(&customer),
                ),
            )
            .await;

        Ok(customer)
    }

    /// A customer with its most recent balance movements.
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> ServiceResult<CustomerWithHistory> {
        ctx.require(Permission::CustomerRead)?;
        let customer = self.load_accessible(ctx, id).await?;

        let recent_transactions = self
            .services
            .db()
            .customer_transactions()
            .recent_for_customer(id, RECENT_TRANSACTIONS_LIMIT)
            .await?;

        Ok(CustomerWithHistory {
            customer,
            recent_transactions,
        })
    }

    /// Lists customers. Sales reps only ever see their own.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        query: &CustomerQuery,
        page: &PageRequest,
    ) -> ServiceResult<Page<Customer>> {
        ctx.require(Permission::CustomerRead)?;

        let filter = CustomerFilter {
            search: query.search.clone(),
            status: status_filter(query.status.as_deref())?,
            sales_rep: customer_scope(ctx.user.role, &ctx.user.id).map(str::to_string),
        };

        let (items, total) = self.services.db().customers().list(&filter, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Replaces a customer's fields. A sales rep cannot hand the customer
    /// to another rep.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        input: &CustomerInput,
    ) -> ServiceResult<Customer> {
        ctx.require(Permission::CustomerUpdate)?;
        let draft = input.validate()?;
        let old = self.load_accessible(ctx, id).await?;

        let sales_rep = match ctx.user.role {
            Role::SalesRep => match draft.sales_rep.as_deref() {
                Some(rep) if rep != ctx.user.id => {
                    warn!(
                        customer_id = %id,
                        user_id = %ctx.user.id,
                        "Sales rep attempted to reassign customer"
                    );
                    return Err(ServiceError::Forbidden);
                }
                _ => Some(ctx.user.id.clone()),
            },
            _ => self.known_rep(draft.sales_rep.clone()).await?,
        };

        let changed = Customer {
            name: draft.name,
            contact_person: draft.contact_person,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            city: draft.city,
            region: draft.region,
            country: draft.country,
            sales_rep,
            payment_terms_limit: draft.payment_terms_limit,
            balance_risk_limit_cents: draft.balance_risk_limit.cents(),
            status: draft.status.unwrap_or(old.status),
            ..old.clone()
        };

        let updated = self.services.db().customers().update(&changed).await?;

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Update,
                    AuditEntityType::Customer,
                    id,
                    Some(&old),
                    Some(&updated),
                ),
            )
            .await;

        Ok(updated)
    }

    /// Soft delete.
    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> ServiceResult<Customer> {
        ctx.require(Permission::CustomerDelete)?;
        let old = self.load_accessible(ctx, id).await?;

        let deleted = self.services.db().customers().soft_delete(id).await?;
        info!(customer_id = %id, user_id = %ctx.user.id, "Customer deactivated");

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Delete,
                    AuditEntityType::Customer,
                    id,
                    Some(&old),
                    Some(&deleted),
                ),
            )
            .await;

        Ok(deleted)
    }

    /// Records a sale, payment or credit note.
    pub async fn record_transaction(
        &self,
        ctx: &RequestContext,
        id: &str,
        request: &BalanceRequest,
    ) -> ServiceResult<BalanceMovement> {
        ctx.require(Permission::CustomerTransaction)?;
        let entry = request.validate()?;
        self.load_accessible(ctx, id).await?;

        let movement = self
            .services
            .db()
            .ledger()
            .apply_customer_transaction(
                id,
                &entry,
                Some(&ctx.user.id),
                customer_scope(ctx.user.role, &ctx.user.id),
            )
            .await?;

        self.services
            .record(
                ctx,
                AuditEvent::ledger(
                    AuditAction::Transaction,
                    AuditEntityType::CustomerTransaction,
                    &movement.transaction.id,
                    &movement.transaction,
                ),
            )
            .await;

        Ok(movement)
    }

    /// A customer's balance movements, newest first.
    pub async fn history(
        &self,
        ctx: &RequestContext,
        id: &str,
        page: &PageRequest,
    ) -> ServiceResult<Page<CustomerTransaction>> {
        ctx.require(Permission::CustomerRead)?;
        self.load_accessible(ctx, id).await?;

        let (items, total) = self
            .services
            .db()
            .customer_transactions()
            .history_for_customer(id, page)
            .await?;

        Ok(Page::new(items, page, total))
    }

    /// Loads a customer and applies the row-level ownership check.
    async fn load_accessible(&self, ctx: &RequestContext, id: &str) -> ServiceResult<Customer> {
        let customer = self
            .services
            .db()
            .customers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))?;

        if !can_access_customer(ctx.user.role, &ctx.user.id, &customer) {
            warn!(
                customer_id = %id,
                user_id = %ctx.user.id,
                "Access to another rep's customer denied"
            );
            return Err(ServiceError::Forbidden);
        }

        Ok(customer)
    }

    /// Checks that an assigned owning rep is an existing user.
    async fn known_rep(&self, rep: Option<String>) -> ServiceResult<Option<String>> {
        let Some(rep) = rep else {
            return Ok(None);
        };

        match self.services.db().users().get_by_id(&rep).await? {
            Some(_) => Ok(Some(rep)),
            None => Err(ServiceError::invalid(ValidationError::invalid_format(
                "sales_rep",
                "unknown user",
            ))),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, services};
    use serde_json::json;
    use tally_core::EntityStatus;

    fn input(name: &str) -> CustomerInput {
        CustomerInput {
            name: Some(name.to_string()),
            email: Some("billing@example.com".to_string()),
            phone: Some("+1 (555) 010-0000".to_string()),
            balance_risk_limit: Some(json!("1000.00")),
            payment_terms_limit: Some(json!(30)),
            ..Default::default()
        }
    }

    fn sale(amount: &str) -> BalanceRequest {
        BalanceRequest {
            transaction_type: Some("sale".to_string()),
            amount: Some(json!(amount)),
            reference_number: Some("INV-1".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_sales_rep_owns_what_they_create() {
        let (svc, db) = services().await;
        let rep = context(&db, Role::SalesRep).await;
        let other = context(&db, Role::SalesRep).await;

        let mut body = input("Acme");
        body.sales_rep = Some(other.user.id.clone());
        let customer = svc.customers().create(&rep, &body).await.unwrap();
        assert_eq!(customer.sales_rep.as_deref(), Some(rep.user.id.as_str()));
        assert!(customer.code.starts_with(CUSTOMER_CODE_PREFIX));
        assert_eq!(customer.balance_risk_limit_cents, 100_000);
    }

    #[tokio::test]
    async fn test_other_reps_customer_is_forbidden() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let rep_a = context(&db, Role::SalesRep).await;
        let rep_b = context(&db, Role::SalesRep).await;

        let mut body = input("Acme");
        body.sales_rep = Some(rep_a.user.id.clone());
        let customer = svc.customers().create(&admin, &body).await.unwrap();

        assert!(matches!(
            svc.customers().get(&rep_b, &customer.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.customers()
                .record_transaction(&rep_b, &customer.id, &sale("10"))
                .await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.customers().update(&rep_b, &customer.id, &input("Hijack")).await,
            Err(ServiceError::Forbidden)
        ));

        // Nothing changed for the rightful owner.
        let seen = svc.customers().get(&rep_a, &customer.id).await.unwrap();
        assert_eq!(seen.customer.current_balance_cents, 0);
        assert!(seen.recent_transactions.is_empty());
    }

    #[tokio::test]
    async fn test_sales_rep_cannot_reassign() {
        let (svc, db) = services().await;
        let rep_a = context(&db, Role::SalesRep).await;
        let rep_b = context(&db, Role::SalesRep).await;

        let customer = svc.customers().create(&rep_a, &input("Acme")).await.unwrap();

        let mut body = input("Acme");
        body.sales_rep = Some(rep_b.user.id.clone());
        let err = svc
            .customers()
            .update(&rep_a, &customer.id, &body)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let updated = svc
            .customers()
            .update(&rep_a, &customer.id, &input("Acme Ltd"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme Ltd");
        assert_eq!(updated.sales_rep.as_deref(), Some(rep_a.user.id.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_sales_rep_is_validation_error() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let mut body = input("Acme");
        body.sales_rep = Some("ghost".to_string());
        let err = svc.customers().create(&admin, &body).await.unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.get("sales_rep").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transactions_and_list_scope() {
        let (svc, db) = services().await;
        let rep = context(&db, Role::SalesRep).await;
        let manager = context(&db, Role::Manager).await;

        let mine = svc.customers().create(&rep, &input("Mine")).await.unwrap();
        svc.customers().create(&manager, &input("Unowned")).await.unwrap();

        let m = svc
            .customers()
            .record_transaction(&rep, &mine.id, &sale("250.50"))
            .await
            .unwrap();
        assert_eq!(m.new_balance_cents, 25_050);

        let payment = BalanceRequest {
            transaction_type: Some("payment".to_string()),
            amount: Some(json!(300)),
            ..Default::default()
        };
        let m = svc
            .customers()
            .record_transaction(&rep, &mine.id, &payment)
            .await
            .unwrap();
        assert_eq!(m.new_balance_cents, -4_950);

        let page = svc
            .customers()
            .list(&rep, &CustomerQuery::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].id, mine.id);

        let page = svc
            .customers()
            .list(&manager, &CustomerQuery::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);

        let history = svc
            .customers()
            .history(&rep, &mine.id, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(history.items.len(), 2);
        assert_eq!(history.items[0].id, m.transaction.id);
    }

    #[tokio::test]
    async fn test_inactive_customer_rejects_transactions() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let customer = svc.customers().create(&admin, &input("Acme")).await.unwrap();

        let deleted = svc.customers().delete(&admin, &customer.id).await.unwrap();
        assert_eq!(deleted.status, EntityStatus::Inactive);

        let err = svc
            .customers()
            .record_transaction(&admin, &customer.id, &sale("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Inactive { .. }));
    }

    #[tokio::test]
    async fn test_bad_body_rejected_before_customer_lookup() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let err = svc
            .customers()
            .record_transaction(&admin, "no-such-id", &sale("0"))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.get("amount").is_some()),
            other => panic!("unexpected {other:?}"),
        }

        let err = svc
            .customers()
            .update(&admin, "no-such-id", &CustomerInput::default())
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.get("name").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_admin_deletes() {
        let (svc, db) = services().await;
        let manager = context(&db, Role::Manager).await;
        let customer = svc.customers().create(&manager, &input("Acme")).await.unwrap();

        assert!(matches!(
            svc.customers().delete(&manager, &customer.id).await,
            Err(ServiceError::Forbidden)
        ));
    }
}
