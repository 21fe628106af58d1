//! Audit log browsing (admin only by the permission table).

use tally_core::permissions::Permission;
use tally_core::{AuditEntityType, AuditLogEntry, Page, PageRequest};

use super::{RequestContext, ServiceResult, Services};

pub struct AuditLogService<'a> {
    services: &'a Services,
}

impl<'a> AuditLogService<'a> {
    pub(crate) fn new(services: &'a Services) -> Self {
        AuditLogService { services }
    }

    /// One page of the log, newest first.
    ///
    /// ## Arguments
    /// * `entity_type` - optional filter (`product`, `customer`, ...)
    pub async fn list(
        &self,
        ctx: &RequestContext,
        entity_type: Option<&str>,
        page: &PageRequest,
    ) -> ServiceResult<Page<AuditLogEntry>> {
        ctx.require(Permission::AuditView)?;

        let entity_type = entity_type
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<AuditEntityType>)
            .transpose()?;

        let (items, total) = self
            .services
            .db()
            .audit_logs()
            .list(entity_type, page)
            .await?;

        Ok(Page::new(items, page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;
    use crate::test_support::{context, services};
    use serde_json::json;
    use tally_core::input::ProductInput;
    use tally_core::{AuditAction, Role};

    #[tokio::test]
    async fn test_admin_only_and_filter() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let manager = context(&db, Role::Manager).await;

        let input = ProductInput {
            name: Some("Widget".to_string()),
            category: Some("General".to_string()),
            unit: Some("pcs".to_string()),
            current_stock: Some(json!(3)),
            ..Default::default()
        };
        let product = svc.products().create(&admin, &input).await.unwrap();

        assert!(matches!(
            svc.audit_log().list(&manager, None, &PageRequest::default()).await,
            Err(ServiceError::Forbidden)
        ));

        let page = svc
            .audit_log()
            .list(&admin, Some("product"), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].action, AuditAction::Create);
        assert_eq!(page.items[0].entity_id, product.id);
        assert_eq!(page.items[0].user_id.as_deref(), Some(admin.user.id.as_str()));

        let all = svc
            .audit_log()
            .list(&admin, None, &PageRequest::default())
            .await
            .unwrap();
        // create + opening stock adjustment
        assert_eq!(all.pagination.total, 2);
        assert_eq!(all.items[0].action, AuditAction::StockAdjustment);

        assert!(matches!(
            svc.audit_log().list(&admin, Some("invoice"), &PageRequest::default()).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
