//! Server dependencies for domain actions (using traits for testability)
//!
//! Central dependency container handed to every action and to the scheduler.
//! All external collaborators sit behind trait abstractions.

use std::sync::Arc;

use crate::common::rate_limit::BaseRateLimiter;
use crate::kernel::traits::{
    AuditEntry, BaseAuditLog, BaseClock, BaseMediaStore, BaseNotificationDispatcher, BaseStore,
    BaseTokenSource,
};

/// Server dependencies accessible to domain actions
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseStore>,
    pub audit_log: Arc<dyn BaseAuditLog>,
    pub dispatcher: Arc<dyn BaseNotificationDispatcher>,
    pub media: Arc<dyn BaseMediaStore>,
    pub clock: Arc<dyn BaseClock>,
    pub tokens: Arc<dyn BaseTokenSource>,
    pub rate_limiter: Arc<dyn BaseRateLimiter>,
    /// Public domain for pairing links and share viewer URLs
    pub app_domain: String,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn BaseStore>,
        audit_log: Arc<dyn BaseAuditLog>,
        dispatcher: Arc<dyn BaseNotificationDispatcher>,
        media: Arc<dyn BaseMediaStore>,
        clock: Arc<dyn BaseClock>,
        tokens: Arc<dyn BaseTokenSource>,
        rate_limiter: Arc<dyn BaseRateLimiter>,
        app_domain: String,
    ) -> Self {
        Self {
            store,
            audit_log,
            dispatcher,
            media,
            clock,
            tokens,
            rate_limiter,
            app_domain,
        }
    }

    /// Write an audit record, logging failures instead of propagating them.
    /// Audit is a side effect of mutations, never a transactional participant.
    pub async fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit_log.record(entry).await {
            tracing::warn!(error = %e, "Failed to write audit record");
        }
    }
}
