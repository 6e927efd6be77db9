//! Best-effort writer for notification records.

use db::{
    DBService,
    models::notification::{CreateNotification, Notification, NotificationKind},
};
use tracing::warn;
use uuid::Uuid;

/// Creates notification rows as a secondary effect of other operations.
/// Failures are logged and swallowed so they never fail the primary
/// operation.
#[derive(Clone)]
pub struct NotificationService {
    db: DBService,
}

impl NotificationService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    async fn notify(&self, data: CreateNotification) {
        if let Err(e) = Notification::create(&self.db.pool, &data).await {
            warn!(
                user_id = %data.user_id,
                kind = %data.kind,
                error = %e,
                "failed to create notification"
            );
        }
    }

    pub async fn connection_request_received(
        &self,
        recipient_id: Uuid,
        requester_name: &str,
        connection_id: Uuid,
    ) {
        self.notify(CreateNotification {
            user_id: recipient_id,
            kind: NotificationKind::ConnectionRequest,
            title: "New Connection Request".to_string(),
            body: format!("{requester_name} wants to connect with you!"),
            related_id: Some(connection_id),
        })
        .await;
    }

    pub async fn connection_accepted(
        &self,
        requester_id: Uuid,
        responder_name: &str,
        connection_id: Uuid,
    ) {
        self.notify(CreateNotification {
            user_id: requester_id,
            kind: NotificationKind::ConnectionAccepted,
            title: "Connection Accepted".to_string(),
            body: format!("{responder_name} accepted your connection request!"),
            related_id: Some(connection_id),
        })
        .await;
    }
}
