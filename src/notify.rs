use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

/// Writes user-facing notifications. Failures here are logged, never
/// propagated: a missed notice must not fail a settled trade.
pub struct NotificationSink {
    pool: PgPool,
}

impl NotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The one-time completion notice for a settled trade.
    pub async fn trade_completed(&self, user_id: Uuid) {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, read, created_at)
            VALUES ($1, $2, 'success', 'OTC Trade Completed', 'Your OTC trade has been completed.', FALSE, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => info!("📬 Completion notification queued for user {}", user_id),
            Err(e) => error!(
                "Failed to queue completion notification for user {}: {:?}",
                user_id, e
            ),
        }
    }
}
