use serde_json::Value;
use tracing::warn;

use crate::envelope::unwrap_object;
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;
use crate::models::Notification;

#[derive(Clone)]
pub struct NotificationsApi {
    client: ApiClient,
}

fn notification_path(id: &str) -> ApiResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation("notification id must not be empty"));
    }
    Ok(format!("notifications/{}", urlencoding::encode(id)))
}

impl NotificationsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, unread_only: bool, limit: Option<u32>) -> ApiResult<Vec<Notification>> {
        let mut query = Vec::new();
        if unread_only {
            query.push(("unreadOnly", "true".to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.client.list("notifications", &query).await
    }

    /// Badge count; a backend that cannot answer counts as zero.
    pub async fn unread_count(&self) -> ApiResult<u64> {
        match self.client.get("notifications/unread-count").await {
            Ok(body) => Ok(unwrap_object(body, "unread")
                .get("count")
                .and_then(Value::as_u64)
                .unwrap_or(0)),
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "unread count unavailable");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn mark_read(&self, id: &str) -> ApiResult<()> {
        self.client.put_empty(&format!("{}/read", notification_path(id)?)).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> ApiResult<()> {
        self.client.put_empty("notifications/read-all").await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.client.delete(&notification_path(id)?).await?;
        Ok(())
    }
}
