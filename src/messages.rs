use crate::envelope::normalize_item;
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;
use crate::models::{Conversation, Message, NewMessage};

const DEFAULT_PAGE: u32 = 50;

/// Private conversations between users.
#[derive(Clone)]
pub struct MessagesApi {
    client: ApiClient,
}

fn conversation_path(id: &str) -> ApiResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation("conversation id must not be empty"));
    }
    Ok(format!("messages/conversations/{}", urlencoding::encode(id)))
}

impl MessagesApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn conversations(&self, limit: Option<u32>) -> ApiResult<Vec<Conversation>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE);
        self.client.list("messages/conversations", &[("limit", limit.to_string())]).await
    }

    /// Messages of one conversation, oldest first.
    pub async fn messages(&self, conversation_id: &str, limit: Option<u32>) -> ApiResult<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE);
        let mut messages: Vec<Message> = self
            .client
            .list(&conversation_path(conversation_id)?, &[("limit", limit.to_string())])
            .await?;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    pub async fn send(&self, new: &NewMessage) -> ApiResult<Message> {
        new.validate()?;
        normalize_item(self.client.post("messages", new).await?)
    }

    pub async fn mark_read(&self, conversation_id: &str) -> ApiResult<()> {
        let path = format!("{}/read", conversation_path(conversation_id)?);
        self.client.put_empty(&path).await?;
        Ok(())
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        self.client.delete(&conversation_path(conversation_id)?).await?;
        Ok(())
    }
}
