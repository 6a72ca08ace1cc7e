use serde_json::Value;

use crate::envelope::{normalize_item, unwrap_list};
use crate::error::{ApiError, ApiResult};
use crate::http::{degrade, ApiClient};
use crate::models::*;

/// Discussion side of the backend: categories, threads, posts, profiles and search.
#[derive(Clone)]
pub struct ForumApi {
    client: ApiClient,
}

fn segment(id: &str) -> ApiResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation("identifier must not be empty"));
    }
    Ok(urlencoding::encode(id).into_owned())
}

impl ForumApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn categories(&self) -> ApiResult<Vec<Category>> {
        self.client.list("categories", &[]).await
    }

    /// Categories with subcategories nested under their parents.
    pub async fn category_tree(&self) -> ApiResult<Vec<Category>> {
        Ok(build_category_tree(self.categories().await?))
    }

    pub async fn category(&self, slug: &str) -> ApiResult<Category> {
        self.client.item(&format!("categories/{}", segment(slug)?)).await
    }

    /// Threads, optionally restricted to one category. An unknown category
    /// yields an empty list.
    pub async fn threads(&self, category_id: Option<&str>) -> ApiResult<Vec<Thread>> {
        let query: Vec<(&str, String)> = category_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| ("categoryId", c.to_string()))
            .into_iter()
            .collect();
        self.client.list("threads", &query).await
    }

    pub async fn thread(&self, id: &str) -> ApiResult<Thread> {
        self.client.item(&format!("threads/{}", segment(id)?)).await
    }

    pub async fn create_thread(&self, new: &NewThread) -> ApiResult<Thread> {
        new.validate()?;
        normalize_item(self.client.post("threads", new).await?)
    }

    pub async fn posts(&self, thread_id: &str) -> ApiResult<Vec<Post>> {
        self.client.list(&format!("threads/{}/posts", segment(thread_id)?), &[]).await
    }

    pub async fn create_post(&self, new: &NewPost) -> ApiResult<Post> {
        new.validate()?;
        normalize_item(self.client.post("posts", new).await?)
    }

    pub async fn user_profile(&self, user_id: &str) -> ApiResult<User> {
        self.client.item(&format!("users/{}", segment(user_id)?)).await
    }

    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> ApiResult<User> {
        update.validate()?;
        let path = format!("users/{}", segment(user_id)?);
        normalize_item(self.client.put(&path, update).await?)
    }

    /// Full-text search. A blank query returns nothing without a round trip.
    pub async fn search(&self, query: &SearchQuery) -> ApiResult<Vec<SearchResult>> {
        if query.q.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.client.list("search", &query.to_query()).await
    }

    /// Autocomplete suggestions; queries shorter than two characters are not sent.
    pub async fn search_suggestions(&self, q: &str) -> ApiResult<Vec<String>> {
        let q = q.trim();
        if q.chars().count() < 2 {
            return Ok(Vec::new());
        }
        let result = self
            .client
            .get_query("search/suggestions", &[("q", q.to_string())])
            .await
            .map(|body| {
                unwrap_list(body, "suggestions")
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s),
                        _ => None,
                    })
                    .collect()
            });
        degrade("suggestions", result)
    }
}
