use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::envelope::Resource;
use crate::error::{ApiError, ApiResult};

// Backend ids are opaque strings, though some deployments emit numbers.
pub type Id = String;

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<Id, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Id>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

/// `null` on the wire means "use the default".
fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "avatar")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub role: Role,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub reputation: Option<i64>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().filter(|u| !u.is_empty()).unwrap_or(&self.email)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Moderator | Role::Admin)
    }
}

impl Resource for User {
    const LIST_KEY: &'static str = "users";
    const ITEM_KEY: &'static str = "user";
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(name) = &self.username {
            let len = name.trim().chars().count();
            if !(3..=32).contains(&len) {
                return Err(ApiError::validation("username must be between 3 and 32 characters"));
            }
        }
        Ok(())
    }
}

// ---------------- Forum -------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default, deserialize_with = "nullable")]
    pub thread_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub post_count: u64,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<Id>,
    #[serde(default, deserialize_with = "nullable")]
    pub subcategories: Vec<Category>,
}

impl Resource for Category {
    const LIST_KEY: &'static str = "categories";
    const ITEM_KEY: &'static str = "category";
    const REQUIRED: &'static [&'static str] = &["id", "name"];
}

/// Nest subcategories under their parents. Children whose parent is not in
/// the list stay at the top level.
pub fn build_category_tree(categories: Vec<Category>) -> Vec<Category> {
    let (mut roots, children): (Vec<_>, Vec<_>) =
        categories.into_iter().partition(|c| c.parent_id.is_none());
    let mut orphans = Vec::new();
    for child in children {
        let parent_id = child.parent_id.as_deref().unwrap_or_default();
        match roots.iter_mut().find(|r| r.id == parent_id) {
            Some(parent) => {
                if !parent.subcategories.iter().any(|s| s.id == child.id) {
                    parent.subcategories.push(child);
                }
            }
            None => orphans.push(child),
        }
    }
    roots.extend(orphans);
    roots
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub category_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub author_id: Option<Id>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub view_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub post_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub is_pinned: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_locked: bool,
    #[serde(default)]
    pub last_post_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_post_author: Option<User>,
}

impl Resource for Thread {
    const LIST_KEY: &'static str = "threads";
    const ITEM_KEY: &'static str = "thread";
    const REQUIRED: &'static [&'static str] = &["id", "title"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub title: String,
    pub content: String,
    pub category_id: Id,
}

impl NewThread {
    pub fn validate(&self) -> ApiResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("thread title must not be empty"));
        }
        if title.chars().count() > 200 {
            return Err(ApiError::validation("thread title must be at most 200 characters"));
        }
        if self.content.trim().is_empty() {
            return Err(ApiError::validation("thread content must not be empty"));
        }
        if self.category_id.trim().is_empty() {
            return Err(ApiError::validation("a category is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub content: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub thread_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub author_id: Option<Id>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_answer: bool,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub reply_to_id: Option<Id>,
}

impl Resource for Post {
    const LIST_KEY: &'static str = "posts";
    const ITEM_KEY: &'static str = "post";
    const REQUIRED: &'static [&'static str] = &["id", "content"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    pub thread_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<Id>,
}

impl NewPost {
    pub fn validate(&self) -> ApiResult<()> {
        if self.content.trim().is_empty() {
            return Err(ApiError::validation("reply content must not be empty"));
        }
        if self.thread_id.trim().is_empty() {
            return Err(ApiError::validation("a thread is required"));
        }
        Ok(())
    }
}

// ---------------- Search ------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Thread,
    Post,
    User,
    Listing,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Thread => "thread",
            SearchKind::Post => "post",
            SearchKind::User => "user",
            SearchKind::Listing => "listing",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Highlights {
    #[serde(default, deserialize_with = "nullable")]
    pub title: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub thread_id: Option<Id>,
    #[serde(default, deserialize_with = "nullable")]
    pub highlights: Highlights,
}

impl SearchResult {
    /// Highlighted title fragments joined the way result cards show them,
    /// falling back to the plain title.
    pub fn display_title(&self) -> Option<String> {
        if self.highlights.title.is_empty() {
            self.title.clone()
        } else {
            Some(self.highlights.title.join(" ... "))
        }
    }

    pub fn display_snippet(&self) -> String {
        if self.highlights.content.is_empty() {
            self.content.clone()
        } else {
            self.highlights.content.join(" ... ")
        }
    }
}

impl Resource for SearchResult {
    const LIST_KEY: &'static str = "results";
    const ITEM_KEY: &'static str = "result";
    const REQUIRED: &'static [&'static str] = &["id", "type"];
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub q: String,
    pub kind: Option<SearchKind>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self { q: q.into(), ..Default::default() }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.q.trim().to_string())];
        if let Some(kind) = self.kind { params.push(("type", kind.as_str().to_string())); }
        if let Some(page) = self.page { params.push(("page", page.to_string())); }
        if let Some(limit) = self.limit { params.push(("limit", limit.to_string())); }
        params
    }
}

// ---------------- Marketplace -------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ListingCondition {
    New,
    LikeNew,
    #[default]
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    Inactive,
}

impl ListingStatus {
    /// Listings only leave the `active` state; `sold` and `inactive` are terminal.
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!((self, next), (ListingStatus::Active, ListingStatus::Sold | ListingStatus::Inactive))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceListing {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub price: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub category: String,
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable")]
    pub condition: ListingCondition,
    #[serde(default, deserialize_with = "nullable")]
    pub status: ListingStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seller: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_favorited: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub view_count: u64,
}

impl Resource for MarketplaceListing {
    const LIST_KEY: &'static str = "listings";
    const ITEM_KEY: &'static str = "listing";
    const REQUIRED: &'static [&'static str] = &["id", "title"];
}

fn check_price(price: f64) -> ApiResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::validation("price must be a non-negative number"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ListingCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NewListing {
    pub fn validate(&self) -> ApiResult<()> {
        if self.title.trim().is_empty() {
            return Err(ApiError::validation("listing title must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(ApiError::validation("listing description must not be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(ApiError::validation("a listing category is required"));
        }
        if self.location.trim().is_empty() {
            return Err(ApiError::validation("a listing location is required"));
        }
        check_price(self.price)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ListingCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
}

impl ListingUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(ApiError::validation("listing title must not be empty"));
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub location: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListingQuery {
    pub fn validate(&self) -> ApiResult<()> {
        for p in [self.min_price, self.max_price].into_iter().flatten() {
            check_price(p)?;
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ApiError::validation("minimum price exceeds maximum price"));
            }
        }
        Ok(())
    }

    /// Query pairs for the listings endpoint; unset and blank filters are omitted.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let text = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(c) = text(&self.category) { params.push(("category", c)); }
        if let Some(s) = text(&self.search) { params.push(("search", s)); }
        if let Some(p) = self.min_price { params.push(("minPrice", p.to_string())); }
        if let Some(p) = self.max_price { params.push(("maxPrice", p.to_string())); }
        if let Some(l) = text(&self.location) { params.push(("location", l)); }
        if let Some(p) = self.page { params.push(("page", p.to_string())); }
        if let Some(l) = self.limit { params.push(("limit", l.to_string())); }
        params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceCategory {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<Id>,
    #[serde(default, deserialize_with = "nullable")]
    pub subcategories: Vec<MarketplaceCategory>,
}

impl Resource for MarketplaceCategory {
    const LIST_KEY: &'static str = "categories";
    const ITEM_KEY: &'static str = "category";
    const REQUIRED: &'static [&'static str] = &["id", "name"];
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingReport {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------- Messaging ---------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub conversation_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub sender_id: Option<Id>,
    #[serde(default)]
    pub sender: Option<User>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub read: bool,
}

impl Resource for Message {
    const LIST_KEY: &'static str = "messages";
    const ITEM_KEY: &'static str = "message";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default, deserialize_with = "nullable")]
    pub participants: Vec<User>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default, deserialize_with = "nullable")]
    pub unread_count: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Conversation {
    const LIST_KEY: &'static str = "conversations";
    const ITEM_KEY: &'static str = "conversation";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<Id>,
    pub content: String,
}

impl NewMessage {
    pub fn validate(&self) -> ApiResult<()> {
        if self.content.trim().is_empty() {
            return Err(ApiError::validation("message must not be empty"));
        }
        if self.conversation_id.is_none() && self.recipient_id.is_none() {
            return Err(ApiError::validation("a conversation or recipient is required"));
        }
        Ok(())
    }
}

// ---------------- Notifications -----------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Mention,
    Reply,
    Like,
    Message,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub user_id: Option<Id>,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: NotificationType,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub read: bool,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub related_id: Option<Id>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Notification {
    const LIST_KEY: &'static str = "notifications";
    const ITEM_KEY: &'static str = "notification";
}

// ---------------- Auth --------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

const MIN_PASSWORD_LEN: usize = 6;

fn check_email(email: &str) -> ApiResult<()> {
    let (local, domain) = email.split_once('@').ok_or_else(|| ApiError::validation("invalid email address"))?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') || email.contains(char::is_whitespace) {
        return Err(ApiError::validation("invalid email address"));
    }
    Ok(())
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> ApiResult<Self> {
        let email = email.trim();
        check_email(email)?;
        if password.is_empty() {
            return Err(ApiError::validation("password must not be empty"));
        }
        Ok(Self { email: email.to_string(), password: password.to_string() })
    }
}

impl RegisterRequest {
    pub fn new(email: &str, password: &str, username: Option<&str>) -> ApiResult<Self> {
        let email = email.trim();
        check_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!("password must be at least {MIN_PASSWORD_LEN} characters")));
        }
        let username = username.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string);
        Ok(Self { email: email.to_string(), password: password.to_string(), username })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cat(id: &str, parent: Option<&str>) -> Category {
        serde_json::from_value(json!({"id": id, "name": format!("cat {id}"), "parentId": parent})).unwrap()
    }

    #[test]
    fn user_accepts_avatar_alias_and_numeric_id() {
        let u: User = serde_json::from_value(json!({"id": 7, "email": "a@example.com", "avatar": "x.png", "role": null})).unwrap();
        assert_eq!(u.id, "7");
        assert_eq!(u.avatar_url.as_deref(), Some("x.png"));
        assert_eq!(u.role, Role::User);
        assert_eq!(u.display_name(), "a@example.com");
    }

    #[test]
    fn category_tree_nests_children_and_keeps_orphans() {
        let tree = build_category_tree(vec![cat("1", None), cat("2", Some("1")), cat("3", None), cat("4", Some("9"))]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].subcategories.len(), 1);
        assert_eq!(tree[0].subcategories[0].id, "2");
        assert!(tree[1].subcategories.is_empty());
        assert_eq!(tree[2].id, "4");
    }

    #[test]
    fn username_length_counts_characters() {
        let update = |name: &str| ProfileUpdate { username: Some(name.into()), ..Default::default() };
        assert!(update("日本語").validate().is_ok());
        assert!(update(&"é".repeat(32)).validate().is_ok());
        assert!(update(&"é".repeat(33)).validate().is_err());
        assert!(update(" ab ").validate().is_err());
        assert!(ProfileUpdate::default().validate().is_ok());
    }

    #[test]
    fn listing_status_lifecycle() {
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Sold));
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Inactive));
        assert!(!ListingStatus::Sold.can_transition_to(ListingStatus::Active));
        assert!(!ListingStatus::Active.can_transition_to(ListingStatus::Active));
    }

    #[test]
    fn listing_condition_wire_names() {
        assert_eq!(serde_json::to_value(ListingCondition::LikeNew).unwrap(), json!("like-new"));
        let l: MarketplaceListing = serde_json::from_value(json!({"id":"1","title":"Bike","condition":"like-new","status":"sold","price":null})).unwrap();
        assert_eq!(l.condition, ListingCondition::LikeNew);
        assert_eq!(l.status, ListingStatus::Sold);
        assert_eq!(l.price, 0.0);
    }

    #[test]
    fn unknown_notification_type_maps_to_other() {
        let n: Notification = serde_json::from_value(json!({"id":"n1","type":"follow","message":"hi"})).unwrap();
        assert_eq!(n.kind, NotificationType::Other);
        assert!(!n.read);
    }

    #[test]
    fn listing_query_skips_blank_filters() {
        let q = ListingQuery { search: Some("  ".into()), min_price: Some(5.0), limit: Some(20), ..Default::default() };
        assert_eq!(q.to_query(), vec![("minPrice", "5".to_string()), ("limit", "20".to_string())]);
        let bad = ListingQuery { min_price: Some(50.0), max_price: Some(10.0), ..Default::default() };
        assert!(matches!(bad.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn credential_validation() {
        assert!(LoginRequest::new("a@example.com", "secret123").is_ok());
        assert!(LoginRequest::new("not-an-email", "secret123").is_err());
        assert!(LoginRequest::new("a@example.com", "").is_err());
        assert!(RegisterRequest::new("a@example.com", "12345", None).is_err());
        let r = RegisterRequest::new(" a@example.com ", "123456", Some("  ")).unwrap();
        assert_eq!(r.email, "a@example.com");
        assert!(r.username.is_none());
    }

    #[test]
    fn search_result_highlights_fall_back_to_plain_text() {
        let r: SearchResult = serde_json::from_value(json!({
            "type": "thread", "id": "t1", "title": "Rust", "content": "body",
            "highlights": {"title": ["<em>Rust</em>"], "content": null}
        })).unwrap();
        assert_eq!(r.display_title().as_deref(), Some("<em>Rust</em>"));
        assert_eq!(r.display_snippet(), "body");
    }
}
