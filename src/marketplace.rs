use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::{normalize_item, unwrap_object};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;
use crate::models::*;

#[derive(Clone)]
pub struct MarketplaceApi {
    client: ApiClient,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteState {
    #[serde(alias = "isFavorited", alias = "favorite")]
    pub favorited: bool,
}

fn listing_path(id: &str) -> ApiResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation("listing id must not be empty"));
    }
    Ok(format!("marketplace/listings/{}", urlencoding::encode(id)))
}

impl MarketplaceApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn listings(&self, query: &ListingQuery) -> ApiResult<Vec<MarketplaceListing>> {
        query.validate()?;
        self.client.list("marketplace/listings", &query.to_query()).await
    }

    pub async fn listing(&self, id: &str) -> ApiResult<MarketplaceListing> {
        self.client.item(&listing_path(id)?).await
    }

    pub async fn create_listing(&self, new: &NewListing) -> ApiResult<MarketplaceListing> {
        new.validate()?;
        normalize_item(self.client.post("marketplace/listings", new).await?)
    }

    pub async fn update_listing(&self, id: &str, update: &ListingUpdate) -> ApiResult<MarketplaceListing> {
        update.validate()?;
        normalize_item(self.client.put(&listing_path(id)?, update).await?)
    }

    /// Move a listing along its lifecycle, rejecting transitions out of a terminal state.
    pub async fn change_status(&self, listing: &MarketplaceListing, next: ListingStatus) -> ApiResult<MarketplaceListing> {
        if !listing.status.can_transition_to(next) {
            return Err(ApiError::validation(format!(
                "listing cannot move from {:?} to {:?}",
                listing.status, next
            )));
        }
        if next == ListingStatus::Sold {
            return self.mark_sold(&listing.id).await;
        }
        let update = ListingUpdate { status: Some(next), ..Default::default() };
        self.update_listing(&listing.id, &update).await
    }

    pub async fn delete_listing(&self, id: &str) -> ApiResult<()> {
        self.client.delete(&listing_path(id)?).await?;
        Ok(())
    }

    pub async fn my_listings(&self) -> ApiResult<Vec<MarketplaceListing>> {
        self.client.list("marketplace/my-listings", &[]).await
    }

    pub async fn mark_sold(&self, id: &str) -> ApiResult<MarketplaceListing> {
        let path = format!("{}/sold", listing_path(id)?);
        normalize_item(self.client.patch_empty(&path).await?)
    }

    pub async fn toggle_favorite(&self, id: &str) -> ApiResult<FavoriteState> {
        let path = format!("{}/favorite", listing_path(id)?);
        let body = unwrap_object(self.client.post_empty(&path).await?, "favorite");
        serde_json::from_value(body).map_err(|e| ApiError::Network(format!("malformed favorite response: {e}")))
    }

    pub async fn favorites(&self) -> ApiResult<Vec<MarketplaceListing>> {
        self.client.list("marketplace/favorites", &[]).await
    }

    pub async fn report(&self, id: &str, reason: &str, description: Option<&str>) -> ApiResult<Value> {
        if reason.trim().is_empty() {
            return Err(ApiError::validation("a report reason is required"));
        }
        let report = ListingReport {
            reason: reason.trim().to_string(),
            description: description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
        };
        self.client.post(&format!("{}/report", listing_path(id)?), &report).await
    }

    pub async fn categories(&self) -> ApiResult<Vec<MarketplaceCategory>> {
        self.client.list("marketplace/categories", &[]).await
    }

    pub async fn contact_seller(&self, id: &str, message: &str) -> ApiResult<Value> {
        if message.trim().is_empty() {
            return Err(ApiError::validation("message must not be empty"));
        }
        self.client
            .post(&format!("{}/contact", listing_path(id)?), &json!({ "message": message.trim() }))
            .await
    }
}
