use std::sync::Arc;

use tracing::info;

use crate::auth::AuthApi;
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::forum::ForumApi;
use crate::http::ApiClient;
use crate::marketplace::MarketplaceApi;
use crate::messages::MessagesApi;
use crate::notifications::NotificationsApi;
use crate::session::Session;
use crate::storage::{FileStore, KeyValueStore};

/// Everything an application needs, wired to one transport and one session.
#[derive(Clone)]
pub struct ForumClient {
    pub session: Session,
    pub auth: AuthApi,
    pub forum: ForumApi,
    pub marketplace: MarketplaceApi,
    pub messages: MessagesApi,
    pub notifications: NotificationsApi,
}

impl ForumClient {
    /// Client persisting its session under `config.session_dir`.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.session_dir));
        Self::with_store(config, store)
    }

    pub fn with_store(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let client = ApiClient::new(config, store.clone())?;
        let auth = AuthApi::new(client.clone());
        let session = Session::new(Arc::new(auth.clone()), store);
        info!(base_url = %client.base_url(), "forum client ready");
        Ok(Self {
            session,
            auth,
            forum: ForumApi::new(client.clone()),
            marketplace: MarketplaceApi::new(client.clone()),
            messages: MessagesApi::new(client.clone()),
            notifications: NotificationsApi::new(client),
        })
    }
}
