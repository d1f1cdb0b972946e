pub mod api;
pub mod config;
pub mod datastore;
pub mod error;
pub mod news;

use std::sync::Arc;
use config::Config;
use datastore::Datastore;
use news::store::NewsStore;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub datastore: Datastore,
    pub news: Arc<NewsStore>,
}

impl AppState {
    pub fn new(config: Config) -> error::Result<Self> {
        let datastore = Datastore::new(&config.datastore_url, &config.datastore_key, config.datastore_timeout)?;
        let news = NewsStore::new(config.news_file.clone(), config.news_io_timeout);

        Ok(AppState {
            config: Arc::new(config),
            datastore,
            news: Arc::new(news),
        })
    }
}
