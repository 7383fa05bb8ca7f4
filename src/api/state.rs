use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::realtime::Hub;
use crate::services::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub hub: Hub,
    pub mailer: Arc<dyn Mailer>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>, mailer: Arc<dyn Mailer>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            db,
            config,
            hub: Hub::new(),
            mailer,
            http,
        }
    }
}
