//! Email alerts for a parliamentary monitoring site.
//!
//! Visitors subscribe to politicians or saved search queries, confirm through
//! signed links, and receive digest emails when a politician they follow
//! speaks in a newly published Hansard.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::session::PendingAlerts;
use crate::signing::Signer;

pub mod alerts;
pub mod api;
pub mod config;
pub mod email_templates;
pub mod entity;
pub mod error;
pub mod mailer;
pub mod query;
pub mod session;
pub mod signing;
pub mod store;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
    pub pending_alerts: Arc<PendingAlerts>,
}

impl AppResources {
    pub fn new(db: Arc<DatabaseConnection>, mailer: Arc<dyn Mailer>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            mailer,
            config,
            pending_alerts: Arc::new(PendingAlerts::new()),
        }
    }

    pub fn signer(&self) -> Signer {
        Signer::new(self.config.signing_secret.clone())
    }

    pub fn store(&self) -> store::SubscriptionStore {
        store::SubscriptionStore::new(self.db.clone())
    }
}
