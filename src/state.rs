//! Shared application state, built once at startup and cloned into
//! every handler.

use crate::config::GatewayConfig;
use crate::credentials::CredentialStore;
use crate::errors::ConfigReport;
use crate::routes::RouteRegistry;
use crate::token::TokenCodec;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub credentials: Arc<CredentialStore>,
    pub codec: Arc<TokenCodec>,
    pub routes: Arc<RouteRegistry>,
}

impl AppState {
    /// Validates the configuration and builds every derived table.
    ///
    /// All problems across all sections are accumulated into a single
    /// report so a misconfiguration can be fixed in one pass.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigReport> {
        let mut report = ConfigReport::new();

        let credentials = CredentialStore::from_config(&config.credentials, &mut report);
        let codec = TokenCodec::from_config(&config.authorization, &mut report);
        let routes = RouteRegistry::from_config(&config.routes, &mut report);

        if !report.is_empty() {
            return Err(report);
        }

        Ok(Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            codec: Arc::new(codec),
            routes: Arc::new(routes),
        })
    }
}
