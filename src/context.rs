use crate::client::{ApiClient, ClientConfig};
use crate::config::ConfigManager;
use crate::controller::SearchSyncController;
use anyhow::{Context as AnyhowContext, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct AppContext {
    pub controller: Arc<SearchSyncController<ApiClient>>,
    pub config_manager: ConfigManager,
    pub progress: MultiProgress,
}

impl AppContext {
    pub fn new(
        base_path: &Path,
        api_url_override: Option<String>,
        progress: MultiProgress,
    ) -> Result<Self> {
        let mut config_manager = ConfigManager::new(Some(base_path))?;
        if let Some(url) = api_url_override {
            config_manager.override_api_url(url);
        }

        let base_url = match config_manager.api_url() {
            Ok(url) => url,
            Err(e) => {
                error!("{:#}", e);
                return Err(e);
            }
        };
        debug!("Using backend at {}", base_url);

        let client = ApiClient::new(ClientConfig {
            base_url,
            timeout_secs: config_manager.timeout_secs(),
        })
        .context("Failed to create HTTP client")?;

        let controller = SearchSyncController::new(client, config_manager.search_policy());

        Ok(Self {
            controller: Arc::new(controller),
            config_manager,
            progress,
        })
    }

    /// Spinner shown while a one-shot command waits on the backend
    pub fn spinner(&self) -> ProgressBar {
        let spinner = self.progress.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Loading...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}
