use std::sync::Arc;

use sheets::{RowStore, SheetsClient};

use super::{config::Config, error::AppError, gateway::Gateway};

pub struct State {
    pub config: Config,
    pub gateway: Gateway,
}

impl State {
    pub fn new(config: Config, store: Arc<dyn RowStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            gateway: Gateway::new(store),
        })
    }

    /// State backed by the Google Sheets API.
    pub fn remote(config: Config) -> Result<Arc<Self>, AppError> {
        let client = SheetsClient::new(
            &config.sheets_api_url,
            config.token_file.clone(),
            config.request_timeout,
        )?;

        Ok(Self::new(config, Arc::new(client)))
    }
}
