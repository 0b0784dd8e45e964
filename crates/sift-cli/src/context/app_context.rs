use anyhow::Context;
use sift_config::SiftConfig;
use sift_db::service::SiftService;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: SiftService,
    pub config: SiftConfig,
}

impl AppContext {
    /// Open the configured database and wrap it in a service.
    pub async fn init(config: SiftConfig) -> anyhow::Result<Self> {
        let service = SiftService::from_config(&config)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        tracing::debug!(path = %config.database.path, "sift service ready");
        Ok(Self { service, config })
    }
}
