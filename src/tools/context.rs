//! Shared state handed to every tool call

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ClientHandle, PollPolicy, WorkspaceApi};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::sql::QueryValidator;

/// Defaults and limits tools apply to their arguments
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub default_catalog: String,
    pub default_schema: String,
    pub default_warehouse_id: Option<String>,
    pub default_row_limit: u32,
    pub max_results: u32,
    pub statement_wait_secs: u64,
    pub poll: PollPolicy,
    /// `None` disables SQL validation
    pub validator: Option<QueryValidator>,
}

impl ToolSettings {
    pub fn from_config(config: &Config) -> Self {
        let server = &config.server;
        Self {
            default_catalog: config.databricks.default_catalog.clone(),
            default_schema: config.databricks.default_schema.clone(),
            default_warehouse_id: config.databricks.sql_warehouse_id.clone(),
            default_row_limit: server.default_row_limit,
            max_results: server.max_results.max(1),
            statement_wait_secs: server.statement_wait_secs,
            poll: PollPolicy {
                interval: Duration::from_millis(server.poll_interval_ms),
                deadline: Duration::from_secs(server.query_timeout_secs),
            },
            validator: server
                .enable_query_validation
                .then(|| QueryValidator::new(&server.allowed_statements)),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Client handle, dispatcher and settings shared by all tools
#[derive(Clone)]
pub struct ToolContext {
    client: Arc<ClientHandle<dyn WorkspaceApi>>,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<ToolSettings>,
}

impl ToolContext {
    pub fn new(
        client: Arc<ClientHandle<dyn WorkspaceApi>>,
        dispatcher: Arc<Dispatcher>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            client,
            dispatcher,
            settings: Arc::new(settings),
        }
    }

    /// Context around an already constructed client
    pub fn with_client(client: Arc<dyn WorkspaceApi>, settings: ToolSettings) -> Self {
        Self::new(
            Arc::new(ClientHandle::from_client(client)),
            Arc::new(Dispatcher::default()),
            settings,
        )
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Obtain the client and drive `op` to completion through the dispatcher
    pub fn remote<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn WorkspaceApi>) -> Fut + Send,
        Fut: Future<Output = Result<T>>,
        T: Send,
    {
        let client = self.client.get()?;
        self.dispatcher.run(move || op(client))
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("client", &self.client)
            .field("dispatcher", &self.dispatcher)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkspace;
    use crate::error::DatabricksMcpError;

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.databricks.sql_warehouse_id = Some("wh-9".to_string());
        config.server.query_timeout_secs = 12;
        let settings = ToolSettings::from_config(&config);

        assert_eq!(settings.default_catalog, "main");
        assert_eq!(settings.default_warehouse_id.as_deref(), Some("wh-9"));
        assert_eq!(settings.poll.deadline, Duration::from_secs(12));
        assert_eq!(settings.poll.interval, Duration::from_millis(500));
        assert!(settings.validator.is_some());
    }

    #[test]
    fn test_zero_max_results_floored() {
        let mut config = Config::default();
        config.server.max_results = 0;
        assert_eq!(ToolSettings::from_config(&config).max_results, 1);
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let mut config = Config::default();
        config.server.enable_query_validation = false;
        assert!(ToolSettings::from_config(&config).validator.is_none());
    }

    #[test]
    fn test_remote_without_runtime() {
        let ctx = ToolContext::with_client(Arc::new(MockWorkspace::sample()), ToolSettings::default());
        let catalogs = ctx.remote(|api| async move { api.list_catalogs().await }).unwrap();
        assert_eq!(catalogs.len(), 2);
    }

    #[tokio::test]
    async fn test_remote_inside_runtime() {
        let ctx = ToolContext::with_client(Arc::new(MockWorkspace::sample()), ToolSettings::default());
        let clusters = ctx.remote(|api| async move { api.list_clusters().await }).unwrap();
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_remote_surfaces_construction_failure() {
        let handle: ClientHandle<dyn WorkspaceApi> =
            ClientHandle::new(|| Err(DatabricksMcpError::Config("DATABRICKS_TOKEN is required".into())));
        let ctx = ToolContext::new(
            Arc::new(handle),
            Arc::new(Dispatcher::default()),
            ToolSettings::default(),
        );
        let err = ctx.remote(|api| async move { api.list_catalogs().await }).unwrap_err();
        assert!(matches!(err, DatabricksMcpError::Config(_)));
    }
}
