use crate::config::AppConfig;
use anyhow::Context;
use infragen_core::InfragenConfig;
use infragen_runtime::{Orchestrator, ProvisionService};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: ProvisionService,
    pub project: Option<String>,
}

impl AppState {
    /// Build the orchestrator from the project configuration and start the
    /// provisioning dispatcher.
    pub fn init(project: InfragenConfig) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::from_config(&project)?;
        Ok(Self::new(orchestrator, project.project))
    }

    pub fn new(orchestrator: Orchestrator, project: Option<String>) -> Self {
        Self {
            service: ProvisionService::start(Arc::new(orchestrator)),
            project,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        self.service.orchestrator()
    }
}

/// The project configuration named by the server config, or the defaults.
pub fn load_project(cfg: &AppConfig) -> anyhow::Result<InfragenConfig> {
    match &cfg.project.config {
        Some(path) => InfragenConfig::load_with_context(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => Ok(InfragenConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use std::path::PathBuf;

    #[test]
    fn test_missing_project_config_is_an_error() {
        let cfg = AppConfig {
            project: ProjectConfig {
                config: Some(PathBuf::from("/nonexistent/infragen.yaml")),
            },
            ..AppConfig::default()
        };
        let err = load_project(&cfg).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/infragen.yaml"));
    }

    #[tokio::test]
    async fn test_init_from_loaded_project() {
        let project = load_project(&AppConfig::default()).unwrap();
        let level = project.logging.level.clone();
        let state = AppState::init(project).unwrap();
        assert_eq!(state.orchestrator().parser_kind(), "structured");
        assert!(!level.is_empty());
    }
}
