use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::hook::{GenerationBackend, PreviewRouter};
use crate::preview::SessionState;
use crate::weights::WeightsProvider;

#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn GenerationBackend>,
    pub weights: Option<Arc<dyn WeightsProvider>>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, PredictError>;
}

#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    router: Arc<PreviewRouter>,
    state: Arc<SessionState>,
    services_factory: Option<Arc<dyn ServicesFactory>>,
}

impl AppContext {
    pub fn new(cfg: AppConfig, services_factory: Option<Arc<dyn ServicesFactory>>) -> Self {
        Self {
            cfg,
            router: Arc::new(PreviewRouter::new()),
            state: Arc::new(SessionState::new()),
            services_factory,
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    /// The request-scoped callback router. One generation in flight at a
    /// time; passing the router explicitly is what replaces the process-wide
    /// callback list of older designs.
    pub fn router(&self) -> Arc<PreviewRouter> {
        self.router.clone()
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn with_config(&self, cfg: AppConfig) -> Self {
        Self {
            cfg,
            router: self.router.clone(),
            state: self.state.clone(),
            services_factory: self.services_factory.clone(),
        }
    }

    pub async fn build_services(&self) -> Result<Services, PredictError> {
        let Some(factory) = self.services_factory.as_ref() else {
            return Err(PredictError::Config(
                "services_factory missing (cannot build backend/weights services)".into(),
            ));
        };
        factory.build_services(&self.cfg).await
    }
}
