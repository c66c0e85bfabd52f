use std::sync::Arc;

use async_trait::async_trait;

use fluxbridge_core::api::{
    AppConfig, BackendConfig, GenerationBackend, PredictError, Services, ServicesFactory,
    WeightsProvider,
};

use crate::backend::{ReplayBackend, WebUiBackend};
use crate::weights::WeightsCache;

pub fn build_backend(cfg: &AppConfig) -> Result<Arc<dyn GenerationBackend>, PredictError> {
    match &cfg.backend {
        BackendConfig::WebUi(webui_cfg) => Ok(Arc::new(
            WebUiBackend::new(webui_cfg.clone()).map_err(|e| PredictError::Config(e.to_string()))?,
        )),
        BackendConfig::Replay(replay_cfg) => {
            Ok(Arc::new(ReplayBackend::new(replay_cfg.trajectory.clone())))
        }
    }
}

pub fn build_weights(cfg: &AppConfig) -> Result<Arc<dyn WeightsProvider>, PredictError> {
    Ok(Arc::new(WeightsCache::new(&cfg.weights)?))
}

/// Default wiring: config → backend + weights cache.
pub struct StandardServicesFactory;

#[async_trait]
impl ServicesFactory for StandardServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, PredictError> {
        Ok(Services {
            backend: build_backend(cfg)?,
            weights: Some(build_weights(cfg)?),
        })
    }
}
