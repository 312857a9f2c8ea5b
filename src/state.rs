use std::sync::Arc;

use crate::{config::ErrorResponseConfig, localize::Localize};

/// State for the `localize_errors` middleware.
#[derive(Clone)]
pub struct ErrorLayerState {
    pub localizer: Arc<dyn Localize + Send + Sync>,
    pub config: ErrorResponseConfig,
}

impl ErrorLayerState {
    pub fn new(
        localizer: impl Localize + Send + Sync + 'static,
        config: ErrorResponseConfig,
    ) -> Self {
        Self {
            localizer: Arc::new(localizer),
            config,
        }
    }
}
