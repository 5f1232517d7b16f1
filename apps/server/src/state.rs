use axum::extract::FromRef;
use stash_domain::config::ApiConfig;
use stash_uploads::Uploads;

/// Shared application state handed to every handler.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub config: ApiConfig,
    pub uploads: Uploads,
}

impl FromRef<ApiState> for Uploads {
    fn from_ref(state: &ApiState) -> Self {
        state.uploads.clone()
    }
}

impl FromRef<ApiState> for ApiConfig {
    fn from_ref(state: &ApiState) -> Self {
        state.config.clone()
    }
}
