use std::sync::Arc;

use profilex_core::ProfilePipeline;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ProfilePipeline>,
}

impl AppState {
    pub fn new(pipeline: ProfilePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
