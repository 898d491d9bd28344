use crate::resolution::ResolutionService;
use std::sync::Arc;

pub struct AppState {
    pub service: Arc<ResolutionService>,
}
