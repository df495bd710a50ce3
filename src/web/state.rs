use crate::identity::IdentityService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
}

impl AppState {
    pub fn new(identity: Arc<IdentityService>) -> Self {
        Self { identity }
    }
}
