use derive_new::new;

use crate::auth::Authenticator;
use crate::service::ViewTracker;

#[derive(Debug, Clone, new)]
pub struct App {
    pub views: ViewTracker,
    pub auth: Authenticator,
}

impl App {
    pub fn views(&self) -> &ViewTracker {
        &self.views
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }
}
