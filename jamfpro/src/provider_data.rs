//! Provider data passed to resources

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct JamfProProviderData {
    pub client: Arc<Client>,
}

impl JamfProProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
