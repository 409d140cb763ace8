pub mod api;
pub mod config;
pub mod crud;
pub mod logging;
pub mod provider_data;
pub mod resources;
pub mod waitfor;

pub use config::ProviderConfig;
pub use provider_data::JamfProProviderData;

use tfplug::types::{Config, Diagnostics};
use tfplug::Resource;

pub struct JamfProProvider {
    provider_data: Option<JamfProProviderData>,
}

impl Default for JamfProProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl JamfProProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    pub fn resource_types() -> &'static [&'static str] {
        &[resources::building::TYPE_NAME]
    }

    /// Build the API client from provider config and environment
    pub fn configure(&mut self, config: &Config) -> Diagnostics {
        logging::init();

        let settings = match ProviderConfig::from_config(config) {
            Ok(settings) => settings,
            Err(diags) => return diags,
        };

        let mut diags = Diagnostics::new();

        match api::Client::new(&settings) {
            Ok(client) => {
                tracing::info!(
                    instance = %settings.instance_url,
                    auth_method = settings.auth.name(),
                    "Configured Jamf Pro provider"
                );
                self.provider_data = Some(JamfProProviderData::new(client));
            }
            Err(e) => {
                diags.add_error("Failed to create API client", e.to_string());
            }
        }

        diags
    }

    pub fn create_resource(&self, name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let provider_data = self
            .provider_data
            .as_ref()
            .ok_or(tfplug::TfplugError::ProviderNotConfigured)?
            .clone();

        match name {
            resources::building::TYPE_NAME => {
                Ok(Box::new(resources::BuildingResource::new(provider_data)))
            }
            _ => Err(format!("Unknown resource: {}", name).into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            config::ENV_INSTANCE_FQDN,
            config::ENV_AUTH_METHOD,
            config::ENV_CLIENT_ID,
            config::ENV_CLIENT_SECRET,
            config::ENV_BASIC_USERNAME,
            config::ENV_BASIC_PASSWORD,
        ] {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var(config::ENV_INSTANCE_FQDN, "example.jamfcloud.com");
        std::env::set_var(config::ENV_AUTH_METHOD, "oauth2");
        std::env::set_var(config::ENV_CLIENT_ID, "client");
        std::env::set_var(config::ENV_CLIENT_SECRET, "secret");

        let mut provider = JamfProProvider::new();
        let diags = provider.configure(&Config::object());

        assert!(!diags.has_error(), "{}", diags);
        assert!(provider.provider_data.is_some());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_instance() {
        clear_env();
        std::env::set_var(config::ENV_AUTH_METHOD, "basic");
        std::env::set_var(config::ENV_BASIC_USERNAME, "admin");
        std::env::set_var(config::ENV_BASIC_PASSWORD, "pw");

        let mut provider = JamfProProvider::new();
        let diags = provider.configure(&Config::object());

        assert!(diags.has_error());
        assert!(diags
            .errors()
            .any(|d| d.summary.contains("jamfpro_instance_fqdn is required")));
        assert!(provider.provider_data.is_none());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_credentials() {
        clear_env();
        std::env::set_var(config::ENV_INSTANCE_FQDN, "https://jamf.example.com");
        std::env::set_var(config::ENV_AUTH_METHOD, "oauth2");

        let mut provider = JamfProProvider::new();
        let diags = provider.configure(&Config::object());

        let summaries: Vec<_> = diags.errors().map(|d| d.summary.clone()).collect();
        assert!(summaries.contains(&"client_id is required".to_string()));
        assert!(summaries.contains(&"client_secret is required".to_string()));

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_creates_resources_after_configuration() {
        clear_env();
        std::env::set_var(config::ENV_INSTANCE_FQDN, "jamf.example.com");
        std::env::set_var(config::ENV_AUTH_METHOD, "oauth2");
        std::env::set_var(config::ENV_CLIENT_ID, "client");
        std::env::set_var(config::ENV_CLIENT_SECRET, "secret");

        let mut provider = JamfProProvider::new();
        assert!(matches!(
            provider.create_resource("jamfpro_building"),
            Err(tfplug::TfplugError::ProviderNotConfigured)
        ));

        provider.configure(&Config::object());

        let resource = provider.create_resource("jamfpro_building").unwrap();
        assert_eq!(resource.type_name(), "jamfpro_building");

        let unknown_resource = provider.create_resource("unknown_resource");
        assert!(unknown_resource.is_err());

        clear_env();
    }
}
