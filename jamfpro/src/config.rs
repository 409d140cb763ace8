//! Provider configuration with environment fallbacks

use std::time::Duration;

use tfplug::types::{AttributePath, Config, Diagnostics, Dynamic};
use url::Url;

pub const ENV_INSTANCE_FQDN: &str = "JAMFPRO_INSTANCE_FQDN";
pub const ENV_AUTH_METHOD: &str = "JAMFPRO_AUTH_METHOD";
pub const ENV_CLIENT_ID: &str = "JAMFPRO_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "JAMFPRO_CLIENT_SECRET";
pub const ENV_BASIC_USERNAME: &str = "JAMFPRO_BASIC_USERNAME";
pub const ENV_BASIC_PASSWORD: &str = "JAMFPRO_BASIC_PASSWORD";

const DEFAULT_TOKEN_REFRESH_BUFFER_SECONDS: u64 = 300;
const DEFAULT_MANDATORY_REQUEST_DELAY_MS: u64 = 100;

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    OAuth2 {
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::OAuth2 { .. } => "oauth2",
            AuthMethod::Basic { .. } => "basic",
        }
    }
}

// secrets stay out of logs
impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::OAuth2 { client_id, .. } => f
                .debug_struct("OAuth2")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            AuthMethod::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub instance_url: Url,
    pub auth: AuthMethod,
    pub hide_sensitive_data: bool,
    pub token_refresh_buffer: Duration,
    pub mandatory_request_delay: Duration,
    pub custom_cookies: Vec<CustomCookie>,
}

impl ProviderConfig {
    pub fn new(instance_url: Url, auth: AuthMethod) -> Self {
        Self {
            instance_url,
            auth,
            hide_sensitive_data: true,
            token_refresh_buffer: Duration::from_secs(DEFAULT_TOKEN_REFRESH_BUFFER_SECONDS),
            mandatory_request_delay: Duration::from_millis(DEFAULT_MANDATORY_REQUEST_DELAY_MS),
            custom_cookies: Vec::new(),
        }
    }

    /// Read provider attributes, falling back to environment variables.
    /// Every problem found is reported, not only the first.
    pub fn from_config(config: &Config) -> Result<Self, Diagnostics> {
        let mut diags = Diagnostics::new();

        let instance_url = match string_attr(config, "jamfpro_instance_fqdn", ENV_INSTANCE_FQDN) {
            Some(fqdn) => match parse_instance_url(&fqdn) {
                Ok(url) => Some(url),
                Err(e) => {
                    diags.add_error(
                        "Invalid jamfpro_instance_fqdn",
                        format!("'{}' is not a valid URL: {}", fqdn, e),
                    );
                    None
                }
            },
            None => {
                diags.add_error(
                    "jamfpro_instance_fqdn is required",
                    format!("set it in the provider config or the {} env var", ENV_INSTANCE_FQDN),
                );
                None
            }
        };

        let auth = match string_attr(config, "auth_method", ENV_AUTH_METHOD)
            .map(|m| m.to_lowercase())
            .as_deref()
        {
            Some("oauth2") => {
                let client_id = required(config, "client_id", ENV_CLIENT_ID, &mut diags);
                let client_secret =
                    required(config, "client_secret", ENV_CLIENT_SECRET, &mut diags);
                client_id
                    .zip(client_secret)
                    .map(|(client_id, client_secret)| AuthMethod::OAuth2 {
                        client_id,
                        client_secret,
                    })
            }
            Some("basic") => {
                let username =
                    required(config, "basic_auth_username", ENV_BASIC_USERNAME, &mut diags);
                let password =
                    required(config, "basic_auth_password", ENV_BASIC_PASSWORD, &mut diags);
                username
                    .zip(password)
                    .map(|(username, password)| AuthMethod::Basic { username, password })
            }
            Some(other) => {
                diags.add_error(
                    "Invalid auth_method",
                    format!("'{}' is not supported, expected 'oauth2' or 'basic'", other),
                );
                None
            }
            None => {
                diags.add_error(
                    "auth_method is required",
                    format!("set it in the provider config or the {} env var", ENV_AUTH_METHOD),
                );
                None
            }
        };

        let hide_sensitive_data = config
            .get_bool(&AttributePath::new("hide_sensitive_data"))
            .unwrap_or(true);

        let token_refresh_buffer = Duration::from_secs(positive_number(
            config,
            "token_refresh_buffer_period_seconds",
            DEFAULT_TOKEN_REFRESH_BUFFER_SECONDS,
        ));

        let mandatory_request_delay = Duration::from_millis(positive_number(
            config,
            "mandatory_request_delay_milliseconds",
            DEFAULT_MANDATORY_REQUEST_DELAY_MS,
        ));

        let custom_cookies = custom_cookies(config, &mut diags);

        match (instance_url, auth) {
            (Some(instance_url), Some(auth)) if !diags.has_error() => Ok(Self {
                instance_url,
                auth,
                hide_sensitive_data,
                token_refresh_buffer,
                mandatory_request_delay,
                custom_cookies,
            }),
            _ => Err(diags),
        }
    }
}

/// Accepts a bare host name or a full URL
fn parse_instance_url(fqdn: &str) -> Result<Url, url::ParseError> {
    let fqdn = fqdn.trim().trim_end_matches('/');
    if fqdn.contains("://") {
        Url::parse(fqdn)
    } else {
        Url::parse(&format!("https://{}", fqdn))
    }
}

fn string_attr(config: &Config, name: &str, env: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|s| !s.is_empty()))
}

fn required(config: &Config, name: &str, env: &str, diags: &mut Diagnostics) -> Option<String> {
    let value = string_attr(config, name, env);
    if value.is_none() {
        diags.add_error(
            format!("{} is required", name),
            format!("set it in the provider config or the {} env var", env),
        );
    }
    value
}

fn positive_number(config: &Config, name: &str, default: u64) -> u64 {
    match config.get_number(&AttributePath::new(name)) {
        Ok(n) if n.is_finite() && n > 0.0 => n as u64,
        _ => default,
    }
}

fn custom_cookies(config: &Config, diags: &mut Diagnostics) -> Vec<CustomCookie> {
    let Ok(items) = config.get_list(&AttributePath::new("custom_cookies")) else {
        return Vec::new();
    };

    let mut cookies = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Dynamic::Map(fields) = item else {
            diags.add_error("Invalid custom_cookies", format!("entry {} is not an object", index));
            continue;
        };

        let name = fields.get("name").and_then(Dynamic::as_string);
        let value = fields.get("value").and_then(Dynamic::as_string);

        match (name, value) {
            (Some(name), Some(value)) if !name.is_empty() => cookies.push(CustomCookie {
                name: name.clone(),
                value: value.clone(),
            }),
            _ => diags.add_error(
                "Invalid custom_cookies",
                format!("entry {} needs a non-empty name and a value", index),
            ),
        }
    }

    cookies
}
