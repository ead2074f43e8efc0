use config::{Config as ConfigCrate, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for the gateway.
///
/// Loaded once at startup from an optional YAML file plus `HOMEGATE_`
/// prefixed environment variables; immutable afterwards.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Optional display names for scopes, shown on the consent screen
    pub scopes: HashMap<String, String>,

    /// Users and OAuth clients
    pub credentials: CredentialsConfig,

    /// Token signing and lifetime settings
    pub authorization: AuthorizationConfig,

    /// Consent screen texts
    pub consent: ConsentConfig,

    /// Per-route traffic-control overrides
    pub routes: Vec<RouteConfig>,
}

/// HTTP server settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// The port the gateway will listen on (default: 7786)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 7786 }
    }
}

/// Users and OAuth clients
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialsConfig {
    pub users: Vec<UserConfig>,
    pub clients: Vec<ClientConfig>,
}

/// A resource-owner account
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub name: String,
    pub password: String,
    pub scope: String,
}

/// An OAuth client registration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub id: String,
    /// Display name; falls back to the id when empty
    pub name: String,
    pub secret: String,
    /// Exact redirect URIs for the authorization-code flow
    pub redirect_uri: Vec<String>,
    /// Permitted grant options: authorizationCode, clientCredentials, refreshToken
    pub options: String,
    pub scope: String,
}

/// Token signing and lifetime settings
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorizationConfig {
    /// Symmetric signing secret. When absent a random secret is generated
    /// at startup, which invalidates all tokens across a restart.
    pub token_secret: Option<String>,
    pub life_time: LifetimeConfig,
}

/// Per-kind token lifetimes as suffixed duration strings (e.g. "3m", "1h", "90d")
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LifetimeConfig {
    pub code_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Consent screen texts
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsentConfig {
    pub title: Option<String>,
    pub header: Option<String>,
    /// Message shown when the submitted user name or password is wrong
    pub invalid_credentials: Option<String>,
}

/// A per-route override block; every field is optional and only present
/// fields replace the route's static defaults.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteConfig {
    /// Logical route name, e.g. "oauth-token"
    #[serde(rename = "type")]
    pub route_type: String,
    pub path: Option<String>,
    /// "<limit>[,<burst>]", requests per second
    pub rate_limit: Option<String>,
    /// Size string with unit suffixes, e.g. "100kb"
    pub max_body_size: Option<String>,
    /// Comma/semicolon/space separated method list
    pub methods: Option<String>,
    /// Origin regex allow-list; a single "*" means any origin
    pub origin_includes: Vec<String>,
    /// Origin regex deny-list
    pub origin_excludes: Vec<String>,
    /// Value for Access-Control-Allow-Headers
    pub headers: Option<String>,
    pub allow_credentials: Option<bool>,
}

impl GatewayConfig {
    /// Creates a new configuration from an optional file and environment
    /// variables.
    pub fn load(file: Option<&str>) -> Result<Self, String> {
        let mut builder = ConfigCrate::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file));
        }
        builder
            .add_source(
                Environment::with_prefix("HOMEGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    /// Display name for a scope, falling back to its canonical name.
    pub fn scope_display_name<'a>(&'a self, scope: &'a str) -> &'a str {
        self.scopes.get(scope).map(String::as_str).unwrap_or(scope)
    }
}
