//! Immutable table of users and OAuth clients, built once at startup.

use crate::config::CredentialsConfig;
use crate::errors::ConfigReport;
use crate::scope::ScopeSet;
use std::collections::HashMap;

/// Bitmask of grant options a client is permitted to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions(u32);

impl ClientOptions {
    pub const AUTHORIZATION_CODE: ClientOptions = ClientOptions(1);
    pub const CLIENT_CREDENTIALS: ClientOptions = ClientOptions(1 << 1);
    pub const REFRESH_TOKEN: ClientOptions = ClientOptions(1 << 2);

    /// Parses a comma/semicolon/whitespace separated option list,
    /// case-insensitively. Unknown words are a hard error.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut options = ClientOptions::default();
        for word in text
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|w| !w.is_empty())
        {
            match word.to_ascii_lowercase().as_str() {
                "authorizationcode" => options.0 |= Self::AUTHORIZATION_CODE.0,
                "clientcredentials" => options.0 |= Self::CLIENT_CREDENTIALS.0,
                "refreshtoken" => options.0 |= Self::REFRESH_TOKEN.0,
                _ => return Err(format!("unknown option '{word}'")),
            }
        }
        Ok(options)
    }

    pub fn contains(self, other: ClientOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A resource-owner account.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub name: String,
    pub password: String,
    pub scope: ScopeSet,
}

/// A registered OAuth client.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
    pub secret: String,
    pub redirect_uris: Vec<String>,
    pub options: ClientOptions,
    pub scope: ScopeSet,
}

impl ClientInfo {
    /// Exact string match against the registered redirect URIs. No prefix,
    /// suffix or normalization matching: an open-redirect guard.
    pub fn matches_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// Process-wide credential table, shared read-only by all request handlers.
#[derive(Debug, Default)]
pub struct CredentialStore {
    users: HashMap<String, UserInfo>,
    clients: HashMap<String, ClientInfo>,
}

impl CredentialStore {
    /// Builds the store from configuration, reporting every problem found.
    pub fn from_config(config: &CredentialsConfig, report: &mut ConfigReport) -> Self {
        let mut store = CredentialStore::default();

        for (i, user) in config.users.iter().enumerate() {
            if user.name.is_empty() {
                report.push(format!("credentials.users, user {i}: name cannot be empty"));
            } else if store.users.contains_key(&user.name) {
                report.push(format!(
                    "credentials.users, user {i}: name '{}' already exists",
                    user.name
                ));
            }
            if user.password.is_empty() {
                report.push(format!(
                    "credentials.users, user {i}: password cannot be empty"
                ));
            }
            let scope = match ScopeSet::parse(&user.scope) {
                Ok(scope) => scope,
                Err(e) => {
                    report.push(format!("credentials.users, user {i}: {e}"));
                    ScopeSet::new()
                }
            };
            if scope.is_empty() {
                report.push(format!("credentials.users, user {i}: scope cannot be empty"));
            }
            store.users.insert(
                user.name.clone(),
                UserInfo {
                    name: user.name.clone(),
                    password: user.password.clone(),
                    scope,
                },
            );
        }

        for (i, client) in config.clients.iter().enumerate() {
            if client.id.is_empty() {
                report.push(format!("credentials.clients, client {i}: id cannot be empty"));
            } else if store.clients.contains_key(&client.id) {
                report.push(format!(
                    "credentials.clients, client {i}: id '{}' already exists",
                    client.id
                ));
            }
            if client.secret.is_empty() {
                report.push(format!(
                    "credentials.clients, client {i}: secret cannot be empty"
                ));
            }

            let options = match ClientOptions::parse(&client.options) {
                Ok(options) if options.is_empty() => {
                    report.push(format!(
                        "credentials.clients, client {i}: at least one option must be specified"
                    ));
                    options
                }
                Ok(options) => options,
                Err(e) => {
                    report.push(format!(
                        "credentials.clients, client {i}: invalid options: {e}"
                    ));
                    ClientOptions::default()
                }
            };

            if options.contains(ClientOptions::AUTHORIZATION_CODE)
                && !client.redirect_uri.iter().any(|uri| !uri.is_empty())
            {
                report.push(format!(
                    "credentials.clients, client {i}: at least one non-empty redirectUri \
                     must be present if the authorizationCode option is set"
                ));
            }

            let scope = match ScopeSet::parse(&client.scope) {
                Ok(scope) => scope,
                Err(e) => {
                    report.push(format!("credentials.clients, client {i}: {e}"));
                    ScopeSet::new()
                }
            };
            if scope.is_empty() {
                report.push(format!(
                    "credentials.clients, client {i}: scope cannot be empty"
                ));
            }

            let name = if client.name.is_empty() {
                client.id.clone()
            } else {
                client.name.clone()
            };
            store.clients.insert(
                client.id.clone(),
                ClientInfo {
                    id: client.id.clone(),
                    name,
                    secret: client.secret.clone(),
                    redirect_uris: client.redirect_uri.clone(),
                    options,
                    scope,
                },
            );
        }

        store
    }

    pub fn lookup_client(&self, client_id: &str) -> Option<&ClientInfo> {
        self.clients.get(client_id)
    }

    pub fn lookup_user(&self, user_name: &str) -> Option<&UserInfo> {
        self.users.get(user_name)
    }

    /// Verifies a user name/password pair. Returns `None` both for an
    /// unknown user and for a wrong password.
    pub fn verify_user(&self, user_name: &str, password: &str) -> Option<&UserInfo> {
        self.users
            .get(user_name)
            .filter(|user| user.password == password)
    }
}
