//! Fixed catalogue of logical routes with per-route traffic controls.
//!
//! Every route starts from static defaults; configuration may override
//! individual fields. The resolved table is immutable after startup —
//! only the rate-limiter buckets mutate at runtime.

pub mod parse;
pub mod pipeline;
pub mod rate;

use crate::config::RouteConfig;
use crate::errors::ConfigReport;
use http::Method;
use regex::Regex;
use std::collections::HashMap;

/// Logical route identifiers. Collaborator handlers register against
/// these rather than raw paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    OAuthAuthorize,
    OAuthToken,
    HomeHealth,
    HomeUnlink,
    HomeDevices,
    HomeQuery,
    HomeAction,
    DialogsTales,
}

impl RouteId {
    pub const ALL: [RouteId; 8] = [
        RouteId::OAuthAuthorize,
        RouteId::OAuthToken,
        RouteId::HomeHealth,
        RouteId::HomeUnlink,
        RouteId::HomeDevices,
        RouteId::HomeQuery,
        RouteId::HomeAction,
        RouteId::DialogsTales,
    ];

    /// Name used for the `type` field of route configuration blocks.
    pub fn config_name(self) -> &'static str {
        match self {
            RouteId::OAuthAuthorize => "oauth-authorize",
            RouteId::OAuthToken => "oauth-token",
            RouteId::HomeHealth => "yandex-home-health",
            RouteId::HomeUnlink => "yandex-home-unlink",
            RouteId::HomeDevices => "yandex-home-devices",
            RouteId::HomeQuery => "yandex-home-query",
            RouteId::HomeAction => "yandex-home-action",
            RouteId::DialogsTales => "yandex-dialogs-tales",
        }
    }

    fn from_config_name(name: &str) -> Option<RouteId> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|id| id.config_name() == name)
    }
}

/// CORS origin policy for a route.
#[derive(Debug, Clone, Default)]
pub enum OriginPolicy {
    /// No origin handling configured; the CORS wrapper is not applied.
    #[default]
    None,
    /// Any origin is echoed back.
    Any,
    /// Origins matching an include pattern (or all, when the include list
    /// is empty) and no exclude pattern are echoed back.
    Patterns {
        includes: Vec<Regex>,
        excludes: Vec<Regex>,
    },
}

impl OriginPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::None => false,
            OriginPolicy::Any => true,
            OriginPolicy::Patterns { includes, excludes } => {
                (includes.is_empty() || includes.iter().any(|re| re.is_match(origin)))
                    && !excludes.iter().any(|re| re.is_match(origin))
            }
        }
    }
}

/// Resolved traffic-control parameters for one route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub id: RouteId,
    pub path: String,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: f64,
    pub rate_burst: u32,
    /// Maximum request body in bytes; 0 disables the limit.
    pub max_body_size: usize,
    pub methods: Vec<Method>,
    pub origins: OriginPolicy,
    /// Extra value for Access-Control-Allow-Headers.
    pub headers: Option<String>,
    pub allow_credentials: bool,
}

fn default_descriptor(id: RouteId) -> RouteDescriptor {
    let (path, rate_limit, rate_burst, max_body_size, methods): (_, f64, u32, usize, &[Method]) =
        match id {
            RouteId::OAuthAuthorize => (
                "/authorize",
                10.0,
                3,
                4096,
                &[Method::GET, Method::POST, Method::OPTIONS],
            ),
            RouteId::OAuthToken => (
                "/token",
                20.0,
                5,
                8196,
                &[Method::GET, Method::POST, Method::OPTIONS],
            ),
            RouteId::HomeHealth => (
                "/yandex/home/v1.0",
                50.0,
                10,
                256,
                &[Method::GET, Method::OPTIONS],
            ),
            RouteId::HomeUnlink => (
                "/yandex/home/v1.0/user/unlink",
                10.0,
                3,
                256,
                &[Method::GET, Method::POST, Method::OPTIONS],
            ),
            RouteId::HomeDevices => (
                "/yandex/home/v1.0/user/devices",
                20.0,
                5,
                256,
                &[Method::GET, Method::POST, Method::OPTIONS],
            ),
            RouteId::HomeQuery => (
                "/yandex/home/v1.0/user/devices/query",
                0.0,
                0,
                102_400,
                &[Method::POST, Method::OPTIONS],
            ),
            RouteId::HomeAction => (
                "/yandex/home/v1.0/user/devices/action",
                0.0,
                0,
                512_000,
                &[Method::POST, Method::OPTIONS],
            ),
            RouteId::DialogsTales => (
                "/yandex/dialogs/tales",
                1000.0,
                300,
                102_400,
                &[Method::POST, Method::OPTIONS],
            ),
        };
    RouteDescriptor {
        id,
        path: path.to_string(),
        rate_limit,
        rate_burst,
        max_body_size,
        methods: methods.to_vec(),
        origins: OriginPolicy::None,
        headers: None,
        allow_credentials: false,
    }
}

/// Named overrides for a route's defaults. Presence is tracked by
/// optionality; an absent field leaves the default untouched.
#[derive(Debug, Clone, Default)]
pub struct RouteOverride {
    pub path: Option<String>,
    pub rate: Option<(f64, u32)>,
    pub max_body_size: Option<usize>,
    pub methods: Option<Vec<Method>>,
    pub origins: Option<OriginPolicy>,
    pub headers: Option<String>,
    pub allow_credentials: Option<bool>,
}

impl RouteOverride {
    /// Parses the string-typed fields of a configuration block,
    /// reporting every invalid value.
    fn from_config(config: &RouteConfig, report: &mut ConfigReport, ctx: &str) -> Self {
        let mut over = RouteOverride::default();

        if let Some(path) = config.path.as_deref().filter(|p| !p.is_empty()) {
            match parse::parse_path(path) {
                Ok(path) => over.path = Some(path),
                Err(e) => report.push(format!("{ctx}: invalid path '{path}': {e}")),
            }
        }

        if let Some(rate) = config.rate_limit.as_deref().filter(|r| !r.is_empty()) {
            match parse::parse_rate_limit(rate) {
                Ok(parsed) => over.rate = Some(parsed),
                Err(e) => report.push(format!("{ctx}: invalid rateLimit value '{rate}': {e}")),
            }
        }

        if let Some(size) = config.max_body_size.as_deref().filter(|s| !s.is_empty()) {
            match parse::parse_size(size) {
                Ok(parsed) if parsed >= 0 => over.max_body_size = Some(parsed as usize),
                Ok(_) => report.push(format!(
                    "{ctx}: invalid maxBodySize value '{size}': negative value not allowed"
                )),
                Err(e) => report.push(format!("{ctx}: invalid maxBodySize value '{size}': {e}")),
            }
        }

        if let Some(methods) = config.methods.as_deref().filter(|m| !m.is_empty()) {
            match parse::parse_methods(methods) {
                Ok(parsed) => over.methods = Some(parsed),
                Err(e) => report.push(format!("{ctx}: invalid methods value '{methods}': {e}")),
            }
        }

        if !config.origin_includes.is_empty() || !config.origin_excludes.is_empty() {
            over.origins = Some(Self::parse_origins(config, report, ctx));
        }

        over.headers = config.headers.clone().filter(|h| !h.is_empty());
        over.allow_credentials = config.allow_credentials;
        over
    }

    fn parse_origins(config: &RouteConfig, report: &mut ConfigReport, ctx: &str) -> OriginPolicy {
        if config.origin_excludes.is_empty()
            && config.origin_includes.len() == 1
            && config.origin_includes[0] == "*"
        {
            return OriginPolicy::Any;
        }
        let mut compile = |patterns: &[String], kind: &str| {
            let mut compiled = Vec::new();
            for (i, pattern) in patterns.iter().enumerate() {
                match Regex::new(pattern) {
                    Ok(re) => compiled.push(re),
                    Err(e) => report.push(format!("{ctx}: invalid origin {kind} regex {i}: {e}")),
                }
            }
            compiled
        };
        OriginPolicy::Patterns {
            includes: compile(&config.origin_includes, "include"),
            excludes: compile(&config.origin_excludes, "exclude"),
        }
    }

    /// Applies the present fields onto a descriptor.
    pub fn apply(self, descriptor: &mut RouteDescriptor) {
        if let Some(path) = self.path {
            descriptor.path = path;
        }
        if let Some((rate_limit, rate_burst)) = self.rate {
            descriptor.rate_limit = rate_limit;
            descriptor.rate_burst = rate_burst;
        }
        if let Some(max_body_size) = self.max_body_size {
            descriptor.max_body_size = max_body_size;
        }
        if let Some(methods) = self.methods {
            descriptor.methods = methods;
        }
        if let Some(origins) = self.origins {
            descriptor.origins = origins;
        }
        if let Some(headers) = self.headers {
            descriptor.headers = Some(headers);
        }
        if let Some(allow_credentials) = self.allow_credentials {
            descriptor.allow_credentials = allow_credentials;
        }
    }
}

/// The resolved, immutable route table.
#[derive(Debug)]
pub struct RouteRegistry {
    routes: HashMap<RouteId, RouteDescriptor>,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self {
            routes: RouteId::ALL
                .into_iter()
                .map(|id| (id, default_descriptor(id)))
                .collect(),
        }
    }
}

impl RouteRegistry {
    /// Builds the table from defaults plus configuration overrides and
    /// verifies that every resolved path is distinct.
    pub fn from_config(overrides: &[RouteConfig], report: &mut ConfigReport) -> Self {
        let mut registry = RouteRegistry::default();

        for (i, config) in overrides.iter().enumerate() {
            let ctx = format!("routes, route {i}");
            let Some(id) = RouteId::from_config_name(&config.route_type) else {
                report.push(format!("{ctx}: unknown type '{}'", config.route_type));
                continue;
            };
            let over = RouteOverride::from_config(config, report, &ctx);
            if let Some(descriptor) = registry.routes.get_mut(&id) {
                over.apply(descriptor);
            }
        }

        let mut seen: HashMap<&str, RouteId> = HashMap::new();
        for id in RouteId::ALL {
            let path = registry.routes[&id].path.as_str();
            if let Some(other) = seen.insert(path, id) {
                report.push(format!(
                    "routes: path '{path}' is used by both '{}' and '{}'",
                    other.config_name(),
                    id.config_name()
                ));
            }
        }

        registry
    }

    pub fn descriptor(&self, id: RouteId) -> &RouteDescriptor {
        &self.routes[&id]
    }
}
