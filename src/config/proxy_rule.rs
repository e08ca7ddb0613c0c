use std::fmt;
use axum::http::{
    uri::{Authority, Scheme},
    HeaderValue, Uri,
};
use regex::Regex;
use super::{error::ConfigError, server_config::ProxyRuleConfig};

/// A proxy rule ready to be matched against request paths.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    pub pattern: String,
    pub ws: bool,
    pub change_origin: bool,
    /// Only forward when the request is not something the output directory
    /// can answer. Set for rules built from a bare `devServer.proxy` URL.
    pub fallback_only: bool,
    regex: Regex,
    target: Uri,
    authority: Authority,
    base_path: String,
    host: HeaderValue,
    path_rewrite: Vec<(Regex, String)>,
}

impl ProxyRule {
    pub fn compile(pattern: &str, config: &ProxyRuleConfig) -> Result<Self, ConfigError> {
        let field = format!("devServer.proxy.\"{pattern}\"");
        let regex = Regex::new(pattern)
            .map_err(|err| ConfigError::invalid(field.as_str(), format!("invalid pattern: {err}")))?;
        let path_rewrite = config
            .path_rewrite
            .iter()
            .map(|(from, to)| {
                Regex::new(from)
                    .map(|regex| (regex, to.clone()))
                    .map_err(|err| ConfigError::invalid(
                        format!("{field}.pathRewrite.\"{from}\""),
                        format!("invalid pattern: {err}"),
                    ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (target, authority) = parse_target(&config.target, &format!("{field}.target"))?;
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|err| ConfigError::invalid(format!("{field}.target"), err.to_string()))?;
        let base_path = target.path().trim_end_matches('/').to_string();

        Ok(Self {
            pattern: pattern.to_string(),
            ws: config.ws,
            change_origin: config.change_origin,
            fallback_only: false,
            regex,
            target,
            authority,
            base_path,
            host,
            path_rewrite,
        })
    }

    /// Rule for `devServer.proxy = "<url>"`: everything the dev server can't
    /// serve itself goes upstream, websockets included.
    pub fn catch_all(target: &str) -> Result<Self, ConfigError> {
        let config = ProxyRuleConfig {
            target: target.to_string(),
            ws: true,
            change_origin: true,
            path_rewrite: Default::default(),
        };
        let mut rule = Self::compile("^/", &config).map_err(|err| match err {
            ConfigError::Invalid { reason, .. } => ConfigError::invalid("devServer.proxy", reason),
            other => other,
        })?;
        rule.fallback_only = true;
        Ok(rule)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    /// Value for the outbound `Host` header when `changeOrigin` is set.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host
    }

    /// The first matching `pathRewrite` entry is applied, the rest are ignored.
    pub fn rewrite_path(&self, path: &str) -> String {
        for (from, to) in &self.path_rewrite {
            if from.is_match(path) {
                return from.replace(path, to.as_str()).into_owned();
            }
        }
        path.to_string()
    }

    /// Upstream URI for an HTTP request: target base path, then the
    /// (rewritten) request path, then the original query.
    pub fn forward_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        // ws:// targets still take plain HTTP for non-upgrade traffic
        self.build_uri(Scheme::HTTP.as_str(), uri)
    }

    /// Upstream URI for a websocket upgrade.
    pub fn websocket_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        self.build_uri("ws", uri)
    }

    fn build_uri(&self, scheme: &str, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path = self.rewrite_path(uri.path());
        let path = path.trim_start_matches('/');
        let mut path_and_query = format!("{}/{}", self.base_path, path);
        if let Some(query) = uri.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }
        Uri::builder()
            .scheme(scheme)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for ProxyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (ws: {}, changeOrigin: {})",
            self.pattern, self.target, self.ws, self.change_origin
        )
    }
}

fn parse_target(target: &str, field: &str) -> Result<(Uri, Authority), ConfigError> {
    let uri: Uri = target
        .parse()
        .map_err(|err| ConfigError::invalid(field, format!("`{target}` is not a valid URL: {err}")))?;
    match uri.scheme_str() {
        Some("http") | Some("ws") => {}
        Some("https") | Some("wss") => {
            return Err(ConfigError::invalid(field, format!("`{target}`: TLS upstreams are not supported")));
        }
        Some(other) => {
            return Err(ConfigError::invalid(field, format!("`{target}`: unsupported scheme `{other}`")));
        }
        None => {
            return Err(ConfigError::invalid(field, format!("`{target}` must start with http://")));
        }
    }
    let authority = uri
        .authority()
        .cloned()
        .ok_or_else(|| ConfigError::invalid(field, format!("`{target}` has no host")))?;
    Ok((uri, authority))
}

/// First rule whose pattern matches `path`, in document order.
pub fn find_rule<'a>(rules: &'a [ProxyRule], path: &str) -> Option<&'a ProxyRule> {
    rules.iter().find(|rule| rule.matches(path))
}
