use std::fmt;
use std::marker::PhantomData;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use super::{
    error::ConfigError,
    ordered_map::{OrderedMap, OrderedMapVisitor},
    proxy_rule::ProxyRule,
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevConfig {
    pub output_dir: PathBuf,
    pub dev_server: DevServerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevServerConfig {
    /// Signed so that negative values reach validation and get a proper message.
    pub port: i64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_true")]
    pub history_api_fallback: bool,
    #[serde(default)]
    pub proxy: ProxyTable,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProxyRuleConfig {
    pub target: String,
    /// Both switches are on unless the rule turns them off.
    #[serde(default = "default_true")]
    pub ws: bool,
    #[serde(default = "default_true")]
    pub change_origin: bool,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub path_rewrite: OrderedMap<String>,
}

/// `devServer.proxy` is either a table of pattern -> rule, or a bare target
/// URL that catches whatever the output directory can't serve.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyTable {
    Rules(OrderedMap<ProxyRuleConfig>),
    Target(String),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ProxyTable {
    fn default() -> Self {
        ProxyTable::Rules(OrderedMap::new())
    }
}

impl Serialize for ProxyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProxyTable::Rules(rules) => rules.serialize(serializer),
            ProxyTable::Target(target) => serializer.serialize_str(target),
        }
    }
}

struct ProxyTableVisitor;

impl<'de> Visitor<'de> for ProxyTableVisitor {
    type Value = ProxyTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a target URL or a table of proxy rules")
    }

    fn visit_str<E: serde::de::Error>(self, target: &str) -> Result<Self::Value, E> {
        Ok(ProxyTable::Target(target.to_string()))
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        OrderedMapVisitor(PhantomData)
            .visit_map(access)
            .map(ProxyTable::Rules)
    }
}

impl<'de> Deserialize<'de> for ProxyTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ProxyTableVisitor)
    }
}

impl DevConfig {
    /// Checks every field that serde can't check on its own. Rules are
    /// compiled here too so a bad pattern or target is caught before binding.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("outputDir", "must not be empty"));
        }
        self.dev_server.bind_addr()?;
        self.compile_rules().map(|_| ())
    }

    pub fn compile_rules(&self) -> Result<Vec<ProxyRule>, ConfigError> {
        match &self.dev_server.proxy {
            ProxyTable::Rules(rules) => rules
                .iter()
                .map(|(pattern, rule)| ProxyRule::compile(pattern, rule))
                .collect(),
            ProxyTable::Target(target) => Ok(vec![ProxyRule::catch_all(target)?]),
        }
    }
}

impl DevServerConfig {
    pub fn bind_port(&self) -> Result<u16, ConfigError> {
        match u16::try_from(self.port) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ConfigError::invalid(
                "devServer.port",
                format!("{} is outside the range 1..=65535", self.port),
            )),
        }
    }

    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.host.trim().parse().map_err(|_| ConfigError::invalid(
            "devServer.host",
            format!("`{}` is not an IPv4 or IPv6 address", self.host),
        ))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.bind_port()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_port(port: i64) -> DevConfig {
        DevConfig {
            output_dir: PathBuf::from("dist"),
            dev_server: DevServerConfig {
                port,
                host: default_host(),
                history_api_fallback: true,
                proxy: ProxyTable::default(),
            },
        }
    }

    #[test]
    fn port_must_be_in_range() {
        for port in [0, -1, 65536, 70000] {
            let err = config_with_port(port).validate().unwrap_err();
            assert_eq!(err.field(), Some("devServer.port"), "port {port}");
        }
        for port in [1, 8088, 65535] {
            assert!(config_with_port(port).validate().is_ok(), "port {port}");
        }
    }

    #[test]
    fn empty_output_dir_is_rejected() {
        let mut config = config_with_port(8088);
        config.output_dir = PathBuf::new();
        assert_eq!(config.validate().unwrap_err().field(), Some("outputDir"));
    }

    #[test]
    fn bare_target_becomes_catch_all_rule() {
        let config: DevConfig = serde_json::from_str(r#"{
            "outputDir": "dist",
            "devServer": { "port": 8088, "proxy": "http://localhost:4000" }
        }"#).unwrap();
        let rules = config.compile_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].matches("/anything/at/all"));
        assert!(rules[0].fallback_only);
        assert!(rules[0].change_origin);
    }

    #[test]
    fn rule_options_default_to_on() {
        let rule: ProxyRuleConfig = serde_json::from_str(r#"{"target": "http://localhost:8080"}"#).unwrap();
        assert!(rule.ws);
        assert!(rule.change_origin);
        assert!(rule.path_rewrite.is_empty());

        let rule: ProxyRuleConfig = serde_json::from_str(
            r#"{"target": "http://localhost:8080", "ws": false, "changeOrigin": false}"#,
        ).unwrap();
        assert!(!rule.ws);
        assert!(!rule.change_origin);
    }

    #[test]
    fn host_must_be_an_ip_address() {
        let mut config = config_with_port(8088);
        for host in ["", "localhost", "[::1]", "0.0.0.0:80"] {
            config.dev_server.host = host.to_string();
            assert_eq!(config.validate().unwrap_err().field(), Some("devServer.host"), "host {host:?}");
        }

        config.dev_server.host = "::1".to_string();
        config.validate().unwrap();
        assert_eq!(config.dev_server.bind_addr().unwrap().to_string(), "[::1]:8088");

        config.dev_server.host = "127.0.0.1".to_string();
        assert_eq!(config.dev_server.bind_addr().unwrap().to_string(), "127.0.0.1:8088");
    }

    #[test]
    fn serializes_back_to_camel_case() {
        let config = config_with_port(8088);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["outputDir"], "dist");
        assert_eq!(value["devServer"]["port"], 8088);
        assert_eq!(value["devServer"]["historyApiFallback"], true);
    }
}
