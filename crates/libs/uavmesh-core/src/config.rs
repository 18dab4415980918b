//! `NodeConfig`: a one-shot key=value config file parser (spec.md §6,
//! grounded in `original_source/sys_config.cpp`). Unlike the rest of this
//! workspace's daemons (which use `toml` + `serde`), the wire format here
//! is fixed by the original system and part of the external interface, so
//! we parse it by hand the way `sys_config.cpp::loadConfigFromFile` does:
//! one `key=value` pair per line, unknown keys logged and ignored.

use crate::ip::{NodeIp, Position};
use crate::ports::BROADCAST_IP;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("config line {line_no} is not in key=value form: {line:?}")]
    MalformedLine { line_no: usize, line: String },
    #[error("config key {key} has an invalid value {value:?}: {reason}")]
    InvalidValue { key: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Sink,
    Common,
}

/// Parsed, validated node configuration. Read once at startup
/// (`original_source/sys_config.cpp`'s `NodeConfig()` constructor loads
/// its file exactly once and exits the process on failure); this crate
/// leaves the exit-on-failure decision to the daemon's `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub role: NodeRole,
    pub position: Position,
    pub my_ip: NodeIp,
    pub sink_ip: NodeIp,
    pub controller_ip: NodeIp,
    pub sink_ip_to_controller: NodeIp,
    pub broadcast_ip: NodeIp,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            role: NodeRole::Common,
            position: Position::ORIGIN,
            my_ip: NodeIp::UNSPECIFIED,
            sink_ip: NodeIp::UNSPECIFIED,
            controller_ip: NodeIp::UNSPECIFIED,
            sink_ip_to_controller: NodeIp::UNSPECIFIED,
            broadcast_ip: NodeIp::from_str(BROADCAST_IP).expect("fixed broadcast literal"),
        }
    }
}

impl NodeConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut cfg = NodeConfig::default();

        for (idx, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line_no: idx + 1,
                    line: raw_line.to_string(),
                });
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "positionX" => cfg.position.x = parse_f64("positionX", value)?,
                "positionY" => cfg.position.y = parse_f64("positionY", value)?,
                "myIP_s" => cfg.my_ip = parse_ip("myIP_s", value)?,
                "sinkNodeIP_s" => cfg.sink_ip = parse_ip("sinkNodeIP_s", value)?,
                "controllerIP_s" => cfg.controller_ip = parse_ip("controllerIP_s", value)?,
                "sinkIP2Ctrler_s" => cfg.sink_ip_to_controller = parse_ip("sinkIP2Ctrler_s", value)?,
                other => log::warn!("Unknown parameter: {other}"),
            }
        }

        cfg.role = if cfg.my_ip == cfg.sink_ip { NodeRole::Sink } else { NodeRole::Common };
        Ok(cfg)
    }

    pub fn is_sink(&self) -> bool {
        self.role == NodeRole::Sink
    }
}

fn parse_f64(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_ip(key: &'static str, value: &str) -> Result<NodeIp, ConfigError> {
    NodeIp::from_str(value).map_err(|e| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let cfg = NodeConfig::parse(
            "positionX=1.5\npositionY=2.5\nmyIP_s=192.168.2.100\nsinkNodeIP_s=192.168.2.101\n",
        )
        .unwrap();
        assert_eq!(cfg.position, Position::new(1.5, 2.5));
        assert_eq!(cfg.my_ip, NodeIp::from_str("192.168.2.100").unwrap());
        assert_eq!(cfg.role, NodeRole::Common);
    }

    #[test]
    fn sink_role_when_my_ip_equals_sink_ip() {
        let cfg = NodeConfig::parse("myIP_s=192.168.2.100\nsinkNodeIP_s=192.168.2.100\n").unwrap();
        assert_eq!(cfg.role, NodeRole::Sink);
    }

    #[test]
    fn unknown_key_is_ignored_not_fatal() {
        let cfg = NodeConfig::parse("positionX=1.0\nfrobnicate=yes\n").unwrap();
        assert_eq!(cfg.position.x, 1.0);
    }

    #[test]
    fn malformed_line_is_rejected() {
        let err = NodeConfig::parse("not-a-kv-line").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { .. }));
    }

    #[test]
    fn broadcast_ip_is_fixed_regardless_of_file_contents() {
        let cfg = NodeConfig::parse("positionX=1.0\n").unwrap();
        assert_eq!(cfg.broadcast_ip, NodeIp::from_str(BROADCAST_IP).unwrap());
    }
}
