use std::str::FromStr;

use concord_types::Identity;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::raw::RawConfig;

/// Which concrete [`concord_backend::Backend`] a coordinator instance talks
/// to (spec §6's "Configuration knobs": `backend_choice`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    Etcd,
    Consul,
}

impl FromStr for BackendChoice {
    type Err = String;

    /// Accepts the concrete backend names (`etcd`, `consul`) this crate
    /// actually ships, plus the category labels spec §6 documents the
    /// `backend_choice` knob as (`native-cas`, `http-cas`) as aliases for
    /// them, so a config written against either vocabulary parses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "etcd" | "native-cas" => Ok(BackendChoice::Etcd),
            "consul" | "http-cas" => Ok(BackendChoice::Consul),
            other => Err(format!("unknown backend choice '{other}'")),
        }
    }
}

/// One coordinator instance's configuration (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub self_identity: Identity,
    pub backend_choice: BackendChoice,
    pub backend_endpoint: String,
    pub force_leave: bool,
}

impl Config {
    /// Overlay `CONCORD_*` environment variables onto an already-loaded
    /// config. Only variables that are actually set take effect; everything
    /// else is left as loaded from the file.
    pub fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("CONCORD_SELF_IDENTITY") {
            self.self_identity = Identity::new(v);
        }
        if let Ok(v) = std::env::var("CONCORD_BACKEND_CHOICE") {
            self.backend_choice = parse_backend_choice(&v)?;
        }
        if let Ok(v) = std::env::var("CONCORD_BACKEND_ENDPOINT") {
            self.backend_endpoint = v;
        }
        if let Ok(v) = std::env::var("CONCORD_FORCE_LEAVE") {
            self.force_leave = v == "1" || v.eq_ignore_ascii_case("true");
        }
        Ok(self)
    }

    /// Build a config entirely from `CONCORD_*` environment variables, for
    /// library callers that don't go through a config file or the CLI.
    pub fn from_env() -> Result<Self, ConfigError> {
        let self_identity = require_env("CONCORD_SELF_IDENTITY")?;
        let backend_endpoint = require_env("CONCORD_BACKEND_ENDPOINT")?;
        let backend_choice = std::env::var("CONCORD_BACKEND_CHOICE")
            .unwrap_or_else(|_| "etcd".to_string());
        let force_leave = std::env::var("CONCORD_FORCE_LEAVE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Config {
            self_identity: Identity::new(self_identity),
            backend_choice: parse_backend_choice(&backend_choice)?,
            backend_endpoint,
            force_leave,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_backend_choice(s: &str) -> Result<BackendChoice, ConfigError> {
    s.parse().map_err(|message| ConfigError::Conversion {
        path: "CONCORD_BACKEND_CHOICE".to_string(),
        message,
    })
}

pub(crate) fn convert(raw: RawConfig, path: &str) -> Result<Config, ConfigError> {
    let backend_choice = raw.backend_choice.parse().map_err(|message| ConfigError::Conversion {
        path: path.to_string(),
        message,
    })?;

    Ok(Config {
        self_identity: Identity::new(raw.self_identity),
        backend_choice,
        backend_endpoint: raw.backend_endpoint,
        force_leave: raw.force_leave,
    })
}
