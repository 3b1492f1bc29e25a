//! Shared vocabulary types for modes, actions, mask styles, and secret labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operational mode controlling redaction behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Demo,
    #[default]
    Strict,
    Warn,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo => write!(f, "demo"),
            Self::Strict => write!(f, "strict"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// How a matched span is rewritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Mask,
    Placeholder,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mask => write!(f, "mask"),
            Self::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Rendering style for the mask action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskStyle {
    Block,
    #[default]
    Glow,
    Morse,
}

/// Category label attached to a detected secret.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretType {
    #[serde(rename = "EVM_PK")]
    EvmPrivateKey,
    #[serde(rename = "API_KEY")]
    ApiKey,
    #[serde(rename = "AUTH_TOKEN")]
    AuthToken,
    #[serde(rename = "JWT")]
    Jwt,
    #[serde(rename = "CLOUD_CRED")]
    CloudCred,
    #[serde(rename = "PASSWORD")]
    Password,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl SecretType {
    /// Stable wire/UI name for the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvmPrivateKey => "EVM_PK",
            Self::ApiKey => "API_KEY",
            Self::AuthToken => "AUTH_TOKEN",
            Self::Jwt => "JWT",
            Self::CloudCred => "CLOUD_CRED",
            Self::Password => "PASSWORD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitivity of a rule or detector; orders overlap resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Med,
    #[default]
    High,
}

impl Severity {
    /// Integer rank used by the overlap sweep (high > med > low).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Med => 2,
            Self::High => 3,
        }
    }
}
