//! Configuration schema, canonical defaults, validation, and disk loading.
//!
//! The rest of the crate consumes a validated, immutable [`Config`]: by the
//! time a session starts, every regex compiles, every glob parses, and every
//! enum field holds a supported value. A missing config file yields the
//! defaults; a malformed one is a hard error before any PTY is opened.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allowlist;
use crate::types::{Action, MaskStyle, Mode, SecretType, Severity};

pub const CONFIG_VERSION: u32 = 1;
const CONFIG_REL_PATH: &str = "secretty/config.json";
const DEFAULT_PLACEHOLDER_TEMPLATE: &str = "\u{27e6}REDACTED:{type}\u{27e7}";
const DEFAULT_BLOCK_CHAR: &str = "\u{2588}";

/// Top-level configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub mode: Mode,
    pub strict: StrictConfig,
    pub redaction: RedactionConfig,
    pub masking: MaskingConfig,
    pub overrides: OverridesConfig,
    pub allowlist: AllowlistConfig,
    pub rulesets: RulesetsConfig,
    pub rules: Vec<Rule>,
    pub typed_detectors: Vec<TypedDetector>,
    pub debug: DebugConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrictConfig {
    pub no_reveal: bool,
    pub disable_copy_original: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub default_action: Action,
    pub placeholder_template: String,
    pub include_event_id: bool,
    pub rolling_window_bytes: usize,
    pub status_line: StatusLineConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLineConfig {
    pub enabled: bool,
    pub rate_limit_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    pub style: MaskStyle,
    pub block_char: String,
    pub hex_random_same_length: HexRandomConfig,
    pub stable_hash_token: StableHashConfig,
    pub morse_message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HexRandomConfig {
    pub uppercase: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StableHashConfig {
    pub enabled: bool,
    pub tag_len: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridesConfig {
    pub copy_without_render: CopyWithoutRenderConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyWithoutRenderConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub require_confirm: bool,
    pub backend: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowlistConfig {
    pub enabled: bool,
    pub commands: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesetsConfig {
    pub web3: Web3Ruleset,
    pub api_keys: GenericRuleset,
    pub auth_tokens: GenericRuleset,
    pub cloud: GenericRuleset,
    pub passwords: GenericRuleset,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Web3Ruleset {
    pub enabled: bool,
    pub allow_bare_64hex: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericRuleset {
    pub enabled: bool,
}

impl RulesetsConfig {
    /// Whether rules tagged with `name` are active. Untagged rules are always
    /// active; unknown names are inert.
    pub fn enabled(&self, name: Option<&str>) -> bool {
        match name.unwrap_or("") {
            "" => true,
            "web3" => self.web3.enabled,
            "api_keys" => self.api_keys.enabled,
            "auth_tokens" => self.auth_tokens.enabled,
            "cloud" => self.cloud.enabled,
            "passwords" => self.passwords.enabled,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[default]
    Regex,
    Typed,
}

/// A detection rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub name: String,
    pub enabled: bool,
    pub kind: RuleKind,
    /// Explicit action; `None` falls back to `redaction.default_action`.
    pub action: Option<Action>,
    pub severity: Severity,
    pub secret_type: SecretType,
    pub ruleset: Option<String>,
    pub regex: Option<RegexRule>,
    pub context_keywords: Vec<String>,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            kind: RuleKind::Regex,
            action: None,
            severity: Severity::High,
            secret_type: SecretType::Unknown,
            ruleset: None,
            regex: None,
            context_keywords: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexRule {
    pub pattern: String,
    /// Capture group carrying the secret; 0 is the whole match.
    pub group: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedDetectorKind {
    #[default]
    #[serde(rename = "EVM_PRIVATE_KEY")]
    EvmPrivateKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TypedDetector {
    pub name: String,
    pub enabled: bool,
    pub kind: TypedDetectorKind,
    pub action: Option<Action>,
    pub severity: Severity,
    pub secret_type: SecretType,
    pub ruleset: Option<String>,
    pub context_keywords: Vec<String>,
}

impl Default for TypedDetector {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            kind: TypedDetectorKind::EvmPrivateKey,
            action: None,
            severity: Severity::High,
            secret_type: SecretType::EvmPrivateKey,
            ruleset: None,
            context_keywords: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            default_action: Action::Mask,
            placeholder_template: DEFAULT_PLACEHOLDER_TEMPLATE.to_string(),
            include_event_id: false,
            rolling_window_bytes: 32768,
            status_line: StatusLineConfig::default(),
        }
    }
}

impl Default for StatusLineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_ms: 2000,
        }
    }
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            style: MaskStyle::Glow,
            block_char: DEFAULT_BLOCK_CHAR.to_string(),
            hex_random_same_length: HexRandomConfig::default(),
            stable_hash_token: StableHashConfig::default(),
            morse_message: "SECRETTY".to_string(),
        }
    }
}

impl Default for StableHashConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tag_len: 8,
        }
    }
}

impl Default for CopyWithoutRenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 30,
            require_confirm: true,
            backend: "auto".to_string(),
        }
    }
}

/// The canonical default configuration, including the built-in ruleset.
pub fn default_config() -> Config {
    Config {
        version: CONFIG_VERSION,
        mode: Mode::Strict,
        strict: StrictConfig {
            no_reveal: true,
            disable_copy_original: false,
        },
        redaction: RedactionConfig::default(),
        masking: MaskingConfig::default(),
        overrides: OverridesConfig::default(),
        allowlist: AllowlistConfig::default(),
        rulesets: RulesetsConfig {
            web3: Web3Ruleset {
                enabled: true,
                allow_bare_64hex: false,
            },
            api_keys: GenericRuleset { enabled: false },
            auth_tokens: GenericRuleset { enabled: false },
            cloud: GenericRuleset { enabled: false },
            passwords: GenericRuleset { enabled: false },
        },
        rules: default_rules(),
        typed_detectors: vec![TypedDetector {
            name: "evm_private_key".to_string(),
            ruleset: Some("web3".to_string()),
            context_keywords: strings(&["private_key", "--private-key", "secret", "sk="]),
            ..TypedDetector::default()
        }],
        debug: DebugConfig::default(),
    }
}

fn default_rules() -> Vec<Rule> {
    let regex_rule = |name: &str,
                      secret_type: SecretType,
                      ruleset: &str,
                      pattern: &str,
                      group: usize,
                      keywords: &[&str]| Rule {
        name: name.to_string(),
        secret_type,
        ruleset: Some(ruleset.to_string()),
        regex: Some(RegexRule {
            pattern: pattern.to_string(),
            group,
        }),
        context_keywords: strings(keywords),
        ..Rule::default()
    };

    vec![
        regex_rule(
            "env_private_key",
            SecretType::EvmPrivateKey,
            "web3",
            r"(?i)\bPRIVATE_KEY\s*=\s*([^\s]+)",
            1,
            &["private_key", "secret", "sk", "--private-key"],
        ),
        regex_rule(
            "api_key_label",
            SecretType::ApiKey,
            "api_keys",
            r"(?i)\b([A-Z0-9_]*API[_-]?KEY|x-api-key|client[_-]?secret|secret[_-]?key)\b\s*[:=]\s*([A-Za-z0-9_\-]{16,})",
            2,
            &["api_key", "x-api-key", "client_secret", "secret_key"],
        ),
        regex_rule(
            "stripe_key",
            SecretType::ApiKey,
            "api_keys",
            r"\b(sk_(live|test)_[0-9a-zA-Z]{16,})\b",
            1,
            &[],
        ),
        regex_rule(
            "github_pat",
            SecretType::ApiKey,
            "api_keys",
            r"\bghp_[A-Za-z0-9]{36}\b",
            0,
            &[],
        ),
        regex_rule(
            "bearer_token",
            SecretType::AuthToken,
            "auth_tokens",
            r"(?i)\bBearer\s+([A-Za-z0-9\-._~+/]{20,}={0,2})",
            1,
            &[],
        ),
        regex_rule(
            "auth_token_label",
            SecretType::AuthToken,
            "auth_tokens",
            r"(?i)\b(access|refresh|auth)[_-]?token\b\s*[:=]\s*([^\s]+)",
            2,
            &["token", "auth", "access", "refresh"],
        ),
        regex_rule(
            "jwt_token",
            SecretType::Jwt,
            "auth_tokens",
            r"\b(eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+)\b",
            1,
            &[],
        ),
        regex_rule(
            "aws_access_key_id",
            SecretType::CloudCred,
            "cloud",
            r"\bAKIA[0-9A-Z]{16}\b",
            0,
            &[],
        ),
        regex_rule(
            "aws_secret_access_key",
            SecretType::CloudCred,
            "cloud",
            r"(?i)\baws_secret_access_key\b\s*[:=]\s*([A-Za-z0-9/+=]{40})",
            1,
            &["aws", "secret_access_key"],
        ),
        regex_rule(
            "password_label",
            SecretType::Password,
            "passwords",
            r"(?i)\b(password|passwd|pwd|passphrase)\b\s*[:=]\s*([^\s]+)",
            2,
            &["password", "pwd", "passphrase"],
        ),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// One message per failed validation check.
    Invalid(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "read config: {err}"),
            Self::Parse(err) => write!(f, "parse config: {err}"),
            Self::Invalid(errs) => write!(f, "invalid config: {}", errs.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Default on-disk location: `$XDG_CONFIG_HOME/secretty/config.json`, else
/// `~/.config/secretty/config.json`.
pub fn default_path() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        let xdg = xdg.to_string_lossy().trim().to_string();
        if !xdg.is_empty() {
            return Some(Path::new(&xdg).join(CONFIG_REL_PATH));
        }
    }
    std::env::var_os("HOME")
        .map(|home| Path::new(&home).join(".config").join(CONFIG_REL_PATH))
}

/// Parses config content, applying defaults for absent fields.
pub fn parse(data: &[u8]) -> Result<Config, ConfigError> {
    let cfg: Config = serde_json::from_slice(data).map_err(ConfigError::Parse)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Loads config from `path_override` or the default location.
///
/// Returns the config and whether a file was found; a missing file yields
/// validated defaults.
pub fn load(path_override: Option<&Path>) -> Result<(Config, bool), ConfigError> {
    let path = match path_override {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) => path,
            None => {
                let cfg = default_config();
                cfg.validate()?;
                return Ok((cfg, false));
            }
        },
    };
    match std::fs::read(&path) {
        Ok(data) => Ok((parse(&data)?, true)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let cfg = default_config();
            cfg.validate()?;
            Ok((cfg, false))
        }
        Err(err) => Err(ConfigError::Io(err)),
    }
}

impl Config {
    /// Enforces the supported schema; all failures are aggregated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = Vec::new();
        if self.version != CONFIG_VERSION {
            errs.push(format!("version must be {CONFIG_VERSION}"));
        }
        if self.redaction.placeholder_template.is_empty() {
            errs.push("redaction.placeholder_template is required".to_string());
        }
        if self.masking.block_char.is_empty() {
            errs.push("masking.block_char is required".to_string());
        }
        if self.overrides.copy_without_render.backend.is_empty() {
            errs.push("overrides.copy_without_render.backend is required".to_string());
        } else if !valid_backend(&self.overrides.copy_without_render.backend) {
            errs.push(
                "overrides.copy_without_render.backend must be one of: auto, pbcopy, wl-copy, xclip, xsel, none"
                    .to_string(),
            );
        }
        for (i, entry) in self.allowlist.commands.iter().enumerate() {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                errs.push(format!("allowlist.commands[{i}] must not be empty"));
                continue;
            }
            if let Err(err) = allowlist::check_pattern(trimmed) {
                errs.push(format!("allowlist.commands[{i}] has invalid pattern: {err}"));
            }
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.name.is_empty() {
                errs.push(format!("rules[{i}].name is required"));
            }
            match rule.kind {
                RuleKind::Regex => match &rule.regex {
                    None => errs.push(format!("rules[{i}].regex is required for regex rule")),
                    Some(regex) => {
                        if regex.pattern.is_empty() {
                            errs.push(format!("rules[{i}].regex.pattern is required"));
                        } else if let Err(err) = regex::bytes::Regex::new(&regex.pattern) {
                            errs.push(format!("rules[{i}].regex.pattern is invalid: {err}"));
                        }
                    }
                },
                RuleKind::Typed => {}
            }
            if let Some(ruleset) = rule.ruleset.as_deref() {
                if !valid_ruleset(ruleset) {
                    errs.push(format!("rules[{i}].ruleset is not supported"));
                }
            }
        }
        for (i, det) in self.typed_detectors.iter().enumerate() {
            if det.name.is_empty() {
                errs.push(format!("typed_detectors[{i}].name is required"));
            }
            if let Some(ruleset) = det.ruleset.as_deref() {
                if !valid_ruleset(ruleset) {
                    errs.push(format!("typed_detectors[{i}].ruleset is not supported"));
                }
            }
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errs))
        }
    }
}

fn valid_ruleset(name: &str) -> bool {
    matches!(
        name,
        "web3" | "api_keys" | "auth_tokens" | "cloud" | "passwords"
    )
}

fn valid_backend(backend: &str) -> bool {
    matches!(
        backend.trim().to_ascii_lowercase().as_str(),
        "auto" | "pbcopy" | "wl-copy" | "xclip" | "xsel" | "none"
    )
}
