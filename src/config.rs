use crate::dns::Name;
use crate::dnssec::constants::MAX_NSEC3_ITERATIONS;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// NSEC3 records with more iterations are treated as insecure answers
    pub max_nsec3_iterations: u16,

    /// Retry signatures that fail only on their validity period, ignoring time
    pub accept_expired: bool,

    /// Upper bound on live validation tasks, nested tasks included
    pub max_tasks: usize,

    /// Seed the trust anchor store with the IANA root anchors
    pub include_root_anchors: bool,

    /// Domains whose answers may never be accepted as insecure
    pub must_be_secure: Vec<String>,

    /// Algorithms treated as unsupported at and below a zone
    pub disabled_algorithms: Vec<ZonePolicyConfig>,

    /// DS digest types treated as unsupported at and below a zone
    pub disabled_digests: Vec<ZonePolicyConfig>,

    pub trust_anchors: Vec<TrustAnchorConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ZonePolicyConfig {
    pub zone: String,
    pub values: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    #[default]
    Ds,
    Key,
}

/// A configured trust anchor: a DS digest (hex) or a DNSKEY (base64)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TrustAnchorConfig {
    pub name: String,
    #[serde(default)]
    pub kind: AnchorKind,
    pub key_tag: Option<u16>,
    pub algorithm: u8,
    pub digest_type: Option<u8>,
    pub digest: Option<String>,
    pub flags: Option<u16>,
    pub public_key: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_nsec3_iterations: 150,
            accept_expired: false,
            max_tasks: 65_536,
            include_root_anchors: true,
            must_be_secure: Vec::new(),
            disabled_algorithms: Vec::new(),
            disabled_digests: Vec::new(),
            trust_anchors: Vec::new(),
        }
    }
}

impl ValidatorConfig {
    /// Create a ValidatorConfig from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `var`
    pub fn from_env_with<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(iterations) = var("HEIMDALL_DNSSEC_MAX_NSEC3_ITERATIONS") {
            config.max_nsec3_iterations = iterations
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidIterationLimit(iterations.clone()))?;
        }

        if let Some(accept_expired) = var("HEIMDALL_DNSSEC_ACCEPT_EXPIRED") {
            config.accept_expired = parse_bool(&accept_expired, config.accept_expired);
        }

        if let Some(max_tasks) = var("HEIMDALL_DNSSEC_MAX_TASKS") {
            config.max_tasks = max_tasks
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTaskLimit(max_tasks.clone()))?;
        }

        if let Some(root) = var("HEIMDALL_DNSSEC_INCLUDE_ROOT_ANCHORS") {
            config.include_root_anchors = parse_bool(&root, config.include_root_anchors);
        }

        if let Some(domains) = var("HEIMDALL_DNSSEC_MUST_BE_SECURE") {
            config.must_be_secure = domains
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nsec3_iterations > MAX_NSEC3_ITERATIONS {
            return Err(ConfigError::InvalidIterationLimit(format!(
                "{} exceeds the RFC 5155 ceiling of {}",
                self.max_nsec3_iterations, MAX_NSEC3_ITERATIONS
            )));
        }

        if self.max_tasks == 0 {
            return Err(ConfigError::InvalidTaskLimit(
                "Task limit must be greater than 0".to_string(),
            ));
        }

        self.must_be_secure_names()?;
        for zone in self.disabled_algorithms.iter().chain(&self.disabled_digests) {
            parse_name(&zone.zone)?;
        }
        for anchor in &self.trust_anchors {
            crate::dnssec::TrustAnchor::from_config(anchor)?;
        }

        Ok(())
    }

    pub fn must_be_secure_names(&self) -> Result<Vec<Name>, ConfigError> {
        self.must_be_secure.iter().map(|d| parse_name(d)).collect()
    }
}

pub(crate) fn parse_name(s: &str) -> Result<Name, ConfigError> {
    s.parse().map_err(|_| ConfigError::InvalidName(s.to_string()))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
