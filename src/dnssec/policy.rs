use super::{DigestType, DnsSecAlgorithm};
use crate::config::{ValidatorConfig, parse_name};
use crate::dns::Name;
use crate::error::ConfigError;
use crate::traits::ValidationPolicy;

/// Default policy: what the crypto layer supports, minus per-zone
/// disabled algorithms and digests
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPolicy {
    disabled_algorithms: Vec<(Name, Vec<u8>)>,
    disabled_digests: Vec<(Name, Vec<u8>)>,
    must_be_secure: Vec<Name>,
}

impl ConfiguredPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        let zones = |entries: &[crate::config::ZonePolicyConfig]| {
            entries
                .iter()
                .map(|e| Ok((parse_name(&e.zone)?, e.values.clone())))
                .collect::<Result<Vec<_>, ConfigError>>()
        };
        Ok(Self {
            disabled_algorithms: zones(&config.disabled_algorithms)?,
            disabled_digests: zones(&config.disabled_digests)?,
            must_be_secure: config.must_be_secure_names()?,
        })
    }

    pub fn disable_algorithm(mut self, zone: Name, algorithm: u8) -> Self {
        self.disabled_algorithms.push((zone, vec![algorithm]));
        self
    }

    pub fn disable_digest(mut self, zone: Name, digest_type: u8) -> Self {
        self.disabled_digests.push((zone, vec![digest_type]));
        self
    }

    pub fn require_secure(mut self, zone: Name) -> Self {
        self.must_be_secure.push(zone);
        self
    }
}

fn disabled_at(entries: &[(Name, Vec<u8>)], name: &Name, value: u8) -> bool {
    entries
        .iter()
        .any(|(zone, values)| name.is_subdomain_of(zone) && values.contains(&value))
}

impl ValidationPolicy for ConfiguredPolicy {
    fn is_algorithm_supported(&self, name: &Name, algorithm: u8) -> bool {
        DnsSecAlgorithm::from_u8(algorithm).is_some_and(|a| a.is_supported())
            && !disabled_at(&self.disabled_algorithms, name, algorithm)
    }

    fn is_digest_supported(&self, name: &Name, digest_type: u8) -> bool {
        DigestType::from_u8(digest_type).is_some_and(|d| d.is_supported())
            && !disabled_at(&self.disabled_digests, name, digest_type)
    }

    fn must_be_secure(&self, name: &Name) -> bool {
        self.must_be_secure.iter().any(|zone| name.is_subdomain_of(zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_per_zone_algorithm_override() {
        let policy = ConfiguredPolicy::new().disable_algorithm(name("legacy.example"), 8);
        assert!(!policy.is_algorithm_supported(&name("www.legacy.example"), 8));
        assert!(policy.is_algorithm_supported(&name("www.other.example"), 8));
        assert!(!policy.is_algorithm_supported(&name("example"), 16));
    }

    #[test]
    fn test_digest_support() {
        let policy = ConfiguredPolicy::new().disable_digest(Name::root(), 1);
        assert!(!policy.is_digest_supported(&name("example.com"), 1));
        assert!(policy.is_digest_supported(&name("example.com"), 2));
        assert!(!policy.is_digest_supported(&name("example.com"), 3));
    }

    #[test]
    fn test_must_be_secure() {
        let config = ValidatorConfig {
            must_be_secure: vec!["bank.example".to_string()],
            ..Default::default()
        };
        let policy = ConfiguredPolicy::from_config(&config).unwrap();
        assert!(policy.must_be_secure(&name("www.bank.example")));
        assert!(!policy.must_be_secure(&name("example")));
    }
}
