//! Application configuration loaded from environment variables.
//!
//! Internal API keys are hashed as soon as they are read; only their SHA-256
//! digests are kept in memory.

use sha2::{Digest, Sha256};
use std::env;
use subtle::ConstantTimeEq;

/// Which document store to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Point amounts for reward reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardSettings {
    pub activity_completion_points: i64,
    pub exam_pass_points: i64,
    /// (streak length in days, bonus points), ascending by days
    pub streak_milestones: Vec<(u32, i64)>,
}

impl RewardSettings {
    /// Bonus for reaching exactly `days` consecutive days, if configured.
    pub fn milestone_points(&self, days: u32) -> Option<i64> {
        self.streak_milestones
            .iter()
            .find(|(d, _)| *d == days)
            .map(|(_, points)| *points)
    }
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            activity_completion_points: 10,
            exam_pass_points: 50,
            streak_milestones: vec![(7, 50), (30, 200), (100, 1000)],
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL, allowed as a CORS origin
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,

    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub session_ttl_days: i64,
    /// Hex SHA-256 digests of the accepted internal API keys
    internal_api_key_digests: Vec<String>,

    /// Credits charged to the student for one class
    pub booking_credit_cost: i64,
    pub rewards: RewardSettings,
}

impl Config {
    /// Config for tests: in-memory store, API key `test-internal-key`.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            session_ttl_days: 30,
            internal_api_key_digests: vec![digest_hex("test-internal-key")],
            booking_credit_cost: 1,
            rewards: RewardSettings::default(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Err(_) | Ok("firestore") => StoreBackend::Firestore,
            Ok("memory") => StoreBackend::Memory,
            Ok(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        let api_keys = env::var("INTERNAL_API_KEYS")
            .map_err(|_| ConfigError::Missing("INTERNAL_API_KEYS"))?;
        let internal_api_key_digests: Vec<String> = api_keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(digest_hex)
            .collect();
        if internal_api_key_digests.is_empty() {
            return Err(ConfigError::Invalid("INTERNAL_API_KEYS"));
        }

        let rewards = RewardSettings {
            activity_completion_points: parse_var("ACTIVITY_COMPLETION_POINTS", 10)?,
            exam_pass_points: parse_var("EXAM_PASS_POINTS", 50)?,
            streak_milestones: match env::var("STREAK_MILESTONES") {
                Ok(raw) => parse_milestones(&raw).ok_or(ConfigError::Invalid("STREAK_MILESTONES"))?,
                Err(_) => RewardSettings::default().streak_milestones,
            },
        };

        let booking_credit_cost: i64 = parse_var("BOOKING_CREDIT_COST", 1)?;
        if booking_credit_cost <= 0 {
            return Err(ConfigError::Invalid("BOOKING_CREDIT_COST"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            session_ttl_days: parse_var("SESSION_TTL_DAYS", 30)?,
            internal_api_key_digests,
            booking_credit_cost,
            rewards,
        })
    }

    /// Check a presented internal API key against the configured digests.
    pub fn is_valid_api_key(&self, presented: &str) -> bool {
        let digest = digest_hex(presented);
        // Visit every digest so timing does not reveal which one matched.
        self.internal_api_key_digests
            .iter()
            .fold(false, |found, known| {
                found | bool::from(known.as_bytes().ct_eq(digest.as_bytes()))
            })
    }
}

fn digest_hex(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Parse `days:points` pairs, e.g. `7:50,30:200`.
fn parse_milestones(raw: &str) -> Option<Vec<(u32, i64)>> {
    let mut milestones = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (days, points) = pair.split_once(':')?;
            let days: u32 = days.trim().parse().ok()?;
            let points: i64 = points.trim().parse().ok()?;
            (days > 0 && points > 0).then_some((days, points))
        })
        .collect::<Option<Vec<_>>>()?;
    milestones.sort_unstable();
    Some(milestones)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("INTERNAL_API_KEYS", "key-one, key-two");
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("STREAK_MILESTONES", "30:200,7:50");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.rewards.streak_milestones, vec![(7, 50), (30, 200)]);
        assert!(config.is_valid_api_key("key-two"));
        assert!(!config.is_valid_api_key("key-three"));
        assert!(!config.is_valid_api_key(""));
    }

    #[test]
    fn test_parse_milestones() {
        assert_eq!(
            parse_milestones("7:50, 100:1000"),
            Some(vec![(7, 50), (100, 1000)])
        );
        assert_eq!(parse_milestones("7"), None);
        assert_eq!(parse_milestones("7:x"), None);
        assert_eq!(parse_milestones("0:10"), None);
    }

    #[test]
    fn test_milestone_points() {
        let rewards = RewardSettings::default();
        assert_eq!(rewards.milestone_points(7), Some(50));
        assert_eq!(rewards.milestone_points(8), None);
    }

    #[test]
    fn test_api_keys_not_kept_in_plaintext() {
        let config = Config::test_default();
        assert!(config.is_valid_api_key("test-internal-key"));
        assert!(config
            .internal_api_key_digests
            .iter()
            .all(|d| d.len() == 64 && d != "test-internal-key"));
    }
}
