//! Per-chain referral code, captured once and persisted to a JSON file.
//!
//! The first code recorded for a chain wins; later captures are ignored.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default file name when `REFERRAL_STORE` is unset.
pub const DEFAULT_REFERRAL_STORE: &str = "referral.json";

/// File-backed `chain id -> referrer` map.
#[derive(Debug)]
pub struct ReferralStore {
    path: PathBuf,
    codes: Mutex<BTreeMap<u64, Address>>,
}

impl ReferralStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let codes = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading referral store {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("parsing referral store {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), chains = codes.len(), "Referral store opened");
        Ok(Self {
            path,
            codes: Mutex::new(codes),
        })
    }

    /// Open the store named by `REFERRAL_STORE`, or the default file.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("REFERRAL_STORE").unwrap_or_else(|_| DEFAULT_REFERRAL_STORE.to_string());
        Self::open(path)
    }

    pub fn get(&self, chain_id: u64) -> Option<Address> {
        self.codes.lock().get(&chain_id).copied()
    }

    /// Record `code` for `chain_id` unless one is already stored.
    ///
    /// Returns whether the code was stored. The zero address is never
    /// stored.
    pub fn capture(&self, chain_id: u64, code: Address) -> Result<bool> {
        if code == Address::ZERO {
            return Ok(false);
        }

        let mut codes = self.codes.lock();
        if codes.contains_key(&chain_id) {
            debug!(chain_id, code = %code, "Referral code already captured");
            return Ok(false);
        }
        codes.insert(chain_id, code);

        let content = serde_json::to_string_pretty(&*codes)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing referral store {}", self.path.display()))?;

        info!(chain_id, code = %code, "Referral code captured");
        Ok(true)
    }

    /// Parse and capture a referral code given as text.
    pub fn capture_str(&self, chain_id: u64, code: &str) -> Result<bool> {
        let code: Address = code
            .trim()
            .parse()
            .with_context(|| format!("invalid referral code {:?}", code))?;
        self.capture(chain_id, code)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("boxkeeper-referral-{}-{}.json", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_first_write_wins() {
        let path = temp_store("first");
        let store = ReferralStore::open(&path).unwrap();
        let first = Address::repeat_byte(0x01);
        let second = Address::repeat_byte(0x02);

        assert!(store.capture(1, first).unwrap());
        assert!(!store.capture(1, second).unwrap());
        assert_eq!(store.get(1), Some(first));

        assert!(store.capture(56, second).unwrap());
        assert_eq!(store.get(56), Some(second));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_persists_across_opens() {
        let path = temp_store("persist");
        let code = Address::repeat_byte(0x0c);
        ReferralStore::open(&path).unwrap().capture(137, code).unwrap();

        let reopened = ReferralStore::open(&path).unwrap();
        assert_eq!(reopened.get(137), Some(code));
        assert!(!reopened.capture(137, Address::repeat_byte(0x0d)).unwrap());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_zero_and_invalid_codes() {
        let path = temp_store("invalid");
        let store = ReferralStore::open(&path).unwrap();

        assert!(!store.capture(1, Address::ZERO).unwrap());
        assert!(store.capture_str(1, "not-an-address").is_err());
        assert_eq!(store.get(1), None);
        assert!(!path.exists());
    }
}
