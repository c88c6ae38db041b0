//! Redemption code pool.

use super::{
    errors::{ClaimError, ClaimResult},
    models::{Claim, CodeRecord, SeedReport},
};
use crate::kv::{KvStore, Namespace, keys};
use chrono::Utc;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Longest code accepted by the seeder
const MAX_CODE_LEN: usize = 64;

/// Set of unclaimed codes, one `code:{code}` key each
///
/// Only the claims module writes to the pool. A code leaves the pool exactly
/// once and is never put back after it has been claimed.
#[derive(Clone)]
pub struct CodePool {
    store: Arc<dyn KvStore>,
}

impl CodePool {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Unclaimed codes in ascending order
    pub async fn list_available(&self) -> ClaimResult<Vec<String>> {
        let listed = self
            .store
            .list_keys(Namespace::Codes, keys::CODE_PREFIX)
            .await?;

        Ok(listed
            .iter()
            .filter_map(|key| keys::code_from_key(key))
            .map(str::to_string)
            .collect())
    }

    /// Number of unclaimed codes
    pub async fn available_count(&self) -> ClaimResult<usize> {
        Ok(self.list_available().await?.len())
    }

    /// Permanently remove one code
    ///
    /// At most one concurrent caller succeeds for a given code.
    ///
    /// # Errors
    ///
    /// * `ClaimError::CodeNotFound` - Code already removed (or never seeded)
    pub async fn remove(&self, code: &str) -> ClaimResult<()> {
        if self.store.delete(Namespace::Codes, &keys::code(code)).await? {
            Ok(())
        } else {
            Err(ClaimError::CodeNotFound(code.to_string()))
        }
    }

    /// Put back a code this process removed but did not hand out
    pub(crate) async fn restore(&self, code: &str) -> ClaimResult<bool> {
        let record = serde_json::to_string(&CodeRecord {
            code: code.to_string(),
            created_at: Utc::now(),
        })?;
        Ok(self
            .store
            .put_if_absent(Namespace::Codes, &keys::code(code), &record, None)
            .await?)
    }

    /// Add codes to the pool
    ///
    /// Codes are trimmed; duplicates, codes already in the pool and codes
    /// already claimed are skipped.
    ///
    /// # Errors
    ///
    /// * `ClaimError::InvalidCode` - Empty, too long, or containing whitespace/control characters
    pub async fn seed<I, S>(&self, codes: I) -> ClaimResult<SeedReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes: Vec<String> = codes
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .collect();
        for code in &codes {
            validate_code(code)?;
        }

        let claimed = self.claimed_codes().await?;
        let mut report = SeedReport::default();
        let mut seen = HashSet::new();

        for code in codes {
            if !seen.insert(code.clone()) || claimed.contains(&code) {
                report.skipped += 1;
                continue;
            }

            let record = serde_json::to_string(&CodeRecord {
                code: code.clone(),
                created_at: Utc::now(),
            })?;
            let inserted = self
                .store
                .put_if_absent(Namespace::Codes, &keys::code(&code), &record, None)
                .await?;

            if inserted {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        info!(
            "Seeded code pool: {} inserted, {} skipped",
            report.inserted, report.skipped
        );
        Ok(report)
    }

    async fn claimed_codes(&self) -> ClaimResult<HashSet<String>> {
        let claim_keys = self
            .store
            .list_keys(Namespace::Codes, keys::CLAIMED_USER_PREFIX)
            .await?;

        let mut codes = HashSet::with_capacity(claim_keys.len());
        for key in claim_keys {
            let Some(raw) = self.store.get(Namespace::Codes, &key).await? else {
                continue;
            };
            match serde_json::from_str::<Claim>(&raw) {
                Ok(claim) => {
                    codes.insert(claim.code);
                }
                Err(e) => warn!("Unreadable claim record {}: {}", key, e),
            }
        }
        Ok(codes)
    }
}

/// Codes from a seed file: one per line, blank lines and `#` comments ignored
pub fn parse_code_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_code(code: &str) -> ClaimResult<()> {
    if code.is_empty()
        || code.len() > MAX_CODE_LEN
        || code.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ClaimError::InvalidCode(code.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn pool() -> (MemoryKvStore, CodePool) {
        let kv = MemoryKvStore::new();
        let pool = CodePool::new(Arc::new(kv.clone()));
        (kv, pool)
    }

    #[tokio::test]
    async fn test_seed_and_list_sorted() {
        let (_, pool) = pool();
        let report = pool
            .seed(["PWNOAXZ4C945", "0YWRLLLNKBCB", " 837QEYQXT612 "])
            .await
            .unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(
            pool.list_available().await.unwrap(),
            vec!["0YWRLLLNKBCB", "837QEYQXT612", "PWNOAXZ4C945"]
        );
        assert_eq!(pool.available_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_seed_skips_duplicates_and_existing() {
        let (_, pool) = pool();
        pool.seed(["A"]).await.unwrap();

        let report = pool.seed(["A", "B", "B"]).await.unwrap();
        assert_eq!(report, SeedReport { inserted: 1, skipped: 2 });
    }

    #[tokio::test]
    async fn test_seed_never_readds_claimed_code() {
        let (kv, pool) = pool();
        let claim = Claim {
            user_id: "1".to_string(),
            code: "A".to_string(),
            claimed_at: Utc::now(),
        };
        kv.put(
            Namespace::Codes,
            &keys::claimed_user("1"),
            &serde_json::to_string(&claim).unwrap(),
            None,
        )
        .await
        .unwrap();

        let report = pool.seed(["A", "B"]).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(pool.list_available().await.unwrap(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_seed_rejects_invalid_codes() {
        let (_, pool) = pool();
        assert!(matches!(
            pool.seed(["OK", ""]).await,
            Err(ClaimError::InvalidCode(_))
        ));
        assert!(matches!(
            pool.seed(["has space"]).await,
            Err(ClaimError::InvalidCode(_))
        ));
        // Nothing is written when any code is invalid
        assert!(pool.list_available().await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_code_list() {
        let text = "# batch 1\n0YWRLLLNKBCB\n\n  PWNOAXZ4C945  # reserved\n#837QEYQXT612\n";
        assert_eq!(
            parse_code_list(text),
            vec!["0YWRLLLNKBCB", "PWNOAXZ4C945"]
        );
    }

    #[tokio::test]
    async fn test_remove_is_single_use() {
        let (_, pool) = pool();
        pool.seed(["A"]).await.unwrap();

        pool.remove("A").await.unwrap();
        assert!(matches!(
            pool.remove("A").await,
            Err(ClaimError::CodeNotFound(code)) if code == "A"
        ));
    }

    #[tokio::test]
    async fn test_list_ignores_claim_records() {
        let (kv, pool) = pool();
        pool.seed(["A"]).await.unwrap();
        kv.put(Namespace::Codes, &keys::claimed_user("9"), "{}", None)
            .await
            .unwrap();

        assert_eq!(pool.list_available().await.unwrap(), vec!["A"]);
    }
}
