// TMDB-addon mirror client: fetches pre-localized meta records from a
// pool of equivalent community mirrors, failing over on error.

use std::future::Future;
use std::sync::Arc;

use reqwest::Client;

use crate::error::{ProviderError, ProviderResult};
use crate::models::{MediaKind, MetaResponse};
use crate::pool::AddonPool;

pub struct TmdbAddonClient {
    client: Client,
    pool: Arc<AddonPool>,
}

/// Capped failover loop: try the pool's current mirror, advance on
/// failure, stop on first success. One round per pool member; exhausting
/// the pool signals total provider unavailability, which callers treat
/// as an empty result. On success the cursor is left on the working
/// mirror so subsequent requests go straight there.
pub async fn with_failover<T, F, Fut>(pool: &AddonPool, mut call: F) -> ProviderResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut url = pool.current().to_string();
    for _ in 0..pool.len() {
        match call(url).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "addon mirror failed");
                url = pool.advance().to_string();
            }
        }
    }
    Err(ProviderError::Unavailable(
        "all addon mirrors exhausted".to_string(),
    ))
}

impl TmdbAddonClient {
    pub fn new(client: Client, pool: Arc<AddonPool>) -> Self {
        Self { client, pool }
    }

    pub async fn meta(&self, kind: MediaKind, tmdb_id: i64) -> ProviderResult<MetaResponse> {
        with_failover(&self.pool, |base| {
            let client = self.client.clone();
            async move {
                let url = format!("{}/meta/{}/tmdb:{}.json", base, kind.as_str(), tmdb_id);
                let resp = client.get(&url).send().await?;
                if !resp.status().is_success() {
                    return Err(ProviderError::Unavailable(format!(
                        "addon mirror returned {}",
                        resp.status()
                    )));
                }
                let body: MetaResponse = resp
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
                Ok(body)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool_of_three() -> AddonPool {
        AddonPool::new(vec![
            "https://mirror-0.example".to_string(),
            "https://mirror-1.example".to_string(),
            "https://mirror-2.example".to_string(),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_failover_reaches_working_mirror() {
        let pool = pool_of_three();
        // Only the third mirror answers
        let result = with_failover(&pool, |url| async move {
            if url == "https://mirror-2.example" {
                Ok(url)
            } else {
                Err(ProviderError::Unavailable("down".to_string()))
            }
        })
        .await;
        assert_eq!(result.unwrap(), "https://mirror-2.example");
        // Cursor is left pointing at the mirror that worked
        assert_eq!(pool.current(), "https://mirror-2.example");
    }

    #[tokio::test]
    async fn test_failover_stops_on_first_success() {
        let pool = pool_of_three();
        let calls = AtomicUsize::new(0);
        let result = with_failover(&pool, |url| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ProviderError>(url) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.current(), "https://mirror-0.example");
    }

    #[tokio::test]
    async fn test_failover_exhaustion_is_unavailable() {
        let pool = pool_of_three();
        let calls = AtomicUsize::new(0);
        let result: ProviderResult<()> = with_failover(&pool, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Unavailable("down".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        // Bounded: exactly one round per pool member
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
