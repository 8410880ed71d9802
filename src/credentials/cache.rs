use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::resolver::CredentialResolver;
use crate::models::credential::ClusterCredential;
use crate::utils::error::GatewayError;

/// Process-wide credential holder shared by concurrent requests.
///
/// Readers share the `current` lock. Refreshes are serialised on `refresh`
/// and re-check the cached value after acquiring it, so callers that queue up
/// behind a refresh reuse its result instead of resolving again. No lock is
/// held while talking to the control plane.
pub struct CredentialCache {
    resolver: Arc<dyn CredentialResolver>,
    current: RwLock<Option<Arc<ClusterCredential>>>,
    refresh: Mutex<()>,
}

impl CredentialCache {
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        CredentialCache {
            resolver,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn with_credential(
        resolver: Arc<dyn CredentialResolver>,
        credential: ClusterCredential,
    ) -> Self {
        CredentialCache {
            resolver,
            current: RwLock::new(Some(Arc::new(credential))),
            refresh: Mutex::new(()),
        }
    }

    /// Returns the cached credential, resolving it first if absent or expired.
    pub async fn get(&self) -> Result<Arc<ClusterCredential>, GatewayError> {
        if let Some(credential) = self.valid().await {
            return Ok(credential);
        }

        let _refreshing = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(credential) = self.valid().await {
            return Ok(credential);
        }

        debug!("refreshing cluster credential");
        let credential = match self.resolver.resolve().await {
            Ok(credential) => Arc::new(credential),
            Err(err) => {
                warn!("credential refresh failed: {}", err);
                return Err(err);
            }
        };

        *self.current.write().await = Some(credential.clone());

        Ok(credential)
    }

    /// Drops `rejected` so the next [`get`](Self::get) resolves again. A newer
    /// credential installed by a concurrent refresh is left in place.
    pub async fn invalidate(&self, rejected: &Arc<ClusterCredential>) {
        let mut current = self.current.write().await;

        if matches!(current.as_ref(), Some(credential) if Arc::ptr_eq(credential, rejected)) {
            debug!("invalidating rejected cluster credential");
            *current = None;
        }
    }

    async fn valid(&self) -> Option<Arc<ClusterCredential>> {
        let current = self.current.read().await;
        let now = Instant::now();

        current
            .as_ref()
            .filter(|credential| !credential.is_expired(now))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use tokio::time::Instant;

    use super::CredentialCache;
    use crate::credentials::resolver::CredentialResolver;
    use crate::models::credential::ClusterCredential;
    use crate::utils::error::{ErrorKind, GatewayError};

    struct CountingResolver {
        calls: AtomicUsize,
        lifetime: Duration,
        delay: Duration,
        fail: bool,
    }

    impl CountingResolver {
        fn new(lifetime: Duration) -> Self {
            CountingResolver {
                calls: AtomicUsize::new(0),
                lifetime,
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialResolver for CountingResolver {
        async fn resolve(&self) -> Result<ClusterCredential, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(GatewayError::auth("token file missing"));
            }

            Ok(credential(
                &format!("token-{}", call),
                Some(Instant::now() + self.lifetime),
            ))
        }
    }

    fn credential(token: &str, expires_at: Option<Instant>) -> ClusterCredential {
        ClusterCredential {
            endpoint: "https://10.96.0.1:443".parse().unwrap(),
            bearer_token: token.to_string().into(),
            ca_bundle: b"ca".to_vec(),
            expires_at,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_once_while_valid() {
        let resolver = Arc::new(CountingResolver::new(Duration::from_secs(60)));
        let cache = CredentialCache::new(resolver.clone());

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_after_expiry() {
        let resolver = Arc::new(CountingResolver::new(Duration::from_secs(60)));
        let cache = CredentialCache::new(resolver.clone());

        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get().await.unwrap();

        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_collapses_into_one() {
        let resolver = Arc::new(CountingResolver {
            delay: Duration::from_millis(50),
            ..CountingResolver::new(Duration::from_secs(60))
        });
        let expired = credential("stale", Some(Instant::now() - Duration::from_secs(1)));
        let cache = Arc::new(CredentialCache::with_credential(resolver.clone(), expired));

        let requests = (0..16).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await })
        });
        let results = join_all(requests).await;

        for result in results {
            let credential = result.unwrap().unwrap();
            assert!(!credential.is_expired(Instant::now()));
        }
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_resolve() {
        let resolver = Arc::new(CountingResolver::new(Duration::from_secs(60)));
        let cache = CredentialCache::new(resolver.clone());

        let rejected = cache.get().await.unwrap();
        cache.invalidate(&rejected).await;
        let replacement = cache.get().await.unwrap();

        assert!(!Arc::ptr_eq(&rejected, &replacement));
        assert_eq!(resolver.calls(), 2);

        // A stale rejection must not evict the newer credential.
        cache.invalidate(&rejected).await;
        cache.get().await.unwrap();
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn propagates_resolve_failure() {
        let resolver = Arc::new(CountingResolver {
            fail: true,
            ..CountingResolver::new(Duration::from_secs(60))
        });
        let cache = CredentialCache::new(resolver.clone());

        let error = cache.get().await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::AuthFailure);
        // Failures are not cached.
        assert!(cache.get().await.is_err());
        assert_eq!(resolver.calls(), 2);
    }
}
