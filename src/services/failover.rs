//! Multi-key failover invocation
//!
//! `FailoverInvoker` runs one logical remote operation against the credential
//! pool. Attempts are strictly sequential: a quota-type failure rotates to the
//! next key, any other failure stops immediately, and a success records the
//! working key as the pool's new cursor.

use crate::services::backend_pool::{ConfigurationError, Credential, CredentialPool};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Case-insensitive marker identifying quota exhaustion
const QUOTA_MARKER: &str = "quota";

/// HTTP status used by the remote service for rate limiting
const RATE_LIMIT_STATUS: u16 = 429;

/// Markers identifying a rejected API key
const INVALID_KEY_MARKERS: &[&str] = &["api key not valid", "api_key_invalid"];

// ============================================================================
// Remote Call Capability
// ============================================================================

/// Error signal returned by a remote call
///
/// Classification inspects the HTTP status (when there is one) and the
/// `Display` text of the error.
pub trait ErrorSignal: std::error::Error + Send + Sync + 'static {
    /// HTTP status attached to the failure, if any
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// A single remote operation performed with one credential
///
/// Implementations own their timeout policy; the invoker never cancels a
/// call in flight.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    type Request: Send + Sync;
    type Output: Send;
    type Error: ErrorSignal;

    /// Short operation name used in logs
    fn name(&self) -> &str;

    async fn call(
        &self,
        credential: &Credential,
        request: &Self::Request,
    ) -> Result<Self::Output, Self::Error>;
}

// ============================================================================
// Outcome Classification
// ============================================================================

/// Classified result of one attempt
#[derive(Debug)]
pub enum InvocationOutcome<T, E> {
    /// The call succeeded
    Success(T),
    /// Credential-specific quota or validity problem; try the next key
    RetryableFailure(E),
    /// Anything else; stop trying
    FatalFailure(E),
}

/// Rules deciding which failures rotate to the next key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailoverPolicy {
    /// Also rotate when the service rejects the key itself
    pub rotate_on_invalid_credential: bool,
}

impl FailoverPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rotate_on_invalid_credential(mut self, enabled: bool) -> Self {
        self.rotate_on_invalid_credential = enabled;
        self
    }

    /// Classify the result of one attempt
    pub fn classify<T, E: ErrorSignal>(&self, result: Result<T, E>) -> InvocationOutcome<T, E> {
        match result {
            Ok(value) => InvocationOutcome::Success(value),
            Err(err) if self.is_retryable(&err) => InvocationOutcome::RetryableFailure(err),
            Err(err) => InvocationOutcome::FatalFailure(err),
        }
    }

    fn is_retryable<E: ErrorSignal>(&self, err: &E) -> bool {
        is_quota_error(err) || (self.rotate_on_invalid_credential && is_invalid_credential(err))
    }
}

/// Quota exhaustion: HTTP 429 or a "quota" marker in the message
pub fn is_quota_error<E: ErrorSignal>(err: &E) -> bool {
    err.status_code() == Some(RATE_LIMIT_STATUS)
        || err.to_string().to_lowercase().contains(QUOTA_MARKER)
}

/// Rejected key: HTTP 401/403 or an invalid-key marker in the message
pub fn is_invalid_credential<E: ErrorSignal>(err: &E) -> bool {
    if matches!(err.status_code(), Some(401) | Some(403)) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    INVALID_KEY_MARKERS.iter().any(|marker| message.contains(marker))
}

// ============================================================================
// Invocation Result
// ============================================================================

/// A successful invocation
#[derive(Debug, Clone)]
pub struct Invoked<T> {
    /// Value returned by the remote call
    pub value: T,
    /// Index of the credential that succeeded
    pub credential_index: usize,
    /// Number of attempts made, including the successful one
    pub attempts: usize,
}

/// Terminal failure of an invocation
#[derive(Error, Debug)]
pub enum InvokeError<E: std::error::Error + 'static> {
    /// The pool was empty; no remote call was made
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A non-quota failure; remaining keys were not tried
    #[error("{source}")]
    Fatal {
        credential_index: usize,
        attempts: usize,
        #[source]
        source: E,
    },

    /// Every key in the pool hit a quota-type failure
    #[error("All {attempts} API keys are out of quota or invalid. Check the keys in the settings.")]
    AllCredentialsExhausted { attempts: usize },
}

impl<E: std::error::Error + 'static> InvokeError<E> {
    /// True when the user should be sent back to the key settings
    pub fn needs_reconfiguration(&self) -> bool {
        matches!(
            self,
            InvokeError::Configuration(_) | InvokeError::AllCredentialsExhausted { .. }
        )
    }

    /// Number of remote calls made before giving up
    pub fn attempts(&self) -> usize {
        match self {
            InvokeError::Configuration(_) => 0,
            InvokeError::Fatal { attempts, .. } => *attempts,
            InvokeError::AllCredentialsExhausted { attempts } => *attempts,
        }
    }
}

// ============================================================================
// Failover Invoker
// ============================================================================

/// Runs remote operations with key rotation on quota failures
#[derive(Debug, Clone)]
pub struct FailoverInvoker {
    pool: Arc<CredentialPool>,
    policy: FailoverPolicy,
}

impl FailoverInvoker {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self {
            pool,
            policy: FailoverPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailoverPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn policy(&self) -> FailoverPolicy {
        self.policy
    }

    /// Execute one logical operation
    ///
    /// Starts at the pool cursor and makes at most `pool.len()` attempts.
    /// The cursor is written only on success; a failed invocation leaves it
    /// where it was.
    pub async fn invoke<R: RemoteCall>(
        &self,
        remote: &R,
        request: &R::Request,
    ) -> Result<Invoked<R::Output>, InvokeError<R::Error>> {
        let snapshot = self.pool.snapshot();
        if snapshot.is_empty() {
            tracing::warn!(operation = remote.name(), "Invocation rejected: no API keys configured");
            return Err(ConfigurationError::EmptyPool.into());
        }

        let mut index = snapshot.current_index() % snapshot.len();
        let mut attempts = 0;

        while attempts < snapshot.len() {
            let Some(credential) = snapshot.credential_at(index) else {
                break;
            };
            attempts += 1;

            tracing::debug!(
                operation = remote.name(),
                attempt = attempts,
                key_index = index,
                credential = %credential,
                "Calling remote operation"
            );

            match self.policy.classify(remote.call(credential, request).await) {
                InvocationOutcome::Success(value) => {
                    if let Err(e) = self.pool.mark_good_in(snapshot.generation(), index).await {
                        tracing::warn!(error = %e, key_index = index, "Failed to persist key cursor");
                    }
                    tracing::info!(
                        operation = remote.name(),
                        attempts,
                        key_index = index,
                        "Remote operation succeeded"
                    );
                    return Ok(Invoked {
                        value,
                        credential_index: index,
                        attempts,
                    });
                }
                InvocationOutcome::RetryableFailure(err) => {
                    let next = snapshot.advance(index);
                    tracing::warn!(
                        operation = remote.name(),
                        attempt = attempts,
                        key_index = index,
                        next_key_index = next,
                        credential = %credential,
                        error = %err,
                        "Key out of quota, rotating"
                    );
                    index = next;
                }
                InvocationOutcome::FatalFailure(err) => {
                    tracing::error!(
                        operation = remote.name(),
                        attempt = attempts,
                        key_index = index,
                        credential = %credential,
                        error = %err,
                        "Remote operation failed"
                    );
                    return Err(InvokeError::Fatal {
                        credential_index: index,
                        attempts,
                        source: err,
                    });
                }
            }
        }

        tracing::error!(
            operation = remote.name(),
            attempts,
            "All API keys exhausted"
        );
        Err(InvokeError::AllCredentialsExhausted { attempts })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend_pool::{CursorStore, CursorStoreError, MemoryCursorStore};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct FakeError {
        status: Option<u16>,
        message: String,
    }

    impl ErrorSignal for FakeError {
        fn status_code(&self) -> Option<u16> {
            self.status
        }
    }

    #[derive(Debug, Clone)]
    enum Reply {
        Ok(&'static str),
        Quota,
        RateLimited,
        InvalidKey,
        Fatal,
    }

    /// Remote call that answers per key and records the order of keys tried
    struct ScriptedRemote {
        replies: HashMap<&'static str, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRemote {
        fn new(replies: &[(&'static str, Reply)]) -> Self {
            Self {
                replies: replies.iter().cloned().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteCall for ScriptedRemote {
        type Request = String;
        type Output = String;
        type Error = FakeError;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn call(&self, credential: &Credential, request: &String) -> Result<String, FakeError> {
            self.calls.lock().unwrap().push(credential.api_key().to_string());
            let fail = |status, message: &str| FakeError {
                status,
                message: message.to_string(),
            };
            match self.replies.get(credential.api_key()) {
                Some(Reply::Ok(text)) => Ok(format!("{}:{}", request, text)),
                Some(Reply::Quota) => Err(fail(Some(400), "Resource has been exhausted (e.g. check QUOTA).")),
                Some(Reply::RateLimited) => Err(fail(Some(429), "Too Many Requests")),
                Some(Reply::InvalidKey) => Err(fail(Some(400), "API key not valid. Please pass a valid API key.")),
                Some(Reply::Fatal) | None => Err(fail(Some(500), "Internal error encountered.")),
            }
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CursorStore for FailingStore {
        async fn load(&self) -> Result<Option<usize>, CursorStoreError> {
            Ok(None)
        }

        async fn save(&self, _index: usize) -> Result<(), CursorStoreError> {
            Err(CursorStoreError::Io {
                path: "/read-only/cursor.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn pool_with(keys: &[&str], store: Arc<dyn CursorStore>) -> Arc<CredentialPool> {
        let credentials = keys.iter().map(|k| Credential::new(*k)).collect();
        Arc::new(CredentialPool::new(credentials, store))
    }

    fn request() -> String {
        "analyze".to_string()
    }

    #[tokio::test]
    async fn test_first_key_success_stops_immediately() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = pool_with(&["k1", "k2", "k3"], store.clone());
        let remote = ScriptedRemote::new(&[("k1", Reply::Ok("done")), ("k2", Reply::Ok("other"))]);

        let invoked = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap();

        assert_eq!(invoked.value, "analyze:done");
        assert_eq!(invoked.credential_index, 0);
        assert_eq!(invoked.attempts, 1);
        assert_eq!(remote.calls(), vec!["k1"]);
        assert_eq!(pool.current_index(), 0);
        assert_eq!(store.get(), Some(0));
    }

    #[tokio::test]
    async fn test_rotates_to_third_key() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = pool_with(&["k1", "k2", "k3"], store.clone());
        let remote = ScriptedRemote::new(&[
            ("k1", Reply::Quota),
            ("k2", Reply::Quota),
            ("k3", Reply::Ok("done")),
        ]);

        let invoked = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap();

        assert_eq!(invoked.credential_index, 2);
        assert_eq!(invoked.attempts, 3);
        assert_eq!(remote.calls(), vec!["k1", "k2", "k3"]);
        assert_eq!(pool.current_index(), 2);
        assert_eq!(store.get(), Some(2));
    }

    #[tokio::test]
    async fn test_all_quota_failures_exhaust_pool() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = pool_with(&["k1", "k2", "k3", "k4"], store.clone());
        let remote = ScriptedRemote::new(&[
            ("k1", Reply::Quota),
            ("k2", Reply::RateLimited),
            ("k3", Reply::Quota),
            ("k4", Reply::Quota),
        ]);

        let err = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeError::AllCredentialsExhausted { attempts: 4 }));
        assert!(err.needs_reconfiguration());
        assert_eq!(remote.calls().len(), 4);
        assert!(!err.to_string().contains("QUOTA"));
        // Failed rotation is not persisted
        assert_eq!(pool.current_index(), 0);
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn test_fatal_failure_halts_rotation() {
        let pool = pool_with(&["k1", "k2", "k3"], Arc::new(MemoryCursorStore::new()));
        let remote = ScriptedRemote::new(&[
            ("k1", Reply::Quota),
            ("k2", Reply::Fatal),
            ("k3", Reply::Ok("never")),
        ]);

        let err = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap_err();

        match &err {
            InvokeError::Fatal {
                credential_index,
                attempts,
                source,
            } => {
                assert_eq!(*credential_index, 1);
                assert_eq!(*attempts, 2);
                assert_eq!(source.message, "Internal error encountered.");
            }
            other => panic!("expected fatal error, got {:?}", other),
        }
        assert!(!err.needs_reconfiguration());
        assert_eq!(err.to_string(), "Internal error encountered.");
        assert_eq!(remote.calls(), vec!["k1", "k2"]);
        assert_eq!(pool.current_index(), 0);
    }

    #[tokio::test]
    async fn test_empty_pool_is_configuration_error() {
        let pool = pool_with(&[], Arc::new(MemoryCursorStore::new()));
        let remote = ScriptedRemote::new(&[]);

        let err = FailoverInvoker::new(pool)
            .invoke(&remote, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeError::Configuration(ConfigurationError::EmptyPool)));
        assert_eq!(err.attempts(), 0);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_starts_from_cursor_and_wraps() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = pool_with(&["k1", "k2", "k3"], store.clone());
        pool.mark_good(2).await.unwrap();

        let remote = ScriptedRemote::new(&[
            ("k1", Reply::Ok("done")),
            ("k2", Reply::Quota),
            ("k3", Reply::Quota),
        ]);

        let invoked = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap();

        assert_eq!(remote.calls(), vec!["k3", "k1"]);
        assert_eq!(invoked.credential_index, 0);
        assert_eq!(pool.current_index(), 0);
        assert_eq!(store.get(), Some(0));
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_starting_cursor() {
        let pool = pool_with(&["k1", "k2", "k3"], Arc::new(MemoryCursorStore::new()));
        pool.mark_good(1).await.unwrap();
        let remote = ScriptedRemote::new(&[
            ("k1", Reply::Quota),
            ("k2", Reply::Quota),
            ("k3", Reply::Quota),
        ]);

        let invoker = FailoverInvoker::new(pool.clone());
        let _ = invoker.invoke(&remote, &request()).await;

        assert_eq!(remote.calls(), vec!["k2", "k3", "k1"]);
        assert_eq!(pool.current_index(), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_is_fatal_by_default() {
        let pool = pool_with(&["k1", "k2"], Arc::new(MemoryCursorStore::new()));
        let remote = ScriptedRemote::new(&[("k1", Reply::InvalidKey), ("k2", Reply::Ok("done"))]);

        let err = FailoverInvoker::new(pool)
            .invoke(&remote, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeError::Fatal { attempts: 1, .. }));
        assert_eq!(remote.calls(), vec!["k1"]);
    }

    #[tokio::test]
    async fn test_invalid_key_rotates_when_enabled() {
        let pool = pool_with(&["k1", "k2"], Arc::new(MemoryCursorStore::new()));
        let remote = ScriptedRemote::new(&[("k1", Reply::InvalidKey), ("k2", Reply::Ok("done"))]);
        let policy = FailoverPolicy::new().with_rotate_on_invalid_credential(true);

        let invoked = FailoverInvoker::new(pool.clone())
            .with_policy(policy)
            .invoke(&remote, &request())
            .await
            .unwrap();

        assert_eq!(invoked.credential_index, 1);
        assert_eq!(remote.calls(), vec!["k1", "k2"]);
        assert_eq!(pool.current_index(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_call() {
        let pool = pool_with(&["k1", "k2"], Arc::new(FailingStore));
        let remote = ScriptedRemote::new(&[("k1", Reply::Quota), ("k2", Reply::Ok("done"))]);

        let invoked = FailoverInvoker::new(pool.clone())
            .invoke(&remote, &request())
            .await
            .unwrap();

        assert_eq!(invoked.value, "analyze:done");
        assert_eq!(pool.current_index(), 1);
    }

    #[test]
    fn test_quota_classification() {
        let quota = FakeError {
            status: None,
            message: "You exceeded your current Quota".to_string(),
        };
        let rate_limited = FakeError {
            status: Some(429),
            message: "Too Many Requests".to_string(),
        };
        let server = FakeError {
            status: Some(503),
            message: "The model is overloaded".to_string(),
        };

        assert!(is_quota_error(&quota));
        assert!(is_quota_error(&rate_limited));
        assert!(!is_quota_error(&server));

        let policy = FailoverPolicy::default();
        assert!(matches!(
            policy.classify::<(), _>(Err(quota)),
            InvocationOutcome::RetryableFailure(_)
        ));
        assert!(matches!(
            policy.classify::<(), _>(Err(server)),
            InvocationOutcome::FatalFailure(_)
        ));
        assert!(matches!(
            policy.classify::<_, FakeError>(Ok(1)),
            InvocationOutcome::Success(1)
        ));
    }

    #[test]
    fn test_invalid_credential_classification() {
        let forbidden = FakeError {
            status: Some(403),
            message: "Permission denied".to_string(),
        };
        let invalid = FakeError {
            status: Some(400),
            message: "API key not valid. Please pass a valid API key.".to_string(),
        };
        let bad_request = FakeError {
            status: Some(400),
            message: "Invalid JSON payload".to_string(),
        };

        assert!(is_invalid_credential(&forbidden));
        assert!(is_invalid_credential(&invalid));
        assert!(!is_invalid_credential(&bad_request));
    }
}
