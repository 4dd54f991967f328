//! Pre-shared key configuration.

use std::fmt;
use std::sync::Arc;

use crate::error::PskError;

type IdentityFn = dyn Fn() -> String + Send + Sync;
type KeyFn = dyn Fn(&str) -> Result<Vec<u8>, PskError> + Send + Sync;

/// The application's PSK callback pair.
///
/// A client calls `get_identity` once per handshake to choose the identity
/// it presents; both sides call `get_key` to resolve an identity to the
/// shared secret. Key material handed back by `get_key` is zeroized after
/// the handshake copies it into the TLS stack.
///
/// Cloning is cheap (the callbacks are shared).
#[derive(Clone)]
pub struct PskConfig {
    get_identity: Arc<IdentityFn>,
    get_key: Arc<KeyFn>,
}

impl PskConfig {
    /// Build a config from the identity and key callbacks.
    pub fn new<I, K>(get_identity: I, get_key: K) -> Self
    where
        I: Fn() -> String + Send + Sync + 'static,
        K: Fn(&str) -> Result<Vec<u8>, PskError> + Send + Sync + 'static,
    {
        Self {
            get_identity: Arc::new(get_identity),
            get_key: Arc::new(get_key),
        }
    }

    /// Convenience constructor for a single fixed identity/key pair.
    ///
    /// Any other identity presented to `get_key` is rejected.
    pub fn fixed(identity: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        let identity = identity.into();
        let key = key.into();
        let expected = identity.clone();
        Self::new(
            move || identity.clone(),
            move |presented| {
                if presented == expected {
                    Ok(key.clone())
                } else {
                    Err(PskError::UnknownIdentity(presented.to_string()))
                }
            },
        )
    }

    /// The identity this endpoint presents as a client.
    #[must_use]
    pub fn identity(&self) -> String {
        (self.get_identity)()
    }

    /// Resolve `identity` to its shared key.
    ///
    /// # Errors
    ///
    /// Propagates the application callback's error; the handshake treats
    /// any failure as an unknown peer.
    pub fn key_for(&self, identity: &str) -> Result<Vec<u8>, PskError> {
        (self.get_key)(identity)
    }
}

impl fmt::Debug for PskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskConfig").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_resolves_own_identity() {
        let config = PskConfig::fixed("hello", b"world".to_vec());
        assert_eq!(config.identity(), "hello");
        assert_eq!(config.key_for("hello").unwrap(), b"world");
    }

    #[test]
    fn fixed_rejects_other_identities() {
        let config = PskConfig::fixed("hello", b"world".to_vec());
        assert!(matches!(
            config.key_for("mallory"),
            Err(PskError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn debug_redacts_key_material() {
        let config = PskConfig::fixed("hello", b"world".to_vec());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("world"));
    }
}
