//! Bearer-token verification.
//!
//! Token issuance (PIN login, sessions) belongs to the auth subsystem; this
//! adapter only verifies tokens of the form `<user_id>.<keyed-hash>` where
//! the hash is a keyed BLAKE3 of the user id under a key derived from the
//! configured secret. Verification then loads the user row and rejects
//! inactive accounts.

use crate::config::TokenSecret;
use crate::domain::Actor;
use crate::error::{AppError, ErrorCode};
use crate::infrastructure::persistence::Store;

const KEY_CONTEXT: &str = "separation-server 2025-07 auth token v1";

/// Verifies bearer tokens against the configured secret.
pub struct TokenVerifier {
    key: [u8; 32],
}

impl TokenVerifier {
    /// Derive the verification key from the configured secret.
    #[must_use]
    pub fn new(secret: &TokenSecret) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.expose().as_bytes()),
        }
    }

    /// Sign a user handle into a token. Mirrors the issuer so tests (and
    /// first-run provisioning) can mint valid tokens.
    #[must_use]
    pub fn sign(&self, user_id: i64) -> String {
        let mac = blake3::keyed_hash(&self.key, user_id.to_string().as_bytes());
        format!("{user_id}.{}", mac.to_hex())
    }

    /// Verify a token and return the embedded user handle.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<i64> {
        let (id_part, mac_part) = token.split_once('.')?;
        let user_id: i64 = id_part.parse().ok()?;
        let expected = blake3::keyed_hash(&self.key, id_part.as_bytes());
        let provided = blake3::Hash::from_hex(mac_part).ok()?;
        // blake3::Hash equality is constant-time.
        (provided == expected).then_some(user_id)
    }
}

/// Resolve a token to an actor: verify the signature, load the user, reject
/// inactive accounts.
///
/// # Errors
///
/// `UNAUTHORIZED` for bad tokens or unknown users, `USER_INACTIVE` for
/// deactivated accounts.
pub async fn authenticate(
    verifier: &TokenVerifier,
    store: &Store,
    token: &str,
) -> Result<Actor, AppError> {
    let user_id = verifier.verify(token).ok_or_else(AppError::unauthorized)?;
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    if !user.is_active {
        return Err(AppError::new(ErrorCode::UserInactive, "User is inactive"));
    }
    Ok(Actor {
        id: user.id,
        name: user.name,
        role: user.role,
    })
}

/// Hash a login PIN for storage. Issuance lives elsewhere; the hash format
/// is shared so seeded rows verify.
#[must_use]
pub fn hash_pin(secret: &TokenSecret, pin: &str) -> String {
    let key = blake3::derive_key(KEY_CONTEXT, secret.expose().as_bytes());
    blake3::keyed_hash(&key, pin.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(&TokenSecret::new("test-secret".to_string()))
    }

    #[test]
    fn sign_verify_round_trip() {
        let v = verifier();
        let token = v.sign(42);
        assert_eq!(v.verify(&token), Some(42));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let v = verifier();
        let token = v.sign(42);
        let forged = token.replacen("42.", "43.", 1);
        assert_eq!(v.verify(&forged), None);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let v = verifier();
        assert_eq!(v.verify(""), None);
        assert_eq!(v.verify("not-a-token"), None);
        assert_eq!(v.verify("12."), None);
        assert_eq!(v.verify("abc.def"), None);
    }

    #[test]
    fn different_secrets_do_not_cross_verify() {
        let a = verifier();
        let b = TokenVerifier::new(&TokenSecret::new("other-secret".to_string()));
        assert_eq!(b.verify(&a.sign(1)), None);
    }

    #[tokio::test]
    async fn inactive_user_is_rejected() {
        let store = Store::in_memory().await.unwrap();
        let secret = TokenSecret::new("test-secret".to_string());
        let v = TokenVerifier::new(&secret);
        let user_id = store
            .insert_user("Ana", &hash_pin(&secret, "1234"), "1234", Role::Separator, None)
            .await
            .unwrap();

        let conn = store.connect().unwrap();
        conn.execute(
            "UPDATE users SET is_active = 0 WHERE id = ?",
            vec![turso::Value::Integer(user_id)],
        )
        .await
        .unwrap();

        let err = authenticate(&v, &store, &v.sign(user_id)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserInactive);
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let store = Store::in_memory().await.unwrap();
        let v = verifier();
        let err = authenticate(&v, &store, &v.sign(999)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
