use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::vault::CredentialVault;

/// Which side of the consultation the authenticated user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "patient")]
    Patient,
    #[serde(rename = "doctor")]
    Doctor,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }
}

/// In-memory authenticated-identity state for the current user.
///
/// When `is_authenticated` is true, `role` and `user_id` are both present;
/// the reverse may only fail transiently in the middle of a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub is_authenticated: bool,
    pub role: Option<UserRole>,
    pub user_id: Option<i64>,
}

impl Session {
    fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            role: None,
            user_id: None,
        }
    }
}

/// Process-wide source of truth for authentication and role state.
///
/// The store is its own only writer: `login` and `logout` are the sole
/// mutators, every other component just reads. A present, non-empty token in
/// the vault is trusted at startup without server-side revalidation — a
/// token revoked while the process was down is only discovered on the first
/// 401, which force-logs-out through the pipeline.
pub struct SessionStore {
    vault: Arc<dyn CredentialVault>,
    state: RwLock<Session>,
}

impl SessionStore {
    /// Restores the session from whatever the vault holds.
    pub fn init(vault: Arc<dyn CredentialVault>) -> Self {
        let state = match vault.token() {
            Some(token) if !token.is_empty() => {
                let role = vault.user_role();
                let user_id = vault.user_id();
                info!(?role, ?user_id, "restored authenticated session from vault");
                Session {
                    is_authenticated: true,
                    role,
                    user_id,
                }
            }
            _ => {
                info!("no stored token; starting unauthenticated");
                Session::unauthenticated()
            }
        };
        Self {
            vault,
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().unwrap().is_authenticated
    }

    pub fn role(&self) -> Option<UserRole> {
        self.state.read().unwrap().role
    }

    pub fn user_id(&self) -> Option<i64> {
        self.state.read().unwrap().user_id
    }

    /// Marks the session authenticated. In-memory notification only: callers
    /// persist the credential set to the vault *first*, so the store never
    /// claims an authentication that is not yet durable.
    pub fn login(&self, role: UserRole, user_id: i64) {
        let mut state = self.state.write().unwrap();
        *state = Session {
            is_authenticated: true,
            role: Some(role),
            user_id: Some(user_id),
        };
        info!(role = role.as_str(), user_id, "session authenticated");
    }

    /// Clears the vault and resets the in-memory state, unconditionally.
    pub fn logout(&self) {
        self.vault.clear_credentials();
        *self.state.write().unwrap() = Session::unauthenticated();
        info!("session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{InMemoryCredentialVault, StoredCredentials};

    fn vault_with_credentials() -> Arc<InMemoryCredentialVault> {
        let vault = Arc::new(InMemoryCredentialVault::new());
        vault.store_credentials(&StoredCredentials {
            token: "token-123".to_string(),
            user_id: 42,
            role: UserRole::Patient,
            display_name: "Ada".to_string(),
        });
        vault
    }

    #[test]
    fn init_restores_authenticated_session_from_vault() {
        let store = SessionStore::init(vault_with_credentials());
        let session = store.snapshot();
        assert!(session.is_authenticated);
        assert_eq!(session.role, Some(UserRole::Patient));
        assert_eq!(session.user_id, Some(42));
    }

    #[test]
    fn init_without_token_starts_unauthenticated() {
        let store = SessionStore::init(Arc::new(InMemoryCredentialVault::new()));
        let session = store.snapshot();
        assert!(!session.is_authenticated);
        assert_eq!(session.role, None);
        assert_eq!(session.user_id, None);
    }

    #[test]
    fn init_with_empty_token_starts_unauthenticated() {
        let vault = Arc::new(InMemoryCredentialVault::new());
        vault.set(crate::vault::credential_keys::TOKEN, String::new());
        let store = SessionStore::init(vault);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn login_updates_in_memory_state() {
        let store = SessionStore::init(Arc::new(InMemoryCredentialVault::new()));
        store.login(UserRole::Doctor, 7);
        assert!(store.is_authenticated());
        assert_eq!(store.role(), Some(UserRole::Doctor));
        assert_eq!(store.user_id(), Some(7));
    }

    #[test]
    fn logout_clears_vault_and_state() {
        let vault = vault_with_credentials();
        let store = SessionStore::init(vault.clone());
        assert!(store.is_authenticated());

        store.logout();

        assert!(!store.is_authenticated());
        assert_eq!(store.role(), None);
        assert_eq!(store.user_id(), None);
        assert_eq!(vault.token(), None);
        assert_eq!(vault.user_id(), None);
        assert_eq!(vault.user_role(), None);
        assert_eq!(vault.display_name(), None);
    }
}
