use dashmap::DashMap;

use crate::session::UserRole;

/// Namespace under which every credential entry lives. Implementations must
/// scope all keys by it so unrelated stores on the same device cannot
/// collide with ours.
pub const CREDENTIAL_NAMESPACE: &str = "com.healthsync.auth";

/// Fixed logical key names inside the namespace.
pub mod credential_keys {
    pub const TOKEN: &str = "token";
    pub const USER_ID: &str = "user_id";
    pub const USER_ROLE: &str = "user_role";
    pub const DISPLAY_NAME: &str = "display_name";
}

/// A complete credential set. The four entries are always written together
/// and cleared together; a partially-updated set must never be observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: String,
    pub user_id: i64,
    pub role: UserRole,
    pub display_name: String,
}

/// Secure key/value store for the bearer token and identity entries.
///
/// Production builds plug in a platform keychain adapter, which is durable
/// across process restarts. The in-memory implementation below backs the CLI
/// and the tests.
pub trait CredentialVault: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);

    fn token(&self) -> Option<String> {
        self.get(credential_keys::TOKEN)
    }

    fn user_id(&self) -> Option<i64> {
        self.get(credential_keys::USER_ID)
            .and_then(|value| value.parse().ok())
    }

    fn user_role(&self) -> Option<UserRole> {
        self.get(credential_keys::USER_ROLE)
            .and_then(|tag| UserRole::from_tag(&tag))
    }

    fn display_name(&self) -> Option<String> {
        self.get(credential_keys::DISPLAY_NAME)
    }

    /// Writes all four entries.
    fn store_credentials(&self, credentials: &StoredCredentials) {
        self.set(credential_keys::TOKEN, credentials.token.clone());
        self.set(credential_keys::USER_ID, credentials.user_id.to_string());
        self.set(
            credential_keys::USER_ROLE,
            credentials.role.as_str().to_string(),
        );
        self.set(
            credential_keys::DISPLAY_NAME,
            credentials.display_name.clone(),
        );
    }

    /// Clears all four entries.
    fn clear_credentials(&self) {
        self.remove(credential_keys::TOKEN);
        self.remove(credential_keys::USER_ID);
        self.remove(credential_keys::USER_ROLE);
        self.remove(credential_keys::DISPLAY_NAME);
    }
}

/// In-memory implementation of [`CredentialVault`].
pub struct InMemoryCredentialVault {
    entries: DashMap<String, String>,
}

impl InMemoryCredentialVault {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryCredentialVault {
    fn default() -> Self {
        Self::new()
    }
}

fn scoped(key: &str) -> String {
    format!("{CREDENTIAL_NAMESPACE}/{key}")
}

impl CredentialVault for InMemoryCredentialVault {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(&scoped(key)).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(scoped(key), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(&scoped(key));
    }
}
