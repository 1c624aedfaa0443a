use std::sync::Arc;

use tracing::info;

use crate::api::HealthSyncApi;
use crate::error::Result;
use crate::models::{AuthResponse, LoginRequest, Registration};
use crate::session::{SessionStore, UserRole};
use crate::vault::{CredentialVault, StoredCredentials};

/// Sign-in, registration, and sign-out orchestration.
///
/// Persist-then-notify: the credential set reaches the vault *before* the
/// session store is told about it, so in-memory state never claims an
/// authentication that is not yet durable.
pub struct Authenticator {
    api: Arc<dyn HealthSyncApi>,
    vault: Arc<dyn CredentialVault>,
    session: Arc<SessionStore>,
}

impl Authenticator {
    pub fn new(
        api: Arc<dyn HealthSyncApi>,
        vault: Arc<dyn CredentialVault>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            api,
            vault,
            session,
        }
    }

    /// Authenticates against the backend and establishes the session. The
    /// role is chosen by the user at the sign-in form, not returned by the
    /// server.
    pub async fn sign_in(&self, username: &str, password: &str, role: UserRole) -> Result<()> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let auth = self.api.login(&request).await?;
        self.complete_login(auth, role, username);
        Ok(())
    }

    /// Registers a new account. The backend answers with the same auth
    /// payload as login, so a successful registration signs the user in.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let role = registration.role();
        let display_name = registration.display_name().to_string();
        let auth = self.api.register(registration).await?;
        self.complete_login(auth, role, &display_name);
        Ok(())
    }

    pub fn sign_out(&self) {
        self.session.logout();
    }

    fn complete_login(&self, auth: AuthResponse, role: UserRole, display_name: &str) {
        self.vault.store_credentials(&StoredCredentials {
            token: auth.access_token,
            user_id: auth.user_id,
            role,
            display_name: display_name.to_string(),
        });
        self.session.login(role, auth.user_id);
        info!(user_id = auth.user_id, role = role.as_str(), "signed in");
    }
}
