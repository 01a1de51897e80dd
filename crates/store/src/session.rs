//! Login session state on the flat medium.
//!
//! # Keys
//!
//! - `user` - The logged-in user, as JSON
//! - `token` - Bearer token issued at login
//! - `loggedInUser` - Email of the logged-in user
//! - `profile_<email>` - Profile fields saved at logout, keyed by case-folded email
//!
//! Logging out clears the first three and keeps saved profiles, so the next
//! login with the same email gets its profile back.

use secrecy::{ExposeSecret, SecretString};
use shopkart_core::{AuthToken, Email, Profile, User};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::flat::{FlatMedium, FlatStore};

/// Key of the logged-in user.
pub const CURRENT_USER_KEY: &str = "user";
/// Key of the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Key of the logged-in email.
pub const LOGGED_IN_EMAIL_KEY: &str = "loggedInUser";
/// Prefix of saved-profile keys.
pub const PROFILE_KEY_PREFIX: &str = "profile_";

/// Saved-profile key for `email`.
#[must_use]
pub fn profile_key(email: &Email) -> String {
    format!("{PROFILE_KEY_PREFIX}{}", email.key())
}

/// Result of [`Session::login`].
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The user as stored in the session, with any saved profile merged in.
    pub user: User,
    /// Whether a saved profile was found and merged.
    pub profile_restored: bool,
}

/// Session handle.
#[derive(Debug)]
pub struct Session<M> {
    flat: FlatStore<M>,
}

impl<M> Clone for Session<M> {
    fn clone(&self) -> Self {
        Self {
            flat: self.flat.clone(),
        }
    }
}

impl<M: FlatMedium> Session<M> {
    /// Session over `flat`.
    #[must_use]
    pub const fn new(flat: FlatStore<M>) -> Self {
        Self { flat }
    }

    /// Start a session for `user` as returned by the auth service.
    ///
    /// If a profile was saved for the user's email, its non-empty fields
    /// replace the ones in `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuotaExceeded`] or [`StoreError::Io`] if the
    /// session cannot be written.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn login(&self, mut user: User, token: SecretString) -> Result<LoginOutcome> {
        let saved = match &user.email {
            Some(email) => self.saved_profile(email).await?,
            None => None,
        };
        let profile_restored = saved.is_some();
        if let Some(profile) = &saved {
            user.merge_profile(profile);
            info!("Restored saved profile");
        } else {
            debug!("No saved profile");
        }

        let user = self.start(user, &token).await?;
        Ok(LoginOutcome {
            user,
            profile_restored,
        })
    }

    /// Start a session for a freshly registered user. No profile merge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuotaExceeded`] or [`StoreError::Io`].
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn register(&self, user: User, token: SecretString) -> Result<User> {
        self.start(user, &token).await
    }

    async fn start(&self, mut user: User, token: &SecretString) -> Result<User> {
        user.token = Some(AuthToken::new(token.expose_secret().to_owned()));
        self.flat.set_json(CURRENT_USER_KEY, &user).await?;
        self.flat
            .set_raw(TOKEN_KEY, token.expose_secret().to_owned())
            .await?;
        match &user.email {
            Some(email) => {
                self.flat
                    .set_raw(LOGGED_IN_EMAIL_KEY, email.as_str().to_owned())
                    .await?;
            }
            None => self.flat.remove(LOGGED_IN_EMAIL_KEY).await?,
        }
        Ok(user)
    }

    /// The logged-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn current_user(&self) -> Result<Option<User>> {
        self.flat.get_json(CURRENT_USER_KEY).await
    }

    /// The logged-in user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotLoggedIn`] if nobody is logged in.
    pub async fn require_user(&self) -> Result<User> {
        self.current_user().await?.ok_or(StoreError::NotLoggedIn)
    }

    /// The bearer token, if logged in.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn token(&self) -> Result<Option<SecretString>> {
        Ok(self
            .flat
            .get_raw(TOKEN_KEY)
            .await?
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from))
    }

    /// Profile saved for `email`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn saved_profile(&self, email: &Email) -> Result<Option<Profile>> {
        self.flat.get_json(&profile_key(email)).await
    }

    /// Edit the logged-in user's profile. `None` fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotLoggedIn`], [`StoreError::QuotaExceeded`] or
    /// [`StoreError::Io`].
    #[instrument(skip_all)]
    pub async fn update_profile(&self, edit: Profile) -> Result<User> {
        let mut user = self.require_user().await?;
        user.apply_profile(edit);
        self.flat.set_json(CURRENT_USER_KEY, &user).await?;
        if let Some(email) = &user.email {
            self.flat.set_json(&profile_key(email), &user.profile()).await?;
        }
        debug!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// End the session.
    ///
    /// The user's profile is saved under their email first when they have one
    /// and it carries contact details. Saving is best-effort: a failure is
    /// logged and the session is cleared anyway. Returns the user that was
    /// logged in.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the session keys cannot be removed.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<Option<User>> {
        let user = self.current_user().await?;
        if let Some(user) = &user
            && let Some(email) = &user.email
        {
            let profile = user.profile();
            if profile.has_contact_details() {
                match self.flat.set_json(&profile_key(email), &profile).await {
                    Ok(()) => debug!(user_id = %user.id, "Saved profile"),
                    Err(e) => warn!(user_id = %user.id, error = %e, "Could not save profile"),
                }
            }
        }

        self.flat.remove(CURRENT_USER_KEY).await?;
        self.flat.remove(TOKEN_KEY).await?;
        self.flat.remove(LOGGED_IN_EMAIL_KEY).await?;
        info!("Logged out");
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flat::{AnyMedium, MemoryMedium};
    use serde_json::json;

    fn session() -> Session<MemoryMedium> {
        Session::new(FlatStore::new(MemoryMedium::new(1 << 20)))
    }

    fn user(value: serde_json::Value) -> User {
        serde_json::from_value(value).unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("demo-token".to_owned())
    }

    #[tokio::test]
    async fn test_clones_share_session_state() {
        let session: Session<AnyMedium> = Session::new(FlatStore::new(AnyMedium::Memory(
            MemoryMedium::new(1 << 20),
        )));
        let other = session.clone();
        session
            .login(user(json!({"id": 3, "name": "Ravi", "email": "ravi@shop.in"})), token())
            .await
            .unwrap();

        let current = other.current_user().await.unwrap().unwrap();
        assert_eq!(current.name, "Ravi");
        other.logout().await.unwrap();
        assert!(session.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_logout_login_restores_profile() {
        let session = session();
        let first = session
            .login(user(json!({"id": 1, "name": "Asha", "email": "Asha@Shop.in"})), token())
            .await
            .unwrap();
        assert!(!first.profile_restored);

        session
            .update_profile(Profile {
                phone: Some("9876543210".to_owned()),
                city: Some("Pune".to_owned()),
                ..Profile::default()
            })
            .await
            .unwrap();

        let out = session.logout().await.unwrap().unwrap();
        assert_eq!(out.city.as_deref(), Some("Pune"));
        assert!(session.current_user().await.unwrap().is_none());
        assert!(session.token().await.unwrap().is_none());

        // The auth service returns bare data; the saved profile wins.
        let again = session
            .login(
                user(json!({"id": 1, "name": "asha", "email": "asha@shop.in", "city": "Delhi"})),
                token(),
            )
            .await
            .unwrap();
        assert!(again.profile_restored);
        assert_eq!(again.user.name, "Asha");
        assert_eq!(again.user.city.as_deref(), Some("Pune"));
        assert_eq!(again.user.phone.as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn test_logout_without_email_saves_nothing() {
        let session = session();
        session
            .register(user(json!({"id": 2, "name": "Guest", "phone": "1"})), token())
            .await
            .unwrap();
        session.logout().await.unwrap();
        let keys = session.flat.keys().await.unwrap();
        assert!(keys.is_empty(), "unexpected keys: {keys:?}");
    }

    #[tokio::test]
    async fn test_logout_with_full_quota_still_clears_session() {
        let session = Session::new(FlatStore::new(MemoryMedium::new(300)));
        session
            .login(
                user(json!({"id": 3, "name": "Ravi", "email": "ravi@shop.in", "city": "Pune"})),
                token(),
            )
            .await
            .unwrap();
        // Fill the medium so the profile no longer fits.
        let used = session.flat.usage().await.unwrap().used;
        let filler = usize::try_from(300 - used).unwrap() - 6;
        session.flat.set_raw("filler", "x".repeat(filler)).await.unwrap();

        session.logout().await.unwrap();
        assert!(session.current_user().await.unwrap().is_none());
        let email = Email::parse("ravi@shop.in").unwrap();
        assert!(session.saved_profile(&email).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_is_secret() {
        let session = session();
        session
            .register(user(json!({"id": 4, "name": "T"})), token())
            .await
            .unwrap();
        let token = session.token().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "demo-token");
        assert!(!format!("{token:?}").contains("demo-token"));
        let current = session.current_user().await.unwrap().unwrap();
        assert!(!format!("{current:?}").contains("demo-token"));
    }

    #[tokio::test]
    async fn test_update_profile_requires_login() {
        let err = session().update_profile(Profile::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotLoggedIn));
    }
}
