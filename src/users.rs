use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::database::{Database, User};
use crate::error::ApiError;
use crate::notify::{dispatch_in_background, CredentialNotifier};

/// Letters, digits, and the symbol set used for generated passwords.
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()";
const PASSWORD_LENGTH: usize = 12;

pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LENGTH)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

pub struct UserCreator {
    db: Database,
    notifier: Arc<dyn CredentialNotifier>,
}

impl UserCreator {
    pub fn new(db: Database, notifier: Arc<dyn CredentialNotifier>) -> Self {
        Self { db, notifier }
    }

    /// Create an account, persist it, and hand the credentials mail to the
    /// notifier exactly once, fire-and-forget. The returned `User` carries
    /// no password material.
    pub fn create(&self, username: &str, email: &str) -> Result<User, ApiError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(ApiError::invalid_input(
                "Le nom d'utilisateur ne peut pas être vide",
            ));
        }
        if !email.contains('@') {
            return Err(ApiError::invalid_input("Adresse email invalide"));
        }

        let password = generate_password();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            is_admin: false,
        };
        self.db
            .insert_user(&user)
            .map_err(|e| ApiError::backing_store(format!("storing user failed: {e}")))?;

        dispatch_in_background(
            self.notifier.clone(),
            user.email.clone(),
            user.username.clone(),
            password,
        );
        info!("created user {} ({})", user.username, user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        deliveries: AtomicUsize,
    }

    impl CredentialNotifier for CountingNotifier {
        fn send_credentials(&self, _: &str, _: &str, _: &str) -> Result<(), ApiError> {
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn creator() -> (tempfile::TempDir, Arc<CountingNotifier>, UserCreator) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let notifier = Arc::new(CountingNotifier {
            deliveries: AtomicUsize::new(0),
        });
        let creator = UserCreator::new(db, notifier.clone());
        (dir, notifier, creator)
    }

    #[test]
    fn password_has_expected_length_and_charset() {
        let password = generate_password();
        assert_eq!(password.len(), 12);
        assert!(password
            .bytes()
            .all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[tokio::test]
    async fn create_persists_user_and_notifies_once() {
        let (_dir, notifier, creator) = creator();
        let user = creator.create("alice", "alice@example.com").unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);

        for _ in 0..50 {
            if notifier.deliveries.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(notifier.deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn serialized_user_carries_no_password() {
        let (_dir, _notifier, creator) = creator();
        let user = creator.create("bob", "bob@example.com").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.to_lowercase().contains("password"));
        assert!(!json.to_lowercase().contains("mot de passe"));
        assert!(json.contains("\"isAdmin\":false"));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let (_dir, notifier, creator) = creator();
        match creator.create("carol", "pas-une-adresse") {
            Err(ApiError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert_eq!(notifier.deliveries.load(Ordering::SeqCst), 0);
    }
}
