use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info};

use crate::error::ApiError;
use crate::settings::EmailSettings;

/// Delivery seam for credentials mail, so tests can count deliveries
/// without a live SMTP server.
pub trait CredentialNotifier: Send + Sync {
    fn send_credentials(
        &self,
        recipient: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError>;
}

pub fn credentials_email_body(username: &str, password: &str) -> String {
    format!(
        "<html>\n\
         <body>\n\
         <h1>Bienvenue sur MegSupport!</h1>\n\
         <p>Votre compte a été créé avec succès.</p>\n\
         <p><strong>Nom d'utilisateur:</strong> {username}</p>\n\
         <p><strong>Mot de passe temporaire:</strong> {password}</p>\n\
         <p>Veuillez vous connecter à <a href=\"http://localhost:3000/login\">notre application</a> \
         et changer votre mot de passe dès que possible.</p>\n\
         </body>\n\
         </html>"
    )
}

pub struct SmtpNotifier {
    settings: EmailSettings,
}

impl SmtpNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }
}

impl CredentialNotifier for SmtpNotifier {
    fn send_credentials(
        &self,
        recipient: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let message = Message::builder()
            .from(
                self.settings
                    .sender
                    .parse()
                    .map_err(|e| ApiError::Transport(format!("invalid sender address: {e}")))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| ApiError::Transport(format!("invalid recipient address: {e}")))?)
            .subject("Vos informations de connexion MegSupport")
            .header(ContentType::TEXT_HTML)
            .body(credentials_email_body(username, password))
            .map_err(|e| ApiError::Transport(format!("building message failed: {e}")))?;

        let mailer = SmtpTransport::starttls_relay(&self.settings.server)
            .map_err(|e| ApiError::Transport(format!("SMTP relay setup failed: {e}")))?
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.sender.clone(),
                self.settings.password.clone(),
            ))
            .build();

        mailer
            .send(&message)
            .map_err(|e| ApiError::Transport(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

/// Fire-and-forget delivery. The enclosing request completes without
/// waiting; failures land in the log, never in the caller's response.
pub fn dispatch_in_background(
    notifier: Arc<dyn CredentialNotifier>,
    recipient: String,
    username: String,
    password: String,
) {
    tokio::task::spawn_blocking(move || {
        match notifier.send_credentials(&recipient, &username, &password) {
            Ok(()) => info!("email envoyé à {recipient}"),
            Err(e) => error!("l'envoi de l'email à {recipient} a échoué: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct CountingNotifier {
        pub deliveries: AtomicUsize,
    }

    impl CredentialNotifier for CountingNotifier {
        fn send_credentials(&self, _: &str, _: &str, _: &str) -> Result<(), ApiError> {
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn email_body_carries_username_and_password() {
        let body = credentials_email_body("alice", "s3cr3t!pass");
        assert!(body.contains("alice"));
        assert!(body.contains("s3cr3t!pass"));
        assert!(body.contains("Bienvenue sur MegSupport"));
    }

    #[tokio::test]
    async fn background_dispatch_reaches_the_notifier() {
        let notifier = Arc::new(CountingNotifier {
            deliveries: AtomicUsize::new(0),
        });
        dispatch_in_background(
            notifier.clone(),
            "alice@example.com".to_string(),
            "alice".to_string(),
            "pass".to_string(),
        );
        // spawn_blocking runs on its own pool; give it a moment
        for _ in 0..50 {
            if notifier.deliveries.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(notifier.deliveries.load(Ordering::SeqCst), 1);
    }
}
