//! Email delivery of password reset links.

use async_trait::async_trait;
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::{path::Path, time::Duration};
use tracing::{debug, instrument};

use crate::{
    auth::reset::ResetNotifier,
    config::{EmailConfig, EmailTransportConfig},
    db::models::identities::Identity,
    errors::Error,
    types::abbrev_uuid,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reset_base_url: String,
    reset_token_duration: Duration,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &EmailConfig, reset_token_duration: Duration) -> Result<Self, Error> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                    operation: format!("create emails directory: {e}"),
                })?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
            reset_base_url: config.reset_base_url.clone(),
            reset_token_duration,
        })
    }

    pub async fn send_password_reset_email(&self, to_email: &str, username: &str, token: &str) -> Result<(), Error> {
        let reset_link = self.reset_link(token);
        let body = self.create_password_reset_body(username, &reset_link);

        self.send_email(to_email, "Password Reset Request", &body).await
    }

    fn reset_link(&self, token: &str) -> String {
        let separator = if self.reset_base_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}token={token}", self.reset_base_url)
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_password_reset_body(&self, username: &str, reset_link: &str) -> String {
        let minutes = (self.reset_token_duration.as_secs() / 60).max(1);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password Reset Request</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Password Reset Request</h2>

        <p>Hello {username},</p>

        <p>We received a request to reset your password. If you didn't make this request, you can safely ignore this email.</p>

        <p><a href="{reset_link}">Reset your password</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{reset_link}</p>

        <p>This link can be used once and expires in {minutes} minutes. Resetting your password signs you out everywhere.</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }
}

#[async_trait]
impl ResetNotifier for EmailService {
    #[instrument(skip_all, fields(identity_id = %abbrev_uuid(&identity.id)), err)]
    async fn send_reset(&self, identity: &Identity, token: &str) -> Result<(), Error> {
        let Some(email) = identity.email.as_deref() else {
            debug!("Identity has no email address, reset link not sent");
            return Ok(());
        };

        self.send_password_reset_email(email, &identity.username, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn file_config(dir: &Path) -> EmailConfig {
        EmailConfig {
            transport: EmailTransportConfig::File {
                path: dir.to_string_lossy().to_string(),
            },
            from_email: "noreply@example.com".to_string(),
            from_name: "Warden".to_string(),
            reset_base_url: "https://example.com/reset-password".to_string(),
        }
    }

    fn identity(email: Option<&str>) -> Identity {
        let now = Utc::now();
        Identity {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: email.map(str::to_string),
            password_hash: "hash".to_string(),
            role: Role::Standard,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_password_reset_email_body() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path()), Duration::from_secs(30 * 60)).unwrap();

        let link = service.reset_link("abc123");
        assert_eq!(link, "https://example.com/reset-password?token=abc123");

        let body = service.create_password_reset_body("alice", &link);
        assert!(body.contains("Hello alice,"));
        assert!(body.contains("https://example.com/reset-password?token=abc123"));
        assert!(body.contains("expires in 30 minutes"));
    }

    #[test]
    fn test_reset_link_with_existing_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = file_config(dir.path());
        config.reset_base_url = "https://example.com/reset?lang=en".to_string();
        let service = EmailService::new(&config, Duration::from_secs(60)).unwrap();

        assert_eq!(service.reset_link("abc"), "https://example.com/reset?lang=en&token=abc");
    }

    #[tokio::test]
    async fn test_send_reset_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path()), Duration::from_secs(60)).unwrap();

        service
            .send_reset(&identity(Some("alice@example.com")), "token-value")
            .await
            .unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
        let contents = std::fs::read_to_string(written[0].as_ref().unwrap().path()).unwrap();
        assert!(contents.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn test_send_reset_skips_identity_without_email() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path()), Duration::from_secs(60)).unwrap();

        service.send_reset(&identity(None), "token-value").await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
