use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, warn};

use crate::auth::jwt::JwtKeys;
use crate::config::MailConfig;

/// What the emailed link is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPurpose {
    ConfirmEmail,
    ResetPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig, server: &str) -> anyhow::Result<Self> {
        let builder = if cfg.ssl_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(server).context("smtp relay")?
        } else if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server).context("smtp starttls relay")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };
        let mut builder = builder.port(cfg.port);
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()));
        }

        let from = Mailbox::from_str(&format!("{} <{}>", cfg.from_name, cfg.from))
            .context("invalid MAIL_FROM")?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let to = Mailbox::from_str(&email.to).context("invalid recipient")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )
            .context("build email")?;

        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// Used when no SMTP server is configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        warn!(to = %email.to, subject = %email.subject, "mail disabled; email not sent");
        Ok(())
    }
}

/// Escapes text for interpolation into HTML element content and attributes.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn describe_ttl(minutes: u64) -> String {
    match minutes {
        60 => "one hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{m} minutes"),
    }
}

pub fn build_email(
    purpose: EmailPurpose,
    to: &str,
    username: &str,
    base_url: &str,
    token: &str,
    link_ttl_minutes: u64,
) -> OutgoingEmail {
    let base = base_url.trim_end_matches('/');
    let (subject, link, action) = match purpose {
        EmailPurpose::ConfirmEmail => (
            "Confirm your email",
            format!("{base}/api/auth/confirmed_email/{token}"),
            "confirm your email address",
        ),
        EmailPurpose::ResetPassword => (
            "Reset your password",
            format!("{base}/api/auth/reset_password/{token}"),
            "reset your password",
        ),
    };

    let expires = describe_ttl(link_ttl_minutes);
    let safe_name = escape_html(username);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{subject}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <p>Hi {safe_name},</p>
    <p>Please follow the link below to {action}:</p>
    <p style="text-align: center; margin: 30px 0;">
      <a href="{link}" style="background-color: #3498db; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px;">Continue</a>
    </p>
    <p style="word-break: break-all; color: #7f8c8d;">{link}</p>
    <p style="font-size: 12px; color: #7f8c8d;">The link expires in {expires}. If you did not request this, ignore this email.</p>
  </div>
</body>
</html>"#
    );
    let text = format!(
        "Hi {username},\n\nPlease follow the link below to {action}:\n{link}\n\nThe link expires in {expires}."
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        html,
        text,
    }
}

/// Signs an email token and sends the message on a detached task. Errors are
/// logged; there is no retry.
pub fn spawn_token_email(
    mailer: Arc<dyn Mailer>,
    keys: &JwtKeys,
    purpose: EmailPurpose,
    to: String,
    username: String,
    base_url: String,
) {
    let token = match keys.sign_email(&to) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "sign email token failed");
            return;
        }
    };
    let ttl_minutes = keys.email_ttl.as_secs() / 60;
    let email = build_email(purpose, &to, &username, &base_url, &token, ttl_minutes);
    tokio::spawn(async move {
        match mailer.send(email).await {
            Ok(()) => info!(to = %to, ?purpose, "email sent"),
            Err(e) => error!(error = ?e, to = %to, ?purpose, "email send failed"),
        }
    });
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Collects messages instead of sending them.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
            self.sent.lock().await.push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use crate::state::AppState;
    use std::time::Duration;

    #[test]
    fn confirm_email_links_to_confirmation_endpoint() {
        let email = build_email(
            EmailPurpose::ConfirmEmail,
            "ann@example.com",
            "ann",
            "http://api.local/",
            "tok123",
            60,
        );
        assert_eq!(email.subject, "Confirm your email");
        assert!(email.html.contains("http://api.local/api/auth/confirmed_email/tok123"));
        assert!(email.text.contains("Hi ann"));
    }

    #[test]
    fn reset_email_links_to_reset_endpoint() {
        let email = build_email(
            EmailPurpose::ResetPassword,
            "ann@example.com",
            "ann",
            "http://api.local",
            "tok",
            90,
        );
        assert!(email.text.contains("http://api.local/api/auth/reset_password/tok"));
        assert!(email.text.contains("expires in 90 minutes"));
    }

    #[test]
    fn username_is_escaped_in_html_only() {
        let email = build_email(
            EmailPurpose::ConfirmEmail,
            "x@example.com",
            "<b>x</b>",
            "http://h",
            "t",
            60,
        );
        assert!(email.html.contains("Hi &lt;b&gt;x&lt;/b&gt;,"));
        assert!(!email.html.contains("<b>x</b>"));
        assert!(email.text.contains("Hi <b>x</b>,"));
        assert!(email.text.contains("expires in one hour"));
    }

    #[test]
    fn ttl_wording() {
        assert_eq!(describe_ttl(60), "one hour");
        assert_eq!(describe_ttl(120), "2 hours");
        assert_eq!(describe_ttl(15), "15 minutes");
    }

    #[tokio::test]
    async fn spawned_email_carries_valid_email_token() {
        let state = AppState::fake();
        let keys = state.jwt.clone();
        let mailer = Arc::new(RecordingMailer::default());

        spawn_token_email(
            mailer.clone(),
            &keys,
            EmailPurpose::ConfirmEmail,
            "bob@example.com".into(),
            "bob".into(),
            "http://h/".into(),
        );

        let mut sent = Vec::new();
        for _ in 0..50 {
            sent = mailer.sent.lock().await.clone();
            if !sent.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sent.len(), 1);
        let token = sent[0]
            .text
            .split("confirmed_email/")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .expect("token in link");
        assert_eq!(keys.verify_email(token).unwrap(), "bob@example.com");
    }
}
