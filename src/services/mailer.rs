//! The `Mailer` collaborator (SPEC §1/§9): `send(subject, body, recipient)`.
//! Out of scope as a feature of the OIDC core itself, but carried as a
//! concrete SMTP-backed implementation so the email-verification flow has
//! somewhere to dispatch to. Fires via `tokio::spawn` so handlers never
//! block on SMTP round-trip latency.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::Config;

#[derive(Clone)]
pub enum Mailer {
    Smtp(Arc<SmtpMailer>),
    /// Used when SMTP_* is unset (e.g. test builds); logs instead of sending.
    NoOp,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let (host, username, password, from) = match (
            &config.smtp_host,
            &config.smtp_username,
            &config.smtp_password,
            &config.smtp_from,
        ) {
            (Some(h), Some(u), Some(p), Some(f)) => (h, u, p, f),
            _ => return Mailer::NoOp,
        };

        let creds = Credentials::new(username.clone(), password.clone());
        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
            Ok(builder) => builder.port(config.smtp_port).credentials(creds).build(),
            Err(e) => {
                tracing::error!(error = %e, "failed to configure SMTP transport, falling back to no-op mailer");
                return Mailer::NoOp;
            }
        };

        let from: Mailbox = match from.parse() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "invalid SMTP_FROM address, falling back to no-op mailer");
                return Mailer::NoOp;
            }
        };

        Mailer::Smtp(Arc::new(SmtpMailer { transport, from }))
    }

    /// Fire-and-forget send: spawns the SMTP round-trip on a background
    /// task so the calling handler returns immediately.
    pub fn send(&self, subject: String, body: String, recipient: String) {
        match self.clone() {
            Mailer::NoOp => {
                tracing::info!(%recipient, %subject, "no-op mailer: email not sent");
            }
            Mailer::Smtp(mailer) => {
                tokio::spawn(async move {
                    if let Err(e) = mailer.send(&subject, &body, &recipient).await {
                        tracing::error!(error = %e, %recipient, "failed to send email");
                    }
                });
            }
        }
    }
}

impl SmtpMailer {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> anyhow::Result<()> {
        let to: Mailbox = recipient.parse()?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}
