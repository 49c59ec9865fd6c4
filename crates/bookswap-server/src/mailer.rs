//! Outbound verification mail over SMTP.
//!
//! The mailer is optional: without `SMTP_HOST` the server runs without one
//! and verification codes are surfaced through the development fallback
//! instead.  Delivery failures are returned to the caller, who logs them and
//! falls back; they never fail the surrounding registration or resend.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;
use crate::otp::OTP_TTL_MINUTES;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// SMTP client for transactional mail.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// Build a mailer from SMTP settings.  Fails only on an unparseable
    /// sender mailbox.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from.parse()?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
                .port(config.port);
        if let Some((user, pass)) = &config.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Send a verification code to `to`.
    pub async fn send_otp(&self, to: &str, name: &str, code: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject("Your BookSwap verification code")
            .body(format!(
                "Hello {name},\n\n\
                 Your BookSwap verification code is: {code}\n\n\
                 This code expires in {OTP_TTL_MINUTES} minutes.\n\n\
                 If you did not request this, you can ignore this email.\n\n\
                 The BookSwap Team\n"
            ))?;

        self.transport.send(message).await?;
        Ok(())
    }
}
