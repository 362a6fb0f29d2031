use async_trait::async_trait;
use compute::error::{ComputeError, Result};
use compute::notify::Mailer;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SmtpSettings;

/// Delivers mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| ComputeError::Mail(format!("Invalid sender address: {}", e)))?;

        let builder = if settings.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| ComputeError::Mail(format!("SMTP relay configuration error: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let mut builder = builder
            .port(settings.port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %settings.host,
            port = settings.port,
            timeout_secs = settings.timeout_secs,
            "SMTP mailer configured"
        );
        Ok(Self {
            transport: builder.build(),
            from,
            host: settings.host.clone(),
        })
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| ComputeError::Mail(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ComputeError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ComputeError::Mail(e.to_string()))?;
        debug!(subject, "Email sent");
        Ok(())
    }
}
