use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::notification::{Notification, NotificationSink, NotifyError, email};

/// Connection settings for [`SmtpSink`].
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Sender, either `addr@host` or `Name <addr@host>`.
    pub from: String,
}

/// Delivers notifications as HTML email over SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSink {
    /// Creates a sink. No connection is made until the first delivery.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotifyError::Address(format!("sender {}: {e}", config.from)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| NotifyError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let requester = &notification.booking.requester;
        let address: Address = requester
            .email
            .as_str()
            .parse()
            .map_err(|e| NotifyError::Address(format!("recipient {}: {e}", requester.email)))?;
        let content = email::render(notification);

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(requester.name.clone()), address))
            .subject(content.subject)
            .header(ContentType::TEXT_HTML)
            .body(content.html)
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for SmtpSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::debug!(
            booking_id = %notification.booking.id,
            to = %notification.booking.requester.email,
            "notification email sent"
        );
        Ok(())
    }
}
