//! Digest delivery over SMTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::progress::SubjectKind;

pub fn subject_line(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Normal => "🚀 Daily Learning",
        SubjectKind::LastDay => "⚠️ Course Finishing Today!",
        SubjectKind::Completed => "🛑 Playlist Completed",
    }
}

/// Outbound mail transport. One call sends one message; errors are not retried.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn sender(&self) -> Result<Mailbox> {
        let address: Address = self
            .config
            .username
            .parse()
            .context("Invalid sender email address")?;
        Ok(Mailbox::new(Some(self.config.from_name.clone()), address))
    }

    fn build(&self, to: &str, subject: &str, html: &str) -> Result<Message> {
        let to: Mailbox = to.parse().context("Invalid recipient email address")?;
        Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .context("Failed to build email message")
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let email = self.build(to, subject, html)?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .context("Failed to create SMTP transport")?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .context("Failed to send email via SMTP")?;
        Ok(())
    }
}

/// Maps a subject class to its fixed subject line and hands the digest to a [`Mailer`].
pub struct EmailDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl EmailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub async fn dispatch(&self, html: &str, recipient: &str, kind: SubjectKind) -> Result<()> {
        let subject = subject_line(kind);
        self.mailer.send(recipient, subject, html).await?;
        tracing::info!(to = %recipient, subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Sent {
        pub to: String,
        pub subject: String,
        pub html: String,
    }

    /// Records messages instead of sending them; optionally fails every call.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Sent>>,
        pub fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("SMTP connection refused");
            }
            self.sent.lock().unwrap().push(Sent {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    fn smtp() -> SmtpMailer {
        SmtpMailer::new(MailConfig {
            username: "bot@example.com".into(),
            password: "secret".into(),
            recipient: "me@example.com".into(),
            ..MailConfig::default()
        })
    }

    #[test]
    fn test_subject_lines() {
        assert_eq!(subject_line(SubjectKind::Normal), "🚀 Daily Learning");
        assert_eq!(subject_line(SubjectKind::LastDay), "⚠️ Course Finishing Today!");
        assert_eq!(subject_line(SubjectKind::Completed), "🛑 Playlist Completed");
    }

    #[test]
    fn test_message_has_display_name_and_html() {
        let message = smtp()
            .build("me@example.com", "🚀 Daily Learning", "<h1>hi</h1>")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Topic Master"));
        assert!(raw.contains("<bot@example.com>"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_invalid_recipient_is_error() {
        assert!(smtp().build("not an address", "s", "<p></p>").is_err());
    }

    #[tokio::test]
    async fn test_dispatch_maps_subject() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = EmailDispatcher::new(mailer.clone());
        dispatcher
            .dispatch("<p>done</p>", "me@example.com", SubjectKind::Completed)
            .await
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "🛑 Playlist Completed");
        assert_eq!(sent[0].to, "me@example.com");
    }

    #[tokio::test]
    async fn test_dispatch_propagates_failure() {
        let dispatcher = EmailDispatcher::new(Arc::new(RecordingMailer::failing()));
        let err = dispatcher
            .dispatch("<p></p>", "me@example.com", SubjectKind::Normal)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMTP"));
    }
}
