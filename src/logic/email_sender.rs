use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::task::JoinHandle;

use crate::model::{AppError, EmailMessage, ErrorCode, PersistenceError, QueuedEmail, UserContext};
use crate::store::EmailOutboxStore;

/// Outbound mail delivery.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_email(
        &self,
        from_address: &str,
        to_address: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()>;
}

/// Transport that only logs what it would send.
#[derive(Debug, Default, Clone)]
pub struct LogMailTransport;

#[async_trait::async_trait]
impl MailTransport for LogMailTransport {
    async fn send_email(
        &self,
        from_address: &str,
        to_address: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        info!(
            "E-mail from {} to {} with subject {:?} ({} bytes)",
            from_address,
            to_address,
            subject,
            body.len()
        );
        Ok(())
    }
}

/// Appends a rendered document to the outbox on behalf of `user`.
pub async fn queue_notification<S: EmailOutboxStore + ?Sized>(
    store: &S,
    user: &UserContext,
    to_address: &str,
    subject: &str,
    document: &str,
) -> Result<QueuedEmail, AppError> {
    let message = EmailMessage::new(user.audit_name(), to_address, subject, document);
    let queued = store.enqueue_email(message).await.map_err(|e| {
        error!("Failed to queue e-mail to {}: {}", to_address, e);
        AppError::from(ErrorCode::EmailNotQueued)
    })?;
    info!("Queued e-mail {} to {}", queued.id, to_address);
    Ok(queued)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Drains the e-mail outbox. Messages that fail stay pending for the next run.
pub struct EmailMessageSender<S: ?Sized> {
    store: Arc<S>,
    transport: Arc<dyn MailTransport>,
    from_address: String,
    batch_size: usize,
}

impl<S: EmailOutboxStore + ?Sized + 'static> EmailMessageSender<S> {
    pub fn new(
        store: Arc<S>,
        transport: Arc<dyn MailTransport>,
        from_address: String,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            transport,
            from_address,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn deliver_pending(&self) -> Result<DeliveryReport, PersistenceError> {
        let mut report = DeliveryReport::default();

        for email in self.store.pending_emails(self.batch_size).await? {
            match self.deliver(&email).await {
                Ok(()) => {
                    self.store.mark_email_sent(&email.id).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    error!(
                        "Delivery of e-mail {} to {} failed (attempt {}): {:#}",
                        email.id,
                        email.message.to_address,
                        email.attempts + 1,
                        e
                    );
                    self.store
                        .record_email_failure(&email.id, &format!("{:#}", e))
                        .await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, email: &QueuedEmail) -> anyhow::Result<()> {
        let body = email.message.decoded_body()?;
        self.transport
            .send_email(
                &self.from_address,
                &email.message.to_address,
                &email.message.subject,
                &body,
            )
            .await
    }

    /// Polls the outbox every `period` until the runtime shuts down.
    pub fn spawn(self, period: Duration) -> JoinHandle<()>
    where
        S: Send + Sync,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match self.deliver_pending().await {
                    Ok(report) if report.sent + report.failed > 0 => info!(
                        "E-mail outbox run: {} sent, {} failed",
                        report.sent, report.failed
                    ),
                    Ok(_) => {}
                    Err(e) => error!("E-mail outbox run failed: {}", e),
                }
            }
        })
    }
}
