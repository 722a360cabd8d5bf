//! Email sending for alert digests, confirmations and operator notices.

use crate::AppResources;
use crate::alerts::matcher::DigestJob;
use crate::config::AlertsConfig;
use crate::email_templates::{
    ActivationEmailTemplate, DigestEmailTemplate, english_list, format_hansard_date,
};
use crate::entity::{hansard, politician};
use crate::mailer::{MailError, Mailer};
use lettre::Message;
use lettre::message::header::ContentType;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Subjects longer than this are cut, possibly mid-word.
pub const MAX_SUBJECT_LENGTH: usize = 200;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to render email template: {0}")]
    Template(#[from] askama::Error),
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Decides which recipients may actually be mailed.
///
/// In sandbox mode only addresses containing one of the allowed patterns
/// (case-insensitive) are delivered; the rest are logged.
#[derive(Clone, Debug, Default)]
pub struct RecipientPolicy {
    sandbox: bool,
    allowed: Vec<String>,
}

impl RecipientPolicy {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn sandboxed<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sandbox: true,
            allowed: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AlertsConfig) -> Self {
        if config.sandbox {
            Self::sandboxed(&config.allowed_recipients)
        } else {
            Self::unrestricted()
        }
    }

    pub fn allows(&self, email: &str) -> bool {
        if !self.sandbox {
            return true;
        }
        let email = email.to_lowercase();
        self.allowed.iter().any(|p| email.contains(p.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// Withheld by the recipient policy and logged instead.
    Sandboxed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub sandboxed: usize,
    pub failed: usize,
}

/// `"<name> spoke about <topics> in the House"`, cut to [`MAX_SUBJECT_LENGTH`].
pub fn digest_subject(politician_name: &str, topics: &[String]) -> String {
    let subject = format!(
        "{} spoke about {} in the House",
        politician_name,
        english_list(topics)
    );
    truncate_subject(&subject)
}

pub fn truncate_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_LENGTH).collect()
}

#[derive(Clone)]
pub struct NotificationSender {
    mailer: Arc<dyn Mailer>,
    policy: RecipientPolicy,
    digest_from: String,
    confirmation_from: String,
    server_from: String,
    site_url: String,
    admins: Vec<String>,
}

impl NotificationSender {
    pub fn new(mailer: Arc<dyn Mailer>, policy: RecipientPolicy, site_url: &str) -> Self {
        let defaults = AlertsConfig::default();
        Self {
            mailer,
            policy,
            digest_from: defaults.digest_from,
            confirmation_from: defaults.confirmation_from,
            server_from: defaults.server_from,
            site_url: site_url.trim_end_matches('/').to_string(),
            admins: Vec::new(),
        }
    }

    pub fn from_resources(resources: &AppResources) -> Self {
        let config = &resources.config;
        Self {
            mailer: resources.mailer.clone(),
            policy: RecipientPolicy::from_config(&config.alerts),
            digest_from: config.alerts.digest_from.clone(),
            confirmation_from: config.alerts.confirmation_from.clone(),
            server_from: config.alerts.server_from.clone(),
            site_url: config.site_url.trim_end_matches('/').to_string(),
            admins: config.admins.clone(),
        }
    }

    pub fn with_admins(mut self, admins: Vec<String>) -> Self {
        self.admins = admins;
        self
    }

    fn plain_message(
        &self,
        from: &str,
        to: &str,
        subject: String,
        body: String,
    ) -> Result<Message, NotifyError> {
        Ok(Message::builder()
            .from(from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .header(lettre::message::header::MIME_VERSION_1_0)
            .message_id(None)
            .body(body)?)
    }

    /// Renders and sends (or, for recipients outside the policy, logs) one digest.
    #[tracing::instrument(skip(self, job, hansard), fields(alert_id = job.alert.id, hansard_id = hansard.id))]
    pub async fn send_digest(
        &self,
        job: &DigestJob,
        hansard: &hansard::Model,
    ) -> Result<DeliveryOutcome, NotifyError> {
        let template = DigestEmailTemplate {
            politician: &job.politician,
            statements: &job.statements,
            topics_list: english_list(&job.topics),
            hansard_date: format_hansard_date(hansard.date),
            hansard_url: format!("{}/debates/{}/", self.site_url, hansard.id),
            alerts_url: format!("{}/alerts/", self.site_url),
        };
        let body = template.render_text()?;
        let subject = digest_subject(&job.politician.name, &job.topics);

        if !self.policy.allows(&job.alert.email) {
            info!(
                recipient = %job.alert.email,
                subject = %subject,
                body = %body,
                "Recipient outside sandbox allow-list; digest logged instead of sent"
            );
            return Ok(DeliveryOutcome::Sandboxed);
        }

        let message = self.plain_message(&self.digest_from, &job.alert.email, subject, body)?;
        self.mailer.send(message).await?;
        info!(
            target: "parliament-alerts",
            "Sent digest for {} to {}",
            job.politician.name, job.alert.email
        );
        Ok(DeliveryOutcome::Sent)
    }

    /// Attempts every job. A failure is logged and counted; it never stops
    /// the remaining jobs and nothing is retried.
    #[tracing::instrument(skip(self, jobs, hansard), fields(jobs = jobs.len(), hansard_id = hansard.id))]
    pub async fn dispatch(&self, jobs: &[DigestJob], hansard: &hansard::Model) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for job in jobs {
            match self.send_digest(job, hansard).await {
                Ok(DeliveryOutcome::Sent) => summary.sent += 1,
                Ok(DeliveryOutcome::Sandboxed) => summary.sandboxed += 1,
                Err(e) => {
                    tracing::error!(
                        name = "alerts.dispatch.send_failed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        error = %e,
                        alert_id = job.alert.id,
                        message = "Error sending alert"
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Mails the double opt-in link for `politician` to `email`.
    #[tracing::instrument(skip(self, politician, activate_url), fields(politician_id = politician.id))]
    pub async fn send_confirmation(
        &self,
        email: &str,
        politician: &politician::Model,
        activate_url: String,
    ) -> Result<(), NotifyError> {
        let body = ActivationEmailTemplate {
            politician,
            activate_url,
        }
        .render_text()?;
        let subject = truncate_subject(&format!(
            "Confirmation required: Email alerts about {}",
            politician.name
        ));
        let message = self.plain_message(&self.confirmation_from, email, subject, body)?;
        self.mailer.send(message).await?;
        Ok(())
    }

    /// Notifies every configured operator. Failures are logged only.
    #[tracing::instrument(skip(self, body))]
    pub async fn mail_admins(&self, subject: &str, body: &str) {
        for admin in &self.admins {
            let result = match self.plain_message(
                &self.server_from,
                admin,
                subject.to_string(),
                body.to_string(),
            ) {
                Ok(message) => self.mailer.send(message).await.map_err(NotifyError::from),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!(
                    name = "alerts.mail_admins.send_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    message = "Failed to notify operator"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{politician_alert, statement};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use time::macros::date;

    /// Records envelopes and fails for any recipient containing "broken".
    #[derive(Default)]
    struct FlakyMailer {
        delivered: Mutex<Vec<String>>,
        senders: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, message: Message) -> Result<(), MailError> {
            let to = message
                .envelope()
                .to()
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(",");
            if to.contains("broken") {
                return Err(MailError::Transport("connection reset".into()));
            }
            if let Some(from) = message.envelope().from() {
                self.senders.lock().unwrap().push(from.to_string());
            }
            self.delivered.lock().unwrap().push(to);
            Ok(())
        }
    }

    fn job(alert_id: i32, email: &str, topics: &[&str]) -> DigestJob {
        DigestJob {
            alert: politician_alert::Model {
                id: alert_id,
                politician_id: 1,
                email: email.into(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            politician: politician::Model {
                id: 1,
                name: "Jane Doe".into(),
                identifier: "jane-doe".into(),
                current_member: true,
            },
            statements: vec![statement::Model {
                id: 1,
                hansard_id: 5,
                politician_id: Some(1),
                sequence: 1,
                topic: topics.first().copied().unwrap_or("Budget").into(),
                content: "Remarks".into(),
            }],
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn hansard() -> hansard::Model {
        hansard::Model {
            id: 5,
            date: date!(2024 - 03 - 05),
        }
    }

    #[test]
    fn subject_uses_english_list() {
        let topics = vec!["Budget".to_string(), "Ethics".to_string()];
        assert_eq!(
            digest_subject("Jane Doe", &topics),
            "Jane Doe spoke about Budget and Ethics in the House"
        );
    }

    #[test]
    fn long_subject_is_cut_to_exactly_200_chars() {
        let topics: Vec<String> = (0..40).map(|i| format!("Topic number {i}")).collect();
        let subject = digest_subject("Jane Doe", &topics);
        assert_eq!(subject.chars().count(), MAX_SUBJECT_LENGTH);
        assert!(subject.starts_with("Jane Doe spoke about Topic number 0, "));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let subject = "é".repeat(250);
        assert_eq!(truncate_subject(&subject).chars().count(), MAX_SUBJECT_LENGTH);
    }

    #[test]
    fn policy_matching() {
        let open = RecipientPolicy::unrestricted();
        assert!(open.allows("anyone@example.com"));

        let sandbox = RecipientPolicy::sandboxed(["@Staff.Example.org", "ops"]);
        assert!(sandbox.allows("dev@staff.example.org"));
        assert!(sandbox.allows("OPS-team@elsewhere.net"));
        assert!(!sandbox.allows("voter@example.com"));

        let closed = RecipientPolicy::sandboxed(Vec::<String>::new());
        assert!(!closed.allows("dev@staff.example.org"));
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_batch() {
        let mailer = Arc::new(FlakyMailer::default());
        let sender =
            NotificationSender::new(mailer.clone(), RecipientPolicy::unrestricted(), "https://x.test");
        let jobs = vec![
            job(1, "first@example.org", &["Budget"]),
            job(2, "broken@example.org", &["Budget"]),
            job(3, "third@example.org", &["Budget"]),
        ];

        let summary = sender.dispatch(&jobs, &hansard()).await;

        assert_eq!(
            summary,
            DispatchSummary {
                sent: 2,
                sandboxed: 0,
                failed: 1
            }
        );
        assert_eq!(
            *mailer.delivered.lock().unwrap(),
            vec!["first@example.org".to_string(), "third@example.org".to_string()]
        );
    }

    #[tokio::test]
    async fn sandbox_withholds_unlisted_recipients() {
        let mailer = Arc::new(FlakyMailer::default());
        let sender = NotificationSender::new(
            mailer.clone(),
            RecipientPolicy::sandboxed(["@staff.example.org"]),
            "https://x.test",
        );
        let jobs = vec![
            job(1, "voter@example.com", &["Budget"]),
            job(2, "dev@staff.example.org", &["Budget"]),
        ];

        let summary = sender.dispatch(&jobs, &hansard()).await;

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.sandboxed, 1);
        assert_eq!(
            *mailer.delivered.lock().unwrap(),
            vec!["dev@staff.example.org".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_address_is_counted_as_failure() {
        let mailer = Arc::new(FlakyMailer::default());
        let sender =
            NotificationSender::new(mailer.clone(), RecipientPolicy::unrestricted(), "https://x.test");
        let summary = sender
            .dispatch(&[job(1, "not an address", &["Budget"])], &hansard())
            .await;
        assert_eq!(summary.failed, 1);
        assert!(mailer.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn admins_are_each_notified() {
        let mailer = Arc::new(FlakyMailer::default());
        let sender =
            NotificationSender::new(mailer.clone(), RecipientPolicy::unrestricted(), "https://x.test")
                .with_admins(vec![
                    "broken@example.org".into(),
                    "ops@example.org".into(),
                ]);
        sender.mail_admins("Unsubscribe request", "42").await;
        assert_eq!(
            *mailer.delivered.lock().unwrap(),
            vec!["ops@example.org".to_string()]
        );
    }

    #[tokio::test]
    async fn operator_mail_uses_server_address() {
        let mailer = Arc::new(FlakyMailer::default());
        let sender =
            NotificationSender::new(mailer.clone(), RecipientPolicy::unrestricted(), "https://x.test")
                .with_admins(vec!["ops@example.org".into()]);
        sender.mail_admins("Unsubscribe request", "42").await;
        sender
            .dispatch(&[job(1, "reader@example.org", &["Budget"])], &hansard())
            .await;
        assert_eq!(
            *mailer.senders.lock().unwrap(),
            vec![
                "server@openparliament.ca".to_string(),
                "alerts@openparliament.ca".to_string()
            ]
        );
    }
}
