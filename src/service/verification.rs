use std::future::Future;

use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    model::{DuplicateEvidence, ValidationError, VerificationRecord, VerificationStatus},
    ops::notify::{self, NotificationHub, Severity},
    repo::{
        self,
        advisors::AdvisorContact,
        verifications::VerificationUpsert,
    },
    util::mailer::HttpMailer,
};

pub trait VerificationStore {
    /// Insert or replace the record for `upsert.thesis_id`, all or nothing.
    fn upsert(
        &self,
        upsert: &VerificationUpsert,
    ) -> impl Future<Output = anyhow::Result<VerificationRecord>> + Send;
}

pub trait AdvisorDirectory {
    fn advisor_contact(
        &self,
        advisor_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<AdvisorContact>>> + Send;
}

pub trait MailSender {
    fn send_mail(&self, to: &str, subject: &str, body: &str)
        -> impl Future<Output = bool> + Send;
}

pub trait NotificationSink {
    fn notify(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        thesis_id: i64,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Postgres-backed collaborators used by the HTTP handlers.
pub struct Collaborators<'a> {
    pub pool: &'a PgPool,
    pub mailer: &'a HttpMailer,
    pub hub: &'a NotificationHub,
}

impl VerificationStore for Collaborators<'_> {
    async fn upsert(&self, upsert: &VerificationUpsert) -> anyhow::Result<VerificationRecord> {
        repo::verifications::upsert_verification(self.pool, upsert).await
    }
}

impl AdvisorDirectory for Collaborators<'_> {
    async fn advisor_contact(&self, advisor_id: i64) -> anyhow::Result<Option<AdvisorContact>> {
        Ok(repo::advisors::get_contact(self.pool, advisor_id).await?)
    }
}

impl MailSender for Collaborators<'_> {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> bool {
        self.mailer.send(to, subject, body).await
    }
}

impl NotificationSink for Collaborators<'_> {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        thesis_id: i64,
    ) -> anyhow::Result<()> {
        notify::emit(self.pool, self.hub, title, message, severity, Some(thesis_id)).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VerifyCommand {
    pub thesis_id: i64,
    pub coordinator_id: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportDuplicateCommand {
    pub thesis_id: i64,
    pub thesis_title: String,
    pub group_name: String,
    pub advisor_id: i64,
    pub coordinator_id: i64,
    pub reason: String,
    pub evidence: Vec<DuplicateEvidence>,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub record: VerificationRecord,
    pub email_sent: bool,
}

fn require_id(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::MissingId(field));
    }
    Ok(())
}

/// Mark a title as verified unique.
pub async fn verify_unique<C>(collab: &C, cmd: VerifyCommand) -> AppResult<VerificationRecord>
where
    C: VerificationStore + NotificationSink,
{
    require_id(cmd.thesis_id, "thesis_id")?;
    require_id(cmd.coordinator_id, "coordinator_id")?;

    let notes = cmd
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let record = collab
        .upsert(&VerificationUpsert {
            thesis_id: cmd.thesis_id,
            status: VerificationStatus::Verified,
            verified_by: cmd.coordinator_id,
            notes,
        })
        .await
        .map_err(|err| {
            tracing::error!(thesis_id = cmd.thesis_id, error = ?err, "verification upsert failed");
            AppError::Internal(err)
        })?;

    tracing::info!(
        thesis_id = cmd.thesis_id,
        coordinator_id = cmd.coordinator_id,
        "title verified as unique"
    );

    if let Err(err) = collab
        .notify(
            "Title verified",
            &format!("Thesis title #{} was verified as unique.", cmd.thesis_id),
            Severity::Success,
            cmd.thesis_id,
        )
        .await
    {
        tracing::warn!(thesis_id = cmd.thesis_id, error = %err, "verification notification failed");
    }

    Ok(record)
}

/// Flag a title as a duplicate and alert its advisor. Mail problems never
/// block the state change; they are recorded in the notes instead.
pub async fn report_duplicate<C>(collab: &C, cmd: ReportDuplicateCommand) -> AppResult<ReportOutcome>
where
    C: VerificationStore + AdvisorDirectory + MailSender + NotificationSink,
{
    require_id(cmd.thesis_id, "thesis_id")?;
    require_id(cmd.advisor_id, "advisor_id")?;
    require_id(cmd.coordinator_id, "coordinator_id")?;
    let reason = cmd.reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::EmptyField("reason").into());
    }

    let (contact, lookup_failed) = match collab.advisor_contact(cmd.advisor_id).await {
        Ok(contact) => (contact, false),
        Err(err) => {
            tracing::warn!(advisor_id = cmd.advisor_id, error = %err, "advisor lookup failed");
            (None, true)
        }
    };

    let recipient = contact
        .as_ref()
        .and_then(|c| c.email.as_deref().map(|email| (c.name.as_str(), email.trim())))
        .filter(|(_, email)| !email.is_empty());

    let email_sent = match recipient {
        Some((name, email)) => {
            let subject = format!("Possible duplicate thesis title: {}", cmd.thesis_title);
            let body = duplicate_alert_body(name, &cmd, reason);
            collab.send_mail(email, &subject, &body).await
        }
        None => {
            if !lookup_failed {
                tracing::warn!(advisor_id = cmd.advisor_id, "advisor has no email on record");
            }
            false
        }
    };

    let delivery_note = match (email_sent, recipient) {
        (true, Some((_, email))) => format!("[Advisor notified by email: {email}]"),
        (false, Some(_)) => "[Warning: email to advisor could not be delivered]".to_string(),
        _ if lookup_failed => "[Warning: advisor lookup failed, no email was sent]".to_string(),
        _ => "[Warning: advisor has no email address on record]".to_string(),
    };

    let record = collab
        .upsert(&VerificationUpsert {
            thesis_id: cmd.thesis_id,
            status: VerificationStatus::DuplicateReported,
            verified_by: cmd.coordinator_id,
            notes: Some(format!("{reason}\n{delivery_note}")),
        })
        .await
        .map_err(|err| {
            tracing::error!(thesis_id = cmd.thesis_id, error = ?err, "duplicate report upsert failed");
            AppError::Internal(err)
        })?;

    tracing::info!(
        thesis_id = cmd.thesis_id,
        advisor_id = cmd.advisor_id,
        email_sent,
        "title reported as duplicate"
    );

    let message = if email_sent {
        format!(
            "Thesis title #{} was reported as a duplicate and the advisor was notified.",
            cmd.thesis_id
        )
    } else {
        format!(
            "Thesis title #{} was reported as a duplicate, but the advisor email was not sent.",
            cmd.thesis_id
        )
    };
    if let Err(err) = collab
        .notify(
            "Duplicate title reported",
            &message,
            Severity::Warning,
            cmd.thesis_id,
        )
        .await
    {
        tracing::warn!(thesis_id = cmd.thesis_id, error = %err, "duplicate notification failed");
    }

    Ok(ReportOutcome { record, email_sent })
}

pub fn duplicate_alert_body(advisor_name: &str, cmd: &ReportDuplicateCommand, reason: &str) -> String {
    let mut body = format!(
        "Dear {advisor_name},\n\n\
         The thesis title of {group} has been flagged as a possible duplicate.\n\n\
         Title: {title}\n\
         Reason: {reason}\n",
        group = cmd.group_name,
        title = cmd.thesis_title,
    );

    if !cmd.evidence.is_empty() {
        body.push_str("\nSimilar titles:\n");
        for (i, item) in cmd.evidence.iter().enumerate() {
            body.push_str(&format!(
                "  {}. {} ({:.2}% similar)\n",
                i + 1,
                item.title,
                item.similarity
            ));
        }
    }

    body.push_str("\nPlease review the title with your group.\n");
    body
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Fakes {
        records: Mutex<HashMap<i64, VerificationRecord>>,
        advisors: HashMap<i64, AdvisorContact>,
        mail_ok: bool,
        store_down: bool,
        directory_down: bool,
        sent: Mutex<Vec<(String, String, String)>>,
        notifications: Mutex<Vec<(String, Severity)>>,
    }

    impl Fakes {
        fn with_advisor(email: Option<&str>) -> Self {
            let mut advisors = HashMap::new();
            advisors.insert(
                7,
                AdvisorContact {
                    name: "Dr. Reyes".to_string(),
                    email: email.map(str::to_string),
                },
            );
            Self {
                advisors,
                mail_ok: true,
                ..Self::default()
            }
        }

        fn record(&self, id: i64) -> Option<VerificationRecord> {
            self.records.lock().unwrap().get(&id).cloned()
        }
    }

    impl VerificationStore for Fakes {
        async fn upsert(&self, upsert: &VerificationUpsert) -> anyhow::Result<VerificationRecord> {
            if self.store_down {
                anyhow::bail!("connection refused");
            }
            let record = VerificationRecord {
                thesis_id: upsert.thesis_id,
                status: upsert.status,
                verified_at: Utc::now(),
                verified_by: upsert.verified_by,
                notes: upsert.notes.clone(),
            };
            self.records
                .lock()
                .unwrap()
                .insert(upsert.thesis_id, record.clone());
            Ok(record)
        }
    }

    impl AdvisorDirectory for Fakes {
        async fn advisor_contact(&self, advisor_id: i64) -> anyhow::Result<Option<AdvisorContact>> {
            if self.directory_down {
                anyhow::bail!("advisor directory unavailable");
            }
            Ok(self.advisors.get(&advisor_id).cloned())
        }
    }

    impl MailSender for Fakes {
        async fn send_mail(&self, to: &str, subject: &str, body: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            self.mail_ok
        }
    }

    impl NotificationSink for Fakes {
        async fn notify(
            &self,
            title: &str,
            _message: &str,
            severity: Severity,
            _thesis_id: i64,
        ) -> anyhow::Result<()> {
            self.notifications
                .lock()
                .unwrap()
                .push((title.to_string(), severity));
            Ok(())
        }
    }

    fn report(evidence: Vec<DuplicateEvidence>) -> ReportDuplicateCommand {
        ReportDuplicateCommand {
            thesis_id: 3,
            thesis_title: "An Inventory Management System for Local Retailers".to_string(),
            group_name: "Group 3".to_string(),
            advisor_id: 7,
            coordinator_id: 1,
            reason: "Matches an existing proposal".to_string(),
            evidence,
        }
    }

    #[tokio::test]
    async fn verify_is_an_idempotent_upsert() {
        let fakes = Fakes::default();
        let cmd = VerifyCommand {
            thesis_id: 4,
            coordinator_id: 1,
            notes: Some("  checked against archive ".to_string()),
        };

        verify_unique(&fakes, cmd.clone()).await.unwrap();
        let record = verify_unique(&fakes, cmd).await.unwrap();

        assert_eq!(fakes.records.lock().unwrap().len(), 1);
        assert_eq!(record.status, VerificationStatus::Verified);
        assert_eq!(record.notes.as_deref(), Some("checked against archive"));
        assert_eq!(fakes.notifications.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn verify_rejects_missing_ids() {
        let fakes = Fakes::default();
        let err = verify_unique(
            &fakes,
            VerifyCommand {
                thesis_id: 0,
                coordinator_id: 1,
                notes: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(fakes.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_leaves_state_unchanged() {
        let fakes = Fakes {
            store_down: true,
            ..Fakes::with_advisor(Some("reyes@example.edu"))
        };

        let err = report_duplicate(&fakes, report(vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(fakes.record(3).is_none());
        assert!(fakes.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_sends_alert_with_evidence() {
        let fakes = Fakes::with_advisor(Some("reyes@example.edu"));
        let outcome = report_duplicate(
            &fakes,
            report(vec![DuplicateEvidence {
                title: "An Inventory Management System for Small Retailers".to_string(),
                similarity: 71.43,
            }]),
        )
        .await
        .unwrap();

        assert!(outcome.email_sent);
        assert_eq!(outcome.record.status, VerificationStatus::DuplicateReported);
        let notes = outcome.record.notes.unwrap();
        assert!(notes.starts_with("Matches an existing proposal"));
        assert!(notes.contains("reyes@example.edu"));

        let sent = fakes.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "reyes@example.edu");
        assert!(sent[0].2.contains("Small Retailers (71.43% similar)"));
    }

    #[tokio::test]
    async fn mail_failure_still_reports_duplicate() {
        let fakes = Fakes {
            mail_ok: false,
            ..Fakes::with_advisor(Some("reyes@example.edu"))
        };

        let outcome = report_duplicate(&fakes, report(vec![])).await.unwrap();
        assert!(!outcome.email_sent);
        assert_eq!(
            fakes.record(3).map(|r| r.status),
            Some(VerificationStatus::DuplicateReported)
        );
        assert!(outcome
            .record
            .notes
            .unwrap()
            .contains("could not be delivered"));
    }

    #[tokio::test]
    async fn missing_advisor_email_skips_mail() {
        let fakes = Fakes::with_advisor(None);
        let outcome = report_duplicate(&fakes, report(vec![])).await.unwrap();

        assert!(!outcome.email_sent);
        assert!(fakes.sent.lock().unwrap().is_empty());
        assert!(outcome.record.notes.unwrap().contains("no email address"));
    }

    #[tokio::test]
    async fn advisor_lookup_failure_is_noted_separately() {
        let fakes = Fakes {
            directory_down: true,
            ..Fakes::with_advisor(Some("reyes@example.edu"))
        };
        let outcome = report_duplicate(&fakes, report(vec![])).await.unwrap();

        assert!(!outcome.email_sent);
        assert!(fakes.sent.lock().unwrap().is_empty());
        assert_eq!(outcome.record.status, VerificationStatus::DuplicateReported);
        let notes = outcome.record.notes.unwrap();
        assert!(notes.contains("advisor lookup failed"));
        assert!(!notes.contains("no email address"));
    }

    #[tokio::test]
    async fn report_can_follow_verification() {
        let fakes = Fakes::with_advisor(Some("reyes@example.edu"));
        verify_unique(
            &fakes,
            VerifyCommand {
                thesis_id: 3,
                coordinator_id: 1,
                notes: None,
            },
        )
        .await
        .unwrap();
        report_duplicate(&fakes, report(vec![])).await.unwrap();

        assert_eq!(
            fakes.record(3).map(|r| r.status),
            Some(VerificationStatus::DuplicateReported)
        );
        assert_eq!(fakes.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn report_requires_reason() {
        let fakes = Fakes::with_advisor(Some("reyes@example.edu"));
        let mut cmd = report(vec![]);
        cmd.reason = "   ".to_string();

        let err = report_duplicate(&fakes, cmd).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(fakes.sent.lock().unwrap().is_empty());
    }
}
