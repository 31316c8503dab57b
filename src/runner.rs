//! Batch run orchestration.
//!
//! A run loads the contact list and the sent log, filters out everyone the
//! log says is done, asks for confirmation, then works through the remaining
//! candidates one at a time: research, draft (AI with retry, else the
//! fallback template), deliver, log the outcome. A randomized pause separates
//! consecutive deliveries and the run stops as soon as the daily limit of
//! successful sends is reached, or after too many delivery failures in a row.

use std::fmt;
use std::time::Duration;

use crate::ai::Generator;
use crate::compose::fallback::fallback_draft;
use crate::compose::{Draft, DraftSource, MessageContext};
use crate::config::Config;
use crate::constants::{GENERATION_ATTEMPTS, GENERATION_RETRY_DELAY_SECS};
use crate::contacts::{Contact, ContactSourceError, load_contacts};
use crate::mail::{DeliveryError, Mailer, OutgoingEmail, validate_address};
use crate::pacing::{Pacing, format_delay};
use crate::research::Researcher;
use crate::retry::{RetryConfig, with_retry};
use crate::sent_log::{SentLog, SentLogError, SentRecord, SentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One sample message to the configured test address; the sent log is
    /// neither read nor written and there is no quota.
    Test,
    Default,
    /// Same as `Default`; the prompt leads with the remaining count.
    Resume,
}

/// Unrecoverable errors. Everything else is recorded per recipient.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    ContactSource(#[from] ContactSourceError),

    #[error(transparent)]
    SentLog(#[from] SentLogError),

    #[error(transparent)]
    Delivery(DeliveryError),
}

/// What a run would do, computed before anything is sent
#[derive(Debug, Clone)]
pub struct Plan {
    /// Contacts eligible for this run, in file order
    pub candidates: Vec<Contact>,
    pub total_contacts: usize,
    pub already_sent: usize,
    /// Previously skipped, or previously failed with retries disabled
    pub excluded: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub daily_limit: usize,
}

impl Plan {
    /// Upper bound on deliveries this run will attempt before the quota stop
    pub fn this_run(&self) -> usize {
        self.candidates.len().min(self.daily_limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub failed: usize,
    /// Invalid addresses recorded as skipped during this run
    pub skipped: usize,
    pub already_sent: usize,
    /// Drafts that came from the fallback template
    pub fallbacks: usize,
    /// Candidates left untouched for a later run
    pub remaining: usize,
    /// Pauses taken between deliveries
    pub paced: usize,
    pub total_wait: Duration,
    pub stopped_at_quota: bool,
    /// The run ended after `sending.max_consecutive_failures` failures in a row
    pub stopped_after_failures: bool,
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sent: {} | Failed: {} | Skipped: {} | Already sent: {}",
            self.sent, self.failed, self.skipped, self.already_sent
        )
    }
}

pub struct BatchRunner<'a, R, G, M> {
    config: &'a Config,
    researcher: R,
    generator: G,
    mailer: M,
    sent_log: SentLog,
    pacing: Pacing,
    retry: RetryConfig,
}

impl<'a, R, G, M> BatchRunner<'a, R, G, M>
where
    R: Researcher,
    G: Generator,
    M: Mailer,
{
    pub fn new(config: &'a Config, researcher: R, generator: G, mailer: M) -> Self {
        let retry_delay = Duration::from_secs(GENERATION_RETRY_DELAY_SECS);
        Self {
            config,
            researcher,
            generator,
            mailer,
            sent_log: SentLog::new(config.sent_log_path()),
            pacing: Pacing::from_config(&config.sending),
            retry: RetryConfig::new(GENERATION_ATTEMPTS, retry_delay, retry_delay),
        }
    }

    /// Load contacts and the sent log and work out who is still to be emailed.
    pub fn plan(&self) -> Result<Plan, RunError> {
        let loaded = load_contacts(&self.config.contacts_path())?;
        let statuses = self.sent_log.load_statuses()?;

        let total_contacts = loaded.contacts.len();
        let mut already_sent = 0;
        let mut excluded = 0;
        let mut candidates = Vec::new();

        for contact in loaded.contacts {
            match statuses.get(&contact.key()) {
                Some(SentStatus::Sent) => already_sent += 1,
                Some(SentStatus::Skipped) => excluded += 1,
                Some(SentStatus::Failed) if !self.config.sending.retry_failed => excluded += 1,
                _ => candidates.push(contact),
            }
        }

        tracing::info!(
            "{} contacts: {} already sent, {} excluded, {} candidates",
            total_contacts,
            already_sent,
            excluded,
            candidates.len()
        );

        Ok(Plan {
            candidates,
            total_contacts,
            already_sent,
            excluded,
            malformed: loaded.malformed,
            duplicates: loaded.duplicates,
            daily_limit: self.pacing.daily_limit(),
        })
    }

    /// Execute one run. `confirm` sees the plan before any delivery and can
    /// cancel the run by returning `false`.
    pub async fn run(
        &self,
        mode: RunMode,
        confirm: impl FnOnce(&Plan) -> bool,
    ) -> Result<RunSummary, RunError> {
        if mode == RunMode::Test {
            return self.run_test().await;
        }

        let plan = self.plan()?;
        let mut summary = RunSummary {
            already_sent: plan.already_sent,
            ..RunSummary::default()
        };

        if plan.candidates.is_empty() {
            tracing::info!("Every contact has already been handled, nothing to send");
            return Ok(summary);
        }

        if !confirm(&plan) {
            tracing::info!("Run cancelled before sending");
            summary.cancelled = true;
            summary.remaining = plan.candidates.len();
            return Ok(summary);
        }

        self.mailer.verify().await.map_err(RunError::Delivery)?;
        self.send_all(&plan.candidates, summary).await
    }

    async fn send_all(
        &self,
        candidates: &[Contact],
        mut summary: RunSummary,
    ) -> Result<RunSummary, RunError> {
        let total = candidates.len();
        let max_failures = self.config.sending.max_consecutive_failures;
        let mut attempted = 0;
        let mut failures_in_a_row = 0;

        for (index, contact) in candidates.iter().enumerate() {
            if let Err(reason) = validate_address(&contact.email) {
                tracing::warn!("Skipping {}: invalid address ({})", contact.email, reason);
                self.sent_log.append(
                    &SentRecord::new(&contact.email, SentStatus::Skipped).with_error(reason),
                )?;
                summary.skipped += 1;
                continue;
            }

            if attempted > 0 {
                let delay = self.pacing.next_delay();
                tracing::info!("Waiting {} before the next email", format_delay(delay));
                tokio::time::sleep(delay).await;
                summary.paced += 1;
                summary.total_wait += delay;
            }
            attempted += 1;

            tracing::info!(
                "[{}/{}] {} <{}> at {}",
                index + 1,
                total,
                contact.name,
                contact.email,
                contact.company_or_default()
            );

            let (draft, source) = self.draft_for(contact).await;
            if source == DraftSource::Fallback {
                summary.fallbacks += 1;
            }
            let email = OutgoingEmail::from_draft(&contact.email, &draft);

            match self.mailer.send(&email).await {
                Ok(()) => {
                    self.sent_log
                        .append(&SentRecord::new(&contact.email, SentStatus::Sent))?;
                    summary.sent += 1;
                    failures_in_a_row = 0;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Aborting run: {}", e);
                    return Err(RunError::Delivery(e));
                }
                Err(e) => {
                    tracing::warn!("Failed to send to {}: {}", contact.email, e);
                    self.sent_log.append(
                        &SentRecord::new(&contact.email, SentStatus::Failed)
                            .with_error(e.to_string()),
                    )?;
                    summary.failed += 1;
                    failures_in_a_row += 1;
                }
            }

            if max_failures > 0 && failures_in_a_row >= max_failures {
                summary.stopped_after_failures = true;
                summary.remaining = total - index - 1;
                tracing::warn!(
                    "{} deliveries failed in a row, stopping with {} candidates left",
                    failures_in_a_row,
                    summary.remaining
                );
                break;
            }

            if self.pacing.quota_reached(summary.sent) {
                summary.stopped_at_quota = true;
                summary.remaining = total - index - 1;
                tracing::info!(
                    "Daily limit of {} reached, {} candidates left for the next run",
                    self.pacing.daily_limit(),
                    summary.remaining
                );
                break;
            }
        }

        Ok(summary)
    }

    async fn run_test(&self) -> Result<RunSummary, RunError> {
        let test = &self.config.test;
        let to = self.config.sending.test_email.trim();
        let contact = Contact::new(&test.name, to, &test.company, &test.title);
        tracing::info!("Test mode: one sample email to {}", to);

        self.mailer.verify().await.map_err(RunError::Delivery)?;

        let mut summary = RunSummary::default();
        let (draft, source) = self.draft_for(&contact).await;
        if source == DraftSource::Fallback {
            summary.fallbacks += 1;
        }

        match self.mailer.send(&OutgoingEmail::from_draft(to, &draft)).await {
            Ok(()) => summary.sent = 1,
            Err(e) if e.is_fatal() => return Err(RunError::Delivery(e)),
            Err(e) => {
                tracing::warn!("Test email failed: {}", e);
                summary.failed = 1;
            }
        }
        Ok(summary)
    }

    /// Research, then AI generation with retry, then the fallback template.
    async fn draft_for(&self, contact: &Contact) -> (Draft, DraftSource) {
        let research = self.researcher.research(&contact.company).await;
        let ctx = MessageContext {
            contact,
            profile: &self.config.profile,
            research: research.as_deref(),
        };

        let generated = with_retry(&self.retry, |attempt| {
            tracing::debug!("Generating draft for {} (attempt {})", contact.email, attempt);
            self.generator.generate(&ctx)
        })
        .await;

        match generated {
            Ok(draft) => (draft, DraftSource::Ai),
            Err(e) => {
                tracing::warn!(
                    "AI generation failed for {}: {}. Using fallback template",
                    contact.email,
                    e
                );
                (fallback_draft(&ctx), DraftSource::Fallback)
            }
        }
    }
}
