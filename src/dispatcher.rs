//! Delivery orchestration.
//!
//! The [`Dispatcher`] picks a route per recipient (see [`policy`](crate::policy)),
//! runs the transport, and appends exactly one audit entry per recipient
//! before reporting back.
//!
//! Each recipient's attempt runs in its own task under the attempt timeout.
//! A timeout or a panic inside a transport becomes a `failed` entry; the
//! audit append happens in a detached task, so dropping the caller's future
//! does not lose it. Group dispatch runs at most `workers` recipients at a
//! time and one recipient's failure never stops the others.
//!
//! ```rust,ignore
//! use herald::{Dispatcher, Envelope, HeraldConfig, Mode, Recipient};
//!
//! let dispatcher = Dispatcher::from_config(&HeraldConfig::from_env()).await?;
//! let delivery = dispatcher
//!     .dispatch_one(Envelope::new(Recipient::phone("+201234567890"), "Hello"), Mode::Default)
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::Instrument;

use crate::audit::{
    AttemptId, AttemptStatus, AuditLog, DeliveryAttempt, FileAuditLog, MemoryAuditLog, NewAttempt,
};
use crate::config::HeraldConfig;
use crate::error::{HeraldError, TransportError};
use crate::policy::{self, Mode, Route};
use crate::recipient::{Compose, Directory, Envelope, Recipient, RecipientId, Target};
use crate::registry::{AccountRegistry, MemoryRegistry};
use crate::transport::{
    BrowserTransport, Fallback, HostedGateway, LogOnlyTransport, Outcome, Transport,
};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(90);

/// Result of one recipient's attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub attempt_id: AttemptId,
    pub destination: String,
    pub recipient: Option<RecipientId>,
    pub transport: String,
    pub status: AttemptStatus,
    pub error: Option<String>,
}

impl Delivery {
    /// The message was accepted by a channel.
    pub fn delivered(&self) -> bool {
        self.status == AttemptStatus::Sent
    }

    /// The hosted gateway handled this recipient.
    pub fn hosted(&self) -> bool {
        self.transport == "hosted"
    }
}

/// Result of a group dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// Recipients attempted, including those whose entry could not be stored.
    pub attempted: usize,
    /// The hosted gateway was the route for this batch.
    pub hosted: bool,
    /// Per-recipient results, in input order.
    pub deliveries: Vec<Delivery>,
}

/// What to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    One(Envelope),
    Group(Vec<Envelope>),
}

/// Outcome of [`Dispatcher::dispatch`], shaped like its [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    One(Delivery),
    Group(GroupReport),
}

impl Report {
    /// Number of recipients attempted.
    pub fn attempted(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Group(report) => report.attempted,
        }
    }
}

/// Selects and runs transports, and records every attempt.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    accounts: Arc<dyn AccountRegistry>,
    audit: Arc<dyn AuditLog>,
    gateway: HostedGateway,
    web: Arc<dyn Transport>,
    log_only: Arc<dyn Transport>,
    workers: usize,
    attempt_timeout: Duration,
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    accounts: Arc<dyn AccountRegistry>,
    audit: Arc<dyn AuditLog>,
    gateway: HostedGateway,
    web: Option<Arc<dyn Transport>>,
    log_only: Arc<dyn Transport>,
    workers: usize,
    attempt_timeout: Duration,
}

impl DispatcherBuilder {
    /// Hosted gateway settings.
    pub fn gateway(mut self, gateway: HostedGateway) -> Self {
        self.gateway = gateway;
        self
    }

    /// Web automation transport, usually a [`Fallback`] chain.
    pub fn web(mut self, web: Arc<dyn Transport>) -> Self {
        self.web = Some(web);
        self
    }

    /// Transport used for the log-only route.
    pub fn log_only(mut self, log_only: Arc<dyn Transport>) -> Self {
        self.log_only = log_only;
        self
    }

    /// Maximum recipients attempted at once during group dispatch.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Bound on one recipient's whole attempt, fallbacks included.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn build(self) -> Dispatcher {
        let web = self.web.unwrap_or_else(|| {
            Arc::new(
                Fallback::new(Arc::new(BrowserTransport::default()))
                    .then(Arc::new(crate::transport::OpenerTransport::default())),
            )
        });

        Dispatcher {
            inner: Arc::new(Inner {
                accounts: self.accounts,
                audit: self.audit,
                gateway: self.gateway,
                web,
                log_only: self.log_only,
                workers: self.workers,
                attempt_timeout: self.attempt_timeout,
            }),
        }
    }
}

impl Dispatcher {
    /// Start building a dispatcher over the given registry and audit log.
    pub fn builder(
        accounts: Arc<dyn AccountRegistry>,
        audit: Arc<dyn AuditLog>,
    ) -> DispatcherBuilder {
        DispatcherBuilder {
            accounts,
            audit,
            gateway: HostedGateway::new(),
            web: None,
            log_only: Arc::new(LogOnlyTransport::new()),
            workers: DEFAULT_WORKERS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Build from configuration with a fresh in-memory account registry.
    ///
    /// Checks the WebDriver endpoint and the opener program once.
    pub async fn from_config(config: &HeraldConfig) -> Result<Self, HeraldError> {
        Self::from_config_with(config, MemoryRegistry::shared()).await
    }

    /// Build from configuration over an existing account registry.
    pub async fn from_config_with(
        config: &HeraldConfig,
        accounts: Arc<dyn AccountRegistry>,
    ) -> Result<Self, HeraldError> {
        let audit: Arc<dyn AuditLog> = match &config.audit_path {
            Some(path) => Arc::new(FileAuditLog::open(path)?),
            None => MemoryAuditLog::shared(),
        };

        let browser = BrowserTransport::new(config.webdriver_url.clone())
            .web_client_url(config.web_client_url.clone())
            .headless(config.headless)
            .detect()
            .await;
        let opener = config.opener_transport().detect();
        let web = Fallback::new(Arc::new(browser)).then(Arc::new(opener));

        let gateway = HostedGateway::new()
            .base_url(config.gateway_url.clone())
            .version(config.gateway_version.clone())
            .product(config.product_tag.clone());

        Ok(Self::builder(accounts, audit)
            .gateway(gateway)
            .web(Arc::new(web))
            .workers(config.workers)
            .attempt_timeout(config.attempt_timeout)
            .build())
    }

    /// The account registry.
    pub fn accounts(&self) -> &Arc<dyn AccountRegistry> {
        &self.inner.accounts
    }

    /// The audit log.
    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.inner.audit
    }

    /// Dispatch one envelope or a group.
    pub async fn dispatch(&self, request: Request, mode: Mode) -> Result<Report, HeraldError> {
        match request {
            Request::One(envelope) => self.dispatch_one(envelope, mode).await.map(Report::One),
            Request::Group(envelopes) => {
                self.dispatch_group(envelopes, mode).await.map(Report::Group)
            }
        }
    }

    /// Dispatch to a single recipient.
    ///
    /// Explicit [`Mode::Auto`] with no hosted account is refused with
    /// [`HeraldError::NoHostedAccount`] and leaves no audit entry.
    pub async fn dispatch_one(&self, envelope: Envelope, mode: Mode) -> Result<Delivery, HeraldError> {
        let span = tracing::info_span!("herald.dispatch", mode = %mode, recipients = 1);

        async move {
            let hosted = self.inner.accounts.find_hosted_candidate();
            if let Err(err) = policy::check_single(hosted.as_ref(), mode) {
                tracing::warn!(error = %err, "Dispatch refused");
                return Err(err);
            }

            let route = policy::select_route(hosted.as_ref(), mode);
            self.deliver(envelope, route).await
        }
        .instrument(span)
        .await
    }

    /// Dispatch to every envelope, at most `workers` at a time.
    ///
    /// Under [`Mode::Auto`] with no hosted account, recipients go to web
    /// automation instead of being refused.
    pub async fn dispatch_group(
        &self,
        envelopes: Vec<Envelope>,
        mode: Mode,
    ) -> Result<GroupReport, HeraldError> {
        let attempted = envelopes.len();
        let span = tracing::info_span!("herald.dispatch", mode = %mode, recipients = attempted);

        async move {
            let hosted = self.inner.accounts.find_hosted_candidate();
            let route = policy::select_route(hosted.as_ref(), mode);

            #[cfg(feature = "metrics")]
            metrics::histogram!("herald_batch_size").record(attempted as f64);

            let results: Vec<Result<Delivery, HeraldError>> = stream::iter(envelopes)
                .map(|envelope| self.deliver(envelope, route.clone()))
                .buffered(self.inner.workers)
                .collect()
                .await;

            let mut deliveries = Vec::with_capacity(attempted);
            for result in results {
                match result {
                    Ok(delivery) => deliveries.push(delivery),
                    Err(err) => tracing::error!(error = %err, "Attempt could not be recorded"),
                }
            }

            tracing::info!(
                attempted,
                sent = deliveries.iter().filter(|d| d.delivered()).count(),
                hosted = route.is_hosted(),
                "Group dispatch finished"
            );

            Ok(GroupReport {
                attempted,
                hosted: route.is_hosted(),
                deliveries,
            })
        }
        .instrument(span)
        .await
    }

    /// Resolve `target` through `directory`, compose a message per recipient,
    /// and dispatch.
    pub async fn send_report(
        &self,
        directory: &dyn Directory,
        compose: &dyn Compose,
        target: Target,
        mode: Mode,
    ) -> Result<Report, HeraldError> {
        match target {
            Target::Recipient(id) => {
                let recipient = directory
                    .recipient(id)
                    .ok_or(HeraldError::RecipientNotFound(id))?;
                let envelope = envelope_for(recipient, compose);
                self.dispatch(Request::One(envelope), mode).await
            }
            Target::Group(group) => {
                let envelopes = directory
                    .members(group)
                    .into_iter()
                    .map(|recipient| envelope_for(recipient, compose))
                    .collect();
                self.dispatch(Request::Group(envelopes), mode).await
            }
        }
    }

    /// Send through web automation directly, bypassing the policy and the
    /// registry. The entry carries no recipient reference.
    pub async fn send_via_web(
        &self,
        phone: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Delivery, HeraldError> {
        let envelope = Envelope::new(Recipient::phone(phone), message);
        self.deliver(envelope, Route::Web).await
    }

    /// Record a message as `pending` without any delivery attempt.
    pub async fn record_only(&self, envelope: Envelope) -> Result<Delivery, HeraldError> {
        self.deliver(envelope, Route::LogOnly).await
    }

    /// Up to `limit` audit entries, newest first.
    pub fn recent_attempts(&self, limit: usize) -> Vec<DeliveryAttempt> {
        self.inner.audit.recent(limit)
    }

    /// The caller deleted a recipient: keep its entries, clear the reference.
    pub fn forget_recipient(&self, recipient: RecipientId) -> Result<usize, HeraldError> {
        let changed = self.inner.audit.detach_recipient(recipient)?;
        tracing::debug!(recipient = %recipient, entries = changed, "Recipient detached from audit log");
        Ok(changed)
    }

    async fn deliver(&self, envelope: Envelope, route: Route) -> Result<Delivery, HeraldError> {
        let transport: Arc<dyn Transport> = match &route {
            Route::Hosted(account) => Arc::new(self.inner.gateway.for_account(account)),
            Route::Web => Arc::clone(&self.inner.web),
            Route::LogOnly => Arc::clone(&self.inner.log_only),
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.attempt_and_record(transport, envelope).await });
        task.await
            .map_err(|err| HeraldError::Internal(format!("attempt task failed: {err}")))?
    }
}

impl Inner {
    async fn attempt_and_record(
        &self,
        transport: Arc<dyn Transport>,
        envelope: Envelope,
    ) -> Result<Delivery, HeraldError> {
        let name = transport.name();
        let destination = envelope.recipient.destination().to_string();
        let recipient = envelope.recipient.id;

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let mut attempt = tokio::spawn({
            let destination = destination.clone();
            let message = envelope.message.clone();
            async move { transport.attempt(&destination, &message).await }
        });

        let outcome = match tokio::time::timeout(self.attempt_timeout, &mut attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => Outcome::Failed(TransportError::Aborted(err.to_string())),
            Err(_) => {
                attempt.abort();
                Outcome::Failed(TransportError::Timeout(self.attempt_timeout))
            }
        };

        #[cfg(feature = "metrics")]
        {
            let status = match &outcome {
                Outcome::Sent { .. } => "sent",
                Outcome::Skipped => "pending",
                Outcome::Failed(_) => "failed",
            };
            metrics::counter!("herald_attempts_total", "transport" => name, "status" => status)
                .increment(1);
            metrics::histogram!("herald_attempt_duration_seconds", "transport" => name)
                .record(start.elapsed().as_secs_f64());
        }

        match &outcome {
            Outcome::Failed(err) => {
                tracing::warn!(transport = name, destination = %destination, error = %err, "Delivery failed")
            }
            _ => tracing::info!(transport = name, destination = %destination, "Delivery recorded"),
        }

        let record = NewAttempt::from_outcome(
            destination.clone(),
            envelope.message,
            recipient,
            name,
            &outcome,
        );
        let status = record.status;
        let error = record.error.clone();
        let attempt_id = self.audit.append(record)?;

        Ok(Delivery {
            attempt_id,
            destination,
            recipient,
            transport: name.to_string(),
            status,
            error,
        })
    }
}

fn envelope_for(recipient: Recipient, compose: &dyn Compose) -> Envelope {
    let message = compose.compose(&recipient);
    let recipient = Recipient {
        phone: recipient.destination().to_string(),
        ..recipient
    };
    Envelope::new(recipient, message)
}
