//! The navigation engine: routes interactions, tracks attempts, applies completions.

use crate::attempt::AttemptState;
use crate::attempt::NavigationAttempt;
use crate::config::NavigatorConfig;
use crate::config::OverlapPolicy;
use crate::dispatch::Dispatch;
use crate::dispatch::HandlerContext;
use crate::dispatch::HandlerTable;
use crate::dispatch::Interaction;
use crate::fetch::FetchCompletion;
use crate::fetch::FetchExecutor;
use crate::fetch::FetchFailure;
use crate::fetch::FetchedDocument;
use crate::host::BrowserHost;
use crate::outcome::FallbackCause;
use crate::outcome::HandleOutcome;
use crate::outcome::NavigationOutcome;
use crate::outcome::NavigationReport;
use crate::patch::DomPatcher;
use crate::patch::PatchError;
use crate::patch::PatchOptions;
use crate::request::NavigationId;
use crate::request::NavigationRequest;
use crate::timer::LoadingTimer;
use sp_core::SpliceResult;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::time::Instant;

/// Single-threaded navigation engine.
///
/// All document mutation happens inside [`Navigator::poll`] (and [`Navigator::wait`]); fetches
/// run on the executor and report back through a channel. Time is passed in explicitly.
pub struct Navigator<E: FetchExecutor> {
    config: NavigatorConfig,
    handlers: HandlerTable,
    patcher: DomPatcher,
    timer: LoadingTimer,
    executor: E,
    attempts: BTreeMap<NavigationId, NavigationAttempt>,
    next_id: u64,
    latest: Option<NavigationId>,
    completions_tx: Sender<FetchCompletion>,
    completions_rx: Receiver<FetchCompletion>,
}

impl<E: FetchExecutor> Navigator<E> {
    pub fn new(config: NavigatorConfig, executor: E) -> SpliceResult<Self> {
        config.validate()?;
        let (completions_tx, completions_rx) = mpsc::channel();

        Ok(Self {
            handlers: HandlerTable::standard(&config),
            patcher: DomPatcher::new(&config),
            timer: LoadingTimer::new(config.loading_delay),
            config,
            executor,
            attempts: BTreeMap::new(),
            next_id: 1,
            latest: None,
            completions_tx,
            completions_rx,
        })
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerTable {
        &mut self.handlers
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn patcher(&self) -> &DomPatcher {
        &self.patcher
    }

    /// Number of attempts not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.attempts.len()
    }

    pub fn attempt(&self, navigation: NavigationId) -> Option<&NavigationAttempt> {
        self.attempts.get(&navigation)
    }

    /// Next instant at which `poll` has timer work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Routes an interaction to its handler and starts the resulting navigation.
    pub fn handle<H: BrowserHost + ?Sized>(
        &mut self,
        host: &mut H,
        interaction: &Interaction,
        now: Instant,
    ) -> SpliceResult<HandleOutcome> {
        let dispatch = self.handlers.dispatch(
            HandlerContext {
                document: host.document(),
                location: host.location(),
            },
            interaction,
        );

        match dispatch {
            Dispatch::Navigate(request) => self.navigate(request, now).map(HandleOutcome::Started),
            Dispatch::Native(reason) => {
                tracing::debug!(kind = ?interaction.kind(), %reason, "left to the browser");
                Ok(HandleOutcome::Native(reason))
            }
            Dispatch::Ignored => Ok(HandleOutcome::Ignored),
        }
    }

    /// Starts `request`. Only non-form navigations arm the loading timer.
    pub fn navigate(&mut self, request: NavigationRequest, now: Instant) -> SpliceResult<NavigationId> {
        let id = NavigationId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let mut attempt = NavigationAttempt::new(id, request.clone());
        attempt.start(now)?;
        if !request.is_form_submission() {
            self.timer.arm(id, now);
        }
        self.attempts.insert(id, attempt);
        self.latest = Some(id);

        tracing::info!(
            navigation = %id,
            url = %request.target(),
            method = request.method().as_str(),
            "navigation start"
        );

        if let Err(error) = self.executor.spawn(id, request, self.completions_tx.clone()) {
            // Reported through the channel so the attempt resolves like any other failure.
            let _ = self.completions_tx.send(FetchCompletion {
                navigation: id,
                result: Err(FetchFailure::Unexpected(error.to_string())),
            });
        }
        Ok(id)
    }

    /// Applies every completion received so far, then fires the loading timer if due.
    pub fn poll<H: BrowserHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: Instant,
    ) -> SpliceResult<Vec<NavigationReport>> {
        let mut reports = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(report) = self.complete(host, completion)? {
                reports.push(report);
            }
        }

        if let Some(id) = self.timer.poll(now)
            && let Some(attempt) = self.attempts.get_mut(&id)
            && attempt.state() == AttemptState::Pending
        {
            attempt.time_out()?;
            self.patcher.set_busy(host, true)?;
            tracing::info!(navigation = %id, "loading affordance shown");
        }

        Ok(reports)
    }

    /// Blocks until a completion arrives or the timer is due, then polls.
    pub fn wait<H: BrowserHost + ?Sized>(&mut self, host: &mut H) -> SpliceResult<Vec<NavigationReport>> {
        if self.attempts.is_empty() {
            return Ok(Vec::new());
        }

        let received = match self.timer.deadline() {
            Some(deadline) => self
                .completions_rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .ok(),
            None => self.completions_rx.recv().ok(),
        };

        let mut reports = Vec::new();
        if let Some(completion) = received
            && let Some(report) = self.complete(host, completion)?
        {
            reports.push(report);
        }
        reports.extend(self.poll(host, Instant::now())?);
        Ok(reports)
    }

    fn complete<H: BrowserHost + ?Sized>(
        &mut self,
        host: &mut H,
        completion: FetchCompletion,
    ) -> SpliceResult<Option<NavigationReport>> {
        let id = completion.navigation;
        let Some(mut attempt) = self.attempts.remove(&id) else {
            tracing::warn!(navigation = %id, "completion for unknown navigation");
            return Ok(None);
        };

        attempt.settle()?;
        self.timer.cancel(id);
        let clear_busy = !self
            .attempts
            .values()
            .any(|other| other.state() == AttemptState::TimedOut);
        tracing::info!(navigation = %id, showed_busy = attempt.showed_busy(), "navigation settled");

        let outcome = if self.config.overlap == OverlapPolicy::LatestWins && self.latest != Some(id) {
            tracing::info!(navigation = %id, "superseded by a newer navigation");
            self.clear_busy(host, clear_busy)?;
            NavigationOutcome::Superseded
        } else {
            self.resolve(host, attempt.request(), completion.result, clear_busy)?
        };

        attempt.resolve()?;
        Ok(Some(NavigationReport {
            navigation: id,
            showed_busy: attempt.showed_busy(),
            outcome,
        }))
    }

    fn resolve<H: BrowserHost + ?Sized>(
        &mut self,
        host: &mut H,
        request: &NavigationRequest,
        result: Result<FetchedDocument, FetchFailure>,
        clear_busy: bool,
    ) -> SpliceResult<NavigationOutcome> {
        let cause = match result {
            Ok(page) => {
                let snapshot = self.patcher.snapshot(&page.body, page.final_url);
                let options = PatchOptions {
                    push_history: request.push_history(),
                    clear_busy,
                };
                match self.patcher.apply(host, &snapshot, options) {
                    Ok(report) => return Ok(NavigationOutcome::Patched(report)),
                    Err(PatchError::FallbackRequired(cause)) => cause,
                    Err(PatchError::Unexpected(error)) => {
                        return self.reload(host, error.to_string(), clear_busy);
                    }
                }
            }
            Err(FetchFailure::Network(error)) => FallbackCause::Network(error.to_string()),
            Err(FetchFailure::HttpStatus(status)) => FallbackCause::HttpStatus(status),
            Err(FetchFailure::Unexpected(reason)) => return self.reload(host, reason, clear_busy),
        };

        self.clear_busy(host, clear_busy)?;
        tracing::warn!(url = %request.target(), %cause, "partial navigation fell back");
        match request.form() {
            Some(form) if request.is_form_submission() && host.document().is_connected(form) => {
                host.submit_form_natively(form);
                Ok(NavigationOutcome::NativeSubmission { form, cause })
            }
            form => {
                if form.is_some() {
                    // A detached form cannot submit; the page was patched under it.
                    tracing::warn!(url = %request.target(), "form no longer in the document");
                }
                host.assign_location(request.target());
                Ok(NavigationOutcome::HardNavigation {
                    url: request.target().clone(),
                    cause,
                })
            }
        }
    }

    fn reload<H: BrowserHost + ?Sized>(
        &mut self,
        host: &mut H,
        reason: String,
        clear_busy: bool,
    ) -> SpliceResult<NavigationOutcome> {
        self.clear_busy(host, clear_busy)?;
        tracing::error!(%reason, "navigation failed unexpectedly; reloading");
        host.reload();
        Ok(NavigationOutcome::Reloaded { reason })
    }

    fn clear_busy<H: BrowserHost + ?Sized>(&self, host: &mut H, clear: bool) -> SpliceResult<()> {
        if clear {
            self.patcher.set_busy(host, false)?;
        }
        Ok(())
    }
}
