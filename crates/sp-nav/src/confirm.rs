//! Confirmation dialogs that gate a form submission.

use crate::dispatch::Interaction;
use crate::fetch::FetchExecutor;
use crate::forms::SubmitEvent;
use crate::host::BrowserHost;
use crate::navigator::Navigator;
use crate::outcome::HandleOutcome;
use sp_core::SpliceResult;
use sp_dom::NodeId;
use std::time::Instant;

/// A form waiting on the user's answer. Consumed by exactly one of `confirm` or `cancel`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending confirmation must be confirmed or cancelled"]
pub struct ConfirmationHandle {
    form: NodeId,
}

impl ConfirmationHandle {
    pub fn new(form: NodeId) -> Self {
        Self { form }
    }

    pub fn form(&self) -> NodeId {
        self.form
    }

    /// Dispatches a synthetic submit, treated like a user submission; when nothing
    /// intercepts it the form is submitted natively.
    pub fn confirm<E, H>(self, navigator: &mut Navigator<E>, host: &mut H, now: Instant) -> SpliceResult<HandleOutcome>
    where
        E: FetchExecutor,
        H: BrowserHost + ?Sized,
    {
        let event = SubmitEvent::new(self.form);
        let outcome = navigator.handle(host, &Interaction::Submit(event), now)?;
        if !matches!(outcome, HandleOutcome::Started(_)) {
            host.submit_form_natively(self.form);
        }
        Ok(outcome)
    }

    pub fn cancel(self) -> NodeId {
        self.form
    }
}
