//! Partial-page navigation: intercepts same-origin links and forms, fetches the target
//! document off-thread, and splices its regions into the live page.
//!
//! Every navigation ends in exactly one of a patch, a full navigation, a native form
//! submission, or a reload.

pub mod attempt;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod fetch;
pub mod filter;
pub mod forms;
pub mod history;
pub mod host;
pub mod links;
pub mod navigator;
pub mod outcome;
pub mod patch;
pub mod request;
pub mod timer;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

pub use attempt::AttemptState;
pub use attempt::NavigationAttempt;
pub use config::NavigatorConfig;
pub use config::OverlapPolicy;
pub use confirm::ConfirmationHandle;
pub use dispatch::Dispatch;
pub use dispatch::HandlerTable;
pub use dispatch::Interaction;
pub use dispatch::InteractionKind;
pub use fetch::FetchCompletion;
pub use fetch::FetchExecutor;
pub use fetch::FetchFailure;
pub use fetch::FetchedDocument;
pub use fetch::HttpPageLoader;
pub use fetch::PageLoader;
pub use fetch::ThreadedExecutor;
pub use filter::Ineligible;
pub use filter::SameOriginFilter;
pub use forms::SubmitEvent;
pub use history::HistoryDecision;
pub use history::HistoryEntry;
pub use history::SessionHistory;
pub use host::BrowserHost;
pub use host::HeadlessHost;
pub use host::HostAction;
pub use links::ClickEvent;
pub use links::Modifiers;
pub use links::MouseButton;
pub use navigator::Navigator;
pub use outcome::FallbackCause;
pub use outcome::HandleOutcome;
pub use outcome::NavigationOutcome;
pub use outcome::NavigationReport;
pub use patch::DomPatcher;
pub use patch::PageSnapshot;
pub use patch::PatchReport;
pub use request::NavigationId;
pub use request::NavigationRequest;
