//! How each navigation ended.

use crate::filter::Ineligible;
use crate::patch::PatchReport;
use crate::request::NavigationId;
use core::fmt;
use sp_dom::NodeId;
use sp_net::PageUrl;

/// Why a partial navigation was abandoned for a full one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    Network(String),
    HttpStatus(u16),
    /// `live` is true when the current document lacks the region, false when the response does.
    MissingRegion { region: String, live: bool },
    /// Redirects left the document's origin; `pushState` cannot follow.
    CrossOriginRedirect(PageUrl),
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network failure ({message})"),
            Self::HttpStatus(status) => write!(f, "http status {status}"),
            Self::MissingRegion { region, live: true } => {
                write!(f, "region #{region} missing from the current document")
            }
            Self::MissingRegion { region, live: false } => {
                write!(f, "region #{region} missing from the response")
            }
            Self::CrossOriginRedirect(url) => write!(f, "redirected off-origin to {url}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Patched(PatchReport),
    /// `location.href = url`.
    HardNavigation { url: PageUrl, cause: FallbackCause },
    /// `form.submit()`.
    NativeSubmission { form: NodeId, cause: FallbackCause },
    /// Something other than the network failed.
    Reloaded { reason: String },
    /// A newer navigation started first under [`crate::OverlapPolicy::LatestWins`].
    Superseded,
}

/// Result of one completed navigation, as returned by `Navigator::poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationReport {
    pub navigation: NavigationId,
    /// Whether the loading affordance was shown while the request was in flight.
    pub showed_busy: bool,
    pub outcome: NavigationOutcome,
}

/// What `Navigator::handle` did with an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Started(NavigationId),
    Native(Ineligible),
    Ignored,
}
