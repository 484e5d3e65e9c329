//! Region splicing from a fetched document into the live one.

use crate::config::NavigatorConfig;
use crate::history::HistoryDecision;
use crate::history::HistoryEntry;
use crate::history::history_decision;
use crate::host::BrowserHost;
use crate::outcome::FallbackCause;
use core::fmt;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use sp_dom::Document;
use sp_net::PageUrl;
use std::collections::BTreeMap;

/// Parsed response, reduced to what a patch needs.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    title: String,
    fragments: BTreeMap<String, String>,
    final_url: PageUrl,
    document: Document,
}

impl PageSnapshot {
    /// Parses `body` as a full document. Scripts stay inert text.
    pub fn parse(body: &str, final_url: PageUrl, regions: &[&str]) -> Self {
        let document = sp_html::parse_document(body);
        let fragments = regions
            .iter()
            .filter_map(|region| {
                let node = document.get_element_by_id(region)?;
                Some(((*region).to_owned(), document.inner_html(node)))
            })
            .collect();

        Self {
            title: document.title(),
            fragments,
            final_url,
            document,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Serialized children of `region`, if the response has it.
    pub fn fragment(&self, region: &str) -> Option<&str> {
        self.fragments.get(region).map(String::as_str)
    }

    pub fn fragments(&self) -> &BTreeMap<String, String> {
        &self.fragments
    }

    pub fn final_url(&self) -> &PageUrl {
        &self.final_url
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOptions {
    pub push_history: bool,
    /// Remove the busy class from the content region as part of the patch.
    pub clear_busy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub patched: Vec<String>,
    /// Secondary regions absent from either document.
    pub skipped: Vec<String>,
    pub title: String,
    pub history: HistoryDecision,
    pub url: PageUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    FallbackRequired(FallbackCause),
    Unexpected(SpliceError),
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallbackRequired(cause) => write!(f, "fallback required: {cause}"),
            Self::Unexpected(error) => write!(f, "patch failed: {error}"),
        }
    }
}

impl From<SpliceError> for PatchError {
    fn from(error: SpliceError) -> Self {
        Self::Unexpected(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomPatcher {
    content_region: String,
    secondary_regions: Vec<String>,
    busy_class: String,
}

impl DomPatcher {
    pub fn new(config: &NavigatorConfig) -> Self {
        Self {
            content_region: config.content_region.clone(),
            secondary_regions: config.secondary_regions.clone(),
            busy_class: config.busy_class.clone(),
        }
    }

    /// Content region first, then secondary regions.
    pub fn regions(&self) -> Vec<&str> {
        std::iter::once(self.content_region.as_str())
            .chain(self.secondary_regions.iter().map(String::as_str))
            .collect()
    }

    pub fn snapshot(&self, body: &str, final_url: PageUrl) -> PageSnapshot {
        PageSnapshot::parse(body, final_url, &self.regions())
    }

    /// Splices every region, the title, and the busy class into a copy of the live document,
    /// then installs the copy; observers never see a half-applied page.
    pub fn apply<H: BrowserHost + ?Sized>(
        &self,
        host: &mut H,
        snapshot: &PageSnapshot,
        options: PatchOptions,
    ) -> Result<PatchReport, PatchError> {
        if !snapshot.final_url.same_origin(host.location()) {
            return Err(PatchError::FallbackRequired(FallbackCause::CrossOriginRedirect(
                snapshot.final_url.clone(),
            )));
        }

        let live = host.document();
        let Some(live_content) = live.get_element_by_id(&self.content_region) else {
            return Err(self.missing(true));
        };
        let Some(parsed_content) = snapshot.document.get_element_by_id(&self.content_region) else {
            return Err(self.missing(false));
        };

        let mut next = live.clone();
        next.replace_children_with(live_content, &snapshot.document, parsed_content)?;
        let mut patched = vec![self.content_region.clone()];
        let mut skipped = Vec::new();

        for region in &self.secondary_regions {
            let pair = next
                .get_element_by_id(region)
                .zip(snapshot.document.get_element_by_id(region));
            match pair {
                Some((target, source)) => {
                    next.replace_children_with(target, &snapshot.document, source)?;
                    patched.push(region.clone());
                }
                None => skipped.push(region.clone()),
            }
        }

        next.set_title(&snapshot.title)?;
        if options.clear_busy {
            next.remove_class(live_content, &self.busy_class)?;
        }
        *host.document_mut() = next;

        let history = history_decision(options.push_history, &snapshot.final_url, host.location());
        if let HistoryDecision::Pushed(url) = &history {
            tracing::debug!(url = %url, title = %snapshot.title, "history push");
            host.push_state(HistoryEntry::new(url.clone(), &snapshot.title).with_state(url.as_str()));
        }

        Ok(PatchReport {
            patched,
            skipped,
            title: snapshot.title.clone(),
            history,
            url: snapshot.final_url.clone(),
        })
    }

    /// Adds or removes the busy class on the live content region.
    ///
    /// Returns whether the class list changed; a missing region changes nothing.
    pub fn set_busy<H: BrowserHost + ?Sized>(&self, host: &mut H, busy: bool) -> SpliceResult<bool> {
        let document = host.document_mut();
        let Some(content) = document.get_element_by_id(&self.content_region) else {
            return Ok(false);
        };
        if busy {
            document.add_class(content, &self.busy_class)
        } else {
            document.remove_class(content, &self.busy_class)
        }
    }

    fn missing(&self, live: bool) -> PatchError {
        PatchError::FallbackRequired(FallbackCause::MissingRegion {
            region: self.content_region.clone(),
            live,
        })
    }
}
