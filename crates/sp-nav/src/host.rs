//! Browser surface the engine drives.

use crate::dispatch::Interaction;
use crate::forms;
use crate::history::HistoryEntry;
use crate::history::SessionHistory;
use sp_dom::Document;
use sp_dom::NodeId;
use sp_net::HttpMethod;
use sp_net::PageUrl;

/// Live document, location, and outbound browser effects.
pub trait BrowserHost {
    fn document(&self) -> &Document;
    fn document_mut(&mut self) -> &mut Document;
    fn location(&self) -> &PageUrl;
    /// `history.pushState`: records an entry and updates the location without loading.
    fn push_state(&mut self, entry: HistoryEntry);
    /// `location.href = url`: full navigation.
    fn assign_location(&mut self, url: &PageUrl);
    /// `form.submit()`: native submission bypassing interception.
    fn submit_form_natively(&mut self, form: NodeId);
    fn reload(&mut self);
}

/// Effect requested from a [`HeadlessHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    PushState { url: PageUrl, title: String },
    Assign(PageUrl),
    NativeSubmit {
        form: NodeId,
        action: PageUrl,
        method: HttpMethod,
    },
    Reload(PageUrl),
}

/// In-memory host. Full loads are recorded, not performed; the driver performs them and
/// calls [`HeadlessHost::load`].
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    document: Document,
    location: PageUrl,
    history: SessionHistory,
    actions: Vec<HostAction>,
}

impl HeadlessHost {
    pub fn new(location: PageUrl, document: Document) -> Self {
        let entry = HistoryEntry::new(location.clone(), &document.title());
        Self {
            document,
            location,
            history: SessionHistory::new(entry),
            actions: Vec::new(),
        }
    }

    pub fn from_html(location: PageUrl, html: &str) -> Self {
        Self::new(location, sp_html::parse_document(html))
    }

    /// Completes a full navigation: new document, new history entry.
    pub fn load(&mut self, url: PageUrl, document: Document) {
        self.history.push(HistoryEntry::new(url.clone(), &document.title()));
        self.location = url;
        self.document = document;
    }

    /// Completes a reload: new document, same entry.
    pub fn replace_document(&mut self, document: Document) {
        self.document = document;
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn actions(&self) -> &[HostAction] {
        &self.actions
    }

    pub fn take_actions(&mut self) -> Vec<HostAction> {
        std::mem::take(&mut self.actions)
    }

    /// Moves back one entry and yields the `popstate` the browser would fire.
    pub fn back(&mut self) -> Option<Interaction> {
        let url = self.history.back()?.url.clone();
        self.location = url;
        Some(Interaction::PopState)
    }

    pub fn forward(&mut self) -> Option<Interaction> {
        let url = self.history.forward()?.url.clone();
        self.location = url;
        Some(Interaction::PopState)
    }
}

impl BrowserHost for HeadlessHost {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn location(&self) -> &PageUrl {
        &self.location
    }

    fn push_state(&mut self, entry: HistoryEntry) {
        self.actions.push(HostAction::PushState {
            url: entry.url.clone(),
            title: entry.title.clone(),
        });
        self.location = entry.url.clone();
        self.history.push(entry);
    }

    fn assign_location(&mut self, url: &PageUrl) {
        self.actions.push(HostAction::Assign(url.clone()));
    }

    fn submit_form_natively(&mut self, form: NodeId) {
        let action = forms::form_action(&self.document, &self.location, form, None)
            .unwrap_or_else(|_| self.location.without_fragment());
        let method = forms::form_method(&self.document, form, None);
        self.actions.push(HostAction::NativeSubmit {
            form,
            action,
            method,
        });
    }

    fn reload(&mut self) {
        self.actions.push(HostAction::Reload(self.location.clone()));
    }
}
