//! Session history stack and history synchronization.

use crate::request::NavigationRequest;
use sp_net::PageUrl;

/// Entry of the browser session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: PageUrl,
    pub title: String,
    /// Serialized `history.state`; partial navigations store their URL here.
    pub state: Option<String>,
}

impl HistoryEntry {
    pub fn new(url: PageUrl, title: &str) -> Self {
        Self {
            url,
            title: title.to_owned(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_owned());
        self
    }
}

/// Back/forward stack with a cursor, as a browser keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl SessionHistory {
    pub fn new(initial: HistoryEntry) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    /// Drops every forward entry and appends `entry` as the current one.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(entry);
        self.cursor = self.entries.len() - 1;
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.cursor]
    }

    pub fn back(&mut self) -> Option<&HistoryEntry> {
        self.cursor = self.cursor.checked_sub(1)?;
        Some(&self.entries[self.cursor])
    }

    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

/// What a patch did to session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryDecision {
    Pushed(PageUrl),
    /// The request asked not to push (forms, traversal).
    NotRequested,
    /// Resolved URL equals the current location.
    SameUrl,
}

/// Push only when requested and the resolved URL differs from the current location.
pub fn history_decision(push_history: bool, final_url: &PageUrl, location: &PageUrl) -> HistoryDecision {
    if !push_history {
        HistoryDecision::NotRequested
    } else if final_url == location {
        HistoryDecision::SameUrl
    } else {
        HistoryDecision::Pushed(final_url.clone())
    }
}

/// `popstate` replays the entry the browser already moved to, without pushing.
pub fn popstate_request(location: &PageUrl) -> NavigationRequest {
    NavigationRequest::traversal(location.clone())
}
