//! Test doubles: an executor whose fetches complete only when told to.

use crate::fetch::FetchCompletion;
use crate::fetch::FetchExecutor;
use crate::fetch::FetchFailure;
use crate::fetch::FetchedDocument;
use crate::request::NavigationId;
use crate::request::NavigationRequest;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use sp_net::PageUrl;
use std::sync::mpsc::Sender;

pub(crate) struct PendingFetch {
    pub navigation: NavigationId,
    pub request: NavigationRequest,
    completions: Sender<FetchCompletion>,
}

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    pending: Vec<PendingFetch>,
    pub fail_spawn: bool,
}

impl ScriptedExecutor {
    pub fn pending(&self) -> &[PendingFetch] {
        &self.pending
    }

    pub fn request(&self, navigation: NavigationId) -> Option<&NavigationRequest> {
        self.pending
            .iter()
            .find(|fetch| fetch.navigation == navigation)
            .map(|fetch| &fetch.request)
    }

    /// Completes `navigation`; the navigator sees it on its next poll.
    pub fn respond(&mut self, navigation: NavigationId, result: Result<FetchedDocument, FetchFailure>) {
        let Some(index) = self.pending.iter().position(|fetch| fetch.navigation == navigation) else {
            panic!("{navigation} is not pending");
        };
        let fetch = self.pending.remove(index);
        let _ = fetch.completions.send(FetchCompletion { navigation, result });
    }
}

impl FetchExecutor for ScriptedExecutor {
    fn spawn(
        &mut self,
        navigation: NavigationId,
        request: NavigationRequest,
        completions: Sender<FetchCompletion>,
    ) -> SpliceResult<()> {
        if self.fail_spawn {
            return Err(SpliceError::new("nav.fetch.spawn_failed", "scripted spawn failure"));
        }
        self.pending.push(PendingFetch {
            navigation,
            request,
            completions,
        });
        Ok(())
    }
}

pub(crate) fn page(input: &str) -> PageUrl {
    match PageUrl::parse(input) {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

/// Full site page with both regions.
pub(crate) fn site_page(title: &str, nav: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head><body>\
         <nav id=\"site-nav\">{nav}</nav><main id=\"pjax-container\">{content}</main></body></html>"
    )
}

pub(crate) fn ok(url: &str, body: String) -> Result<FetchedDocument, FetchFailure> {
    Ok(FetchedDocument {
        final_url: page(url),
        status: 200,
        content_type: "text/html; charset=utf-8".to_owned(),
        body,
    })
}
