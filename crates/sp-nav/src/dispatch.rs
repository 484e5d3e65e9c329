//! Interaction routing: one handler per interaction kind.

use crate::config::NavigatorConfig;
use crate::filter::Ineligible;
use crate::filter::SameOriginFilter;
use crate::forms::FormPipeline;
use crate::forms::SubmitEvent;
use crate::history;
use crate::links::ClickEvent;
use crate::links::LinkInterceptor;
use crate::request::NavigationRequest;
use std::collections::BTreeMap;
use sp_dom::Document;
use sp_net::PageUrl;

/// Inbound browser event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click(ClickEvent),
    Submit(SubmitEvent),
    /// Back/forward traversal already applied to the host location.
    PopState,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Click(_) => InteractionKind::Click,
            Self::Submit(_) => InteractionKind::Submit,
            Self::PopState => InteractionKind::PopState,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InteractionKind {
    Click,
    Submit,
    PopState,
}

/// Handler verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Default action suppressed; the request replaces it.
    Navigate(NavigationRequest),
    /// Default action proceeds.
    Native(Ineligible),
    /// Not a navigation at all.
    Ignored,
}

/// Read-only view handlers decide from.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub document: &'a Document,
    pub location: &'a PageUrl,
}

pub trait InteractionHandler: Send {
    fn handle(&self, context: HandlerContext<'_>, interaction: &Interaction) -> Dispatch;
}

impl InteractionHandler for LinkInterceptor {
    fn handle(&self, context: HandlerContext<'_>, interaction: &Interaction) -> Dispatch {
        match interaction {
            Interaction::Click(event) => self.intercept(context.document, context.location, event),
            _ => Dispatch::Ignored,
        }
    }
}

impl InteractionHandler for FormPipeline {
    fn handle(&self, context: HandlerContext<'_>, interaction: &Interaction) -> Dispatch {
        match interaction {
            Interaction::Submit(event) => self.intercept(context.document, context.location, event),
            _ => Dispatch::Ignored,
        }
    }
}

/// Replays the traversed-to location without pushing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopStateHandler;

impl InteractionHandler for PopStateHandler {
    fn handle(&self, context: HandlerContext<'_>, interaction: &Interaction) -> Dispatch {
        match interaction {
            Interaction::PopState => Dispatch::Navigate(history::popstate_request(context.location)),
            _ => Dispatch::Ignored,
        }
    }
}

#[derive(Default)]
pub struct HandlerTable {
    handlers: BTreeMap<InteractionKind, Box<dyn InteractionHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link, form, and popstate handlers sharing one origin filter.
    pub fn standard(config: &NavigatorConfig) -> Self {
        let filter = SameOriginFilter::new(&config.hard_paths);
        let mut table = Self::new();
        table.register(InteractionKind::Click, LinkInterceptor::new(filter.clone()));
        table.register(InteractionKind::Submit, FormPipeline::new(filter));
        table.register(InteractionKind::PopState, PopStateHandler);
        table
    }

    /// Installs `handler` for `kind`, replacing the previous one.
    pub fn register(&mut self, kind: InteractionKind, handler: impl InteractionHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn kinds(&self) -> impl Iterator<Item = InteractionKind> + '_ {
        self.handlers.keys().copied()
    }

    pub fn dispatch(&self, context: HandlerContext<'_>, interaction: &Interaction) -> Dispatch {
        match self.handlers.get(&interaction.kind()) {
            Some(handler) => handler.handle(context, interaction),
            None => Dispatch::Ignored,
        }
    }
}
