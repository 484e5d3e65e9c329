//! Click interception for anchors.

use crate::dispatch::Dispatch;
use crate::filter::Ineligible;
use crate::filter::LinkAttributes;
use crate::filter::SameOriginFilter;
use crate::request::NavigationRequest;
use sp_dom::Document;
use sp_dom::NodeId;
use sp_net::PageUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// A `click` event on any node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub target: NodeId,
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

impl ClickEvent {
    /// Plain primary-button click.
    pub fn primary(target: NodeId) -> Self {
        Self {
            target,
            button: MouseButton::Primary,
            modifiers: Modifiers::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkInterceptor {
    filter: SameOriginFilter,
}

impl LinkInterceptor {
    pub fn new(filter: SameOriginFilter) -> Self {
        Self { filter }
    }

    pub fn intercept(&self, document: &Document, location: &PageUrl, event: &ClickEvent) -> Dispatch {
        let Some(anchor) = document.closest(event.target, &["a", "area"]) else {
            return Dispatch::Ignored;
        };
        // Modified and non-primary clicks are the browser's new-tab and context gestures.
        if event.button != MouseButton::Primary || event.modifiers.any() {
            return Dispatch::Native(Ineligible::ModifiedClick);
        }

        let Some(element) = document.element(anchor) else {
            return Dispatch::Ignored;
        };
        match self.filter.check_link(location, LinkAttributes::from_element(element)) {
            Ok(url) => Dispatch::Navigate(NavigationRequest::link(url)),
            Err(reason) => Dispatch::Native(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClickEvent;
    use super::LinkInterceptor;
    use super::Modifiers;
    use super::MouseButton;
    use crate::dispatch::Dispatch;
    use crate::filter::Ineligible;
    use crate::filter::SameOriginFilter;
    use sp_dom::Document;
    use sp_dom::NodeId;
    use sp_net::PageUrl;

    fn page(input: &str) -> PageUrl {
        match PageUrl::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn interceptor() -> LinkInterceptor {
        LinkInterceptor::new(SameOriginFilter::new(&["/logout".to_owned()]))
    }

    fn fixture() -> Document {
        sp_html::parse_document(
            "<nav><a id=\"skin\" href=\"/skins/5\"><img id=\"thumb\" src=\"/5.png\"><span id=\"label\">Skin 5</span></a>\
             <a id=\"logout\" href=\"/logout\">Log out</a><p id=\"plain\">text</p></nav>",
        )
    }

    fn node(document: &Document, id: &str) -> NodeId {
        match document.get_element_by_id(id) {
            Some(node) => node,
            None => panic!("missing #{id}"),
        }
    }

    #[test]
    fn click_inside_anchor_navigates_to_its_href() {
        let document = fixture();
        let location = page("http://localhost/skins");
        let event = ClickEvent::primary(node(&document, "label"));
        let Dispatch::Navigate(request) = interceptor().intercept(&document, &location, &event) else {
            panic!("click should be intercepted");
        };
        assert_eq!(request.target().path(), "/skins/5");
        assert!(request.push_history());
    }

    #[test]
    fn clicks_outside_anchors_are_ignored() {
        let document = fixture();
        let location = page("http://localhost/skins");
        let event = ClickEvent::primary(node(&document, "plain"));
        assert_eq!(interceptor().intercept(&document, &location, &event), Dispatch::Ignored);
    }

    #[test]
    fn modified_clicks_are_left_to_the_browser() {
        let document = fixture();
        let location = page("http://localhost/skins");
        let mut event = ClickEvent::primary(node(&document, "thumb"));
        event.modifiers = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        assert_eq!(
            interceptor().intercept(&document, &location, &event),
            Dispatch::Native(Ineligible::ModifiedClick)
        );

        let middle = ClickEvent {
            button: MouseButton::Auxiliary,
            ..ClickEvent::primary(node(&document, "skin"))
        };
        assert_eq!(
            interceptor().intercept(&document, &location, &middle),
            Dispatch::Native(Ineligible::ModifiedClick)
        );
    }

    #[test]
    fn hard_paths_are_not_intercepted() {
        let document = fixture();
        let location = page("http://localhost/skins");
        let event = ClickEvent::primary(node(&document, "logout"));
        assert_eq!(
            interceptor().intercept(&document, &location, &event),
            Dispatch::Native(Ineligible::HardNavigationPath("/logout".to_owned()))
        );
    }
}
