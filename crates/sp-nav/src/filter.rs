//! Eligibility of link and form targets for interception.

use core::fmt;
use sp_dom::Element;
use sp_net::PageUrl;

/// Why a navigation is left to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    MissingHref,
    /// `mailto:`, `javascript:`, or anything else that is not HTTP(S).
    UnsupportedTarget(String),
    CrossOrigin { origin: String },
    Download,
    NonDefaultTarget(String),
    HardNavigationPath(String),
    ModifiedClick,
    SameDocumentFragment,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHref => f.write_str("link has no href"),
            Self::UnsupportedTarget(href) => write!(f, "`{href}` is not an http(s) URL"),
            Self::CrossOrigin { origin } => write!(f, "target origin {origin} differs"),
            Self::Download => f.write_str("link requests a download"),
            Self::NonDefaultTarget(target) => write!(f, "link opens in target `{target}`"),
            Self::HardNavigationPath(path) => write!(f, "`{path}` requires a full navigation"),
            Self::ModifiedClick => f.write_str("modified or non-primary click"),
            Self::SameDocumentFragment => f.write_str("fragment link within the current page"),
        }
    }
}

/// Link attributes relevant to eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkAttributes<'a> {
    pub href: Option<&'a str>,
    pub target: Option<&'a str>,
    pub download: bool,
}

impl<'a> LinkAttributes<'a> {
    pub fn from_element(element: &'a Element) -> Self {
        Self {
            href: element.attr("href"),
            target: element.attr("target"),
            download: element.has_attr("download"),
        }
    }
}

/// Same-origin policy filter. Pure: no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameOriginFilter {
    hard_paths: Vec<String>,
}

impl SameOriginFilter {
    pub fn new(hard_paths: &[String]) -> Self {
        Self {
            hard_paths: hard_paths.to_vec(),
        }
    }

    pub fn check_link(&self, current: &PageUrl, link: LinkAttributes<'_>) -> Result<PageUrl, Ineligible> {
        let href = link
            .href
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(Ineligible::MissingHref)?;

        if link.download {
            return Err(Ineligible::Download);
        }
        if let Some(target) = non_default_target(link.target) {
            return Err(Ineligible::NonDefaultTarget(target.to_owned()));
        }

        let url = current
            .resolve(href)
            .map_err(|_| Ineligible::UnsupportedTarget(href.to_owned()))?;
        self.check_same_origin(current, &url)?;

        if url.fragment().is_some() && url.same_document(current) {
            return Err(Ineligible::SameDocumentFragment);
        }
        if self.is_hard_path(url.path()) {
            return Err(Ineligible::HardNavigationPath(url.path().to_owned()));
        }

        Ok(url)
    }

    /// Checks an already-resolved form action.
    pub fn check_form(
        &self,
        current: &PageUrl,
        action: &PageUrl,
        target: Option<&str>,
    ) -> Result<(), Ineligible> {
        if let Some(target) = non_default_target(target) {
            return Err(Ineligible::NonDefaultTarget(target.to_owned()));
        }
        self.check_same_origin(current, action)
    }

    pub fn is_hard_path(&self, path: &str) -> bool {
        self.hard_paths.iter().any(|hard| {
            let hard = hard.trim_end_matches('/');
            !hard.is_empty()
                && (path == hard
                    || path
                        .strip_prefix(hard)
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }

    fn check_same_origin(&self, current: &PageUrl, url: &PageUrl) -> Result<(), Ineligible> {
        if url.same_origin(current) {
            Ok(())
        } else {
            Err(Ineligible::CrossOrigin {
                origin: url.origin(),
            })
        }
    }
}

fn non_default_target(target: Option<&str>) -> Option<&str> {
    target
        .map(str::trim)
        .filter(|target| !target.is_empty() && !target.eq_ignore_ascii_case("_self"))
}

#[cfg(test)]
mod tests {
    use super::Ineligible;
    use super::LinkAttributes;
    use super::SameOriginFilter;
    use sp_net::PageUrl;

    fn page(input: &str) -> PageUrl {
        match PageUrl::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn filter() -> SameOriginFilter {
        SameOriginFilter::new(&["/logout".to_owned()])
    }

    fn href(value: &str) -> LinkAttributes<'_> {
        LinkAttributes {
            href: Some(value),
            ..LinkAttributes::default()
        }
    }

    #[test]
    fn same_origin_link_is_eligible() {
        let current = page("http://localhost:8000/skins");
        let url = filter().check_link(&current, href("/skins/5"));
        assert_eq!(url.map(|url| url.to_string()), Ok("http://localhost:8000/skins/5".to_owned()));
    }

    #[test]
    fn external_and_logout_links_are_never_intercepted() {
        let current = page("https://skins.example/skins");
        assert_eq!(
            filter().check_link(&current, href("https://external.example/")),
            Err(Ineligible::CrossOrigin {
                origin: "https://external.example".to_owned()
            })
        );
        assert_eq!(
            filter().check_link(&current, href("/logout")),
            Err(Ineligible::HardNavigationPath("/logout".to_owned()))
        );
        assert_eq!(
            filter().check_link(&current, href("/logout/all?next=/")),
            Err(Ineligible::HardNavigationPath("/logout/all".to_owned()))
        );
        assert!(filter().check_link(&current, href("/logout-help")).is_ok());
    }

    #[test]
    fn download_and_targets_fall_through() {
        let current = page("https://skins.example/");
        let download = LinkAttributes {
            href: Some("/skins/5.png"),
            download: true,
            ..LinkAttributes::default()
        };
        assert_eq!(filter().check_link(&current, download), Err(Ineligible::Download));

        let blank = LinkAttributes {
            href: Some("/skins"),
            target: Some("_blank"),
            ..LinkAttributes::default()
        };
        assert_eq!(
            filter().check_link(&current, blank),
            Err(Ineligible::NonDefaultTarget("_blank".to_owned()))
        );

        let own = LinkAttributes {
            href: Some("/skins"),
            target: Some("_self"),
            ..LinkAttributes::default()
        };
        assert!(filter().check_link(&current, own).is_ok());
    }

    #[test]
    fn non_http_and_missing_hrefs_fall_through() {
        let current = page("https://skins.example/");
        assert_eq!(
            filter().check_link(&current, LinkAttributes::default()),
            Err(Ineligible::MissingHref)
        );
        assert_eq!(
            filter().check_link(&current, href("mailto:admin@skins.example")),
            Err(Ineligible::UnsupportedTarget("mailto:admin@skins.example".to_owned()))
        );
    }

    #[test]
    fn fragment_links_within_page_fall_through() {
        let current = page("https://skins.example/skins?page=2");
        assert_eq!(
            filter().check_link(&current, href("#top")),
            Err(Ineligible::SameDocumentFragment)
        );
        assert!(filter().check_link(&current, href("/skins?page=3#top")).is_ok());
    }

    #[test]
    fn cross_origin_form_actions_are_ineligible() {
        let current = page("https://skins.example/skins");
        let filter = filter();
        assert!(filter.check_form(&current, &page("https://skins.example/skins/upload"), None).is_ok());
        assert!(filter.check_form(&current, &page("https://pay.example/checkout"), None).is_err());
        assert!(filter
            .check_form(&current, &page("https://skins.example/skins/upload"), Some("preview"))
            .is_err());
    }

    #[test]
    fn root_hard_path_never_matches() {
        let filter = SameOriginFilter::new(&["/".to_owned(), "/logout/".to_owned()]);
        assert!(!filter.is_hard_path("/skins/5"));
        assert!(!filter.is_hard_path("/"));
        assert!(filter.is_hard_path("/logout"));
        assert!(filter.is_hard_path("/logout/all"));
    }
}
