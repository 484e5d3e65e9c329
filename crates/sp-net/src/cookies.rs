//! Session cookie jar keyed by domain.

use crate::http::Header;
use crate::url::PageUrl;
use std::collections::BTreeMap;

const MAX_COOKIE_DOMAINS: usize = 64;
const MAX_COOKIES_PER_DOMAIN: usize = 64;

/// In-memory cookie store shared by every navigation of a session.
///
/// Only name, value, domain, and expiry-by-deletion are modelled; paths and secure flags
/// are not tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    domains: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SetCookie {
    domain: String,
    name: String,
    value: String,
    delete: bool,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&str> {
        self.domains
            .get(domain)
            .and_then(|cookies| cookies.get(name))
            .map(String::as_str)
    }

    /// `Cookie` header value for `url`; more specific domains shadow broader ones.
    pub fn header_value_for(&self, url: &PageUrl) -> String {
        let host = url.host();
        let mut matching = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(host, domain))
            .collect::<Vec<_>>();
        matching.sort_by(|(left, _), (right, _)| {
            right
                .len()
                .cmp(&left.len())
                .then_with(|| left.as_str().cmp(right.as_str()))
        });

        let mut selected = BTreeMap::<&str, &str>::new();
        for (_, cookies) in matching {
            for (name, value) in cookies {
                selected.entry(name.as_str()).or_insert(value.as_str());
            }
        }

        selected
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Replaces any `Cookie` header in `headers` with the jar's value for `url`.
    pub fn attach(&self, url: &PageUrl, headers: &mut Vec<Header>) {
        let cookie = self.header_value_for(url);
        if cookie.is_empty() {
            return;
        }

        headers.retain(|header| !header.name.eq_ignore_ascii_case("cookie"));
        if let Ok(header) = Header::new("Cookie", &cookie) {
            headers.push(header);
        }
    }

    /// Records every `Set-Cookie` header of a response received from `url`.
    pub fn store_from_headers(&mut self, url: &PageUrl, headers: &[Header]) {
        let Some(default_domain) = normalize_domain(url.host()) else {
            return;
        };

        let parsed = headers
            .iter()
            .filter(|header| header.name.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|header| parse_set_cookie(&header.value, &default_domain))
            .filter(|cookie| domain_matches(url.host(), &cookie.domain))
            .collect::<Vec<_>>();

        for cookie in parsed {
            if cookie.delete {
                self.remove(&cookie.domain, &cookie.name);
            } else {
                self.upsert(&cookie.domain, &cookie.name, &cookie.value);
            }
        }
    }

    fn remove(&mut self, domain: &str, name: &str) {
        if let Some(cookies) = self.domains.get_mut(domain) {
            cookies.remove(name);
            if cookies.is_empty() {
                self.domains.remove(domain);
            }
        }
    }

    fn upsert(&mut self, domain: &str, name: &str, value: &str) {
        if !self.domains.contains_key(domain)
            && self.domains.len() >= MAX_COOKIE_DOMAINS
            && let Some(evicted) = self.domains.keys().next().cloned()
        {
            self.domains.remove(&evicted);
        }

        let cookies = self.domains.entry(domain.to_owned()).or_default();
        if !cookies.contains_key(name)
            && cookies.len() >= MAX_COOKIES_PER_DOMAIN
            && let Some(evicted) = cookies.keys().next().cloned()
        {
            cookies.remove(&evicted);
        }

        cookies.insert(name.to_owned(), value.to_owned());
    }
}

fn parse_set_cookie(input: &str, default_domain: &str) -> Option<SetCookie> {
    let mut segments = input.split(';');
    let (name, value) = segments.next()?.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut domain = default_domain.to_owned();
    let mut delete = value.trim().is_empty();

    for attr in segments.map(str::trim).filter(|attr| !attr.is_empty()) {
        let (attr_name, attr_value) = attr
            .split_once('=')
            .map(|(name, value)| (name.trim(), value.trim()))
            .unwrap_or((attr, ""));

        if attr_name.eq_ignore_ascii_case("domain") {
            if let Some(normalized) = normalize_domain(attr_value) {
                domain = normalized;
            }
        } else if attr_name.eq_ignore_ascii_case("max-age")
            && attr_value.parse::<i64>().is_ok_and(|seconds| seconds <= 0)
        {
            delete = true;
        }
    }

    Some(SetCookie {
        domain,
        name: name.to_owned(),
        value: value.trim().to_owned(),
        delete,
    })
}

fn normalize_domain(input: &str) -> Option<String> {
    let normalized = input.trim().trim_start_matches('.').to_ascii_lowercase();
    if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
        None
    } else {
        Some(normalized)
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}
