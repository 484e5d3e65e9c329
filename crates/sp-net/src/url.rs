//! Page URL model with origin semantics.

use core::fmt;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use url::Url;

/// Schemes a page can be navigated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Absolute HTTP(S) URL of a document or navigation target.
///
/// Unlike a wire request URL, the fragment is preserved so history entries round-trip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl {
    parsed: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl PageUrl {
    pub fn parse(input: &str) -> SpliceResult<Self> {
        let parsed = Url::parse(input.trim()).map_err(|error| {
            SpliceError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;
        Self::from_url(parsed)
    }

    fn from_url(parsed: Url) -> SpliceResult<Self> {
        if parsed.cannot_be_a_base() {
            return Err(SpliceError::new(
                "net.url.invalid_base",
                format!("URL `{parsed}` cannot be used for page navigation"),
            ));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(SpliceError::new(
                "net.url.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(SpliceError::new(
                    "net.url.scheme_unsupported",
                    format!("unsupported scheme `{other}`"),
                ));
            }
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| SpliceError::new("net.url.host_missing", "URL must include a host"))?
            .to_ascii_lowercase();

        let port = parsed.port_or_known_default().ok_or_else(|| {
            SpliceError::new(
                "net.url.port_missing",
                "unable to determine effective port for URL",
            )
        })?;

        Ok(Self {
            parsed,
            scheme,
            host,
            port,
        })
    }

    /// Resolves an `href`/`action` reference against this URL.
    ///
    /// An empty reference resolves to this URL without its fragment, matching form `action`
    /// defaulting.
    pub fn resolve(&self, reference: &str) -> SpliceResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(self.without_fragment());
        }

        let joined = self.parsed.join(reference).map_err(|error| {
            SpliceError::new(
                "net.url.invalid",
                format!("failed to resolve `{reference}` against `{}`: {error}", self.parsed),
            )
        })?;
        Self::from_url(joined)
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Serialized tuple origin (`scheme://host[:port]`).
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    pub fn same_origin(&self, other: &PageUrl) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }

    pub fn path(&self) -> &str {
        match self.parsed.path() {
            "" => "/",
            path => path,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.parsed.query()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.parsed.fragment()
    }

    pub fn path_and_query(&self) -> String {
        match self.parsed.query() {
            Some(query) => format!("{}?{query}", self.path()),
            None => self.path().to_owned(),
        }
    }

    pub fn without_fragment(&self) -> Self {
        let mut copy = self.clone();
        copy.parsed.set_fragment(None);
        copy
    }

    /// True when both URLs address the same document, ignoring fragments.
    pub fn same_document(&self, other: &PageUrl) -> bool {
        self.same_origin(other)
            && self.path() == other.path()
            && self.parsed.query() == other.parsed.query()
    }

    /// Returns a copy whose query string is `query` (cleared when empty) and without fragment.
    pub fn with_query(&self, query: &str) -> Self {
        let mut copy = self.without_fragment();
        if query.is_empty() {
            copy.parsed.set_query(None);
        } else {
            copy.parsed.set_query(Some(query));
        }
        copy
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parsed.as_str())
    }
}
