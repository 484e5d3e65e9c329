//! HTTP request/response messages.

use crate::url::PageUrl;
use sp_core::SpliceError;
use sp_core::SpliceResult;

/// Methods a navigation or form submission can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parses a method token case-insensitively (`method="post"` on a form).
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        [
            Self::Get,
            Self::Head,
            Self::Post,
            Self::Put,
            Self::Patch,
            Self::Delete,
        ]
        .into_iter()
        .find(|method| method.as_str().eq_ignore_ascii_case(token))
    }

    pub fn allows_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

/// Single HTTP header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> SpliceResult<Self> {
        if !is_valid_header_name(name) {
            return Err(SpliceError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(SpliceError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: PageUrl,
    pub version: HttpVersion,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn builder(method: HttpMethod, url: PageUrl) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method,
            url,
            version: HttpVersion::Http11,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Origin-form request target; fragments never go on the wire.
    pub fn request_target(&self) -> String {
        self.url.path_and_query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Builder for `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestBuilder {
    method: HttpMethod,
    url: PageUrl,
    version: HttpVersion,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl HttpRequestBuilder {
    pub fn version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> SpliceResult<Self> {
        self.headers.push(Header::new(name, value)?);
        Ok(self)
    }

    /// Adds `header` unless one with the same name is already present.
    pub fn default_header(self, name: &str, value: &str) -> SpliceResult<Self> {
        if has_header(&self.headers, name) {
            return Ok(self);
        }
        self.header(name, value)
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(mut self) -> SpliceResult<HttpRequest> {
        if !self.method.allows_body() && !self.body.is_empty() {
            return Err(SpliceError::new(
                "net.http.body_disallowed",
                format!("{} requests must not include a body", self.method.as_str()),
            ));
        }

        ensure_singleton_header(&self.headers, "host")?;
        ensure_singleton_header(&self.headers, "content-length")?;

        if !has_header(&self.headers, "host") {
            let host = self.url.authority();
            self.headers.push(Header::new("Host", &host)?);
        }

        let needs_length = !self.body.is_empty() || self.method.allows_body();
        if needs_length && !has_header(&self.headers, "content-length") {
            let len = self.body.len().to_string();
            self.headers.push(Header::new("Content-Length", &len)?);
        }

        Ok(HttpRequest {
            method: self.method,
            url: self.url,
            version: self.version,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub fn new(code: u16) -> SpliceResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(SpliceError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    /// 301/302/303 rewrite a non-GET request to GET and drop the body; 307/308 preserve both.
    pub fn redirect_rewrites_to_get(self) -> bool {
        matches!(self.0, 301..=303)
    }
}

/// Incoming HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

fn ensure_singleton_header(headers: &[Header], name: &str) -> SpliceResult<()> {
    let count = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case(name))
        .count();

    if count <= 1 {
        return Ok(());
    }

    Err(SpliceError::new(
        "net.http.duplicate_header",
        format!("header `{name}` must appear at most once"),
    ))
}

fn has_header(headers: &[Header], name: &str) -> bool {
    headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case(name))
}

fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_char)
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
