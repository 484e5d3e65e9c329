//! Blocking HTTP/1.1 client for page loads.
//!
//! Every request opens a fresh connection and asks the server to close it afterwards.
//! Redirects are followed here so callers see the final document URL.

use crate::cookies::CookieJar;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::tls::RustlsConnector;
use crate::tls::TlsConnector;
use crate::tls::TrustStoreMode;
use crate::transport::BoxedIoStream;
use crate::transport::TcpTransport;
use crate::transport::Transport;
use crate::transport::connect_first_available;
use crate::url::PageUrl;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;
const DEFAULT_USER_AGENT: &str = concat!("splice/", env!("CARGO_PKG_VERSION"));
const DEFAULT_ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Client tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub max_redirects: usize,
    pub connect_timeout: Duration,
    /// Upper bound on a response body, before and after content decoding.
    pub max_body_bytes: usize,
    pub trust_store: TrustStoreMode,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            connect_timeout: Duration::from_secs(10),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            trust_store: TrustStoreMode::WebPkiOnly,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> SpliceResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(SpliceError::new(
                "net.client.connect_timeout_zero",
                "connect timeout must be greater than zero",
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(SpliceError::new(
                "net.client.max_body_zero",
                "response body limit must be greater than zero",
            ));
        }

        Header::new("User-Agent", &self.user_agent).map(|_| ())
    }
}

/// Response to a request after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: PageUrl,
    pub response: HttpResponse,
    pub redirects: usize,
}

/// HTTP/1.1 client with pluggable resolver, transport, and TLS connector.
pub struct Http11Client<R = SystemDnsResolver, T = TcpTransport, C = RustlsConnector>
where
    R: DnsResolver,
    T: Transport,
    C: TlsConnector,
{
    dns: R,
    transport: T,
    tls: C,
    config: ClientConfig,
    cookies: Option<Arc<Mutex<CookieJar>>>,
}

impl Http11Client {
    pub fn new(config: ClientConfig) -> SpliceResult<Self> {
        let tls = RustlsConnector::new(config.trust_store)?;
        Self::with_parts(SystemDnsResolver, TcpTransport, tls, config)
    }
}

impl<R, T, C> Http11Client<R, T, C>
where
    R: DnsResolver,
    T: Transport,
    C: TlsConnector,
{
    pub fn with_parts(dns: R, transport: T, tls: C, config: ClientConfig) -> SpliceResult<Self> {
        config.validate()?;
        Ok(Self {
            dns,
            transport,
            tls,
            config,
            cookies: None,
        })
    }

    /// Sends stored cookies with every request and records `Set-Cookie` responses.
    pub fn with_cookie_jar(mut self, jar: Arc<Mutex<CookieJar>>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `request`, following redirects up to the configured limit.
    pub fn fetch(&self, request: HttpRequest) -> SpliceResult<FetchedPage> {
        let mut current = request;
        let mut redirects = 0_usize;

        loop {
            let response = self.execute(&current)?;
            if !response.status.is_redirect() {
                return Ok(FetchedPage {
                    final_url: current.url,
                    response,
                    redirects,
                });
            }

            let Some(location) = response.header("location") else {
                // A redirect without a target is delivered as-is.
                return Ok(FetchedPage {
                    final_url: current.url,
                    response,
                    redirects,
                });
            };

            if redirects >= self.config.max_redirects {
                return Err(SpliceError::new(
                    "net.http.too_many_redirects",
                    format!(
                        "exceeded {} redirects while loading `{}`",
                        self.config.max_redirects, current.url
                    ),
                ));
            }

            let next_url = current.url.resolve(location)?;
            tracing::debug!(
                status = response.status.as_u16(),
                from = %current.url,
                to = %next_url,
                "following redirect"
            );
            current = redirect_request(&current, response.status, next_url)?;
            redirects += 1;
        }
    }

    /// Sends exactly one request and reads its response.
    pub fn execute(&self, request: &HttpRequest) -> SpliceResult<HttpResponse> {
        let mut request = request.clone();
        self.apply_default_headers(&mut request)?;

        let mut stream = self.open_stream(&request.url)?;
        write_request(&mut *stream, &request)?;
        let response = read_response(&mut *stream, &request, self.config.max_body_bytes)?;

        if let Some(jar) = &self.cookies {
            let mut guard = match jar.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.store_from_headers(&request.url, &response.headers);
        }

        Ok(response)
    }

    fn apply_default_headers(&self, request: &mut HttpRequest) -> SpliceResult<()> {
        let defaults = [
            ("User-Agent", self.config.user_agent.as_str()),
            ("Accept", DEFAULT_ACCEPT_HEADER),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Connection", "close"),
        ];
        for (name, value) in defaults {
            if request.header(name).is_none() {
                request.headers.push(Header::new(name, value)?);
            }
        }

        if let Some(jar) = &self.cookies {
            let guard = match jar.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.attach(&request.url, &mut request.headers);
        }

        Ok(())
    }

    fn open_stream(&self, url: &PageUrl) -> SpliceResult<BoxedIoStream> {
        let addresses = self.dns.resolve(url.host(), url.port())?;
        let stream =
            connect_first_available(&self.transport, &addresses, self.config.connect_timeout)?;

        if url.is_secure() {
            self.tls.connect_tls(stream, url.host())
        } else {
            Ok(Box::new(stream))
        }
    }
}

/// Builds the follow-up request for a redirect response.
fn redirect_request(
    previous: &HttpRequest,
    status: HttpStatusCode,
    next_url: PageUrl,
) -> SpliceResult<HttpRequest> {
    let rewrite = status.redirect_rewrites_to_get() && previous.method != HttpMethod::Head;
    let (method, body) = if rewrite {
        (HttpMethod::Get, Vec::new())
    } else {
        (previous.method, previous.body.clone())
    };

    let mut builder = HttpRequest::builder(method, next_url).version(previous.version);
    for header in &previous.headers {
        let name = header.name.to_ascii_lowercase();
        let skip = matches!(name.as_str(), "host" | "content-length" | "cookie")
            || (rewrite && name == "content-type");
        if !skip {
            builder = builder.header(&header.name, &header.value)?;
        }
    }
    builder.body(body).build()
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> SpliceResult<()> {
    let mut encoded = Vec::new();
    encoded.extend_from_slice(request.method.as_str().as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(request.request_target().as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(request.version.as_str().as_bytes());
    encoded.extend_from_slice(b"\r\n");

    for header in &request.headers {
        encoded.extend_from_slice(header.name.as_bytes());
        encoded.extend_from_slice(b": ");
        encoded.extend_from_slice(header.value.as_bytes());
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(b"\r\n");
    encoded.extend_from_slice(&request.body);

    stream.write_all(&encoded).map_err(|error| {
        SpliceError::new(
            "net.http.write_failed",
            format!("failed to write HTTP request bytes: {error}"),
        )
    })?;
    stream.flush().map_err(|error| {
        SpliceError::new(
            "net.http.flush_failed",
            format!("failed to flush HTTP request bytes: {error}"),
        )
    })
}

fn read_response(
    stream: &mut dyn Read,
    request: &HttpRequest,
    max_body_bytes: usize,
) -> SpliceResult<HttpResponse> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        let read = stream.read(&mut chunk).map_err(|error| {
            SpliceError::new(
                "net.http.read_head_failed",
                format!("failed while reading HTTP response head: {error}"),
            )
        })?;
        if read == 0 {
            return Err(SpliceError::new(
                "net.http.unexpected_eof",
                "unexpected EOF before response head completed",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(SpliceError::new(
                "net.http.head_too_large",
                format!("HTTP response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let head_text = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut body = buffer[header_end..].to_vec();

    let mut lines = head_text.split("\r\n");
    let status_line = lines.next().ok_or_else(|| {
        SpliceError::new("net.http.status_line_missing", "missing HTTP status line")
    })?;
    let (version, status) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines.filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            SpliceError::new(
                "net.http.header_invalid",
                format!("invalid HTTP header line `{line}`"),
            )
        })?;
        headers.push(Header::new(name.trim(), value.trim())?);
    }

    let has_transfer_encoding = headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case("transfer-encoding"));
    let chunked = header_contains(&headers, "transfer-encoding", "chunked");
    if has_transfer_encoding && !chunked {
        return Err(SpliceError::new(
            "net.http.transfer_encoding_unsupported",
            "only chunked transfer encoding is supported",
        ));
    }

    let bodyless = request.method == HttpMethod::Head || status_disallows_body(status.as_u16());
    if bodyless {
        body.clear();
    } else if chunked {
        body = read_chunked_body(stream, body, max_body_bytes)?;
    } else if let Some(len) = parse_content_length(&headers)? {
        if len > max_body_bytes {
            return Err(body_too_large(max_body_bytes));
        }
        if body.len() < len {
            // Grows with the bytes actually received, not with the declared length.
            let remaining = len - body.len();
            (&mut *stream)
                .take(u64::try_from(remaining).unwrap_or(u64::MAX))
                .read_to_end(&mut body)
                .map_err(|error| {
                    SpliceError::new(
                        "net.http.read_body_failed",
                        format!("failed to read HTTP body bytes: {error}"),
                    )
                })?;
            if body.len() < len {
                return Err(SpliceError::new(
                    "net.http.read_body_failed",
                    format!("body ended after {} of {len} bytes", body.len()),
                ));
            }
        } else {
            body.truncate(len);
        }
    } else {
        // The request asked for `Connection: close`, so EOF delimits the body.
        let budget = max_body_bytes.saturating_sub(body.len());
        (&mut *stream)
            .take(read_budget(budget))
            .read_to_end(&mut body)
            .map_err(|error| {
                SpliceError::new(
                    "net.http.read_body_failed",
                    format!("failed while reading response body until close: {error}"),
                )
            })?;
        if body.len() > max_body_bytes {
            return Err(body_too_large(max_body_bytes));
        }
    }

    if !bodyless {
        body = decode_content_encoding(&headers, &body, max_body_bytes)?;
    }

    Ok(HttpResponse {
        version,
        status,
        headers,
        body,
    })
}

/// Serves bytes the head reader already buffered before falling through to the stream.
struct PrefixedStreamReader<'a> {
    prefetched: Vec<u8>,
    offset: usize,
    stream: &'a mut dyn Read,
}

impl<'a> PrefixedStreamReader<'a> {
    fn new(stream: &'a mut dyn Read, prefetched: Vec<u8>) -> Self {
        Self {
            prefetched,
            offset: 0,
            stream,
        }
    }

    fn read_exact_into(&mut self, out: &mut [u8], detail: &str) -> SpliceResult<()> {
        let available = self.prefetched.len().saturating_sub(self.offset);
        let take = available.min(out.len());

        if take > 0 {
            out[..take].copy_from_slice(&self.prefetched[self.offset..self.offset + take]);
            self.offset += take;
        }

        if take < out.len() {
            self.stream.read_exact(&mut out[take..]).map_err(|error| {
                SpliceError::new("net.http.read_body_failed", format!("{detail}: {error}"))
            })?;
        }

        Ok(())
    }
}

fn read_chunked_body(
    stream: &mut dyn Read,
    prefetched: Vec<u8>,
    max_body_bytes: usize,
) -> SpliceResult<Vec<u8>> {
    let mut reader = PrefixedStreamReader::new(stream, prefetched);
    let mut decoded = Vec::new();

    loop {
        let size_line = read_crlf_line(&mut reader)?;
        if size_line.is_empty() {
            continue;
        }

        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = usize::from_str_radix(size_token, 16).map_err(|error| {
            SpliceError::new(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if chunk_size == 0 {
            // Trailers are read and discarded.
            while !read_crlf_line(&mut reader)?.is_empty() {}
            break;
        }

        let start = decoded.len();
        let end = start
            .checked_add(chunk_size)
            .filter(|end| *end <= max_body_bytes)
            .ok_or_else(|| body_too_large(max_body_bytes))?;
        decoded.resize(end, 0);
        reader.read_exact_into(&mut decoded[start..], "failed while reading chunk data")?;

        let mut terminator = [0_u8; 2];
        reader.read_exact_into(&mut terminator, "failed while reading chunk terminator")?;
        if terminator != *b"\r\n" {
            return Err(SpliceError::new(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing trailing CRLF",
            ));
        }
    }

    Ok(decoded)
}

fn read_crlf_line(reader: &mut PrefixedStreamReader<'_>) -> SpliceResult<String> {
    let mut line = Vec::new();

    loop {
        let mut byte = [0_u8; 1];
        reader.read_exact_into(&mut byte, "failed while reading chunked transfer line")?;
        line.push(byte[0]);

        if line.len() > MAX_CHUNK_LINE_BYTES {
            return Err(SpliceError::new(
                "net.http.chunk_line_too_large",
                format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
            ));
        }

        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

fn parse_status_line(line: &str) -> SpliceResult<(HttpVersion, HttpStatusCode)> {
    let invalid = || {
        SpliceError::new(
            "net.http.status_line_invalid",
            format!("malformed status line `{line}`"),
        )
    };

    let mut parts = line.splitn(3, ' ');
    let version = match parts.next().ok_or_else(invalid)? {
        "HTTP/1.0" => HttpVersion::Http10,
        "HTTP/1.1" => HttpVersion::Http11,
        other => {
            return Err(SpliceError::new(
                "net.http.version_unsupported",
                format!("unsupported response version `{other}`"),
            ));
        }
    };

    let code = parts
        .next()
        .ok_or_else(invalid)?
        .parse::<u16>()
        .map_err(|_| invalid())?;
    Ok((version, HttpStatusCode::new(code)?))
}

fn parse_content_length(headers: &[Header]) -> SpliceResult<Option<usize>> {
    let mut value: Option<usize> = None;
    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        let parsed = header.value.trim().parse::<usize>().map_err(|error| {
            SpliceError::new(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`: {error}", header.value),
            )
        })?;

        match value {
            Some(existing) if existing != parsed => {
                return Err(SpliceError::new(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => value = Some(parsed),
        }
    }

    Ok(value)
}

fn status_disallows_body(status_code: u16) -> bool {
    (100..200).contains(&status_code) || status_code == 204 || status_code == 304
}

fn header_contains(headers: &[Header], name: &str, value: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(value))
    })
}

fn decode_content_encoding(
    headers: &[Header],
    body: &[u8],
    max_body_bytes: usize,
) -> SpliceResult<Vec<u8>> {
    let encodings = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    let mut decoded = body.to_vec();
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => read_all(
                GzDecoder::new(Cursor::new(decoded)),
                "gzip",
                max_body_bytes,
            )?,
            "deflate" => decode_deflate(&decoded, max_body_bytes)?,
            "br" => read_all(
                Decompressor::new(Cursor::new(decoded), 4096),
                "brotli",
                max_body_bytes,
            )?,
            _ => {
                return Err(SpliceError::new(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{encoding}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

fn decode_deflate(body: &[u8], max_body_bytes: usize) -> SpliceResult<Vec<u8>> {
    // Servers disagree on zlib-wrapped versus raw deflate.
    let mut zlib_decoded = Vec::new();
    if ZlibDecoder::new(Cursor::new(body))
        .take(read_budget(max_body_bytes))
        .read_to_end(&mut zlib_decoded)
        .is_ok()
    {
        if zlib_decoded.len() > max_body_bytes {
            return Err(body_too_large(max_body_bytes));
        }
        return Ok(zlib_decoded);
    }

    read_all(DeflateDecoder::new(Cursor::new(body)), "deflate", max_body_bytes)
}

fn read_all(decoder: impl Read, label: &str, max_body_bytes: usize) -> SpliceResult<Vec<u8>> {
    let mut decoded = Vec::new();
    decoder
        .take(read_budget(max_body_bytes))
        .read_to_end(&mut decoded)
        .map_err(|error| {
            SpliceError::new(
                "net.http.decode_failed",
                format!("{label} decode failed: {error}"),
            )
        })?;
    if decoded.len() > max_body_bytes {
        return Err(body_too_large(max_body_bytes));
    }
    Ok(decoded)
}

/// Reader budget one byte past `limit`, so overruns are detectable.
fn read_budget(limit: usize) -> u64 {
    u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1)
}

fn body_too_large(limit: usize) -> SpliceError {
    SpliceError::new(
        "net.http.body_too_large",
        format!("HTTP response body exceeds {limit} bytes"),
    )
}
