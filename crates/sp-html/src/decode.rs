//! Response body to text decoding.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;

const META_SNIFF_BYTES: usize = 1024;

/// Decodes an HTML response body.
///
/// Precedence: byte order mark, `charset` in the `Content-Type` header, `<meta>` charset in
/// the first kilobyte, then UTF-8. Malformed sequences become U+FFFD.
pub fn decode_text_response(body: &[u8], content_type: &str) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(body) {
        let (decoded, _) = encoding.decode_without_bom_handling(&body[bom_len..]);
        return decoded.into_owned();
    }

    let encoding = detect_response_charset(body, content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (decoded, _) = encoding.decode_without_bom_handling(body);
    decoded.into_owned()
}

/// Returns the charset label declared by the header or, failing that, a `<meta>` tag.
pub fn detect_response_charset(body: &[u8], content_type: &str) -> Option<String> {
    if let Some(label) = charset_from_content_type(content_type) {
        return Some(label);
    }

    let lower_type = content_type.to_ascii_lowercase();
    let html_like = lower_type.is_empty()
        || lower_type.contains("text/html")
        || lower_type.contains("application/xhtml+xml");
    if html_like {
        return charset_from_meta(body);
    }

    None
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches(|ch| ch == '"' || ch == '\'');
        (!label.is_empty()).then(|| label.to_owned())
    })
}

fn charset_from_meta(body: &[u8]) -> Option<String> {
    let prefix = String::from_utf8_lossy(&body[..body.len().min(META_SNIFF_BYTES)]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_from = 0_usize;

    while let Some(relative) = lower[search_from..].find("charset") {
        let after_name = search_from + relative + "charset".len();
        search_from = after_name;

        let rest = lower[after_name..].trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let label: String = match value.chars().next() {
            Some(quote @ ('"' | '\'')) => value[1..].chars().take_while(|ch| *ch != quote).collect(),
            Some(_) => value
                .chars()
                .take_while(|ch| !ch.is_whitespace() && !matches!(ch, '"' | '\'' | ';' | '>' | '/'))
                .collect(),
            None => String::new(),
        };
        let label = label.trim();
        if !label.is_empty() {
            return Some(label.to_owned());
        }
    }

    None
}
