//! Byte-oriented HTML tokenizer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Doctype(String),
    Comment(String),
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            push_text(&mut out, decode_entities(&source[idx..next]));
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            let body_start = idx + 4;
            match find_subslice(bytes, body_start, b"-->") {
                Some(end) => {
                    out.push(Token::Comment(source[body_start..end].to_owned()));
                    idx = end + 3;
                }
                None => {
                    out.push(Token::Comment(source[body_start..].to_owned()));
                    idx = bytes.len();
                }
            }
            continue;
        }

        if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
            let end = find_byte(bytes, idx, b'>').unwrap_or(bytes.len());
            let inner = source[idx + 2..end].trim();
            if let Some(prefix) = inner.get(..7)
                && prefix.eq_ignore_ascii_case("doctype")
            {
                out.push(Token::Doctype(inner[7..].trim().to_owned()));
            }
            idx = (end + 1).min(bytes.len());
            continue;
        }

        if starts_with(bytes, idx, b"</") {
            if let Some((token, next)) = parse_end_tag(bytes, idx) {
                out.push(token);
                idx = next;
                continue;
            }
        } else if let Some((token, next)) = parse_start_tag(bytes, idx) {
            let raw_text_tag = match &token {
                Token::Start {
                    name, self_closing, ..
                } if !*self_closing && sp_dom::is_raw_text_tag(name) => Some(name.clone()),
                _ => None,
            };

            out.push(token);
            idx = next;

            if let Some(tag) = raw_text_tag {
                let (raw, closing_end) = read_raw_text(source, idx, &tag);
                if !raw.is_empty() {
                    out.push(Token::Text(raw.to_owned()));
                }
                out.push(Token::End { name: tag });
                idx = closing_end;
            }
            continue;
        }

        // A lone `<` that does not open a tag is literal text.
        push_text(&mut out, "<".to_owned());
        idx += 1;
    }

    out
}

fn push_text(out: &mut Vec<Token>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(existing)) = out.last_mut() {
        existing.push_str(&text);
        return;
    }
    out.push(Token::Text(text));
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = skip_spaces(bytes, start + 2);
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx += 1;
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let close = find_byte(bytes, idx, b'>')?;
    Some((Token::End { name }, close + 1))
}

fn parse_start_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = start + 1;
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx += 1;
    }
    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        let byte = *bytes.get(idx)?;

        if byte == b'>' {
            idx += 1;
            break;
        }

        if byte == b'/' {
            idx = skip_spaces(bytes, idx + 1);
            if bytes.get(idx) == Some(&b'>') {
                self_closing = true;
                idx += 1;
                break;
            }
            continue;
        }

        let attr_start = idx;
        while idx < bytes.len() && !is_attr_name_terminator(bytes[idx]) {
            idx += 1;
        }
        if idx == attr_start {
            idx += 1;
            continue;
        }

        let attr_name = String::from_utf8_lossy(&bytes[attr_start..idx]).to_ascii_lowercase();
        idx = skip_spaces(bytes, idx);

        let mut value = String::new();
        if bytes.get(idx) == Some(&b'=') {
            idx = skip_spaces(bytes, idx + 1);
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    let value_start = idx + 1;
                    let value_end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                    value = String::from_utf8_lossy(&bytes[value_start..value_end]).into_owned();
                    idx = (value_end + 1).min(bytes.len());
                }
                Some(_) => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx += 1;
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).into_owned();
                }
                None => return None,
            }
        }

        // First occurrence wins, as in the HTML tree builder.
        if !attrs.iter().any(|(existing, _)| *existing == attr_name) {
            attrs.push((attr_name, decode_entities(&value)));
        }
    }

    Some((
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        idx,
    ))
}

/// Returns the raw text up to `</tag` and the index just past the closing tag.
fn read_raw_text<'a>(source: &'a str, start: usize, tag: &str) -> (&'a str, usize) {
    let bytes = source.as_bytes();
    let tag_bytes = tag.as_bytes();
    let mut idx = start;

    while let Some(lt) = find_byte(bytes, idx, b'<') {
        let name_start = lt + 2;
        let name_end = name_start + tag_bytes.len();
        if bytes.get(lt + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(tag_bytes)
            && bytes
                .get(name_end)
                .is_none_or(|byte| byte.is_ascii_whitespace() || *byte == b'>' || *byte == b'/')
        {
            let close = find_byte(bytes, name_end, b'>').unwrap_or(bytes.len());
            return (&source[start..lt], (close + 1).min(bytes.len()));
        }
        idx = lt + 1;
    }

    (&source[start..], bytes.len())
}

pub(crate) fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0_usize;

    while let Some(rel_amp) = input[cursor..].find('&') {
        let amp = cursor + rel_amp;
        out.push_str(&input[cursor..amp]);

        let rest = &input[amp + 1..];
        let decoded = rest
            .find(';')
            .filter(|semi| *semi <= 32)
            .and_then(|semi| decode_entity(&rest[..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                cursor = amp + 1 + semi + 1;
            }
            None => {
                out.push('&');
                cursor = amp + 1;
            }
        }
    }

    out.push_str(&input[cursor..]);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "copy" => Some('\u{a9}'),
        "reg" => Some('\u{ae}'),
        "hellip" => Some('\u{2026}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "laquo" => Some('\u{ab}'),
        "raquo" => Some('\u{bb}'),
        "times" => Some('\u{d7}'),
        _ => {
            let value = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(value)
        }
    }
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_attr_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/')
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    bytes
        .get(idx..idx.saturating_add(pattern.len()))
        .is_some_and(|window| window == pattern)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}
