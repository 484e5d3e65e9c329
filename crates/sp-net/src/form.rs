//! Form data set and request body encodings.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use url::form_urlencoded;

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Declared body encoding of a form (`enctype`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormEncoding {
    #[default]
    UrlEncoded,
    Multipart,
}

impl FormEncoding {
    /// Unknown or missing `enctype` values fall back to urlencoded.
    pub fn from_enctype(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("multipart/form-data") => Self::Multipart,
            _ => Self::UrlEncoded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
        }
    }
}

/// File selected in a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(filename: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.to_owned(),
            content_type: content_type.to_owned(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// Encoded body plus the `Content-Type` the transport must send with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Ordered form data set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormData {
    fields: Vec<FormField>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, name: &str, value: &str) {
        self.fields.push(FormField {
            name: name.to_owned(),
            value: FormValue::Text(value.to_owned()),
        });
    }

    pub fn push_file(&mut self, name: &str, file: FilePart) {
        self.fields.push(FormField {
            name: name.to_owned(),
            value: FormValue::File(file),
        });
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// First text value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| match &field.value {
            FormValue::Text(value) if field.name == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn has_files(&self) -> bool {
        self.fields
            .iter()
            .any(|field| matches!(field.value, FormValue::File(_)))
    }

    /// `application/x-www-form-urlencoded` serialization; files contribute their filename.
    pub fn to_urlencoded(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for field in &self.fields {
            match &field.value {
                FormValue::Text(value) => serializer.append_pair(&field.name, value),
                FormValue::File(file) => serializer.append_pair(&field.name, &file.filename),
            };
        }
        serializer.finish()
    }

    pub fn to_multipart(&self, boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            match &field.value {
                FormValue::Text(value) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_disposition(&field.name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(normalize_newlines(value).as_bytes());
                }
                FormValue::File(file) => {
                    let content_type = if file.content_type.trim().is_empty() {
                        "application/octet-stream"
                    } else {
                        file.content_type.trim()
                    };
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n",
                            escape_disposition(&field.name),
                            escape_disposition(&file.filename),
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(&file.bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
        out
    }

    /// Encodes the body and derives its content type; multipart generates a fresh boundary.
    pub fn encode(&self, encoding: FormEncoding) -> EncodedBody {
        match encoding {
            FormEncoding::UrlEncoded => EncodedBody {
                content_type: FormEncoding::UrlEncoded.as_str().to_owned(),
                bytes: self.to_urlencoded().into_bytes(),
            },
            FormEncoding::Multipart => {
                let boundary = generate_boundary();
                EncodedBody {
                    content_type: format!("multipart/form-data; boundary={boundary}"),
                    bytes: self.to_multipart(&boundary),
                }
            }
        }
    }
}

pub fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let counter = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("----SpliceFormBoundary{:016x}{counter:08x}", nanos as u64)
}

fn escape_disposition(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

fn normalize_newlines(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}
