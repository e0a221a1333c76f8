//! Request body decoder.
//!
//! Turns the raw `Content-Type` header and body bytes of a `POST` into a
//! [`QueryRequest`]. Two shapes are accepted:
//!
//! - `multipart/form-data; boundary=B`: the body is split on the byte
//!   sequence `--B`. Each part's `Content-Disposition` header supplies the
//!   field `name` (and `filename` for uploads). The value is everything
//!   between the blank line ending the headers and the line terminator
//!   before the next delimiter, byte for byte.
//! - anything else: the body is parsed as a flat JSON object.
//!
//! Both shapes use the same field names:
//!
//! | Field | Default |
//! |-------|---------|
//! | `question` | `""` |
//! | `history_pq` | none |
//! | `user_type` | `"user"` |
//! | `legal_area` | `"General Law"` |
//! | `selected_language` | `"English"` |
//! | `file` | none (multipart only) |

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::extract::mime_from_filename;
use crate::models::{
    QueryRequest, UploadedFile, DEFAULT_LANGUAGE, DEFAULT_LEGAL_AREA, DEFAULT_USER_TYPE,
};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const OCTET_STREAM: &str = "application/octet-stream";
const FILE_FIELD: &str = "file";

/// Decode a request body according to its content type.
///
/// # Errors
///
/// - [`Error::MissingBoundary`] for a multipart content type without a
///   `boundary` parameter.
/// - [`Error::MalformedPart`] for a part without the header/body separator,
///   or a text field that is not UTF-8.
/// - [`Error::InvalidJson`] for a non-multipart body that is not a JSON
///   object of strings.
pub fn decode(content_type: &str, body: &[u8]) -> Result<QueryRequest> {
    if media_type(content_type) == MULTIPART_FORM_DATA {
        let boundary = boundary(content_type)?;
        decode_multipart(&boundary, body)
    } else {
        decode_json(body)
    }
}

/// The `type/subtype` portion of a content type, lowercased.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn boundary(content_type: &str) -> Result<String> {
    let value = split_params(content_type)
        .into_iter()
        .skip(1)
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| unquote(value.trim()))
        })
        .next()
        .ok_or(Error::MissingBoundary)?;

    if value.is_empty() {
        return Err(Error::MissingBoundary);
    }
    Ok(value)
}

// ============ JSON ============

#[derive(Deserialize)]
struct JsonQuery {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    history_pq: Option<String>,
    #[serde(default)]
    user_type: Option<String>,
    #[serde(default)]
    legal_area: Option<String>,
    #[serde(default)]
    selected_language: Option<String>,
}

fn decode_json(body: &[u8]) -> Result<QueryRequest> {
    let raw: JsonQuery =
        serde_json::from_slice(body).map_err(|e| Error::InvalidJson(e.to_string()))?;

    let mut fields = HashMap::new();
    let pairs = [
        ("question", raw.question),
        ("history_pq", raw.history_pq),
        ("user_type", raw.user_type),
        ("legal_area", raw.legal_area),
        ("selected_language", raw.selected_language),
    ];
    for (name, value) in pairs {
        if let Some(v) = value {
            fields.insert(name.to_string(), v);
        }
    }

    Ok(build_request(fields, None))
}

// ============ multipart/form-data ============

fn decode_multipart(boundary: &str, body: &[u8]) -> Result<QueryRequest> {
    let delimiter = format!("--{}", boundary).into_bytes();

    let mut fields = HashMap::new();
    let mut upload = None;

    // The first segment is the preamble; a segment starting with `--`
    // follows the closing delimiter.
    for segment in split_on(body, &delimiter).into_iter().skip(1) {
        if segment.starts_with(b"--") {
            break;
        }
        let part = strip_line_break(segment);
        if part.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let (header_block, value) = split_part(part)?;
        let headers = parse_headers(header_block);
        let Some(disposition) = headers.get("content-disposition") else {
            continue;
        };
        let params = disposition_params(disposition);
        let Some(name) = params.get("name") else {
            continue;
        };

        if name == FILE_FIELD {
            let filename = params.get("filename").cloned().unwrap_or_default();
            if filename.is_empty() && value.is_empty() {
                // Browsers send an empty file part when nothing was picked.
                continue;
            }
            let declared = headers.get("content-type").map(|ct| media_type(ct));
            upload = Some(UploadedFile {
                mime_type: resolve_mime(declared.as_deref(), &filename),
                filename: if filename.is_empty() {
                    "upload".to_string()
                } else {
                    filename
                },
                bytes: value.to_vec(),
            });
        } else {
            let text = String::from_utf8(value.to_vec()).map_err(|_| {
                Error::MalformedPart(format!("field '{}' is not valid UTF-8", name))
            })?;
            fields.insert(name.clone(), text);
        }
    }

    Ok(build_request(fields, upload))
}

/// Split `haystack` on every occurrence of `needle`.
fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            pieces.push(&haystack[start..i]);
            i += needle.len();
            start = i;
        } else {
            i += 1;
        }
    }
    pieces.push(&haystack[start..]);
    pieces
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Drop the transport padding and line break that follow a delimiter.
fn strip_line_break(segment: &[u8]) -> &[u8] {
    let mut rest = segment;
    while let [b' ' | b'\t', tail @ ..] = rest {
        rest = tail;
    }
    rest.strip_prefix(b"\r\n")
        .or_else(|| rest.strip_prefix(b"\n"))
        .unwrap_or(rest)
}

/// Split a part into its header block and value.
///
/// The value ends before the line terminator preceding the next delimiter;
/// exactly one trailing CRLF is removed so binary content stays intact.
fn split_part(part: &[u8]) -> Result<(&[u8], &[u8])> {
    let (headers, value) = if let Some(rest) = part.strip_prefix(b"\r\n") {
        (&part[..0], rest)
    } else {
        let sep = find(part, b"\r\n\r\n").ok_or_else(|| {
            Error::MalformedPart("part has no header/body separator".to_string())
        })?;
        (&part[..sep], &part[sep + 4..])
    };
    let value = value
        .strip_suffix(b"\r\n")
        .or_else(|| value.strip_suffix(b"\n"))
        .unwrap_or(value);
    Ok((headers, value))
}

/// Parse `Name: value` lines into a map keyed by lowercased name.
fn parse_headers(block: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(block)
        .split("\r\n")
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Parameters of a `Content-Disposition` value, keyed by lowercased name.
fn disposition_params(disposition: &str) -> HashMap<String, String> {
    split_params(disposition)
        .into_iter()
        .skip(1)
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((key.trim().to_ascii_lowercase(), unquote(value.trim())))
        })
        .collect()
}

/// Split a header value on `;` outside double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

fn resolve_mime(declared: Option<&str>, filename: &str) -> String {
    match declared {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => mime_from_filename(filename)
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}

// ============ shared ============

fn build_request(mut fields: HashMap<String, String>, upload: Option<UploadedFile>) -> QueryRequest {
    let mut take_or = |name: &str, default: &str| {
        fields
            .remove(name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let question = take_or("question", "");
    let user_type = take_or("user_type", DEFAULT_USER_TYPE);
    let legal_area = take_or("legal_area", DEFAULT_LEGAL_AREA);
    let language = take_or("selected_language", DEFAULT_LANGUAGE);
    let prior_question = fields
        .remove("history_pq")
        .filter(|v| !v.trim().is_empty());

    QueryRequest {
        question,
        user_type,
        legal_area,
        language,
        prior_question,
        uploaded_file: upload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{MIME_DOCX, MIME_PDF};

    const BOUNDARY: &str = "----lexragBoundary7MA4YWxkTrZu0gW";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn text_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        )
        .into_bytes()
    }

    fn file_part(filename: &str, content_type: Option<&str>, bytes: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            BOUNDARY, filename
        )
        .into_bytes();
        if let Some(ct) = content_type {
            out.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\r\n");
        out
    }

    fn closing() -> Vec<u8> {
        format!("--{}--\r\n", BOUNDARY).into_bytes()
    }

    fn body(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out: Vec<u8> = parts.concat();
        out.extend_from_slice(&closing());
        out
    }

    #[test]
    fn test_question_and_file_parts() {
        let pdf = b"%PDF-1.4\r\n\x00\x01\xff binary\r\n--not-a-boundary\r\n".to_vec();
        let body = body(&[
            text_part("question", "What is FIR?"),
            file_part("doc.pdf", Some("application/pdf"), &pdf),
        ]);

        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.question, "What is FIR?");
        let file = req.uploaded_file.unwrap();
        assert_eq!(file.filename, "doc.pdf");
        assert_eq!(file.bytes, pdf);
        assert_eq!(file.mime_type, MIME_PDF);
    }

    #[test]
    fn test_form_fields_and_defaults() {
        let body = body(&[
            text_part("question", "Explain Section 420"),
            text_part("history_pq", "What is IPC?"),
            text_part("legal_area", "IPC"),
        ]);
        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.question, "Explain Section 420");
        assert_eq!(req.prior_question.as_deref(), Some("What is IPC?"));
        assert_eq!(req.legal_area, "IPC");
        assert_eq!(req.user_type, "user");
        assert_eq!(req.language, "English");
        assert!(req.uploaded_file.is_none());
    }

    #[test]
    fn test_missing_boundary() {
        let err = decode("multipart/form-data", b"whatever").unwrap_err();
        assert!(matches!(err, Error::MissingBoundary));
        let err = decode("multipart/form-data; boundary=", b"whatever").unwrap_err();
        assert!(matches!(err, Error::MissingBoundary));
        let err = decode("multipart/form-data; charset=utf-8", b"").unwrap_err();
        assert!(matches!(err, Error::MissingBoundary));
    }

    #[test]
    fn test_part_without_separator_is_malformed() {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"question\"\r\nno blank line here\r\n",
            BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(&closing());
        let err = decode(&content_type(), &body).unwrap_err();
        assert!(matches!(err, Error::MalformedPart(_)));
    }

    #[test]
    fn test_quoted_boundary_and_case_insensitive_headers() {
        let body = format!(
            "preamble text\r\n--abc\r\ncontent-disposition: form-data; NAME=\"question\"\r\n\r\nHi\r\n--abc--\r\nepilogue",
        );
        let req = decode("Multipart/Form-Data; Boundary=\"abc\"", body.as_bytes()).unwrap();
        assert_eq!(req.question, "Hi");
    }

    #[test]
    fn test_value_keeps_inner_line_breaks() {
        let body = body(&[text_part("question", "line one\r\nline two\r\n")]);
        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.question, "line one\r\nline two\r\n");
    }

    #[test]
    fn test_empty_file_part_is_no_upload() {
        let body = body(&[
            text_part("question", "q"),
            file_part("", Some("application/octet-stream"), b""),
        ]);
        let req = decode(&content_type(), &body).unwrap();
        assert!(req.uploaded_file.is_none());
    }

    #[test]
    fn test_mime_inferred_from_extension() {
        let body = body(&[file_part("Contract.DOCX", None, b"PK\x03\x04")]);
        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.uploaded_file.unwrap().mime_type, MIME_DOCX);

        let body2 = super::tests::body(&[file_part("a.pdf", Some("application/octet-stream"), b"x")]);
        let req = decode(&content_type(), &body2).unwrap();
        assert_eq!(req.uploaded_file.unwrap().mime_type, MIME_PDF);
    }

    #[test]
    fn test_non_utf8_text_field_is_malformed() {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\n",
            BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(b"\xff\xfe\r\n");
        body.extend_from_slice(&closing());
        assert!(matches!(
            decode(&content_type(), &body).unwrap_err(),
            Error::MalformedPart(_)
        ));
    }

    #[test]
    fn test_part_without_disposition_is_ignored() {
        let mut body = format!("--{}\r\nX-Note: hello\r\n\r\nignored\r\n", BOUNDARY).into_bytes();
        body.extend_from_slice(&text_part("question", "kept"));
        body.extend_from_slice(&closing());
        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.question, "kept");
    }

    #[test]
    fn test_filename_with_semicolon() {
        let body = body(&[file_part("a;b.pdf", Some("application/pdf"), b"%PDF")]);
        let req = decode(&content_type(), &body).unwrap();
        assert_eq!(req.uploaded_file.unwrap().filename, "a;b.pdf");
    }

    #[test]
    fn test_json_defaults() {
        let req = decode("application/json", br#"{"question": "What is RTI?"}"#).unwrap();
        assert_eq!(req.question, "What is RTI?");
        assert_eq!(req.user_type, "user");
        assert_eq!(req.legal_area, "General Law");
        assert_eq!(req.language, "English");
        assert!(req.prior_question.is_none());
        assert!(req.uploaded_file.is_none());
    }

    #[test]
    fn test_json_all_fields() {
        let req = decode(
            "application/json; charset=utf-8",
            br#"{"question":"Given more detail","history_pq":"What is FIR?","user_type":"advocate","legal_area":"IPC","selected_language":"Hindi"}"#,
        )
        .unwrap();
        assert_eq!(req.prior_question.as_deref(), Some("What is FIR?"));
        assert_eq!(req.user_type, "advocate");
        assert_eq!(req.legal_area, "IPC");
        assert_eq!(req.language, "Hindi");
    }

    #[test]
    fn test_json_null_fields_take_defaults() {
        let req = decode(
            "application/json",
            br#"{"question":"q","history_pq":null,"legal_area":null}"#,
        )
        .unwrap();
        assert!(req.prior_question.is_none());
        assert_eq!(req.legal_area, "General Law");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            decode("application/json", b"{not json").unwrap_err(),
            Error::InvalidJson(_)
        ));
        assert!(matches!(
            decode("application/json", b"[1, 2]").unwrap_err(),
            Error::InvalidJson(_)
        ));
        assert!(matches!(
            decode("application/json", br#"{"question": 42}"#).unwrap_err(),
            Error::InvalidJson(_)
        ));
    }
}
