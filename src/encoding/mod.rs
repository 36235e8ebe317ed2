//! Encoding detection and transcoding for fetched external resources.
//!
//! Implements BOM sniffing and XML declaration encoding detection per
//! XML 1.0 Section 4.3.3 and Appendix F, bridging to `encoding_rs` for
//! character encoding conversion. The fetch coordinator runs every external
//! subset and entity through this pipeline before handing the text to the
//! nested parse.
//!
//! # Encoding Detection Strategy
//!
//! 1. Check for a Byte Order Mark (BOM) at the start of the input.
//! 2. If a BOM is found, use the indicated encoding and skip the BOM bytes.
//! 3. If no BOM is found, default to UTF-8 (per the XML specification).
//! 4. After initial decoding, inspect the XML/text declaration's `encoding=`
//!    attribute to confirm or override the detected encoding.

use std::fmt;

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// The result of decoding an external resource: the UTF-8 text plus the
/// name of the encoding that was actually used.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The decoded content.
    pub text: String,
    /// IANA name of the encoding the bytes were read as.
    pub encoding: String,
}

/// Detects the encoding of an XML byte stream by inspecting the Byte Order Mark.
///
/// Returns a tuple of (encoding name, number of BOM bytes to skip). The encoding
/// name is an IANA charset name suitable for passing to `encoding_rs`.
///
/// Per XML 1.0 Appendix F, the BOM detection order is:
/// - `EF BB BF` -> UTF-8
/// - `FE FF`    -> UTF-16 BE
/// - `FF FE`    -> UTF-16 LE
/// - No BOM     -> UTF-8 (default per XML spec)
///
/// # Examples
///
/// ```
/// use treeoxide::encoding::detect_encoding;
///
/// let (enc, skip) = detect_encoding(b"\xEF\xBB\xBFhello");
/// assert_eq!(enc, "UTF-8");
/// assert_eq!(skip, 3);
///
/// let (enc, skip) = detect_encoding(b"<root/>");
/// assert_eq!(enc, "UTF-8");
/// assert_eq!(skip, 0);
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        ("UTF-8", 3)
    } else if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        ("UTF-16BE", 2)
    } else if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        ("UTF-16LE", 2)
    } else {
        ("UTF-8", 0)
    }
}

/// Transcodes a byte slice from the named encoding into a UTF-8 `String`.
///
/// Uses `encoding_rs::Encoding::for_label` to look up the encoding by its IANA
/// name (case-insensitive).
///
/// # Errors
///
/// Returns `EncodingError` if the encoding name is not recognized or if
/// transcoding fails due to malformed input bytes.
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(encoding_name.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {encoding_name}")))?;

    let (result, _used_encoding, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {encoding_name}"
        )));
    }
    Ok(result.into_owned())
}

/// Decodes raw XML bytes into UTF-8, automatically detecting the encoding.
///
/// This implements the detection pipeline from XML 1.0 Section 4.3.3:
///
/// 1. Detect the BOM and determine the initial encoding.
/// 2. If the encoding is UTF-8, validate and return the bytes as a string.
/// 3. If non-UTF-8, transcode using `encoding_rs`.
/// 4. After the initial decode, check the XML/text declaration's `encoding=`
///    attribute. If it specifies a different encoding than what the BOM
///    indicated, re-decode from the original bytes using the declared one.
///
/// # Errors
///
/// Returns `EncodingError` if the bytes contain invalid sequences for the
/// detected encoding or if the declared encoding is unsupported.
///
/// # Examples
///
/// ```
/// use treeoxide::encoding::decode_to_utf8;
///
/// let xml = b"<?xml version=\"1.0\"?><root/>";
/// let decoded = decode_to_utf8(xml).unwrap();
/// assert!(decoded.text.contains("<root/>"));
/// assert_eq!(decoded.encoding, "UTF-8");
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<Decoded, EncodingError> {
    let (bom_encoding, bom_skip) = detect_encoding(bytes);
    let content_bytes = &bytes[bom_skip..];

    // Fast path: if the BOM says UTF-8 (or no BOM, which defaults to UTF-8),
    // try to validate directly without transcoding.
    if bom_encoding == "UTF-8" {
        if let Ok(s) = std::str::from_utf8(content_bytes) {
            // Valid UTF-8. Check for an encoding declaration that might
            // indicate a different encoding (unusual but permitted).
            if let Some(declared) = extract_xml_decl_encoding(s) {
                let declared_upper = declared.to_ascii_uppercase();
                if !is_utf8_label(&declared_upper) {
                    return Ok(Decoded {
                        text: transcode(content_bytes, &declared)?,
                        encoding: declared,
                    });
                }
            }
            return Ok(Decoded {
                text: s.to_string(),
                encoding: "UTF-8".to_string(),
            });
        }
        // Not valid UTF-8 and no BOM. The XML declaration is required to be
        // in ASCII-compatible bytes, so scan the raw bytes for an encoding=
        // attribute. If found, transcode with the declared encoding;
        // otherwise the input is genuinely malformed UTF-8.
        if let Some(declared) = extract_encoding_from_ascii_bytes(content_bytes) {
            return Ok(Decoded {
                text: transcode(content_bytes, &declared)?,
                encoding: declared,
            });
        }
        return Err(EncodingError::new("input is not valid UTF-8"));
    }

    // Non-UTF-8 BOM encoding: transcode first, then check for a declaration.
    let initial_text = transcode(content_bytes, bom_encoding)?;

    if let Some(declared) = extract_xml_decl_encoding(&initial_text) {
        let declared_upper = declared.to_ascii_uppercase();
        let bom_upper = bom_encoding.to_ascii_uppercase();

        let effectively_same = declared_upper == bom_upper
            || (is_utf8_label(&declared_upper) && is_utf8_label(&bom_upper))
            // "UTF-16" is compatible with both "UTF-16BE" and "UTF-16LE" —
            // the BOM determines the actual byte order.
            || (declared_upper == "UTF-16"
                && (bom_upper == "UTF-16BE" || bom_upper == "UTF-16LE"));

        if !effectively_same {
            return Ok(Decoded {
                text: transcode(content_bytes, &declared)?,
                encoding: declared,
            });
        }
    }

    Ok(Decoded {
        text: initial_text,
        encoding: bom_encoding.to_string(),
    })
}

/// Strips a leading XML/text declaration (`<?xml ... ?>`) from decoded
/// external-resource content.
///
/// The declaration describes the transport of the resource (version,
/// encoding) and is not part of its replacement text, so the fetch
/// coordinator removes it before storing entity content.
///
/// # Examples
///
/// ```
/// use treeoxide::encoding::strip_text_decl;
///
/// let text = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>payload";
/// assert_eq!(strip_text_decl(text), "payload");
/// assert_eq!(strip_text_decl("no declaration"), "no declaration");
/// ```
#[must_use]
pub fn strip_text_decl(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("<?xml") {
        // A whitespace byte must follow the target, so PI targets that
        // merely start with "xml" (e.g., <?xml-stylesheet ...?>) survive.
        if rest.starts_with([' ', '\t', '\r', '\n']) {
            if let Some(end) = rest.find("?>") {
                return &rest[end + 2..];
            }
        }
    }
    text
}

/// Extracts the `encoding` attribute value from an XML or text declaration.
///
/// Lightweight scan for `encoding="..."` or `encoding='...'` without running
/// a full parse. Returns `None` if no declaration or no encoding attribute
/// is found.
fn extract_xml_decl_encoding(text: &str) -> Option<String> {
    // Only look at the beginning of the document, up to the end of the decl.
    let decl_end = text.find("?>")?;
    let decl = &text[..decl_end];

    if !decl.starts_with("<?xml") {
        return None;
    }

    let enc_pos = decl.find("encoding")?;
    let after_enc = &decl[enc_pos + "encoding".len()..];

    let after_enc = after_enc.trim_start();
    let after_enc = after_enc.strip_prefix('=')?;
    let after_enc = after_enc.trim_start();

    let quote = after_enc.as_bytes().first().copied()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let after_quote = &after_enc[1..];
    let end = after_quote.find(quote as char)?;
    Some(after_quote[..end].to_string())
}

/// Extracts the `encoding` attribute from raw bytes by treating them as ASCII.
///
/// Used as a fallback when the input is not valid UTF-8 and has no BOM. The
/// XML declaration must be in ASCII-compatible characters, so the bytes can
/// be scanned directly.
fn extract_encoding_from_ascii_bytes(bytes: &[u8]) -> Option<String> {
    // Only scan up to a reasonable limit for the declaration.
    let limit = bytes.len().min(200);
    let scan = &bytes[..limit];

    if !scan.starts_with(b"<?xml") {
        return None;
    }

    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];

    let enc_needle = b"encoding";
    let enc_pos = decl
        .windows(enc_needle.len())
        .position(|w| w == enc_needle)?;
    let after_enc = &decl[enc_pos + enc_needle.len()..];

    let after_enc = skip_ascii_whitespace(after_enc);
    if after_enc.first() != Some(&b'=') {
        return None;
    }
    let after_eq = skip_ascii_whitespace(&after_enc[1..]);

    let quote = *after_eq.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let after_quote = &after_eq[1..];
    let end = after_quote.iter().position(|&b| b == quote)?;
    let encoding_bytes = &after_quote[..end];

    // The encoding name must be ASCII
    if encoding_bytes.iter().all(u8::is_ascii) {
        Some(String::from_utf8_lossy(encoding_bytes).into_owned())
    } else {
        None
    }
}

/// Skips leading ASCII whitespace bytes (space, tab, CR, LF).
fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t' || b == b'\r' || b == b'\n')
        .count();
    &bytes[skip..]
}

/// Returns `true` if the label is a recognized alias for UTF-8.
fn is_utf8_label(label: &str) -> bool {
    matches!(label, "UTF-8" | "UTF8")
}
