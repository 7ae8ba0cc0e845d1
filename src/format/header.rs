//! XML header parsing.
//!
//! The file opens with a 4-byte length, that many bytes of UTF-16LE XML,
//! and a checksum field (skipped). The XML is a single `Dictionary` (mdx)
//! or `Library_Data` (mdd) element whose attributes configure everything
//! downstream: format version, text encoding, encryption bits, and key
//! adaptation.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::{Encoding, UTF_16LE};
use log::{debug, info};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::source::ByteSource;
use crate::types::error::{MdictError, Result};
use crate::types::models::{EncryptionFlags, KeyAdapter, MdictHeader, MdictVersion};

/// Upper bound on a plausible header region.
const MAX_HEADER_LEN: u32 = 16 * 1024 * 1024;

/// Reads and parses the header region.
///
/// Returns the parsed header and the offset of the first byte after it
/// (the start of the keyword summary).
pub fn parse(source: &dyn ByteSource) -> Result<(MdictHeader, u64)> {
    let head = source.read_vec(0, 4)?;
    let header_len = BigEndian::read_u32(&head);
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(MdictError::BadHeader(format!(
            "implausible header length: {} bytes",
            header_len
        )));
    }

    let header_bytes = source.read_vec(4, header_len as usize)?;
    // 4 checksum bytes follow the XML; recognized but never validated.
    let next_offset = 4 + u64::from(header_len) + 4;

    // The XML text is UTF-16LE regardless of the dictionary encoding.
    let trimmed = header_bytes
        .strip_suffix(&[0, 0])
        .unwrap_or(&header_bytes);
    let (decoded, _, _) = UTF_16LE.decode(trimmed);

    // Some files carry stray control characters in the XML; drop them.
    let sanitized: String = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let attributes = parse_dictionary_attributes(&sanitized)?;
    let header = build_header(attributes)?;
    info!(
        "header parsed: version={:?}, encoding={}, title={:?}",
        header.version,
        header.encoding.name(),
        header.title
    );
    Ok((header, next_offset))
}

/// Extracts the attributes of the `Dictionary` / `Library_Data` element.
fn parse_dictionary_attributes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                if name.as_ref() != b"Dictionary" && name.as_ref() != b"Library_Data" {
                    return Err(MdictError::BadHeader(format!(
                        "unexpected header element: {}",
                        String::from_utf8_lossy(name.as_ref())
                    )));
                }
                return e
                    .attributes()
                    .map(|attr_result| {
                        let attr = attr_result.map_err(|e| {
                            MdictError::BadHeader(format!("bad XML attribute: {}", e))
                        })?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                MdictError::BadHeader(format!("bad XML attribute value: {}", e))
                            })?
                            .into_owned();
                        Ok((key, value))
                    })
                    .collect();
            }
            Ok(Event::Eof) => {
                return Err(MdictError::BadHeader(
                    "no Dictionary element in header XML".to_string(),
                ))
            }
            Err(e) => {
                return Err(MdictError::BadHeader(format!(
                    "header XML parse failed: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

fn build_header(attributes: HashMap<String, String>) -> Result<MdictHeader> {
    let version_str = attributes
        .get("GeneratedByEngineVersion")
        .map(String::as_str)
        .unwrap_or("1.0");
    let version_num: f32 = version_str.parse().map_err(|e| {
        MdictError::BadHeader(format!(
            "bad GeneratedByEngineVersion {:?}: {}",
            version_str, e
        ))
    })?;
    let version = MdictVersion::try_from(version_num)?;

    let encoding = attributes
        .get("Encoding")
        .map(|label| normalize_encoding_label(label))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    debug!("text encoding: {}", encoding.name());

    let encrypted = attributes
        .get("Encrypted")
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let encryption = EncryptionFlags {
        header_encrypted: encrypted & 0x01 != 0,
        key_index_encrypted: encrypted & 0x02 != 0,
    };

    let adapter = KeyAdapter::from_attributes(&attributes);
    let title = attributes
        .get("Title")
        .cloned()
        .unwrap_or_else(|| "Untitled Dictionary".to_string());
    let description = attributes.get("Description").cloned();

    Ok(MdictHeader {
        version,
        encoding,
        encryption,
        adapter,
        title,
        description,
        attributes,
    })
}

/// Normalizes the non-standard encoding labels some files declare.
fn normalize_encoding_label(label: &str) -> &str {
    match label {
        "GBK" | "GB2312" => "GB18030",
        other => other,
    }
}
