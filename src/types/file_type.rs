//! Specialization logic for the two MDict container types (.mdx vs .mdd).

use encoding_rs::{Encoding, UTF_16LE};

use super::error::Result;
use super::models::RecordData;

/// Marker for internal redirects, stored at the start of a record.
const REDIRECT_PREFIX: &str = "@@@LINK=";

/// A trait that defines the behavior of a specific MDict container type.
///
/// The two containers share one on-disk layout; they differ in what a record
/// payload means (definition text vs raw resource bytes), in the encoding
/// used for keys, and in how queries are normalized.
pub trait FileType {
    /// Short name used for logging.
    const DEBUG_NAME: &'static str;

    /// Mandatory key/record encoding for this container, overriding the
    /// header attribute when set.
    const ENCODING_OVERRIDE: Option<&'static Encoding>;

    /// Whether queries are resource paths that normalize to `\`-rooted form.
    const PATH_QUERIES: bool;

    /// The record payload type: `String` for mdx, `Vec<u8>` for mdd.
    type Record;

    /// Materializes raw record bytes, detecting `@@@LINK=` redirects.
    fn process_record(bytes: &[u8], encoding: &'static Encoding) -> Result<RecordData<Self::Record>>;
}

/// Zero-cost marker for definition containers (.mdx).
#[derive(Debug)]
pub struct Mdx;

impl FileType for Mdx {
    const DEBUG_NAME: &'static str = "mdx";
    const ENCODING_OVERRIDE: Option<&'static Encoding> = None;
    const PATH_QUERIES: bool = false;
    type Record = String;

    fn process_record(bytes: &[u8], encoding: &'static Encoding) -> Result<RecordData<String>> {
        let (text, _, _) = encoding.decode(bytes);
        let content = text.trim_end_matches('\0');

        if let Some(target) = content.strip_prefix(REDIRECT_PREFIX) {
            return Ok(RecordData::Redirect(target.trim().to_string()));
        }

        Ok(RecordData::Content(content.to_string()))
    }
}

/// Zero-cost marker for resource containers (.mdd).
#[derive(Debug)]
pub struct Mdd;

impl FileType for Mdd {
    const DEBUG_NAME: &'static str = "mdd";
    // Resource keys are paths and always UTF-16LE, whatever the header says.
    const ENCODING_OVERRIDE: Option<&'static Encoding> = Some(UTF_16LE);
    const PATH_QUERIES: bool = true;
    type Record = Vec<u8>;

    fn process_record(bytes: &[u8], encoding: &'static Encoding) -> Result<RecordData<Vec<u8>>> {
        // Redirects also occur in resource containers, encoded like the keys.
        let redirect_pattern: Vec<u8> = if encoding == UTF_16LE {
            REDIRECT_PREFIX.bytes().flat_map(|b| [b, 0u8]).collect()
        } else {
            REDIRECT_PREFIX.bytes().collect()
        };

        if bytes.starts_with(&redirect_pattern) {
            let (target, _, _) = encoding.decode(&bytes[redirect_pattern.len()..]);
            let target = target.trim_end_matches('\0').trim().to_string();
            return Ok(RecordData::Redirect(target));
        }

        Ok(RecordData::Content(bytes.to_vec()))
    }
}

/// Canonical `\`-rooted form of a resource path query.
///
/// `/img/a.png`, `\img\a.png`, and `img/a.png` all map to `\img\a.png`,
/// the form resource keys are stored in.
pub fn normalize_resource_path(query: &str) -> String {
    let backslashed = query.replace('/', "\\");
    let trimmed = backslashed.trim_start_matches('\\');
    format!("\\{}", trimmed)
}
