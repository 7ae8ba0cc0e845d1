//! Reader for MDict dictionary files.
//!
//! MDict ships dictionaries as a definition container (`.mdx`) plus
//! optional resource containers (`.mdd`) holding the images and audio the
//! definitions reference. Both share one on-disk layout: an XML header, a
//! compressed (and optionally encrypted) keyword index describing the
//! keyword blocks, and a directory of compressed record blocks. This crate
//! decodes that layout (v1 and v2 wire variants, zlib and LZO1x block
//! compression, UTF-8/UTF-16/legacy encodings) and answers keyword lookups
//! and prefix searches without materializing whole files: blocks are
//! fetched lazily from the underlying file and decompressed per query.
//!
//! # Example
//! ```no_run
//! use mdict_query::{Dictionary, Mdx};
//!
//! # fn main() -> mdict_query::Result<()> {
//! let dict = Dictionary::<Mdx>::open("example.mdx")?;
//! for definition in dict.lookup("cat")? {
//!     println!("{}", definition);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod format;
mod iter;
mod keyword_table;
mod reader;
mod scanner;
mod source;
pub mod types;

pub use iter::KeysIterator;
pub use keyword_table::{hash_key, murmur3_x86_32, KeywordTable};
pub use reader::{Dictionary, MAX_CANDIDATES};
pub use scanner::Scanner;
pub use source::{ByteSource, FileSource};
pub use types::error::{MdictError, Result};
pub use types::file_type::{normalize_resource_path, FileType, Mdd, Mdx};
pub use types::models::{
    EncryptionFlags, KeyAdapter, KeyEntry, KeyInfo, KeywordIndexEntry, MdictHeader, MdictVersion,
    RecordBlockMeta, RecordData,
};
