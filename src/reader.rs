//! The dictionary reader: open, lookup, and prefix search.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info, trace};

use crate::format::record_index::RecordDirectory;
use crate::format::{content, header, key_index, record_index};
use crate::iter::KeysIterator;
use crate::keyword_table::{self, KeywordTable};
use crate::source::{ByteSource, FileSource};
use crate::types::error::{MdictError, Result};
use crate::types::file_type::{normalize_resource_path, FileType, Mdx};
use crate::types::models::{
    KeyEntry, KeyInfo, KeywordIndexEntry, MdictHeader, RecordBlockMeta, RecordData,
};

/// Longest `@@@LINK=` chain followed before giving up.
const MAX_LINK_DEPTH: usize = 8;

/// Most candidates returned by [`Dictionary::search`].
pub const MAX_CANDIDATES: usize = 64;

/// An open MDict container.
///
/// The type parameter selects the container semantics: [`Mdx`] yields
/// definition text, [`Mdd`](crate::Mdd) yields raw resource bytes.
///
/// Opening parses the header and both block directories; record and keyword
/// blocks are fetched lazily per query, so large files never have to fit in
/// memory. All directories are immutable after open, which makes concurrent
/// lookups safe; the single-slot keyword-block cache and the file handle
/// are mutex-guarded.
pub struct Dictionary<T: FileType> {
    source: Box<dyn ByteSource>,
    header: MdictHeader,
    keyword_dir: Vec<KeywordIndexEntry>,
    num_entries: u64,
    record_dir: RecordDirectory,
    keyword_table: Option<KeywordTable>,
    // Last decompressed keyword block, parsed. Prefix scans hit it hard.
    key_block_cache: Mutex<Option<(usize, Arc<Vec<KeyEntry>>)>>,
    _file_type: PhantomData<T>,
}

impl<T: FileType> Dictionary<T> {
    /// Opens and parses a dictionary file.
    ///
    /// The parse reads the head, header, keyword summary, keyword index,
    /// record summary, and record-block index, in that order; keyword and
    /// record blocks stay on disk until a query needs them.
    ///
    /// # Errors
    /// [`MdictError::BadHeader`] for files that are not v1/v2 MDict,
    /// [`MdictError::Decryption`] when `Encrypted` bit 0 is set, and
    /// [`MdictError::MalformedBlock`] / [`MdictError::Io`] for structural
    /// damage. Parse errors are terminal; lookup errors later are not.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening {} file: {}", T::DEBUG_NAME, path.display());
        Self::from_source(Box::new(FileSource::open(path)?))
    }

    /// Opens a dictionary over any random-access byte source.
    pub fn from_source(source: Box<dyn ByteSource>) -> Result<Self> {
        let (mut hdr, keyword_offset) = header::parse(source.as_ref())?;

        if hdr.encryption.header_encrypted {
            return Err(MdictError::Decryption);
        }
        if let Some(encoding) = T::ENCODING_OVERRIDE {
            hdr.encoding = encoding;
        }

        let keyword = key_index::parse(source.as_ref(), &hdr, keyword_offset)?;
        let record_dir =
            record_index::parse(source.as_ref(), &hdr, keyword.end_offset, keyword.num_entries)?;

        info!(
            "{} ready: {} entries, {} keyword blocks, {} record blocks",
            T::DEBUG_NAME,
            keyword.num_entries,
            keyword.entries.len(),
            record_dir.blocks().len()
        );

        Ok(Self {
            source,
            header: hdr,
            keyword_dir: keyword.entries,
            num_entries: keyword.num_entries,
            record_dir,
            keyword_table: None,
            key_block_cache: Mutex::new(None),
            _file_type: PhantomData,
        })
    }

    // --- metadata ---

    pub fn header(&self) -> &MdictHeader {
        &self.header
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    /// The header's `Description` attribute, or `""` when absent.
    pub fn description(&self) -> &str {
        self.header.description.as_deref().unwrap_or("")
    }

    /// The raw attribute map from the XML header.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.header.attributes
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    pub fn num_keyword_blocks(&self) -> usize {
        self.keyword_dir.len()
    }

    pub fn num_record_blocks(&self) -> usize {
        self.record_dir.blocks().len()
    }

    /// The keyword-block directory, ordered by first word.
    pub fn keyword_blocks(&self) -> &[KeywordIndexEntry] {
        &self.keyword_dir
    }

    /// The record-block directory, ordered by offset.
    pub fn record_blocks(&self) -> &[RecordBlockMeta] {
        self.record_dir.blocks()
    }

    /// Returns an iterator over all `(keyword, record_offset)` pairs.
    pub fn iter_keys(&self) -> KeysIterator<'_, T> {
        KeysIterator::new(self)
    }

    // --- express mode ---

    /// Builds the keyword hash table by reading every keyword block once.
    ///
    /// Until this runs, lookups binary-search the keyword directory and
    /// scan one block per query (scan mode); afterwards they go through the
    /// in-memory table (express mode). Idempotent.
    pub fn load_keyword_table(&mut self) -> Result<()> {
        if self.keyword_table.is_some() {
            return Ok(());
        }
        debug!("building keyword table for {} entries", self.num_entries);

        let mut table = KeywordTable::with_capacity(self.num_entries as usize);
        for block_index in 0..self.keyword_dir.len() {
            let entries = self.load_key_block(block_index)?;
            for entry in entries.iter() {
                let hash = keyword_table::hash_key(&self.header.adapt(&entry.text));
                table.push(hash, entry.record_offset);
            }
        }
        if table.len() as u64 != self.num_entries {
            return Err(MdictError::MalformedBlock(format!(
                "keyword blocks hold {} entries but the summary declares {}",
                table.len(),
                self.num_entries
            )));
        }
        table.sort();
        self.keyword_table = Some(table);
        Ok(())
    }

    /// Whether lookups run against the in-memory keyword table.
    pub fn is_express(&self) -> bool {
        self.keyword_table.is_some()
    }

    // --- lookup ---

    /// Looks up a phrase and returns every matching record.
    ///
    /// Multiple results occur for homographs (the same keyword stored more
    /// than once). `@@@LINK=` redirects are followed transparently, up to
    /// [`MdictError::LinkCycle`] at depth 8.
    pub fn lookup(&self, phrase: &str) -> Result<Vec<T::Record>> {
        self.lookup_at_depth(phrase, 0)
    }

    /// Looks up a phrase, keeping only the candidate at `record_offset`.
    ///
    /// Disambiguates homographs previously enumerated through
    /// [`iter_keys`](Self::iter_keys) or a broad [`lookup`](Self::lookup).
    pub fn lookup_at_offset(&self, phrase: &str, record_offset: u64) -> Result<T::Record> {
        let adapted = self.adapt_query(phrase);
        let keyinfos = self.find_keyinfos(&adapted)?;
        let keyinfo = keyinfos
            .into_iter()
            .find(|info| info.record_offset == record_offset)
            .ok_or_else(|| MdictError::NotFound(phrase.to_string()))?;

        match self.extract_record(keyinfo)? {
            RecordData::Content(record) => Ok(record),
            RecordData::Redirect(target) => {
                let mut records = self.lookup_at_depth(&target, 1)?;
                // lookup_at_depth never returns an empty Ok
                Ok(records.swap_remove(0))
            }
        }
    }

    fn lookup_at_depth(&self, phrase: &str, depth: usize) -> Result<Vec<T::Record>> {
        if depth > MAX_LINK_DEPTH {
            return Err(MdictError::LinkCycle(MAX_LINK_DEPTH));
        }

        let adapted = self.adapt_query(phrase);
        trace!("lookup {:?} (adapted {:?})", phrase, adapted);
        let keyinfos = self.find_keyinfos(&adapted)?;
        if keyinfos.is_empty() {
            return Err(MdictError::NotFound(phrase.to_string()));
        }

        let mut records = Vec::with_capacity(keyinfos.len());
        for keyinfo in keyinfos {
            match self.extract_record(keyinfo)? {
                RecordData::Content(record) => records.push(record),
                RecordData::Redirect(target) => {
                    debug!("{:?} redirects to {:?}", phrase, target);
                    records.extend(self.lookup_at_depth(&target, depth + 1)?);
                }
            }
        }
        Ok(records)
    }

    fn adapt_query(&self, phrase: &str) -> String {
        if T::PATH_QUERIES {
            self.header.adapt(&normalize_resource_path(phrase))
        } else {
            self.header.adapt(phrase)
        }
    }

    fn find_keyinfos(&self, adapted: &str) -> Result<Vec<KeyInfo>> {
        if adapted.is_empty() {
            return Ok(Vec::new());
        }
        match &self.keyword_table {
            Some(table) => self.find_express(table, adapted),
            None => self.find_scan(adapted),
        }
    }

    /// Express-mode candidate search: hash the query, then verify every hit
    /// against its true key, since distinct keys can share a hash.
    fn find_express(&self, table: &KeywordTable, adapted: &str) -> Result<Vec<KeyInfo>> {
        let hash = keyword_table::hash_key(adapted);
        let mut out = Vec::new();
        for (ordinal, keyinfo) in table.find(hash) {
            let key = self.key_at_ordinal(ordinal)?;
            if self.header.adapt(&key) == adapted {
                out.push(keyinfo);
            } else {
                trace!(
                    "hash collision: ordinal {} holds {:?}, wanted {:?}",
                    ordinal,
                    key,
                    adapted
                );
            }
        }
        Ok(out)
    }

    /// Scan-mode candidate search: binary-search the keyword directory for
    /// the block whose word range covers the query, then read that block.
    fn find_scan(&self, adapted: &str) -> Result<Vec<KeyInfo>> {
        let Some(first_block) = self.locate_keyword_block(adapted) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        let mut block_index = first_block;
        loop {
            let entries = self.load_key_block(block_index)?;
            for (i, entry) in entries.iter().enumerate() {
                if self.header.adapt(&entry.text) == adapted {
                    out.push(self.keyinfo_at(block_index, &entries, i)?);
                }
            }
            block_index += 1;
            // A run of homographs may continue into the next block.
            match self.keyword_dir.get(block_index) {
                Some(next) if self.header.adapt(&next.first_word) == adapted => {}
                _ => break,
            }
        }
        Ok(out)
    }

    /// The block whose `[first_word, last_word]` range contains `adapted`,
    /// if any.
    fn locate_keyword_block(&self, adapted: &str) -> Option<usize> {
        let index = self
            .keyword_dir
            .partition_point(|entry| self.header.adapt(&entry.last_word).as_str() < adapted);
        let entry = self.keyword_dir.get(index)?;
        if self.header.adapt(&entry.first_word).as_str() <= adapted {
            Some(index)
        } else {
            None
        }
    }

    /// Keyinfo for entry `i` of keyword block `block_index`: the size is
    /// the distance to the next entry's offset, peeking into the following
    /// block when `i` closes this one. Only the file's final record has no
    /// successor and carries `size: None`.
    fn keyinfo_at(&self, block_index: usize, entries: &[KeyEntry], i: usize) -> Result<KeyInfo> {
        let record_offset = entries[i].record_offset;
        let next_offset = match entries.get(i + 1) {
            Some(next) => Some(next.record_offset),
            None if block_index + 1 < self.keyword_dir.len() => self
                .load_key_block(block_index + 1)?
                .first()
                .map(|entry| entry.record_offset),
            None => None,
        };
        let size = next_offset
            .map(|next| {
                next.checked_sub(record_offset).ok_or_else(|| {
                    MdictError::MalformedBlock(
                        "record offsets are not monotonic across keyword entries".to_string(),
                    )
                })
            })
            .transpose()?;
        Ok(KeyInfo {
            record_offset,
            size,
        })
    }

    /// The stored keyword at a dense ordinal, served through the block cache.
    fn key_at_ordinal(&self, ordinal: u64) -> Result<String> {
        let index = self
            .keyword_dir
            .partition_point(|entry| entry.first_ordinal <= ordinal);
        let index = index.checked_sub(1).ok_or_else(|| {
            MdictError::MalformedBlock(format!("ordinal {} before the first keyword block", ordinal))
        })?;
        let block = &self.keyword_dir[index];
        let entries = self.load_key_block(index)?;
        entries
            .get((ordinal - block.first_ordinal) as usize)
            .map(|entry| entry.text.clone())
            .ok_or_else(|| {
                MdictError::MalformedBlock(format!(
                    "ordinal {} beyond keyword block {}",
                    ordinal, index
                ))
            })
    }

    /// Reads, decodes, and parses a keyword block, through the one-slot cache.
    pub(crate) fn load_key_block(&self, index: usize) -> Result<Arc<Vec<KeyEntry>>> {
        {
            let cache = self
                .key_block_cache
                .lock()
                .map_err(|_| MdictError::LockPoisoned)?;
            if let Some((cached_index, entries)) = cache.as_ref() {
                if *cached_index == index {
                    trace!("keyword block {} served from cache", index);
                    return Ok(Arc::clone(entries));
                }
            }
        }

        let meta = self.keyword_dir.get(index).ok_or_else(|| {
            MdictError::MalformedBlock(format!("keyword block index {} out of range", index))
        })?;
        let raw = self
            .source
            .read_vec(meta.file_offset, meta.compressed_size as usize)?;
        let data = content::decode_block(&raw, meta.decompressed_size)?;
        let entries = Arc::new(content::parse_key_entries(&data, &self.header)?);

        let mut cache = self
            .key_block_cache
            .lock()
            .map_err(|_| MdictError::LockPoisoned)?;
        *cache = Some((index, Arc::clone(&entries)));
        Ok(entries)
    }

    /// Fetches and decodes the record block containing `keyinfo`, slices the
    /// record out, and materializes it for this container type.
    fn extract_record(&self, keyinfo: KeyInfo) -> Result<RecordData<T::Record>> {
        let (block_no, meta) = self.record_dir.find(keyinfo.record_offset).ok_or_else(|| {
            MdictError::MalformedBlock(format!(
                "record offset {} outside the record stream",
                keyinfo.record_offset
            ))
        })?;
        trace!(
            "record at {} found in block {} (file offset {})",
            keyinfo.record_offset,
            block_no,
            meta.file_offset
        );

        let raw = self
            .source
            .read_vec(meta.file_offset, meta.compressed_size as usize)?;
        let data = content::decode_block(&raw, meta.decompressed_size)?;
        let slice = content::record_slice(
            &data,
            keyinfo.record_offset - meta.decompressed_offset,
            keyinfo.size,
        )?;
        T::process_record(slice, self.header.encoding)
    }
}

impl Dictionary<Mdx> {
    /// Returns up to [`MAX_CANDIDATES`] consecutive keywords starting at the
    /// first key that is `>= phrase` after adaptation.
    ///
    /// The result is a contiguous window of the dictionary's key order, so
    /// prefix completions come back in one call.
    pub fn search(&self, phrase: &str) -> Result<Vec<String>> {
        let adapted = self.header.adapt(phrase);
        trace!("search {:?} (adapted {:?})", phrase, adapted);

        // First block that can hold a key >= the query.
        let mut block_index = self
            .keyword_dir
            .partition_point(|entry| self.header.adapt(&entry.last_word) < adapted);
        if block_index >= self.keyword_dir.len() {
            return Ok(Vec::new());
        }

        let mut entries = self.load_key_block(block_index)?;
        let mut index = entries.partition_point(|entry| self.header.adapt(&entry.text) < adapted);
        // Keys ending in '-' or a trailing space can sort below their
        // stripped neighbors, so peek backwards until the run of keys
        // >= the query truly starts.
        while index > 0 && self.header.adapt(&entries[index - 1].text) >= adapted {
            index -= 1;
        }

        let mut out = Vec::new();
        loop {
            while index < entries.len() && out.len() < MAX_CANDIDATES {
                out.push(entries[index].text.clone());
                index += 1;
            }
            if out.len() >= MAX_CANDIDATES {
                break;
            }
            block_index += 1;
            if block_index >= self.keyword_dir.len() {
                break;
            }
            entries = self.load_key_block(block_index)?;
            index = 0;
        }
        Ok(out)
    }
}
