//! Sequential iteration over dictionary keys.

use std::sync::Arc;

use crate::reader::Dictionary;
use crate::types::error::Result;
use crate::types::file_type::FileType;
use crate::types::models::KeyEntry;

/// Iterator over `(keyword, record_offset)` pairs in file order.
///
/// Decompresses one keyword block at a time through the reader's block
/// cache, so memory use stays bounded by the largest single block. Created
/// by [`Dictionary::iter_keys`].
pub struct KeysIterator<'a, T: FileType> {
    dict: &'a Dictionary<T>,
    next_block: usize,
    entries: Option<Arc<Vec<KeyEntry>>>,
    entry_index: usize,
}

impl<'a, T: FileType> KeysIterator<'a, T> {
    pub(crate) fn new(dict: &'a Dictionary<T>) -> Self {
        Self {
            dict,
            next_block: 0,
            entries: None,
            entry_index: 0,
        }
    }
}

impl<T: FileType> Iterator for KeysIterator<'_, T> {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entries) = &self.entries {
                if let Some(entry) = entries.get(self.entry_index) {
                    self.entry_index += 1;
                    return Some(Ok((entry.text.clone(), entry.record_offset)));
                }
            }

            if self.next_block >= self.dict.num_keyword_blocks() {
                return None;
            }
            match self.dict.load_key_block(self.next_block) {
                Ok(entries) => {
                    self.entries = Some(entries);
                    self.entry_index = 0;
                    self.next_block += 1;
                }
                Err(e) => {
                    // Skip the failing block on the following call instead
                    // of erroring forever.
                    self.next_block += 1;
                    return Some(Err(e));
                }
            }
        }
    }
}
