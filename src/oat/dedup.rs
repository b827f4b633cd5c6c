use std::collections::HashMap;

/// Content-keyed map from blob bytes to the absolute file offset where
/// those bytes were first placed.
///
/// Keying on content rather than buffer identity keeps offsets stable
/// when the compiler hands out fresh allocations for identical blobs.
/// One table exists per blob kind, except that invoke and proxy stubs
/// share the method-code table, so a stub whose bytes coincide with a
/// method's code shares its offset.
#[derive(Debug, Default)]
pub struct DedupTable
{
    offsets: HashMap<Vec<u8>, u32>,
}

impl DedupTable
{
    pub fn get(&self, bytes: &[u8]) -> Option<u32>
    {
        self.offsets.get(bytes).copied()
    }

    /// Records the first placement of `bytes`. Only the layout pass
    /// inserts; the write pass is read-only against the table.
    pub fn insert(&mut self, bytes: Vec<u8>, offset: u32)
    {
        debug_assert!(!self.offsets.contains_key(&bytes));
        self.offsets.insert(bytes, offset);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize
    {
        self.offsets.len()
    }
}
