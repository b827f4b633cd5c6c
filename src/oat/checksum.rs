use std::fmt;

use crc32fast::Hasher;

/// Running CRC-32 over the header-covered bytes of an oat file, folded
/// in the order the layout pass first places them. Fixed once layout
/// completes; the emitter never touches it.
#[derive(Clone)]
pub struct OatChecksum
{
    hasher: Hasher,
}

impl OatChecksum
{
    pub fn new() -> OatChecksum
    {
        OatChecksum { hasher: Hasher::new() }
    }

    pub fn update(&mut self, bytes: &[u8])
    {
        self.hasher.update(bytes);
    }

    /// Current value; the accumulator stays usable.
    pub fn value(&self) -> u32
    {
        self.hasher.clone().finalize()
    }
}

impl Default for OatChecksum
{
    fn default() -> OatChecksum
    {
        OatChecksum::new()
    }
}

impl fmt::Debug for OatChecksum
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "OatChecksum({:#010x})", self.value())
    }
}
