use crate::compiler::InstructionSet;
use crate::oat::checksum::OatChecksum;
use crate::oat::PAGE_SIZE;

pub const OAT_MAGIC: [u8; 4] = *b"oat\n";
pub const OAT_VERSION: [u8; 4] = *b"004\0";

/// Fixed-layout prefix of an oat file. The image location string is
/// appended immediately after the fixed fields.
///
/// The header owns the running checksum: layout folds directory
/// entries, class entries and first-placed blobs into it, and the final
/// value is serialized with the header itself.
#[derive(Debug)]
pub struct OatHeader
{
    instruction_set: InstructionSet,
    dex_file_count: u32,
    executable_offset: u32,
    image_file_location_checksum: u32,
    image_file_location_begin: u32,
    image_file_location: String,
    checksum: OatChecksum,
}

impl OatHeader
{
    /// Serialized size of the fixed fields, excluding the location string.
    pub const FIXED_SIZE: u32 = 36;

    pub fn new(
        instruction_set: InstructionSet,
        dex_file_count: u32,
        image_file_location_checksum: u32,
        image_file_location_begin: u32,
        image_file_location: &str,
    ) -> OatHeader
    {
        OatHeader {
            instruction_set,
            dex_file_count,
            executable_offset: 0,
            image_file_location_checksum,
            image_file_location_begin,
            image_file_location: image_file_location.to_string(),
            checksum: OatChecksum::new(),
        }
    }

    /// Serialized size including the appended location string.
    pub fn size(&self) -> u32
    {
        Self::FIXED_SIZE + self.image_file_location.len() as u32
    }

    pub fn image_file_location(&self) -> &str
    {
        &self.image_file_location
    }

    pub fn executable_offset(&self) -> u32
    {
        self.executable_offset
    }

    pub fn set_executable_offset(&mut self, offset: u32)
    {
        debug_assert_eq!(offset % PAGE_SIZE, 0);
        self.executable_offset = offset;
    }

    pub fn update_checksum(&mut self, bytes: &[u8])
    {
        self.checksum.update(bytes);
    }

    pub fn checksum(&self) -> u32
    {
        self.checksum.value()
    }

    /// The fixed fields in file order; the caller appends the location
    /// string.
    pub fn to_bytes(&self) -> Vec<u8>
    {
        let mut bytes = Vec::with_capacity(Self::FIXED_SIZE as usize);
        bytes.extend_from_slice(&OAT_MAGIC);
        bytes.extend_from_slice(&OAT_VERSION);
        bytes.extend_from_slice(&self.checksum.value().to_le_bytes());
        bytes.extend_from_slice(&self.instruction_set.as_u32().to_le_bytes());
        bytes.extend_from_slice(&self.dex_file_count.to_le_bytes());
        bytes.extend_from_slice(&self.executable_offset.to_le_bytes());
        bytes.extend_from_slice(&self.image_file_location_checksum.to_le_bytes());
        bytes.extend_from_slice(&self.image_file_location_begin.to_le_bytes());
        bytes.extend_from_slice(&(self.image_file_location.len() as u32).to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn fixed_fields_serialize_in_order()
    {
        let mut header = OatHeader::new(InstructionSet::Thumb2, 2, 0xcafe, 0x7000_0000, "/system/framework/boot.art");
        header.set_executable_offset(PAGE_SIZE);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len() as u32, OatHeader::FIXED_SIZE);
        assert_eq!(&bytes[0..4], b"oat\n");
        assert_eq!(&bytes[4..8], b"004\0");
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 2); // thumb2
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 2); // dex count
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), PAGE_SIZE);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 0xcafe);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 0x7000_0000);
        assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 26);
        assert_eq!(header.size(), OatHeader::FIXED_SIZE + 26);
    }

    #[test]
    fn checksum_lands_in_header_bytes()
    {
        let mut header = OatHeader::new(InstructionSet::X86, 1, 0, 0, "");
        header.update_checksum(&[1, 2, 3]);
        let bytes = header.to_bytes();
        assert_eq!(
            u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            crc32fast::hash(&[1, 2, 3])
        );
    }
}
