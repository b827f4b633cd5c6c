/* Dex container structures, trimmed to what an oat file needs from its inputs. */

use adler::adler32_slice;
use cesu8::from_java_cesu8;

use crate::dex::error::DexError;
use crate::dex::Reader;

/* Constants */
pub const DEX_FILE_MAGIC: [u8; 4] = [0x64, 0x65, 0x78, 0x0a];
pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const NO_INDEX: u32 = 0xffffffff;
pub const HEADER_SIZE: usize = 0x70;

/* Access flags */
pub const ACC_PUBLIC: u32 = 0x1;
pub const ACC_PRIVATE: u32 = 0x2;
pub const ACC_PROTECTED: u32 = 0x4;
pub const ACC_STATIC: u32 = 0x8;
pub const ACC_FINAL: u32 = 0x10;
pub const ACC_NATIVE: u32 = 0x100;
pub const ACC_INTERFACE: u32 = 0x200;
pub const ACC_ABSTRACT: u32 = 0x400;
pub const ACC_CONSTRUCTOR: u32 = 0x10000;

/// How a method declaration is dispatched at a call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeType
{
    Static,
    Direct,
    Virtual,
    Super,
    Interface,
}

/// The fixed 0x70-byte dex header.
#[derive(Debug, PartialEq, Eq)]
pub struct Header
{
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header
{
    fn read(r: &mut Reader) -> Result<Header, DexError>
    {
        let magic = <[u8; 8]>::try_from(r.take(8)?).unwrap();
        if magic[..4] != DEX_FILE_MAGIC
        {
            fail!("invalid dex magic {:02x?}", &magic[..4]);
        }
        let header = Header {
            magic,
            checksum: r.u32()?,
            signature: <[u8; 20]>::try_from(r.take(20)?).unwrap(),
            file_size: r.u32()?,
            header_size: r.u32()?,
            endian_tag: r.u32()?,
            link_size: r.u32()?,
            link_off: r.u32()?,
            map_off: r.u32()?,
            string_ids_size: r.u32()?,
            string_ids_off: r.u32()?,
            type_ids_size: r.u32()?,
            type_ids_off: r.u32()?,
            proto_ids_size: r.u32()?,
            proto_ids_off: r.u32()?,
            field_ids_size: r.u32()?,
            field_ids_off: r.u32()?,
            method_ids_size: r.u32()?,
            method_ids_off: r.u32()?,
            class_defs_size: r.u32()?,
            class_defs_off: r.u32()?,
            data_size: r.u32()?,
            data_off: r.u32()?,
        };
        if header.endian_tag != ENDIAN_CONSTANT
        {
            fail!("unsupported endian tag {:#010x}", header.endian_tag);
        }
        Ok(header)
    }
}

/// A dex string entry, decoded from MUTF-8 where possible.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DexString
{
    Decoded(String),
    Raw(u32, Vec<u8>),
}

impl DexString
{
    fn read(r: &mut Reader) -> Result<DexString, DexError>
    {
        let utf16_size = r.uleb128()?;
        let data = r.cstr()?;
        Ok(match from_java_cesu8(data)
        {
            Ok(decoded) => DexString::Decoded(decoded.to_string()),
            _ => DexString::Raw(utf16_size, data.to_vec()),
        })
    }

    fn as_str(&self) -> Option<&str>
    {
        match self
        {
            DexString::Decoded(s) => Some(s),
            DexString::Raw(_, _) => None,
        }
    }
}

/// The proto_id_item fields the writer consumes (parameter lists are skipped).
#[derive(Debug)]
pub struct ProtoItem
{
    pub shorty_idx: u32,
    pub return_type_idx: u32,
}

/// The method_id_item struct.
#[derive(Debug)]
pub struct MethodItem
{
    pub class_idx: u32,
    pub proto_idx: u32,
    pub name_idx: u32,
}

#[derive(Debug)]
pub struct EncodedField
{
    pub field_idx: u32,
    pub access_flags: u32,
}

#[derive(Debug)]
pub struct EncodedMethod
{
    pub method_idx: u32,
    pub access_flags: u32,
}

impl EncodedMethod
{
    pub fn is_static(&self) -> bool
    {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool
    {
        self.access_flags & ACC_NATIVE != 0
    }

    pub fn is_constructor(&self) -> bool
    {
        self.access_flags & ACC_CONSTRUCTOR != 0
    }

    /// Invoke type at the declaration site. `Super` only arises at call
    /// sites, never here.
    pub fn invoke_type(&self, is_direct: bool, class_access_flags: u32) -> InvokeType
    {
        if is_direct
        {
            if self.is_static() { InvokeType::Static } else { InvokeType::Direct }
        }
        else if class_access_flags & ACC_INTERFACE != 0
        {
            InvokeType::Interface
        }
        else
        {
            InvokeType::Virtual
        }
    }
}

/// Parsed class_data_item: fields first, then direct and virtual methods,
/// in declaration order.
#[derive(Debug, Default)]
pub struct ClassData
{
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassData
{
    pub fn num_methods(&self) -> u32
    {
        (self.direct_methods.len() + self.virtual_methods.len()) as u32
    }

    fn read(r: &mut Reader) -> Result<ClassData, DexError>
    {
        let static_fields_size = r.uleb128()?;
        let instance_fields_size = r.uleb128()?;
        let direct_methods_size = r.uleb128()?;
        let virtual_methods_size = r.uleb128()?;

        Ok(ClassData {
            static_fields: Self::read_fields(r, static_fields_size)?,
            instance_fields: Self::read_fields(r, instance_fields_size)?,
            direct_methods: Self::read_methods(r, direct_methods_size)?,
            virtual_methods: Self::read_methods(r, virtual_methods_size)?,
        })
    }

    fn read_fields(r: &mut Reader, count: u32) -> Result<Vec<EncodedField>, DexError>
    {
        let mut fields = Vec::with_capacity(count as usize);
        let mut field_idx = 0;
        for _ in 0..count
        {
            field_idx += r.uleb128()?;
            fields.push(EncodedField { field_idx, access_flags: r.uleb128()? });
        }
        Ok(fields)
    }

    fn read_methods(r: &mut Reader, count: u32) -> Result<Vec<EncodedMethod>, DexError>
    {
        let mut methods = Vec::with_capacity(count as usize);
        let mut method_idx = 0;
        for _ in 0..count
        {
            method_idx += r.uleb128()?;
            let access_flags = r.uleb128()?;
            let _code_off = r.uleb128()?;
            methods.push(EncodedMethod { method_idx, access_flags });
        }
        Ok(methods)
    }
}

/// The class_def_item fields the writer consumes.
#[derive(Debug)]
pub struct ClassDef
{
    pub class_idx: u32,
    pub access_flags: u32,
    pub class_data: Option<ClassData>,
}

/// An input dex container: its raw payload plus the identifier tables
/// needed to walk classes and resolve method shorties.
#[derive(Debug)]
pub struct DexFile
{
    pub location: String,
    pub location_checksum: u32,
    pub header: Header,
    pub strings: Vec<DexString>,
    pub types: Vec<u32>,
    pub protos: Vec<ProtoItem>,
    pub methods: Vec<MethodItem>,
    pub class_defs: Vec<ClassDef>,
    pub bytes: Vec<u8>,
}

impl DexFile
{
    /// Parses the header and identifier tables out of `bytes`, keeping the
    /// raw buffer as the payload to embed. The header checksum is verified
    /// against the adler32 of the covered bytes.
    pub fn from_bytes(location: &str, bytes: Vec<u8>) -> Result<DexFile, DexError>
    {
        if bytes.len() < HEADER_SIZE
        {
            fail!("{} bytes is too short for a dex header", bytes.len());
        }
        let mut r = Reader::new(&bytes);
        let header = Header::read(&mut r)?;
        if (header.file_size as usize) > bytes.len() || (header.file_size as usize) < HEADER_SIZE
        {
            fail!("header file size {} does not fit buffer of {} bytes", header.file_size, bytes.len());
        }
        let computed = adler32_slice(&bytes[12..header.file_size as usize]);
        if computed != header.checksum
        {
            fail!("checksum mismatch: header {:#010x}, computed {:#010x}", header.checksum, computed);
        }

        let mut strings = Vec::with_capacity(header.string_ids_size as usize);
        r.seek(header.string_ids_off as usize);
        let mut string_data_offs = Vec::with_capacity(header.string_ids_size as usize);
        for _ in 0..header.string_ids_size
        {
            string_data_offs.push(r.u32()?);
        }
        for off in string_data_offs
        {
            let mut sr = Reader::new(&bytes);
            sr.seek(off as usize);
            strings.push(DexString::read(&mut sr)?);
        }

        let mut types = Vec::with_capacity(header.type_ids_size as usize);
        r.seek(header.type_ids_off as usize);
        for _ in 0..header.type_ids_size
        {
            types.push(r.u32()?);
        }

        let mut protos = Vec::with_capacity(header.proto_ids_size as usize);
        r.seek(header.proto_ids_off as usize);
        for _ in 0..header.proto_ids_size
        {
            let shorty_idx = r.u32()?;
            let return_type_idx = r.u32()?;
            let _parameters_off = r.u32()?;
            protos.push(ProtoItem { shorty_idx, return_type_idx });
        }

        let mut methods = Vec::with_capacity(header.method_ids_size as usize);
        r.seek(header.method_ids_off as usize);
        for _ in 0..header.method_ids_size
        {
            methods.push(MethodItem {
                class_idx: r.u16()? as u32,
                proto_idx: r.u16()? as u32,
                name_idx: r.u32()?,
            });
        }

        let mut class_defs = Vec::with_capacity(header.class_defs_size as usize);
        r.seek(header.class_defs_off as usize);
        for i in 0..header.class_defs_size
        {
            let class_idx = r.u32()?;
            let access_flags = r.u32()?;
            let _superclass_idx = r.u32()?;
            let _interfaces_off = r.u32()?;
            let _source_file_idx = r.u32()?;
            let _annotations_off = r.u32()?;
            let class_data_off = r.u32()?;
            let _static_values_off = r.u32()?;
            let class_data = if class_data_off > 0
            {
                let mut cr = Reader::new(&bytes);
                cr.seek(class_data_off as usize);
                Some(ClassData::read(&mut cr).map_err(|e| e.context(format!("class def {}", i)))?)
            }
            else
            {
                None
            };
            class_defs.push(ClassDef { class_idx, access_flags, class_data });
        }

        let location_checksum = header.checksum;
        Ok(DexFile {
            location: location.to_string(),
            location_checksum,
            header,
            strings,
            types,
            protos,
            methods,
            class_defs,
            bytes,
        })
    }

    pub fn file_size(&self) -> u32
    {
        self.header.file_size
    }

    fn string(&self, idx: u32) -> Result<&str, DexError>
    {
        self.strings
            .get(idx as usize)
            .and_then(|s| s.as_str())
            .ok_or_else(|| DexError::new(&format!("string index {} unresolvable", idx)))
    }

    /// The shorty signature for a method, e.g. `VIL` for `(int, Object) -> void`.
    pub fn method_shorty(&self, method_idx: u32) -> Result<&str, DexError>
    {
        let method = self
            .methods
            .get(method_idx as usize)
            .ok_or_else(|| DexError::new(&format!("method index {} out of range", method_idx)))?;
        let proto = self
            .protos
            .get(method.proto_idx as usize)
            .ok_or_else(|| DexError::new(&format!("proto index {} out of range", method.proto_idx)))?;
        self.string(proto.shorty_idx)
    }

    /// Human-readable method description for diagnostics, e.g. `LFoo;->bar`.
    pub fn pretty_method(&self, method_idx: u32) -> String
    {
        let resolved = self.methods.get(method_idx as usize).and_then(|method| {
            let class_desc = self
                .types
                .get(method.class_idx as usize)
                .and_then(|&string_idx| self.string(string_idx).ok())?;
            let name = self.string(method.name_idx).ok()?;
            Some(format!("{}->{}", class_desc, name))
        });
        match resolved
        {
            Some(s) => s,
            None => format!("method #{} in {}", method_idx, self.location),
        }
    }
}
