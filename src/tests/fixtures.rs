/* Synthetic dex files, a scriptable compiler facade and a recording
 * image binder shared by the scenario tests. */

use std::collections::{HashMap, HashSet};

use crate::compiler::{
    ClassStatus, CompiledClass, CompiledMethod, CompiledStub, Compiler, InstructionSet,
};
use crate::dex::dex_file::{
    ClassData, ClassDef, DexFile, DexString, EncodedMethod, Header, InvokeType, MethodItem,
    ProtoItem, ACC_PUBLIC, DEX_FILE_MAGIC, ENDIAN_CONSTANT, HEADER_SIZE,
};
use crate::image::{ImageBinder, MethodBinding};

fn dex_header(file_size: u32) -> Header
{
    Header {
        magic: [
            DEX_FILE_MAGIC[0],
            DEX_FILE_MAGIC[1],
            DEX_FILE_MAGIC[2],
            DEX_FILE_MAGIC[3],
            0x30,
            0x33,
            0x35,
            0x00,
        ],
        checksum: 0,
        signature: [0; 20],
        file_size,
        header_size: HEADER_SIZE as u32,
        endian_tag: ENDIAN_CONSTANT,
        link_size: 0,
        link_off: 0,
        map_off: 0,
        string_ids_size: 0,
        string_ids_off: 0,
        type_ids_size: 0,
        type_ids_off: 0,
        proto_ids_size: 0,
        proto_ids_off: 0,
        field_ids_size: 0,
        field_ids_off: 0,
        method_ids_size: 0,
        method_ids_off: 0,
        class_defs_size: 0,
        class_defs_off: 0,
        data_size: 0,
        data_off: 0,
    }
}

/// A dex input assembled directly from parsed structures, with an
/// opaque payload of `payload_len` filler bytes. Every method index in
/// `0..method_count` resolves to shorty `V`.
pub(crate) fn synthetic_dex(location: &str, class_defs: Vec<ClassDef>, method_count: u32, payload_len: usize) -> DexFile
{
    let mut strings = vec![
        DexString::Decoded("V".to_string()),
        DexString::Decoded("LTest;".to_string()),
    ];
    for i in 0..method_count
    {
        strings.push(DexString::Decoded(format!("m{}", i)));
    }
    DexFile {
        location: location.to_string(),
        location_checksum: 0x1b0a7,
        header: dex_header(payload_len as u32),
        strings,
        types: vec![1],
        protos: vec![ProtoItem { shorty_idx: 0, return_type_idx: 0 }],
        methods: (0..method_count)
            .map(|i| MethodItem { class_idx: 0, proto_idx: 0, name_idx: 2 + i })
            .collect(),
        class_defs,
        bytes: vec![0xd7; payload_len],
    }
}

pub(crate) fn method(method_idx: u32, access_flags: u32) -> EncodedMethod
{
    EncodedMethod { method_idx, access_flags }
}

pub(crate) fn class_with_methods(direct_methods: Vec<EncodedMethod>, virtual_methods: Vec<EncodedMethod>) -> ClassDef
{
    ClassDef {
        class_idx: 0,
        access_flags: ACC_PUBLIC,
        class_data: Some(ClassData {
            static_fields: vec![],
            instance_fields: vec![],
            direct_methods,
            virtual_methods,
        }),
    }
}

/// A class without class data, e.g. a marker interface.
pub(crate) fn marker_class() -> ClassDef
{
    ClassDef { class_idx: 0, access_flags: ACC_PUBLIC, class_data: None }
}

pub(crate) fn compiled_method(instruction_set: InstructionSet, code: Vec<u8>) -> CompiledMethod
{
    CompiledMethod {
        instruction_set,
        code,
        frame_size_in_bytes: 64,
        core_spill_mask: 0x4ff0,
        fp_spill_mask: 0,
        mapping_table: vec![],
        vmap_table: vec![],
        gc_map: vec![],
    }
}

/// Scriptable [`Compiler`]: results are keyed by dex location and
/// index, mirroring how the writer queries them.
pub(crate) struct FakeCompiler
{
    pub instruction_set: InstructionSet,
    pub image: bool,
    pub methods: HashMap<(String, u32), CompiledMethod>,
    pub classes: HashMap<(String, u32), CompiledClass>,
    pub rejected: HashSet<(String, u32)>,
    pub invoke_stubs: HashMap<(bool, String), CompiledStub>,
    pub proxy_stubs: HashMap<String, CompiledStub>,
}

impl FakeCompiler
{
    pub fn new(instruction_set: InstructionSet) -> FakeCompiler
    {
        FakeCompiler {
            instruction_set,
            image: false,
            methods: HashMap::new(),
            classes: HashMap::new(),
            rejected: HashSet::new(),
            invoke_stubs: HashMap::new(),
            proxy_stubs: HashMap::new(),
        }
    }

    pub fn add_method(&mut self, dex: &DexFile, method_idx: u32, compiled: CompiledMethod)
    {
        self.methods.insert((dex.location.clone(), method_idx), compiled);
    }

    pub fn add_class(&mut self, dex: &DexFile, class_def_idx: u32, status: ClassStatus)
    {
        self.classes.insert((dex.location.clone(), class_def_idx), CompiledClass { status });
    }

    pub fn reject_class(&mut self, dex: &DexFile, class_def_idx: u32)
    {
        self.rejected.insert((dex.location.clone(), class_def_idx));
    }

    pub fn add_invoke_stub(&mut self, is_static: bool, shorty: &str, code: Vec<u8>)
    {
        self.invoke_stubs.insert(
            (is_static, shorty.to_string()),
            CompiledStub { instruction_set: self.instruction_set, code },
        );
    }

    pub fn add_proxy_stub(&mut self, shorty: &str, code: Vec<u8>)
    {
        self.proxy_stubs
            .insert(shorty.to_string(), CompiledStub { instruction_set: self.instruction_set, code });
    }
}

impl Compiler for FakeCompiler
{
    fn instruction_set(&self) -> InstructionSet
    {
        self.instruction_set
    }

    fn is_image(&self) -> bool
    {
        self.image
    }

    fn compiled_method(&self, dex: &DexFile, method_idx: u32) -> Option<&CompiledMethod>
    {
        self.methods.get(&(dex.location.clone(), method_idx))
    }

    fn compiled_class(&self, dex: &DexFile, class_def_idx: u32) -> Option<&CompiledClass>
    {
        self.classes.get(&(dex.location.clone(), class_def_idx))
    }

    fn is_class_rejected(&self, dex: &DexFile, class_def_idx: u32) -> bool
    {
        self.rejected.contains(&(dex.location.clone(), class_def_idx))
    }

    fn invoke_stub(&self, is_static: bool, shorty: &str) -> Option<&CompiledStub>
    {
        self.invoke_stubs.get(&(is_static, shorty.to_string()))
    }

    fn proxy_stub(&self, shorty: &str) -> Option<&CompiledStub>
    {
        self.proxy_stubs.get(shorty)
    }
}

/// Image binder that records every published binding.
pub(crate) struct RecordingBinder
{
    pub initialized: HashSet<(String, u32)>,
    pub bound: Vec<(u32, InvokeType, MethodBinding)>,
}

impl RecordingBinder
{
    pub fn new() -> RecordingBinder
    {
        RecordingBinder { initialized: HashSet::new(), bound: Vec::new() }
    }
}

impl ImageBinder for RecordingBinder
{
    fn is_class_initialized(&self, dex: &DexFile, class_def_idx: u32) -> bool
    {
        self.initialized.contains(&(dex.location.clone(), class_def_idx))
    }

    fn bind_method(&mut self, _dex: &DexFile, method_idx: u32, invoke_type: InvokeType, binding: &MethodBinding)
    {
        self.bound.push((method_idx, invoke_type, *binding));
    }
}

/// Serialized fields of one directory entry, re-read from emitted bytes.
pub(crate) struct ParsedDexEntry
{
    pub location: String,
    pub location_checksum: u32,
    pub dex_file_offset: u32,
    pub methods_offsets: Vec<u32>,
    pub end: usize,
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32
{
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Parses a directory entry at `offset`, given the class count promised
/// by its dex.
pub(crate) fn parse_dex_entry(bytes: &[u8], mut offset: usize, class_defs: usize) -> ParsedDexEntry
{
    let location_len = read_u32(bytes, offset) as usize;
    offset += 4;
    let location = String::from_utf8(bytes[offset..offset + location_len].to_vec()).unwrap();
    offset += location_len;
    let location_checksum = read_u32(bytes, offset);
    offset += 4;
    let dex_file_offset = read_u32(bytes, offset);
    offset += 4;
    let mut methods_offsets = Vec::with_capacity(class_defs);
    for _ in 0..class_defs
    {
        methods_offsets.push(read_u32(bytes, offset));
        offset += 4;
    }
    ParsedDexEntry { location, location_checksum, dex_file_offset, methods_offsets, end: offset }
}

fn push_u16(bytes: &mut Vec<u8>, value: u16)
{
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(bytes: &mut Vec<u8>, value: u32)
{
    bytes.extend_from_slice(&value.to_le_bytes());
}

/// A complete, checksummed 200-byte dex: one class `LA;` with a single
/// public static method `foo()V`.
pub(crate) fn tiny_dex_bytes() -> Vec<u8>
{
    let mut b = Vec::with_capacity(0xc8);
    b.extend_from_slice(&[0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00]);
    push_u32(&mut b, 0); // checksum, patched below
    b.extend_from_slice(&[0u8; 20]); // signature, unverified
    push_u32(&mut b, 0xc8); // file_size
    push_u32(&mut b, 0x70); // header_size
    push_u32(&mut b, ENDIAN_CONSTANT);
    push_u32(&mut b, 0); // link_size
    push_u32(&mut b, 0); // link_off
    push_u32(&mut b, 0); // map_off
    push_u32(&mut b, 3); // string_ids_size
    push_u32(&mut b, 0x70);
    push_u32(&mut b, 1); // type_ids_size
    push_u32(&mut b, 0x7c);
    push_u32(&mut b, 1); // proto_ids_size
    push_u32(&mut b, 0x80);
    push_u32(&mut b, 0); // field_ids_size
    push_u32(&mut b, 0);
    push_u32(&mut b, 1); // method_ids_size
    push_u32(&mut b, 0x8c);
    push_u32(&mut b, 1); // class_defs_size
    push_u32(&mut b, 0x94);
    push_u32(&mut b, 0x14); // data_size
    push_u32(&mut b, 0xb4); // data_off
    assert_eq!(b.len(), 0x70);

    // string ids
    push_u32(&mut b, 0xb4);
    push_u32(&mut b, 0xb9);
    push_u32(&mut b, 0xbc);
    // type ids: "LA;"
    push_u32(&mut b, 0);
    // proto ids: shorty "V", returns "LA;"-typed slot 0, no parameters
    push_u32(&mut b, 1);
    push_u32(&mut b, 0);
    push_u32(&mut b, 0);
    // method ids: LA;->foo
    push_u16(&mut b, 0);
    push_u16(&mut b, 0);
    push_u32(&mut b, 2);
    // class def
    push_u32(&mut b, 0); // class_idx
    push_u32(&mut b, 0x1); // ACC_PUBLIC
    push_u32(&mut b, 0xffffffff); // superclass
    push_u32(&mut b, 0); // interfaces
    push_u32(&mut b, 0xffffffff); // source file
    push_u32(&mut b, 0); // annotations
    push_u32(&mut b, 0xc1); // class_data
    push_u32(&mut b, 0); // static values
    assert_eq!(b.len(), 0xb4);

    // string data
    b.extend_from_slice(&[3, b'L', b'A', b';', 0]);
    b.extend_from_slice(&[1, b'V', 0]);
    b.extend_from_slice(&[3, b'f', b'o', b'o', 0]);
    // class data: one public static direct method, no code item
    b.extend_from_slice(&[0, 0, 1, 0, 0, 0x09, 0]);
    assert_eq!(b.len(), 0xc8);

    let checksum = adler::adler32_slice(&b[12..]);
    b[8..12].copy_from_slice(&checksum.to_le_bytes());
    b
}
