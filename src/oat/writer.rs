/* Two-pass oat serializer.
 *
 * The layout pass runs in the constructor: it walks every dex file,
 * class and method, assigns every absolute file offset (including the
 * offsets of deduplicated blobs), and accumulates the header checksum.
 * The write pass then emits bytes and re-derives the same offsets,
 * asserting agreement at every step. Nothing is patched after the
 * fact, so the sink only ever moves forward.
 */

use std::io::{self, SeekFrom};

use byteorder::{LittleEndian, WriteBytesExt};
use log::error;

use crate::compiler::{align_code, ClassStatus, Compiler};
use crate::dex::dex_file::{DexFile, EncodedMethod, InvokeType};
use crate::image::{CodeEntry, ImageBinder, MethodBinding};
use crate::oat::dedup::DedupTable;
use crate::oat::error::OatError;
use crate::oat::header::OatHeader;
use crate::oat::{align_to, u16_slice_bytes, u32_slice_bytes, DEX_PAYLOAD_ALIGNMENT, PAGE_SIZE, STACK_ALIGNMENT};
use crate::sink::OutputSink;

/// Per-method record within a class entry. All offsets are absolute
/// within the oat file; zero means "not present".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodOffsets
{
    pub code_offset: u32,
    pub frame_size_in_bytes: u32,
    pub core_spill_mask: u32,
    pub fp_spill_mask: u32,
    pub mapping_table_offset: u32,
    pub vmap_table_offset: u32,
    pub gc_map_offset: u32,
    pub invoke_stub_offset: u32,
    pub proxy_stub_offset: u32,
}

impl MethodOffsets
{
    pub(crate) const SIZE: u32 = 36;

    fn write_to(&self, bytes: &mut Vec<u8>)
    {
        for field in [
            self.code_offset,
            self.frame_size_in_bytes,
            self.core_spill_mask,
            self.fp_spill_mask,
            self.mapping_table_offset,
            self.vmap_table_offset,
            self.gc_map_offset,
            self.invoke_stub_offset,
            self.proxy_stub_offset,
        ]
        {
            bytes.extend_from_slice(&field.to_le_bytes());
        }
    }
}

/// Directory entry for one input dex: where its payload lives and where
/// each of its class entries was placed.
#[derive(Debug)]
pub(crate) struct OatDexFile
{
    pub(crate) location: String,
    pub(crate) location_checksum: u32,
    pub(crate) dex_file_offset: u32,
    pub(crate) methods_offsets: Vec<u32>,
}

impl OatDexFile
{
    fn new(dex: &DexFile) -> OatDexFile
    {
        OatDexFile {
            location: dex.location.clone(),
            location_checksum: dex.location_checksum,
            dex_file_offset: 0,
            methods_offsets: vec![0; dex.class_defs.len()],
        }
    }

    pub(crate) fn size(&self) -> u32
    {
        4 + self.location.len() as u32 + 4 + 4 + 4 * self.methods_offsets.len() as u32
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8>
    {
        let mut bytes = Vec::with_capacity(self.size() as usize);
        bytes.extend_from_slice(&(self.location.len() as u32).to_le_bytes());
        bytes.extend_from_slice(self.location.as_bytes());
        bytes.extend_from_slice(&self.location_checksum.to_le_bytes());
        bytes.extend_from_slice(&self.dex_file_offset.to_le_bytes());
        for offset in &self.methods_offsets
        {
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        bytes
    }
}

/// Per-class record: runtime status plus one [`MethodOffsets`] per
/// declared method, direct before virtual. Empty classes get an entry
/// with no methods.
#[derive(Debug)]
pub(crate) struct OatClass
{
    pub(crate) status: ClassStatus,
    pub(crate) method_offsets: Vec<MethodOffsets>,
}

impl OatClass
{
    fn new(status: ClassStatus, num_methods: u32) -> OatClass
    {
        OatClass {
            status,
            method_offsets: vec![MethodOffsets::default(); num_methods as usize],
        }
    }

    pub(crate) fn size(&self) -> u32
    {
        4 + MethodOffsets::SIZE * self.method_offsets.len() as u32
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8>
    {
        let mut bytes = Vec::with_capacity(self.size() as usize);
        bytes.extend_from_slice(&self.status.as_i32().to_le_bytes());
        for offsets in &self.method_offsets
        {
            offsets.write_to(&mut bytes);
        }
        bytes
    }
}

#[derive(Clone, Copy)]
enum BlobTable
{
    Code,
    Mapping,
    Vmap,
    GcMap,
}

/// Serializes dex files plus their compiled code into a single oat
/// image. Single-use: the constructor runs the layout pass, [`write`]
/// consumes the writer.
///
/// [`write`]: OatWriter::write
impl<'a> std::fmt::Debug for OatWriter<'a>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("OatWriter").finish_non_exhaustive()
    }
}

pub struct OatWriter<'a>
{
    compiler: &'a dyn Compiler,
    dex_files: &'a [DexFile],
    pub(crate) header: OatHeader,
    pub(crate) oat_dex_files: Vec<OatDexFile>,
    pub(crate) oat_classes: Vec<OatClass>,
    pub(crate) executable_offset_padding_length: u32,
    /// Method code, invoke stubs and proxy stubs share one table.
    pub(crate) code_offsets: DedupTable,
    pub(crate) mapping_table_offsets: DedupTable,
    pub(crate) vmap_table_offsets: DedupTable,
    pub(crate) gc_map_offsets: DedupTable,
}

impl<'a> OatWriter<'a>
{
    /// Lays out the whole file without emitting a byte. When the
    /// compiler is building an image, `image_binder` receives the
    /// finalized offsets of every method and must be present.
    pub fn new(
        dex_files: &'a [DexFile],
        image_file_location_checksum: u32,
        image_file_location_begin: u32,
        image_file_location: &str,
        compiler: &'a dyn Compiler,
        mut image_binder: Option<&mut dyn ImageBinder>,
    ) -> Result<OatWriter<'a>, OatError>
    {
        if compiler.is_image() && image_binder.is_none()
        {
            return Err(OatError::contract("image build requires an image binder"));
        }

        let header = OatHeader::new(
            compiler.instruction_set(),
            dex_files.len() as u32,
            image_file_location_checksum,
            image_file_location_begin,
            image_file_location,
        );
        let mut writer = OatWriter {
            compiler,
            dex_files,
            header,
            oat_dex_files: Vec::with_capacity(dex_files.len()),
            oat_classes: Vec::new(),
            executable_offset_padding_length: 0,
            code_offsets: DedupTable::default(),
            mapping_table_offsets: DedupTable::default(),
            vmap_table_offsets: DedupTable::default(),
            gc_map_offsets: DedupTable::default(),
        };

        let mut offset = writer.header.size();
        offset = writer.init_oat_dex_files(offset);
        offset = writer.init_dex_files(offset);
        offset = writer.init_oat_classes(offset);
        offset = writer.init_executable_offset(offset);
        writer.init_code(offset, &mut image_binder)?;
        Ok(writer)
    }

    /// Constructs a writer and emits the file in one step.
    pub fn create<S: OutputSink>(
        out: &mut S,
        dex_files: &[DexFile],
        image_file_location_checksum: u32,
        image_file_location_begin: u32,
        image_file_location: &str,
        compiler: &dyn Compiler,
        image_binder: Option<&mut dyn ImageBinder>,
    ) -> Result<(), OatError>
    {
        let writer = OatWriter::new(
            dex_files,
            image_file_location_checksum,
            image_file_location_begin,
            image_file_location,
            compiler,
            image_binder,
        )?;
        writer.write(out)
    }

    pub fn header(&self) -> &OatHeader
    {
        &self.header
    }

    /* Layout pass */

    fn init_oat_dex_files(&mut self, mut offset: u32) -> u32
    {
        for dex in self.dex_files
        {
            let entry = OatDexFile::new(dex);
            offset += entry.size();
            self.oat_dex_files.push(entry);
        }
        offset
    }

    fn init_dex_files(&mut self, mut offset: u32) -> u32
    {
        for (i, dex) in self.dex_files.iter().enumerate()
        {
            offset = align_to(offset, DEX_PAYLOAD_ALIGNMENT);
            self.oat_dex_files[i].dex_file_offset = offset;
            offset += dex.file_size();
        }
        offset
    }

    fn init_oat_classes(&mut self, mut offset: u32) -> u32
    {
        let compiler = self.compiler;
        for (i, dex) in self.dex_files.iter().enumerate()
        {
            for (class_def_idx, class_def) in dex.class_defs.iter().enumerate()
            {
                self.oat_dex_files[i].methods_offsets[class_def_idx] = offset;
                let num_methods = class_def.class_data.as_ref().map_or(0, |data| data.num_methods());
                let status = match compiler.compiled_class(dex, class_def_idx as u32)
                {
                    Some(compiled) => compiled.status,
                    None if compiler.is_class_rejected(dex, class_def_idx as u32) => ClassStatus::Error,
                    None => ClassStatus::NotReady,
                };
                let oat_class = OatClass::new(status, num_methods);
                offset += oat_class.size();
                self.oat_classes.push(oat_class);
            }
            let entry_bytes = self.oat_dex_files[i].to_bytes();
            self.header.update_checksum(&entry_bytes);
        }
        offset
    }

    fn init_executable_offset(&mut self, offset: u32) -> u32
    {
        let aligned = align_to(offset, PAGE_SIZE);
        self.executable_offset_padding_length = aligned - offset;
        self.header.set_executable_offset(aligned);
        aligned
    }

    fn init_code(&mut self, mut offset: u32, image_binder: &mut Option<&mut dyn ImageBinder>) -> Result<u32, OatError>
    {
        let dex_files = self.dex_files;
        let mut oat_class_index = 0;
        for dex in dex_files
        {
            for (class_def_idx, class_def) in dex.class_defs.iter().enumerate()
            {
                if let Some(class_data) = &class_def.class_data
                {
                    let promised = self.oat_classes[oat_class_index].method_offsets.len();
                    if promised != class_data.num_methods() as usize
                    {
                        return Err(OatError::contract(format!(
                            "class data in {} reports {} methods, expected {}",
                            dex.location,
                            class_data.num_methods(),
                            promised
                        )));
                    }
                    let mut method_index = 0;
                    for method in &class_data.direct_methods
                    {
                        let invoke_type = method.invoke_type(true, class_def.access_flags);
                        offset = self.init_code_method(
                            offset,
                            oat_class_index,
                            method_index,
                            dex,
                            class_def_idx as u32,
                            method,
                            invoke_type,
                            image_binder,
                        )?;
                        method_index += 1;
                    }
                    for method in &class_data.virtual_methods
                    {
                        let invoke_type = method.invoke_type(false, class_def.access_flags);
                        offset = self.init_code_method(
                            offset,
                            oat_class_index,
                            method_index,
                            dex,
                            class_def_idx as u32,
                            method,
                            invoke_type,
                            image_binder,
                        )?;
                        method_index += 1;
                    }
                }
                let entry_bytes = self.oat_classes[oat_class_index].to_bytes();
                self.header.update_checksum(&entry_bytes);
                oat_class_index += 1;
            }
        }
        Ok(offset)
    }

    #[allow(clippy::too_many_arguments)]
    fn init_code_method(
        &mut self,
        mut offset: u32,
        oat_class_index: usize,
        method_index: usize,
        dex: &DexFile,
        class_def_idx: u32,
        method: &EncodedMethod,
        invoke_type: InvokeType,
        image_binder: &mut Option<&mut dyn ImageBinder>,
    ) -> Result<u32, OatError>
    {
        let compiler = self.compiler;
        let mut method_offsets = MethodOffsets {
            frame_size_in_bytes: STACK_ALIGNMENT,
            ..MethodOffsets::default()
        };

        if let Some(compiled) = compiler.compiled_method(dex, method.method_idx)
        {
            offset = compiled.align_code(offset);
            let (next, code_offset) = self.place_blob(
                offset,
                compiled.code.clone(),
                BlobTable::Code,
                Some(compiled.code_delta()),
                "method code",
                dex,
                method.method_idx,
            )?;
            offset = next;
            method_offsets.code_offset = code_offset;
            method_offsets.frame_size_in_bytes = compiled.frame_size_in_bytes;
            method_offsets.core_spill_mask = compiled.core_spill_mask;
            method_offsets.fp_spill_mask = compiled.fp_spill_mask;

            let (next, table_offset) = self.place_blob(
                offset,
                u32_slice_bytes(&compiled.mapping_table),
                BlobTable::Mapping,
                None,
                "mapping table",
                dex,
                method.method_idx,
            )?;
            offset = next;
            method_offsets.mapping_table_offset = table_offset;

            let (next, table_offset) = self.place_blob(
                offset,
                u16_slice_bytes(&compiled.vmap_table),
                BlobTable::Vmap,
                None,
                "vmap table",
                dex,
                method.method_idx,
            )?;
            offset = next;
            method_offsets.vmap_table_offset = table_offset;

            let (next, table_offset) = self.place_blob(
                offset,
                compiled.gc_map.clone(),
                BlobTable::GcMap,
                None,
                "GC map",
                dex,
                method.method_idx,
            )?;
            offset = next;
            method_offsets.gc_map_offset = table_offset;
        }

        let shorty = method_shorty(dex, method.method_idx)?;
        if let Some(stub) = compiler.invoke_stub(invoke_type == InvokeType::Static, shorty)
        {
            offset = align_code(offset, compiler.instruction_set());
            let (next, stub_offset) = self.place_blob(
                offset,
                stub.code.clone(),
                BlobTable::Code,
                Some(stub.code_delta()),
                "invoke stub",
                dex,
                method.method_idx,
            )?;
            offset = next;
            method_offsets.invoke_stub_offset = stub_offset;
        }

        if invoke_type != InvokeType::Static
        {
            if let Some(stub) = compiler.proxy_stub(shorty)
            {
                offset = align_code(offset, compiler.instruction_set());
                let (next, stub_offset) = self.place_blob(
                    offset,
                    stub.code.clone(),
                    BlobTable::Code,
                    Some(stub.code_delta()),
                    "proxy stub",
                    dex,
                    method.method_idx,
                )?;
                offset = next;
                method_offsets.proxy_stub_offset = stub_offset;
            }
        }

        self.oat_classes[oat_class_index].method_offsets[method_index] = method_offsets;

        if compiler.is_image()
        {
            if let Some(binder) = image_binder.as_mut()
            {
                let publish_code = !method.is_static()
                    || method.is_constructor()
                    || binder.is_class_initialized(dex, class_def_idx);
                let binding = MethodBinding {
                    frame_size_in_bytes: method_offsets.frame_size_in_bytes,
                    core_spill_mask: method_offsets.core_spill_mask,
                    fp_spill_mask: method_offsets.fp_spill_mask,
                    mapping_table_offset: method_offsets.mapping_table_offset,
                    vmap_table_offset: method_offsets.vmap_table_offset,
                    gc_map_offset: method_offsets.gc_map_offset,
                    invoke_stub_offset: method_offsets.invoke_stub_offset,
                    code: if publish_code
                    {
                        CodeEntry::Oat(method_offsets.code_offset)
                    }
                    else
                    {
                        CodeEntry::ResolutionStub
                    },
                };
                binder.bind_method(dex, method.method_idx, invoke_type, &binding);
            }
        }

        Ok(offset)
    }

    /// Assigns one blob a file position, deduplicating against earlier
    /// placements. Returns the advanced offset and the value to store in
    /// the method entry. Code-like blobs (`code_delta` present) get a
    /// u32 size prefix and carry the entry-point bias; table blobs store
    /// zero when empty. The checksum is folded only on first placement.
    #[allow(clippy::too_many_arguments)]
    fn place_blob(
        &mut self,
        mut offset: u32,
        bytes: Vec<u8>,
        table: BlobTable,
        code_delta: Option<u32>,
        what: &str,
        dex: &DexFile,
        method_idx: u32,
    ) -> Result<(u32, u32), OatError>
    {
        let size = bytes.len() as u32;
        let stored = match code_delta
        {
            Some(delta) =>
            {
                if size == 0
                {
                    return Err(OatError::contract(format!(
                        "compiler produced zero-length {} for {}",
                        what,
                        dex.pretty_method(method_idx)
                    )));
                }
                offset + 4 + delta
            }
            None => if size == 0 { 0 } else { offset },
        };

        if let Some(first) = self.table(table).get(&bytes)
        {
            return Ok((offset, first));
        }
        self.header.update_checksum(&bytes);
        self.table_mut(table).insert(bytes, stored);
        offset += size + if code_delta.is_some() { 4 } else { 0 };
        Ok((offset, stored))
    }

    fn table(&self, which: BlobTable) -> &DedupTable
    {
        match which
        {
            BlobTable::Code => &self.code_offsets,
            BlobTable::Mapping => &self.mapping_table_offsets,
            BlobTable::Vmap => &self.vmap_table_offsets,
            BlobTable::GcMap => &self.gc_map_offsets,
        }
    }

    fn table_mut(&mut self, which: BlobTable) -> &mut DedupTable
    {
        match which
        {
            BlobTable::Code => &mut self.code_offsets,
            BlobTable::Mapping => &mut self.mapping_table_offsets,
            BlobTable::Vmap => &mut self.vmap_table_offsets,
            BlobTable::GcMap => &mut self.gc_map_offsets,
        }
    }

    /* Write pass */

    /// Emits the laid-out file. Any sink failure aborts; a partially
    /// written file is the caller's to clean up.
    pub fn write<S: OutputSink>(self, out: &mut S) -> Result<(), OatError>
    {
        write_all_checked(out, &self.header.to_bytes(), "oat header")?;
        write_all_checked(out, self.header.image_file_location().as_bytes(), "oat header image file location")?;
        self.write_tables(out)?;
        let code_offset = self.write_code(out)?;
        self.write_code_dex_files(out, code_offset)?;
        Ok(())
    }

    fn write_tables<S: OutputSink>(&self, out: &mut S) -> Result<(), OatError>
    {
        for entry in &self.oat_dex_files
        {
            write_all_checked(out, &entry.to_bytes(), "oat dex file entry")?;
        }
        for (i, dex) in self.dex_files.iter().enumerate()
        {
            let expected = self.oat_dex_files[i].dex_file_offset;
            let what = format!("dex payload of {}", dex.location);
            let actual = out
                .seek(SeekFrom::Start(expected as u64))
                .map_err(|err| report_write_failure(&what, out.location(), err))?;
            if actual != expected as u64
            {
                return Err(OatError::seek_mismatch(&what, expected as u64, actual, out.location()));
            }
            let size = dex.file_size() as usize;
            let payload = dex.bytes.get(..size).ok_or_else(|| {
                OatError::contract(format!(
                    "dex {} holds {} bytes, header promises {}",
                    dex.location,
                    dex.bytes.len(),
                    size
                ))
            })?;
            write_all_checked(out, payload, &what)?;
        }
        for oat_class in &self.oat_classes
        {
            write_all_checked(out, &oat_class.to_bytes(), "oat class entry")?;
        }
        Ok(())
    }

    /// Skips the padding between the directory region and the
    /// executable region, verifying the landing position.
    fn write_code<S: OutputSink>(&self, out: &mut S) -> Result<u32, OatError>
    {
        let expected = self.header.executable_offset();
        let actual = out
            .seek(SeekFrom::Current(self.executable_offset_padding_length as i64))
            .map_err(|err| report_write_failure("executable region padding", out.location(), err))?;
        if actual != expected as u64
        {
            return Err(OatError::seek_mismatch(
                "executable region padding",
                expected as u64,
                actual,
                out.location(),
            ));
        }
        Ok(expected)
    }

    fn write_code_dex_files<S: OutputSink>(&self, out: &mut S, mut code_offset: u32) -> Result<u32, OatError>
    {
        let mut oat_class_index = 0;
        for dex in self.dex_files
        {
            for class_def in &dex.class_defs
            {
                if let Some(class_data) = &class_def.class_data
                {
                    let mut method_index = 0;
                    for method in &class_data.direct_methods
                    {
                        code_offset = self.write_code_method(
                            out,
                            code_offset,
                            oat_class_index,
                            method_index,
                            dex,
                            method,
                            method.is_static(),
                        )?;
                        method_index += 1;
                    }
                    for method in &class_data.virtual_methods
                    {
                        code_offset = self
                            .write_code_method(out, code_offset, oat_class_index, method_index, dex, method, false)?;
                        method_index += 1;
                    }
                }
                oat_class_index += 1;
            }
        }
        Ok(code_offset)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_code_method<S: OutputSink>(
        &self,
        out: &mut S,
        mut code_offset: u32,
        oat_class_index: usize,
        method_index: usize,
        dex: &DexFile,
        method: &EncodedMethod,
        is_static: bool,
    ) -> Result<u32, OatError>
    {
        let method_offsets = self.oat_classes[oat_class_index].method_offsets[method_index];

        if let Some(compiled) = self.compiler.compiled_method(dex, method.method_idx)
        {
            code_offset = seek_code_alignment(out, code_offset, compiled.align_code(code_offset), "method code alignment")?;
            code_offset = self.write_blob(
                out,
                code_offset,
                &compiled.code,
                BlobTable::Code,
                Some(compiled.code_delta()),
                method_offsets.code_offset,
                "method code",
                dex,
                method.method_idx,
            )?;
            code_offset = self.write_blob(
                out,
                code_offset,
                &u32_slice_bytes(&compiled.mapping_table),
                BlobTable::Mapping,
                None,
                method_offsets.mapping_table_offset,
                "mapping table",
                dex,
                method.method_idx,
            )?;
            code_offset = self.write_blob(
                out,
                code_offset,
                &u16_slice_bytes(&compiled.vmap_table),
                BlobTable::Vmap,
                None,
                method_offsets.vmap_table_offset,
                "vmap table",
                dex,
                method.method_idx,
            )?;
            code_offset = self.write_blob(
                out,
                code_offset,
                &compiled.gc_map,
                BlobTable::GcMap,
                None,
                method_offsets.gc_map_offset,
                "GC map",
                dex,
                method.method_idx,
            )?;
        }

        let shorty = method_shorty(dex, method.method_idx)?;
        if let Some(stub) = self.compiler.invoke_stub(is_static, shorty)
        {
            let aligned = align_code(code_offset, self.compiler.instruction_set());
            code_offset = seek_code_alignment(out, code_offset, aligned, "invoke stub alignment")?;
            code_offset = self.write_blob(
                out,
                code_offset,
                &stub.code,
                BlobTable::Code,
                Some(stub.code_delta()),
                method_offsets.invoke_stub_offset,
                "invoke stub",
                dex,
                method.method_idx,
            )?;
        }

        if !is_static
        {
            if let Some(stub) = self.compiler.proxy_stub(shorty)
            {
                let aligned = align_code(code_offset, self.compiler.instruction_set());
                code_offset = seek_code_alignment(out, code_offset, aligned, "proxy stub alignment")?;
                code_offset = self.write_blob(
                    out,
                    code_offset,
                    &stub.code,
                    BlobTable::Code,
                    Some(stub.code_delta()),
                    method_offsets.proxy_stub_offset,
                    "proxy stub",
                    dex,
                    method.method_idx,
                )?;
            }
        }

        #[cfg(debug_assertions)]
        if let Ok(position) = out.seek(SeekFrom::Current(0))
        {
            debug_assert_eq!(
                position,
                code_offset as u64,
                "sink drifted from the planned cursor after {}",
                dex.pretty_method(method.method_idx)
            );
        }

        Ok(code_offset)
    }

    /// Mirror of [`place_blob`](OatWriter::place_blob) that emits bytes.
    /// A dedup hit (the layout recorded an earlier site) suppresses the
    /// write entirely; the recorded offset is re-checked either way.
    #[allow(clippy::too_many_arguments)]
    fn write_blob<S: OutputSink>(
        &self,
        out: &mut S,
        mut code_offset: u32,
        bytes: &[u8],
        table: BlobTable,
        code_delta: Option<u32>,
        recorded: u32,
        what: &str,
        dex: &DexFile,
        method_idx: u32,
    ) -> Result<u32, OatError>
    {
        let size = bytes.len() as u32;
        let table = self.table(table);
        match code_delta
        {
            Some(delta) =>
            {
                let candidate = code_offset + 4 + delta;
                if let Some(first) = table.get(bytes)
                {
                    if candidate != recorded
                    {
                        debug_assert_eq!(
                            first,
                            recorded,
                            "duplicate {} disagrees with planned offset for {}",
                            what,
                            dex.pretty_method(method_idx)
                        );
                        return Ok(code_offset);
                    }
                }
                debug_assert_eq!(
                    candidate,
                    recorded,
                    "{} lands away from its planned offset for {}",
                    what,
                    dex.pretty_method(method_idx)
                );
                out.write_u32::<LittleEndian>(size)
                    .map_err(|err| report_method_write_failure(what, dex, method_idx, out.location(), err))?;
                out.write_all(bytes)
                    .map_err(|err| report_method_write_failure(what, dex, method_idx, out.location(), err))?;
                code_offset += 4 + size;
            }
            None =>
            {
                if let Some(first) = table.get(bytes)
                {
                    if code_offset != recorded
                    {
                        debug_assert!(
                            (size == 0 && recorded == 0) || first == recorded,
                            "duplicate {} disagrees with planned offset for {}",
                            what,
                            dex.pretty_method(method_idx)
                        );
                        return Ok(code_offset);
                    }
                }
                debug_assert!(
                    (size == 0 && recorded == 0) || code_offset == recorded,
                    "{} lands away from its planned offset for {}",
                    what,
                    dex.pretty_method(method_idx)
                );
                out.write_all(bytes)
                    .map_err(|err| report_method_write_failure(what, dex, method_idx, out.location(), err))?;
                code_offset += size;
            }
        }
        Ok(code_offset)
    }
}

fn method_shorty<'d>(dex: &'d DexFile, method_idx: u32) -> Result<&'d str, OatError>
{
    dex.method_shorty(method_idx).map_err(|err| {
        OatError::contract(format!(
            "cannot resolve shorty for {}: {}",
            dex.pretty_method(method_idx),
            err
        ))
    })
}

fn write_all_checked<S: OutputSink>(out: &mut S, bytes: &[u8], what: &str) -> Result<(), OatError>
{
    if let Err(err) = out.write_all(bytes)
    {
        return Err(report_write_failure(what, out.location(), err));
    }
    Ok(())
}

fn report_write_failure(what: &str, location: &str, err: io::Error) -> OatError
{
    error!("failed to write {} to {}", what, location);
    OatError::sink(what, location, err)
}

fn report_method_write_failure(what: &str, dex: &DexFile, method_idx: u32, location: &str, err: io::Error) -> OatError
{
    let context = format!("{} for {}", what, dex.pretty_method(method_idx));
    error!("failed to write {} to {}", context, location);
    OatError::sink(context, location, err)
}

/// Advances the cursor to an alignment boundary by seeking, verifying
/// the landing position.
fn seek_code_alignment<S: OutputSink>(out: &mut S, current: u32, aligned: u32, what: &str) -> Result<u32, OatError>
{
    if aligned == current
    {
        return Ok(current);
    }
    let delta = aligned - current;
    let actual = out
        .seek(SeekFrom::Current(delta as i64))
        .map_err(|err| report_write_failure(what, out.location(), err))?;
    if actual != aligned as u64
    {
        return Err(OatError::seek_mismatch(what, aligned as u64, actual, out.location()));
    }
    Ok(aligned)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn dex_file_entry_size_matches_serialization()
    {
        let entry = OatDexFile {
            location: "core.dex".to_string(),
            location_checksum: 0x1234,
            dex_file_offset: 0x70,
            methods_offsets: vec![0x100, 0x140, 0x180],
        };
        assert_eq!(entry.to_bytes().len() as u32, entry.size());
        assert_eq!(entry.size(), 4 + 8 + 4 + 4 + 12);
    }

    #[test]
    fn class_entry_serializes_status_then_methods()
    {
        let mut oat_class = OatClass::new(ClassStatus::Error, 2);
        oat_class.method_offsets[1].code_offset = 0x2000;
        let bytes = oat_class.to_bytes();
        assert_eq!(bytes.len() as u32, oat_class.size());
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), -1);
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 0x2000);
    }

    #[test]
    fn empty_class_entry_is_status_only()
    {
        let oat_class = OatClass::new(ClassStatus::NotReady, 0);
        assert_eq!(oat_class.size(), 4);
    }
}
