/* The facade through which the writer sees the ahead-of-time compiler. */

use crate::dex::dex_file::DexFile;
use crate::oat::align_to;

/// Target instruction set of the compiled code in an oat file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionSet
{
    Arm,
    Thumb2,
    X86,
    Mips,
}

impl InstructionSet
{
    /// Required alignment of the start of a compiled code blob.
    pub fn code_alignment(self) -> u32
    {
        match self
        {
            InstructionSet::Arm | InstructionSet::Thumb2 => 16,
            InstructionSet::X86 => 16,
            InstructionSet::Mips => 16,
        }
    }

    /// Bias added to a published code entry point. Thumb code is entered
    /// with the low bit set.
    pub fn code_delta(self) -> u32
    {
        match self
        {
            InstructionSet::Thumb2 => 1,
            _ => 0,
        }
    }

    pub(crate) fn as_u32(self) -> u32
    {
        match self
        {
            InstructionSet::Arm => 1,
            InstructionSet::Thumb2 => 2,
            InstructionSet::X86 => 3,
            InstructionSet::Mips => 4,
        }
    }
}

/// Rounds `offset` up to the code alignment of `instruction_set`.
pub fn align_code(offset: u32, instruction_set: InstructionSet) -> u32
{
    align_to(offset, instruction_set.code_alignment())
}

/// Progress of a class through loading, verification and initialization,
/// as recorded by the runtime. Serialized into each class entry.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClassStatus
{
    Error = -1,
    NotReady = 0,
    Idx = 1,
    Loaded = 2,
    Resolved = 3,
    Verifying = 4,
    RetryVerificationAtRuntime = 5,
    Verified = 6,
    Initializing = 7,
    Initialized = 8,
}

impl ClassStatus
{
    pub fn as_i32(self) -> i32
    {
        self as i32
    }
}

/// Native code and per-method metadata produced by the compiler for one
/// dex method.
#[derive(Debug)]
pub struct CompiledMethod
{
    pub instruction_set: InstructionSet,
    pub code: Vec<u8>,
    pub frame_size_in_bytes: u32,
    pub core_spill_mask: u32,
    pub fp_spill_mask: u32,
    pub mapping_table: Vec<u32>,
    pub vmap_table: Vec<u16>,
    pub gc_map: Vec<u8>,
}

impl CompiledMethod
{
    pub fn code_delta(&self) -> u32
    {
        self.instruction_set.code_delta()
    }

    /// Rounds `offset` up to where this method's code may start.
    pub fn align_code(&self, offset: u32) -> u32
    {
        align_code(offset, self.instruction_set)
    }
}

/// A managed-to-native invocation trampoline, selected by shorty and
/// staticness rather than by method.
#[derive(Debug)]
pub struct CompiledStub
{
    pub instruction_set: InstructionSet,
    pub code: Vec<u8>,
}

impl CompiledStub
{
    pub fn code_delta(&self) -> u32
    {
        self.instruction_set.code_delta()
    }
}

/// Verification outcome for a whole class.
#[derive(Debug)]
pub struct CompiledClass
{
    pub status: ClassStatus,
}

/// Read-only view of compilation results, borrowed by the writer for its
/// whole lifetime.
///
/// Repeated calls with the same arguments must return the same blob
/// contents; the writer re-queries during emission and never caches the
/// bytes itself.
pub trait Compiler
{
    fn instruction_set(&self) -> InstructionSet;

    /// True when an image is being built alongside this oat file.
    fn is_image(&self) -> bool;

    fn compiled_method(&self, dex: &DexFile, method_idx: u32) -> Option<&CompiledMethod>;

    fn compiled_class(&self, dex: &DexFile, class_def_idx: u32) -> Option<&CompiledClass>;

    /// True when the verifier rejected the class outright.
    fn is_class_rejected(&self, dex: &DexFile, class_def_idx: u32) -> bool;

    fn invoke_stub(&self, is_static: bool, shorty: &str) -> Option<&CompiledStub>;

    /// Trampoline for proxy invocation of non-static methods. Compilers
    /// that do not produce proxy stubs leave the default in place.
    fn proxy_stub(&self, _shorty: &str) -> Option<&CompiledStub>
    {
        None
    }
}
