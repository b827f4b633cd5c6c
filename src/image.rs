/* Hook through which finalized method offsets reach resident runtime
 * method objects during an image build. */

use crate::dex::dex_file::{DexFile, InvokeType};

/// What the runtime method object's code pointer should be set to.
///
/// Static methods of classes that are not yet initialized must keep the
/// runtime's resolution stub so the class is initialized on first call;
/// publishing the oat code offset would skip that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeEntry
{
    Oat(u32),
    ResolutionStub,
}

/// Per-method metadata handed to the class linker once the layout pass
/// has finalized it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodBinding
{
    pub frame_size_in_bytes: u32,
    pub core_spill_mask: u32,
    pub fp_spill_mask: u32,
    pub mapping_table_offset: u32,
    pub vmap_table_offset: u32,
    pub gc_map_offset: u32,
    pub invoke_stub_offset: u32,
    pub code: CodeEntry,
}

/// Receives finalized offsets for every method while an image build's
/// layout pass runs.
///
/// The caller is expected to hold the runtime's mutator lock across the
/// writer's constructor; the writer itself takes no locks.
pub trait ImageBinder
{
    /// Whether the declaring class of `class_def_idx` is already
    /// initialized in the image heap.
    fn is_class_initialized(&self, dex: &DexFile, class_def_idx: u32) -> bool;

    /// Publishes one method's finalized metadata.
    fn bind_method(&mut self, dex: &DexFile, method_idx: u32, invoke_type: InvokeType, binding: &MethodBinding);
}
