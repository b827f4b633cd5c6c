//! # Oat
//!
//! A library for writing Android OAT files: a single binary artifact
//! bundling one or more dex containers with ahead-of-time compiled
//! native code and the per-method metadata the runtime maps in at
//! execution time.
//!
//! The writer works in two passes. Constructing an [`OatWriter`] lays
//! out the whole file, assigning every absolute offset up front
//! (including the shared offsets of content-deduplicated code and
//! table blobs) and fixing the header checksum. [`OatWriter::write`]
//! then streams the bytes to a seekable sink, re-deriving and
//! re-checking each offset as it goes.

pub mod compiler;
pub mod dex;
pub mod image;
pub mod oat;
pub mod sink;

pub use crate::compiler::{
    ClassStatus, CompiledClass, CompiledMethod, CompiledStub, Compiler, InstructionSet,
};
pub use crate::dex::dex_file::DexFile;
pub use crate::image::{CodeEntry, ImageBinder, MethodBinding};
pub use crate::oat::error::OatError;
pub use crate::oat::writer::{MethodOffsets, OatWriter};
pub use crate::sink::{FileSink, OutputSink, VecSink};

#[cfg(test)]
mod tests;
