//! Error types for the device contract and kernel execution.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::id::{BufferId, FenceValue, ProgramId, TextureId};

/// Errors reported by a [`Device`](crate::Device).
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceError {
    /// A command or call referenced a buffer the device does not know.
    UnknownBuffer {
        /// The offending id.
        id: BufferId,
    },
    /// A command or call referenced a texture the device does not know.
    UnknownTexture {
        /// The offending id.
        id: TextureId,
    },
    /// A view outlived the owner it was created from.
    ResourceReleased,
    /// A byte range fell outside the resource it addresses.
    OutOfBounds {
        /// Starting byte offset of the access.
        offset: u64,
        /// Length of the access in bytes.
        len: u64,
        /// Size of the addressed resource in bytes.
        size: u64,
    },
    /// The device could not back a resource of the requested size.
    OutOfMemory {
        /// Bytes requested by the failed creation.
        requested_bytes: u64,
    },
    /// A resource description was rejected.
    InvalidDescription {
        /// Why the description is invalid.
        reason: String,
    },
    /// A buffer was mapped for CPU access without `UPLOAD` usage.
    NotMappable {
        /// The offending id.
        id: BufferId,
    },
    /// A pipeline named a program the device cannot execute.
    UnknownProgram {
        /// The unresolved program.
        program: ProgramId,
    },
    /// A program failed while executing.
    Kernel {
        /// The failing program.
        program: ProgramId,
        /// What went wrong.
        error: KernelError,
    },
    /// A fence wait exceeded its bound.
    Timeout {
        /// The fence value being waited for.
        fence: FenceValue,
        /// How long the caller waited.
        waited: Duration,
    },
    /// The device stopped executing work and will not recover.
    Lost {
        /// Why the device was lost.
        reason: String,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBuffer { id } => write!(f, "unknown {id}"),
            Self::UnknownTexture { id } => write!(f, "unknown {id}"),
            Self::ResourceReleased => write!(f, "view refers to a released resource"),
            Self::OutOfBounds { offset, len, size } => write!(
                f,
                "access of {len} bytes at offset {offset} exceeds resource size {size}"
            ),
            Self::OutOfMemory { requested_bytes } => {
                write!(f, "device out of memory allocating {requested_bytes} bytes")
            }
            Self::InvalidDescription { reason } => {
                write!(f, "invalid resource description: {reason}")
            }
            Self::NotMappable { id } => write!(f, "{id} is not CPU-mappable"),
            Self::UnknownProgram { program } => write!(f, "unknown program '{program}'"),
            Self::Kernel { program, error } => write!(f, "program '{program}' failed: {error}"),
            Self::Timeout { fence, waited } => {
                write!(f, "fence {fence} not reached after {waited:?}")
            }
            Self::Lost { reason } => write!(f, "device lost: {reason}"),
        }
    }
}

impl Error for DeviceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kernel { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Errors raised by a program while a device executes it.
///
/// On a real GPU these would be undefined behaviour; a software device
/// reports them so that logic bugs surface as test failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// The program read a binding the pipeline does not provide.
    MissingBinding {
        /// Binding name.
        name: String,
    },
    /// A binding exists but has the wrong kind (buffer, texture, ...).
    BindingKind {
        /// Binding name.
        name: String,
        /// What the program expected.
        expected: &'static str,
    },
    /// An element index was outside the bound view.
    OutOfBounds {
        /// Binding name.
        binding: String,
        /// The offending element index.
        index: u64,
        /// Number of elements in the view.
        len: u64,
    },
    /// The program's element size does not match the view's stride.
    StrideMismatch {
        /// Binding name.
        binding: String,
        /// Bytes the program tried to move.
        requested: usize,
        /// Stride of the view.
        stride: u32,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBinding { name } => write!(f, "binding '{name}' is not bound"),
            Self::BindingKind { name, expected } => {
                write!(f, "binding '{name}' is not a {expected}")
            }
            Self::OutOfBounds {
                binding,
                index,
                len,
            } => write!(f, "index {index} out of bounds for '{binding}' (len {len})"),
            Self::StrideMismatch {
                binding,
                requested,
                stride,
            } => write!(
                f,
                "'{binding}' has stride {stride}, program accessed {requested} bytes"
            ),
        }
    }
}

impl Error for KernelError {}
