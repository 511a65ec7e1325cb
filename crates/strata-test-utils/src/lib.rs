//! Test utilities and a software reference device for Strata development.
//!
//! [`SoftDevice`] implements [`strata_core::Device`] entirely on the CPU:
//! resources are byte vectors, command lists execute in order on a
//! dedicated "soft-gpu" thread, and every submission advances a fence
//! timeline that callers can wait on. Compute programs are resolved from a
//! registry of [`strata_core::ComputeKernel`]s.
//!
//! Test hooks let a scenario pause execution (to hold fences back), lose
//! the device, cap memory, poke buffer contents and inspect the indirect
//! draws a frame produced.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod exec;

pub mod device;
pub mod fixtures;

pub use device::{DrawRecord, SoftDevice, SoftStats};
pub use fixtures::{byte_pattern, read_pod, read_pods};
