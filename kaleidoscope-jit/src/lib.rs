//! A Cranelift based [ExecutionBackend](kaleidoscope::backend::ExecutionBackend)
//! for Kaleidoscope, and the host functions compiled code may call.

pub mod host;
pub mod jit;
pub mod lower;
pub mod symbols;

pub use jit::{CraneliftJit, JitConfig, LinkErr};
pub use symbols::UnitHandle;

// Used by [host_function!].
#[doc(hidden)]
pub use linkme;
