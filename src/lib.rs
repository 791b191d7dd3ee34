//! Chained multi-pass GPU compute primitives over u32 arrays: sum reduction,
//! inclusive prefix scan, and stable LSD radix sort. Rust: wgpu 0.19.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod readback;
pub mod reduce;
pub mod scan;
pub mod sort;

pub use config::{PipelineConfig, ReduceConfig, ScanConfig, SortConfig};
pub use dispatch::Dispatcher;
pub use error::{ComputeError, ComputeResult};
pub use kernel::{BufferRole, Kernel, KernelBuilder};
pub use readback::read_buffer_u32;
pub use reduce::ReductionChain;
pub use scan::ScanEngine;
pub use sort::RadixSortEngine;
