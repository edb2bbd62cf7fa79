//! NCC host bridge: hosts the NCC compiler module on `wasmi` and mediates
//! every exchange between the host and guest code.
//!
//! # Flow
//!
//! ```text
//! source ─► Preprocessor ─► Compiler (guest) ─► packed descriptor ─► artifact bytes
//!                                                                        │
//!                     Loader + fresh ImportTable ◄───────────────────────┘
//!                                  │
//!                               Program ─► start() / frame(elapsed, delta)
//! ```
//!
//! ## Imports (guest → host, namespace `env`)
//! - `puts(addr, len)`, `put(char)`, `putbool(v)`, `puti32(v)`, `putu32(v)`,
//!   `putf32(v)`, `putf64(v)`, `flushStdout()`
//! - `drawCircle(x, y, r)`
//! - the math set (`sin`, `pow`, `random`, …), see [`math`]
//!
//! ## Exports (host → guest)
//! - compiler: `getWasmFromCpp(offset, len) → descriptor`, `memory`, `__heap_base`
//! - program: optional `start` / `main`, optional `update` / `loop`, optional `memory`

pub mod canvas;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod imports;
pub mod loader;
pub mod math;
pub mod memory;
pub mod numeric;
pub mod output;
pub mod preprocess;
pub mod program;

pub use canvas::{Canvas, DrawCall, RecordingCanvas};
pub use compiler::{Artifact, CompileResult, Compiler};
pub use config::{BridgeConfig, DecodePolicy};
pub use descriptor::{Descriptor, DescriptorLayout};
pub use error::{BridgeError, BridgeResult, HostFault};
pub use imports::{HostState, ImportTable};
pub use loader::{GuestInstance, Loader};
pub use memory::{ByteRange, GuestMemory, MemoryRef};
pub use numeric::HostValue;
pub use output::{CaptureSink, OutputChannel, OutputSink, StdoutSink};
pub use preprocess::Preprocessor;
pub use program::Program;
