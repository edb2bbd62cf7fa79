//! Compile invocation bridge.
//!
//! 1. Encode the (preprocessed) source as UTF-8.
//! 2. Copy it into compiler memory at `__heap_base`.
//! 3. Call the entry point with `(heap_base, len)`.
//! 4. Decode the packed descriptor.
//! 5. Hand back the described bytes of compiler memory.
//!
//! The source region and the artifact both live in the compiler's memory
//! and are overwritten by the next compile, so [`Compiler::compile`]
//! returns an [`Artifact`] that borrows the compiler mutably: a second
//! compile cannot start until the first artifact is dropped or copied out.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wasmi::TypedFunc;

use crate::config::BridgeConfig;
use crate::descriptor::{Descriptor, DescriptorLayout};
use crate::error::{BridgeError, BridgeResult};
use crate::imports::ImportTable;
use crate::loader::{GuestInstance, Loader};
use crate::memory::{ByteRange, MemoryRef};
use crate::preprocess::Preprocessor;

/// A compiler module ready to accept source text.
pub struct Compiler {
    guest: GuestInstance,
    entry: TypedFunc<(i32, i32), i32>,
    heap_base: u32,
    layout: DescriptorLayout,
    preprocessor: Option<Preprocessor>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("guest", &self.guest)
            .field("heap_base", &self.heap_base)
            .field("layout", &self.layout)
            .field("preprocess", &self.preprocessor.is_some())
            .finish_non_exhaustive()
    }
}

/// Compiled program bytes, borrowed from compiler memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Artifact<'a> {
    bytes: &'a [u8],
    at: MemoryRef,
}

impl<'a> Artifact<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Where the artifact sits in compiler memory.
    pub fn location(&self) -> MemoryRef {
        self.at
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the bytes out so they outlive the next compile.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Lowercase hex SHA-256 of the bytes.
    pub fn sha256(&self) -> String {
        hex_digest(self.bytes)
    }
}

/// Serializable outcome of one compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl Compiler {
    /// Instantiate the compiler module and locate its entry point,
    /// memory and heap base.
    pub fn load(loader: &Loader, bytes: &[u8], imports: ImportTable) -> BridgeResult<Self> {
        let config = loader.config();
        let layout = config.layout()?;
        let guest = loader.instantiate(bytes, imports)?;
        if !guest.memory().is_bound() {
            return Err(BridgeError::MissingExport(config.memory_export.clone()));
        }
        let heap_base = guest.global_u32(&config.heap_base_export)?;
        let entry = guest.typed_func::<(i32, i32), i32>(&config.entry_point)?;
        let preprocessor = if config.preprocess {
            Some(Preprocessor::new()?)
        } else {
            None
        };
        tracing::debug!(heap_base, entry = %config.entry_point, "compiler module loaded");
        Ok(Self {
            guest,
            entry,
            heap_base,
            layout,
            preprocessor,
        })
    }

    /// Read the compiler module from `path` and load it.
    pub fn load_file(
        loader: &Loader,
        path: impl AsRef<Path>,
        imports: ImportTable,
    ) -> BridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::load(loader, &bytes, imports)
    }

    /// Load with a default loader and the given configuration.
    pub fn with_config(
        config: BridgeConfig,
        bytes: &[u8],
        sink: impl crate::output::OutputSink + 'static,
    ) -> BridgeResult<Self> {
        let loader = Loader::with_config(config)?;
        let imports = loader.import_table(sink);
        Self::load(&loader, bytes, imports)
    }

    pub fn heap_base(&self) -> u32 {
        self.heap_base
    }

    pub fn layout(&self) -> DescriptorLayout {
        self.layout
    }

    pub fn guest(&self) -> &GuestInstance {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut GuestInstance {
        &mut self.guest
    }

    /// Bytes free above the heap base.
    pub fn available(&self) -> usize {
        let size = self.guest.memory().size(self.guest.store());
        size.saturating_sub(self.heap_base as usize)
    }

    /// Compile `source` and borrow the resulting bytes.
    pub fn compile(&mut self, source: &str) -> BridgeResult<Artifact<'_>> {
        let text = match &self.preprocessor {
            Some(pp) => pp.run(source),
            None => source.to_string(),
        };
        let encoded = text.as_bytes();

        let available = self.available();
        if encoded.len() > available || encoded.len() > i32::MAX as usize {
            return Err(BridgeError::Capacity {
                needed: encoded.len(),
                available,
            });
        }
        let memory = self.guest.memory();
        memory.write(self.guest.store_mut(), self.heap_base, encoded)?;

        let raw = self.guest.call(
            &self.entry,
            (self.heap_base as i32, encoded.len() as i32),
        )? as u32;
        let descriptor = self.layout.decode(raw);
        tracing::debug!(
            source_len = encoded.len(),
            descriptor = %format!("{raw:#010x}"),
            "compile entry point returned"
        );

        let range = match descriptor {
            Descriptor::Artifact(range) => range,
            Descriptor::Failure { message_len } => {
                let message = memory
                    .read(self.guest.store(), ByteRange::new(self.heap_base, message_len))
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_else(|_| format!("{message_len}-byte diagnostic out of bounds"));
                tracing::debug!(%message, "compiler reported failure");
                return Err(BridgeError::CompilerFailed(message));
            }
        };

        let at = memory.stamp(range);
        let bytes = memory.resolve(self.guest.store(), at).map_err(|e| match e {
            BridgeError::Host(_) => BridgeError::ArtifactOutOfBounds {
                address: range.offset,
                len: range.len,
                memory_size: memory.size(self.guest.store()),
            },
            other => other,
        })?;
        tracing::debug!(address = range.offset, len = range.len, "artifact ready");
        Ok(Artifact { bytes, at })
    }

    /// Compile and copy the artifact out.
    pub fn compile_to_vec(&mut self, source: &str) -> BridgeResult<Vec<u8>> {
        self.compile(source).map(|artifact| artifact.to_vec())
    }

    /// Compile into a serializable result; failures become `success: false`.
    pub fn compile_to_result(&mut self, source: &str) -> CompileResult {
        match self.compile(source) {
            Ok(artifact) => CompileResult {
                success: true,
                wasm: Some(artifact.to_vec()),
                sha256: Some(artifact.sha256()),
                error: None,
            },
            Err(e) => CompileResult {
                success: false,
                wasm: None,
                sha256: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Flush anything the compiler printed without a trailing newline.
    pub fn flush_output(&mut self) {
        self.guest.state_mut().output_mut().flush();
    }
}
