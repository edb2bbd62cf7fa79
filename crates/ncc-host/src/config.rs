//! Bridge configuration.
//!
//! Every field has a default matching the NCC compiler module, so an empty
//! JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorLayout;
use crate::error::{BridgeError, BridgeResult};

/// How `puts` treats guest bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Fault the import and trap the guest.
    #[default]
    Strict,
    /// Replace invalid sequences with U+FFFD.
    Lossy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Import module name for every host function.
    pub namespace: String,
    /// Compile entry point on the compiler module.
    pub entry_point: String,
    /// Global export holding the compiler's heap base.
    pub heap_base_export: String,
    /// Linear memory export name.
    pub memory_export: String,
    /// Width of the descriptor length field. The address takes the rest.
    pub length_bits: u32,
    pub decode: DecodePolicy,
    /// Run the source preprocessor before compiling.
    pub preprocess: bool,
    /// Flush program output after every entry-point call.
    pub flush_after_call: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: "env".to_string(),
            entry_point: "getWasmFromCpp".to_string(),
            heap_base_export: "__heap_base".to_string(),
            memory_export: "memory".to_string(),
            length_bits: DescriptorLayout::DEFAULT_LENGTH_BITS,
            decode: DecodePolicy::Strict,
            preprocess: true,
            flush_after_call: false,
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        for (field, value) in [
            ("namespace", &self.namespace),
            ("entry_point", &self.entry_point),
            ("heap_base_export", &self.heap_base_export),
            ("memory_export", &self.memory_export),
        ] {
            if value.is_empty() {
                return Err(BridgeError::Config(format!("`{field}` must not be empty")));
            }
        }
        self.layout().map(|_| ())
    }

    /// The descriptor layout selected by `length_bits`.
    pub fn layout(&self) -> BridgeResult<DescriptorLayout> {
        DescriptorLayout::new(self.length_bits)
    }
}
