//! Module loader.
//!
//! Turns raw bytes into an instance bound to an [`ImportTable`], then
//! rebinds the instance's [`GuestMemory`] so every later dereference goes
//! through the memory that instance actually owns.

use wasmi::{Engine, Instance, Module, Store, TypedFunc, Val, WasmParams, WasmResults};
use wasmparser::{Parser, Payload};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::imports::{HostState, ImportTable};
use crate::memory::{ByteRange, GuestMemory, MemoryRef};

/// Validates, links and instantiates guest modules.
#[derive(Debug, Default)]
pub struct Loader {
    engine: Engine,
    config: BridgeConfig,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: Engine::default(),
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// An empty import table configured like this loader.
    pub fn import_table(&self, sink: impl crate::output::OutputSink + 'static) -> ImportTable {
        ImportTable::with_config(sink, &self.config)
    }

    /// Instantiate `bytes` against `imports`.
    ///
    /// Malformed bytes fail with [`BridgeError::Validation`]; imports that do
    /// not resolve, or resolve with the wrong signature, fail with
    /// [`BridgeError::Link`]. Neither is worth retrying with the same input.
    pub fn instantiate(&self, bytes: &[u8], imports: ImportTable) -> BridgeResult<GuestInstance> {
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| BridgeError::Validation(e.to_string()))?;
        let namespace = imports.namespace().to_string();
        let (linker, state) = imports.bind(&self.engine)?;
        let mut store = Store::new(&self.engine, state);

        let pre = linker.instantiate(&mut store, &module).map_err(|e| {
            let unresolved = unresolved_imports(bytes, &namespace);
            if unresolved.is_empty() {
                BridgeError::Link(e.to_string())
            } else {
                BridgeError::Link(format!("{e} (unresolved: {})", unresolved.join(", ")))
            }
        })?;
        let instance = match pre.start(&mut store) {
            Ok(instance) => instance,
            Err(e) => return Err(guest_error(&mut store, e)),
        };

        let memory = instance.get_memory(&store, &self.config.memory_export);
        store.data_mut().memory.rebind(memory);
        tracing::debug!(
            bytes = bytes.len(),
            memory = store.data().memory.size(&store),
            generation = store.data().memory.generation(),
            "instantiated guest module"
        );
        Ok(GuestInstance { store, instance })
    }
}

/// Imports of `bytes` as `module.name`, in declaration order.
pub fn module_imports(bytes: &[u8]) -> BridgeResult<Vec<String>> {
    let mut imports = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| BridgeError::Validation(e.to_string()))?;
        if let Payload::ImportSection(reader) = payload {
            for import in reader {
                let import = import.map_err(|e| BridgeError::Validation(e.to_string()))?;
                imports.push(format!("{}.{}", import.module, import.name));
            }
        }
    }
    Ok(imports)
}

/// Imports the bridge never provides under `namespace`.
fn unresolved_imports(bytes: &[u8], namespace: &str) -> Vec<String> {
    let provided = ImportTable::names();
    module_imports(bytes)
        .unwrap_or_default()
        .into_iter()
        .filter(|qualified| match qualified.split_once('.') {
            Some((module, name)) => module != namespace || !provided.contains(&name),
            None => true,
        })
        .collect()
}

/// Map a failed guest call, preferring the fault an import recorded.
pub(crate) fn guest_error(store: &mut Store<HostState>, err: wasmi::Error) -> BridgeError {
    match store.data_mut().take_fault() {
        Some(fault) => BridgeError::Host(fault),
        None => BridgeError::Trap(err.to_string()),
    }
}

/// A live guest module with its store.
pub struct GuestInstance {
    store: Store<HostState>,
    instance: Instance,
}

impl std::fmt::Debug for GuestInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestInstance")
            .field("state", self.store.data())
            .finish_non_exhaustive()
    }
}

impl GuestInstance {
    pub fn state(&self) -> &HostState {
        self.store.data()
    }

    pub fn state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }

    pub fn memory(&self) -> GuestMemory {
        self.store.data().memory
    }

    /// The instance's whole linear memory as it is right now.
    pub fn memory_bytes(&self) -> BridgeResult<&[u8]> {
        Ok(self.store.data().memory.bytes(&self.store)?)
    }

    /// Current memory size in bytes, zero when the module exports none.
    pub fn memory_size(&self) -> usize {
        self.store.data().memory.size(&self.store)
    }

    /// Bounds-checked read of instance memory.
    pub fn read(&self, range: ByteRange) -> BridgeResult<&[u8]> {
        Ok(self.store.data().memory.read(&self.store, range)?)
    }

    /// Dereference a stamped range, rejecting refs taken under any other
    /// binding, including one from a different instance.
    pub fn resolve(&self, at: MemoryRef) -> BridgeResult<&[u8]> {
        self.store.data().memory.resolve(&self.store, at)
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Names of every export.
    pub fn export_names(&self) -> Vec<String> {
        self.instance
            .exports(&self.store)
            .map(|export| export.name().to_string())
            .collect()
    }

    /// Read an exported `i32` global as an unsigned offset.
    pub fn global_u32(&self, name: &str) -> BridgeResult<u32> {
        let global = self
            .instance
            .get_global(&self.store, name)
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;
        match global.get(&self.store) {
            Val::I32(v) => Ok(v as u32),
            _ => Err(BridgeError::MissingExport(name.to_string())),
        }
    }

    pub fn typed_func<P: WasmParams, R: WasmResults>(
        &self,
        name: &str,
    ) -> BridgeResult<TypedFunc<P, R>> {
        self.instance
            .get_typed_func::<P, R>(&self.store, name)
            .map_err(|_| BridgeError::MissingExport(name.to_string()))
    }

    /// A function export, or `None` if absent or of another signature.
    pub fn optional_func<P: WasmParams, R: WasmResults>(&self, name: &str) -> Option<TypedFunc<P, R>> {
        self.instance.get_typed_func::<P, R>(&self.store, name).ok()
    }

    /// Call into the guest, surfacing host faults over the bare trap.
    pub fn call<P: WasmParams, R: WasmResults>(
        &mut self,
        func: &TypedFunc<P, R>,
        params: P,
    ) -> BridgeResult<R> {
        match func.call(&mut self.store, params) {
            Ok(results) => Ok(results),
            Err(e) => Err(guest_error(&mut self.store, e)),
        }
    }
}
