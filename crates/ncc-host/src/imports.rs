//! Host import table.
//!
//! Builds the exact set of functions a guest may import, each one adapting
//! guest-native arguments into text on the [`OutputChannel`] (or a draw
//! call on the [`Canvas`]). Everything an import touches lives in the
//! [`HostState`] carried by the store; nothing is read from ambient state.

use wasmi::{Caller, Engine, Extern, Linker};

use crate::canvas::{Canvas, DrawCall};
use crate::config::{BridgeConfig, DecodePolicy};
use crate::error::{BridgeError, BridgeResult, HostFault};
use crate::math;
use crate::memory::{ByteRange, GuestMemory};
use crate::numeric::HostValue;
use crate::output::{OutputChannel, OutputSink};

/// Output and drawing imports, in addition to [`math::UNARY`],
/// [`math::BINARY`] and `random`.
pub const OUTPUT_IMPORTS: &[&str] = &[
    "puts",
    "put",
    "putbool",
    "puti32",
    "putu32",
    "putf32",
    "putf64",
    "flushStdout",
    "drawCircle",
];

pub(crate) fn link_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Link(e.to_string())
}

/// Per-instance host state reachable from every import.
pub struct HostState {
    pub(crate) output: OutputChannel,
    pub(crate) memory: GuestMemory,
    pub(crate) memory_export: String,
    pub(crate) canvas: Option<Box<dyn Canvas>>,
    pub(crate) rng: fastrand::Rng,
    pub(crate) decode: DecodePolicy,
    /// Fault recorded by the import that last trapped the guest.
    pub(crate) fault: Option<HostFault>,
}

impl HostState {
    pub fn output(&self) -> &OutputChannel {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputChannel {
        &mut self.output
    }

    pub fn memory(&self) -> GuestMemory {
        self.memory
    }

    pub(crate) fn take_fault(&mut self) -> Option<HostFault> {
        self.fault.take()
    }

    fn put(&mut self, value: HostValue) {
        self.output.write(&value.render());
    }

    fn draw(&mut self, call: DrawCall) {
        match self.canvas.as_mut() {
            Some(canvas) => canvas.draw(call),
            None => {
                let DrawCall::Circle { x, y, r } = call;
                let line = format!(
                    "drawCircle({}, {}, {})\n",
                    HostValue::Float32(x).render(),
                    HostValue::Float32(y).render(),
                    HostValue::Float32(r).render()
                );
                self.output.write(&line);
            }
        }
    }
}

impl std::fmt::Debug for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostState")
            .field("output", &self.output)
            .field("memory", &self.memory)
            .field("canvas", &self.canvas.is_some())
            .field("decode", &self.decode)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

/// The functions offered to one guest instantiation.
///
/// A table is consumed when a module is instantiated against it, so every
/// instance gets its own output buffer, memory handle and canvas.
pub struct ImportTable {
    namespace: String,
    state: HostState,
}

impl ImportTable {
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self::with_config(sink, &BridgeConfig::default())
    }

    pub fn with_config(sink: impl OutputSink + 'static, config: &BridgeConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            state: HostState {
                output: OutputChannel::new(sink),
                memory: GuestMemory::unbound(),
                memory_export: config.memory_export.clone(),
                canvas: None,
                rng: fastrand::Rng::new(),
                decode: config.decode,
                fault: None,
            },
        }
    }

    /// Forward `drawCircle` to `canvas` instead of echoing it as text.
    pub fn with_canvas(mut self, canvas: impl Canvas + 'static) -> Self {
        self.state.canvas = Some(Box::new(canvas));
        self
    }

    /// Seed `random` for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.state.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Every import name this table provides.
    pub fn names() -> Vec<&'static str> {
        OUTPUT_IMPORTS
            .iter()
            .copied()
            .chain(math::UNARY.iter().map(|(n, _)| *n))
            .chain(math::BINARY.iter().map(|(n, _)| *n))
            .chain(std::iter::once("random"))
            .collect()
    }

    /// Build the linker and hand over the state the store will own.
    pub(crate) fn bind(self, engine: &Engine) -> BridgeResult<(Linker<HostState>, HostState)> {
        let mut linker = Linker::<HostState>::new(engine);
        register_output(&mut linker, &self.namespace)?;
        math::register(&mut linker, &self.namespace)?;
        Ok((linker, self.state))
    }
}

fn register_output(linker: &mut Linker<HostState>, ns: &str) -> BridgeResult<()> {
    linker
        .func_wrap(
            ns,
            "puts",
            |mut caller: Caller<'_, HostState>, address: i32, len: i32| -> Result<(), wasmi::Error> {
                let range = ByteRange::new(address as u32, len as u32);
                match read_text(&caller, range) {
                    Ok(text) => {
                        caller.data_mut().output.write(&text);
                        Ok(())
                    }
                    Err(fault) => Err(raise(&mut caller, fault)),
                }
            },
        )
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "put", |mut caller: Caller<'_, HostState>, code: i32| {
            caller.data_mut().put(HostValue::Char(code))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "putbool", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().put(HostValue::Bool(v))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "puti32", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().put(HostValue::Signed32(v))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "putu32", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().put(HostValue::Unsigned32(v))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "putf32", |mut caller: Caller<'_, HostState>, v: f32| {
            caller.data_mut().put(HostValue::Float32(v))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "putf64", |mut caller: Caller<'_, HostState>, v: f64| {
            caller.data_mut().put(HostValue::Float64(v))
        })
        .map_err(link_error)?;
    linker
        .func_wrap(ns, "flushStdout", |mut caller: Caller<'_, HostState>| {
            caller.data_mut().output.flush()
        })
        .map_err(link_error)?;
    linker
        .func_wrap(
            ns,
            "drawCircle",
            |mut caller: Caller<'_, HostState>, x: f32, y: f32, r: f32| {
                caller.data_mut().draw(DrawCall::Circle { x, y, r })
            },
        )
        .map_err(link_error)?;
    Ok(())
}

/// Decode the guest text at `range` under the table's decode policy.
fn read_text(caller: &Caller<'_, HostState>, range: ByteRange) -> Result<String, HostFault> {
    let state = caller.data();
    let memory = state
        .memory
        .handle()
        .or_else(|| {
            caller
                .get_export(&state.memory_export)
                .and_then(Extern::into_memory)
        })
        .ok_or(HostFault::NoMemory)?;
    let bytes = range.slice(memory.data(caller))?;
    match state.decode {
        DecodePolicy::Strict => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| HostFault::Decode {
                address: range.offset,
                len: range.len,
            }),
        DecodePolicy::Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Record `fault` for the bridge and turn it into a guest trap.
fn raise(caller: &mut Caller<'_, HostState>, fault: HostFault) -> wasmi::Error {
    tracing::debug!(%fault, "host import faulted");
    caller.data_mut().fault = Some(fault.clone());
    wasmi::Error::host(fault)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_names_cover_output_and_math() {
        let names = ImportTable::names();
        for name in ["puts", "putu32", "flushStdout", "drawCircle", "sin", "pow", "random"] {
            assert!(names.contains(&name), "missing {name}");
        }
        assert_eq!(
            names.len(),
            OUTPUT_IMPORTS.len() + math::UNARY.len() + math::BINARY.len() + 1
        );
    }

    #[test]
    fn namespace_follows_config() {
        let config = BridgeConfig {
            namespace: "host".to_string(),
            ..BridgeConfig::default()
        };
        let table = ImportTable::with_config(|_: &str| {}, &config);
        assert_eq!(table.namespace(), "host");
    }
}
