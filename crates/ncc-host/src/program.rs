//! Compiled program runtime.
//!
//! A program is an artifact instantiated by the same [`Loader`] as the
//! compiler but with its own [`ImportTable`], so its output buffer, memory
//! and canvas are never shared with the compiler or another program.
//! Frame scheduling and elapsed-time bookkeeping belong to the caller.

use wasmi::TypedFunc;

use crate::error::BridgeResult;
use crate::imports::ImportTable;
use crate::loader::{GuestInstance, Loader};
use crate::memory::{ByteRange, GuestMemory, MemoryRef};

/// `start`/`main` may or may not return a status.
enum Entry {
    Void(TypedFunc<(), ()>),
    Status(TypedFunc<(), i32>),
}

pub struct Program {
    guest: GuestInstance,
    entry: Option<(String, Entry)>,
    frame: Option<(String, TypedFunc<(f32, f32), ()>)>,
    started: bool,
    flush_after_call: bool,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("guest", &self.guest)
            .field("entry", &self.entry_name())
            .field("frame", &self.frame_name())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl Program {
    pub fn load(loader: &Loader, bytes: &[u8], imports: ImportTable) -> BridgeResult<Self> {
        let guest = loader.instantiate(bytes, imports)?;

        let entry = ["start", "main"].iter().find_map(|&name| {
            if let Some(f) = guest.optional_func::<(), ()>(name) {
                Some((name.to_string(), Entry::Void(f)))
            } else {
                guest
                    .optional_func::<(), i32>(name)
                    .map(|f| (name.to_string(), Entry::Status(f)))
            }
        });
        let frame = ["update", "loop"].iter().find_map(|&name| {
            guest
                .optional_func::<(f32, f32), ()>(name)
                .map(|f| (name.to_string(), f))
        });
        tracing::debug!(
            entry = ?entry.as_ref().map(|(n, _)| n),
            frame = ?frame.as_ref().map(|(n, _)| n),
            "program loaded"
        );

        Ok(Self {
            guest,
            entry,
            frame,
            started: false,
            flush_after_call: loader.config().flush_after_call,
        })
    }

    pub fn entry_name(&self) -> Option<&str> {
        self.entry.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn frame_name(&self) -> Option<&str> {
        self.frame.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn has_frame_callback(&self) -> bool {
        self.frame.is_some()
    }

    /// Run `start` (or `main`) once.
    ///
    /// Returns the entry point's status (`0` for a void entry), or `None`
    /// when the program has no entry point or was already started.
    pub fn start(&mut self) -> BridgeResult<Option<i32>> {
        if self.started {
            return Ok(None);
        }
        self.started = true;
        let status = match &self.entry {
            None => return Ok(None),
            Some((_, Entry::Void(f))) => {
                self.guest.call(f, ())?;
                0
            }
            Some((_, Entry::Status(f))) => self.guest.call(f, ())?,
        };
        self.after_call();
        Ok(Some(status))
    }

    /// Drive one frame with `update(elapsed, delta)` (or `loop`).
    ///
    /// Returns `false` if the program has no frame callback.
    pub fn frame(&mut self, elapsed: f32, delta: f32) -> BridgeResult<bool> {
        let Some((_, f)) = &self.frame else {
            return Ok(false);
        };
        self.guest.call(f, (elapsed, delta))?;
        self.after_call();
        Ok(true)
    }

    fn after_call(&mut self) {
        if self.flush_after_call {
            self.flush_output();
        }
    }

    /// Release any partial line still buffered.
    pub fn flush_output(&mut self) {
        self.guest.state_mut().output_mut().flush();
    }

    pub fn memory_view(&self) -> GuestMemory {
        self.guest.memory()
    }

    /// Bounds-checked read of program memory.
    pub fn read(&self, range: ByteRange) -> BridgeResult<&[u8]> {
        self.guest.read(range)
    }

    pub fn resolve(&self, at: MemoryRef) -> BridgeResult<&[u8]> {
        self.guest.resolve(at)
    }

    pub fn memory_size(&self) -> usize {
        self.guest.memory_size()
    }

    pub fn guest(&self) -> &GuestInstance {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut GuestInstance {
        &mut self.guest
    }
}
