//! Guest memory views.
//!
//! A module's linear memory can grow, and every (re)instantiation binds a
//! different one, so the host never caches a raw pointer into it. Instead
//! it holds a [`GuestMemory`] handle and resolves [`ByteRange`]s against the
//! store on every access, bounds-checked against the memory's current size.
//! Each rebind draws a fresh generation from a process-wide counter, so a
//! [`MemoryRef`] taken under one binding refuses to resolve under any other,
//! whether that is a later binding of the same instance or another instance.
//!
//! Store-taking accessors are crate-private: a handle must only ever meet
//! the store it was bound in, which [`GuestInstance`](crate::loader::GuestInstance)
//! guarantees by owning both.

use std::sync::atomic::{AtomicU64, Ordering};

use wasmi::{Memory, StoreContext, StoreContextMut};

use crate::error::{BridgeError, BridgeResult, HostFault};

/// An `(offset, len)` pair addressing guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u32,
    pub len: u32,
}

impl ByteRange {
    pub fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Exclusive end, computed without overflow.
    pub fn end(self) -> u64 {
        u64::from(self.offset) + u64::from(self.len)
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    fn out_of_bounds(self, memory_size: usize) -> HostFault {
        HostFault::OutOfBounds {
            address: self.offset,
            len: self.len,
            memory_size,
        }
    }

    /// Borrow this range out of `data`, or report how it overflows.
    pub fn slice(self, data: &[u8]) -> Result<&[u8], HostFault> {
        if self.end() > data.len() as u64 {
            return Err(self.out_of_bounds(data.len()));
        }
        Ok(&data[self.offset as usize..self.end() as usize])
    }
}

/// A range stamped with the memory generation it was taken under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRef {
    pub generation: u64,
    pub range: ByteRange,
}

/// Zero is reserved for handles that were never bound.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Rebindable handle to an instance's linear memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestMemory {
    memory: Option<Memory>,
    generation: u64,
}

impl GuestMemory {
    /// A handle bound to no memory yet.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Bind to the memory of a fresh instance. Invalidates all earlier refs.
    pub fn rebind(&mut self, memory: Option<Memory>) {
        self.memory = memory;
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_bound(&self) -> bool {
        self.memory.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self) -> Option<Memory> {
        self.memory
    }

    /// Current size in bytes, zero when unbound.
    pub(crate) fn size<'a, T: 'a>(&self, ctx: impl Into<StoreContext<'a, T>>) -> usize {
        self.memory.map_or(0, |m| m.data(ctx).len())
    }

    /// The whole current memory.
    pub(crate) fn bytes<'a, T: 'a>(
        &self,
        ctx: impl Into<StoreContext<'a, T>>,
    ) -> Result<&'a [u8], HostFault> {
        let memory = self.memory.ok_or(HostFault::NoMemory)?;
        Ok(memory.data(ctx))
    }

    pub(crate) fn read<'a, T: 'a>(
        &self,
        ctx: impl Into<StoreContext<'a, T>>,
        range: ByteRange,
    ) -> Result<&'a [u8], HostFault> {
        range.slice(self.bytes(ctx)?)
    }

    /// Copy `bytes` into guest memory at `offset`. Never grows the memory.
    pub(crate) fn write<'a, T: 'a>(
        &self,
        ctx: impl Into<StoreContextMut<'a, T>>,
        offset: u32,
        bytes: &[u8],
    ) -> Result<(), HostFault> {
        let memory = self.memory.ok_or(HostFault::NoMemory)?;
        let data = memory.data_mut(ctx);
        let range = ByteRange::new(offset, bytes.len() as u32);
        if bytes.len() > u32::MAX as usize || range.end() > data.len() as u64 {
            return Err(range.out_of_bounds(data.len()));
        }
        data[offset as usize..range.end() as usize].copy_from_slice(bytes);
        Ok(())
    }

    pub fn stamp(&self, range: ByteRange) -> MemoryRef {
        MemoryRef {
            generation: self.generation,
            range,
        }
    }

    /// Resolve a stamped range, rejecting refs from an earlier binding.
    pub(crate) fn resolve<'a, T: 'a>(
        &self,
        ctx: impl Into<StoreContext<'a, T>>,
        at: MemoryRef,
    ) -> BridgeResult<&'a [u8]> {
        if at.generation != self.generation {
            return Err(BridgeError::StaleView {
                held: at.generation,
                current: self.generation,
            });
        }
        Ok(self.read(ctx, at.range)?)
    }
}
