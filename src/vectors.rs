//! Interrupt vector table
//!
//! A fixed array of slots indexed by vector number:
//!
//! ```text
//!   0        initial stack top (data, not code)
//!   1..=15   core exceptions (7..=10 and 13 unused)
//!   16..=31  reserved, shared default handler
//!   32 + N   external line N  ==  GIC INTID 32 + N
//! ```
//!
//! The table is populated once through [`VectorTableBuilder`] and has no
//! mutating methods afterwards.

use crate::error::{Error, Result};

/// First slot of the external range
pub const EXTERNAL_BASE: usize = 32;

/// Number of external lines the table covers
pub const EXTERNAL_LINES: usize = 32;

/// Total slot count
pub const VECTOR_COUNT: usize = EXTERNAL_BASE + EXTERNAL_LINES;

/// Handler for an external interrupt line
///
/// Implementors own whatever state they need; the table only holds a
/// shared reference.
pub trait IrqHandler: Sync {
    fn handle(&self);
}

impl<F: Fn() + Sync> IrqHandler for F {
    fn handle(&self) {
        self()
    }
}

/// Core exceptions that own a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreException {
    Reset = 1,
    Nmi = 2,
    HardFault = 3,
    MemManage = 4,
    BusFault = 5,
    UsageFault = 6,
    SvCall = 11,
    DebugMonitor = 12,
    PendSv = 14,
    SysTick = 15,
}

impl CoreException {
    pub const ALL: [CoreException; 10] = [
        CoreException::Reset,
        CoreException::Nmi,
        CoreException::HardFault,
        CoreException::MemManage,
        CoreException::BusFault,
        CoreException::UsageFault,
        CoreException::SvCall,
        CoreException::DebugMonitor,
        CoreException::PendSv,
        CoreException::SysTick,
    ];

    #[inline]
    pub const fn slot(self) -> usize {
        self as usize
    }
}

/// Contents of one vector slot
#[derive(Clone, Copy)]
pub enum Slot<'h> {
    /// Initial stack pointer value
    StackTop(usize),
    /// Entry address of a core exception handler
    Exception { kind: CoreException, entry: usize },
    /// The shared default handler
    Default,
    /// A registered external handler
    Handler(&'h dyn IrqHandler),
    /// No handler; must never be called
    Empty,
}

impl Slot<'_> {
    /// Whether an external slot holds something the dispatcher may call.
    pub fn is_registered(&self) -> bool {
        matches!(self, Slot::Handler(_))
    }
}

impl core::fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Slot::StackTop(addr) => write!(f, "StackTop({:#x})", addr),
            Slot::Exception { kind, entry } => write!(f, "Exception({:?} @ {:#x})", kind, entry),
            Slot::Default => f.write_str("Default"),
            Slot::Handler(_) => f.write_str("Handler"),
            Slot::Empty => f.write_str("Empty"),
        }
    }
}

/// Shared handler for unexpected events: the core stops where a debugger
/// can see it.
pub extern "C" fn default_handler() {
    crate::halt();
}

/// The populated vector table
pub struct VectorTable<'h> {
    slots: [Slot<'h>; VECTOR_COUNT],
}

impl<'h> VectorTable<'h> {
    /// Start a table with the architecture's fixed layout.
    pub fn builder(stack_top: usize, reset: usize) -> VectorTableBuilder<'h> {
        VectorTableBuilder::new(stack_top, reset)
    }

    #[inline]
    pub const fn len(&self) -> usize {
        VECTOR_COUNT
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Slot at a raw vector index.
    #[inline]
    pub fn slot(&self, index: usize) -> Option<&Slot<'h>> {
        self.slots.get(index)
    }

    /// Handler registered for controller interrupt `intid`.
    ///
    /// Only the external range is ever consulted: an INTID below
    /// [`EXTERNAL_BASE`] or past the table, and any slot without a
    /// registered handler, yields `None`.
    #[inline]
    pub fn external(&self, intid: u32) -> Option<&'h dyn IrqHandler> {
        let index = intid as usize;
        if index < EXTERNAL_BASE {
            return None;
        }
        match self.slots.get(index)? {
            Slot::Handler(handler) => Some(*handler),
            _ => None,
        }
    }
}

/// Populates a [`VectorTable`]
pub struct VectorTableBuilder<'h> {
    slots: [Slot<'h>; VECTOR_COUNT],
}

impl<'h> VectorTableBuilder<'h> {
    fn new(stack_top: usize, reset: usize) -> Self {
        let mut slots = [Slot::Default; VECTOR_COUNT];
        slots[0] = Slot::StackTop(stack_top);
        for slot in &mut slots[1..16] {
            *slot = Slot::Empty;
        }
        let default_entry = default_handler as usize;
        for kind in CoreException::ALL {
            let entry = if kind == CoreException::Reset {
                reset
            } else {
                default_entry
            };
            slots[kind.slot()] = Slot::Exception { kind, entry };
        }
        Self { slots }
    }

    /// Override a core exception entry.
    pub fn exception(mut self, kind: CoreException, entry: usize) -> Self {
        self.slots[kind.slot()] = Slot::Exception { kind, entry };
        self
    }

    /// Register the handler for external line `line`.
    pub fn register(mut self, line: u32, handler: &'h dyn IrqHandler) -> Result<Self> {
        let index = EXTERNAL_BASE
            .checked_add(line as usize)
            .filter(|&i| i < VECTOR_COUNT)
            .ok_or(Error::InvalidLine(line))?;
        if self.slots[index].is_registered() {
            log::warn!("vectors: replacing handler on line {}", line);
        }
        self.slots[index] = Slot::Handler(handler);
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> VectorTable<'h> {
        VectorTable { slots: self.slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reset_stub() {}

    fn table<'h>(handlers: &[(u32, &'h dyn IrqHandler)]) -> VectorTable<'h> {
        let mut builder = VectorTable::builder(0x2000_8000, reset_stub as usize);
        for &(line, handler) in handlers {
            builder = builder.register(line, handler).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_fixed_layout() {
        let t = table(&[]);
        assert_eq!(t.len(), 64);
        assert!(matches!(t.slot(0), Some(Slot::StackTop(0x2000_8000))));
        assert!(matches!(
            t.slot(1),
            Some(Slot::Exception { kind: CoreException::Reset, entry }) if *entry == reset_stub as usize
        ));
        for i in [2, 3, 4, 5, 6, 11, 12, 14, 15] {
            assert!(
                matches!(t.slot(i), Some(Slot::Exception { entry, .. }) if *entry == default_handler as usize),
                "slot {}",
                i
            );
        }
        for i in [7, 8, 9, 10, 13] {
            assert!(matches!(t.slot(i), Some(Slot::Empty)), "slot {}", i);
        }
        for i in 16..64 {
            assert!(matches!(t.slot(i), Some(Slot::Default)), "slot {}", i);
        }
        assert!(t.slot(64).is_none());
    }

    #[test]
    fn test_external_slots_are_registered_or_empty() {
        let hits = AtomicUsize::new(0);
        let handler = || {
            hits.fetch_add(1, Ordering::SeqCst);
        };
        let t = table(&[(5, &handler as &dyn IrqHandler), (31, &handler)]);

        for line in 0..EXTERNAL_LINES as u32 {
            let intid = EXTERNAL_BASE as u32 + line;
            let slot = t.slot(intid as usize).unwrap();
            match t.external(intid) {
                Some(h) => {
                    assert!(slot.is_registered());
                    h.handle();
                }
                None => assert!(matches!(slot, Slot::Default)),
            }
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_external_never_reads_core_range() {
        let handler = || {};
        let t = table(&[(0, &handler as &dyn IrqHandler)]);
        for intid in 0..EXTERNAL_BASE as u32 {
            assert!(t.external(intid).is_none());
        }
        assert!(t.external(32).is_some());
        assert!(t.external(64).is_none());
        assert!(t.external(0x3FF).is_none());
    }

    #[test]
    fn test_register_twice_last_wins() {
        let first = AtomicUsize::new(0);
        let second = AtomicUsize::new(0);
        let h1 = || {
            first.fetch_add(1, Ordering::SeqCst);
        };
        let h2 = || {
            second.fetch_add(1, Ordering::SeqCst);
        };
        let t = table(&[(7, &h1 as &dyn IrqHandler), (7, &h2)]);

        assert!(t.slot(EXTERNAL_BASE + 7).unwrap().is_registered());
        assert!(!t.slot(EXTERNAL_BASE + 8).unwrap().is_registered());
        t.external(EXTERNAL_BASE as u32 + 7).unwrap().handle();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_out_of_range() {
        let handler = || {};
        let builder = VectorTable::builder(0, 0);
        assert!(matches!(
            builder.register(32, &handler),
            Err(Error::InvalidLine(32))
        ));
    }

    #[test]
    fn test_exception_override() {
        extern "C" fn hard_fault() {}
        let t = VectorTable::builder(0, 0)
            .exception(CoreException::HardFault, hard_fault as usize)
            .build();
        assert!(matches!(
            t.slot(3),
            Some(Slot::Exception { kind: CoreException::HardFault, entry }) if *entry == hard_fault as usize
        ));
    }
}
