//! Interrupt dispatch
//!
//! One dispatch cycle is acknowledge → look up → invoke → end-of-interrupt.
//! It can be entered from the IRQ vector or from an idle-loop poll; both go
//! through [`Dispatcher::dispatch`], which requires proof that processor
//! IRQs are masked so the two entries cannot interleave inside a cycle.
//!
//! Which entry is authoritative is a configuration choice ([`DispatchMode`]).
//! The default keeps IRQs masked for good and services the controller by
//! polling; the vector path stays installed but dormant.

use core::marker::PhantomData;

use crate::cpu;
use crate::gic::{Ack, InterruptController};
use crate::vectors::VectorTable;

/// Which trigger path services interrupts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// IRQs stay masked; the idle loop polls the controller.
    Polling,
    /// IRQs are unmasked after bring-up; polling is disabled.
    Exception,
}

impl DispatchMode {
    /// Mode selected by the `irq-dispatch` feature
    pub const DEFAULT: Self = if cfg!(feature = "irq-dispatch") {
        DispatchMode::Exception
    } else {
        DispatchMode::Polling
    };
}

/// Proof that processor IRQs are masked for the current scope
pub struct Masked {
    _not_send: PhantomData<*const ()>,
}

impl Masked {
    /// Produce a token without masking anything.
    ///
    /// # Safety
    /// IRQs must already be masked, as they are on entry to the IRQ vector.
    pub unsafe fn assume() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

/// Run `f` with IRQs masked, restoring the previous state afterwards.
pub fn with_irqs_masked<R>(f: impl FnOnce(&Masked) -> R) -> R {
    let state = cpu::mask_irqs();
    // SAFETY: masked on the line above
    let token = unsafe { Masked::assume() };
    let result = f(&token);
    cpu::restore_irqs(state);
    result
}

/// Something the IRQ vector can hand a cycle to
pub trait Dispatch: Sync {
    fn dispatch(&self, masked: &Masked) -> Option<Ack>;
}

/// Drives a controller against a vector table
pub struct Dispatcher<'t, C> {
    controller: C,
    table: &'t VectorTable<'t>,
    mode: DispatchMode,
}

impl<'t, C: InterruptController> Dispatcher<'t, C> {
    pub const fn new(controller: C, table: &'t VectorTable<'t>, mode: DispatchMode) -> Self {
        Self {
            controller,
            table,
            mode,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// One dispatch cycle.
    ///
    /// Returns the acknowledge token of the interrupt that was completed, or
    /// `None` when the controller had nothing pending. A spurious read is not
    /// completed: writing EOI for it would desynchronise the controller. An
    /// interrupt with no registered handler is completed and otherwise
    /// ignored.
    pub fn dispatch(&self, _masked: &Masked) -> Option<Ack> {
        let ack = self.controller.acknowledge();
        if ack.is_spurious() {
            return None;
        }

        match self.table.external(ack.id()) {
            Some(handler) => handler.handle(),
            None => log::trace!("dispatch: no handler for intid {}", ack.id()),
        }

        self.controller.end_of_interrupt(ack);
        Some(ack)
    }

    /// Poll the controller once from the idle loop.
    ///
    /// Does nothing when the vector path is authoritative.
    pub fn poll(&self) -> Option<Ack> {
        match self.mode {
            DispatchMode::Polling => with_irqs_masked(|masked| self.dispatch(masked)),
            DispatchMode::Exception => None,
        }
    }

    /// Open the configured trigger path. Call once, after controller bring-up.
    pub fn start(&self) {
        match self.mode {
            DispatchMode::Polling => log::info!("dispatch: polling, IRQs stay masked"),
            DispatchMode::Exception => {
                log::info!("dispatch: IRQ vector, unmasking IRQs");
                cpu::unmask_irqs();
            }
        }
    }

    /// The idle loop.
    pub fn run(&self) -> ! {
        loop {
            self.poll();
            cpu::idle();
        }
    }
}

impl<C: InterruptController + Sync> Dispatch for Dispatcher<'_, C> {
    fn dispatch(&self, masked: &Masked) -> Option<Ack> {
        Dispatcher::dispatch(self, masked)
    }
}
