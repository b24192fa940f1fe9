use bitflags::bitflags;

use crate::gdt::{GdtIndex, TablePointer};
use crate::isr::{IRQ_BASE, SYSCALL_VECTOR, StubTable};

bitflags! {
    /// Gate descriptor flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GateFlags: u8 {
        const PRESENT = 1 << 7;
        /// Descriptor privilege level 3.
        const DPL_USER = 0b11 << 5;
        /// 32-bit interrupt gate type.
        const INTERRUPT_GATE_32 = 0x0E;
    }
}

impl GateFlags {
    /// Present 32-bit interrupt gate at ring-0 base privilege (0x8E).
    pub const KERNEL_INTERRUPT: Self = Self::PRESENT.union(Self::INTERRUPT_GATE_32);
}

/// One IDT slot in the exact 8-byte layout the CPU reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct GateDescriptor {
    pub base_lo: u16,
    pub selector: u16,
    pub zero: u8,
    pub flags: u8,
    pub base_hi: u16,
}

const _: () = assert!(core::mem::size_of::<GateDescriptor>() == 8);

impl GateDescriptor {
    /// An all-zero gate. Triggering it raises a deterministic fault
    /// instead of jumping to garbage.
    pub const ABSENT: Self = Self {
        base_lo: 0,
        selector: 0,
        zero: 0,
        flags: 0,
        base_hi: 0,
    };
}

/// The 256-entry interrupt descriptor table. Sparse: only the exception,
/// IRQ and syscall vectors ever hold a gate.
pub struct Idt {
    entries: [GateDescriptor; 256],
}

impl Idt {
    pub const LEN: usize = 256;

    /// Create a fully absent table.
    pub const fn new() -> Self {
        Self {
            entries: [GateDescriptor::ABSENT; 256],
        }
    }

    /// Encode the gate for `vector`.
    ///
    /// The DPL bits of `flags` are widened to ring 3 on every gate so
    /// the syscall vector stays reachable from user mode via `int`.
    pub fn set_gate(&mut self, vector: u8, handler: u32, selector: u16, flags: u8) {
        let gate = &mut self.entries[usize::from(vector)];
        gate.base_lo = (handler & 0xFFFF) as u16;
        gate.base_hi = ((handler >> 16) & 0xFFFF) as u16;
        gate.selector = selector;
        gate.zero = 0;
        gate.flags = flags | GateFlags::DPL_USER.bits();
    }

    /// Install the fixed exception, IRQ and syscall gates, all through
    /// the kernel code segment.
    pub fn populate(&mut self, stubs: &StubTable) {
        let selector = GdtIndex::KernelCode.selector();
        let flags = GateFlags::KERNEL_INTERRUPT.bits();

        for (vector, &stub) in stubs.exceptions.iter().enumerate() {
            self.set_gate(vector as u8, stub, selector, flags);
        }
        for (line, &stub) in stubs.irqs.iter().enumerate() {
            self.set_gate(IRQ_BASE + line as u8, stub, selector, flags);
        }
        self.set_gate(SYSCALL_VECTOR, stubs.syscall, selector, flags);
    }

    /// Copy of the gate for `vector`.
    pub fn gate(&self, vector: u8) -> GateDescriptor {
        self.entries[usize::from(vector)]
    }

    /// Operand for the `lidt` load primitive.
    pub fn pointer(&self) -> TablePointer {
        TablePointer {
            limit: (core::mem::size_of::<GateDescriptor>() * Self::LEN - 1) as u16,
            base: self.entries.as_ptr() as usize as u32,
        }
    }
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}
