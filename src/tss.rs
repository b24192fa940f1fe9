//! Protected-mode x86 keeps one TSS per CPU. We never hardware
//! task-switch through it; its only live job is the ring-3 -> ring-0
//! stack switch, which reads `ss0`/`esp0`.

use crate::gdt::{Access, Gdt, GdtIndex, RPL_USER};

/// The hardware TSS record. Field order and width are dictated by the
/// CPU and must not change.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct TaskStateSegment {
    /// Previous TSS link, only meaningful for hardware task switching.
    pub prev_tss: u32,
    /// Stack pointer loaded on a transition to ring 0.
    pub esp0: u32,
    /// Stack segment loaded on a transition to ring 0.
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

const _: () = assert!(core::mem::size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    /// Create an all-zero [`TaskStateSegment`].
    pub const fn zeroed() -> Self {
        unsafe { core::mem::zeroed() }
    }

    /// Build the TSS used for ring-3 -> ring-0 transitions.
    ///
    /// The segment registers are loaded with the kernel selectors, but
    /// with the RPL bits forced to 3 so the TSS stays usable from ring 3
    /// while still naming ring-0 segments.
    pub fn new(kernel_stack_segment: u16, kernel_stack_pointer: u32) -> Self {
        let mut tss = Self::zeroed();
        tss.ss0 = u32::from(kernel_stack_segment);
        tss.esp0 = kernel_stack_pointer;

        tss.cs = u32::from(GdtIndex::KernelCode.selector() | RPL_USER);
        let data = u32::from(GdtIndex::KernelData.selector() | RPL_USER);
        tss.ss = data;
        tss.ds = data;
        tss.es = data;
        tss.fs = data;
        tss.gs = data;
        tss
    }

    /// Point `esp0` at a new ring-0 stack. Nothing else is touched.
    ///
    /// The scheduler must call this on every context switch, before the
    /// next ring-3 -> ring-0 transition, with interrupts disabled for
    /// the duration: an interrupt taken against a torn `esp0` enters the
    /// kernel on a corrupt stack.
    pub fn set_kernel_stack(&mut self, pointer: u32) {
        self.esp0 = pointer;
    }

    /// Encode this TSS into its GDT slot.
    ///
    /// The descriptor bakes in the address of `self`, so the TSS must
    /// not move between registration and shutdown.
    pub fn register(&self, gdt: &mut Gdt) {
        let base = self as *const Self as usize as u32;
        let limit = base.wrapping_add(core::mem::size_of::<Self>() as u32);
        gdt.set_segment(GdtIndex::Tss, base, limit, Access::TSS.bits(), 0x00);
    }
}
