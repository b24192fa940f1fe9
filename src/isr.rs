use num_enum::TryFromPrimitive;

/// Vectors 0..32 are reserved for CPU exceptions.
pub const EXCEPTION_COUNT: usize = 32;

/// First vector of the remapped hardware IRQ range.
pub const IRQ_BASE: u8 = 0x20;

/// Lines per PIC pair.
pub const IRQ_COUNT: usize = 16;

/// Software interrupt vector for syscalls.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Total IDT vectors.
pub const VECTOR_COUNT: usize = 256;

/// CPU exception vectors with architecturally defined meanings.
/// Vectors 20..32 are reserved by the CPU and carry no name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Exception {
    DivideByZero = 0,
    Debug,
    NonMaskableInterrupt,
    Breakpoint,
    Overflow,
    BoundRange,
    InvalidOpcode,
    DeviceNotAvailable,
    DoubleFault,
    CoprocessorOverrun,
    InvalidTss,
    SegmentNotPresent,
    StackFault,
    GeneralProtection,
    PageFault,
    Reserved15,
    FpuError,
    AlignmentCheck,
    MachineCheck,
    SimdError,
}

impl Exception {
    /// Short mnemonic for boot logs and fault reports.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::DivideByZero => "#DE",
            Self::Debug => "#DB",
            Self::NonMaskableInterrupt => "NMI",
            Self::Breakpoint => "#BP",
            Self::Overflow => "#OF",
            Self::BoundRange => "#BR",
            Self::InvalidOpcode => "#UD",
            Self::DeviceNotAvailable => "#NM",
            Self::DoubleFault => "#DF",
            Self::CoprocessorOverrun => "#CSO",
            Self::InvalidTss => "#TS",
            Self::SegmentNotPresent => "#NP",
            Self::StackFault => "#SS",
            Self::GeneralProtection => "#GP",
            Self::PageFault => "#PF",
            Self::Reserved15 => "RSVD",
            Self::FpuError => "#MF",
            Self::AlignmentCheck => "#AC",
            Self::MachineCheck => "#MC",
            Self::SimdError => "#XM",
        }
    }
}

/// Raw entry addresses of the assembly handler stubs, supplied by the
/// bootstrap/link layer. Consumed as opaque values, never dereferenced.
#[derive(Debug, Clone, Copy)]
pub struct StubTable {
    /// Stubs for exception vectors 0..32.
    pub exceptions: [u32; EXCEPTION_COUNT],
    /// Stubs for the remapped IRQ vectors 32..48.
    pub irqs: [u32; IRQ_COUNT],
    /// Stub for the syscall vector 0x80.
    pub syscall: u32,
}

/// Kernel-side callback for one vector, installed by the dispatcher.
pub type InterruptHandler = fn(vector: u8);

/// One callback slot per IDT vector.
///
/// Boot only guarantees the registry starts empty; the dispatcher owns
/// installation and lookup afterwards. Post-boot callers share it with
/// interrupt context and must mask interrupts around mutation.
pub struct HandlerRegistry {
    slots: [Option<InterruptHandler>; VECTOR_COUNT],
}

impl HandlerRegistry {
    /// Create an empty [`HandlerRegistry`].
    pub const fn new() -> Self {
        Self {
            slots: [None; VECTOR_COUNT],
        }
    }

    /// Drop every installed handler.
    pub fn clear(&mut self) {
        self.slots = [None; VECTOR_COUNT];
    }

    /// Install the handler for `vector`, replacing any previous one.
    pub fn install(&mut self, vector: u8, handler: InterruptHandler) {
        self.slots[usize::from(vector)] = Some(handler);
        match Exception::try_from(vector) {
            Ok(exception) => {
                log::debug!("handler installed for {} (vector {vector})", exception.mnemonic());
            }
            Err(_) => log::debug!("handler installed for vector {vector}"),
        }
    }

    /// Handler for `vector`, if one is installed.
    pub fn handler(&self, vector: u8) -> Option<InterruptHandler> {
        self.slots[usize::from(vector)]
    }

    /// True when no vector has a handler.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
