use spin::Once;

use crate::gdt::{Access, Gdt, GdtIndex, GranFlags, RPL_USER, TablePointer};
use crate::idt::Idt;
use crate::isr::{HandlerRegistry, StubTable};
use crate::pic::{self, PortSink};
use crate::tss::TaskStateSegment;

/// CPU table-load primitives (`lgdt`, `lidt`, `ltr`), implemented by the
/// bootstrap layer. Each is called exactly once per boot.
pub trait TableLoad {
    /// Point `gdtr` at the new GDT and reload the segment registers.
    fn load_gdt(&mut self, pointer: &TablePointer);
    /// Point `idtr` at the new IDT.
    fn load_idt(&mut self, pointer: &TablePointer);
    /// Reload the task register with the TSS selector.
    fn load_tss(&mut self, selector: u16);
}

static BOOT_GUARD: Once<()> = Once::new();

/// The GDT, IDT and TSS, owned together and built exactly once at boot.
///
/// The surrounding kernel holds this by reference afterwards; the table
/// contents are immutable post-boot except for the TSS kernel stack
/// pointer.
pub struct DescriptorTables {
    pub gdt: Gdt,
    pub idt: Idt,
    pub tss: TaskStateSegment,
}

impl DescriptorTables {
    /// Create the zeroed tables.
    pub const fn new() -> Self {
        Self {
            gdt: Gdt::new(),
            idt: Idt::new(),
            tss: TaskStateSegment::zeroed(),
        }
    }

    /// Build and load every table, remap the PICs, and empty the handler
    /// registry.
    ///
    /// # Safety
    /// Must be called exactly once, with interrupts disabled for the
    /// whole call so no vector fires against a half-built IDT. `self`
    /// must not move afterwards: the TSS descriptor and both table
    /// pointers bake in addresses.
    pub unsafe fn init(
        &mut self,
        stubs: &StubTable,
        registry: &mut HandlerRegistry,
        loader: &mut impl TableLoad,
        ports: &mut impl PortSink,
    ) {
        assert!(
            !BOOT_GUARD.is_completed(),
            "descriptor tables already initialized"
        );
        BOOT_GUARD.call_once(|| ());

        self.init_gdt(loader);
        self.init_idt(stubs, loader, ports);
        registry.clear();

        log::info!("descriptor tables initialized");
    }

    fn init_gdt(&mut self, loader: &mut impl TableLoad) {
        self.gdt.set_segment(GdtIndex::Null, 0, 0, 0, 0);
        let flat = GranFlags::FLAT.bits();
        self.gdt.set_segment(
            GdtIndex::KernelCode,
            0,
            0xFFFF_FFFF,
            Access::KERNEL_CODE.bits(),
            flat,
        );
        self.gdt.set_segment(
            GdtIndex::KernelData,
            0,
            0xFFFF_FFFF,
            Access::KERNEL_DATA.bits(),
            flat,
        );
        self.gdt.set_segment(
            GdtIndex::UserCode,
            0,
            0xFFFF_FFFF,
            Access::USER_CODE.bits(),
            flat,
        );
        self.gdt.set_segment(
            GdtIndex::UserData,
            0,
            0xFFFF_FFFF,
            Access::USER_DATA.bits(),
            flat,
        );
        loader.load_gdt(&self.gdt.pointer());

        // ss0 gets the kernel data selector; esp0 is a placeholder until
        // the scheduler installs a real ring-0 stack.
        let kernel_data = GdtIndex::KernelData.selector();
        self.tss = TaskStateSegment::new(kernel_data, u32::from(kernel_data));
        self.tss.register(&mut self.gdt);

        let tss_selector = GdtIndex::Tss.selector() | RPL_USER;
        loader.load_tss(tss_selector);
        log::debug!("gdt loaded, tss selector {tss_selector:#04x}");
    }

    fn init_idt(
        &mut self,
        stubs: &StubTable,
        loader: &mut impl TableLoad,
        ports: &mut impl PortSink,
    ) {
        pic::remap(ports);
        self.idt.populate(stubs);
        loader.load_idt(&self.idt.pointer());
        log::debug!("idt loaded, {} vectors", Idt::LEN);
    }

    /// Point the TSS at a new ring-0 stack.
    ///
    /// The scheduler must call this on every context switch, with
    /// interrupts disabled for the duration of the write.
    pub fn set_kernel_stack(&mut self, pointer: u32) {
        self.tss.set_kernel_stack(pointer);
    }
}

impl Default for DescriptorTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isr::SYSCALL_VECTOR;

    struct MockLoader {
        loads: [(char, u16); 4],
        len: usize,
    }

    impl MockLoader {
        fn new() -> Self {
            Self {
                loads: [('-', 0); 4],
                len: 0,
            }
        }

        fn record(&mut self, what: char, value: u16) {
            self.loads[self.len] = (what, value);
            self.len += 1;
        }
    }

    impl TableLoad for MockLoader {
        fn load_gdt(&mut self, pointer: &TablePointer) {
            let limit = pointer.limit;
            self.record('g', limit);
        }

        fn load_idt(&mut self, pointer: &TablePointer) {
            let limit = pointer.limit;
            self.record('i', limit);
        }

        fn load_tss(&mut self, selector: u16) {
            self.record('t', selector);
        }
    }

    #[derive(Default)]
    struct PortRecorder {
        writes: [(u16, u8); 16],
        len: usize,
    }

    impl PortSink for PortRecorder {
        fn write(&mut self, port: u16, value: u8) {
            self.writes[self.len] = (port, value);
            self.len += 1;
        }
    }

    fn stub_fixture() -> StubTable {
        let mut exceptions = [0u32; 32];
        for (vector, stub) in exceptions.iter_mut().enumerate() {
            *stub = 0x0010_0000 + vector as u32;
        }
        let mut irqs = [0u32; 16];
        for (line, stub) in irqs.iter_mut().enumerate() {
            *stub = 0x0020_0000 + line as u32;
        }
        StubTable {
            exceptions,
            irqs,
            syscall: 0x0030_0000,
        }
    }

    // The boot guard is process-wide, so this is the only test that runs
    // the full init path.
    #[test]
    fn boot_builds_and_loads_every_table() {
        let mut tables = DescriptorTables::new();
        let mut registry = HandlerRegistry::new();
        registry.install(3, |_| {});
        let mut loader = MockLoader::new();
        let mut ports = PortRecorder::default();

        unsafe { tables.init(&stub_fixture(), &mut registry, &mut loader, &mut ports) };

        // Load order and operands: GDT, then TSS selector with RPL 3,
        // then IDT.
        assert_eq!(&loader.loads[..loader.len], &[('g', 47), ('t', 0x2B), ('i', 2047)]);

        // The remap sequence ran in full.
        assert_eq!(ports.len, 10);
        assert_eq!(ports.writes[0], (0x20, 0x11));
        assert_eq!(ports.writes[9], (0xA1, 0x00));

        // Flat segments in slots 1..5, TSS descriptor in slot 5.
        let kernel_code = tables.gdt.entry(GdtIndex::KernelCode).access;
        assert_eq!(kernel_code, 0x9A);
        let kernel_data = tables.gdt.entry(GdtIndex::KernelData).access;
        assert_eq!(kernel_data, 0x92);
        let user_code = tables.gdt.entry(GdtIndex::UserCode).access;
        assert_eq!(user_code, 0xFA);
        let user_data = tables.gdt.entry(GdtIndex::UserData).access;
        assert_eq!(user_data, 0xF2);
        let tss_access = tables.gdt.entry(GdtIndex::Tss).access;
        assert_eq!(tss_access, 0xE9);

        // TSS built with the kernel data segment and RPL-3 selectors.
        let ss0 = tables.tss.ss0;
        assert_eq!(ss0, 0x10);
        let esp0 = tables.tss.esp0;
        assert_eq!(esp0, 0x10);
        let cs = tables.tss.cs;
        assert_eq!(cs, 0x0B);

        // Syscall gate installed, vector 48 left absent.
        let syscall_flags = tables.idt.gate(SYSCALL_VECTOR).flags;
        assert_eq!(syscall_flags, 0xEE);
        let absent_flags = tables.idt.gate(48).flags;
        assert_eq!(absent_flags, 0x00);

        // Boot leaves the registry empty.
        assert!(registry.is_empty());

        tables.set_kernel_stack(0x0009_F000);
        let esp0 = tables.tss.esp0;
        assert_eq!(esp0, 0x0009_F000);
    }
}
