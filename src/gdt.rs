use bitflags::bitflags;
use num_enum::IntoPrimitive;

/// Requested privilege level bits of a selector for ring 3.
pub const RPL_USER: u16 = 0b11;

bitflags! {
    /// Segment descriptor access byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Set by the CPU on first use (set up front for the TSS).
        const ACCESSED = 1 << 0;
        /// Readable for code segments, writable for data segments.
        const READ_WRITE = 1 << 1;
        /// Conforming for code, expand-down for data.
        const DIRECTION = 1 << 2;
        /// Code segment when set, data when clear.
        const EXECUTABLE = 1 << 3;
        /// Regular code/data segment; clear for system segments (TSS).
        const CODE_DATA = 1 << 4;
        /// Descriptor privilege level 3.
        const DPL_USER = 0b11 << 5;
        const PRESENT = 1 << 7;
    }
}

impl Access {
    /// Ring-0 flat code segment (0x9A).
    pub const KERNEL_CODE: Self = Self::PRESENT
        .union(Self::CODE_DATA)
        .union(Self::EXECUTABLE)
        .union(Self::READ_WRITE);
    /// Ring-0 flat data segment (0x92).
    pub const KERNEL_DATA: Self = Self::PRESENT
        .union(Self::CODE_DATA)
        .union(Self::READ_WRITE);
    /// Ring-3 flat code segment (0xFA).
    pub const USER_CODE: Self = Self::KERNEL_CODE.union(Self::DPL_USER);
    /// Ring-3 flat data segment (0xF2).
    pub const USER_DATA: Self = Self::KERNEL_DATA.union(Self::DPL_USER);
    /// 32-bit available TSS system descriptor (0xE9).
    pub const TSS: Self = Self::PRESENT
        .union(Self::DPL_USER)
        .union(Self::EXECUTABLE)
        .union(Self::ACCESSED);
}

bitflags! {
    /// High nibble of the granularity byte. The low nibble carries
    /// limit bits 19:16 and is filled in by the encoder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GranFlags: u8 {
        /// Limit counts 4 KiB pages instead of bytes.
        const PAGE_4K = 1 << 7;
        /// 32-bit default operand size.
        const OP32 = 1 << 6;
    }
}

impl GranFlags {
    /// Flat-model segments: page granularity, 32-bit (0xC0).
    pub const FLAT: Self = Self::PAGE_4K.union(Self::OP32);
}

/// Fixed GDT slot assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum GdtIndex {
    Null = 0,
    KernelCode,
    KernelData,
    UserCode,
    UserData,
    Tss,
}

impl GdtIndex {
    /// Selector naming this slot (descriptors are 8 bytes wide).
    pub const fn selector(self) -> u16 {
        (self as u16) << 3
    }
}

/// One GDT slot in the exact 8-byte layout the CPU reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct SegmentDescriptor {
    pub limit_low: u16,
    pub base_low: u16,
    pub base_mid: u8,
    pub access: u8,
    pub granularity: u8,
    pub base_high: u8,
}

const _: () = assert!(core::mem::size_of::<SegmentDescriptor>() == 8);

impl SegmentDescriptor {
    /// The mandatory all-zero descriptor in slot 0.
    pub const NULL: Self = Self {
        limit_low: 0,
        base_low: 0,
        base_mid: 0,
        access: 0,
        granularity: 0,
        base_high: 0,
    };
}

/// The 6-byte operand of `lgdt`/`lidt`: table byte size minus one, then
/// the table address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TablePointer {
    pub limit: u16,
    pub base: u32,
}

const _: () = assert!(core::mem::size_of::<TablePointer>() == 6);

/// The global descriptor table: null slot, flat ring-0/ring-3 code and
/// data, and the TSS descriptor.
pub struct Gdt {
    entries: [SegmentDescriptor; 6],
}

impl Gdt {
    pub const LEN: usize = 6;

    /// Create a table of six null descriptors.
    pub const fn new() -> Self {
        Self {
            entries: [SegmentDescriptor::NULL; 6],
        }
    }

    /// Encode one descriptor slot.
    ///
    /// `base` is split 16/8/8 across the entry; the low 16 bits of
    /// `limit` land in `limit_low` and bits 19:16 in the low nibble of
    /// the granularity byte, under the caller's flag nibble.
    pub fn set_segment(&mut self, index: GdtIndex, base: u32, limit: u32, access: u8, gran: u8) {
        let entry = &mut self.entries[usize::from(u8::from(index))];

        entry.base_low = (base & 0xFFFF) as u16;
        entry.base_mid = ((base >> 16) & 0xFF) as u8;
        entry.base_high = ((base >> 24) & 0xFF) as u8;

        entry.limit_low = (limit & 0xFFFF) as u16;
        entry.granularity = ((limit >> 16) & crate::mask!(4)) as u8 | (gran & 0xF0);
        entry.access = access;
    }

    /// Copy of the descriptor in `index`.
    pub fn entry(&self, index: GdtIndex) -> SegmentDescriptor {
        self.entries[usize::from(u8::from(index))]
    }

    /// Operand for the `lgdt` load primitive.
    pub fn pointer(&self) -> TablePointer {
        TablePointer {
            limit: (core::mem::size_of::<SegmentDescriptor>() * Self::LEN - 1) as u16,
            base: self.entries.as_ptr() as usize as u32,
        }
    }
}

impl Default for Gdt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(descriptor: SegmentDescriptor) -> [u8; 8] {
        unsafe { core::mem::transmute(descriptor) }
    }

    #[test]
    fn null_slot_stays_zero() {
        let gdt = Gdt::new();
        assert_eq!(bytes(gdt.entry(GdtIndex::Null)), [0; 8]);
    }

    #[test]
    fn kernel_code_matches_flat_model_encoding() {
        let mut gdt = Gdt::new();
        gdt.set_segment(
            GdtIndex::KernelCode,
            0,
            0xFFFF_FFFF,
            Access::KERNEL_CODE.bits(),
            GranFlags::FLAT.bits(),
        );
        assert_eq!(
            bytes(gdt.entry(GdtIndex::KernelCode)),
            [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x9A, 0xCF, 0x00],
        );
    }

    #[test]
    fn base_and_limit_are_split_across_fields() {
        let mut gdt = Gdt::new();
        gdt.set_segment(GdtIndex::UserData, 0x1234_5678, 0x000A_BCDE, 0x92, 0xC0);
        assert_eq!(
            bytes(gdt.entry(GdtIndex::UserData)),
            [0xDE, 0xBC, 0x78, 0x56, 0x34, 0x92, 0xCA, 0x12],
        );
    }

    #[test]
    fn pointer_limit_covers_six_descriptors() {
        let gdt = Gdt::new();
        let limit = gdt.pointer().limit;
        assert_eq!(limit, 47);
    }

    #[test]
    fn selectors_follow_slot_order() {
        assert_eq!(GdtIndex::Null.selector(), 0x00);
        assert_eq!(GdtIndex::KernelCode.selector(), 0x08);
        assert_eq!(GdtIndex::KernelData.selector(), 0x10);
        assert_eq!(GdtIndex::UserCode.selector(), 0x18);
        assert_eq!(GdtIndex::UserData.selector(), 0x20);
        assert_eq!(GdtIndex::Tss.selector(), 0x28);
        assert_eq!(GdtIndex::KernelCode.selector() | RPL_USER, 0x0B);
        assert_eq!(GdtIndex::KernelData.selector() | RPL_USER, 0x13);
    }

    #[test]
    fn access_bytes_match_hardware_values() {
        assert_eq!(Access::KERNEL_CODE.bits(), 0x9A);
        assert_eq!(Access::KERNEL_DATA.bits(), 0x92);
        assert_eq!(Access::USER_CODE.bits(), 0xFA);
        assert_eq!(Access::USER_DATA.bits(), 0xF2);
        assert_eq!(Access::TSS.bits(), 0xE9);
        assert_eq!(GranFlags::FLAT.bits(), 0xC0);
    }
}
