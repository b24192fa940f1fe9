//! 8259 programmable interrupt controller remap.
//!
//! Out of reset the PICs deliver IRQ 0-7 on vectors 8-15, on top of the
//! CPU exception range. The remap moves IRQ 0-15 to vectors 0x20-0x2F.

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x11; // begin initialization, ICW4 follows
const MASTER_VECTOR: u8 = 0x20;
const SLAVE_VECTOR: u8 = 0x28;
const MASTER_CASCADE: u8 = 0x04; // slave wired to IR2
const SLAVE_CASCADE: u8 = 0x02; // cascade identity
const ICW4_8086: u8 = 0x01;
const UNMASK_ALL: u8 = 0x00;

/// Byte-wide port output. The remap sequence writes through this, so the
/// sequencer itself carries no inline assembly.
pub trait PortSink {
    fn write(&mut self, port: u16, value: u8);
}

/// Real port I/O.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct PortIo;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortSink for PortIo {
    fn write(&mut self, port: u16, value: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nostack, preserves_flags),
            );
        }
    }
}

/// Run the ICW1..ICW4 initialization sequence on both controllers, then
/// unmask every line.
///
/// The byte values and port order are a hardware protocol; each stage
/// goes to the master and then the slave, and nothing may be reordered.
pub fn remap(io: &mut impl PortSink) {
    // ICW1: start initialization.
    io.write(MASTER_CMD, ICW1_INIT);
    io.write(SLAVE_CMD, ICW1_INIT);
    // ICW2: vector offsets.
    io.write(MASTER_DATA, MASTER_VECTOR);
    io.write(SLAVE_DATA, SLAVE_VECTOR);
    // ICW3: cascade wiring.
    io.write(MASTER_DATA, MASTER_CASCADE);
    io.write(SLAVE_DATA, SLAVE_CASCADE);
    // ICW4: 8086 mode.
    io.write(MASTER_DATA, ICW4_8086);
    io.write(SLAVE_DATA, ICW4_8086);
    // Unmask every line.
    io.write(MASTER_DATA, UNMASK_ALL);
    io.write(SLAVE_DATA, UNMASK_ALL);

    log::debug!("pic remapped, irq 0-15 on vectors 0x20-0x2f");
}
