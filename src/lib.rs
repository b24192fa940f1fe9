//! bantam builds the x86 protected-mode descriptor tables at boot.
//! It encodes the GDT, TSS and IDT bit-for-bit in their hardware layouts,
//! runs the 8259 PIC remap sequence, and hands the finished tables to the
//! CPU load primitives supplied by the bootstrap layer.
//!
//! Everything here runs once, single-threaded, before interrupts are
//! enabled. The only post-boot mutation is the TSS kernel stack pointer,
//! updated through [`tables::DescriptorTables::set_kernel_stack`] by the
//! scheduler on every context switch.
#![no_std]

/// Global descriptor table and segment selectors.
pub mod gdt;

/// Interrupt descriptor table for CPU exceptions, IRQs and the syscall gate.
pub mod idt;

/// Vector numbering, handler stubs and the interrupt handler registry.
pub mod isr;

mod macros;

/// Programmable interrupt controller remap.
pub mod pic;

/// Owned boot context tying the tables together.
pub mod tables;

/// Task state segment.
pub mod tss;
