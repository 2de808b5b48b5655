//! Platform and runtime configuration
//!
//! Addresses default to the gem5 RealView/VExpress memory map the bridge
//! board is built on. Everything is `const` so the firmware can build its
//! peripherals in statics.

use log::LevelFilter;

use crate::dispatch::DispatchMode;
use crate::semihosting::AddressPolicy;

/// Platform memory map
pub mod platform {
    /// GICv2 distributor base
    pub const GICD_BASE: usize = 0x2C00_1000;
    /// GICv2 CPU interface base
    pub const GICC_BASE: usize = 0x2C00_2000;
    /// Bridge I/O window base
    pub const BRIDGE_BASE: usize = 0x8800_0000;
    /// External line of the bridge interrupt (SPI 37)
    pub const BRIDGE_LINE: u32 = 5;
}

/// Runtime configuration
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// GIC distributor base address
    pub gicd_base: usize,
    /// GIC CPU interface base address
    pub gicc_base: usize,
    /// Number of `GICD_ISENABLER` words to set during bring-up (32 lines each)
    pub enable_words: usize,
    /// Busy-wait iterations between the line enables and the distributor enable
    pub settle_spins: u32,
    /// Value written to `GICC_PMR`; `0xFF` accepts every priority
    pub priority_mask: u32,
    /// Bridge I/O window base address
    pub bridge_base: usize,
    /// External line the bridge raises
    pub bridge_line: u32,
    /// Which trigger path services interrupts
    pub dispatch: DispatchMode,
    /// What the trap gateway does with addresses wider than 32 bits
    pub address_policy: AddressPolicy,
    /// Maximum log level installed at start of day
    pub log_level: LevelFilter,
}

impl Config {
    /// Configuration for the gem5 bridge board
    pub const DEFAULT: Self = Self {
        gicd_base: platform::GICD_BASE,
        gicc_base: platform::GICC_BASE,
        enable_words: 4,
        settle_spins: 100,
        priority_mask: 0xFF,
        bridge_base: platform::BRIDGE_BASE,
        bridge_line: platform::BRIDGE_LINE,
        dispatch: DispatchMode::DEFAULT,
        address_policy: AddressPolicy::Reject,
        log_level: LevelFilter::Info,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
