//! MMA8451Q register map
//!
//! Every register is a [`Register`] constant bound to its address, and every
//! named bit or bit-field is a [`Flag`] bound to exactly one register. Flags
//! are built in `const` context, so a mask that is zero or that strays outside
//! the register's legal bits fails to compile.
//!
//! Multi-bit fields (e.g. `CTRL_REG1::DR`) are exposed as a single flag
//! covering the whole field. The encodings of individual field values live in
//! [`crate::config`], which is also responsible for keeping only one value of
//! a field active at a time.
//!
//! ```
//! use mma8451_acquisition::registers::CTRL_REG1;
//!
//! assert_eq!(CTRL_REG1::ACTIVE.resolve(), (0x2A, 0x01));
//! ```

/// Default 7-bit I2C address (SA0 pulled high)
pub const DEVICE_ADDRESS: u8 = 0x1D;

/// Alternate 7-bit I2C address (SA0 pulled low)
pub const ALT_DEVICE_ADDRESS: u8 = 0x1C;

/// Expected WHO_AM_I value
pub const DEVICE_ID: u8 = 0x1A;

/// Number of sample slots in the hardware FIFO
pub const FIFO_DEPTH: usize = 32;

/// Register access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// A fixed 8-bit-addressable location on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    name: &'static str,
    addr: u8,
    access: Access,
    legal_bits: u8,
}

impl Register {
    pub const fn new(name: &'static str, addr: u8, access: Access, legal_bits: u8) -> Self {
        Self {
            name,
            addr,
            access,
            legal_bits,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn addr(&self) -> u8 {
        self.addr
    }

    pub const fn access(&self) -> Access {
        self.access
    }

    /// Bits that carry meaning in this register
    pub const fn legal_bits(&self) -> u8 {
        self.legal_bits
    }

    pub const fn is_writable(&self) -> bool {
        matches!(self.access, Access::ReadWrite)
    }
}

/// A named bitmask scoped to one register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag {
    register: Register,
    name: &'static str,
    mask: u8,
}

impl Flag {
    /// Bind a mask to a register
    ///
    /// Panics during constant evaluation if the mask is empty or touches bits
    /// the register does not define.
    pub const fn new(register: Register, name: &'static str, mask: u8) -> Self {
        assert!(mask != 0, "flag mask must have at least one bit set");
        assert!(
            mask & !register.legal_bits == 0,
            "flag mask exceeds the register's legal bits"
        );
        Self {
            register,
            name,
            mask,
        }
    }

    pub const fn register(&self) -> Register {
        self.register
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn mask(&self) -> u8 {
        self.mask
    }

    /// Resolve to `(register address, bitmask)`
    pub const fn resolve(&self) -> (u8, u8) {
        (self.register.addr, self.mask)
    }

    /// True if any bit of this flag is set in `value`
    pub const fn is_set(&self, value: u8) -> bool {
        value & self.mask != 0
    }

    /// Isolate this flag's bits in a register value
    pub const fn extract(&self, value: u8) -> u8 {
        value & self.mask
    }
}

macro_rules! register {
    (
        $(#[$doc:meta])*
        $name:ident = $addr:literal, $access:ident, $bits:literal {
            $( $(#[$fdoc:meta])* $flag:ident = $mask:literal ),* $(,)?
        }
    ) => {
        $(#[$doc])*
        #[allow(non_snake_case)]
        pub mod $name {
            #[allow(unused_imports)]
            use super::{Access, Flag, Register};

            pub const REG: Register =
                Register::new(stringify!($name), $addr, Access::$access, $bits);

            $(
                $(#[$fdoc])*
                pub const $flag: Flag = Flag::new(REG, stringify!($flag), $mask);
            )*
        }
    };
}

register! {
    /// FIFO status (0x00 when the FIFO is enabled)
    F_STATUS = 0x00, ReadOnly, 0xFF {
        /// FIFO overflowed; the count field is no longer reliable
        F_OVF = 0x80,
        F_WMRK_FLAG = 0x40,
        /// Number of samples currently in the FIFO
        F_CNT = 0x3F,
    }
}

register! {
    /// Data status (0x00 when the FIFO is disabled)
    STATUS = 0x00, ReadOnly, 0xFF {
        ZYXOW = 0x80,
        ZOW = 0x40,
        YOW = 0x20,
        XOW = 0x10,
        ZYXDR = 0x08,
        ZDR = 0x04,
        YDR = 0x02,
        XDR = 0x01,
    }
}

register! { OUT_X_MSB = 0x01, ReadOnly, 0xFF {} }
register! { OUT_X_LSB = 0x02, ReadOnly, 0xFC {} }
register! { OUT_Y_MSB = 0x03, ReadOnly, 0xFF {} }
register! { OUT_Y_LSB = 0x04, ReadOnly, 0xFC {} }
register! { OUT_Z_MSB = 0x05, ReadOnly, 0xFF {} }
register! { OUT_Z_LSB = 0x06, ReadOnly, 0xFC {} }

register! {
    /// FIFO setup
    F_SETUP = 0x09, ReadWrite, 0xFF {
        /// Whole mode field
        F_MODE = 0xC0,
        /// Keep the most recent samples on overflow
        F_MODE_CIRCULAR = 0x40,
        /// Stop accepting samples on overflow
        F_MODE_FILL = 0x80,
        F_MODE_TRIGGER = 0xC0,
        /// Watermark sample count
        F_WMRK = 0x3F,
    }
}

register! {
    TRIG_CFG = 0x0A, ReadWrite, 0x3C {
        TRIG_TRANS = 0x20,
        TRIG_LNDPRT = 0x10,
        TRIG_PULSE = 0x08,
        TRIG_FF_MT = 0x04,
    }
}

register! {
    SYSMOD = 0x0B, ReadOnly, 0xFF {
        FGERR = 0x80,
        FGT = 0x7C,
        /// Whole system mode field (00 standby, 01 wake, 10 sleep)
        SYSMOD = 0x03,
        SYSMOD_WAKE = 0x01,
        SYSMOD_SLEEP = 0x02,
    }
}

register! {
    INT_SOURCE = 0x0C, ReadOnly, 0xFD {
        SRC_ASLP = 0x80,
        SRC_FIFO = 0x40,
        SRC_TRANS = 0x20,
        SRC_LNDPRT = 0x10,
        SRC_PULSE = 0x08,
        SRC_FF_MT = 0x04,
        SRC_DRDY = 0x01,
    }
}

register! { WHO_AM_I = 0x0D, ReadOnly, 0xFF {} }

register! {
    XYZ_DATA_CFG = 0x0E, ReadWrite, 0x13 {
        HPF_OUT = 0x10,
        /// Full-scale range field (00 2g, 01 4g, 10 8g)
        FS = 0x03,
        FS_4G = 0x01,
        FS_8G = 0x02,
    }
}

register! {
    HP_FILTER_CUTOFF = 0x0F, ReadWrite, 0x33 {
        PULSE_HPF_BYP = 0x20,
        PULSE_LPF_EN = 0x10,
        SEL = 0x03,
    }
}

register! {
    PL_STATUS = 0x10, ReadOnly, 0xC7 {
        NEWLP = 0x80,
        LO = 0x40,
        LAPO = 0x06,
        BAFRO = 0x01,
    }
}

register! {
    PL_CFG = 0x11, ReadWrite, 0xC0 {
        DBCNTM = 0x80,
        PL_EN = 0x40,
    }
}

register! { PL_COUNT = 0x12, ReadWrite, 0xFF {} }

register! {
    PL_BF_ZCOMP = 0x13, ReadWrite, 0xC7 {
        BKFR = 0xC0,
        ZLOCK = 0x07,
    }
}

register! {
    P_L_THS_REG = 0x14, ReadWrite, 0xFF {
        P_L_THS = 0xF8,
        HYS = 0x07,
    }
}

register! { ASLP_COUNT = 0x29, ReadWrite, 0xFF {} }

register! {
    /// System control 1
    CTRL_REG1 = 0x2A, ReadWrite, 0xFF {
        ASLP_RATE = 0xC0,
        /// Output data rate field
        DR = 0x38,
        LNOISE = 0x04,
        /// Fast read: 8-bit samples, LSB registers skipped
        F_READ = 0x02,
        /// 1: active, 0: standby
        ACTIVE = 0x01,
    }
}

register! {
    /// System control 2
    CTRL_REG2 = 0x2B, ReadWrite, 0xDF {
        ST = 0x80,
        /// Software reset, self-clearing
        RST = 0x40,
        SMODS = 0x18,
        SLPE = 0x04,
        /// Active-mode oversampling scheme
        MODS = 0x03,
    }
}

register! {
    /// Interrupt pin configuration
    CTRL_REG3 = 0x2C, ReadWrite, 0xFB {
        FIFO_GATE = 0x80,
        WAKE_TRANS = 0x40,
        WAKE_LNDPRT = 0x20,
        WAKE_PULSE = 0x10,
        WAKE_FF_MT = 0x08,
        /// 1: interrupt pins active high
        IPOL = 0x02,
        PP_OD = 0x01,
    }
}

register! {
    /// Interrupt enable
    CTRL_REG4 = 0x2D, ReadWrite, 0xFD {
        INT_EN_ASLP = 0x80,
        INT_EN_FIFO = 0x40,
        INT_EN_TRANS = 0x20,
        INT_EN_LNDPRT = 0x10,
        INT_EN_PULSE = 0x08,
        INT_EN_FF_MT = 0x04,
        INT_EN_DRDY = 0x01,
    }
}

register! {
    /// Interrupt routing (1: INT1, 0: INT2)
    CTRL_REG5 = 0x2E, ReadWrite, 0xFD {
        INT_CFG_ASLP = 0x80,
        INT_CFG_FIFO = 0x40,
        INT_CFG_TRANS = 0x20,
        INT_CFG_LNDPRT = 0x10,
        INT_CFG_PULSE = 0x08,
        INT_CFG_FF_MT = 0x04,
        INT_CFG_DRDY = 0x01,
    }
}

register! { OFF_X = 0x2F, ReadWrite, 0xFF {} }
register! { OFF_Y = 0x30, ReadWrite, 0xFF {} }
register! { OFF_Z = 0x31, ReadWrite, 0xFF {} }

/// All registers, in address order. `F_STATUS` shadows `STATUS` at 0x00.
pub const REGISTERS: &[Register] = &[
    F_STATUS::REG,
    STATUS::REG,
    OUT_X_MSB::REG,
    OUT_X_LSB::REG,
    OUT_Y_MSB::REG,
    OUT_Y_LSB::REG,
    OUT_Z_MSB::REG,
    OUT_Z_LSB::REG,
    F_SETUP::REG,
    TRIG_CFG::REG,
    SYSMOD::REG,
    INT_SOURCE::REG,
    WHO_AM_I::REG,
    XYZ_DATA_CFG::REG,
    HP_FILTER_CUTOFF::REG,
    PL_STATUS::REG,
    PL_CFG::REG,
    PL_COUNT::REG,
    PL_BF_ZCOMP::REG,
    P_L_THS_REG::REG,
    ASLP_COUNT::REG,
    CTRL_REG1::REG,
    CTRL_REG2::REG,
    CTRL_REG3::REG,
    CTRL_REG4::REG,
    CTRL_REG5::REG,
    OFF_X::REG,
    OFF_Y::REG,
    OFF_Z::REG,
];

/// Look up a register by address
pub fn by_addr(addr: u8) -> Option<Register> {
    REGISTERS.iter().copied().find(|r| r.addr() == addr)
}
