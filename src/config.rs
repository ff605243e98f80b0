//! Configuration model: named device options and the register bits that realize them
//!
//! Nothing here performs I/O. The controller asks [`Configuration::describe_clear`]
//! and [`Configuration::describe_set`] which bits to touch, writes them through
//! the transport, and only then records the new value with
//! [`Configuration::update`].

use std::fmt;
use std::time::Duration;

use crate::error::{Mma8451Error, Result};
use crate::registers::{self, Flag, Register, CTRL_REG1, CTRL_REG2, F_SETUP, XYZ_DATA_CFG};

/// Sample precision (CTRL_REG1.F_READ)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 14-bit samples, MSB + LSB per axis
    #[default]
    Bits14,
    /// 8-bit fast-read samples, MSB only
    Bits8,
}

impl BitDepth {
    pub const ALL: [BitDepth; 2] = [BitDepth::Bits14, BitDepth::Bits8];

    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Bits14 => 0x00,
            BitDepth::Bits8 => CTRL_REG1::F_READ.mask(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BitDepth::Bits14 => "14",
            BitDepth::Bits8 => "8",
        }
    }

    /// Bytes per sample in the output register burst
    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Bits14 => 6,
            BitDepth::Bits8 => 3,
        }
    }
}

/// Full-scale range (XYZ_DATA_CFG.FS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullScale {
    #[default]
    G2,
    G4,
    G8,
}

impl FullScale {
    pub const ALL: [FullScale; 3] = [FullScale::G2, FullScale::G4, FullScale::G8];

    pub fn bits(self) -> u8 {
        match self {
            FullScale::G2 => 0x00,
            FullScale::G4 => XYZ_DATA_CFG::FS_4G.mask(),
            FullScale::G8 => XYZ_DATA_CFG::FS_8G.mask(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FullScale::G2 => "2g",
            FullScale::G4 => "4g",
            FullScale::G8 => "8g",
        }
    }

    /// Range in g
    pub fn g(self) -> u8 {
        match self {
            FullScale::G2 => 2,
            FullScale::G4 => 4,
            FullScale::G8 => 8,
        }
    }
}

/// Output data rate (CTRL_REG1.DR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataRate {
    #[default]
    Hz800,
    Hz400,
    Hz200,
    Hz100,
    Hz50,
    Hz12_5,
    Hz6_25,
    Hz1_56,
}

impl DataRate {
    pub const ALL: [DataRate; 8] = [
        DataRate::Hz800,
        DataRate::Hz400,
        DataRate::Hz200,
        DataRate::Hz100,
        DataRate::Hz50,
        DataRate::Hz12_5,
        DataRate::Hz6_25,
        DataRate::Hz1_56,
    ];

    pub fn bits(self) -> u8 {
        let index = DataRate::ALL.iter().position(|r| *r == self).unwrap_or(0) as u8;
        index << 3
    }

    pub fn label(self) -> &'static str {
        match self {
            DataRate::Hz800 => "800",
            DataRate::Hz400 => "400",
            DataRate::Hz200 => "200",
            DataRate::Hz100 => "100",
            DataRate::Hz50 => "50",
            DataRate::Hz12_5 => "12.5",
            DataRate::Hz6_25 => "6.25",
            DataRate::Hz1_56 => "1.56",
        }
    }

    pub fn hz(self) -> f64 {
        match self {
            DataRate::Hz800 => 800.0,
            DataRate::Hz400 => 400.0,
            DataRate::Hz200 => 200.0,
            DataRate::Hz100 => 100.0,
            DataRate::Hz50 => 50.0,
            DataRate::Hz12_5 => 12.5,
            DataRate::Hz6_25 => 6.25,
            DataRate::Hz1_56 => 1.5625,
        }
    }

    /// Time between consecutive samples
    pub fn period(self) -> Duration {
        Duration::from_secs_f64(1.0 / self.hz())
    }
}

/// Active-mode oversampling (CTRL_REG2.MODS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    #[default]
    Normal,
    LowNoiseLowPower,
    HighResolution,
    LowPower,
}

impl PowerMode {
    pub const ALL: [PowerMode; 4] = [
        PowerMode::Normal,
        PowerMode::LowNoiseLowPower,
        PowerMode::HighResolution,
        PowerMode::LowPower,
    ];

    pub fn bits(self) -> u8 {
        match self {
            PowerMode::Normal => 0x00,
            PowerMode::LowNoiseLowPower => 0x01,
            PowerMode::HighResolution => 0x02,
            PowerMode::LowPower => 0x03,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PowerMode::Normal => "normal",
            PowerMode::LowNoiseLowPower => "lnlp",
            PowerMode::HighResolution => "hr",
            PowerMode::LowPower => "lp",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            PowerMode::Normal => &[],
            PowerMode::LowNoiseLowPower => &["low-noise-low-power"],
            PowerMode::HighResolution => &["high-resolution"],
            PowerMode::LowPower => &["low-power"],
        }
    }
}

/// FIFO buffer mode (F_SETUP.F_MODE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FifoMode {
    #[default]
    Disabled,
    /// Oldest samples are discarded on overflow
    Circular,
    /// Sampling into the FIFO stops on overflow
    Fill,
    Trigger,
}

impl FifoMode {
    pub const ALL: [FifoMode; 4] = [
        FifoMode::Disabled,
        FifoMode::Circular,
        FifoMode::Fill,
        FifoMode::Trigger,
    ];

    pub fn bits(self) -> u8 {
        match self {
            FifoMode::Disabled => 0x00,
            FifoMode::Circular => F_SETUP::F_MODE_CIRCULAR.mask(),
            FifoMode::Fill => F_SETUP::F_MODE_FILL.mask(),
            FifoMode::Trigger => F_SETUP::F_MODE_TRIGGER.mask(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FifoMode::Disabled => "disabled",
            FifoMode::Circular => "circular",
            FifoMode::Fill => "fill",
            FifoMode::Trigger => "trigger",
        }
    }
}

/// A configurable axis of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigOption {
    BitDepth,
    FullScale,
    DataRate,
    PowerMode,
    LowNoise,
    FifoMode,
    Watermark,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 7] = [
        ConfigOption::BitDepth,
        ConfigOption::FullScale,
        ConfigOption::DataRate,
        ConfigOption::PowerMode,
        ConfigOption::LowNoise,
        ConfigOption::FifoMode,
        ConfigOption::Watermark,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigOption::BitDepth => "bit_depth",
            ConfigOption::FullScale => "full_scale_range",
            ConfigOption::DataRate => "data_rate",
            ConfigOption::PowerMode => "power_mode",
            ConfigOption::LowNoise => "low_noise",
            ConfigOption::FifoMode => "fifo_mode",
            ConfigOption::Watermark => "fifo_watermark",
        }
    }

    pub fn from_name(name: &str) -> Option<ConfigOption> {
        ConfigOption::ALL.into_iter().find(|o| o.name() == name)
    }

    /// The flag covering this option's whole field
    pub fn field(self) -> Flag {
        match self {
            ConfigOption::BitDepth => CTRL_REG1::F_READ,
            ConfigOption::FullScale => XYZ_DATA_CFG::FS,
            ConfigOption::DataRate => CTRL_REG1::DR,
            ConfigOption::PowerMode => CTRL_REG2::MODS,
            ConfigOption::LowNoise => CTRL_REG1::LNOISE,
            ConfigOption::FifoMode => F_SETUP::F_MODE,
            ConfigOption::Watermark => F_SETUP::F_WMRK,
        }
    }

    pub fn register(self) -> Register {
        self.field().register()
    }

    /// Hardware reset value
    pub fn default_setting(self) -> Setting {
        match self {
            ConfigOption::BitDepth => Setting::BitDepth(BitDepth::default()),
            ConfigOption::FullScale => Setting::FullScale(FullScale::default()),
            ConfigOption::DataRate => Setting::DataRate(DataRate::default()),
            ConfigOption::PowerMode => Setting::PowerMode(PowerMode::default()),
            ConfigOption::LowNoise => Setting::LowNoise(false),
            ConfigOption::FifoMode => Setting::FifoMode(FifoMode::default()),
            ConfigOption::Watermark => Setting::Watermark(0),
        }
    }

    /// Every value this option accepts
    pub fn legal_settings(self) -> Vec<Setting> {
        match self {
            ConfigOption::BitDepth => BitDepth::ALL.into_iter().map(Setting::BitDepth).collect(),
            ConfigOption::FullScale => FullScale::ALL.into_iter().map(Setting::FullScale).collect(),
            ConfigOption::DataRate => DataRate::ALL.into_iter().map(Setting::DataRate).collect(),
            ConfigOption::PowerMode => PowerMode::ALL.into_iter().map(Setting::PowerMode).collect(),
            ConfigOption::LowNoise => vec![Setting::LowNoise(false), Setting::LowNoise(true)],
            ConfigOption::FifoMode => FifoMode::ALL.into_iter().map(Setting::FifoMode).collect(),
            ConfigOption::Watermark => (0..=registers::FIFO_DEPTH as u8)
                .map(Setting::Watermark)
                .collect(),
        }
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value for one option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    BitDepth(BitDepth),
    FullScale(FullScale),
    DataRate(DataRate),
    PowerMode(PowerMode),
    LowNoise(bool),
    FifoMode(FifoMode),
    /// FIFO watermark in samples (0..=32)
    Watermark(u8),
}

impl Setting {
    pub fn option(&self) -> ConfigOption {
        match self {
            Setting::BitDepth(_) => ConfigOption::BitDepth,
            Setting::FullScale(_) => ConfigOption::FullScale,
            Setting::DataRate(_) => ConfigOption::DataRate,
            Setting::PowerMode(_) => ConfigOption::PowerMode,
            Setting::LowNoise(_) => ConfigOption::LowNoise,
            Setting::FifoMode(_) => ConfigOption::FifoMode,
            Setting::Watermark(_) => ConfigOption::Watermark,
        }
    }

    /// Bits this value occupies within its option's field
    pub fn encode(&self) -> Result<u8> {
        let bits = match *self {
            Setting::BitDepth(v) => v.bits(),
            Setting::FullScale(v) => v.bits(),
            Setting::DataRate(v) => v.bits(),
            Setting::PowerMode(v) => v.bits(),
            Setting::LowNoise(on) => {
                if on {
                    CTRL_REG1::LNOISE.mask()
                } else {
                    0
                }
            }
            Setting::FifoMode(v) => v.bits(),
            Setting::Watermark(count) => {
                if count as usize > registers::FIFO_DEPTH {
                    return Err(Mma8451Error::invalid_value(
                        ConfigOption::Watermark.name(),
                        count,
                    ));
                }
                count
            }
        };
        Ok(bits)
    }

    /// Parse user text for `option`
    ///
    /// # Example
    /// ```
    /// use mma8451_acquisition::config::{ConfigOption, FullScale, Setting};
    ///
    /// let setting = Setting::parse(ConfigOption::FullScale, "4g")?;
    /// assert_eq!(setting, Setting::FullScale(FullScale::G4));
    /// assert!(Setting::parse(ConfigOption::FullScale, "16g").is_err());
    /// # Ok::<(), mma8451_acquisition::Mma8451Error>(())
    /// ```
    pub fn parse(option: ConfigOption, text: &str) -> Result<Setting> {
        let value = text.trim().to_ascii_lowercase();
        let invalid = || Mma8451Error::invalid_value(option.name(), text.trim());

        let setting = match option {
            ConfigOption::BitDepth => {
                let digits = value.trim_end_matches("bit").trim_end_matches('-');
                BitDepth::ALL
                    .into_iter()
                    .find(|d| d.label() == digits)
                    .map(Setting::BitDepth)
            }
            ConfigOption::FullScale => {
                let digits = value.trim_end_matches('g');
                FullScale::ALL
                    .into_iter()
                    .find(|s| s.label().trim_end_matches('g') == digits)
                    .map(Setting::FullScale)
            }
            ConfigOption::DataRate => {
                let digits = value.trim_end_matches("hz").trim();
                DataRate::ALL
                    .into_iter()
                    .find(|r| r.label() == digits)
                    .or_else(|| {
                        let hz: f64 = digits.parse().ok()?;
                        DataRate::ALL
                            .into_iter()
                            .find(|r| (r.hz() - hz).abs() < 0.01)
                    })
                    .map(Setting::DataRate)
            }
            ConfigOption::PowerMode => PowerMode::ALL
                .into_iter()
                .find(|m| m.label() == value || m.aliases().contains(&value.as_str()))
                .map(Setting::PowerMode),
            ConfigOption::LowNoise => match value.as_str() {
                "on" | "true" | "1" | "yes" => Some(Setting::LowNoise(true)),
                "off" | "false" | "0" | "no" => Some(Setting::LowNoise(false)),
                _ => None,
            },
            ConfigOption::FifoMode => FifoMode::ALL
                .into_iter()
                .find(|m| m.label() == value)
                .map(Setting::FifoMode),
            ConfigOption::Watermark => value
                .parse::<u8>()
                .ok()
                .filter(|count| *count as usize <= registers::FIFO_DEPTH)
                .map(Setting::Watermark),
        };

        setting.ok_or_else(invalid)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::BitDepth(v) => write!(f, "{}-bit", v.label()),
            Setting::FullScale(v) => write!(f, "±{}", v.label()),
            Setting::DataRate(v) => write!(f, "{} Hz", v.label()),
            Setting::PowerMode(v) => f.write_str(v.label()),
            Setting::LowNoise(on) => f.write_str(if *on { "on" } else { "off" }),
            Setting::FifoMode(v) => f.write_str(v.label()),
            Setting::Watermark(n) => write!(f, "{} samples", n),
        }
    }
}

/// Register plus the bits to set or clear in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMask {
    pub register: Register,
    pub mask: u8,
}

/// Precision and range in effect when a block was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scale {
    pub bit_depth: BitDepth,
    pub full_scale: FullScale,
}

impl Scale {
    pub fn new(bit_depth: BitDepth, full_scale: FullScale) -> Self {
        Self {
            bit_depth,
            full_scale,
        }
    }

    /// Counts per g for this precision and range
    ///
    /// 14-bit: 4096/2048/1024, 8-bit: 64/32/16 for 2g/4g/8g.
    pub fn counts_per_g(&self) -> f32 {
        let full = match self.bit_depth {
            BitDepth::Bits14 => 4096.0,
            BitDepth::Bits8 => 64.0,
        };
        match self.full_scale {
            FullScale::G2 => full,
            FullScale::G4 => full / 2.0,
            FullScale::G8 => full / 4.0,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth.bytes_per_sample()
    }

    pub fn to_g(&self, counts: i16) -> f32 {
        counts as f32 / self.counts_per_g()
    }

    /// Nearest raw count for an acceleration in g, saturated to the precision's range
    pub fn to_counts(&self, g: f32) -> i16 {
        let (min, max) = match self.bit_depth {
            BitDepth::Bits14 => (-8192.0, 8191.0),
            BitDepth::Bits8 => (-128.0, 127.0),
        };
        (g * self.counts_per_g()).round().clamp(min, max) as i16
    }
}

/// Snapshot of the option values currently written to the device
///
/// Defaults match the hardware reset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    bit_depth: BitDepth,
    full_scale: FullScale,
    data_rate: DataRate,
    power_mode: PowerMode,
    low_noise: bool,
    fifo_mode: FifoMode,
    watermark: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bit_depth: BitDepth::default(),
            full_scale: FullScale::default(),
            data_rate: DataRate::default(),
            power_mode: PowerMode::default(),
            low_noise: false,
            fifo_mode: FifoMode::default(),
            watermark: 0,
        }
    }
}

impl Configuration {
    /// Current value of `option`
    pub fn get(&self, option: ConfigOption) -> Setting {
        match option {
            ConfigOption::BitDepth => Setting::BitDepth(self.bit_depth),
            ConfigOption::FullScale => Setting::FullScale(self.full_scale),
            ConfigOption::DataRate => Setting::DataRate(self.data_rate),
            ConfigOption::PowerMode => Setting::PowerMode(self.power_mode),
            ConfigOption::LowNoise => Setting::LowNoise(self.low_noise),
            ConfigOption::FifoMode => Setting::FifoMode(self.fifo_mode),
            ConfigOption::Watermark => Setting::Watermark(self.watermark),
        }
    }

    /// Register and bits to set for `setting`
    ///
    /// Fails with `InvalidValue` for values outside the option's legal set.
    pub fn describe_set(setting: &Setting) -> Result<RegisterMask> {
        Ok(RegisterMask {
            register: setting.option().register(),
            mask: setting.encode()?,
        })
    }

    /// Register and the union of every legal value's bits for `option`
    pub fn describe_clear(option: ConfigOption) -> RegisterMask {
        let mask = option
            .legal_settings()
            .iter()
            .filter_map(|s| s.encode().ok())
            .fold(0u8, |acc, bits| acc | bits);
        RegisterMask {
            register: option.register(),
            mask,
        }
    }

    /// Record a value after it has been written to the device
    pub fn update(&mut self, setting: Setting) {
        match setting {
            Setting::BitDepth(v) => self.bit_depth = v,
            Setting::FullScale(v) => self.full_scale = v,
            Setting::DataRate(v) => self.data_rate = v,
            Setting::PowerMode(v) => self.power_mode = v,
            Setting::LowNoise(v) => self.low_noise = v,
            Setting::FifoMode(v) => self.fifo_mode = v,
            Setting::Watermark(v) => self.watermark = v,
        }
    }

    pub fn scale(&self) -> Scale {
        Scale::new(self.bit_depth, self.full_scale)
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn full_scale(&self) -> FullScale {
        self.full_scale
    }

    pub fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub fn low_noise(&self) -> bool {
        self.low_noise
    }

    pub fn fifo_mode(&self) -> FifoMode {
        self.fifo_mode
    }

    pub fn watermark(&self) -> u8 {
        self.watermark
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = ConfigOption::ALL
            .iter()
            .map(|o| format!("{}={}", o.name(), self.get(*o)))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_then_set_touches_only_the_field() {
        for option in ConfigOption::ALL {
            let clear = Configuration::describe_clear(option);
            assert_eq!(clear.register, option.register());
            assert_eq!(clear.mask, option.field().mask(), "{}", option);

            for setting in option.legal_settings() {
                let set = Configuration::describe_set(&setting).unwrap();
                assert_eq!(set.register, clear.register);
                assert_eq!(set.mask & !clear.mask, 0, "{} escapes its field", setting);

                for initial in [0x00u8, 0xFF, 0xA5, 0x5A] {
                    let written = (initial & !clear.mask) | set.mask;
                    assert_eq!(written & !clear.mask, initial & !clear.mask);
                    assert_eq!(written & clear.mask, set.mask);
                }
            }
        }
    }

    #[test]
    fn test_field_encodings() {
        assert_eq!(DataRate::Hz800.bits(), 0x00);
        assert_eq!(DataRate::Hz100.bits(), 0x18);
        assert_eq!(DataRate::Hz1_56.bits(), 0x38);
        assert_eq!(FullScale::G8.bits(), 0x02);
        assert_eq!(PowerMode::HighResolution.bits(), 0x02);
        assert_eq!(FifoMode::Fill.bits(), 0x80);
        assert_eq!(FifoMode::Circular.bits(), 0x40);
        assert_eq!(BitDepth::Bits8.bits(), 0x02);
    }

    #[test]
    fn test_watermark_out_of_range_is_rejected() {
        let err = Configuration::describe_set(&Setting::Watermark(33)).unwrap_err();
        assert!(matches!(
            err,
            Mma8451Error::InvalidValue { option: "fifo_watermark", .. }
        ));
        assert!(Configuration::describe_set(&Setting::Watermark(32)).is_ok());
    }

    #[test]
    fn test_defaults_match_reset_state() {
        let config = Configuration::default();
        for option in ConfigOption::ALL {
            assert_eq!(config.get(option), option.default_setting());
        }
        assert_eq!(config.scale().counts_per_g(), 4096.0);
    }

    #[test]
    fn test_update_and_get() {
        let mut config = Configuration::default();
        config.update(Setting::FullScale(FullScale::G8));
        config.update(Setting::Watermark(20));
        assert_eq!(config.get(ConfigOption::FullScale), Setting::FullScale(FullScale::G8));
        assert_eq!(config.watermark(), 20);
        assert_eq!(config.data_rate(), DataRate::Hz800);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Setting::parse(ConfigOption::DataRate, "12.5").unwrap(),
            Setting::DataRate(DataRate::Hz12_5)
        );
        assert_eq!(
            Setting::parse(ConfigOption::DataRate, "100Hz").unwrap(),
            Setting::DataRate(DataRate::Hz100)
        );
        assert_eq!(
            Setting::parse(ConfigOption::BitDepth, "8").unwrap(),
            Setting::BitDepth(BitDepth::Bits8)
        );
        assert_eq!(
            Setting::parse(ConfigOption::PowerMode, "high-resolution").unwrap(),
            Setting::PowerMode(PowerMode::HighResolution)
        );
        assert_eq!(
            Setting::parse(ConfigOption::FifoMode, "Fill").unwrap(),
            Setting::FifoMode(FifoMode::Fill)
        );
        assert!(Setting::parse(ConfigOption::DataRate, "1000").is_err());
        assert!(Setting::parse(ConfigOption::Watermark, "40").is_err());
        assert!(Setting::parse(ConfigOption::LowNoise, "maybe").is_err());
    }

    #[test]
    fn test_option_names_round_trip() {
        for option in ConfigOption::ALL {
            assert_eq!(ConfigOption::from_name(option.name()), Some(option));
        }
        assert_eq!(ConfigOption::from_name("gain"), None);
    }

    #[test]
    fn test_counts_per_g() {
        let cases = [
            (BitDepth::Bits14, FullScale::G2, 4096.0),
            (BitDepth::Bits14, FullScale::G4, 2048.0),
            (BitDepth::Bits14, FullScale::G8, 1024.0),
            (BitDepth::Bits8, FullScale::G2, 64.0),
            (BitDepth::Bits8, FullScale::G4, 32.0),
            (BitDepth::Bits8, FullScale::G8, 16.0),
        ];
        for (depth, range, expected) in cases {
            assert_eq!(Scale::new(depth, range).counts_per_g(), expected);
        }
    }

    #[test]
    fn test_to_counts_saturates() {
        let scale = Scale::new(BitDepth::Bits14, FullScale::G2);
        assert_eq!(scale.to_counts(1.0), 4096);
        assert_eq!(scale.to_counts(-1.0), -4096);
        assert_eq!(scale.to_counts(5.0), 8191);
        assert_eq!(scale.to_counts(-5.0), -8192);
    }
}
