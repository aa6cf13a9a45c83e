#[cfg(feature = "clap")]
use clap::ValueEnum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

// Legacy 'Invalid' markers, as reported by older firmware and other language bindings. The Rust
// API reports failures through Result, but these are still handy when bridging to those.
pub const INVALID_DOUBLE: f64 = -66666666.0;
pub const INVALID_STRING: &str = "!INVALID!";
pub const LINK_QUALITY_INVALID: i32 = -1;
pub const CHANNEL_INVALID: u32 = 0xffff_ffff;

/// Load cell bridge excitation method.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, EnumString, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[repr(i32)]
pub enum Excitation {
    #[strum(serialize = "OFF")]
    Off = 0,
    #[strum(serialize = "DC")]
    Dc = 1,
    #[strum(serialize = "AC")]
    Ac = 2,
}

/// Security algorithm used by a wireless network.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, EnumString, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[repr(i32)]
pub enum Security {
    #[strum(serialize = "UNKNOWN")]
    Unknown = 0,
    #[strum(serialize = "OPEN")]
    Open = 1,
    #[strum(serialize = "WEP")]
    Wep = 2,
    #[strum(serialize = "WPA")]
    Wpa = 3,
    #[strum(serialize = "WPA2")]
    Wpa2 = 4,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[repr(i32)]
pub enum Beacon {
    Off = 0,
    On = 1,
}

/// The kinds of function this API can drive.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, EnumString, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FunctionClass {
    Module,
    WeighScale,
    Wireless,
}

impl FunctionClass {
    /// Class name as listed in the hub's yellow pages.
    pub fn class_name(&self) -> &'static str {
        match self {
            FunctionClass::Module => "Module",
            FunctionClass::WeighScale => "WeighScale",
            FunctionClass::Wireless => "Wireless",
        }
    }

    /// Function identifier prefix, before the instance index ("weighScale" in "weighScale1").
    pub fn base_function_id(&self) -> &'static str {
        match self {
            FunctionClass::Module => "module",
            FunctionClass::WeighScale => "weighScale",
            FunctionClass::Wireless => "wireless",
        }
    }

    pub fn from_class_name(name: &str) -> Option<FunctionClass> {
        match name {
            "Module" => Some(FunctionClass::Module),
            "WeighScale" => Some(FunctionClass::WeighScale),
            "Wireless" => Some(FunctionClass::Wireless),
            _ => None,
        }
    }
}

/// Status codes shared by all Yoctopuce libraries.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[repr(i32)]
pub enum ApiCode {
    Success = 0,
    NotInitialized = -1,
    InvalidArgument = -2,
    NotSupported = -3,
    DeviceNotFound = -4,
    VersionMismatch = -5,
    DeviceBusy = -6,
    Timeout = -7,
    IoError = -8,
    NoMoreData = -9,
    Exhausted = -10,
    DoubleAccess = -11,
    Unauthorized = -12,
    RtcNotReady = -13,
    FileNotFound = -14,
}

impl ApiCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn excitation_codes_match_device_values() {
        assert_eq!(Excitation::from_repr(0), Some(Excitation::Off));
        assert_eq!(Excitation::from_repr(2), Some(Excitation::Ac));
        assert_eq!(Excitation::from_repr(3), None);
        assert_eq!(Excitation::from_repr(-1), None);
        assert_eq!(Excitation::from_str("DC").ok(), Some(Excitation::Dc));
    }

    #[test]
    fn security_codes_are_contiguous() {
        for (index, security) in Security::iter().enumerate() {
            assert_eq!(security as i32, index as i32);
        }
        assert_eq!(Security::Wpa2.to_string(), "WPA2");
    }

    #[test]
    fn function_class_names_round_trip() {
        for class in FunctionClass::iter() {
            assert_eq!(FunctionClass::from_class_name(class.class_name()), Some(class));
        }
        assert_eq!(FunctionClass::from_class_name("Relay"), None);
    }

    #[test]
    fn api_codes_are_negative_on_failure() {
        for code in ApiCode::iter().filter(|c| *c != ApiCode::Success) {
            assert!(code.code() < 0);
        }
        assert_eq!(ApiCode::from_repr(-4), Some(ApiCode::DeviceNotFound));
    }
}
