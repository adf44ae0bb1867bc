// SPDX-License-Identifier: GPL-3.0-only
//! Value types handed out by the adapter
//!
//! None of these hold native resources; everything is copied out of library
//! memory before it is returned.

use std::collections::BTreeMap;
use std::fmt;
use std::os::raw::c_int;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::ffi;

/// MCCS VCP feature code
pub type FeatureCode = u8;

/// libddcutil version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub micro: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl From<ffi::DdcaDdcutilVersionSpec> for Version {
    fn from(raw: ffi::DdcaDdcutilVersionSpec) -> Self {
        Self {
            major: raw.major,
            minor: raw.minor,
            micro: raw.micro,
        }
    }
}

bitflags! {
    /// Optional facilities libddcutil was built with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BuildOptions: u8 {
        /// AMD Display Library connected monitors
        const ADL = 0x01;
        /// USB connected monitors
        const USB = 0x02;
        /// Failure simulation
        const FAILSIM = 0x04;
    }
}

/// MCCS version as reported by feature xDF
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MccsVersionSpec {
    pub major: u8,
    pub minor: u8,
}

impl MccsVersionSpec {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for MccsVersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl From<ffi::DdcaMccsVersionSpec> for MccsVersionSpec {
    fn from(raw: ffi::DdcaMccsVersionSpec) -> Self {
        Self::new(raw.major, raw.minor)
    }
}

/// MCCS version identifier
///
/// As a query `Any` matches every version; as a response it means the
/// version is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MccsVersionId {
    Any = 0,
    V10 = 1,
    V20 = 2,
    V21 = 4,
    V30 = 8,
    V22 = 16,
}

impl MccsVersionId {
    pub fn from_raw(tag: c_int) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::Any),
            1 => Ok(Self::V10),
            2 => Ok(Self::V20),
            4 => Ok(Self::V21),
            8 => Ok(Self::V30),
            16 => Ok(Self::V22),
            _ => Err(DecodeError::UnknownTag {
                what: "DDCA_MCCS_Version_Id",
                tag,
            }),
        }
    }

    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Identifier for a version written as `major.minor`, `Any` if unknown
    pub fn from_spec(spec: MccsVersionSpec) -> Self {
        match (spec.major, spec.minor) {
            (1, 0) => Self::V10,
            (2, 0) => Self::V20,
            (2, 1) => Self::V21,
            (2, 2) => Self::V22,
            (3, 0) => Self::V30,
            _ => Self::Any,
        }
    }
}

/// Retry limit categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryType {
    WriteOnly,
    WriteRead,
    MultiPart,
}

impl RetryType {
    pub fn as_raw(self) -> c_int {
        match self {
            Self::WriteOnly => ffi::DDCA_WRITE_ONLY_TRIES,
            Self::WriteRead => ffi::DDCA_WRITE_READ_TRIES,
            Self::MultiPart => ffi::DDCA_MULTI_PART_TRIES,
        }
    }
}

/// Library message verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Terse,
    Normal,
    Verbose,
}

impl OutputLevel {
    pub fn as_raw(self) -> c_int {
        match self {
            Self::Terse => 0x04,
            Self::Normal => 0x08,
            Self::Verbose => 0x10,
        }
    }

    pub fn from_raw(tag: c_int) -> Result<Self, DecodeError> {
        match tag {
            0x04 => Ok(Self::Terse),
            0x08 => Ok(Self::Normal),
            0x10 => Ok(Self::Verbose),
            _ => Err(DecodeError::UnknownTag {
                what: "DDCA_Output_Level",
                tag,
            }),
        }
    }
}

/// Physical access path to a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoPath {
    /// `/dev/i2c-N`
    I2c { busno: i32 },
    /// AMD Display Library adapter/display pair
    Adl { adapter_index: i32, display_index: i32 },
    /// USB HID device `/dev/usb/hiddevN`
    Usb { hiddev_devno: i32 },
}

impl fmt::Display for IoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoPath::I2c { busno } => write!(f, "/dev/i2c-{busno}"),
            IoPath::Adl {
                adapter_index,
                display_index,
            } => write!(f, "adl {adapter_index}.{display_index}"),
            IoPath::Usb { hiddev_devno } => write!(f, "/dev/usb/hiddev{hiddev_devno}"),
        }
    }
}

/// First 128 byte EDID block
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Edid(Box<[u8; ffi::EDID_SIZE]>);

impl Edid {
    pub fn new(bytes: [u8; ffi::EDID_SIZE]) -> Self {
        Self(Box::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ffi::EDID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Edid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edid(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Non-table value as the four MH/ML/SH/SL bytes
///
/// For continuous features the maximum is `mh << 8 | ml` and the current
/// value is `sh << 8 | sl`. Simple NC features only use `sl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NonTableValue {
    pub mh: u8,
    pub ml: u8,
    pub sh: u8,
    pub sl: u8,
}

impl NonTableValue {
    /// Build from continuous maximum and current values
    pub fn continuous(max: u16, current: u16) -> Self {
        let (mh, ml) = split_u16(max);
        let (sh, sl) = split_u16(current);
        Self { mh, ml, sh, sl }
    }

    pub fn max_value(&self) -> u16 {
        join_u16(self.mh, self.ml)
    }

    pub fn current_value(&self) -> u16 {
        join_u16(self.sh, self.sl)
    }

    /// Same maximum, replaced current value
    pub fn with_current(self, current: u16) -> Self {
        let (sh, sl) = split_u16(current);
        Self { sh, sl, ..self }
    }
}

/// Split a 16 bit value into its (high, low) bytes
pub fn split_u16(value: u16) -> (u8, u8) {
    ((value >> 8) as u8, (value & 0xff) as u8)
}

/// Inverse of [`split_u16`]
pub fn join_u16(hi: u8, lo: u8) -> u16 {
    (hi as u16) << 8 | lo as u16
}

/// A VCP value read from a monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcpValue {
    /// Continuous or non-continuous value
    NonTable(NonTableValue),
    /// Table value
    Table(Vec<u8>),
}

impl VcpValue {
    pub fn as_non_table(&self) -> Option<&NonTableValue> {
        match self {
            VcpValue::NonTable(v) => Some(v),
            VcpValue::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&[u8]> {
        match self {
            VcpValue::Table(bytes) => Some(bytes),
            VcpValue::NonTable(_) => None,
        }
    }
}

/// A value read for one feature code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureValue {
    pub code: FeatureCode,
    pub value: VcpValue,
}

/// Value type to request when reading, `Unset` lets the library decide
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueTypeHint {
    #[default]
    Unset,
    NonTable,
    Table,
}

impl ValueTypeHint {
    pub fn as_raw(self) -> c_int {
        match self {
            Self::Unset => ffi::DDCA_UNSET_VCP_VALUE_TYPE_PARM,
            Self::NonTable => ffi::DDCA_NON_TABLE_VCP_VALUE_PARM,
            Self::Table => ffi::DDCA_TABLE_VCP_VALUE_PARM,
        }
    }
}

bitflags! {
    /// Feature attributes, possibly MCCS version dependent
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u16 {
        const RO = 0x0400;
        const WO = 0x0200;
        const RW = 0x0100;
        const STD_CONT = 0x0080;
        const COMPLEX_CONT = 0x0040;
        const SIMPLE_NC = 0x0020;
        const COMPLEX_NC = 0x0010;
        const WO_NC = 0x0008;
        const NORMAL_TABLE = 0x0004;
        const WO_TABLE = 0x0002;
        const DEPRECATED = 0x0001;
        const SYNTHETIC = 0x8000;

        const READABLE = Self::RO.bits() | Self::RW.bits();
        const WRITABLE = Self::WO.bits() | Self::RW.bits();
        const CONT = Self::STD_CONT.bits() | Self::COMPLEX_CONT.bits();
        const NC = Self::SIMPLE_NC.bits() | Self::COMPLEX_NC.bits() | Self::WO_NC.bits();
        const TABLE = Self::NORMAL_TABLE.bits() | Self::WO_TABLE.bits();
    }
}

impl FeatureFlags {
    pub fn is_readable(self) -> bool {
        self.intersects(Self::READABLE)
    }

    pub fn is_writable(self) -> bool {
        self.intersects(Self::WRITABLE)
    }

    pub fn is_continuous(self) -> bool {
        self.intersects(Self::CONT)
    }

    pub fn is_table(self) -> bool {
        self.intersects(Self::TABLE)
    }
}

/// Names of the values a simple NC feature may take
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureValueTable {
    entries: BTreeMap<u8, String>,
}

impl FeatureValueTable {
    pub fn lookup(&self, code: u8) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.entries.iter().map(|(code, name)| (*code, name.as_str()))
    }
}

impl FromIterator<(u8, String)> for FeatureValueTable {
    fn from_iter<I: IntoIterator<Item = (u8, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Metadata about a feature code for one MCCS version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
    pub code: FeatureCode,
    pub version: MccsVersionSpec,
    pub version_id: MccsVersionId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub flags: FeatureFlags,
    /// Present for simple NC features
    pub values: Option<FeatureValueTable>,
}

/// A feature declared in a capabilities string, with its declared values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFeature {
    pub code: FeatureCode,
    pub values: Vec<u8>,
}
