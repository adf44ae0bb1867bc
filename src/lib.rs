// SPDX-License-Identifier: GPL-3.0-only
//! Safe access to libddcutil, the DDC/CI monitor control library
//!
//! The adapter forwards every operation to the native library and does no
//! monitor communication of its own. What it adds:
//!
//! - native handles become owned values that are released exactly once
//! - non-zero status codes become [`Error::Status`], named and described by
//!   the library itself
//! - output parameters are copied into owned Rust values before the native
//!   memory behind them is freed
//!
//! ```no_run
//! use ddcutil_adapter::{Criterion, Ddcutil};
//!
//! let lib = Ddcutil::load()?;
//! lib.with_display(&Criterion::DisplayNumber(1), |dh| dh.set_vcp_value(0x10, 75))?;
//! # Ok::<(), ddcutil_adapter::Error>(())
//! ```

#[macro_use]
extern crate tracing;

pub mod capabilities;
pub mod config;
pub mod display;
pub mod error;
pub mod feature;
pub mod ffi;
pub mod handle;
pub mod library;
pub mod marshal;
pub mod status;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use capabilities::ParsedCapabilities;
pub use config::Config;
pub use display::{AsDisplayRef, Criterion, DisplayHandle, DisplayIdentifier, DisplayInfo, DisplayRef, DisplayRefToken};
pub use error::{DecodeError, Error, Result, StatusError};
pub use library::{Ddcutil, LibraryInfo};
pub use types::{
    BuildOptions, CapabilityFeature, Edid, FeatureCode, FeatureFlags, FeatureInfo, FeatureValue, FeatureValueTable,
    IoPath, MccsVersionId, MccsVersionSpec, NonTableValue, OutputLevel, RetryType, ValueTypeHint, VcpValue, Version,
};
