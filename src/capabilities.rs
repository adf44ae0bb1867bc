// SPDX-License-Identifier: GPL-3.0-only
//! Parsed capabilities strings
//!
//! Parsing is entirely the library's business; this module only owns the
//! resulting record and copies values out of it on request.

use std::ffi::CString;
use std::fmt;
use std::ptr;

use crate::error::{DecodeError, Error, Result};
use crate::ffi::{self, Api, DdcaCapabilities, DdcaStatus};
use crate::handle::{HandleKind, Owned};
use crate::library::Ddcutil;
use crate::marshal;
use crate::status;
use crate::types::{CapabilityFeature, MccsVersionSpec};

pub(crate) enum CapabilitiesKind {}

impl HandleKind for CapabilitiesKind {
    type Raw = *mut DdcaCapabilities;
    const NAME: &'static str = "parsed capabilities";
    const RELEASE_OP: &'static str = "ddca_free_parsed_capabilities";

    unsafe fn release(api: &Api, raw: Self::Raw) -> DdcaStatus {
        unsafe { (api.ddca_free_parsed_capabilities)(raw) };
        status::codes::OK
    }
}

/// A capabilities string parsed by the library
pub struct ParsedCapabilities {
    inner: Owned<CapabilitiesKind>,
}

impl ParsedCapabilities {
    fn record(&self) -> Result<&DdcaCapabilities> {
        let raw = self.inner.raw()?;
        // SAFETY: the record stays live until released, which needs `&mut self`.
        Ok(unsafe { &*raw })
    }

    /// The string that was parsed
    pub fn unparsed(&self) -> Result<Option<String>> {
        let record = self.record()?;
        Ok(unsafe { marshal::string(record.unparsed_string, "unparsed_string") }?)
    }

    /// MCCS version declared by the `mccs_ver()` group
    pub fn mccs_version(&self) -> Result<MccsVersionSpec> {
        Ok(self.record()?.version_spec.into())
    }

    /// Features declared by the `vcp()` group, in declaration order
    pub fn features(&self) -> Result<Vec<CapabilityFeature>> {
        let record = self.record()?;
        if record.vcp_code_ct < 0 {
            return Err(DecodeError::BadLength {
                field: "vcp_codes",
                len: record.vcp_code_ct as i64,
            }
            .into());
        }
        if record.vcp_code_ct > 0 && record.vcp_codes.is_null() {
            return Err(DecodeError::NullPointer { field: "vcp_codes" }.into());
        }

        (0..record.vcp_code_ct as usize)
            .map(|ndx| {
                // SAFETY: `vcp_codes` holds `vcp_code_ct` entries.
                let entry = unsafe { &*record.vcp_codes.add(ndx) };
                Ok(unsafe { marshal::capability_feature(entry) }?)
            })
            .collect()
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }

    pub fn release(mut self) -> Result<()> {
        self.inner.release()
    }
}

impl fmt::Debug for ParsedCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedCapabilities")
            .field("mccs_version", &self.mccs_version().ok())
            .field("features", &self.features().map(|v| v.len()).ok())
            .finish()
    }
}

impl Ddcutil {
    /// Parse a capabilities string with the library's parser
    pub fn parse_capabilities(&self, caps: &str) -> Result<ParsedCapabilities> {
        let ccaps = CString::new(caps)
            .map_err(|_| Error::InvalidArgument("capabilities string contains a NUL byte".to_string()))?;
        let api = self.api();
        let mut parsed: *mut DdcaCapabilities = ptr::null_mut();
        // SAFETY: `ccaps` outlives the call; `parsed` is written on success.
        let rc = unsafe { (api.ddca_parse_capabilities_string)(ccaps.as_ptr(), &mut parsed) };
        status::check(api, rc, "ddca_parse_capabilities_string")?;
        if parsed.is_null() {
            return Err(DecodeError::NullPointer {
                field: "parsed capabilities",
            }
            .into());
        }

        // SAFETY: the library handed ownership of `parsed` to us.
        let parsed = ParsedCapabilities {
            inner: unsafe { Owned::from_raw(self.clone(), parsed) },
        };
        let record = parsed.record()?;
        marshal::check_marker(&record.marker, ffi::CAPABILITIES_MARKER, "DDCA_Capabilities")?;
        Ok(parsed)
    }
}
