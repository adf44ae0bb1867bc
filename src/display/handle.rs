// SPDX-License-Identifier: GPL-3.0-only
//! Open display sessions

use std::fmt;
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::capabilities::ParsedCapabilities;
use crate::error::{DecodeError, Result};
use crate::feature;
use crate::ffi::{Api, DdcaDisplayHandle, DdcaDisplayRef, DdcaMccsVersionSpec, DdcaStatus};
use crate::handle::{HandleKind, Owned};
use crate::library::Ddcutil;
use crate::marshal;
use crate::status;
use crate::types::{
    split_u16, FeatureCode, FeatureInfo, FeatureValue, MccsVersionId, MccsVersionSpec, ValueTypeHint,
};

pub(crate) enum SessionKind {}

impl HandleKind for SessionKind {
    type Raw = DdcaDisplayHandle;
    const NAME: &'static str = "display handle";
    const RELEASE_OP: &'static str = "ddca_close_display";

    unsafe fn release(api: &Api, raw: Self::Raw) -> DdcaStatus {
        unsafe { (api.ddca_close_display)(raw) }
    }

    unsafe fn repr(api: &Api, raw: Self::Raw) -> *const c_char {
        unsafe { (api.ddca_dh_repr)(raw) }
    }
}

/// An open communication session with one monitor
///
/// Every VCP operation needs an open handle. Closing is explicit through
/// [`DisplayHandle::close`]; a handle dropped while open is closed and a
/// failure to do so is logged.
#[derive(Debug)]
pub struct DisplayHandle {
    inner: Owned<SessionKind>,
}

impl DisplayHandle {
    pub(crate) fn open(lib: &Ddcutil, dref: DdcaDisplayRef) -> Result<Self> {
        let api = lib.api();
        let mut dh = ptr::null_mut();
        // SAFETY: `dref` is live; `dh` is written on success.
        let rc = unsafe { (api.ddca_open_display)(dref, &mut dh) };
        status::check_with(api, rc, "ddca_open_display", || {
            // SAFETY: repr strings are library owned.
            unsafe { marshal::lossy_string((api.ddca_dref_repr)(dref)) }
        })?;
        // SAFETY: the library handed ownership of `dh` to us.
        Ok(Self {
            inner: unsafe { Owned::from_raw(lib.clone(), dh) },
        })
    }

    fn parts(&self) -> Result<(&Api, DdcaDisplayHandle)> {
        let dh = self.inner.raw()?;
        Ok((self.inner.lib().api(), dh))
    }

    /// MCCS version the monitor reports
    pub fn mccs_version(&self) -> Result<MccsVersionSpec> {
        let (api, dh) = self.parts()?;
        let mut spec = DdcaMccsVersionSpec::default();
        let rc = unsafe { (api.ddca_get_mccs_version)(dh, &mut spec) };
        status::check(api, rc, "ddca_get_mccs_version")?;
        Ok(spec.into())
    }

    /// MCCS version the monitor reports, as an identifier
    pub fn mccs_version_id(&self) -> Result<MccsVersionId> {
        let (api, dh) = self.parts()?;
        let mut id: c_int = 0;
        let rc = unsafe { (api.ddca_get_mccs_version_id)(dh, &mut id) };
        status::check(api, rc, "ddca_get_mccs_version_id")?;
        Ok(MccsVersionId::from_raw(id)?)
    }

    /// Unparsed capabilities string
    pub fn capabilities_string(&self) -> Result<String> {
        let (api, dh) = self.parts()?;
        let mut caps: *mut c_char = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_capabilities_string)(dh, &mut caps) };
        status::check(api, rc, "ddca_get_capabilities_string")?;
        // SAFETY: the string was malloc'ed for us and is released here.
        Ok(unsafe { marshal::take_string(api, caps, "capabilities string") }?)
    }

    /// Capabilities string as parsed by the library
    pub fn capabilities(&self) -> Result<ParsedCapabilities> {
        let caps = self.capabilities_string()?;
        self.inner.lib().parse_capabilities(&caps)
    }

    /// Metadata about `code` for the monitor's MCCS version
    pub fn feature_info(&self, code: FeatureCode) -> Result<FeatureInfo> {
        let (api, dh) = self.parts()?;
        let mut info = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_feature_info_by_display)(dh, code, &mut info) };
        status::check_with(api, rc, "ddca_get_feature_info_by_display", || {
            Some(format!("feature 0x{code:02x}"))
        })?;
        // SAFETY: `info` was just returned by the library and is freed here.
        unsafe { feature::take_feature_info(api, info) }
    }

    /// Name of one value of a simple NC feature
    pub fn simple_nc_value_name(&self, code: FeatureCode, value: u8) -> Result<String> {
        let (api, dh) = self.parts()?;
        let mut name: *mut c_char = ptr::null_mut();
        // SAFETY: the name points into a static table.
        let rc = unsafe { (api.ddca_get_simple_nc_feature_value_name)(dh, code, value, &mut name) };
        status::check_with(api, rc, "ddca_get_simple_nc_feature_value_name", || {
            Some(format!("feature 0x{code:02x}, value 0x{value:02x}"))
        })?;
        Ok(unsafe { marshal::required_string(name, "feature value name") }?)
    }

    /// Read a feature, letting the library pick the value type
    pub fn vcp_value(&self, code: FeatureCode) -> Result<FeatureValue> {
        self.vcp_value_as(code, ValueTypeHint::Unset)
    }

    /// Read a feature as the given value type
    pub fn vcp_value_as(&self, code: FeatureCode, hint: ValueTypeHint) -> Result<FeatureValue> {
        let (api, dh) = self.parts()?;
        let mut record = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_any_vcp_value_using_explicit_type)(dh, code, hint.as_raw(), &mut record) };
        status::check_with(api, rc, "ddca_get_any_vcp_value_using_explicit_type", || {
            Some(format!("feature 0x{code:02x}, {hint:?}"))
        })?;
        if record.is_null() {
            return Err(DecodeError::NullPointer { field: "vcp value" }.into());
        }

        // SAFETY: `record` is live until freed just below.
        let value = unsafe { marshal::vcp_value(&*record) };
        unsafe { (api.ddca_free_any_vcp_value)(record) };
        let value = value?;
        debug!("feature 0x{:02x} = {:?}", code, value.value);
        Ok(value)
    }

    /// Value formatted by the library for display
    pub fn formatted_vcp_value(&self, code: FeatureCode) -> Result<String> {
        let (api, dh) = self.parts()?;
        let mut formatted: *mut c_char = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_formatted_vcp_value)(dh, code, &mut formatted) };
        status::check_with(api, rc, "ddca_get_formatted_vcp_value", || {
            Some(format!("feature 0x{code:02x}"))
        })?;
        // SAFETY: the string was malloc'ed for us and is released here.
        Ok(unsafe { marshal::take_string(api, formatted, "formatted value") }?)
    }

    /// Write a continuous value
    pub fn set_vcp_value(&self, code: FeatureCode, value: u16) -> Result<()> {
        let (hi, lo) = split_u16(value);
        self.set_non_table_value(code, hi, lo)
    }

    /// Write a simple NC value, which only occupies the low byte
    pub fn set_simple_nc_value(&self, code: FeatureCode, value: u8) -> Result<()> {
        self.set_non_table_value(code, 0, value)
    }

    /// Write raw SH and SL bytes
    pub fn set_non_table_value(&self, code: FeatureCode, hi: u8, lo: u8) -> Result<()> {
        let (api, dh) = self.parts()?;
        debug!("set feature 0x{:02x} to ({}, {})", code, hi, lo);
        let rc = unsafe { (api.ddca_set_non_table_vcp_value)(dh, code, hi, lo) };
        status::check_with(api, rc, "ddca_set_non_table_vcp_value", || {
            Some(format!("feature 0x{code:02x}, hi=0x{hi:02x}, lo=0x{lo:02x}"))
        })
    }

    /// Settings worth saving for a color profile, in the library's own format
    pub fn profile_related_values(&self) -> Result<String> {
        let (api, dh) = self.parts()?;
        let mut values: *mut c_char = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_profile_related_values)(dh, &mut values) };
        status::check(api, rc, "ddca_get_profile_related_values")?;
        // SAFETY: the string was malloc'ed for us and is released here.
        Ok(unsafe { marshal::take_string(api, values, "profile values") }?)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_released()
    }

    /// Close the session
    pub fn close(mut self) -> Result<()> {
        self.inner.release()
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
