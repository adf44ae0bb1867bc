// SPDX-License-Identifier: GPL-3.0-only
//! VCP feature metadata

use std::ptr;

use crate::error::{DecodeError, Result};
use crate::ffi::{Api, DdcaFeatureValueEntry, DdcaVersionFeatureInfo};
use crate::library::Ddcutil;
use crate::marshal;
use crate::status;
use crate::types::{FeatureCode, FeatureInfo, FeatureValueTable, MccsVersionId};

/// Copy a feature info record and free it
///
/// # Safety
/// `info` must be NULL or a record returned by one of the feature info entry
/// points that nobody else frees.
pub(crate) unsafe fn take_feature_info(api: &Api, info: *mut DdcaVersionFeatureInfo) -> Result<FeatureInfo> {
    if info.is_null() {
        return Err(DecodeError::NullPointer { field: "feature info" }.into());
    }
    let copied = unsafe { marshal::feature_info(&*info) };
    let rc = unsafe { (api.ddca_free_feature_info)(info) };
    let copied = copied?;
    status::check(api, rc, "ddca_free_feature_info")?;
    Ok(copied)
}

impl Ddcutil {
    /// Name of a feature code, independent of MCCS version
    pub fn feature_name(&self, code: FeatureCode) -> Result<Option<String>> {
        // SAFETY: feature names are static strings.
        let name = unsafe { (self.api().ddca_get_feature_name)(code) };
        Ok(unsafe { marshal::string(name, "feature name") }?)
    }

    /// Metadata about a feature code for one MCCS version
    pub fn feature_info(&self, code: FeatureCode, version: MccsVersionId) -> Result<FeatureInfo> {
        let api = self.api();
        let mut info = ptr::null_mut();
        let rc = unsafe { (api.ddca_get_feature_info_by_vcp_version)(code, version.as_raw(), &mut info) };
        status::check_with(api, rc, "ddca_get_feature_info_by_vcp_version", || {
            Some(format!("feature 0x{code:02x}, {version:?}"))
        })?;
        // SAFETY: `info` was just returned by the library and is freed here.
        unsafe { take_feature_info(api, info) }
    }

    /// Value names of a simple NC feature
    pub fn simple_value_table(&self, code: FeatureCode, version: MccsVersionId) -> Result<FeatureValueTable> {
        let api = self.api();
        let mut table: *mut DdcaFeatureValueEntry = ptr::null_mut();
        // SAFETY: the table is static and must not be freed.
        let rc = unsafe { (api.ddca_get_simple_sl_value_table)(code, version.as_raw(), &mut table) };
        status::check_with(api, rc, "ddca_get_simple_sl_value_table", || {
            Some(format!("feature 0x{code:02x}, {version:?}"))
        })?;
        Ok(unsafe { marshal::value_table(table) }?)
    }
}
