// SPDX-License-Identifier: GPL-3.0-only
//! Conversion of native output parameters into owned Rust values
//!
//! Nothing returned from here borrows library memory. Every function taking a
//! raw pointer is `unsafe`: the caller vouches that the pointer is either NULL
//! or points to a live value of the documented layout.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::error::DecodeError;
use crate::ffi::{self, Api, DdcaAnyVcpValue, DdcaCapVcp, DdcaFeatureValueEntry, DdcaIoPath, DdcaVersionFeatureInfo};
use crate::types::{
    CapabilityFeature, Edid, FeatureFlags, FeatureInfo, FeatureValue, FeatureValueTable, IoPath, MccsVersionId,
    NonTableValue, VcpValue,
};

/// Upper bound on a value table scan: one entry per byte value plus the
/// terminator
pub const VALUE_TABLE_LIMIT: usize = 257;

/// Decode a NUL terminated UTF-8 string, NULL maps to `None`
///
/// # Safety
/// `ptr` must be NULL or point to a NUL terminated string.
pub unsafe fn string(ptr: *const c_char, field: &'static str) -> Result<Option<String>, DecodeError> {
    if ptr.is_null() {
        return Ok(None);
    }
    let cstr = unsafe { CStr::from_ptr(ptr) };
    cstr.to_str()
        .map(|s| Some(s.to_owned()))
        .map_err(|_| DecodeError::InvalidUtf8 { field })
}

/// Decode a string that must be present
///
/// # Safety
/// As for [`string`].
pub unsafe fn required_string(ptr: *const c_char, field: &'static str) -> Result<String, DecodeError> {
    unsafe { string(ptr, field) }?.ok_or(DecodeError::NullPointer { field })
}

/// Decode a string handed over to the caller, then free it
///
/// # Safety
/// `ptr` must be NULL or a NUL terminated string allocated for the caller and
/// not freed by anyone else.
pub unsafe fn take_string(api: &Api, ptr: *mut c_char, field: &'static str) -> Result<String, DecodeError> {
    let text = unsafe { required_string(ptr, field) };
    if !ptr.is_null() {
        unsafe { (api.free)(ptr.cast()) };
    }
    text
}

/// Decode a string for diagnostics, replacing invalid UTF-8
///
/// # Safety
/// As for [`string`].
pub unsafe fn lossy_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

/// Copy a 128 byte EDID block
///
/// # Safety
/// `ptr` must be NULL or point to at least [`ffi::EDID_SIZE`] readable bytes.
pub unsafe fn edid(ptr: *const u8) -> Option<Edid> {
    if ptr.is_null() {
        return None;
    }
    let mut bytes = [0u8; ffi::EDID_SIZE];
    bytes.copy_from_slice(unsafe { std::slice::from_raw_parts(ptr, ffi::EDID_SIZE) });
    Some(Edid::new(bytes))
}

/// Copy `len` bytes, NULL is only accepted for an empty buffer
///
/// # Safety
/// `ptr` must be NULL or point to at least `len` readable bytes.
pub unsafe fn bytes(ptr: *const u8, len: i64, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    if len < 0 {
        return Err(DecodeError::BadLength { field, len });
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(DecodeError::NullPointer { field });
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec())
}

/// Verify the four byte marker at the head of a library record
pub fn check_marker(marker: &[c_char; 4], expected: [u8; 4], what: &'static str) -> Result<(), DecodeError> {
    let found = marker.map(|c| c as u8);
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::BadMarker { what, found })
    }
}

/// Decode the I/O path tagged union
pub fn io_path(raw: &DdcaIoPath) -> Result<IoPath, DecodeError> {
    // SAFETY: the union member read is the one selected by `io_mode`.
    unsafe {
        match raw.io_mode {
            ffi::DDCA_IO_I2C => Ok(IoPath::I2c {
                busno: raw.path.i2c_busno,
            }),
            ffi::DDCA_IO_ADL => Ok(IoPath::Adl {
                adapter_index: raw.path.adlno.adapter_index,
                display_index: raw.path.adlno.display_index,
            }),
            ffi::DDCA_IO_USB => Ok(IoPath::Usb {
                hiddev_devno: raw.path.hiddev_devno,
            }),
            tag => Err(DecodeError::UnknownTag {
                what: "DDCA_IO_Mode",
                tag,
            }),
        }
    }
}

/// Decode a VCP value record
///
/// # Safety
/// For table values, `t.bytes` must be NULL or point to `t.bytect` bytes.
pub unsafe fn vcp_value(raw: &DdcaAnyVcpValue) -> Result<FeatureValue, DecodeError> {
    let value = match raw.value_type {
        ffi::DDCA_NON_TABLE_VCP_VALUE => {
            let b = unsafe { raw.val.c_nc };
            VcpValue::NonTable(NonTableValue {
                mh: b.mh,
                ml: b.ml,
                sh: b.sh,
                sl: b.sl,
            })
        }
        ffi::DDCA_TABLE_VCP_VALUE => {
            let t = unsafe { raw.val.t };
            VcpValue::Table(unsafe { bytes(t.bytes, t.bytect as i64, "table value") }?)
        }
        tag => {
            return Err(DecodeError::UnknownTag {
                what: "DDCA_Vcp_Value_Type",
                tag,
            });
        }
    };

    Ok(FeatureValue {
        code: raw.opcode,
        value,
    })
}

/// Scan a `{0, NULL}` terminated value table
///
/// # Safety
/// `table` must be NULL or point to entries up to and including the
/// terminator, or at least [`VALUE_TABLE_LIMIT`] entries.
pub unsafe fn value_table(table: *const DdcaFeatureValueEntry) -> Result<FeatureValueTable, DecodeError> {
    if table.is_null() {
        return Err(DecodeError::NullPointer {
            field: "feature value table",
        });
    }

    let mut entries = Vec::new();
    for ndx in 0..VALUE_TABLE_LIMIT {
        let entry = unsafe { &*table.add(ndx) };
        if entry.value_code == 0 && entry.value_name.is_null() {
            return Ok(entries.into_iter().collect());
        }
        let name = unsafe { required_string(entry.value_name, "feature value name") }?;
        entries.push((entry.value_code, name));
    }

    Err(DecodeError::UnterminatedTable {
        limit: VALUE_TABLE_LIMIT,
    })
}

/// Copy a feature info record
///
/// # Safety
/// All pointer members must be NULL or valid for their documented layouts.
pub unsafe fn feature_info(raw: &DdcaVersionFeatureInfo) -> Result<FeatureInfo, DecodeError> {
    check_marker(&raw.marker, ffi::FEATURE_INFO_MARKER, "DDCA_Version_Feature_Info")?;

    let values = if raw.sl_values.is_null() {
        None
    } else {
        Some(unsafe { value_table(raw.sl_values) }?)
    };

    Ok(FeatureInfo {
        code: raw.feature_code,
        version: raw.vspec.into(),
        version_id: MccsVersionId::from_raw(raw.version_id)?,
        name: unsafe { string(raw.feature_name, "feature_name") }?,
        description: unsafe { string(raw.desc, "desc") }?,
        flags: FeatureFlags::from_bits_retain(raw.feature_flags),
        values,
    })
}

/// Copy one `vcp()` entry of a parsed capabilities record
///
/// # Safety
/// `raw.values` must be NULL or point to `raw.value_ct` bytes.
pub unsafe fn capability_feature(raw: &DdcaCapVcp) -> Result<CapabilityFeature, DecodeError> {
    check_marker(&raw.marker, ffi::CAP_VCP_MARKER, "DDCA_Cap_Vcp")?;
    Ok(CapabilityFeature {
        code: raw.feature_code,
        values: unsafe { bytes(raw.values, raw.value_ct as i64, "capability values") }?,
    })
}
