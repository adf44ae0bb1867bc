// SPDX-License-Identifier: GPL-3.0-only
//! Raw bindings to the libddcutil C API
//!
//! Struct layouts mirror the public ddcutil headers. Enumerations embedded in
//! structs are declared as `c_int` and decoded in [`crate::marshal`], so an
//! unexpected discriminant from the library can never produce an invalid Rust
//! enum.
//!
//! Ownership of pointers handed back by the library:
//!
//! | Entry point                               | Returned memory                     |
//! |-------------------------------------------|-------------------------------------|
//! | `ddca_get_display_info_list`              | freed with `ddca_free_display_info_list` |
//! | `ddca_get_capabilities_string`            | `malloc`ed, released with `Api::free` |
//! | `ddca_parse_capabilities_string`          | freed with `ddca_free_parsed_capabilities` |
//! | `ddca_get_feature_info_by_*`              | freed with `ddca_free_feature_info` |
//! | `ddca_get_simple_sl_value_table`          | static table, do not free           |
//! | `ddca_get_simple_nc_feature_value_name`   | points into a static table          |
//! | `ddca_get_any_vcp_value_using_explicit_type` | freed with `ddca_free_any_vcp_value` |
//! | `ddca_get_formatted_vcp_value`            | `malloc`ed, released with `Api::free` |
//! | `ddca_get_profile_related_values`         | `malloc`ed, released with `Api::free` |
//! | `ddca_get_edid_by_display_ref`            | library owned, do not free          |
//! | `*_repr`, `ddca_rc_*`, name lookups        | static or library owned             |

use std::fmt;
use std::os::raw::{c_char, c_int, c_void};

/// Status code returned by most entry points, 0 is success
pub type DdcaStatus = c_int;

/// VCP feature code
pub type DdcaVcpFeatureCode = u8;

/// Opaque display identifier
pub type DdcaDisplayIdentifier = *mut c_void;

/// Opaque display reference
pub type DdcaDisplayRef = *mut c_void;

/// Opaque open display handle
pub type DdcaDisplayHandle = *mut c_void;

/// Size of the first EDID block
pub const EDID_SIZE: usize = 128;

/// `DDCA_IO_Mode` discriminants
pub const DDCA_IO_I2C: c_int = 0;
pub const DDCA_IO_ADL: c_int = 1;
pub const DDCA_IO_USB: c_int = 2;

/// `DDCA_Vcp_Value_Type` discriminants
pub const DDCA_NON_TABLE_VCP_VALUE: c_int = 1;
pub const DDCA_TABLE_VCP_VALUE: c_int = 2;

/// `DDCA_Vcp_Value_Type_Parm` values
pub const DDCA_UNSET_VCP_VALUE_TYPE_PARM: c_int = 0;
pub const DDCA_NON_TABLE_VCP_VALUE_PARM: c_int = 1;
pub const DDCA_TABLE_VCP_VALUE_PARM: c_int = 2;

/// `DDCA_Retry_Type` values
pub const DDCA_WRITE_ONLY_TRIES: c_int = 0;
pub const DDCA_WRITE_READ_TRIES: c_int = 1;
pub const DDCA_MULTI_PART_TRIES: c_int = 2;

/// Struct markers written by the library at the head of its records
pub const DISPLAY_INFO_MARKER: [u8; 4] = *b"DDIN";
pub const FEATURE_INFO_MARKER: [u8; 4] = *b"VSFI";
pub const CAPABILITIES_MARKER: [u8; 4] = *b"DCAP";
pub const CAP_VCP_MARKER: [u8; 4] = *b"DCVP";

/// Library version
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcaDdcutilVersionSpec {
    pub major: u8,
    pub minor: u8,
    pub micro: u8,
}

/// MCCS version in binary form
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcaMccsVersionSpec {
    pub major: u8,
    pub minor: u8,
}

/// ADL adapter/display index pair
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcaAdlno {
    pub adapter_index: c_int,
    pub display_index: c_int,
}

/// Payload of [`DdcaIoPath`], selected by `io_mode`
#[repr(C)]
#[derive(Clone, Copy)]
pub union DdcaIoPathUnion {
    pub i2c_busno: c_int,
    pub adlno: DdcaAdlno,
    pub hiddev_devno: c_int,
}

/// Physical access path to a display
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DdcaIoPath {
    pub io_mode: c_int,
    pub path: DdcaIoPathUnion,
}

/// One monitor detected by the library
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DdcaDisplayInfo {
    pub marker: [c_char; 4],
    pub dispno: c_int,
    pub path: DdcaIoPath,
    pub usb_bus: c_int,
    pub usb_device: c_int,
    pub mfg_id: *const c_char,
    pub model_name: *const c_char,
    pub sn: *const c_char,
    pub edid_bytes: *const u8,
    pub dref: DdcaDisplayRef,
}

/// Header of the display list, `ct` records follow in place
#[repr(C)]
pub struct DdcaDisplayInfoList {
    pub ct: c_int,
    pub info: [DdcaDisplayInfo; 0],
}

/// One entry of a simple NC value table, `{0, NULL}` terminates the table
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DdcaFeatureValueEntry {
    pub value_code: u8,
    pub value_name: *mut c_char,
}

/// Feature description tailored to one MCCS version
#[repr(C)]
pub struct DdcaVersionFeatureInfo {
    pub marker: [c_char; 4],
    pub feature_code: DdcaVcpFeatureCode,
    pub vspec: DdcaMccsVersionSpec,
    pub version_id: c_int,
    pub desc: *mut c_char,
    pub sl_values: *mut DdcaFeatureValueEntry,
    pub feature_name: *mut c_char,
    pub feature_flags: u16,
}

/// One feature of the `vcp()` section of a capabilities string
#[repr(C)]
pub struct DdcaCapVcp {
    pub marker: [c_char; 4],
    pub feature_code: DdcaVcpFeatureCode,
    pub value_ct: c_int,
    pub values: *mut u8,
}

/// Parsed capabilities string
#[repr(C)]
pub struct DdcaCapabilities {
    pub marker: [c_char; 4],
    pub unparsed_string: *mut c_char,
    pub version_spec: DdcaMccsVersionSpec,
    pub vcp_code_ct: c_int,
    pub vcp_codes: *mut DdcaCapVcp,
}

/// Table value bytes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DdcaTableBytes {
    pub bytes: *mut u8,
    pub bytect: u16,
}

/// Non-table value bytes as they appear on the wire
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcaNonTableBytes {
    pub mh: u8,
    pub ml: u8,
    pub sh: u8,
    pub sl: u8,
}

/// Payload of [`DdcaAnyVcpValue`], selected by `value_type`
#[repr(C)]
#[derive(Clone, Copy)]
pub union DdcaVcpValueUnion {
    pub t: DdcaTableBytes,
    pub c_nc: DdcaNonTableBytes,
}

/// A VCP value of any type
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DdcaAnyVcpValue {
    pub opcode: DdcaVcpFeatureCode,
    pub value_type: c_int,
    pub val: DdcaVcpValueUnion,
}

macro_rules! ddca_api {
    ($( fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?; )*) => {
        /// Table of libddcutil entry points
        ///
        /// Every call the adapter makes into the library goes through this
        /// table, so an alternative implementation can stand in for the
        /// shared object.
        #[derive(Clone, Copy)]
        pub struct Api {
            $( pub $name: unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?, )*
            /// Releases strings the library `malloc`ed for the caller
            pub free: unsafe extern "C" fn(ptr: *mut c_void),
        }

        impl Api {
            /// Resolve every entry point from an opened shared object
            ///
            /// # Safety
            /// `handle` must come from a successful `dlopen` and must never be
            /// closed afterwards.
            unsafe fn resolve(handle: *mut c_void) -> Result<Self, String> {
                Ok(Self {
                    $( $name: {
                        let symbol = concat!(stringify!($name), "\0");
                        let ptr = unsafe { libc::dlsym(handle, symbol.as_ptr().cast()) };
                        if ptr.is_null() {
                            return Err(format!("symbol {} not found", stringify!($name)));
                        }
                        unsafe {
                            std::mem::transmute::<
                                *mut c_void,
                                unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?,
                            >(ptr)
                        }
                    }, )*
                    free: libc::free,
                })
            }
        }
    };
}

ddca_api! {
    // Build information
    fn ddca_ddcutil_version() -> DdcaDdcutilVersionSpec;
    fn ddca_ddcutil_version_string() -> *const c_char;
    fn ddca_build_options() -> u8;
    fn ddca_max_max_tries() -> c_int;

    // Status codes
    fn ddca_rc_name(status_code: DdcaStatus) -> *const c_char;
    fn ddca_rc_desc(status_code: DdcaStatus) -> *const c_char;

    // Global settings
    fn ddca_get_max_tries(retry_type: c_int) -> c_int;
    fn ddca_set_max_tries(retry_type: c_int, max_tries: c_int) -> DdcaStatus;
    fn ddca_enable_verify(onoff: bool);
    fn ddca_is_verify_enabled() -> bool;
    fn ddca_get_output_level() -> c_int;
    fn ddca_set_output_level(newval: c_int);
    fn ddca_output_level_name(val: c_int) -> *const c_char;
    fn ddca_enable_report_ddc_errors(onoff: bool);
    fn ddca_is_report_ddc_errors_enabled() -> bool;
    fn ddca_reset_stats();

    // Display descriptions
    fn ddca_get_display_info_list() -> *mut DdcaDisplayInfoList;
    fn ddca_free_display_info_list(dlist: *mut DdcaDisplayInfoList);

    // Display identifiers
    fn ddca_create_dispno_display_identifier(dispno: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_create_busno_display_identifier(busno: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_create_adlno_display_identifier(
        adapter_index: c_int,
        display_index: c_int,
        pdid: *mut DdcaDisplayIdentifier,
    ) -> DdcaStatus;
    fn ddca_create_mfg_model_sn_display_identifier(
        mfg_id: *const c_char,
        model: *const c_char,
        sn: *const c_char,
        pdid: *mut DdcaDisplayIdentifier,
    ) -> DdcaStatus;
    fn ddca_create_edid_display_identifier(edid: *const u8, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_create_usb_display_identifier(bus: c_int, device: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_create_usb_hiddev_display_identifier(hiddev_devno: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_free_display_identifier(did: DdcaDisplayIdentifier) -> DdcaStatus;
    fn ddca_did_repr(did: DdcaDisplayIdentifier) -> *const c_char;

    // Display references
    fn ddca_create_display_ref(did: DdcaDisplayIdentifier, pdref: *mut DdcaDisplayRef) -> DdcaStatus;
    fn ddca_free_display_ref(dref: DdcaDisplayRef) -> DdcaStatus;
    fn ddca_dref_repr(dref: DdcaDisplayRef) -> *const c_char;
    fn ddca_get_edid_by_display_ref(dref: DdcaDisplayRef, pbytes: *mut *mut u8) -> DdcaStatus;

    // Display handles
    fn ddca_open_display(dref: DdcaDisplayRef, pdh: *mut DdcaDisplayHandle) -> DdcaStatus;
    fn ddca_close_display(dh: DdcaDisplayHandle) -> DdcaStatus;
    fn ddca_dh_repr(dh: DdcaDisplayHandle) -> *const c_char;

    // MCCS version
    fn ddca_get_mccs_version(dh: DdcaDisplayHandle, pspec: *mut DdcaMccsVersionSpec) -> DdcaStatus;
    fn ddca_get_mccs_version_id(dh: DdcaDisplayHandle, p_id: *mut c_int) -> DdcaStatus;
    fn ddca_mccs_version_id_name(version_id: c_int) -> *const c_char;
    fn ddca_mccs_version_id_desc(version_id: c_int) -> *const c_char;

    // Capabilities
    fn ddca_get_capabilities_string(dh: DdcaDisplayHandle, pcaps: *mut *mut c_char) -> DdcaStatus;
    fn ddca_parse_capabilities_string(caps: *const c_char, pparsed: *mut *mut DdcaCapabilities) -> DdcaStatus;
    fn ddca_free_parsed_capabilities(parsed: *mut DdcaCapabilities);

    // Feature information
    fn ddca_get_feature_info_by_vcp_version(
        feature_code: DdcaVcpFeatureCode,
        version_id: c_int,
        pinfo: *mut *mut DdcaVersionFeatureInfo,
    ) -> DdcaStatus;
    fn ddca_get_feature_info_by_display(
        dh: DdcaDisplayHandle,
        feature_code: DdcaVcpFeatureCode,
        pinfo: *mut *mut DdcaVersionFeatureInfo,
    ) -> DdcaStatus;
    fn ddca_free_feature_info(info: *mut DdcaVersionFeatureInfo) -> DdcaStatus;
    fn ddca_get_feature_name(feature_code: DdcaVcpFeatureCode) -> *const c_char;
    fn ddca_get_simple_sl_value_table(
        feature_code: DdcaVcpFeatureCode,
        version_id: c_int,
        ptable: *mut *mut DdcaFeatureValueEntry,
    ) -> DdcaStatus;
    fn ddca_get_simple_nc_feature_value_name(
        dh: DdcaDisplayHandle,
        feature_code: DdcaVcpFeatureCode,
        feature_value: u8,
        pname: *mut *mut c_char,
    ) -> DdcaStatus;

    // VCP values
    fn ddca_get_any_vcp_value_using_explicit_type(
        dh: DdcaDisplayHandle,
        feature_code: DdcaVcpFeatureCode,
        call_type: c_int,
        pvalrec: *mut *mut DdcaAnyVcpValue,
    ) -> DdcaStatus;
    fn ddca_free_any_vcp_value(valrec: *mut DdcaAnyVcpValue);
    fn ddca_get_formatted_vcp_value(
        dh: DdcaDisplayHandle,
        feature_code: DdcaVcpFeatureCode,
        pformatted: *mut *mut c_char,
    ) -> DdcaStatus;
    fn ddca_set_non_table_vcp_value(
        dh: DdcaDisplayHandle,
        feature_code: DdcaVcpFeatureCode,
        hi_byte: u8,
        lo_byte: u8,
    ) -> DdcaStatus;
    fn ddca_get_profile_related_values(dh: DdcaDisplayHandle, pvalues: *mut *mut c_char) -> DdcaStatus;
    fn ddca_set_profile_related_values(values: *const c_char) -> DdcaStatus;
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

/// Shared object names tried in order. The bindings target the
/// `libddcutil.so.0` ABI; other sonames only load if every symbol resolves.
const LIBRARY_NAMES: &[&str] = &["libddcutil.so.0\0", "libddcutil.so\0"];

/// Open libddcutil and resolve the entry point table
///
/// The shared object is never closed, so the returned table stays valid for
/// the rest of the process.
pub fn load() -> Result<Api, String> {
    let mut last_error = String::from("no candidate library names");

    for name in LIBRARY_NAMES {
        let display_name = name.trim_end_matches('\0');
        // SAFETY: `name` is NUL terminated.
        let handle = unsafe { libc::dlopen(name.as_ptr().cast(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            last_error = dlerror_message().unwrap_or_else(|| format!("cannot open {display_name}"));
            debug!("dlopen({}) failed: {}", display_name, last_error);
            continue;
        }

        // SAFETY: `handle` was just returned by dlopen and is intentionally leaked.
        match unsafe { Api::resolve(handle) } {
            Ok(api) => {
                info!("Loaded {}", display_name);
                return Ok(api);
            }
            Err(e) => {
                debug!("{} is not usable: {}", display_name, e);
                last_error = format!("{display_name}: {e}");
            }
        }
    }

    Err(last_error)
}

fn dlerror_message() -> Option<String> {
    // SAFETY: dlerror returns either NULL or a NUL terminated thread-local string.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        None
    } else {
        Some(unsafe { std::ffi::CStr::from_ptr(msg) }.to_string_lossy().into_owned())
    }
}
