// SPDX-License-Identifier: GPL-3.0-only
//! Display identifiers

use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::error::{Error, Result};
use crate::ffi::{Api, DdcaDisplayIdentifier, DdcaStatus};
use crate::handle::{HandleKind, Owned};
use crate::library::Ddcutil;
use crate::status;
use crate::types::Edid;

use super::reference::DisplayRef;

/// How to find a monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Display number as assigned by ddcutil, starting at 1
    DisplayNumber(i32),
    /// I2C bus number, `/dev/i2c-N`
    BusNumber(i32),
    /// AMD Display Library adapter/display pair
    Adl { adapter: i32, display: i32 },
    /// Any combination of manufacturer id, model name and serial number
    MfgModelSn {
        mfg: Option<String>,
        model: Option<String>,
        serial: Option<String>,
    },
    /// First EDID block
    Edid(Edid),
    /// USB bus and device number
    Usb { bus: i32, device: i32 },
    /// USB HID device number, `/dev/usb/hiddevN`
    Hiddev(i32),
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::DisplayNumber(n) => write!(f, "display {n}"),
            Criterion::BusNumber(n) => write!(f, "bus /dev/i2c-{n}"),
            Criterion::Adl { adapter, display } => write!(f, "adl {adapter}.{display}"),
            Criterion::MfgModelSn { mfg, model, serial } => write!(
                f,
                "mfg={} model={} serial={}",
                mfg.as_deref().unwrap_or("*"),
                model.as_deref().unwrap_or("*"),
                serial.as_deref().unwrap_or("*")
            ),
            Criterion::Edid(edid) => write!(f, "{edid:?}"),
            Criterion::Usb { bus, device } => write!(f, "usb {bus}:{device}"),
            Criterion::Hiddev(n) => write!(f, "/dev/usb/hiddev{n}"),
        }
    }
}

fn optional_cstring(value: &Option<String>, field: &str) -> Result<Option<CString>> {
    value
        .as_deref()
        .map(|s| CString::new(s).map_err(|_| Error::InvalidArgument(format!("{field} contains a NUL byte"))))
        .transpose()
}

fn as_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

pub(crate) enum IdentifierKind {}

impl HandleKind for IdentifierKind {
    type Raw = DdcaDisplayIdentifier;
    const NAME: &'static str = "display identifier";
    const RELEASE_OP: &'static str = "ddca_free_display_identifier";

    unsafe fn release(api: &Api, raw: Self::Raw) -> DdcaStatus {
        unsafe { (api.ddca_free_display_identifier)(raw) }
    }

    unsafe fn repr(api: &Api, raw: Self::Raw) -> *const c_char {
        unsafe { (api.ddca_did_repr)(raw) }
    }
}

/// A criterion registered with the library, not yet resolved
#[derive(Debug)]
pub struct DisplayIdentifier {
    inner: Owned<IdentifierKind>,
}

impl DisplayIdentifier {
    /// Resolve to a monitor that is actually attached
    pub fn resolve(&self) -> Result<DisplayRef> {
        let did = self.inner.raw()?;
        let lib = self.inner.lib();
        let mut dref = ptr::null_mut();
        // SAFETY: `did` is live; `dref` is written on success.
        let rc = unsafe { (lib.api().ddca_create_display_ref)(did, &mut dref) };
        status::check_with(lib.api(), rc, "ddca_create_display_ref", || self.inner.repr())?;
        // SAFETY: the library handed ownership of `dref` to us.
        Ok(unsafe { DisplayRef::from_raw(lib.clone(), dref) })
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }

    /// Free the identifier; references resolved from it stay valid
    pub fn release(mut self) -> Result<()> {
        self.inner.release()
    }
}

impl fmt::Display for DisplayIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Ddcutil {
    /// Register `criterion` with the library
    pub fn create_identifier(&self, criterion: &Criterion) -> Result<DisplayIdentifier> {
        let api = self.api();
        let mut did: DdcaDisplayIdentifier = ptr::null_mut();

        // SAFETY: every pointer argument is either NULL or outlives its call,
        // and `did` is written on success.
        let (rc, operation): (DdcaStatus, &'static str) = unsafe {
            match criterion {
                Criterion::DisplayNumber(n) => (
                    (api.ddca_create_dispno_display_identifier)(*n as c_int, &mut did),
                    "ddca_create_dispno_display_identifier",
                ),
                Criterion::BusNumber(n) => (
                    (api.ddca_create_busno_display_identifier)(*n as c_int, &mut did),
                    "ddca_create_busno_display_identifier",
                ),
                Criterion::Adl { adapter, display } => (
                    (api.ddca_create_adlno_display_identifier)(*adapter, *display, &mut did),
                    "ddca_create_adlno_display_identifier",
                ),
                Criterion::MfgModelSn { mfg, model, serial } => {
                    let mfg = optional_cstring(mfg, "manufacturer id")?;
                    let model = optional_cstring(model, "model name")?;
                    let serial = optional_cstring(serial, "serial number")?;
                    (
                        (api.ddca_create_mfg_model_sn_display_identifier)(
                            as_ptr(&mfg),
                            as_ptr(&model),
                            as_ptr(&serial),
                            &mut did,
                        ),
                        "ddca_create_mfg_model_sn_display_identifier",
                    )
                }
                Criterion::Edid(edid) => (
                    (api.ddca_create_edid_display_identifier)(edid.as_bytes().as_ptr(), &mut did),
                    "ddca_create_edid_display_identifier",
                ),
                Criterion::Usb { bus, device } => (
                    (api.ddca_create_usb_display_identifier)(*bus, *device, &mut did),
                    "ddca_create_usb_display_identifier",
                ),
                Criterion::Hiddev(n) => (
                    (api.ddca_create_usb_hiddev_display_identifier)(*n, &mut did),
                    "ddca_create_usb_hiddev_display_identifier",
                ),
            }
        };

        status::check_with(api, rc, operation, || Some(criterion.to_string()))?;
        // SAFETY: the library handed ownership of `did` to us.
        Ok(DisplayIdentifier {
            inner: unsafe { Owned::from_raw(self.clone(), did) },
        })
    }
}
