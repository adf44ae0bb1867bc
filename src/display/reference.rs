// SPDX-License-Identifier: GPL-3.0-only
//! Display references
//!
//! A reference names one attached monitor. References come either from
//! resolving an identifier, in which case the caller owns them, or from
//! enumeration, in which case the library keeps them alive and the caller
//! only gets a [`DisplayRefToken`].

use std::fmt;
use std::os::raw::c_char;
use std::ptr;

use crate::error::{DecodeError, Result};
use crate::ffi::{Api, DdcaDisplayRef, DdcaStatus};
use crate::handle::{HandleKind, Owned};
use crate::library::Ddcutil;
use crate::marshal;
use crate::status;
use crate::types::Edid;

use super::handle::DisplayHandle;

mod private {
    use crate::error::Result;
    use crate::ffi::DdcaDisplayRef;
    use crate::library::Ddcutil;

    pub trait Sealed {
        fn ddcutil(&self) -> &Ddcutil;
        fn raw_ref(&self) -> Result<DdcaDisplayRef>;
    }
}

/// Anything that addresses a monitor and can be opened
pub trait AsDisplayRef: private::Sealed {
    /// Open a communication session with the monitor
    fn open(&self) -> Result<DisplayHandle> {
        DisplayHandle::open(self.ddcutil(), self.raw_ref()?)
    }

    /// Copy of the monitor's first EDID block
    fn edid(&self) -> Result<Edid> {
        let dref = self.raw_ref()?;
        let api = self.ddcutil().api();
        let mut bytes: *mut u8 = ptr::null_mut();
        // SAFETY: `dref` is live; the EDID buffer stays library owned.
        let rc = unsafe { (api.ddca_get_edid_by_display_ref)(dref, &mut bytes) };
        status::check(api, rc, "ddca_get_edid_by_display_ref")?;
        unsafe { marshal::edid(bytes) }.ok_or_else(|| DecodeError::NullPointer { field: "edid" }.into())
    }

    /// Library description of the reference
    fn repr(&self) -> Option<String> {
        let dref = self.raw_ref().ok()?;
        // SAFETY: repr strings are library owned.
        unsafe { marshal::lossy_string((self.ddcutil().api().ddca_dref_repr)(dref)) }
    }
}

pub(crate) enum ReferenceKind {}

impl HandleKind for ReferenceKind {
    type Raw = DdcaDisplayRef;
    const NAME: &'static str = "display reference";
    const RELEASE_OP: &'static str = "ddca_free_display_ref";

    unsafe fn release(api: &Api, raw: Self::Raw) -> DdcaStatus {
        unsafe { (api.ddca_free_display_ref)(raw) }
    }

    unsafe fn repr(api: &Api, raw: Self::Raw) -> *const c_char {
        unsafe { (api.ddca_dref_repr)(raw) }
    }
}

/// A reference owned by the caller
#[derive(Debug)]
pub struct DisplayRef {
    inner: Owned<ReferenceKind>,
}

impl DisplayRef {
    /// # Safety
    /// `raw` must be a live reference owned by nobody else.
    pub(crate) unsafe fn from_raw(lib: Ddcutil, raw: DdcaDisplayRef) -> Self {
        Self {
            inner: unsafe { Owned::from_raw(lib, raw) },
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }

    /// Free the reference; handles opened from it stay valid
    pub fn release(mut self) -> Result<()> {
        self.inner.release()
    }
}

impl private::Sealed for DisplayRef {
    fn ddcutil(&self) -> &Ddcutil {
        self.inner.lib()
    }

    fn raw_ref(&self) -> Result<DdcaDisplayRef> {
        self.inner.raw()
    }
}

impl AsDisplayRef for DisplayRef {}

impl fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Non-owning reference taken from an enumeration record
///
/// The library keeps enumerated references alive for the rest of the process,
/// so a token never needs releasing.
#[derive(Clone)]
pub struct DisplayRefToken {
    lib: Ddcutil,
    raw: DdcaDisplayRef,
}

impl DisplayRefToken {
    pub(crate) fn new(lib: Ddcutil, raw: DdcaDisplayRef) -> Self {
        Self { lib, raw }
    }
}

impl private::Sealed for DisplayRefToken {
    fn ddcutil(&self) -> &Ddcutil {
        &self.lib
    }

    fn raw_ref(&self) -> Result<DdcaDisplayRef> {
        Ok(self.raw)
    }
}

impl AsDisplayRef for DisplayRefToken {}

impl fmt::Debug for DisplayRefToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayRefToken({:p})", self.raw)
    }
}

impl PartialEq for DisplayRefToken {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for DisplayRefToken {}
