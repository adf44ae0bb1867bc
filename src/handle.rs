// SPDX-License-Identifier: GPL-3.0-only
//! Owned native tokens
//!
//! An [`Owned`] token wraps one pointer handed out by the library together with
//! a released flag. The release entry point for its kind is invoked at most
//! once: explicitly through [`Owned::release`], or from `Drop` when the owner
//! never released it. Raw pointers keep every wrapper `!Send`, which confines
//! each open session to the thread that created it.

use std::fmt;
use std::os::raw::c_char;

use crate::error::{Error, Result};
use crate::ffi::{Api, DdcaStatus};
use crate::library::Ddcutil;
use crate::marshal;
use crate::status;

/// A kind of native token and the entry point that releases it
pub trait HandleKind {
    /// Raw pointer type handed out by the library
    type Raw: Copy + fmt::Pointer;

    /// Name used in errors and log messages
    const NAME: &'static str;

    /// Entry point reported when releasing fails
    const RELEASE_OP: &'static str;

    /// Release `raw`, returning the library's status
    ///
    /// # Safety
    /// `raw` must be a live token of this kind that is never used again.
    unsafe fn release(api: &Api, raw: Self::Raw) -> DdcaStatus;

    /// Library supplied description of `raw`, if the kind has one
    ///
    /// # Safety
    /// `raw` must be a live token of this kind.
    unsafe fn repr(_api: &Api, _raw: Self::Raw) -> *const c_char {
        std::ptr::null()
    }
}

/// Exclusively owned native token
pub struct Owned<K: HandleKind> {
    lib: Ddcutil,
    raw: K::Raw,
    released: bool,
}

impl<K: HandleKind> Owned<K> {
    /// Take ownership of a token returned by the library
    ///
    /// # Safety
    /// `raw` must be live, of kind `K`, and owned by nobody else.
    pub(crate) unsafe fn from_raw(lib: Ddcutil, raw: K::Raw) -> Self {
        debug!("acquired {} {:p}", K::NAME, raw);
        Self {
            lib,
            raw,
            released: false,
        }
    }

    /// The raw token, refused once released
    pub(crate) fn raw(&self) -> Result<K::Raw> {
        if self.released {
            Err(Error::Released { kind: K::NAME })
        } else {
            Ok(self.raw)
        }
    }

    pub(crate) fn lib(&self) -> &Ddcutil {
        &self.lib
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the token
    ///
    /// The flag is set before the native call, so even a failed release is
    /// never attempted a second time. Releasing an already released token is
    /// a no-op.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            debug!("{} {:p} already released", K::NAME, self.raw);
            return Ok(());
        }
        self.released = true;

        let api = self.lib.api();
        // SAFETY: the flag above guarantees this is the only release of `raw`.
        let rc = unsafe { K::release(api, self.raw) };
        let raw = self.raw;
        status::check_with(api, rc, K::RELEASE_OP, || Some(format!("{} {:p}", K::NAME, raw)))?;
        debug!("released {} {:p}", K::NAME, self.raw);
        Ok(())
    }

    /// Library description of the token
    pub fn repr(&self) -> Option<String> {
        let raw = self.raw().ok()?;
        // SAFETY: `raw` is live; repr strings are library owned.
        unsafe { marshal::lossy_string(K::repr(self.lib.api(), raw)) }
    }
}

impl<K: HandleKind> fmt::Display for Owned<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Some(repr) => f.write_str(&repr),
            None if self.released => write!(f, "{} (released)", K::NAME),
            None => write!(f, "{} {:p}", K::NAME, self.raw),
        }
    }
}

impl<K: HandleKind> fmt::Debug for Owned<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME)
            .field("raw", &format_args!("{:p}", self.raw))
            .field("released", &self.released)
            .finish()
    }
}

impl<K: HandleKind> Drop for Owned<K> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            warn!("Failed to release {} on drop: {}", K::NAME, e);
        }
    }
}
