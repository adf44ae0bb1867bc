// SPDX-License-Identifier: GPL-3.0-only
//! Process-wide library context
//!
//! [`Ddcutil`] is a cheap, cloneable reference to one entry point table. The
//! table for the installed libddcutil is resolved at most once per process;
//! introspection constants are queried from the library on first use and
//! cached for the lifetime of the context.

use std::ffi::CString;
use std::os::raw::c_int;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::display::{AsDisplayRef, Criterion, DisplayHandle};
use crate::error::{Error, Result};
use crate::ffi::{self, Api};
use crate::marshal;
use crate::status;
use crate::types::{BuildOptions, MccsVersionId, OutputLevel, RetryType, Version};

/// Context over the process-wide libddcutil
static DEFAULT: OnceCell<Ddcutil> = OnceCell::new();

/// Build information reported by the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    pub version: Version,
    /// Full version string, absent when the library reports none
    pub version_string: Option<String>,
    pub build_options: BuildOptions,
    /// Upper bound accepted by [`Ddcutil::set_max_tries`]
    pub max_max_tries: i32,
}

struct Shared {
    api: Api,
    info: OnceCell<LibraryInfo>,
}

/// Handle to a loaded libddcutil
#[derive(Clone)]
pub struct Ddcutil {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Ddcutil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ddcutil")
            .field("info", &self.shared.info.get())
            .finish_non_exhaustive()
    }
}

impl Ddcutil {
    /// Context over the installed libddcutil, loaded on first call
    pub fn load() -> Result<Self> {
        DEFAULT
            .get_or_try_init(|| ffi::load().map(Self::with_api).map_err(Error::Load))
            .cloned()
    }

    /// Context over an arbitrary entry point table
    pub fn with_api(api: Api) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                info: OnceCell::new(),
            }),
        }
    }

    pub(crate) fn api(&self) -> &Api {
        &self.shared.api
    }

    /// Version and build information, queried once
    pub fn info(&self) -> Result<&LibraryInfo> {
        self.shared.info.get_or_try_init(|| {
            let api = self.api();
            // SAFETY: introspection calls take no arguments; the version string
            // is static.
            let info = unsafe {
                LibraryInfo {
                    version: (api.ddca_ddcutil_version)().into(),
                    version_string: marshal::string((api.ddca_ddcutil_version_string)(), "version string")?,
                    build_options: BuildOptions::from_bits_retain((api.ddca_build_options)()),
                    max_max_tries: (api.ddca_max_max_tries)(),
                }
            };
            debug!("libddcutil {} ({:?})", info.version, info.build_options);
            Ok(info)
        })
    }

    /// Symbolic name of a status code, as the library spells it
    pub fn status_name(&self, code: c_int) -> Option<String> {
        status::name(self.api(), code)
    }

    /// Description of a status code, as the library words it
    pub fn status_description(&self, code: c_int) -> Option<String> {
        status::description(self.api(), code)
    }

    pub fn max_tries(&self, retry_type: RetryType) -> i32 {
        // SAFETY: plain value call.
        unsafe { (self.api().ddca_get_max_tries)(retry_type.as_raw()) }
    }

    /// Set the try limit for one category of DDC exchange
    pub fn set_max_tries(&self, retry_type: RetryType, max_tries: i32) -> Result<()> {
        // SAFETY: plain value call.
        let rc = unsafe { (self.api().ddca_set_max_tries)(retry_type.as_raw(), max_tries) };
        status::check_with(self.api(), rc, "ddca_set_max_tries", || {
            Some(format!("{retry_type:?}, max_tries={max_tries}"))
        })
    }

    /// Read back every write and compare
    pub fn enable_verify(&self, onoff: bool) {
        unsafe { (self.api().ddca_enable_verify)(onoff) }
    }

    pub fn is_verify_enabled(&self) -> bool {
        unsafe { (self.api().ddca_is_verify_enabled)() }
    }

    pub fn output_level(&self) -> Result<OutputLevel> {
        let raw = unsafe { (self.api().ddca_get_output_level)() };
        Ok(OutputLevel::from_raw(raw)?)
    }

    pub fn set_output_level(&self, level: OutputLevel) {
        unsafe { (self.api().ddca_set_output_level)(level.as_raw()) }
    }

    pub fn output_level_name(&self, level: OutputLevel) -> Option<String> {
        // SAFETY: level names are static strings.
        unsafe { marshal::lossy_string((self.api().ddca_output_level_name)(level.as_raw())) }
    }

    /// Have the library report DDC protocol errors on its own output
    pub fn enable_report_ddc_errors(&self, onoff: bool) {
        unsafe { (self.api().ddca_enable_report_ddc_errors)(onoff) }
    }

    pub fn is_report_ddc_errors_enabled(&self) -> bool {
        unsafe { (self.api().ddca_is_report_ddc_errors_enabled)() }
    }

    pub fn reset_stats(&self) {
        unsafe { (self.api().ddca_reset_stats)() }
    }

    /// Symbolic name of an MCCS version id
    pub fn mccs_version_name(&self, id: MccsVersionId) -> Option<String> {
        unsafe { marshal::lossy_string((self.api().ddca_mccs_version_id_name)(id.as_raw())) }
    }

    /// Printable form of an MCCS version id
    pub fn mccs_version_description(&self, id: MccsVersionId) -> Option<String> {
        unsafe { marshal::lossy_string((self.api().ddca_mccs_version_id_desc)(id.as_raw())) }
    }

    /// Restore settings saved with [`DisplayHandle::profile_related_values`]
    pub fn set_profile_related_values(&self, values: &str) -> Result<()> {
        let cvalues = CString::new(values)
            .map_err(|_| Error::InvalidArgument("profile values contain a NUL byte".to_string()))?;
        // SAFETY: the string outlives the call and is only read.
        let rc = unsafe { (self.api().ddca_set_profile_related_values)(cvalues.as_ptr()) };
        status::check(self.api(), rc, "ddca_set_profile_related_values")
    }

    /// Create an identifier, resolve it, open the display and run `f`
    ///
    /// The handle, reference and identifier are released in that order on
    /// every path. An error from `f` wins over release failures, which are
    /// then only logged; otherwise the first release failure is returned.
    pub fn with_display<T, F>(&self, criterion: &Criterion, f: F) -> Result<T>
    where
        F: FnOnce(&mut DisplayHandle) -> Result<T>,
    {
        let did = self.create_identifier(criterion)?;
        let outcome = did.resolve().and_then(|dref| {
            let outcome = dref.open().and_then(|mut dh| {
                let outcome = f(&mut dh);
                settle(outcome, dh.close())
            });
            settle(outcome, dref.release())
        });
        settle(outcome, did.release())
    }
}

/// Combine an operation's outcome with the release that followed it
fn settle<T>(outcome: Result<T>, released: Result<()>) -> Result<T> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            warn!("Release after failed operation also failed: {}", release_err);
            Err(e)
        }
    }
}
