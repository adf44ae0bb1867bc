// SPDX-License-Identifier: GPL-3.0-only
//! Display enumeration

use crate::error::{DecodeError, Result};
use crate::ffi::{self, DdcaDisplayInfo, DdcaDisplayInfoList};
use crate::library::Ddcutil;
use crate::marshal;
use crate::types::{Edid, IoPath};

use super::reference::DisplayRefToken;

/// One detected monitor, copied out of the library's list
#[derive(Debug, Clone)]
pub struct DisplayInfo {
    /// ddcutil display number, -1 when the monitor does not support DDC
    pub dispno: i32,
    pub path: IoPath,
    pub usb_bus: i32,
    pub usb_device: i32,
    pub mfg_id: Option<String>,
    pub model_name: Option<String>,
    pub serial: Option<String>,
    pub edid: Option<Edid>,
    pub dref: DisplayRefToken,
}

impl Ddcutil {
    /// Detected monitors, in the library's order
    pub fn displays(&self) -> Result<Vec<DisplayInfo>> {
        let api = self.api();
        // SAFETY: plain call; the list is freed below on every path.
        let list = unsafe { (api.ddca_get_display_info_list)() };
        if list.is_null() {
            return Err(DecodeError::NullPointer {
                field: "display info list",
            }
            .into());
        }

        let displays = unsafe { self.copy_display_list(list) };
        unsafe { (api.ddca_free_display_info_list)(list) };

        let displays = displays?;
        debug!("{} display(s) detected", displays.len());
        Ok(displays)
    }

    /// # Safety
    /// `list` must point to a live list whose `ct` records follow its header.
    unsafe fn copy_display_list(&self, list: *const DdcaDisplayInfoList) -> Result<Vec<DisplayInfo>> {
        let ct = unsafe { (*list).ct };
        if ct < 0 {
            return Err(DecodeError::BadLength {
                field: "display info list",
                len: ct as i64,
            }
            .into());
        }

        let first = unsafe { (&raw const (*list).info).cast::<DdcaDisplayInfo>() };
        (0..ct as usize)
            .map(|ndx| unsafe { self.copy_display_info(&*first.add(ndx)) })
            .collect()
    }

    /// # Safety
    /// String and EDID members of `raw` must be NULL or valid.
    unsafe fn copy_display_info(&self, raw: &DdcaDisplayInfo) -> Result<DisplayInfo> {
        marshal::check_marker(&raw.marker, ffi::DISPLAY_INFO_MARKER, "DDCA_Display_Info")?;
        Ok(DisplayInfo {
            dispno: raw.dispno,
            path: marshal::io_path(&raw.path)?,
            usb_bus: raw.usb_bus,
            usb_device: raw.usb_device,
            mfg_id: unsafe { marshal::string(raw.mfg_id, "mfg_id") }?,
            model_name: unsafe { marshal::string(raw.model_name, "model_name") }?,
            serial: unsafe { marshal::string(raw.sn, "sn") }?,
            edid: unsafe { marshal::edid(raw.edid_bytes) },
            dref: DisplayRefToken::new(self.clone(), raw.dref),
        })
    }
}
