// SPDX-License-Identifier: GPL-3.0-only
//! In-process stand-in for libddcutil
//!
//! Every entry point of [`Api`] is implemented by a Rust `extern "C"` function
//! working on thread-local state, so each test thread sees its own library.
//! Opaque handles are plain integer tokens; records handed out are tracked
//! until freed so tests can check for leaks and double frees.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use crate::ffi::*;
use crate::status::codes;
use crate::types::{FeatureFlags, NonTableValue};

thread_local! {
    static STATE: RefCell<FakeLib> = RefCell::new(FakeLib::default());
}

fn with_state<R>(f: impl FnOnce(&mut FakeLib) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Value stored for one feature of a fake monitor
#[derive(Debug, Clone)]
pub enum FakeValue {
    NonTable(NonTableValue),
    Table(Vec<u8>),
}

/// A monitor attached to the fake library
#[derive(Debug)]
pub struct FakeDisplay {
    pub dispno: c_int,
    pub busno: c_int,
    mfg: Option<CString>,
    model: Option<CString>,
    sn: Option<CString>,
    pub edid: [u8; EDID_SIZE],
    caps: CString,
    pub mccs: (u8, u8),
    pub values: BTreeMap<u8, FakeValue>,
    dref: usize,
}

impl FakeDisplay {
    pub fn new(dispno: c_int, busno: c_int) -> Self {
        let mut edid = [0u8; EDID_SIZE];
        edid[..8].copy_from_slice(&[0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00]);
        edid[8] = 0x1e;
        edid[9] = 0x6d;
        edid[12] = dispno as u8;
        edid[127] = busno as u8;

        let values = BTreeMap::from([
            (0x10, FakeValue::NonTable(NonTableValue::continuous(100, 50))),
            (0x12, FakeValue::NonTable(NonTableValue::continuous(100, 70))),
            (0x60, FakeValue::NonTable(NonTableValue { sl: 0x0f, ..Default::default() })),
            (0x73, FakeValue::Table(vec![0x01, 0x02, 0x03])),
            (0xd6, FakeValue::NonTable(NonTableValue { sl: 0x01, ..Default::default() })),
        ]);

        Self {
            dispno,
            busno,
            mfg: Some(c"GSM".to_owned()),
            model: Some(c"LG ULTRAWIDE".to_owned()),
            sn: Some(CString::new(format!("SN{dispno:04}")).expect("no NUL")),
            edid,
            caps: c"(prot(monitor)type(lcd)model(LG)cmds(01 02 03 0C)vcp(10 12 60(01 0F 11) D6(01 04))mccs_ver(2.1))"
                .to_owned(),
            mccs: (2, 1),
            values,
            dref: 0,
        }
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(CString::new(model).expect("no NUL"));
        self
    }

    pub fn without_serial(mut self) -> Self {
        self.sn = None;
        self
    }

    pub fn capabilities(mut self, caps: &str) -> Self {
        self.caps = CString::new(caps).expect("no NUL");
        self
    }

    pub fn value(mut self, code: u8, value: FakeValue) -> Self {
        self.values.insert(code, value);
        self
    }

    fn info_record(&self) -> DdcaDisplayInfo {
        DdcaDisplayInfo {
            marker: DISPLAY_INFO_MARKER.map(|b| b as c_char),
            dispno: self.dispno,
            path: DdcaIoPath {
                io_mode: DDCA_IO_I2C,
                path: DdcaIoPathUnion { i2c_busno: self.busno },
            },
            usb_bus: -1,
            usb_device: -1,
            mfg_id: opt_ptr(&self.mfg),
            model_name: opt_ptr(&self.model),
            sn: opt_ptr(&self.sn),
            edid_bytes: self.edid.as_ptr(),
            dref: self.dref as DdcaDisplayRef,
        }
    }
}

fn opt_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

#[derive(Debug)]
enum Selector {
    Dispno(c_int),
    Busno(c_int),
    MfgModelSn(Option<String>, Option<String>, Option<String>),
    Edid([u8; EDID_SIZE]),
    Unresolvable,
}

#[derive(Debug)]
enum Object {
    Identifier { selector: Selector, repr: CString },
    Ref { display: usize, persistent: bool, repr: CString },
    Handle { display: usize, repr: CString },
}

impl Object {
    fn repr(&self) -> *const c_char {
        match self {
            Object::Identifier { repr, .. } | Object::Ref { repr, .. } | Object::Handle { repr, .. } => repr.as_ptr(),
        }
    }
}

struct FeatureDef {
    code: u8,
    name: &'static CStr,
    desc: &'static CStr,
    flags: u16,
    values: &'static [(u8, &'static CStr)],
}

const BRIGHTNESS_FLAGS: u16 = FeatureFlags::RW.bits() | FeatureFlags::STD_CONT.bits();
const NC_FLAGS: u16 = FeatureFlags::RW.bits() | FeatureFlags::SIMPLE_NC.bits();

const FEATURES: &[FeatureDef] = &[
    FeatureDef {
        code: 0x10,
        name: c"Brightness",
        desc: c"Increase/decrease brightness",
        flags: BRIGHTNESS_FLAGS,
        values: &[],
    },
    FeatureDef {
        code: 0x12,
        name: c"Contrast",
        desc: c"Increase/decrease contrast",
        flags: BRIGHTNESS_FLAGS,
        values: &[],
    },
    FeatureDef {
        code: 0x60,
        name: c"Input Source",
        desc: c"Selects active video source",
        flags: NC_FLAGS,
        values: &[
            (0x01, c"VGA-1"),
            (0x03, c"DVI-1"),
            (0x0f, c"DisplayPort-1"),
            (0x11, c"HDMI-1"),
        ],
    },
    FeatureDef {
        code: 0x73,
        name: c"LUT Size",
        desc: c"Provides the size of the Lookup Table",
        flags: FeatureFlags::RO.bits() | FeatureFlags::NORMAL_TABLE.bits(),
        values: &[],
    },
    FeatureDef {
        code: 0xd6,
        name: c"Power mode",
        desc: c"DPM and DPMS status",
        flags: NC_FLAGS,
        values: &[(0x01, c"DPM: On,  DPMS: Off"), (0x04, c"DPM: Off, DPMS: Off")],
    },
];

fn feature_def(code: u8) -> Option<&'static FeatureDef> {
    FEATURES.iter().find(|f| f.code == code)
}

fn version_id_spec(id: c_int) -> Option<DdcaMccsVersionSpec> {
    let (major, minor) = match id {
        0 => (0, 0),
        1 => (1, 0),
        2 => (2, 0),
        4 => (2, 1),
        8 => (3, 0),
        16 => (2, 2),
        _ => return None,
    };
    Some(DdcaMccsVersionSpec { major, minor })
}

fn spec_version_id(spec: DdcaMccsVersionSpec) -> c_int {
    match (spec.major, spec.minor) {
        (1, 0) => 1,
        (2, 0) => 2,
        (2, 1) => 4,
        (3, 0) => 8,
        (2, 2) => 16,
        _ => 0,
    }
}

struct ParsedRecord {
    record: Box<DdcaCapabilities>,
    _entries: Vec<DdcaCapVcp>,
    _values: Vec<Vec<u8>>,
    _unparsed: CString,
}

struct ValueRecord {
    record: Box<DdcaAnyVcpValue>,
    _bytes: Vec<u8>,
}

/// State of the fake library for the current thread
pub struct FakeLib {
    rc_text: HashMap<c_int, (CString, CString)>,
    displays: Vec<Box<FakeDisplay>>,
    objects: HashMap<usize, Object>,
    next_token: usize,
    failures: HashMap<&'static str, c_int>,
    calls: HashMap<&'static str, usize>,
    writes: Vec<(u8, u8, u8)>,
    bad_frees: usize,
    max_tries: [c_int; 3],
    verify: bool,
    output_level: c_int,
    report_ddc_errors: bool,
    profile: Option<String>,
    lists: HashSet<usize>,
    feature_infos: HashMap<usize, Box<DdcaVersionFeatureInfo>>,
    values: HashMap<usize, ValueRecord>,
    parsed: HashMap<usize, ParsedRecord>,
    sl_tables: HashMap<u8, Vec<DdcaFeatureValueEntry>>,
    strings: HashSet<usize>,
    /// Count written into the next display list instead of the real one
    pub list_count_override: Option<c_int>,
    /// Discriminant written into the next VCP value record
    pub value_type_override: Option<c_int>,
    /// Markers to write in place of the expected ones, keyed by the expected marker
    marker_overrides: HashMap<[u8; 4], [u8; 4]>,
}

impl Default for FakeLib {
    fn default() -> Self {
        let rc_text = [
            (codes::NULL_RESPONSE, c"DDCRC_NULL_RESPONSE", c"received DDC null response"),
            (codes::REPORTED_UNSUPPORTED, c"DDCRC_REPORTED_UNSUPPORTED", c"DDC reports facility unsupported"),
            (codes::ARG, c"DDCRC_ARG", c"illegal argument"),
            (codes::INVALID_OPERATION, c"DDCRC_INVALID_OPERATION", c"invalid operation"),
            (codes::UNKNOWN_FEATURE, c"DDCRC_UNKNOWN_FEATURE", c"unknown feature"),
            (codes::INVALID_DISPLAY, c"DDCRC_INVALID_DISPLAY", c"invalid display"),
            (codes::NOT_FOUND, c"DDCRC_NOT_FOUND", c"not found"),
        ]
        .into_iter()
        .map(|(code, name, desc)| (code, (name.to_owned(), desc.to_owned())))
        .collect();

        Self {
            rc_text,
            displays: Vec::new(),
            objects: HashMap::new(),
            next_token: 0x1000,
            failures: HashMap::new(),
            calls: HashMap::new(),
            writes: Vec::new(),
            bad_frees: 0,
            max_tries: [4, 10, 8],
            verify: true,
            output_level: 0x08,
            report_ddc_errors: false,
            profile: None,
            lists: HashSet::new(),
            feature_infos: HashMap::new(),
            values: HashMap::new(),
            parsed: HashMap::new(),
            sl_tables: HashMap::new(),
            strings: HashSet::new(),
            list_count_override: None,
            value_type_override: None,
            marker_overrides: HashMap::new(),
        }
    }
}

impl FakeLib {
    /// Run `f` against this thread's fake library
    pub fn with<R>(f: impl FnOnce(&mut FakeLib) -> R) -> R {
        with_state(f)
    }

    pub fn set_rc_text(&mut self, code: c_int, name: &str, desc: &str) {
        let name = CString::new(name).expect("no NUL");
        let desc = CString::new(desc).expect("no NUL");
        self.rc_text.insert(code, (name, desc));
    }

    /// Attach a monitor, returning its index
    pub fn add_display(&mut self, mut display: FakeDisplay) -> usize {
        let ndx = self.displays.len();
        let repr = CString::new(format!("Display_Ref[i2c-{}]", display.busno)).expect("no NUL");
        display.dref = self.insert(Object::Ref {
            display: ndx,
            persistent: true,
            repr,
        });
        self.displays.push(Box::new(display));
        ndx
    }

    pub fn display(&self, ndx: usize) -> &FakeDisplay {
        &self.displays[ndx]
    }

    /// Make every later call of `operation` return `code`
    pub fn fail(&mut self, operation: &'static str, code: c_int) {
        self.failures.insert(operation, code);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.get(operation).copied().unwrap_or(0)
    }

    /// `(feature code, high byte, low byte)` of every accepted write
    pub fn writes(&self) -> &[(u8, u8, u8)] {
        &self.writes
    }

    /// Frees of pointers the library never handed out or already freed
    pub fn bad_frees(&self) -> usize {
        self.bad_frees
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn live_identifiers(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, Object::Identifier { .. }))
            .count()
    }

    pub fn live_refs(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, Object::Ref { persistent: false, .. }))
            .count()
    }

    pub fn live_handles(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, Object::Handle { .. }))
            .count()
    }

    /// Records handed out that still have to be freed through the library
    pub fn outstanding_records(&self) -> usize {
        self.lists.len() + self.feature_infos.len() + self.values.len() + self.parsed.len() + self.strings.len()
    }

    /// Write `bytes` for every later record that should carry `marker`
    pub fn corrupt_marker(&mut self, marker: [u8; 4], bytes: &[u8; 4]) {
        self.marker_overrides.insert(marker, *bytes);
    }

    fn marker(&self, marker: [u8; 4]) -> [c_char; 4] {
        self.marker_overrides
            .get(&marker)
            .copied()
            .unwrap_or(marker)
            .map(|b| b as c_char)
    }

    /// Copy `bytes` into `malloc`ed memory the caller releases through `free`
    fn malloc_string(&mut self, bytes: &[u8]) -> *mut c_char {
        let len = bytes.len();
        let buf = unsafe { libc::malloc(len + 1) } as *mut c_char;
        if !buf.is_null() {
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, len);
                *buf.add(len) = 0;
            }
            self.strings.insert(buf as usize);
        }
        buf
    }

    /// Count the call and return the injected failure, if any
    fn enter(&mut self, operation: &'static str) -> Option<c_int> {
        *self.calls.entry(operation).or_default() += 1;
        self.failures.get(operation).copied()
    }

    fn insert(&mut self, object: Object) -> usize {
        let token = self.next_token;
        self.next_token += 0x10;
        self.objects.insert(token, object);
        token
    }

    fn handle_display(&self, dh: DdcaDisplayHandle) -> Option<usize> {
        match self.objects.get(&(dh as usize)) {
            Some(Object::Handle { display, .. }) => Some(*display),
            _ => None,
        }
    }

    fn resolve(&self, selector: &Selector) -> Option<usize> {
        let matches = |d: &FakeDisplay| match selector {
            Selector::Dispno(n) => d.dispno == *n,
            Selector::Busno(n) => d.busno == *n,
            Selector::Edid(edid) => d.edid == *edid,
            Selector::MfgModelSn(mfg, model, sn) => {
                let field = |want: &Option<String>, have: &Option<CString>| match want {
                    None => true,
                    Some(want) => have.as_ref().and_then(|h| h.to_str().ok()) == Some(want.as_str()),
                };
                field(mfg, &d.mfg) && field(model, &d.model) && field(sn, &d.sn)
            }
            Selector::Unresolvable => false,
        };
        self.displays.iter().position(|d| matches(&**d))
    }

    fn sl_table(&mut self, def: &'static FeatureDef) -> *mut DdcaFeatureValueEntry {
        self.sl_tables
            .entry(def.code)
            .or_insert_with(|| {
                def.values
                    .iter()
                    .map(|(code, name)| DdcaFeatureValueEntry {
                        value_code: *code,
                        value_name: name.as_ptr() as *mut c_char,
                    })
                    .chain(std::iter::once(DdcaFeatureValueEntry {
                        value_code: 0,
                        value_name: ptr::null_mut(),
                    }))
                    .collect()
            })
            .as_mut_ptr()
    }

    fn feature_info(&mut self, code: u8, version_id: c_int, out: *mut *mut DdcaVersionFeatureInfo) -> DdcaStatus {
        let Some(def) = feature_def(code) else {
            return codes::UNKNOWN_FEATURE;
        };
        let Some(vspec) = version_id_spec(version_id) else {
            return codes::ARG;
        };
        let sl_values = if def.values.is_empty() {
            ptr::null_mut()
        } else {
            self.sl_table(def)
        };
        let mut record = Box::new(DdcaVersionFeatureInfo {
            marker: FEATURE_INFO_MARKER.map(|b| b as c_char),
            feature_code: code,
            vspec,
            version_id,
            desc: def.desc.as_ptr() as *mut c_char,
            sl_values,
            feature_name: def.name.as_ptr() as *mut c_char,
            feature_flags: def.flags,
        });
        let raw: *mut DdcaVersionFeatureInfo = &mut *record;
        self.feature_infos.insert(raw as usize, record);
        unsafe { *out = raw };
        codes::OK
    }
}

unsafe extern "C" fn free(p: *mut c_void) {
    with_state(|lib| {
        lib.enter("free");
        if lib.strings.remove(&(p as usize)) {
            unsafe { libc::free(p) };
        } else if !p.is_null() {
            lib.bad_frees += 1;
        }
    })
}

unsafe extern "C" fn ddca_ddcutil_version() -> DdcaDdcutilVersionSpec {
    with_state(|lib| lib.enter("ddca_ddcutil_version"));
    DdcaDdcutilVersionSpec {
        major: 0,
        minor: 9,
        micro: 9,
    }
}

unsafe extern "C" fn ddca_ddcutil_version_string() -> *const c_char {
    with_state(|lib| lib.enter("ddca_ddcutil_version_string"));
    c"0.9.9-fake".as_ptr()
}

unsafe extern "C" fn ddca_build_options() -> u8 {
    with_state(|lib| lib.enter("ddca_build_options"));
    0x02
}

unsafe extern "C" fn ddca_max_max_tries() -> c_int {
    with_state(|lib| lib.enter("ddca_max_max_tries"));
    15
}

unsafe extern "C" fn ddca_rc_name(status_code: DdcaStatus) -> *const c_char {
    with_state(|lib| lib.rc_text.get(&status_code).map_or(ptr::null(), |(name, _)| name.as_ptr()))
}

unsafe extern "C" fn ddca_rc_desc(status_code: DdcaStatus) -> *const c_char {
    with_state(|lib| lib.rc_text.get(&status_code).map_or(ptr::null(), |(_, desc)| desc.as_ptr()))
}

unsafe extern "C" fn ddca_get_max_tries(retry_type: c_int) -> c_int {
    with_state(|lib| {
        lib.enter("ddca_get_max_tries");
        usize::try_from(retry_type)
            .ok()
            .and_then(|ndx| lib.max_tries.get(ndx).copied())
            .unwrap_or(0)
    })
}

unsafe extern "C" fn ddca_set_max_tries(retry_type: c_int, max_tries: c_int) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_set_max_tries") {
            return rc;
        }
        let Some(slot) = usize::try_from(retry_type).ok().and_then(|ndx| lib.max_tries.get_mut(ndx)) else {
            return codes::ARG;
        };
        if !(1..=15).contains(&max_tries) {
            return codes::ARG;
        }
        *slot = max_tries;
        codes::OK
    })
}

unsafe extern "C" fn ddca_enable_verify(onoff: bool) {
    with_state(|lib| {
        lib.enter("ddca_enable_verify");
        lib.verify = onoff;
    })
}

unsafe extern "C" fn ddca_is_verify_enabled() -> bool {
    with_state(|lib| lib.verify)
}

unsafe extern "C" fn ddca_get_output_level() -> c_int {
    with_state(|lib| lib.output_level)
}

unsafe extern "C" fn ddca_set_output_level(newval: c_int) {
    with_state(|lib| {
        lib.enter("ddca_set_output_level");
        lib.output_level = newval;
    })
}

unsafe extern "C" fn ddca_output_level_name(val: c_int) -> *const c_char {
    match val {
        0x04 => c"Terse".as_ptr(),
        0x08 => c"Normal".as_ptr(),
        0x10 => c"Verbose".as_ptr(),
        _ => ptr::null(),
    }
}

unsafe extern "C" fn ddca_enable_report_ddc_errors(onoff: bool) {
    with_state(|lib| {
        lib.enter("ddca_enable_report_ddc_errors");
        lib.report_ddc_errors = onoff;
    })
}

unsafe extern "C" fn ddca_is_report_ddc_errors_enabled() -> bool {
    with_state(|lib| lib.report_ddc_errors)
}

unsafe extern "C" fn ddca_reset_stats() {
    with_state(|lib| {
        lib.enter("ddca_reset_stats");
    })
}

unsafe extern "C" fn ddca_get_display_info_list() -> *mut DdcaDisplayInfoList {
    with_state(|lib| {
        if lib.enter("ddca_get_display_info_list").is_some() {
            return ptr::null_mut();
        }
        let ct = lib.displays.len();
        let size = mem::size_of::<DdcaDisplayInfoList>() + ct * mem::size_of::<DdcaDisplayInfo>();
        let list = unsafe { libc::calloc(1, size) } as *mut DdcaDisplayInfoList;
        if list.is_null() {
            return list;
        }
        unsafe {
            (*list).ct = lib.list_count_override.take().unwrap_or(ct as c_int);
            let info = (&raw mut (*list).info).cast::<DdcaDisplayInfo>();
            for (ndx, display) in lib.displays.iter().enumerate() {
                let mut record = display.info_record();
                record.marker = lib.marker(DISPLAY_INFO_MARKER);
                info.add(ndx).write(record);
            }
        }
        lib.lists.insert(list as usize);
        list
    })
}

unsafe extern "C" fn ddca_free_display_info_list(dlist: *mut DdcaDisplayInfoList) {
    with_state(|lib| {
        lib.enter("ddca_free_display_info_list");
        if lib.lists.remove(&(dlist as usize)) {
            unsafe { libc::free(dlist.cast()) };
        } else if !dlist.is_null() {
            lib.bad_frees += 1;
        }
    })
}

fn create_identifier(operation: &'static str, selector: Selector, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter(operation) {
            return rc;
        }
        if pdid.is_null() {
            return codes::ARG;
        }
        let repr = CString::new(format!("Display_Identifier[{selector:?}]")).unwrap_or_default();
        let token = lib.insert(Object::Identifier { selector, repr });
        unsafe { *pdid = token as DdcaDisplayIdentifier };
        codes::OK
    })
}

unsafe extern "C" fn ddca_create_dispno_display_identifier(dispno: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus {
    if dispno < 1 {
        return codes::ARG;
    }
    create_identifier("ddca_create_dispno_display_identifier", Selector::Dispno(dispno), pdid)
}

unsafe extern "C" fn ddca_create_busno_display_identifier(busno: c_int, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus {
    create_identifier("ddca_create_busno_display_identifier", Selector::Busno(busno), pdid)
}

unsafe extern "C" fn ddca_create_adlno_display_identifier(
    _adapter_index: c_int,
    _display_index: c_int,
    pdid: *mut DdcaDisplayIdentifier,
) -> DdcaStatus {
    create_identifier("ddca_create_adlno_display_identifier", Selector::Unresolvable, pdid)
}

unsafe extern "C" fn ddca_create_mfg_model_sn_display_identifier(
    mfg_id: *const c_char,
    model: *const c_char,
    sn: *const c_char,
    pdid: *mut DdcaDisplayIdentifier,
) -> DdcaStatus {
    let field = |p: *const c_char| (!p.is_null()).then(|| unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned());
    let selector = Selector::MfgModelSn(field(mfg_id), field(model), field(sn));
    if matches!(selector, Selector::MfgModelSn(None, None, None)) {
        return codes::ARG;
    }
    create_identifier("ddca_create_mfg_model_sn_display_identifier", selector, pdid)
}

unsafe extern "C" fn ddca_create_edid_display_identifier(edid: *const u8, pdid: *mut DdcaDisplayIdentifier) -> DdcaStatus {
    if edid.is_null() {
        return codes::ARG;
    }
    let mut bytes = [0u8; EDID_SIZE];
    bytes.copy_from_slice(unsafe { std::slice::from_raw_parts(edid, EDID_SIZE) });
    create_identifier("ddca_create_edid_display_identifier", Selector::Edid(bytes), pdid)
}

unsafe extern "C" fn ddca_create_usb_display_identifier(
    _bus: c_int,
    _device: c_int,
    pdid: *mut DdcaDisplayIdentifier,
) -> DdcaStatus {
    create_identifier("ddca_create_usb_display_identifier", Selector::Unresolvable, pdid)
}

unsafe extern "C" fn ddca_create_usb_hiddev_display_identifier(
    _hiddev_devno: c_int,
    pdid: *mut DdcaDisplayIdentifier,
) -> DdcaStatus {
    create_identifier("ddca_create_usb_hiddev_display_identifier", Selector::Unresolvable, pdid)
}

unsafe extern "C" fn ddca_free_display_identifier(did: DdcaDisplayIdentifier) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_free_display_identifier") {
            return rc;
        }
        match lib.objects.get(&(did as usize)) {
            Some(Object::Identifier { .. }) => {
                lib.objects.remove(&(did as usize));
                codes::OK
            }
            _ => {
                lib.bad_frees += 1;
                codes::ARG
            }
        }
    })
}

unsafe extern "C" fn ddca_did_repr(did: DdcaDisplayIdentifier) -> *const c_char {
    with_state(|lib| match lib.objects.get(&(did as usize)) {
        Some(object @ Object::Identifier { .. }) => object.repr(),
        _ => ptr::null(),
    })
}

unsafe extern "C" fn ddca_create_display_ref(did: DdcaDisplayIdentifier, pdref: *mut DdcaDisplayRef) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_create_display_ref") {
            return rc;
        }
        let Some(Object::Identifier { selector, .. }) = lib.objects.get(&(did as usize)) else {
            return codes::ARG;
        };
        let Some(display) = lib.resolve(selector) else {
            return codes::INVALID_DISPLAY;
        };
        let repr = CString::new(format!("Display_Ref[i2c-{}]", lib.displays[display].busno)).unwrap_or_default();
        let token = lib.insert(Object::Ref {
            display,
            persistent: false,
            repr,
        });
        unsafe { *pdref = token as DdcaDisplayRef };
        codes::OK
    })
}

unsafe extern "C" fn ddca_free_display_ref(dref: DdcaDisplayRef) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_free_display_ref") {
            return rc;
        }
        match lib.objects.get(&(dref as usize)) {
            Some(Object::Ref { persistent: true, .. }) => codes::OK,
            Some(Object::Ref { .. }) => {
                lib.objects.remove(&(dref as usize));
                codes::OK
            }
            _ => {
                lib.bad_frees += 1;
                codes::ARG
            }
        }
    })
}

unsafe extern "C" fn ddca_dref_repr(dref: DdcaDisplayRef) -> *const c_char {
    with_state(|lib| match lib.objects.get(&(dref as usize)) {
        Some(object @ Object::Ref { .. }) => object.repr(),
        _ => ptr::null(),
    })
}

unsafe extern "C" fn ddca_get_edid_by_display_ref(dref: DdcaDisplayRef, pbytes: *mut *mut u8) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_edid_by_display_ref") {
            return rc;
        }
        let Some(Object::Ref { display, .. }) = lib.objects.get(&(dref as usize)) else {
            return codes::ARG;
        };
        let edid = lib.displays[*display].edid.as_ptr();
        unsafe { *pbytes = edid as *mut u8 };
        codes::OK
    })
}

unsafe extern "C" fn ddca_open_display(dref: DdcaDisplayRef, pdh: *mut DdcaDisplayHandle) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_open_display") {
            return rc;
        }
        let Some(Object::Ref { display, .. }) = lib.objects.get(&(dref as usize)) else {
            return codes::ARG;
        };
        let display = *display;
        let repr = CString::new(format!("Display_Handle[i2c-{}: fd=3]", lib.displays[display].busno)).unwrap_or_default();
        let token = lib.insert(Object::Handle { display, repr });
        unsafe { *pdh = token as DdcaDisplayHandle };
        codes::OK
    })
}

unsafe extern "C" fn ddca_close_display(dh: DdcaDisplayHandle) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_close_display") {
            return rc;
        }
        if lib.handle_display(dh).is_some() {
            lib.objects.remove(&(dh as usize));
            codes::OK
        } else {
            lib.bad_frees += 1;
            codes::ARG
        }
    })
}

unsafe extern "C" fn ddca_dh_repr(dh: DdcaDisplayHandle) -> *const c_char {
    with_state(|lib| match lib.objects.get(&(dh as usize)) {
        Some(object @ Object::Handle { .. }) => object.repr(),
        _ => ptr::null(),
    })
}

unsafe extern "C" fn ddca_get_mccs_version(dh: DdcaDisplayHandle, pspec: *mut DdcaMccsVersionSpec) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_mccs_version") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let (major, minor) = lib.displays[display].mccs;
        unsafe { *pspec = DdcaMccsVersionSpec { major, minor } };
        codes::OK
    })
}

unsafe extern "C" fn ddca_get_mccs_version_id(dh: DdcaDisplayHandle, p_id: *mut c_int) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_mccs_version_id") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let (major, minor) = lib.displays[display].mccs;
        unsafe { *p_id = spec_version_id(DdcaMccsVersionSpec { major, minor }) };
        codes::OK
    })
}

unsafe extern "C" fn ddca_mccs_version_id_name(version_id: c_int) -> *const c_char {
    match version_id {
        0 => c"DDCA_VANY".as_ptr(),
        1 => c"DDCA_V10".as_ptr(),
        2 => c"DDCA_V20".as_ptr(),
        4 => c"DDCA_V21".as_ptr(),
        8 => c"DDCA_V30".as_ptr(),
        16 => c"DDCA_V22".as_ptr(),
        _ => ptr::null(),
    }
}

unsafe extern "C" fn ddca_mccs_version_id_desc(version_id: c_int) -> *const c_char {
    match version_id {
        0 => c"Unknown".as_ptr(),
        1 => c"1.0".as_ptr(),
        2 => c"2.0".as_ptr(),
        4 => c"2.1".as_ptr(),
        8 => c"3.0".as_ptr(),
        16 => c"2.2".as_ptr(),
        _ => ptr::null(),
    }
}

unsafe extern "C" fn ddca_get_capabilities_string(dh: DdcaDisplayHandle, pcaps: *mut *mut c_char) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_capabilities_string") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let caps = lib.displays[display].caps.clone();
        unsafe { *pcaps = lib.malloc_string(caps.as_bytes()) };
        codes::OK
    })
}

/// Contents of the parenthesised group `name(..)`
fn caps_group<'a>(caps: &'a str, name: &str) -> Option<&'a str> {
    let start = caps.find(&format!("{name}("))? + name.len() + 1;
    let mut depth = 1;
    for (ndx, ch) in caps[start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&caps[start..start + ndx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Minimal reading of the `vcp(..)` and `mccs_ver(..)` groups
fn parse_caps(caps: &str) -> Option<(DdcaMccsVersionSpec, Vec<(u8, Vec<u8>)>)> {
    let vcp = caps_group(caps, "vcp")?;
    let mut features: Vec<(u8, Vec<u8>)> = Vec::new();
    let mut rest = vcp.trim_start();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('(') {
            let end = inner.find(')')?;
            let values = inner[..end]
                .split_whitespace()
                .map(|v| u8::from_str_radix(v, 16).ok())
                .collect::<Option<Vec<_>>>()?;
            features.last_mut()?.1 = values;
            rest = inner[end + 1..].trim_start();
        } else {
            let end = rest.find(|c: char| c.is_whitespace() || c == '(').unwrap_or(rest.len());
            features.push((u8::from_str_radix(&rest[..end], 16).ok()?, Vec::new()));
            rest = rest[end..].trim_start();
        }
    }

    let version = caps_group(caps, "mccs_ver")
        .and_then(|v| {
            let (major, minor) = v.split_once('.')?;
            Some(DdcaMccsVersionSpec {
                major: major.trim().parse().ok()?,
                minor: minor.trim().parse().ok()?,
            })
        })
        .unwrap_or_default();

    Some((version, features))
}

unsafe extern "C" fn ddca_parse_capabilities_string(caps: *const c_char, pparsed: *mut *mut DdcaCapabilities) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_parse_capabilities_string") {
            return rc;
        }
        if caps.is_null() || pparsed.is_null() {
            return codes::ARG;
        }
        let unparsed = unsafe { CStr::from_ptr(caps) }.to_owned();
        let Some((version, features)) = parse_caps(&unparsed.to_string_lossy()) else {
            return codes::ARG;
        };

        let mut values: Vec<Vec<u8>> = features.iter().map(|(_, v)| v.clone()).collect();
        let mut entries: Vec<DdcaCapVcp> = features
            .iter()
            .zip(values.iter_mut())
            .map(|((code, _), v)| DdcaCapVcp {
                marker: lib.marker(CAP_VCP_MARKER),
                feature_code: *code,
                value_ct: v.len() as c_int,
                values: if v.is_empty() { ptr::null_mut() } else { v.as_mut_ptr() },
            })
            .collect();
        let mut record = Box::new(DdcaCapabilities {
            marker: lib.marker(CAPABILITIES_MARKER),
            unparsed_string: unparsed.as_ptr() as *mut c_char,
            version_spec: version,
            vcp_code_ct: entries.len() as c_int,
            vcp_codes: entries.as_mut_ptr(),
        });
        let raw: *mut DdcaCapabilities = &mut *record;
        lib.parsed.insert(
            raw as usize,
            ParsedRecord {
                record,
                _entries: entries,
                _values: values,
                _unparsed: unparsed,
            },
        );
        unsafe { *pparsed = raw };
        codes::OK
    })
}

unsafe extern "C" fn ddca_free_parsed_capabilities(parsed: *mut DdcaCapabilities) {
    with_state(|lib| {
        lib.enter("ddca_free_parsed_capabilities");
        match lib.parsed.remove(&(parsed as usize)) {
            Some(record) => drop(record.record),
            None => lib.bad_frees += 1,
        }
    })
}

unsafe extern "C" fn ddca_get_feature_info_by_vcp_version(
    feature_code: DdcaVcpFeatureCode,
    version_id: c_int,
    pinfo: *mut *mut DdcaVersionFeatureInfo,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_feature_info_by_vcp_version") {
            return rc;
        }
        lib.feature_info(feature_code, version_id, pinfo)
    })
}

unsafe extern "C" fn ddca_get_feature_info_by_display(
    dh: DdcaDisplayHandle,
    feature_code: DdcaVcpFeatureCode,
    pinfo: *mut *mut DdcaVersionFeatureInfo,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_feature_info_by_display") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let (major, minor) = lib.displays[display].mccs;
        let version_id = spec_version_id(DdcaMccsVersionSpec { major, minor });
        lib.feature_info(feature_code, version_id, pinfo)
    })
}

unsafe extern "C" fn ddca_free_feature_info(info: *mut DdcaVersionFeatureInfo) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_free_feature_info") {
            return rc;
        }
        if lib.feature_infos.remove(&(info as usize)).is_some() {
            codes::OK
        } else {
            lib.bad_frees += 1;
            codes::ARG
        }
    })
}

unsafe extern "C" fn ddca_get_feature_name(feature_code: DdcaVcpFeatureCode) -> *const c_char {
    feature_def(feature_code).map_or(ptr::null(), |def| def.name.as_ptr())
}

unsafe extern "C" fn ddca_get_simple_sl_value_table(
    feature_code: DdcaVcpFeatureCode,
    version_id: c_int,
    ptable: *mut *mut DdcaFeatureValueEntry,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_simple_sl_value_table") {
            return rc;
        }
        unsafe { *ptable = ptr::null_mut() };
        if version_id_spec(version_id).is_none() {
            return codes::ARG;
        }
        let Some(def) = feature_def(feature_code) else {
            return codes::UNKNOWN_FEATURE;
        };
        if def.flags & FeatureFlags::SIMPLE_NC.bits() == 0 {
            return codes::INVALID_OPERATION;
        }
        unsafe { *ptable = lib.sl_table(def) };
        codes::OK
    })
}

unsafe extern "C" fn ddca_get_simple_nc_feature_value_name(
    dh: DdcaDisplayHandle,
    feature_code: DdcaVcpFeatureCode,
    feature_value: u8,
    pname: *mut *mut c_char,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_simple_nc_feature_value_name") {
            return rc;
        }
        if lib.handle_display(dh).is_none() {
            return codes::ARG;
        }
        let Some(def) = feature_def(feature_code) else {
            return codes::UNKNOWN_FEATURE;
        };
        if def.flags & FeatureFlags::SIMPLE_NC.bits() == 0 {
            return codes::INVALID_OPERATION;
        }
        match def.values.iter().find(|(code, _)| *code == feature_value) {
            Some((_, name)) => {
                unsafe { *pname = name.as_ptr() as *mut c_char };
                codes::OK
            }
            None => codes::NOT_FOUND,
        }
    })
}

unsafe extern "C" fn ddca_get_any_vcp_value_using_explicit_type(
    dh: DdcaDisplayHandle,
    feature_code: DdcaVcpFeatureCode,
    call_type: c_int,
    pvalrec: *mut *mut DdcaAnyVcpValue,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_any_vcp_value_using_explicit_type") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let Some(stored) = lib.displays[display].values.get(&feature_code).cloned() else {
            return codes::REPORTED_UNSUPPORTED;
        };

        let (value_type, val, mut bytes) = match (stored, call_type) {
            (FakeValue::NonTable(v), DDCA_UNSET_VCP_VALUE_TYPE_PARM | DDCA_NON_TABLE_VCP_VALUE_PARM) => (
                DDCA_NON_TABLE_VCP_VALUE,
                DdcaVcpValueUnion {
                    c_nc: DdcaNonTableBytes {
                        mh: v.mh,
                        ml: v.ml,
                        sh: v.sh,
                        sl: v.sl,
                    },
                },
                Vec::new(),
            ),
            (FakeValue::Table(bytes), DDCA_UNSET_VCP_VALUE_TYPE_PARM | DDCA_TABLE_VCP_VALUE_PARM) => (
                DDCA_TABLE_VCP_VALUE,
                DdcaVcpValueUnion {
                    t: DdcaTableBytes {
                        bytes: ptr::null_mut(),
                        bytect: bytes.len() as u16,
                    },
                },
                bytes,
            ),
            _ => return codes::INVALID_OPERATION,
        };

        let mut record = Box::new(DdcaAnyVcpValue {
            opcode: feature_code,
            value_type: lib.value_type_override.take().unwrap_or(value_type),
            val,
        });
        if value_type == DDCA_TABLE_VCP_VALUE {
            record.val.t.bytes = bytes.as_mut_ptr();
        }
        let raw: *mut DdcaAnyVcpValue = &mut *record;
        lib.values.insert(raw as usize, ValueRecord { record, _bytes: bytes });
        unsafe { *pvalrec = raw };
        codes::OK
    })
}

unsafe extern "C" fn ddca_free_any_vcp_value(valrec: *mut DdcaAnyVcpValue) {
    with_state(|lib| {
        lib.enter("ddca_free_any_vcp_value");
        match lib.values.remove(&(valrec as usize)) {
            Some(value) => drop(value.record),
            None => lib.bad_frees += 1,
        }
    })
}

unsafe extern "C" fn ddca_get_formatted_vcp_value(
    dh: DdcaDisplayHandle,
    feature_code: DdcaVcpFeatureCode,
    pformatted: *mut *mut c_char,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_formatted_vcp_value") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let text = match lib.displays[display].values.get(&feature_code) {
            Some(FakeValue::NonTable(v)) => {
                format!("current value = {:5}, max value = {:5}", v.current_value(), v.max_value())
            }
            Some(FakeValue::Table(bytes)) => {
                bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
            }
            None => return codes::REPORTED_UNSUPPORTED,
        };
        unsafe { *pformatted = lib.malloc_string(text.as_bytes()) };
        codes::OK
    })
}

unsafe extern "C" fn ddca_set_non_table_vcp_value(
    dh: DdcaDisplayHandle,
    feature_code: DdcaVcpFeatureCode,
    hi_byte: u8,
    lo_byte: u8,
) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_set_non_table_vcp_value") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        match lib.displays[display].values.get_mut(&feature_code) {
            Some(FakeValue::NonTable(v)) => {
                v.sh = hi_byte;
                v.sl = lo_byte;
            }
            Some(FakeValue::Table(_)) => return codes::INVALID_OPERATION,
            None => return codes::REPORTED_UNSUPPORTED,
        }
        lib.writes.push((feature_code, hi_byte, lo_byte));
        codes::OK
    })
}

unsafe extern "C" fn ddca_get_profile_related_values(dh: DdcaDisplayHandle, pvalues: *mut *mut c_char) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_get_profile_related_values") {
            return rc;
        }
        let Some(display) = lib.handle_display(dh) else {
            return codes::ARG;
        };
        let display = &lib.displays[display];
        let mut text = format!("EDID={:02X}{:02X}", display.edid[8], display.edid[9]);
        for (code, value) in &display.values {
            if let FakeValue::NonTable(v) = value {
                text.push_str(&format!(";VCP={code:02X} {}", v.current_value()));
            }
        }
        unsafe { *pvalues = lib.malloc_string(text.as_bytes()) };
        codes::OK
    })
}

unsafe extern "C" fn ddca_set_profile_related_values(values: *const c_char) -> DdcaStatus {
    with_state(|lib| {
        if let Some(rc) = lib.enter("ddca_set_profile_related_values") {
            return rc;
        }
        if values.is_null() {
            return codes::ARG;
        }
        let text = unsafe { CStr::from_ptr(values) }.to_string_lossy().into_owned();
        if text.is_empty() {
            return codes::ARG;
        }
        lib.profile = Some(text);
        codes::OK
    })
}

/// Entry point table backed by the fake library
pub fn api() -> Api {
    Api {
        ddca_ddcutil_version,
        ddca_ddcutil_version_string,
        ddca_build_options,
        ddca_max_max_tries,
        ddca_rc_name,
        ddca_rc_desc,
        ddca_get_max_tries,
        ddca_set_max_tries,
        ddca_enable_verify,
        ddca_is_verify_enabled,
        ddca_get_output_level,
        ddca_set_output_level,
        ddca_output_level_name,
        ddca_enable_report_ddc_errors,
        ddca_is_report_ddc_errors_enabled,
        ddca_reset_stats,
        ddca_get_display_info_list,
        ddca_free_display_info_list,
        ddca_create_dispno_display_identifier,
        ddca_create_busno_display_identifier,
        ddca_create_adlno_display_identifier,
        ddca_create_mfg_model_sn_display_identifier,
        ddca_create_edid_display_identifier,
        ddca_create_usb_display_identifier,
        ddca_create_usb_hiddev_display_identifier,
        ddca_free_display_identifier,
        ddca_did_repr,
        ddca_create_display_ref,
        ddca_free_display_ref,
        ddca_dref_repr,
        ddca_get_edid_by_display_ref,
        ddca_open_display,
        ddca_close_display,
        ddca_dh_repr,
        ddca_get_mccs_version,
        ddca_get_mccs_version_id,
        ddca_mccs_version_id_name,
        ddca_mccs_version_id_desc,
        ddca_get_capabilities_string,
        ddca_parse_capabilities_string,
        ddca_free_parsed_capabilities,
        ddca_get_feature_info_by_vcp_version,
        ddca_get_feature_info_by_display,
        ddca_free_feature_info,
        ddca_get_feature_name,
        ddca_get_simple_sl_value_table,
        ddca_get_simple_nc_feature_value_name,
        ddca_get_any_vcp_value_using_explicit_type,
        ddca_free_any_vcp_value,
        ddca_get_formatted_vcp_value,
        ddca_set_non_table_vcp_value,
        ddca_get_profile_related_values,
        ddca_set_profile_related_values,
        free,
    }
}
