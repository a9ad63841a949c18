/*!
C interface to the bundle codec.

Bundles cross the boundary as opaque handles, and byte data as [`Buffer`]s.
Every handle, buffer or metadata struct returned here must be released with
its matching `*_free` function, and releasing a null pointer does nothing.
Failures are reported as null pointers, and logged.
*/

use core::ffi::{CStr, c_char};
use dtnbp_bpv7::{codec, prelude::*};
use std::ffi::CString;
use tracing::warn;

/// An owned byte buffer.
#[repr(C)]
pub struct Buffer {
    pub data: *mut u8,
    pub len: usize,
}

impl Buffer {
    fn new(data: Box<[u8]>) -> *mut Buffer {
        let len = data.len();
        let data = Box::into_raw(data) as *mut u8;
        Box::into_raw(Box::new(Buffer { data, len }))
    }

    /// # Safety
    ///
    /// `buf` must be null, or point to a valid `Buffer` whose data is valid
    /// for `len` bytes.
    unsafe fn as_slice<'a>(buf: *const Buffer) -> Option<&'a [u8]> {
        let buf = unsafe { buf.as_ref() }?;
        if buf.data.is_null() {
            (buf.len == 0).then_some(&[][..])
        } else {
            Some(unsafe { core::slice::from_raw_parts(buf.data, buf.len) })
        }
    }
}

/// A summary of a bundle's primary block.
#[repr(C)]
pub struct BundleMetaData {
    /// The source EID, as text
    pub src: *mut c_char,
    /// The destination EID, as text
    pub dst: *mut c_char,
    /// The report-to EID, as text
    pub report_to: *mut c_char,
    /// The creation time, in milliseconds since the DTN epoch
    pub timestamp: u64,
    /// The creation sequence number
    pub seqno: u64,
    /// The lifetime, in milliseconds
    pub lifetime: u64,
    pub is_fragment: bool,
    /// Zero unless `is_fragment`
    pub fragment_offset: u64,
    /// Zero unless `is_fragment`
    pub total_len: u64,
}

fn to_c_string(eid: &Eid) -> *mut c_char {
    match CString::new(eid.to_string()) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            warn!("EID cannot be passed as a C string: {e}");
            core::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `s` must be null or a valid nul-terminated string.
unsafe fn parse_eid(s: *const c_char, field: &str) -> Option<Eid> {
    if s.is_null() {
        warn!("Null {field} EID");
        return None;
    }
    let s = match unsafe { CStr::from_ptr(s) }.to_str() {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid {field} EID: {e}");
            return None;
        }
    };
    s.parse()
        .inspect_err(|e| warn!("Invalid {field} EID '{s}': {e}"))
        .ok()
}

/// Liveness check for callers, always returning 23.
#[unsafe(no_mangle)]
pub extern "C" fn bp7_working() -> u8 {
    23
}

/// Generates a random sample bundle, encoded as CBOR.
#[unsafe(no_mangle)]
pub extern "C" fn helper_rnd_bundle() -> *mut Buffer {
    match dtnbp_bpv7::sample::rnd_bundle(CreationTimestamp::now()) {
        Ok(bundle) => Buffer::new(codec::encode(&bundle).into()),
        Err(e) => {
            warn!("Failed to generate sample bundle: {e}");
            core::ptr::null_mut()
        }
    }
}

/// Frees a buffer.
///
/// # Safety
///
/// `buf` must be null, or a buffer returned by this library and not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn buffer_free(buf: *mut Buffer) {
    if buf.is_null() {
        return;
    }
    let buf = unsafe { Box::from_raw(buf) };
    if !buf.data.is_null() {
        drop(unsafe { Box::from_raw(core::ptr::slice_from_raw_parts_mut(buf.data, buf.len)) });
    }
}

/// Decodes a bundle from CBOR. Returns null if the data is not a valid bundle.
///
/// # Safety
///
/// `buf` must be null, or point to a valid `Buffer`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_from_cbor(buf: *const Buffer) -> *mut Bundle {
    let Some(data) = (unsafe { Buffer::as_slice(buf) }) else {
        warn!("Null buffer passed to bundle_from_cbor");
        return core::ptr::null_mut();
    };
    match codec::decode(data) {
        Ok(bundle) => Box::into_raw(Box::new(bundle)),
        Err(e) => {
            warn!("Failed to decode bundle: {e}");
            core::ptr::null_mut()
        }
    }
}

/// Encodes a bundle as CBOR.
///
/// # Safety
///
/// `bundle` must be null, or a bundle handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_to_cbor(bundle: *const Bundle) -> *mut Buffer {
    match unsafe { bundle.as_ref() } {
        Some(bundle) => Buffer::new(codec::encode(bundle).into()),
        None => core::ptr::null_mut(),
    }
}

/// Creates a bundle with default settings: the report-to EID is the source,
/// the bundle must not be fragmented, and no block has a CRC.
///
/// Returns null if either EID is invalid.
///
/// # Safety
///
/// `src` and `dst` must be null or valid nul-terminated strings, and
/// `payload` must be null or point to a valid `Buffer`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_new_default(
    src: *const c_char,
    dst: *const c_char,
    lifetime: u64,
    payload: *const Buffer,
) -> *mut Bundle {
    let (Some(src), Some(dst)) = (unsafe { parse_eid(src, "source") }, unsafe {
        parse_eid(dst, "destination")
    }) else {
        return core::ptr::null_mut();
    };
    let Some(payload) = (unsafe { Buffer::as_slice(payload) }) else {
        warn!("Null payload buffer passed to bundle_new_default");
        return core::ptr::null_mut();
    };

    match Builder::new()
        .source(src)
        .destination(dst)
        .lifetime(lifetime)
        .crc_type(CrcType::None)
        .flags(BundleFlags {
            do_not_fragment: true,
            ..Default::default()
        })
        .add_payload_block(payload)
        .build()
    {
        Ok(bundle) => Box::into_raw(Box::new(bundle)),
        Err(e) => {
            warn!("Failed to build bundle: {e}");
            core::ptr::null_mut()
        }
    }
}

/// Frees a bundle.
///
/// # Safety
///
/// `bundle` must be null, or a bundle handle returned by this library and not
/// yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_free(bundle: *mut Bundle) {
    if !bundle.is_null() {
        drop(unsafe { Box::from_raw(bundle) });
    }
}

/// Returns the metadata of a bundle.
///
/// # Safety
///
/// `bundle` must be null, or a bundle handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_get_metadata(bundle: *const Bundle) -> *mut BundleMetaData {
    let Some(bundle) = (unsafe { bundle.as_ref() }) else {
        return core::ptr::null_mut();
    };
    let metadata = bundle.metadata();
    let fragment_info = metadata.fragment_info.unwrap_or(FragmentInfo {
        offset: 0,
        total_len: 0,
    });
    Box::into_raw(Box::new(BundleMetaData {
        src: to_c_string(&metadata.source),
        dst: to_c_string(&metadata.destination),
        report_to: to_c_string(&metadata.report_to),
        timestamp: metadata.timestamp.creation_time.millisecs(),
        seqno: metadata.timestamp.sequence_number,
        lifetime: metadata.lifetime,
        is_fragment: metadata.fragment_info.is_some(),
        fragment_offset: fragment_info.offset,
        total_len: fragment_info.total_len,
    }))
}

/// Frees a metadata struct, and the strings it holds.
///
/// # Safety
///
/// `meta` must be null, or a metadata struct returned by this library and not
/// yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_metadata_free(meta: *mut BundleMetaData) {
    if meta.is_null() {
        return;
    }
    let meta = unsafe { Box::from_raw(meta) };
    for s in [meta.src, meta.dst, meta.report_to] {
        if !s.is_null() {
            drop(unsafe { CString::from_raw(s) });
        }
    }
}

/// Returns `true` if `bundle` is a bundle handle.
///
/// Handles are only ever created from a `Bundle`, which is checked when it
/// is constructed and cannot be made invalid afterwards, so this is a null
/// check.
///
/// # Safety
///
/// `bundle` must be null, or a bundle handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_is_valid(bundle: *const Bundle) -> bool {
    !bundle.is_null()
}

/// Returns a copy of the payload of a bundle.
///
/// # Safety
///
/// `bundle` must be null, or a bundle handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bundle_payload(bundle: *const Bundle) -> *mut Buffer {
    match unsafe { bundle.as_ref() } {
        Some(bundle) => Buffer::new(bundle.payload().into()),
        None => core::ptr::null_mut(),
    }
}
