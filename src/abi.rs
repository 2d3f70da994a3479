//! Host ABI layer (C1): §6.1.
//!
//! This module owns the only `unsafe` code in the crate: the raw
//! `extern "C"` imports the host provides, and the arena that keeps the
//! NUL-terminated C strings handed to those imports alive for as long as
//! the host needs them (§5, §9: "buffer ownership across the Wasm ABI").
//!
//! Everything above this module — [`crate::emit`] in particular — talks to
//! the host only through the [`PickerHost`] trait, so it can be driven by a
//! test double without linking against the real imports.

use std::ffi::CString;

/// Informational calling-app identity (§6.1 `getCallingAppInfo`).
#[derive(Debug, Clone, Default)]
pub struct CallingAppInfo {
    pub package_name: String,
    pub origin: String,
}

/// The emission surface C7 drives. One method per host import in §6.1's
/// Picker ABI, minus the deprecated `addEntry`/`addField` (retained in the
/// real ABI for compatibility, never called by this matcher).
pub trait PickerHost {
    fn add_string_id_entry(
        &mut self,
        entry_id: &str,
        icon: Option<&[u8]>,
        title: &str,
        subtitle: &str,
        disclaimer: Option<&str>,
        warning: Option<&str>,
    );

    fn add_field_for_string_id_entry(&mut self, entry_id: &str, display_name: &str, display_value: &str);

    fn add_entry_set(&mut self, set_id: &str, set_length: u32);

    #[allow(clippy::too_many_arguments)]
    fn add_entry_to_set(
        &mut self,
        entry_id: &str,
        icon: Option<&[u8]>,
        title: &str,
        subtitle: &str,
        disclaimer: Option<&str>,
        warning: Option<&str>,
        metadata: Option<&str>,
        set_id: &str,
        set_index: u32,
    );

    fn add_field_to_entry_set(
        &mut self,
        entry_id: &str,
        display_name: &str,
        display_value: &str,
        set_id: &str,
        set_index: u32,
    );
}

#[cfg(target_arch = "wasm32")]
mod raw {
    extern "C" {
        pub fn getCallingAppInfo(out_info: *mut u8);
        pub fn getRequestSize(out_size: *mut u32);
        pub fn getRequestBuffer(out_buffer: *mut u8);
        pub fn getCredentialsSize(out_size: *mut u32);
        pub fn readCredentialsBuffer(out_buffer: *mut u8, offset: u32, len: u32) -> u32;
        pub fn getWasmVersion(out_version: *mut u32);

        pub fn addStringIdEntry(
            entry_id: *const i8,
            icon_ptr: *const u8,
            icon_len: u32,
            title: *const i8,
            subtitle: *const i8,
            disclaimer: *const i8,
            warning: *const i8,
        );
        pub fn addFieldForStringIdEntry(
            entry_id: *const i8,
            field_display_name: *const i8,
            field_display_value: *const i8,
        );

        pub fn addEntrySet(set_id: *const i8, set_length: u32);
        #[allow(clippy::too_many_arguments)]
        pub fn addEntryToSet(
            entry_id: *const i8,
            icon_ptr: *const u8,
            icon_len: u32,
            title: *const i8,
            subtitle: *const i8,
            disclaimer: *const i8,
            warning: *const i8,
            metadata: *const i8,
            set_id: *const i8,
            set_index: u32,
        );
        pub fn addFieldToEntrySet(
            entry_id: *const i8,
            field_display_name: *const i8,
            field_display_value: *const i8,
            set_id: *const i8,
            set_index: u32,
        );
    }
}

/// Read the full request-envelope buffer from the host (§4.6 step 3).
#[cfg(target_arch = "wasm32")]
pub fn read_request_bytes() -> Vec<u8> {
    unsafe {
        let mut size: u32 = 0;
        raw::getRequestSize(&mut size);
        let mut buffer = vec![0u8; size as usize];
        raw::getRequestBuffer(buffer.as_mut_ptr());
        buffer
    }
}

/// Read the full credential-database buffer, looping on the chunked
/// `readCredentialsBuffer` import until the declared size is satisfied
/// (§4.6 step 2).
#[cfg(target_arch = "wasm32")]
pub fn read_credentials_bytes() -> Vec<u8> {
    unsafe {
        let mut size: u32 = 0;
        raw::getCredentialsSize(&mut size);
        let mut buffer = vec![0u8; size as usize];
        let mut offset: u32 = 0;
        while offset < size {
            let remaining = size - offset;
            let read = raw::readCredentialsBuffer(buffer.as_mut_ptr().add(offset as usize), offset, remaining);
            if read == 0 {
                break;
            }
            offset += read;
        }
        buffer
    }
}

/// Query the host's capability version (§4.5, §6.1).
#[cfg(target_arch = "wasm32")]
pub fn wasm_version() -> u32 {
    unsafe {
        let mut version: u32 = 0;
        raw::getWasmVersion(&mut version);
        version
    }
}

/// Read the calling-app identity (informational only, §4.6 step 1).
#[cfg(target_arch = "wasm32")]
pub fn calling_app_info() -> CallingAppInfo {
    unsafe {
        let mut buf = [0u8; 768];
        raw::getCallingAppInfo(buf.as_mut_ptr());
        let package_name = std::ffi::CStr::from_bytes_until_nul(&buf[..256])
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let origin = std::ffi::CStr::from_bytes_until_nul(&buf[256..768])
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        CallingAppInfo { package_name, origin }
    }
}

/// [`PickerHost`] implementation that calls through to the real host
/// imports. Every string handed across the boundary is interned into
/// `arena` first, so the backing `CString` outlives the call — and, since
/// the arena is dropped only when the whole invocation ends, outlives every
/// subsequent call too.
#[cfg(target_arch = "wasm32")]
pub struct WasmPickerHost {
    arena: Vec<CString>,
}

#[cfg(target_arch = "wasm32")]
impl WasmPickerHost {
    pub fn new() -> Self {
        Self { arena: Vec::new() }
    }

    fn intern(&mut self, s: &str) -> *const i8 {
        let c = CString::new(s).unwrap_or_else(|_| CString::new("").unwrap());
        let ptr = c.as_ptr();
        self.arena.push(c);
        ptr
    }

    fn intern_opt(&mut self, s: Option<&str>) -> *const i8 {
        match s {
            Some(s) => self.intern(s),
            None => std::ptr::null(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl Default for WasmPickerHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "wasm32")]
impl PickerHost for WasmPickerHost {
    fn add_string_id_entry(
        &mut self,
        entry_id: &str,
        icon: Option<&[u8]>,
        title: &str,
        subtitle: &str,
        disclaimer: Option<&str>,
        warning: Option<&str>,
    ) {
        let entry_id = self.intern(entry_id);
        let title = self.intern(title);
        let subtitle = self.intern(subtitle);
        let disclaimer = self.intern_opt(disclaimer);
        let warning = self.intern_opt(warning);
        let (icon_ptr, icon_len) = icon.map(|b| (b.as_ptr(), b.len() as u32)).unwrap_or((std::ptr::null(), 0));
        unsafe {
            raw::addStringIdEntry(entry_id, icon_ptr, icon_len, title, subtitle, disclaimer, warning);
        }
    }

    fn add_field_for_string_id_entry(&mut self, entry_id: &str, display_name: &str, display_value: &str) {
        let entry_id = self.intern(entry_id);
        let display_name = self.intern(display_name);
        let display_value = self.intern(display_value);
        unsafe {
            raw::addFieldForStringIdEntry(entry_id, display_name, display_value);
        }
    }

    fn add_entry_set(&mut self, set_id: &str, set_length: u32) {
        let set_id = self.intern(set_id);
        unsafe {
            raw::addEntrySet(set_id, set_length);
        }
    }

    fn add_entry_to_set(
        &mut self,
        entry_id: &str,
        icon: Option<&[u8]>,
        title: &str,
        subtitle: &str,
        disclaimer: Option<&str>,
        warning: Option<&str>,
        metadata: Option<&str>,
        set_id: &str,
        set_index: u32,
    ) {
        let entry_id = self.intern(entry_id);
        let title = self.intern(title);
        let subtitle = self.intern(subtitle);
        let disclaimer = self.intern_opt(disclaimer);
        let warning = self.intern_opt(warning);
        let metadata = self.intern_opt(metadata);
        let set_id = self.intern(set_id);
        let (icon_ptr, icon_len) = icon.map(|b| (b.as_ptr(), b.len() as u32)).unwrap_or((std::ptr::null(), 0));
        unsafe {
            raw::addEntryToSet(
                entry_id, icon_ptr, icon_len, title, subtitle, disclaimer, warning, metadata, set_id, set_index,
            );
        }
    }

    fn add_field_to_entry_set(
        &mut self,
        entry_id: &str,
        display_name: &str,
        display_value: &str,
        set_id: &str,
        set_index: u32,
    ) {
        let entry_id = self.intern(entry_id);
        let display_name = self.intern(display_name);
        let display_value = self.intern(display_value);
        let set_id = self.intern(set_id);
        unsafe {
            raw::addFieldToEntrySet(entry_id, display_name, display_value, set_id, set_index);
        }
    }
}
