use std::ffi::{CStr, CString};
use std::os::raw::c_void;

//===----------------------------------------------------------------------===//
// Dynamic loader
//
// Thin wrapper over dlopen/dlsym. The default handle resolves against the
// current process image, which already exposes the C runtime. Handles stay
// open for the lifetime of the interpreter.
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, Copy)]
pub struct LibHandle(*mut c_void);

impl LibHandle {
    pub fn is_valid(self) -> bool {
        !self.0.is_null()
    }
}

/// Conventional locations probed when a bare library name fails to resolve.
const LIB_PATHS: &[&str] = &[
    "/usr/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/local/lib",
    "/lib",
    "/lib/x86_64-linux-gnu",
];

fn dlopen_path(path: &str) -> Option<LibHandle> {
    let cpath = CString::new(path).ok()?;
    let handle =
        unsafe { libc::dlopen(cpath.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };
    if handle.is_null() {
        None
    } else {
        Some(LibHandle(handle))
    }
}

/// Opens a shared object. `None` yields the process-wide default handle.
/// A bare name is probed as given, with an `.so` suffix, with a `lib`
/// prefix, and against the conventional library directories.
pub fn open(path: Option<&str>) -> Option<LibHandle> {
    let path = match path {
        None => {
            let handle = unsafe {
                libc::dlopen(std::ptr::null(), libc::RTLD_NOW | libc::RTLD_GLOBAL)
            };
            return if handle.is_null() { None } else { Some(LibHandle(handle)) };
        }
        Some(path) => path,
    };

    if let Some(handle) = dlopen_path(path) {
        return Some(handle);
    }
    if let Some(handle) = dlopen_path(&format!("{}.so", path)) {
        return Some(handle);
    }
    if let Some(handle) = dlopen_path(&format!("lib{}.so", path)) {
        return Some(handle);
    }
    for dir in LIB_PATHS {
        if let Some(handle) = dlopen_path(&format!("{}/lib{}.so", dir, path)) {
            return Some(handle);
        }
    }

    None
}

pub fn close(handle: LibHandle) {
    if handle.is_valid() {
        unsafe {
            libc::dlclose(handle.0);
        }
    }
}

/// Resolves a symbol. A NULL-valued symbol is distinguished from a lookup
/// failure through dlerror.
pub fn symbol(handle: LibHandle, name: &str) -> Option<*mut c_void> {
    let cname = CString::new(name).ok()?;

    unsafe {
        libc::dlerror();
        let address = libc::dlsym(handle.0, cname.as_ptr());
        if !libc::dlerror().is_null() {
            return None;
        }
        Some(address)
    }
}

pub fn last_error() -> Option<String> {
    unsafe {
        let message = libc::dlerror();
        if message.is_null() {
            None
        } else {
            Some(CStr::from_ptr(message).to_string_lossy().into_owned())
        }
    }
}
