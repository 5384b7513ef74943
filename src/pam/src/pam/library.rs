/*
   MIT License

   Copyright (c) 2015 TOZNY
   Copyright (c) 2020 William Brown <william@blackhats.net.au>
   Copyright (c) 2024 David Mulder <dmulder@samba.org>
   Copyright (c) 2026 The pamauth contributors

   Permission is hereby granted, free of charge, to any person obtaining a copy
   of this software and associated documentation files (the "Software"), to deal
   in the Software without restriction, including without limitation the rights
   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
   copies of the Software, and to permit persons to whom the Software is
   furnished to do so, subject to the following conditions:

   The above copyright notice and this permission notice shall be included in all
   copies or substantial portions of the Software.

   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
   SOFTWARE.
*/
//! Runtime loading of libpam.
//!
//! The worker never links against libpam. The library is opened with
//! `dlopen` when a [`PamLibrary`] is constructed and closed when it is
//! dropped, so a missing PAM stack surfaces as a load error instead of a
//! dynamic linker failure.
use libc::{c_int, c_void};
use std::ffi::{CStr, CString};
use std::fmt;
use thiserror::Error;

use crate::pam::constants::{PamResultCode, LIBPAM_CANDIDATES};
use crate::pam::ffi::{PamConv, PamHandle, PamStartFn, PamStatusFn, PamStrerrorFn};
use crate::pam::PamApi;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("unable to load libpam: {0}")]
    NotFound(String),
    #[error("libpam does not export {0}")]
    MissingSymbol(&'static str),
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns either NULL or a thread local NUL terminated string.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown dlopen error".to_string()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

/// Resolve `name` from an open library handle.
unsafe fn symbol(handle: *mut c_void, name: &'static str) -> Result<*mut c_void, LibraryError> {
    let c_name = CString::new(name).map_err(|_| LibraryError::MissingSymbol(name))?;
    let sym = libc::dlsym(handle, c_name.as_ptr());
    if sym.is_null() {
        debug!(symbol = name, err = %last_dl_error(), "dlsym");
        Err(LibraryError::MissingSymbol(name))
    } else {
        Ok(sym)
    }
}

struct EntryPoints {
    pam_start: PamStartFn,
    pam_authenticate: PamStatusFn,
    pam_acct_mgmt: PamStatusFn,
    pam_end: PamStatusFn,
    pam_strerror: PamStrerrorFn,
}

/// Each symbol is transmuted to the prototype declared in
/// `<security/pam_appl.h>`.
unsafe fn resolve(handle: *mut c_void) -> Result<EntryPoints, LibraryError> {
    Ok(EntryPoints {
        pam_start: std::mem::transmute::<*mut c_void, PamStartFn>(symbol(handle, "pam_start")?),
        pam_authenticate: std::mem::transmute::<*mut c_void, PamStatusFn>(symbol(
            handle,
            "pam_authenticate",
        )?),
        pam_acct_mgmt: std::mem::transmute::<*mut c_void, PamStatusFn>(symbol(
            handle,
            "pam_acct_mgmt",
        )?),
        pam_end: std::mem::transmute::<*mut c_void, PamStatusFn>(symbol(handle, "pam_end")?),
        pam_strerror: std::mem::transmute::<*mut c_void, PamStrerrorFn>(symbol(
            handle,
            "pam_strerror",
        )?),
    })
}

/// An open handle on libpam and the entry points the bridge uses.
pub struct PamLibrary {
    handle: *mut c_void,
    soname: &'static str,
    pam_start: PamStartFn,
    pam_authenticate: PamStatusFn,
    pam_acct_mgmt: PamStatusFn,
    pam_end: PamStatusFn,
    pam_strerror: PamStrerrorFn,
}

impl fmt::Debug for PamLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PamLibrary")
            .field("soname", &self.soname)
            .finish()
    }
}

impl PamLibrary {
    pub fn load() -> Result<PamLibrary, LibraryError> {
        let mut errors = Vec::new();
        for soname in LIBPAM_CANDIDATES {
            match Self::load_from(soname) {
                Ok(lib) => return Ok(lib),
                Err(LibraryError::NotFound(e)) => errors.push(e),
                Err(e) => return Err(e),
            }
        }
        Err(LibraryError::NotFound(errors.join("; ")))
    }

    fn load_from(soname: &'static str) -> Result<PamLibrary, LibraryError> {
        let c_soname =
            CString::new(soname).map_err(|_| LibraryError::NotFound(soname.to_string()))?;
        // SAFETY: c_soname is a valid C string for the duration of the call.
        let handle = unsafe { libc::dlopen(c_soname.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(LibraryError::NotFound(last_dl_error()));
        }

        // SAFETY: handle came from a successful dlopen above.
        match unsafe { resolve(handle) } {
            Ok(entry) => {
                debug!(soname, "Loaded libpam");
                Ok(PamLibrary {
                    handle,
                    soname,
                    pam_start: entry.pam_start,
                    pam_authenticate: entry.pam_authenticate,
                    pam_acct_mgmt: entry.pam_acct_mgmt,
                    pam_end: entry.pam_end,
                    pam_strerror: entry.pam_strerror,
                })
            }
            Err(e) => {
                unsafe { libc::dlclose(handle) };
                Err(e)
            }
        }
    }

    pub fn soname(&self) -> &'static str {
        self.soname
    }
}

impl Drop for PamLibrary {
    fn drop(&mut self) {
        // SAFETY: handle is the result of a successful dlopen and is closed once.
        unsafe { libc::dlclose(self.handle) };
    }
}

impl PamApi for PamLibrary {
    fn start(
        &self,
        service: &CStr,
        user: &CStr,
        conv: &PamConv,
        pamh: &mut *mut PamHandle,
    ) -> PamResultCode {
        // SAFETY: all pointers are derived from live references. libpam copies
        // the pam_conv structure; appdata_ptr lifetime is managed by the caller.
        let rc = unsafe {
            (self.pam_start)(service.as_ptr(), user.as_ptr(), conv, pamh as *mut *mut PamHandle)
        };
        PamResultCode::from_raw(rc)
    }

    fn authenticate(&self, pamh: *mut PamHandle, flags: c_int) -> PamResultCode {
        // SAFETY: pamh was produced by pam_start and has not been ended.
        PamResultCode::from_raw(unsafe { (self.pam_authenticate)(pamh, flags) })
    }

    fn acct_mgmt(&self, pamh: *mut PamHandle, flags: c_int) -> PamResultCode {
        // SAFETY: as above.
        PamResultCode::from_raw(unsafe { (self.pam_acct_mgmt)(pamh, flags) })
    }

    fn end(&self, pamh: *mut PamHandle, status: PamResultCode) -> PamResultCode {
        // SAFETY: pam_end accepts the handle from pam_start, including one
        // left behind by a failed start, and is called once per transaction.
        PamResultCode::from_raw(unsafe { (self.pam_end)(pamh, status.as_raw()) })
    }

    fn strerror(&self, pamh: *mut PamHandle, code: PamResultCode) -> Option<String> {
        // SAFETY: pam_strerror returns a pointer to a static message table entry.
        let msg = unsafe { (self.pam_strerror)(pamh, code.as_raw()) };
        if msg.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
        }
    }
}
