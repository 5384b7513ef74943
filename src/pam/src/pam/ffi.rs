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
//! Mirrors of the Linux-PAM structures that cross the ABI boundary.
//!
//! Field order and width must match `<security/_pam_types.h>` exactly.
use libc::{c_char, c_int, c_void};

use crate::pam::constants::{AlwaysZero, PamMessageStyle};

/// Opaque `pam_handle_t`.
#[repr(C)]
pub struct PamHandle {
    _private: [u8; 0],
}

/// `struct pam_message`
#[repr(C)]
#[derive(Debug)]
pub struct PamMessage {
    pub msg_style: PamMessageStyle,
    pub msg: *const c_char,
}

/// `struct pam_response`
///
/// Arrays of these handed back from the conversation are owned by libpam,
/// which releases them with `free(3)`.
#[repr(C)]
#[derive(Debug)]
pub struct PamResponse {
    pub resp: *mut c_char,
    pub resp_retcode: AlwaysZero,
}

pub type PamConvFn = extern "C" fn(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int;

/// `struct pam_conv`
#[repr(C)]
pub struct PamConv {
    pub conv: Option<PamConvFn>,
    pub appdata_ptr: *mut c_void,
}

pub type PamStartFn = unsafe extern "C" fn(
    service_name: *const c_char,
    user: *const c_char,
    pam_conversation: *const PamConv,
    pamh: *mut *mut PamHandle,
) -> c_int;
pub type PamStatusFn = unsafe extern "C" fn(pamh: *mut PamHandle, flags: c_int) -> c_int;
pub type PamStrerrorFn = unsafe extern "C" fn(pamh: *mut PamHandle, errnum: c_int) -> *const c_char;
