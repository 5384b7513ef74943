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
//! The application side of the PAM conversation.
//!
//! libpam calls [`converse`] synchronously from inside `pam_authenticate`
//! whenever a module needs input. Every masked prompt is answered with the
//! password carried by the [`ConvContext`]; every other prompt is left
//! unanswered.
use libc::{c_int, c_void};
use std::ffi::CStr;
use std::mem::size_of;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::pam::constants::{PamResultCode, PAM_ERROR_MSG, PAM_PROMPT_ECHO_OFF, PAM_TEXT_INFO};
use crate::pam::ffi::{PamConv, PamMessage, PamResponse};

/// State reachable from the conversation through `appdata_ptr`.
///
/// Must outlive the transaction it is registered with.
pub struct ConvContext<'a> {
    password: &'a CStr,
}

impl<'a> ConvContext<'a> {
    pub fn new(password: &'a CStr) -> Self {
        ConvContext { password }
    }

    /// Build the `pam_conv` record handed to `pam_start`.
    pub fn as_pam_conv(&self) -> PamConv {
        PamConv {
            conv: Some(converse),
            appdata_ptr: self as *const ConvContext<'a> as *mut c_void,
        }
    }
}

unsafe fn free_responses(responses: *mut PamResponse, filled: usize) {
    for i in 0..filled {
        libc::free((*responses.add(i)).resp as *mut c_void);
    }
    libc::free(responses as *mut c_void);
}

unsafe fn respond(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> PamResultCode {
    if num_msg < 0 || resp.is_null() {
        return PamResultCode::PAM_CONV_ERR;
    }
    if num_msg == 0 {
        *resp = ptr::null_mut();
        return PamResultCode::PAM_SUCCESS;
    }
    if msg.is_null() || appdata_ptr.is_null() {
        return PamResultCode::PAM_CONV_ERR;
    }

    let ctx = &*(appdata_ptr as *const ConvContext);
    let count = num_msg as usize;

    // calloc leaves every slot as "no response, retcode 0".
    let responses = libc::calloc(count, size_of::<PamResponse>()) as *mut PamResponse;
    if responses.is_null() {
        error!("Unable to allocate {} conversation responses", count);
        return PamResultCode::PAM_BUF_ERR;
    }

    for i in 0..count {
        let message = *msg.add(i);
        if message.is_null() {
            continue;
        }
        let text = if (*message).msg.is_null() {
            String::new()
        } else {
            CStr::from_ptr((*message).msg).to_string_lossy().into_owned()
        };
        match (*message).msg_style {
            PAM_PROMPT_ECHO_OFF => {
                let answer = libc::strdup(ctx.password.as_ptr());
                if answer.is_null() {
                    error!("Unable to copy the password into a conversation response");
                    free_responses(responses, i);
                    return PamResultCode::PAM_BUF_ERR;
                }
                let slot = &mut *responses.add(i);
                slot.resp = answer;
                slot.resp_retcode = 0;
            }
            PAM_ERROR_MSG => debug!(%text, "PAM error message"),
            PAM_TEXT_INFO => debug!(%text, "PAM info message"),
            style => debug!(style, %text, "Unanswered PAM prompt"),
        }
    }

    // Ownership of the array and every string in it now belongs to libpam,
    // which frees them. Nothing on this side may touch them again.
    *resp = responses;
    PamResultCode::PAM_SUCCESS
}

/// The `pam_conv.conv` callback.
pub extern "C" fn converse(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int {
    // SAFETY: libpam passes num_msg valid message pointers, a writable
    // response slot, and the appdata_ptr registered through as_pam_conv.
    unwind_guard(|| unsafe { respond(num_msg, msg, resp, appdata_ptr) })
}

/// Run a conversation round without letting a panic cross into C.
fn unwind_guard<F: FnOnce() -> PamResultCode>(round: F) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(round)) {
        Ok(rc) => rc.as_raw(),
        Err(_) => {
            error!("PAM conversation panicked");
            PamResultCode::PAM_CONV_ERR.as_raw()
        }
    }
}
