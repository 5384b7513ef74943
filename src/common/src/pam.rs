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
use libc::c_int;
use std::fmt;

// The Linux-PAM return values
// see /usr/include/security/_pam_types.h
#[allow(non_camel_case_types, dead_code)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub enum PamResultCode {
    PAM_SUCCESS = 0,
    PAM_OPEN_ERR = 1,
    PAM_SYMBOL_ERR = 2,
    PAM_SERVICE_ERR = 3,
    PAM_SYSTEM_ERR = 4,
    PAM_BUF_ERR = 5,
    PAM_PERM_DENIED = 6,
    PAM_AUTH_ERR = 7,
    PAM_CRED_INSUFFICIENT = 8,
    PAM_AUTHINFO_UNAVAIL = 9,
    PAM_USER_UNKNOWN = 10,
    PAM_MAXTRIES = 11,
    PAM_NEW_AUTHTOK_REQD = 12,
    PAM_ACCT_EXPIRED = 13,
    PAM_SESSION_ERR = 14,
    PAM_CRED_UNAVAIL = 15,
    PAM_CRED_EXPIRED = 16,
    PAM_CRED_ERR = 17,
    PAM_NO_MODULE_DATA = 18,
    PAM_CONV_ERR = 19,
    PAM_AUTHTOK_ERR = 20,
    PAM_AUTHTOK_RECOVERY_ERR = 21,
    PAM_AUTHTOK_LOCK_BUSY = 22,
    PAM_AUTHTOK_DISABLE_AGING = 23,
    PAM_TRY_AGAIN = 24,
    PAM_IGNORE = 25,
    PAM_ABORT = 26,
    PAM_AUTHTOK_EXPIRED = 27,
    PAM_MODULE_UNKNOWN = 28,
    PAM_BAD_ITEM = 29,
    PAM_CONV_AGAIN = 30,
    PAM_INCOMPLETE = 31,
}

impl PamResultCode {
    const ALL: [PamResultCode; 32] = [
        PamResultCode::PAM_SUCCESS,
        PamResultCode::PAM_OPEN_ERR,
        PamResultCode::PAM_SYMBOL_ERR,
        PamResultCode::PAM_SERVICE_ERR,
        PamResultCode::PAM_SYSTEM_ERR,
        PamResultCode::PAM_BUF_ERR,
        PamResultCode::PAM_PERM_DENIED,
        PamResultCode::PAM_AUTH_ERR,
        PamResultCode::PAM_CRED_INSUFFICIENT,
        PamResultCode::PAM_AUTHINFO_UNAVAIL,
        PamResultCode::PAM_USER_UNKNOWN,
        PamResultCode::PAM_MAXTRIES,
        PamResultCode::PAM_NEW_AUTHTOK_REQD,
        PamResultCode::PAM_ACCT_EXPIRED,
        PamResultCode::PAM_SESSION_ERR,
        PamResultCode::PAM_CRED_UNAVAIL,
        PamResultCode::PAM_CRED_EXPIRED,
        PamResultCode::PAM_CRED_ERR,
        PamResultCode::PAM_NO_MODULE_DATA,
        PamResultCode::PAM_CONV_ERR,
        PamResultCode::PAM_AUTHTOK_ERR,
        PamResultCode::PAM_AUTHTOK_RECOVERY_ERR,
        PamResultCode::PAM_AUTHTOK_LOCK_BUSY,
        PamResultCode::PAM_AUTHTOK_DISABLE_AGING,
        PamResultCode::PAM_TRY_AGAIN,
        PamResultCode::PAM_IGNORE,
        PamResultCode::PAM_ABORT,
        PamResultCode::PAM_AUTHTOK_EXPIRED,
        PamResultCode::PAM_MODULE_UNKNOWN,
        PamResultCode::PAM_BAD_ITEM,
        PamResultCode::PAM_CONV_AGAIN,
        PamResultCode::PAM_INCOMPLETE,
    ];

    /// Map a raw status returned by libpam. Values outside the Linux-PAM
    /// range are reported as `PAM_SYSTEM_ERR`.
    pub fn from_raw(code: c_int) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .unwrap_or(PamResultCode::PAM_SYSTEM_ERR)
    }

    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    pub fn is_success(self) -> bool {
        self == PamResultCode::PAM_SUCCESS
    }
}

impl fmt::Display for PamResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as c_int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        for (idx, code) in PamResultCode::ALL.iter().enumerate() {
            assert_eq!(code.as_raw() as usize, idx);
            assert_eq!(PamResultCode::from_raw(idx as c_int), *code);
        }
        assert_eq!(PamResultCode::from_raw(-1), PamResultCode::PAM_SYSTEM_ERR);
        assert_eq!(PamResultCode::from_raw(4242), PamResultCode::PAM_SYSTEM_ERR);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PamResultCode::PAM_AUTH_ERR.to_string(),
            "PAM_AUTH_ERR (7)"
        );
    }
}
