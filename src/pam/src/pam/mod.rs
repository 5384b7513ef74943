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
//! Application side interface to the pluggable authentication module
//! framework (PAM).
//!
//! This module drives a single PAM authentication transaction on behalf of
//! the isolated worker process: `pam_start`, `pam_authenticate`,
//! `pam_acct_mgmt`, then `pam_end`. It only ever runs inside the worker, the
//! process that submits credentials never loads libpam.
//!
//! Prompts raised by the modules during the transaction are answered by the
//! conversation in [`conv`]. Only masked (password) prompts are answered.
//!
//! Note that constants that are normally read from pam header files are
//! hard-coded in the `constants` module. The values there are taken from
//! a Linux system.

pub mod constants;
pub mod conv;
pub mod ffi;
pub mod library;

use libc::c_int;
use std::ffi::{CStr, CString};
use std::fmt;

use pamauth_unix_common::encoding::TextEncoding;
use pamauth_unix_common::envelope::CredentialEnvelope;
use zeroize::Zeroizing;

use crate::pam::constants::{PamResultCode, PAM_NO_FLAGS};
use crate::pam::conv::ConvContext;
use crate::pam::ffi::{PamConv, PamHandle};

use tracing::instrument;
use tracing::{debug, error};

/// The libpam entry points a transaction needs.
///
/// Implemented by [`library::PamLibrary`] for the real stack.
pub trait PamApi {
    fn start(
        &self,
        service: &CStr,
        user: &CStr,
        conv: &PamConv,
        pamh: &mut *mut PamHandle,
    ) -> PamResultCode;
    fn authenticate(&self, pamh: *mut PamHandle, flags: c_int) -> PamResultCode;
    fn acct_mgmt(&self, pamh: *mut PamHandle, flags: c_int) -> PamResultCode;
    fn end(&self, pamh: *mut PamHandle, status: PamResultCode) -> PamResultCode;
    fn strerror(&self, pamh: *mut PamHandle, code: PamResultCode) -> Option<String>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionStep {
    Encode,
    Start,
    Authenticate,
    AccountManagement,
}

impl fmt::Display for TransactionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TransactionStep::Encode => "encode",
                TransactionStep::Start => "pam_start",
                TransactionStep::Authenticate => "pam_authenticate",
                TransactionStep::AccountManagement => "pam_acct_mgmt",
            }
        )
    }
}

/// Why a transaction did not succeed. Only used for diagnostics, the
/// result reported to the submitter is a plain pass/fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PamFailure {
    pub step: TransactionStep,
    pub code: PamResultCode,
    pub message: Option<String>,
}

impl fmt::Display for PamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} failed: {} ({})", self.step, self.code, msg),
            None => write!(f, "{} failed: {}", self.step, self.code),
        }
    }
}

/// An open transaction. Ends the handle exactly once, either through
/// [`Transaction::end`] or on drop.
struct Transaction<'a, P: PamApi + ?Sized> {
    api: &'a P,
    pamh: *mut PamHandle,
    ended: bool,
}

impl<'a, P: PamApi + ?Sized> Transaction<'a, P> {
    fn end(mut self, status: PamResultCode) {
        self.ended = true;
        let rc = self.api.end(self.pamh, status);
        if !rc.is_success() {
            debug!(%rc, "pam_end");
        }
    }

    fn failure(&self, step: TransactionStep, code: PamResultCode) -> PamFailure {
        PamFailure {
            step,
            code,
            message: self.api.strerror(self.pamh, code),
        }
    }
}

impl<'a, P: PamApi + ?Sized> Drop for Transaction<'a, P> {
    fn drop(&mut self) {
        if !self.ended {
            self.ended = true;
            let _ = self.api.end(self.pamh, PamResultCode::PAM_ABORT);
        }
    }
}

/// Run one complete transaction with already encoded credentials.
///
/// A failing `pam_start` is ended with its own status; every other path is
/// ended with `PAM_SUCCESS`, which does not influence the returned result.
/// A start failure is an infrastructure fault, but it is reported through
/// the same channel as a rejected password.
pub fn run_transaction<P: PamApi + ?Sized>(
    api: &P,
    service: &CStr,
    user: &CStr,
    password: &CStr,
) -> Result<(), PamFailure> {
    let ctx = ConvContext::new(password);
    let conv = ctx.as_pam_conv();
    let mut pamh: *mut PamHandle = std::ptr::null_mut();

    let rc = api.start(service, user, &conv, &mut pamh);
    let txn = Transaction {
        api,
        pamh,
        ended: false,
    };
    if !rc.is_success() {
        let failure = txn.failure(TransactionStep::Start, rc);
        txn.end(rc);
        return Err(failure);
    }

    let mut result = match api.authenticate(pamh, PAM_NO_FLAGS) {
        PamResultCode::PAM_SUCCESS => Ok(()),
        rc => Err(txn.failure(TransactionStep::Authenticate, rc)),
    };
    if result.is_ok() {
        result = match api.acct_mgmt(pamh, PAM_NO_FLAGS) {
            PamResultCode::PAM_SUCCESS => Ok(()),
            rc => Err(txn.failure(TransactionStep::AccountManagement, rc)),
        };
    }

    txn.end(PamResultCode::PAM_SUCCESS);
    result
}

/// Encode the credentials and run a transaction, reporting the detailed
/// failure.
pub fn try_authenticate_native<P: PamApi + ?Sized>(
    api: &P,
    username: &str,
    password: &str,
    service: &str,
    encoding: &str,
) -> Result<(), PamFailure> {
    let encode_failure = |field: &str, e: &dyn fmt::Display| {
        error!(field, "Unable to encode credentials: {}", e);
        PamFailure {
            step: TransactionStep::Encode,
            code: PamResultCode::PAM_BUF_ERR,
            message: Some(format!("{}: {}", field, e)),
        }
    };

    let encoding: TextEncoding = encoding
        .parse()
        .map_err(|e| encode_failure("encoding", &e))?;
    let c_user: CString = encoding
        .encode_c(username)
        .map_err(|e| encode_failure("username", &e))?;
    let c_password: Zeroizing<CString> = encoding
        .encode_c(password)
        .map(Zeroizing::new)
        .map_err(|e| encode_failure("password", &e))?;
    let c_service: CString = encoding
        .encode_c(service)
        .map_err(|e| encode_failure("service", &e))?;

    run_transaction(api, &c_service, &c_user, &c_password)
}

/// Returns true only if both `pam_authenticate` and `pam_acct_mgmt`
/// accepted the credentials.
#[instrument(skip(api, password))]
pub fn authenticate_native<P: PamApi + ?Sized>(
    api: &P,
    username: &str,
    password: &str,
    service: &str,
    encoding: &str,
) -> bool {
    match try_authenticate_native(api, username, password, service, encoding) {
        Ok(()) => {
            debug!("PamResultCode::PAM_SUCCESS");
            true
        }
        Err(failure) => {
            error!(%failure, "Authentication failed");
            false
        }
    }
}

pub fn authenticate_envelope<P: PamApi + ?Sized>(api: &P, envelope: &CredentialEnvelope) -> bool {
    authenticate_native(
        api,
        &envelope.username,
        &envelope.password,
        &envelope.service,
        &envelope.encoding,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pam::constants::PAM_PROMPT_ECHO_OFF;
    use crate::pam::ffi::{PamMessage, PamResponse};
    use std::cell::{Cell, RefCell};
    use std::ptr;

    /// A PAM stack that accepts one password and records every call.
    struct FakePam {
        accept: &'static str,
        start_rc: PamResultCode,
        acct_rc: PamResultCode,
        appdata: Cell<*mut libc::c_void>,
        calls: RefCell<Vec<String>>,
        ends: RefCell<Vec<PamResultCode>>,
    }

    impl FakePam {
        fn new(accept: &'static str) -> Self {
            FakePam {
                accept,
                start_rc: PamResultCode::PAM_SUCCESS,
                acct_rc: PamResultCode::PAM_SUCCESS,
                appdata: Cell::new(ptr::null_mut()),
                calls: RefCell::new(vec![]),
                ends: RefCell::new(vec![]),
            }
        }

        fn handle(&self) -> *mut PamHandle {
            self as *const FakePam as *mut PamHandle
        }
    }

    impl PamApi for FakePam {
        fn start(
            &self,
            service: &CStr,
            _user: &CStr,
            conv: &PamConv,
            pamh: &mut *mut PamHandle,
        ) -> PamResultCode {
            self.calls.borrow_mut().push("start".to_string());
            if service.to_bytes() == b"nonexistent-service" {
                return PamResultCode::PAM_ABORT;
            }
            *pamh = self.handle();
            assert!(conv.conv.is_some());
            self.appdata.set(conv.appdata_ptr);
            self.start_rc
        }

        fn authenticate(&self, pamh: *mut PamHandle, _flags: c_int) -> PamResultCode {
            assert_eq!(pamh, self.handle());
            self.calls.borrow_mut().push("authenticate".to_string());
            // Ask for the password the way pam_unix does.
            let prompt = CString::new("Password: ").unwrap();
            let message = PamMessage {
                msg_style: PAM_PROMPT_ECHO_OFF,
                msg: prompt.as_ptr(),
            };
            let mut messages = [&message as *const PamMessage];
            let mut out: *mut PamResponse = ptr::null_mut();
            let rc = conv::converse(1, messages.as_mut_ptr(), &mut out, self.appdata.get());
            assert_eq!(rc, 0);
            let answer = unsafe {
                let answer = CStr::from_ptr((*out).resp).to_string_lossy().into_owned();
                libc::free((*out).resp as *mut libc::c_void);
                libc::free(out as *mut libc::c_void);
                answer
            };
            if answer == self.accept {
                PamResultCode::PAM_SUCCESS
            } else {
                PamResultCode::PAM_AUTH_ERR
            }
        }

        fn acct_mgmt(&self, _pamh: *mut PamHandle, _flags: c_int) -> PamResultCode {
            self.calls.borrow_mut().push("acct_mgmt".to_string());
            self.acct_rc
        }

        fn end(&self, _pamh: *mut PamHandle, status: PamResultCode) -> PamResultCode {
            self.calls.borrow_mut().push("end".to_string());
            self.ends.borrow_mut().push(status);
            PamResultCode::PAM_SUCCESS
        }

        fn strerror(&self, _pamh: *mut PamHandle, code: PamResultCode) -> Option<String> {
            Some(format!("{:?}", code))
        }
    }

    #[test]
    fn test_success_ends_once() {
        let pam = FakePam::new("correct-horse");
        assert!(authenticate_native(&pam, "alice", "correct-horse", "login", "utf-8"));
        assert_eq!(
            *pam.calls.borrow(),
            vec!["start", "authenticate", "acct_mgmt", "end"]
        );
        assert_eq!(*pam.ends.borrow(), vec![PamResultCode::PAM_SUCCESS]);
    }

    #[test]
    fn test_wrong_password_skips_account_management() {
        let pam = FakePam::new("correct-horse");
        let failure = try_authenticate_native(&pam, "alice", "short", "login", "utf-8")
            .unwrap_err();
        assert_eq!(failure.step, TransactionStep::Authenticate);
        assert_eq!(failure.code, PamResultCode::PAM_AUTH_ERR);
        assert_eq!(*pam.calls.borrow(), vec!["start", "authenticate", "end"]);
        assert_eq!(*pam.ends.borrow(), vec![PamResultCode::PAM_SUCCESS]);
    }

    #[test]
    fn test_account_failure_still_ends_with_success_status() {
        let mut pam = FakePam::new("correct-horse");
        pam.acct_rc = PamResultCode::PAM_ACCT_EXPIRED;
        assert!(!authenticate_native(&pam, "alice", "correct-horse", "login", "utf-8"));
        assert_eq!(
            *pam.calls.borrow(),
            vec!["start", "authenticate", "acct_mgmt", "end"]
        );
        assert_eq!(*pam.ends.borrow(), vec![PamResultCode::PAM_SUCCESS]);
    }

    #[test]
    fn test_start_failure_ends_with_start_status() {
        let pam = FakePam::new("correct-horse");
        for _ in 0..3 {
            let failure = try_authenticate_native(
                &pam,
                "alice",
                "correct-horse",
                "nonexistent-service",
                "utf-8",
            )
            .unwrap_err();
            assert_eq!(failure.step, TransactionStep::Start);
            assert_eq!(failure.code, PamResultCode::PAM_ABORT);
        }
        // One start and exactly one end per attempt.
        assert_eq!(
            *pam.calls.borrow(),
            vec!["start", "end", "start", "end", "start", "end"]
        );
        assert_eq!(*pam.ends.borrow(), vec![PamResultCode::PAM_ABORT; 3]);
    }

    #[test]
    fn test_encoding_failure_never_starts() {
        let pam = FakePam::new("pässword");
        let failure =
            try_authenticate_native(&pam, "alice", "pässword", "login", "ascii").unwrap_err();
        assert_eq!(failure.step, TransactionStep::Encode);
        assert!(pam.calls.borrow().is_empty());

        assert!(!authenticate_native(&pam, "alice", "pw", "login", "ebcdic"));
        assert!(pam.calls.borrow().is_empty());
    }

    #[test]
    fn test_envelope() {
        let pam = FakePam::new("correct-horse");
        let envelope = CredentialEnvelope::new("alice", "correct-horse", "login", "utf-8");
        assert!(authenticate_envelope(&pam, &envelope));
        let envelope = CredentialEnvelope::new("alice", "short", "login", "utf-8");
        assert!(!authenticate_envelope(&pam, &envelope));
    }
}
