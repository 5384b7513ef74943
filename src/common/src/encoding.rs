/*
   PAM password authentication backend
   Copyright (C) The pamauth contributors 2026

   This program is free software; you can redistribute it and/or modify
   it under the terms of the GNU General Public License as published by
   the Free Software Foundation; either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU General Public License
   along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
//! Text encodings the worker can apply to the credential fields before they
//! are handed to PAM.
use std::env;
use std::ffi::CString;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::DEFAULT_ENCODING;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Ascii,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("unknown text encoding '{0}'")]
    Unknown(String),
    #[error("character U+{:04X} cannot be represented in {encoding}", codepoint(.ch))]
    Unrepresentable { encoding: TextEncoding, ch: char },
    #[error("value contains an interior NUL byte")]
    InteriorNul,
}

fn codepoint(ch: &char) -> u32 {
    u32::from(*ch)
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TextEncoding::Utf8 => "utf-8",
                TextEncoding::Ascii => "ascii",
                TextEncoding::Latin1 => "latin-1",
            }
        )
    }
}

impl FromStr for TextEncoding {
    type Err = EncodingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" | "ansi-x3.4-1968" => Ok(TextEncoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Latin1),
            _ => Err(EncodingError::Unknown(name.to_string())),
        }
    }
}

impl TextEncoding {
    pub fn encode(self, value: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            TextEncoding::Utf8 => Ok(value.as_bytes().to_vec()),
            TextEncoding::Ascii => value
                .chars()
                .map(|ch| {
                    if ch.is_ascii() {
                        Ok(ch as u8)
                    } else {
                        Err(EncodingError::Unrepresentable { encoding: self, ch })
                    }
                })
                .collect(),
            TextEncoding::Latin1 => value
                .chars()
                .map(|ch| {
                    u8::try_from(u32::from(ch))
                        .map_err(|_| EncodingError::Unrepresentable { encoding: self, ch })
                })
                .collect(),
        }
    }

    /// Encode into a NUL terminated string suitable for the PAM API.
    ///
    /// Intermediate buffers are wiped, so the only copy left behind is the
    /// returned string. Callers holding a password wrap it in `Zeroizing`.
    pub fn encode_c(self, value: &str) -> Result<CString, EncodingError> {
        let encoded = Zeroizing::new(self.encode(value)?);
        // Room for the terminator, so CString::new never reallocates.
        let mut bytes = Vec::with_capacity(encoded.len() + 1);
        bytes.extend_from_slice(&encoded);
        CString::new(bytes).map_err(|e| {
            e.into_vec().zeroize();
            EncodingError::InteriorNul
        })
    }
}

/// Extract the codeset from a locale name such as `en_US.UTF-8@euro`.
pub fn codeset_from_locale(locale: &str) -> Option<&str> {
    let (_, rest) = locale.split_once('.')?;
    let codeset = match rest.split_once('@') {
        Some((codeset, _)) => codeset,
        None => rest,
    };
    if codeset.is_empty() {
        None
    } else {
        Some(codeset)
    }
}

/// The encoding named by the process locale, falling back to utf-8 when the
/// locale carries no codeset or names one we cannot encode.
pub fn system_encoding() -> String {
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|val| !val.is_empty());

    locale
        .as_deref()
        .and_then(codeset_from_locale)
        .and_then(|codeset| codeset.parse::<TextEncoding>().ok())
        .map(|enc| enc.to_string())
        .unwrap_or_else(|| DEFAULT_ENCODING.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoding_names() {
        assert_eq!("UTF-8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("utf8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("ISO-8859-1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert_eq!("latin_1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert_eq!("US-ASCII".parse::<TextEncoding>(), Ok(TextEncoding::Ascii));
        assert!(matches!(
            "koi8-r".parse::<TextEncoding>(),
            Err(EncodingError::Unknown(_))
        ));
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            TextEncoding::Utf8.encode("pässword").unwrap(),
            "pässword".as_bytes()
        );
        assert_eq!(
            TextEncoding::Latin1.encode("pässword").unwrap(),
            vec![b'p', 0xe4, b's', b's', b'w', b'o', b'r', b'd']
        );
        assert!(matches!(
            TextEncoding::Ascii.encode("pässword"),
            Err(EncodingError::Unrepresentable { ch: 'ä', .. })
        ));
        assert!(TextEncoding::Latin1.encode("snow☃").is_err());
    }

    #[test]
    fn test_encode_c_rejects_nul() {
        assert_eq!(
            TextEncoding::Utf8.encode_c("alice\0root"),
            Err(EncodingError::InteriorNul)
        );
        assert_eq!(
            TextEncoding::Utf8.encode_c("alice").unwrap().as_bytes(),
            b"alice"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = TextEncoding::Latin1.encode("snow☃").unwrap_err();
        assert_eq!(
            err.to_string(),
            "character U+2603 cannot be represented in latin-1"
        );
        assert_eq!(
            "ebcdic".parse::<TextEncoding>().unwrap_err().to_string(),
            "unknown text encoding 'ebcdic'"
        );
    }

    #[test]
    fn test_encoded_password_can_be_wiped() {
        let mut secret = Zeroizing::new(TextEncoding::Latin1.encode_c("pässword").unwrap());
        assert_eq!(secret.as_bytes(), b"p\xe4ssword");
        secret.zeroize();
        assert!(secret.as_bytes().is_empty());
    }

    #[test]
    fn test_codeset_from_locale() {
        assert_eq!(codeset_from_locale("en_US.UTF-8"), Some("UTF-8"));
        assert_eq!(codeset_from_locale("de_DE.ISO-8859-1@euro"), Some("ISO-8859-1"));
        assert_eq!(codeset_from_locale("C"), None);
        assert_eq!(codeset_from_locale("POSIX"), None);
    }
}
