//! Per-message short_message text codecs.
//!
//! SMPP's default alphabet is the 7-bit GSM 03.38 character set; sessions
//! also commonly carry UCS-2 (big-endian UTF-16), Latin-1 and plain ASCII.
//! The encoding and its error policy are chosen per job, and the encoded
//! octets drive both `sm_length` and the PDU `data_coding` field.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// GSM 03.38 basic character set; the octet value is the index.
const GSM_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞ\u{1b}ÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";

/// GSM 03.38 extension table; each character is encoded as ESC (0x1B)
/// followed by the listed octet.
const GSM_EXTENSION: &[(char, u8)] = &[
    ('^', 0x14),
    ('{', 0x28),
    ('}', 0x29),
    ('\\', 0x2F),
    ('[', 0x3C),
    ('~', 0x3D),
    (']', 0x3E),
    ('|', 0x40),
    ('€', 0x65),
];

const GSM_ESCAPE: u8 = 0x1B;
const GSM_REPLACEMENT: u8 = 0x3F; // '?'

static GSM_BASIC_MAP: Lazy<HashMap<char, u8>> = Lazy::new(|| {
    GSM_BASIC
        .chars()
        .enumerate()
        .map(|(i, c)| (c, i as u8))
        .collect()
});

static GSM_EXTENSION_MAP: Lazy<HashMap<char, u8>> =
    Lazy::new(|| GSM_EXTENSION.iter().copied().collect());

static GSM_EXTENSION_REVERSE: Lazy<HashMap<u8, char>> =
    Lazy::new(|| GSM_EXTENSION.iter().map(|&(c, b)| (b, c)).collect());

/// The text encoding applied to a job's short_message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEncoding {
    /// GSM 03.38 7-bit default alphabet (one octet per septet on the wire)
    #[default]
    #[serde(rename = "gsm0338")]
    Gsm0338,
    /// UCS-2, treated as big-endian UTF-16
    #[serde(rename = "ucs2")]
    Ucs2,
    /// ISO-8859-1
    #[serde(rename = "latin1", alias = "latin_1")]
    Latin1,
    /// IA5 / ANSI X3.4
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl MessageEncoding {
    /// The data_coding value declaring this encoding (Section 5.2.19).
    /// UTF-8 has no assigned value; it travels as octet-unspecified.
    pub fn data_coding(&self) -> u8 {
        match self {
            MessageEncoding::Gsm0338 => 0x00,
            MessageEncoding::Ascii => 0x01,
            MessageEncoding::Latin1 => 0x03,
            MessageEncoding::Ucs2 => 0x08,
            MessageEncoding::Utf8 => 0x04,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageEncoding::Gsm0338 => "gsm0338",
            MessageEncoding::Ucs2 => "ucs2",
            MessageEncoding::Latin1 => "latin1",
            MessageEncoding::Ascii => "ascii",
            MessageEncoding::Utf8 => "utf-8",
        }
    }

    /// Encode `text` under this encoding and the given error policy.
    pub fn encode(&self, text: &str, policy: CodecErrorPolicy) -> Result<Vec<u8>, EncodeError> {
        match self {
            MessageEncoding::Gsm0338 => encode_gsm0338(text, policy),
            MessageEncoding::Ucs2 => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            MessageEncoding::Latin1 => encode_latin1(text, policy),
            MessageEncoding::Ascii => encode_ascii(text, policy),
            MessageEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Decode octets under this encoding; unmappable octets follow the
    /// same policy as encoding.
    pub fn decode(&self, octets: &[u8], policy: CodecErrorPolicy) -> Result<String, EncodeError> {
        match self {
            MessageEncoding::Gsm0338 => decode_gsm0338(octets, policy),
            MessageEncoding::Ucs2 => decode_ucs2(octets, policy),
            MessageEncoding::Latin1 => Ok(octets.iter().map(|&b| b as char).collect()),
            MessageEncoding::Ascii => decode_ascii(octets, policy),
            MessageEncoding::Utf8 => match std::str::from_utf8(octets) {
                Ok(s) => Ok(s.to_string()),
                Err(_) => match policy {
                    CodecErrorPolicy::Strict => Err(EncodeError::InvalidOctets {
                        encoding: "utf-8",
                    }),
                    _ => Ok(String::from_utf8_lossy(octets).into_owned()),
                },
            },
        }
    }
}

/// What to do with characters the chosen encoding cannot represent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecErrorPolicy {
    /// Fail the job with a structured error log.
    #[default]
    Strict,
    /// Drop the offending character.
    Ignore,
    /// Substitute '?'.
    Replace,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("character {character:?} at position {position} is not representable in {encoding}")]
    Unencodable {
        character: char,
        position: usize,
        encoding: &'static str,
    },

    #[error("octet sequence is not valid {encoding}")]
    InvalidOctets { encoding: &'static str },
}

fn encode_gsm0338(text: &str, policy: CodecErrorPolicy) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(text.len());
    for (position, c) in text.chars().enumerate() {
        if let Some(&code) = GSM_BASIC_MAP.get(&c) {
            out.push(code);
        } else if let Some(&code) = GSM_EXTENSION_MAP.get(&c) {
            out.push(GSM_ESCAPE);
            out.push(code);
        } else {
            match policy {
                CodecErrorPolicy::Strict => {
                    return Err(EncodeError::Unencodable {
                        character: c,
                        position,
                        encoding: "gsm0338",
                    })
                }
                CodecErrorPolicy::Ignore => {}
                CodecErrorPolicy::Replace => out.push(GSM_REPLACEMENT),
            }
        }
    }
    Ok(out)
}

fn decode_gsm0338(octets: &[u8], policy: CodecErrorPolicy) -> Result<String, EncodeError> {
    let basic: Vec<char> = GSM_BASIC.chars().collect();
    let mut out = String::with_capacity(octets.len());
    let mut iter = octets.iter();
    while let Some(&b) = iter.next() {
        let decoded = if b == GSM_ESCAPE {
            iter.next()
                .and_then(|ext| GSM_EXTENSION_REVERSE.get(ext).copied())
        } else {
            basic.get(b as usize).copied()
        };
        match decoded {
            Some(c) => out.push(c),
            None => match policy {
                CodecErrorPolicy::Strict => {
                    return Err(EncodeError::InvalidOctets {
                        encoding: "gsm0338",
                    })
                }
                CodecErrorPolicy::Ignore => {}
                CodecErrorPolicy::Replace => out.push('?'),
            },
        }
    }
    Ok(out)
}

fn encode_latin1(text: &str, policy: CodecErrorPolicy) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(text.len());
    for (position, c) in text.chars().enumerate() {
        let code = c as u32;
        if code <= 0xFF {
            out.push(code as u8);
        } else {
            match policy {
                CodecErrorPolicy::Strict => {
                    return Err(EncodeError::Unencodable {
                        character: c,
                        position,
                        encoding: "latin1",
                    })
                }
                CodecErrorPolicy::Ignore => {}
                CodecErrorPolicy::Replace => out.push(b'?'),
            }
        }
    }
    Ok(out)
}

fn encode_ascii(text: &str, policy: CodecErrorPolicy) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(text.len());
    for (position, c) in text.chars().enumerate() {
        if c.is_ascii() {
            out.push(c as u8);
        } else {
            match policy {
                CodecErrorPolicy::Strict => {
                    return Err(EncodeError::Unencodable {
                        character: c,
                        position,
                        encoding: "ascii",
                    })
                }
                CodecErrorPolicy::Ignore => {}
                CodecErrorPolicy::Replace => out.push(b'?'),
            }
        }
    }
    Ok(out)
}

fn decode_ascii(octets: &[u8], policy: CodecErrorPolicy) -> Result<String, EncodeError> {
    let mut out = String::with_capacity(octets.len());
    for &b in octets {
        if b.is_ascii() {
            out.push(b as char);
        } else {
            match policy {
                CodecErrorPolicy::Strict => {
                    return Err(EncodeError::InvalidOctets { encoding: "ascii" })
                }
                CodecErrorPolicy::Ignore => {}
                CodecErrorPolicy::Replace => out.push('?'),
            }
        }
    }
    Ok(out)
}

fn decode_ucs2(octets: &[u8], policy: CodecErrorPolicy) -> Result<String, EncodeError> {
    if octets.len() % 2 != 0 && policy == CodecErrorPolicy::Strict {
        return Err(EncodeError::InvalidOctets { encoding: "ucs2" });
    }
    let units: Vec<u16> = octets
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    match String::from_utf16(&units) {
        Ok(s) => Ok(s),
        Err(_) => match policy {
            CodecErrorPolicy::Strict => Err(EncodeError::InvalidOctets { encoding: "ucs2" }),
            _ => Ok(String::from_utf16_lossy(&units)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gsm_basic_charset_is_complete() {
        assert_eq!(GSM_BASIC.chars().count(), 128);
    }

    #[test]
    fn gsm_roundtrip_basic() {
        let text = "Hello @ the SMSC: 100% ok";
        let octets = MessageEncoding::Gsm0338
            .encode(text, CodecErrorPolicy::Strict)
            .unwrap();
        let back = MessageEncoding::Gsm0338
            .decode(&octets, CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(back, text);
    }

    #[test]
    fn gsm_at_sign_is_zero() {
        let octets = MessageEncoding::Gsm0338
            .encode("@", CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(octets, vec![0x00]);
    }

    #[test]
    fn gsm_extension_uses_escape() {
        let octets = MessageEncoding::Gsm0338
            .encode("a€b", CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(octets, vec![0x61, 0x1B, 0x65, 0x62]);

        let back = MessageEncoding::Gsm0338
            .decode(&octets, CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(back, "a€b");
    }

    #[test]
    fn gsm_strict_rejects_unmapped() {
        let result = MessageEncoding::Gsm0338.encode("snowman ☃", CodecErrorPolicy::Strict);
        assert!(matches!(result, Err(EncodeError::Unencodable { .. })));
    }

    #[test]
    fn gsm_replace_and_ignore_policies() {
        let replaced = MessageEncoding::Gsm0338
            .encode("a☃b", CodecErrorPolicy::Replace)
            .unwrap();
        assert_eq!(replaced, vec![0x61, GSM_REPLACEMENT, 0x62]);

        let ignored = MessageEncoding::Gsm0338
            .encode("a☃b", CodecErrorPolicy::Ignore)
            .unwrap();
        assert_eq!(ignored, vec![0x61, 0x62]);
    }

    #[test]
    fn ucs2_is_big_endian_utf16() {
        let octets = MessageEncoding::Ucs2
            .encode("hé", CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(octets, vec![0x00, 0x68, 0x00, 0xE9]);

        let back = MessageEncoding::Ucs2
            .decode(&octets, CodecErrorPolicy::Strict)
            .unwrap();
        assert_eq!(back, "hé");
    }

    #[test]
    fn latin1_strict_rejects_wide_chars() {
        assert_eq!(
            MessageEncoding::Latin1
                .encode("café", CodecErrorPolicy::Strict)
                .unwrap(),
            vec![0x63, 0x61, 0x66, 0xE9]
        );
        assert!(MessageEncoding::Latin1
            .encode("€", CodecErrorPolicy::Strict)
            .is_err());
    }

    #[test]
    fn ascii_policies() {
        assert!(MessageEncoding::Ascii
            .encode("déjà", CodecErrorPolicy::Strict)
            .is_err());
        assert_eq!(
            MessageEncoding::Ascii
                .encode("déjà", CodecErrorPolicy::Replace)
                .unwrap(),
            b"d?j?".to_vec()
        );
    }

    #[test]
    fn data_coding_values() {
        assert_eq!(MessageEncoding::Gsm0338.data_coding(), 0x00);
        assert_eq!(MessageEncoding::Ascii.data_coding(), 0x01);
        assert_eq!(MessageEncoding::Latin1.data_coding(), 0x03);
        assert_eq!(MessageEncoding::Ucs2.data_coding(), 0x08);
    }

    #[test]
    fn encoding_names_deserialize() {
        let enc: MessageEncoding = serde_json::from_str("\"gsm0338\"").unwrap();
        assert_eq!(enc, MessageEncoding::Gsm0338);
        let enc: MessageEncoding = serde_json::from_str("\"utf-8\"").unwrap();
        assert_eq!(enc, MessageEncoding::Utf8);
        let policy: CodecErrorPolicy = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(policy, CodecErrorPolicy::Replace);
    }
}
