//! OpenPGP ASCII armor (RFC 4880 §6).
//!
//! ```text
//! -----BEGIN PGP PUBLIC KEY BLOCK-----
//! Comment: optional headers
//!
//! <base64 body, wrapped>
//! =<base64 CRC-24>
//! -----END PGP PUBLIC KEY BLOCK-----
//! ```
//!
//! The checksum line is optional on input. When present it must match.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{CryptoError, Result};

/// Block kind of an armored public key.
pub const PUBLIC_KEY_BLOCK: &str = "PUBLIC KEY BLOCK";

/// Block kind of an armored encrypted message.
pub const MESSAGE_BLOCK: &str = "MESSAGE";

const BEGIN_PREFIX: &str = "-----BEGIN PGP ";
const END_PREFIX: &str = "-----END PGP ";
const DASHES: &str = "-----";

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Body line width used by [`encode`].
const LINE_WIDTH: usize = 64;

/// OpenPGP packet tag of a public key.
const TAG_PUBLIC_KEY: u8 = 6;

/// A decoded armor block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArmorBlock {
    /// Text between `BEGIN PGP ` and the trailing dashes, e.g. `PUBLIC KEY BLOCK`.
    pub kind: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// CRC-24 as used by OpenPGP armor.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Decode the first armor block found in `text`.
///
/// Text before the BEGIN line is ignored. Headers run until the first blank
/// line; a body line that does not look like `Key: value` also ends them.
pub fn decode(text: &str) -> Result<ArmorBlock> {
    let mut lines = text.lines().map(str::trim_end);

    let kind = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix(BEGIN_PREFIX)
                .and_then(|rest| rest.strip_suffix(DASHES))
        })
        .ok_or_else(|| CryptoError::InvalidArmor("missing BEGIN line".into()))?
        .to_string();
    if kind.is_empty() {
        return Err(CryptoError::InvalidArmor("empty block kind".into()));
    }

    let mut headers = Vec::new();
    let mut body_text = String::new();
    let mut checksum: Option<&str> = None;
    let mut in_headers = true;
    let mut closed = false;

    for line in lines {
        if let Some(end) = line.strip_prefix(END_PREFIX) {
            if end.strip_suffix(DASHES) != Some(kind.as_str()) {
                return Err(CryptoError::InvalidArmor(format!(
                    "END line does not close {kind}"
                )));
            }
            closed = true;
            break;
        }
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            if let Some((key, value)) = line.split_once(": ") {
                headers.push((key.to_string(), value.to_string()));
                continue;
            }
            in_headers = false;
        }
        if let Some(sum) = line.strip_prefix('=') {
            checksum = Some(sum);
        } else if checksum.is_some() {
            return Err(CryptoError::InvalidArmor("data after checksum".into()));
        } else {
            body_text.push_str(line.trim());
        }
    }

    if !closed {
        return Err(CryptoError::InvalidArmor("missing END line".into()));
    }

    let body = STANDARD
        .decode(body_text.as_bytes())
        .map_err(|e| CryptoError::InvalidArmor(format!("body: {e}")))?;
    if body.is_empty() {
        return Err(CryptoError::InvalidArmor("empty body".into()));
    }

    if let Some(sum) = checksum {
        let bytes = STANDARD
            .decode(sum.trim())
            .map_err(|e| CryptoError::InvalidArmor(format!("checksum: {e}")))?;
        if bytes.len() != 3 {
            return Err(CryptoError::InvalidArmor("checksum must be 3 bytes".into()));
        }
        let expected = u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]);
        let actual = crc24(&body);
        if expected != actual {
            return Err(CryptoError::ChecksumMismatch { expected, actual });
        }
    }

    Ok(ArmorBlock {
        kind,
        headers,
        body,
    })
}

/// Tag of the first OpenPGP packet in `data`, old or new header format.
pub fn first_packet_tag(data: &[u8]) -> Option<u8> {
    let header = *data.first()?;
    if header & 0x80 == 0 {
        return None;
    }
    if header & 0x40 != 0 {
        Some(header & 0x3F)
    } else {
        Some((header >> 2) & 0x0F)
    }
}

/// Accept `text` only if it is an armored public key.
///
/// Used before storing any uploaded, fetched or discovered key.
pub fn validate_public_key(text: &str) -> Result<ArmorBlock> {
    let block = decode(text)?;
    if block.kind != PUBLIC_KEY_BLOCK {
        return Err(CryptoError::WrongBlockKind {
            expected: PUBLIC_KEY_BLOCK.into(),
            found: block.kind,
        });
    }
    if first_packet_tag(&block.body) != Some(TAG_PUBLIC_KEY) {
        return Err(CryptoError::InvalidArmor(
            "body does not start with a public key packet".into(),
        ));
    }
    Ok(block)
}

/// Armor `data` as a `kind` block.
pub fn encode(kind: &str, headers: &[(&str, &str)], data: &[u8]) -> String {
    let mut out = format!("{BEGIN_PREFIX}{kind}{DASHES}\n");
    for (key, value) in headers {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');

    let encoded = STANDARD.encode(data);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }

    let crc = crc24(data);
    let crc_bytes = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
    out.push('=');
    out.push_str(&STANDARD.encode(crc_bytes));
    out.push('\n');
    out.push_str(&format!("{END_PREFIX}{kind}{DASHES}\n"));
    out
}
