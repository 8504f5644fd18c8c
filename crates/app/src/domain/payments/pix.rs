//! Static PIX payloads.
//!
//! Builds the EMV "copia e cola" string a banking app reads: tag, two-digit
//! length, value, closed by a CRC-16/CCITT-FALSE checksum over everything
//! before it.

use jiff::SignedDuration;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

const GUI: &str = "br.gov.bcb.pix";
const MAX_MERCHANT_NAME: usize = 25;
const MAX_MERCHANT_CITY: usize = 15;
const MAX_REFERENCE: usize = 25;
const MAX_FIELD: usize = 99;

/// Longest PIX key that still fits the merchant account field next to the GUI.
pub const MAX_KEY_LEN: usize = MAX_FIELD - (4 + GUI.len()) - 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixPayloadError {
    #[error("field {id} is {len} bytes, too long for a two-digit length")]
    FieldTooLong { id: &'static str, len: usize },
}

/// Receiving account details and checkout lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixSettings {
    pub key: String,
    pub merchant_name: String,
    pub merchant_city: String,
    pub ttl: SignedDuration,
}

impl Default for PixSettings {
    fn default() -> Self {
        Self {
            key: "pagamentos@fornada.com.br".to_string(),
            merchant_name: "FORNADA".to_string(),
            merchant_city: "SAO PAULO".to_string(),
            ttl: SignedDuration::from_mins(30),
        }
    }
}

/// New alphanumeric transaction id.
#[must_use]
pub fn new_reference() -> String {
    // v7 ids start with the timestamp; the tail carries the randomness.
    let simple = Uuid::now_v7().simple().to_string();
    let tail: String = simple.chars().skip(simple.len() - (MAX_REFERENCE - 3)).collect();

    format!("FRN{}", tail.to_ascii_uppercase())
}

/// Payload for `amount` under `reference`.
///
/// # Errors
///
/// Returns [`PixPayloadError::FieldTooLong`] when a value does not fit its
/// two-digit length, e.g. a key longer than [`MAX_KEY_LEN`].
pub fn payload(
    settings: &PixSettings,
    reference: &str,
    amount: Decimal,
) -> Result<String, PixPayloadError> {
    let account = [field("00", GUI)?, field("01", &settings.key)?].concat();
    let additional = field("05", &truncate(reference, MAX_REFERENCE))?;

    let mut payload = [
        field("00", "01")?,
        field("26", &account)?,
        field("52", "0000")?,
        field("53", "986")?,
        field("54", &format!("{amount:.2}"))?,
        field("58", "BR")?,
        field("59", &truncate(&settings.merchant_name, MAX_MERCHANT_NAME))?,
        field("60", &truncate(&settings.merchant_city, MAX_MERCHANT_CITY))?,
        field("62", &additional)?,
        "6304".to_string(),
    ]
    .concat();

    let checksum = crc16(payload.as_bytes());
    payload.push_str(&format!("{checksum:04X}"));

    Ok(payload)
}

fn field(id: &'static str, value: &str) -> Result<String, PixPayloadError> {
    if value.len() > MAX_FIELD {
        return Err(PixPayloadError::FieldTooLong {
            id,
            len: value.len(),
        });
    }

    Ok(format!("{id}{:02}{value}", value.len()))
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// CRC-16/CCITT-FALSE.
fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF_u16, |crc, byte| {
        (0..8).fold(crc ^ (u16::from(*byte) << 8), |crc, _| {
            if crc & 0x8000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ 0x1021
            }
        })
    })
}
