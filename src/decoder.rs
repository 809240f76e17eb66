use crate::message::{MessageNode, TransferEncoding};
use anyhow::Result;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

// Padding may be missing or present, and leftover bits are ignored, the way
// lenient mail clients decode attachments.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Turns a part's transfer-encoded payload into text the signatures can run on.
pub trait PartDecoder: Send + Sync {
    fn decode(&self, node: &MessageNode) -> Result<String>;
}

/// Reverses base64 and quoted-printable. Anything that fails to decode is handed
/// back as the raw payload, since hostile attachments are often malformed on
/// purpose and the raw bytes may still carry a signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransferDecoder;

impl TransferDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_bytes(encoding: &TransferEncoding, payload: &[u8]) -> String {
        match encoding {
            TransferEncoding::Base64 => match decode_base64(payload) {
                Ok((decoded, false)) => String::from_utf8_lossy(&decoded).into_owned(),
                Ok((decoded, true)) => {
                    // Junk around the encoded data may carry the payload itself
                    log::debug!("Base64 payload contains non-alphabet bytes, scanning both forms");
                    let mut text = String::from_utf8_lossy(&decoded).into_owned();
                    text.push('\n');
                    text.push_str(&String::from_utf8_lossy(payload));
                    text
                }
                Err(e) => {
                    log::debug!("Malformed base64 payload, scanning raw bytes: {}", e);
                    String::from_utf8_lossy(payload).into_owned()
                }
            },
            TransferEncoding::QuotedPrintable => {
                match quoted_printable::decode(payload, quoted_printable::ParseMode::Robust) {
                    Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
                    Err(e) => {
                        log::debug!(
                            "Malformed quoted-printable payload, scanning raw bytes: {}",
                            e
                        );
                        String::from_utf8_lossy(payload).into_owned()
                    }
                }
            }
            TransferEncoding::SevenBit
            | TransferEncoding::EightBit
            | TransferEncoding::Binary
            | TransferEncoding::Other(_) => String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

impl PartDecoder for TransferDecoder {
    fn decode(&self, node: &MessageNode) -> Result<String> {
        Ok(Self::decode_bytes(&node.transfer_encoding, node.payload()))
    }
}

/// Decode whatever base64 alphabet is in `payload`. Line breaks, padding and
/// stray bytes are skipped; the flag reports whether any stray bytes were seen.
fn decode_base64(payload: &[u8]) -> std::result::Result<(Vec<u8>, bool), base64::DecodeError> {
    let mut compact = Vec::with_capacity(payload.len());
    let mut stray = false;
    for &b in payload {
        if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' {
            compact.push(b);
        } else if b != b'=' && !b.is_ascii_whitespace() {
            stray = true;
        }
    }
    // A single trailing symbol holds less than one byte
    if compact.len() % 4 == 1 {
        compact.pop();
    }
    let decoded = LENIENT_BASE64.decode(compact)?;
    Ok((decoded, stray))
}
