use crate::message::{MessageNode, TransferEncoding};
use anyhow::{Context, Result};
use mailparse::body::Body;
use mailparse::{MailHeaderMap, ParsedMail};

impl MessageNode {
    /// Parse a raw RFC 2822 message into a node tree. Leaf payloads keep their
    /// transfer encoding; decoding is left to the scanner.
    pub fn parse(raw: &[u8]) -> Result<MessageNode> {
        let parsed = mailparse::parse_mail(raw).context("Failed to parse MIME structure")?;
        Ok(convert(&parsed))
    }
}

fn convert(part: &ParsedMail) -> MessageNode {
    // The raw header is used instead of `ctype`, which defaults a missing header to text/plain
    let content_type = part
        .headers
        .get_first_value("Content-Type")
        .unwrap_or_default();
    let transfer_encoding = part
        .headers
        .get_first_value("Content-Transfer-Encoding")
        .map(|value| TransferEncoding::from_header(&value))
        .unwrap_or_default();

    let children: Vec<MessageNode> = part.subparts.iter().map(convert).collect();
    let payload = if children.is_empty() {
        Some(encoded_body(part))
    } else {
        None
    };

    MessageNode {
        content_type,
        transfer_encoding,
        payload,
        filename: filename(part),
        children,
    }
}

fn encoded_body(part: &ParsedMail) -> Vec<u8> {
    match part.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

fn filename(part: &ParsedMail) -> Option<String> {
    let disposition = part.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
}
