use serde::Serialize;
use std::fmt;

/// Content-Transfer-Encoding declared on a MIME part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Base64,
    QuotedPrintable,
    Binary,
    Other(String),
}

impl TransferEncoding {
    /// Parse a `Content-Transfer-Encoding` header value. Unknown mechanisms are kept
    /// as `Other` and are passed through undecoded.
    pub fn from_header(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "" | "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            "binary" => TransferEncoding::Binary,
            _ => TransferEncoding::Other(value),
        }
    }
}

/// One node of a parsed message: either a multipart container or a leaf
/// carrying a payload. Children are kept in the order the parser produced them.
#[derive(Debug, Clone, Default)]
pub struct MessageNode {
    pub content_type: String,
    pub transfer_encoding: TransferEncoding,
    pub payload: Option<Vec<u8>>,
    pub filename: Option<String>,
    pub children: Vec<MessageNode>,
}

impl MessageNode {
    pub fn leaf(content_type: &str, encoding: TransferEncoding, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.to_string(),
            transfer_encoding: encoding,
            payload: Some(payload.into()),
            ..Default::default()
        }
    }

    pub fn container(content_type: &str, children: Vec<MessageNode>) -> Self {
        Self {
            content_type: content_type.to_string(),
            children,
            ..Default::default()
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Position of a node in the tree as 1-based child indices from the root,
/// displayed like an IMAP body section (`1.2`). The root itself is `0`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub struct PartPath(Vec<usize>);

impl PartPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index + 1);
        Self(indices)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for PartPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl From<PartPath> for String {
    fn from(path: PartPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_from_header() {
        assert_eq!(TransferEncoding::from_header("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::from_header(" Quoted-Printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::from_header(""), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::from_header("8bit"), TransferEncoding::EightBit);
        assert_eq!(
            TransferEncoding::from_header("x-uuencode"),
            TransferEncoding::Other("x-uuencode".to_string())
        );
    }

    #[test]
    fn test_part_path_display() {
        let root = PartPath::root();
        assert_eq!(root.to_string(), "0");

        let nested = root.child(0).child(2);
        assert_eq!(nested.to_string(), "1.3");
        assert_eq!(nested.depth(), 2);
    }

    #[test]
    fn test_container_payload_is_empty() {
        let node = MessageNode::container("multipart/mixed", vec![]);
        assert!(node.is_leaf());
        assert!(node.payload().is_empty());
    }
}
