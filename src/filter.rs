use crate::decoder::{PartDecoder, TransferDecoder};
use crate::detection::script_signatures::SignatureScanner;
use crate::detection::{matched_categories, total_score, ThreatCategory};
use crate::matcher::{OctetStreamMatcher, PartPredicate};
use crate::message::{MessageNode, PartPath};
use crate::search::{find_parts, SearchOptions};
use serde::{Deserialize, Serialize};

/// How scores from several suspicious parts combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitPolicy {
    /// Stop at the first part that scores; later parts are never examined.
    #[default]
    FirstMatch,
    /// Examine every candidate and add up all part scores.
    Cumulative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub score: f64,
    pub hit: bool,
    /// Part that produced the first hit.
    pub triggering_part: Option<PartPath>,
    /// Declared filename of the triggering part, if any.
    pub triggering_filename: Option<String>,
    /// Categories matched on the triggering part.
    pub categories: Vec<ThreatCategory>,
    pub candidates_found: usize,
    pub candidates_examined: usize,
}

impl ScanResult {
    fn exhausted(candidates_found: usize, candidates_examined: usize) -> Self {
        Self {
            score: 0.0,
            hit: false,
            triggering_part: None,
            triggering_filename: None,
            categories: Vec::new(),
            candidates_found,
            candidates_examined,
        }
    }
}

/// Ties the part search, transfer decoding and signature scan together. Built
/// once and shared; every `evaluate` call works only on the tree it is given.
pub struct ScanOrchestrator {
    predicate: Box<dyn PartPredicate>,
    decoder: Box<dyn PartDecoder>,
    scanner: SignatureScanner,
    search: SearchOptions,
    policy: HitPolicy,
}

impl ScanOrchestrator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_parts(
            Box::new(OctetStreamMatcher::new()),
            Box::new(TransferDecoder::new()),
            SignatureScanner::new()?,
        ))
    }

    pub fn with_parts(
        predicate: Box<dyn PartPredicate>,
        decoder: Box<dyn PartDecoder>,
        scanner: SignatureScanner,
    ) -> Self {
        Self {
            predicate,
            decoder,
            scanner,
            search: SearchOptions::default(),
            policy: HitPolicy::default(),
        }
    }

    pub fn with_search_options(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    pub fn with_policy(mut self, policy: HitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn evaluate(&self, root: &MessageNode) -> ScanResult {
        let candidates = find_parts(root, self.predicate.as_ref(), self.search);
        log::debug!("Found {} octet-stream candidate part(s)", candidates.len());

        let mut result = ScanResult::exhausted(candidates.len(), 0);

        for candidate in &candidates {
            result.candidates_examined += 1;

            let text = match self.decoder.decode(candidate.node) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Failed to decode part {}: {}", candidate.path, e);
                    continue;
                }
            };

            let matches = self.scanner.scan(&text);
            let part_score = total_score(&matches);
            if part_score <= 0.0 {
                log::debug!("Part {} is clean", candidate.path);
                continue;
            }

            let categories = matched_categories(&matches);
            log::info!(
                "Embedded script in part {} ({}): score {:.2}",
                candidate.path,
                categories
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                part_score
            );

            result.score += part_score;
            result.hit = true;
            if result.triggering_part.is_none() {
                result.triggering_part = Some(candidate.path.clone());
                result.triggering_filename = candidate.node.filename.clone();
                result.categories = categories;
            }

            if self.policy == HitPolicy::FirstMatch {
                break;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TransferEncoding;
    use anyhow::anyhow;

    fn octet(payload: &str) -> MessageNode {
        MessageNode::leaf("application/octet-stream", TransferEncoding::SevenBit, payload)
    }

    fn engine() -> ScanOrchestrator {
        ScanOrchestrator::new().unwrap()
    }

    #[test]
    fn test_no_octet_parts() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![
                MessageNode::leaf("text/html", TransferEncoding::SevenBit, "<script>x()</script>"),
                MessageNode::leaf("text/plain", TransferEncoding::SevenBit, "vbscript"),
            ],
        );
        let result = engine().evaluate(&root);
        assert!(!result.hit);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.candidates_found, 0);
        assert_eq!(result.candidates_examined, 0);
        assert_eq!(result.triggering_part, None);
    }

    #[test]
    fn test_nested_script_block() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![MessageNode::container(
                "multipart/mixed",
                vec![octet("<script>evil()</script>").with_filename("report.hta")],
            )],
        );
        let result = engine().evaluate(&root);
        assert!(result.hit);
        assert_eq!(result.score, 8.00);
        assert_eq!(result.triggering_part.unwrap().to_string(), "1.1");
        assert_eq!(result.triggering_filename.as_deref(), Some("report.hta"));
        assert_eq!(result.categories, vec![ThreatCategory::ScriptBlock]);
        assert_eq!(result.candidates_examined, 1);
    }

    #[test]
    fn test_script_block_with_vbscript() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![octet("<script language=\"vbscript\">MsgBox 1</script>")],
        );
        let result = engine().evaluate(&root);
        assert!(result.hit);
        assert!((result.score - 16.33).abs() < 1e-9);
    }

    #[test]
    fn test_first_match_wins() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![
                octet("<script>a()</script>"),
                octet("powershell.exe -enc SQBFAFgA vbscript"),
            ],
        );
        let result = engine().evaluate(&root);
        assert!(result.hit);
        assert_eq!(result.score, 8.00);
        assert_eq!(result.triggering_part.unwrap().to_string(), "1");
        assert_eq!(result.candidates_found, 2);
        assert_eq!(result.candidates_examined, 1);
    }

    #[test]
    fn test_clean_candidates_are_all_examined() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![octet("MZ\u{0}\u{0}"), octet("PK\u{3}\u{4}"), octet("%PDF-1.4")],
        );
        let result = engine().evaluate(&root);
        assert_eq!(result, ScanResult::exhausted(3, 3));
    }

    #[test]
    fn test_cumulative_policy_sums_every_part() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![octet("clean"), octet("<script>a()</script>"), octet("WScript.Shell")],
        );
        let result = engine().with_policy(HitPolicy::Cumulative).evaluate(&root);
        assert!(result.hit);
        assert!((result.score - 16.33).abs() < 1e-9);
        assert_eq!(result.triggering_part.unwrap().to_string(), "2");
        assert_eq!(result.categories, vec![ThreatCategory::ScriptBlock]);
        assert_eq!(result.candidates_examined, 3);
    }

    #[test]
    fn test_corrupted_base64_still_scanned() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![MessageNode::leaf(
                "application/octet-stream",
                TransferEncoding::Base64,
                "@@@ Set o = CreateObject(\"WScript.Shell\") @@@",
            )],
        );
        let result = engine().evaluate(&root);
        assert!(result.hit);
        assert_eq!(result.categories, vec![ThreatCategory::VBScript]);
    }

    #[test]
    fn test_unpadded_base64_is_scored() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![MessageNode::leaf(
                "application/octet-stream",
                TransferEncoding::Base64,
                "PHNjcmlwdD5ldmlsKCk8L3NjcmlwdD4",
            )],
        );
        let result = engine().evaluate(&root);
        assert!(result.hit);
        assert_eq!(result.score, 8.00);
    }

    struct FailingOnMarker;

    impl PartDecoder for FailingOnMarker {
        fn decode(&self, node: &MessageNode) -> anyhow::Result<String> {
            if node.payload().starts_with(b"FAIL") {
                return Err(anyhow!("decoder rejected part"));
            }
            TransferDecoder::new().decode(node)
        }
    }

    #[test]
    fn test_decoder_failure_skips_only_that_part() {
        let engine = ScanOrchestrator::with_parts(
            Box::new(OctetStreamMatcher::new()),
            Box::new(FailingOnMarker),
            SignatureScanner::new().unwrap(),
        );
        let root = MessageNode::container(
            "multipart/mixed",
            vec![octet("FAIL <script>a()</script>"), octet("powershell.exe")],
        );
        let result = engine.evaluate(&root);
        assert!(result.hit);
        assert_eq!(result.score, 8.66);
        assert_eq!(result.triggering_part.unwrap().to_string(), "2");
        assert_eq!(result.candidates_examined, 2);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let root = MessageNode::container(
            "multipart/mixed",
            vec![octet("nothing"), octet("-EncodedCommand SQBFAFgA")],
        );
        let engine = engine();
        let first = engine.evaluate(&root);
        let second = engine.evaluate(&root);
        assert_eq!(first, second);
    }

    #[test]
    fn test_deeply_nested_script_is_scored() {
        let mut node = octet("<script>x</script>");
        for _ in 0..70 {
            node = MessageNode::container("multipart/mixed", vec![node]);
        }
        let result = engine().evaluate(&node);
        assert!(result.hit);
        assert_eq!(result.score, 8.00);
        assert_eq!(result.triggering_part.unwrap().depth(), 70);
    }
}
