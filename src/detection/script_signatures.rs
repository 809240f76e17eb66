use super::{ScanMatch, ThreatCategory};
use anyhow::Result;
use regex::Regex;

/// Signature checks for script payloads hidden in attachments. Each check is a
/// presence test over the whole decoded text, so a category scores at most once
/// per part no matter how often it occurs.
pub struct SignatureScanner {
    script_block: Regex,
    powershell_encoded: Regex,
}

const VBSCRIPT_MARKERS: [&str; 2] = ["vbscript", "WScript.Shell"];
const POWERSHELL_BINARY: &str = "powershell.exe";

impl SignatureScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // A script tag that is closed anywhere later on, spanning newlines
            script_block: Regex::new(r"(?is)<script.*?</script>")?,
            // -e, -enc, -EncodedCommand, -^e^n^c ... followed by a base64-ish argument
            powershell_encoded: Regex::new(r"-[Ee^]{1,2}[NnCcOoDdEeMmAa^]* [A-Za-z0-9+/=]{5,}")?,
        })
    }

    pub fn scan(&self, text: &str) -> [ScanMatch; 3] {
        [
            ScanMatch::new(ThreatCategory::ScriptBlock, self.has_script_block(text)),
            ScanMatch::new(ThreatCategory::VBScript, self.has_vbscript(text)),
            ScanMatch::new(
                ThreatCategory::PowerShellEncoded,
                self.has_powershell_encoded(text),
            ),
        ]
    }

    fn has_script_block(&self, text: &str) -> bool {
        self.script_block.is_match(text)
    }

    fn has_vbscript(&self, text: &str) -> bool {
        VBSCRIPT_MARKERS.iter().any(|marker| text.contains(marker))
    }

    fn has_powershell_encoded(&self, text: &str) -> bool {
        self.powershell_encoded.is_match(text) || text.contains(POWERSHELL_BINARY)
    }
}
