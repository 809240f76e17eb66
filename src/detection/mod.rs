pub mod script_signatures;

use serde::Serialize;
use std::fmt;

/// Threat families recognised in decoded attachment text, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreatCategory {
    ScriptBlock,
    VBScript,
    PowerShellEncoded,
}

impl ThreatCategory {
    /// Fixed score contributed once per part when the category matches.
    pub fn weight(self) -> f64 {
        match self {
            ThreatCategory::ScriptBlock => 8.00,
            ThreatCategory::VBScript => 8.33,
            ThreatCategory::PowerShellEncoded => 8.66,
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreatCategory::ScriptBlock => "ScriptBlock",
            ThreatCategory::VBScript => "VBScript",
            ThreatCategory::PowerShellEncoded => "PowerShellEncoded",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanMatch {
    pub category: ThreatCategory,
    pub weight: f64,
    pub matched: bool,
}

impl ScanMatch {
    pub fn new(category: ThreatCategory, matched: bool) -> Self {
        Self {
            category,
            weight: category.weight(),
            matched,
        }
    }

    pub fn score(&self) -> f64 {
        if self.matched {
            self.weight
        } else {
            0.0
        }
    }
}

/// Sum of the weights of every matched category.
pub fn total_score(matches: &[ScanMatch]) -> f64 {
    matches.iter().map(ScanMatch::score).sum()
}

pub fn matched_categories(matches: &[ScanMatch]) -> Vec<ThreatCategory> {
    matches
        .iter()
        .filter(|m| m.matched)
        .map(|m| m.category)
        .collect()
}
