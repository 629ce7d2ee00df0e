//! Capability result types: the size label returned by size estimation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Categorical garment size. The catalog's size table is exactly this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeLabel {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 6] = [
        SizeLabel::Xs,
        SizeLabel::S,
        SizeLabel::M,
        SizeLabel::L,
        SizeLabel::Xl,
        SizeLabel::Xxl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeLabel::Xs => "XS",
            SizeLabel::S => "S",
            SizeLabel::M => "M",
            SizeLabel::L => "L",
            SizeLabel::Xl => "XL",
            SizeLabel::Xxl => "XXL",
        }
    }

    /// Exact token match, case-insensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == upper)
    }

    /// Extract a size from free model output such as `"M"`, `"Size: XL."`
    /// or `"I'd recommend L"`.
    ///
    /// The first standalone size token wins. Longer tokens are tried first
    /// so `XL` is never read as `L`.
    pub fn parse_response(text: &str) -> Option<Self> {
        static TOKEN: OnceLock<Regex> = OnceLock::new();
        let re = TOKEN.get_or_init(|| {
            Regex::new(r"(?i)(?:^|[^\w'])(XXL|XL|XS|S|M|L)\b").expect("size token regex is valid")
        });
        let trimmed = text.trim();
        if let Some(exact) = Self::from_token(trimmed.trim_matches(|c: char| !c.is_alphanumeric())) {
            return Some(exact);
        }
        re.captures(trimmed)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Self::from_token(m.as_str()))
    }

    /// Comma-separated list for prompts: `XS, S, M, L, XL, XXL`.
    pub fn prompt_list() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
