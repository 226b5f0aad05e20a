//! Credential detection for inbox files.

use regex::Regex;

use crate::error::{Result, StewardError};

const PATTERNS: [(&str, &str); 5] = [
    ("api key assignment", r"(?i)(api[_-]?key|apikey)\s*[:=]\s*\S+"),
    ("secret/token/password assignment", r"(?i)(secret|token|password|passwd|pwd)\s*[:=]\s*\S+"),
    ("sk- style key", r"sk-[a-zA-Z0-9]{20,}"),
    ("GitHub personal token", r"ghp_[a-zA-Z0-9]{36}"),
    ("bearer token", r"(?i)bearer\s+[a-zA-Z0-9\-._~+/]+=*"),
];

pub struct SecretScanner {
    patterns: Vec<(&'static str, Regex)>,
}

impl SecretScanner {
    pub fn new() -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(label, pattern)| {
                Regex::new(pattern)
                    .map(|re| (*label, re))
                    .map_err(|e| StewardError::Config(format!("Bad secret pattern {}: {}", label, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Labels of every pattern that matched; empty when the content is clean
    pub fn scan(&self, content: &str) -> Vec<&'static str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(content))
            .map(|(label, _)| *label)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> Vec<&'static str> {
        SecretScanner::new().unwrap().scan(content)
    }

    #[test]
    fn test_clean_content() {
        assert!(scan("Please summarise the quarterly numbers.").is_empty());
    }

    #[test]
    fn test_detects_assignments() {
        assert_eq!(scan("API_KEY = abc123"), vec!["api key assignment"]);
        assert_eq!(scan("password: hunter2"), vec!["secret/token/password assignment"]);
    }

    #[test]
    fn test_detects_token_shapes() {
        assert!(scan("use sk-abcdefghijklmnopqrstuvwxyz").contains(&"sk- style key"));
        let ghp = format!("ghp_{}", "a".repeat(36));
        assert!(scan(&ghp).contains(&"GitHub personal token"));
        assert!(scan("Authorization: Bearer eyJhbGciOi.x").contains(&"bearer token"));
    }
}
