//! Ini-style configuration files.
//!
//! The format is `[section]` headers over `key = value` lines; `#` and
//! `;` start comment lines. Lookups are keyed by section and entry.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Parsed configuration file contents.
pub struct ConfigFile {
    content: HashMap<String, String>,
}

fn trim(source: &str) -> &str {
    source.trim_matches([' ', '\t', '\r', '\n'])
}

impl ConfigFile {
    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Self {
        let mut content = HashMap::new();
        let mut section = String::new();
        for line in text.lines() {
            let line = trim(line);
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let end = rest.find(']').unwrap_or(rest.len());
                section = trim(&rest[..end]).to_string();
                continue;
            }
            if let Some((name, value)) = line.split_once('=') {
                content.insert(format!("{section}/{}", trim(name)), trim(value).to_string());
            }
        }
        Self { content }
    }

    /// Looks up the value of `entry` inside `section`.
    pub fn value(&self, section: &str, entry: &str) -> Result<&str> {
        self.content
            .get(&format!("{section}/{entry}"))
            .map(String::as_str)
            .ok_or_else(|| {
                Error::Contract(format!("config entry [{section}] {entry} does not exist"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# global settings
[network]
address = 127.0.0.1
port    = 9000
; legacy comment style
[fxp]
fracbits = 40
";

    #[test]
    fn test_sections_and_trimming() {
        let config = ConfigFile::parse(SAMPLE);
        assert_eq!(config.value("network", "address").unwrap(), "127.0.0.1");
        assert_eq!(config.value("network", "port").unwrap(), "9000");
        assert_eq!(config.value("fxp", "fracbits").unwrap(), "40");
    }

    #[test]
    fn test_missing_entry_is_contract_error() {
        let config = ConfigFile::parse(SAMPLE);
        assert!(matches!(
            config.value("network", "missing"),
            Err(Error::Contract(_))
        ));
        assert!(config.value("nosection", "port").is_err());
    }

    #[test]
    fn test_comments_ignored() {
        let config = ConfigFile::parse("# a = 1\n; b = 2\n[s]\nc = 3\n");
        assert!(config.value("", "a").is_err());
        assert_eq!(config.value("s", "c").unwrap(), "3");
    }
}
