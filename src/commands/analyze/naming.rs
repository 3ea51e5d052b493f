use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub deck: String,
    /// Human-readable label, `_` shown as spaces.
    pub label: String,
}

/// Column naming convention: `<deck><sep><label>[.T]`, where the separator
/// is a run of whitespace or underscores and `.T` is an optional
/// temperature-channel suffix.
pub struct NamingConvention {
    pattern: Regex,
}

impl NamingConvention {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"^(?P<deck>[^\s_.]+)(?:[\s_]+(?P<label>.*?))?(?:\.T)?$")
            .context("failed to compile component naming regex")?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, header: &str) -> ParsedName {
        let trimmed = header.trim();

        let Some(captures) = self.pattern.captures(trimmed) else {
            return ParsedName {
                deck: trimmed.to_string(),
                label: trimmed.to_string(),
            };
        };

        let deck = captures
            .name("deck")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| trimmed.to_string());
        let label = captures
            .name("label")
            .map(|m| humanize(m.as_str()))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| deck.clone());

        ParsedName { deck, label }
    }
}

fn humanize(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(header: &str) -> ParsedName {
        NamingConvention::new().unwrap().parse(header)
    }

    #[test]
    fn splits_space_delimited_headers() {
        let name = parse("VD01 FOG");
        assert_eq!(name.deck, "VD01");
        assert_eq!(name.label, "FOG");
    }

    #[test]
    fn splits_underscore_headers_and_strips_channel_suffix() {
        let name = parse("VD02_Star_Tracker_Head.T");
        assert_eq!(name.deck, "VD02");
        assert_eq!(name.label, "Star Tracker Head");
    }

    #[test]
    fn keeps_multi_word_labels_and_trims_padding() {
        let name = parse("  PANEL_X   Solar  Array  ");
        assert_eq!(name.deck, "PANEL");
        assert_eq!(name.label, "X Solar Array");
    }

    #[test]
    fn undelimited_header_is_its_own_deck() {
        let name = parse("RADIATOR.T");
        assert_eq!(name.deck, "RADIATOR");
        assert_eq!(name.label, "RADIATOR");
    }

    #[test]
    fn unconventional_header_falls_back_to_whole_name() {
        let name = parse("1.5V.REG");
        assert_eq!(name.deck, "1.5V.REG");
        assert_eq!(name.label, "1.5V.REG");
    }
}
