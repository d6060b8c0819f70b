//! Template parser: validates a chat message against the configured
//! template and extracts the traded pair from the exchange link.

use thiserror::Error;
use url::Url;

use crate::config::ParserConfig;
use crate::model::{InboundMessage, ParsedSignal};

const LINK_TRIM: &[char] = &[' ', '\t', '\n', '\r', ',', '.', ';', '!'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty message body")]
    EmptyMessage,
    #[error("required template token missing: {0}")]
    MissingTemplateToken(String),
    #[error("signal link missing")]
    LinkMissing,
    #[error("unable to resolve symbol from link")]
    SymbolUnresolvable,
    #[error("invalid pair separator")]
    InvalidSeparatorConfig,
    #[error("pair does not contain separator {separator:?}: {pair}")]
    SeparatorNotFound { separator: String, pair: String },
}

impl ParseError {
    /// Stable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::EmptyMessage => "empty_message",
            ParseError::MissingTemplateToken(_) => "missing_template_token",
            ParseError::LinkMissing => "link_missing",
            ParseError::SymbolUnresolvable => "symbol_unresolvable",
            ParseError::InvalidSeparatorConfig => "invalid_separator_config",
            ParseError::SeparatorNotFound { .. } => "separator_not_found",
        }
    }
}

/// Stateless; safe to share across tasks without locking.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    rule: ParserConfig,
}

impl TemplateParser {
    pub fn new(rule: ParserConfig) -> Self {
        Self { rule }
    }

    pub fn parse(&self, message: &InboundMessage) -> Result<ParsedSignal, ParseError> {
        let text = message.text.trim();
        if text.is_empty() {
            return Err(ParseError::EmptyMessage);
        }

        self.require_tokens(text)?;
        let link = self.extract_link(text)?;
        let pair_code = self.resolve_pair(&link)?;

        let separator = self.rule.pair_separator.to_uppercase();
        let symbol = pair_code.replace(&separator, "");
        if symbol.is_empty() {
            return Err(ParseError::SymbolUnresolvable);
        }

        Ok(ParsedSignal {
            symbol,
            pair_code,
            source: message.clone(),
        })
    }

    fn require_tokens(&self, text: &str) -> Result<(), ParseError> {
        match self
            .rule
            .required_tokens
            .iter()
            .find(|token| !text.contains(token.as_str()))
        {
            Some(missing) => Err(ParseError::MissingTemplateToken(missing.clone())),
            None => Ok(()),
        }
    }

    fn extract_link(&self, text: &str) -> Result<Url, ParseError> {
        text.split_whitespace()
            .map(|segment| segment.trim_matches(LINK_TRIM))
            .filter(|segment| segment.contains("://"))
            .filter(|segment| {
                written_authority(segment).eq_ignore_ascii_case(&self.rule.link_host)
            })
            .filter_map(|segment| Url::parse(segment).ok())
            .find(|link| link.path().starts_with(&self.rule.link_path_prefix))
            .ok_or(ParseError::LinkMissing)
    }

    fn resolve_pair(&self, link: &Url) -> Result<String, ParseError> {
        let raw = link
            .path()
            .strip_prefix(&self.rule.link_path_prefix)
            .unwrap_or_default()
            .trim_matches('/');
        if raw.is_empty() {
            return Err(ParseError::SymbolUnresolvable);
        }

        let separator = &self.rule.pair_separator;
        if separator.is_empty() {
            return Err(ParseError::InvalidSeparatorConfig);
        }

        // Some links use hyphens or an encoded underscore between the legs.
        let normalized = raw
            .to_uppercase()
            .replace('-', separator)
            .replace("%5F", separator);

        if !normalized.contains(&separator.to_uppercase()) {
            return Err(ParseError::SeparatorNotFound {
                separator: separator.clone(),
                pair: normalized,
            });
        }
        Ok(normalized)
    }
}

/// Host and port exactly as written in the link, userinfo dropped.
/// `Url` normalizes default ports away, so this reads the raw text.
fn written_authority(link: &str) -> &str {
    let rest = link.split_once("://").map_or(link, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}
