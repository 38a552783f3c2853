use std::fmt;

use serde::{Deserialize, Serialize};

/// A SQL identifier as written in the procedure text.
///
/// `name` holds the text without delimiters. `quoted` records whether it was
/// written as a delimited identifier (`"Label1"`), which changes how it is
/// compared under case-insensitive matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier {
    name: String,
    quoted: bool,
}

impl Identifier {
    /// A regular (undelimited) identifier.
    pub fn regular(name: impl Into<String>) -> Self {
        Identifier {
            name: name.into(),
            quoted: false,
        }
    }

    /// A delimited identifier. `name` is the text between the quotes.
    pub fn quoted(name: impl Into<String>) -> Self {
        Identifier {
            name: name.into(),
            quoted: true,
        }
    }

    /// Read an identifier in its textual form: `"..."` is delimited
    /// (with `""` standing for an embedded quote), anything else is regular.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            let inner = &text[1..text.len() - 1];
            Identifier::quoted(inner.replace("\"\"", "\""))
        } else {
            Identifier::regular(text)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl From<String> for Identifier {
    fn from(text: String) -> Self {
        Identifier::parse(&text)
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Identifier::parse(text)
    }
}

impl From<Identifier> for String {
    fn from(ident: Identifier) -> Self {
        ident.to_string()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.name.replace('"', "\"\""))
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_text_is_kept_as_written() {
        let ident = Identifier::parse("Label1");
        assert_eq!(ident.name(), "Label1");
        assert!(!ident.is_quoted());
    }

    #[test]
    fn delimited_text_strips_quotes() {
        let ident = Identifier::parse("\"my \"\"odd\"\" label\"");
        assert_eq!(ident.name(), "my \"odd\" label");
        assert!(ident.is_quoted());
        assert_eq!(ident.to_string(), "\"my \"\"odd\"\" label\"");
    }

    #[test]
    fn lone_quote_is_not_delimited() {
        let ident = Identifier::parse("\"");
        assert!(!ident.is_quoted());
        assert_eq!(ident.name(), "\"");
    }
}
