use std::borrow::Cow;

use crate::identifier::Identifier;

/// Identifier equality policy used when matching label references
/// against block labels.
///
/// Matching is a pure function of its inputs: it is reflexive and
/// symmetric, and carries no state between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatcher {
    /// Names compare exactly as written.
    CaseSensitive,
    /// Regular identifiers fold to upper case one character at a time;
    /// delimited identifiers keep their case.
    #[default]
    CaseInsensitive,
}

impl NameMatcher {
    pub fn from_case_sensitivity(case_sensitive: bool) -> Self {
        if case_sensitive {
            NameMatcher::CaseSensitive
        } else {
            NameMatcher::CaseInsensitive
        }
    }

    pub fn is_case_sensitive(self) -> bool {
        matches!(self, NameMatcher::CaseSensitive)
    }

    /// Whether `referenced` denotes the same name as `declared`.
    pub fn matches(self, declared: &Identifier, referenced: &Identifier) -> bool {
        self.canonical(declared) == self.canonical(referenced)
    }

    /// The form of `ident` that this policy compares.
    pub fn canonical(self, ident: &Identifier) -> Cow<'_, str> {
        match self {
            NameMatcher::CaseSensitive => Cow::Borrowed(ident.name()),
            NameMatcher::CaseInsensitive if ident.is_quoted() => Cow::Borrowed(ident.name()),
            NameMatcher::CaseInsensitive => Cow::Owned(ident.name().chars().map(fold).collect()),
        }
    }
}

/// Upper-case one character, keeping it as is when its upper case takes
/// several characters (`ß`), so that folding never changes the length.
fn fold(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}
