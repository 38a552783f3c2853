use std::fmt;
use std::str::FromStr;

use procsql::NameMatcher;
use serde::{Deserialize, Serialize};

/// Named preset choosing the name matcher and the unresolved-label policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Conformance {
    /// Case-insensitive labels; an unresolved label is an error.
    #[default]
    Default,
    /// Case-insensitive labels; an unresolved label is accepted silently.
    Lenient,
    /// Case-sensitive labels; an unresolved label is an error.
    Strict,
}

impl Conformance {
    pub fn name_matcher(self) -> NameMatcher {
        match self {
            Conformance::Default | Conformance::Lenient => NameMatcher::CaseInsensitive,
            Conformance::Strict => NameMatcher::CaseSensitive,
        }
    }

    pub fn unresolved_label(self) -> UnresolvedLabelPolicy {
        match self {
            Conformance::Default | Conformance::Strict => UnresolvedLabelPolicy::Error,
            Conformance::Lenient => UnresolvedLabelPolicy::Ignore,
        }
    }
}

/// What to do with a `LEAVE`/`ITERATE` whose label matches no enclosing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedLabelPolicy {
    Error,
    Warn,
    Ignore,
}

/// Validator settings, usually read from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfig {
    #[serde(default)]
    pub conformance: Conformance,

    /// Overrides the conformance's label case sensitivity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    /// Overrides the conformance's unresolved-label policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_label: Option<UnresolvedLabelPolicy>,
}

impl ValidatorConfig {
    pub fn with_conformance(conformance: Conformance) -> Self {
        ValidatorConfig {
            conformance,
            ..ValidatorConfig::default()
        }
    }

    pub fn name_matcher(&self) -> NameMatcher {
        match self.case_sensitive {
            Some(case_sensitive) => NameMatcher::from_case_sensitivity(case_sensitive),
            None => self.conformance.name_matcher(),
        }
    }

    pub fn unresolved_label_policy(&self) -> UnresolvedLabelPolicy {
        self.unresolved_label
            .unwrap_or_else(|| self.conformance.unresolved_label())
    }
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conformance::Default => write!(f, "default"),
            Conformance::Lenient => write!(f, "lenient"),
            Conformance::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for Conformance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Conformance::Default),
            "lenient" => Ok(Conformance::Lenient),
            "strict" => Ok(Conformance::Strict),
            other => Err(format!(
                "unknown conformance '{}' (expected default, lenient or strict)",
                other
            )),
        }
    }
}

impl FromStr for UnresolvedLabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(UnresolvedLabelPolicy::Error),
            "warn" => Ok(UnresolvedLabelPolicy::Warn),
            "ignore" => Ok(UnresolvedLabelPolicy::Ignore),
            other => Err(format!(
                "unknown policy '{}' (expected error, warn or ignore)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let lenient = ValidatorConfig::with_conformance(Conformance::Lenient);
        assert_eq!(lenient.name_matcher(), NameMatcher::CaseInsensitive);
        assert_eq!(lenient.unresolved_label_policy(), UnresolvedLabelPolicy::Ignore);

        let strict = ValidatorConfig::with_conformance(Conformance::Strict);
        assert_eq!(strict.name_matcher(), NameMatcher::CaseSensitive);
        assert_eq!(strict.unresolved_label_policy(), UnresolvedLabelPolicy::Error);
    }

    #[test]
    fn overrides_win_over_preset() {
        let config: ValidatorConfig = toml::from_str(
            "conformance = \"strict\"\ncase-sensitive = false\nunresolved-label = \"warn\"\n",
        )
        .unwrap();
        assert_eq!(config.conformance, Conformance::Strict);
        assert_eq!(config.name_matcher(), NameMatcher::CaseInsensitive);
        assert_eq!(config.unresolved_label_policy(), UnresolvedLabelPolicy::Warn);
    }

    #[test]
    fn empty_document_is_default() {
        let config: ValidatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.conformance, Conformance::Default);
        assert_eq!(config.name_matcher(), NameMatcher::CaseInsensitive);
        assert_eq!(config.unresolved_label_policy(), UnresolvedLabelPolicy::Error);
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("LENIENT".parse::<Conformance>(), Ok(Conformance::Lenient));
        assert_eq!("warn".parse::<UnresolvedLabelPolicy>(), Ok(UnresolvedLabelPolicy::Warn));
        assert!("loose".parse::<Conformance>().is_err());
    }
}
