/// Whether a matched path is added to or removed from the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Include,
    Exclude,
}

/// One ordered selection rule: a glob pattern plus its polarity. Rule order
/// is significant; a later exclude overrides an earlier include for the same
/// path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    pub pattern: String,
}

impl Rule {
    /// Parses the string form used in the config file: a leading `!` marks
    /// an exclude, everything else is an include.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('!') {
            Some(rest) => Rule::exclude(rest),
            None => Rule::include(raw),
        }
    }

    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            action: RuleAction::Include,
            pattern: pattern.into(),
        }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: RuleAction::Exclude,
            pattern: pattern.into(),
        }
    }
}

pub fn parse_rules<S: AsRef<str>>(raw: &[S]) -> Vec<Rule> {
    raw.iter().map(|r| Rule::parse(r.as_ref())).collect()
}
