//! Request-shape validation: a declarative set of per-field rules checked
//! before an operation runs.

use serde::{Deserialize, Serialize};

/// A single rule applied to a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Field must be present.
    Required,
    /// At least this many characters.
    MinLen(usize),
    /// At most this many characters.
    MaxLen(usize),
    /// Looks like an email address.
    Email,
}

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

/// Rules for the fields of one operation.
#[derive(Debug, Default)]
pub struct Constraints<'a> {
    fields: Vec<(&'static str, Option<&'a str>, &'static [Rule])>,
}

impl<'a> Constraints<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. An absent field is only checked by `Rule::Required`.
    pub fn field(mut self, name: &'static str, value: Option<&'a str>, rules: &'static [Rule]) -> Self {
        self.fields.push((name, value, rules));
        self
    }

    /// Run every rule, reporting the first failure per field.
    pub fn check(self) -> Result<(), Vec<Issue>> {
        let issues: Vec<Issue> = self
            .fields
            .into_iter()
            .filter_map(|(name, value, rules)| {
                first_failure(value, rules).map(|message| Issue {
                    path: name.to_string(),
                    message,
                })
            })
            .collect();
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

fn first_failure(value: Option<&str>, rules: &[Rule]) -> Option<String> {
    let Some(value) = value else {
        return rules
            .contains(&Rule::Required)
            .then(|| "Required".to_string());
    };
    let len = value.chars().count();
    rules.iter().find_map(|rule| match *rule {
        Rule::Required => None,
        Rule::MinLen(min) if len < min => {
            Some(format!("Must contain at least {min} character(s)"))
        }
        Rule::MaxLen(max) if len > max => {
            Some(format!("Must contain at most {max} character(s)"))
        }
        Rule::Email if !is_email(value) => Some("Invalid email".to_string()),
        _ => None,
    })
}

/// Loose shape check: `local@domain.tld`, no whitespace.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Render issues as one line for error messages.
pub fn summarize(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}
