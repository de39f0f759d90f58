//! Step sentence templates
//!
//! A template is literal text with `{name}` placeholders:
//!
//! | form | matches |
//! |------|---------|
//! | `"{name}"` | any text between the quotes |
//! | `{name}` | one token of letters, digits and `_ . + -` |
//! | `{name:text}` | free text |
//! | `{name:int}` | a signed integer |
//! | `{name:list}` | comma-separated items, quoted or not |
//!
//! Literal text must match exactly. Templates compile to an anchored regex.
//!
//! A quoted slot ends at the next `"`, so its value can never contain a
//! double quote. Sentences that need one refer to a credential token instead
//! (`"script_tag_text"` rather than the markup itself).

use regex::Regex;
use std::fmt;

use loginbdd_common::{Error, Result};

/// What a placeholder accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Token,
    Text,
    Int,
    List,
}

impl SlotKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "token" => Some(SlotKind::Token),
            "text" => Some(SlotKind::Text),
            "int" => Some(SlotKind::Int),
            "list" => Some(SlotKind::List),
            _ => None,
        }
    }

    fn regex(&self, quoted: bool) -> &'static str {
        match (self, quoted) {
            (SlotKind::Int, true) => r#""(-?\d+)""#,
            (_, true) => r#""([^"]*)""#,
            (SlotKind::Token, false) => r"([A-Za-z0-9_.+\-]+)",
            (SlotKind::Int, false) => r"(-?\d+)",
            (SlotKind::Text, false) | (SlotKind::List, false) => r"(.+?)",
        }
    }

    /// Can an unquoted slot of this kind swallow quote characters
    fn accepts_quotes(&self) -> bool {
        matches!(self, SlotKind::Text | SlotKind::List)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotKind::Token => "token",
            SlotKind::Text => "text",
            SlotKind::Int => "int",
            SlotKind::List => "list",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub kind: SlotKind,
    /// Written between double quotes in the template
    pub quoted: bool,
}

impl Slot {
    /// Whether one sentence fragment could fill both slots
    fn overlaps(&self, other: &Slot) -> bool {
        match (self.quoted, other.quoted) {
            (true, true) | (false, false) => true,
            (true, false) => other.kind.accepts_quotes(),
            (false, true) => self.kind.accepts_quotes(),
        }
    }
}

/// A captured placeholder value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    Int(i64),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// A compiled sentence template
#[derive(Debug, Clone)]
pub struct StepPattern {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl StepPattern {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(invalid("unclosed placeholder")),
                            Some(ch) => inner.push(ch),
                        }
                    }
                    let (name, kind) = inner.split_once(':').unwrap_or((inner.as_str(), ""));
                    let name = name.trim();
                    if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                        return Err(invalid("placeholder names are letters, digits and '_'"));
                    }
                    let kind = SlotKind::parse(kind.trim())
                        .ok_or_else(|| invalid(&format!("unknown placeholder kind '{}'", kind)))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    } else if matches!(segments.last(), Some(Segment::Slot(_))) {
                        return Err(invalid("placeholders must be separated by literal text"));
                    }
                    segments.push(Segment::Slot(Slot {
                        name: name.to_string(),
                        kind,
                        quoted: false,
                    }));
                }
                '}' => return Err(invalid("unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        mark_quoted(&mut segments);

        let mut names: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Slot(slot) = segment {
                if names.contains(&slot.name.as_str()) {
                    return Err(invalid(&format!("placeholder '{}' appears twice", slot.name)));
                }
                names.push(&slot.name);
            }
        }

        let mut expr = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Slot(slot) => expr.push_str(slot.kind.regex(slot.quoted)),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            segments,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(slot) => Some(slot),
            Segment::Literal(_) => None,
        })
    }

    /// Literal text with every placeholder replaced by `{}`
    pub fn skeleton(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.as_str(),
                Segment::Slot(_) => "{}",
            })
            .collect()
    }

    /// Whether some sentence could match both templates
    ///
    /// Only templates with the same skeleton are compared; sentences that
    /// happen to match templates with different skeletons are caught at
    /// dispatch time instead.
    pub fn is_ambiguous_with(&self, other: &StepPattern) -> bool {
        self.skeleton() == other.skeleton()
            && self.slots().zip(other.slots()).all(|(a, b)| a.overlaps(b))
    }

    /// Match a keyword-free sentence, returning the captured values in order
    pub fn captures(&self, sentence: &str) -> Option<Vec<(String, ArgValue)>> {
        let caps = self.regex.captures(sentence)?;
        let mut values = Vec::new();
        for (i, slot) in self.slots().enumerate() {
            let raw = caps.get(i + 1)?.as_str();
            let value = match slot.kind {
                SlotKind::Token | SlotKind::Text => ArgValue::Text(raw.to_string()),
                SlotKind::Int => ArgValue::Int(raw.parse().ok()?),
                SlotKind::List => ArgValue::List(split_list(raw)),
            };
            values.push((slot.name.clone(), value));
        }
        Some(values)
    }
}

impl fmt::Display for StepPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A slot directly wrapped in `"` takes the quotes out of the neighbouring literals
fn mark_quoted(segments: &mut [Segment]) {
    for i in 0..segments.len() {
        if !matches!(segments[i], Segment::Slot(_)) || i == 0 || i + 1 >= segments.len() {
            continue;
        }
        let before = matches!(&segments[i - 1], Segment::Literal(t) if t.ends_with('"'));
        let after = matches!(&segments[i + 1], Segment::Literal(t) if t.starts_with('"'));
        if !(before && after) {
            continue;
        }
        if let Segment::Literal(t) = &mut segments[i - 1] {
            t.pop();
        }
        if let Segment::Literal(t) = &mut segments[i + 1] {
            t.remove(0);
        }
        if let Segment::Slot(slot) = &mut segments[i] {
            slot.quoted = true;
        }
    }
}

/// Comma-separated items, trimmed, empties dropped
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ArgValue {
        ArgValue::Text(s.to_string())
    }

    #[test]
    fn test_quoted_placeholder() {
        let p = StepPattern::parse(r#"I enter "{value}" into the username field"#).unwrap();
        assert_eq!(p.skeleton(), "I enter {} into the username field");
        assert!(p.slots().next().unwrap().quoted);
        let caps = p.captures(r#"I enter "valid_user" into the username field"#).unwrap();
        assert_eq!(caps, vec![("value".to_string(), text("valid_user"))]);
        let caps = p.captures(r#"I enter "" into the username field"#).unwrap();
        assert_eq!(caps[0].1, text(""));
        assert!(p.captures("I enter valid_user into the username field").is_none());
    }

    #[test]
    fn test_quoted_slot_cannot_hold_a_double_quote() {
        let p = StepPattern::parse(r#"I enter "{value}" into the username field"#).unwrap();
        assert!(p
            .captures(r#"I enter "<script>alert("xss")</script>" into the username field"#)
            .is_none());
        let caps = p.captures(r#"I enter "script_tag_text" into the username field"#).unwrap();
        assert_eq!(caps[0].1, text("script_tag_text"));
    }

    #[test]
    fn test_token_int_and_text_slots() {
        let p = StepPattern::parse("the application should {result} the input and {action} the script").unwrap();
        let caps = p.captures("the application should reject the input and block the script").unwrap();
        assert_eq!(caps[1], ("action".to_string(), text("block")));
        assert!(p.captures("the application should not reject the input and block the script").is_none());

        let p = StepPattern::parse("the page should be fully rendered within {seconds:int} seconds (under a normal load)").unwrap();
        let caps = p.captures("the page should be fully rendered within 3 seconds (under a normal load)").unwrap();
        assert_eq!(caps[0].1, ArgValue::Int(3));

        let p = StepPattern::parse("I enter a {kind:text} in the username field").unwrap();
        let caps = p.captures("I enter a valid username in the username field").unwrap();
        assert_eq!(caps[0].1, text("valid username"));
    }

    #[test]
    fn test_list_slot_splits_in_order() {
        let p = StepPattern::parse(r#"I try the passwords "{attempts:list}""#).unwrap();
        let caps = p.captures(r#"I try the passwords "p1, p2 ,p3,""#).unwrap();
        assert_eq!(
            caps[0].1,
            ArgValue::List(vec!["p1".into(), "p2".into(), "p3".into()])
        );
    }

    #[test]
    fn test_invalid_templates() {
        for bad in ["I {open", "I close}", "I {a}{b}", "I {a:float}", "I {} x", "{a} and {a}"] {
            assert!(
                matches!(StepPattern::parse(bad), Err(Error::InvalidPattern { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_ambiguity_rules() {
        let parse = |s: &str| StepPattern::parse(s).unwrap();
        let quoted = parse(r#"I enter "{value}" into the field"#);
        let renamed = parse(r#"I enter "{other}" into the field"#);
        let token = parse("I enter {value} into the field");
        let list = parse("I enter {value:list} into the field");
        let int = parse("I enter {n:int} into the field");

        assert!(quoted.is_ambiguous_with(&renamed));
        assert!(!quoted.is_ambiguous_with(&token));
        assert!(quoted.is_ambiguous_with(&list));
        assert!(token.is_ambiguous_with(&int));
        assert!(!quoted.is_ambiguous_with(&parse(r#"I enter "{value}" into the form"#)));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = StepPattern::parse("I should receive a response (success or failure) within the agreed performance threshold").unwrap();
        assert!(p
            .captures("I should receive a response (success or failure) within the agreed performance threshold")
            .is_some());
        assert!(p
            .captures("I should receive a response success or failure within the agreed performance threshold")
            .is_none());
    }
}
