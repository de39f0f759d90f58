//! Step dispatcher
//!
//! Maps scenario sentences to handlers. Registration rejects a template that
//! is ambiguous with one already registered; dispatch requires exactly one
//! match.

use futures::future::BoxFuture;
use tracing::{debug, info_span, Instrument};

use loginbdd_common::{Error, Result};

use crate::context::ScenarioContext;

pub mod catalog;
pub mod pattern;

pub use catalog::default_registry;
pub use pattern::{ArgValue, Slot, SlotKind, StepPattern};

/// A step handler
pub type StepFn = for<'a> fn(&'a mut ScenarioContext, StepArgs) -> BoxFuture<'a, Result<()>>;

/// Leading keywords a sentence may carry
pub const KEYWORDS: &[&str] = &["Given", "When", "Then", "And", "But", "*"];

/// Values captured from a sentence, by placeholder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepArgs {
    values: Vec<(String, ArgValue)>,
}

impl StepArgs {
    pub fn new(values: Vec<(String, ArgValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn missing(name: &str, reason: &str) -> Error {
        Error::InvalidStepArgument {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(ArgValue::Text(s)) => Ok(s),
            Some(_) => Err(Self::missing(name, "not a text placeholder")),
            None => Err(Self::missing(name, "not captured")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(ArgValue::Int(n)) => Ok(*n),
            Some(_) => Err(Self::missing(name, "not an integer placeholder")),
            None => Err(Self::missing(name, "not captured")),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[String]> {
        match self.get(name) {
            Some(ArgValue::List(items)) => Ok(items),
            Some(_) => Err(Self::missing(name, "not a list placeholder")),
            None => Err(Self::missing(name, "not captured")),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A registered template and its handler
pub struct StepDef {
    pattern: StepPattern,
    handler: StepFn,
}

impl StepDef {
    pub fn pattern(&self) -> &StepPattern {
        &self.pattern
    }
}

/// A sentence resolved to its step
pub struct Matched<'r> {
    pub step: &'r StepDef,
    pub args: StepArgs,
}

#[derive(Default)]
pub struct StepRegistry {
    steps: Vec<StepDef>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template; fails with [`Error::DuplicatePattern`] when some
    /// sentence could match both it and an existing one
    pub fn register(&mut self, template: &str, handler: StepFn) -> Result<()> {
        let pattern = StepPattern::parse(template)?;
        if let Some(existing) = self
            .steps
            .iter()
            .find(|s| s.pattern.is_ambiguous_with(&pattern))
        {
            return Err(Error::DuplicatePattern {
                pattern: template.to_string(),
                existing: existing.pattern.to_string(),
            });
        }
        self.steps.push(StepDef { pattern, handler });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Templates in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.pattern.as_str())
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepDef> {
        self.steps.iter()
    }

    /// The single step matching `sentence`
    pub fn find(&self, sentence: &str) -> Result<Matched<'_>> {
        let body = strip_keyword(sentence);
        let mut found: Vec<Matched<'_>> = self
            .steps
            .iter()
            .filter_map(|step| {
                step.pattern
                    .captures(body)
                    .map(|values| Matched { step, args: StepArgs::new(values) })
            })
            .collect();
        match found.len() {
            0 => Err(Error::NoMatchingStep(body.to_string())),
            1 => Ok(found.remove(0)),
            _ => Err(Error::AmbiguousStep {
                sentence: body.to_string(),
                patterns: found.iter().map(|m| m.step.pattern.to_string()).collect(),
            }),
        }
    }

    /// Check every sentence resolves, returning the first failure
    pub fn validate<'s>(&self, sentences: impl IntoIterator<Item = &'s str>) -> Result<()> {
        for sentence in sentences {
            self.find(sentence)?;
        }
        Ok(())
    }

    /// Run the handler for `sentence` once
    pub async fn dispatch(&self, sentence: &str, ctx: &mut ScenarioContext) -> Result<()> {
        let Matched { step, args } = self.find(sentence)?;
        debug!("'{}' matched '{}'", sentence, step.pattern);
        let span = info_span!("step", step = %strip_keyword(sentence));
        (step.handler)(ctx, args).instrument(span).await
    }
}

/// Drop a leading Given/When/Then/And/But/* keyword
pub fn strip_keyword(sentence: &str) -> &str {
    let sentence = sentence.trim();
    for keyword in KEYWORDS {
        if let Some(rest) = sentence.strip_prefix(keyword) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    sentence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BrowserDriver, DriverFactory, NullDriver};
    use async_trait::async_trait;
    use loginbdd_common::{Browser, CredentialRegistry, SuiteConfig};
    use std::sync::Arc;

    struct NullFactory;

    #[async_trait]
    impl DriverFactory for NullFactory {
        async fn create(&self, _browser: Browser) -> Result<Box<dyn BrowserDriver>> {
            Ok(Box::new(NullDriver::new()))
        }
    }

    fn ctx() -> ScenarioContext {
        ScenarioContext::new(
            Arc::new(SuiteConfig::default()),
            Arc::new(CredentialRegistry::new()),
            Arc::new(NullFactory),
        )
    }

    fn count_attempts(ctx: &mut ScenarioContext, _args: StepArgs) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            ctx.login_attempts += 1;
            Ok(())
        })
    }

    fn record_list(ctx: &mut ScenarioContext, args: StepArgs) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            ctx.last_password = Some(args.list("items")?.join("|"));
            Ok(())
        })
    }

    #[test]
    fn test_strip_keyword() {
        assert_eq!(strip_keyword("Given I am here"), "I am here");
        assert_eq!(strip_keyword("  And   I am here "), "I am here");
        assert_eq!(strip_keyword("* I am here"), "I am here");
        assert_eq!(strip_keyword("Andrew is here"), "Andrew is here");
    }

    #[test]
    fn test_duplicate_pattern_rejected() {
        let mut registry = StepRegistry::new();
        registry.register(r#"I enter "{value}" into the username field"#, count_attempts).unwrap();
        let err = registry
            .register(r#"I enter "{other}" into the username field"#, count_attempts)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePattern { .. }));
        registry.register(r#"I enter "{value}" into the password field"#, count_attempts).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_runs_exactly_one_handler_once() {
        let mut registry = StepRegistry::new();
        registry.register("I count", count_attempts).unwrap();
        registry.register("I count twice", count_attempts).unwrap();
        let mut ctx = ctx();
        registry.dispatch("When I count", &mut ctx).await.unwrap();
        assert_eq!(ctx.login_attempts, 1);
    }

    #[tokio::test]
    async fn test_no_matching_step() {
        let registry = StepRegistry::new();
        let mut ctx = ctx();
        let err = registry.dispatch("Given I dance", &mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::NoMatchingStep(s) if s == "I dance"));
    }

    #[tokio::test]
    async fn test_ambiguous_sentence_across_skeletons() {
        let mut registry = StepRegistry::new();
        registry.register("I enter {what:text} now", count_attempts).unwrap();
        registry.register("I enter the password now", count_attempts).unwrap();
        assert!(matches!(
            registry.find("I enter the password now"),
            Err(Error::AmbiguousStep { .. })
        ));
        assert!(registry.validate(["I enter something now"]).is_ok());
    }

    #[tokio::test]
    async fn test_list_arguments_keep_order() {
        let mut registry = StepRegistry::new();
        registry.register(r#"I try "{items:list}""#, record_list).unwrap();
        let mut ctx = ctx();
        registry.dispatch(r#"I try "c, a, b""#, &mut ctx).await.unwrap();
        assert_eq!(ctx.last_password.as_deref(), Some("c|a|b"));
    }

    #[test]
    fn test_step_args_type_errors() {
        let args = StepArgs::new(vec![("n".into(), ArgValue::Int(3))]);
        assert_eq!(args.int("n").unwrap(), 3);
        assert!(matches!(args.text("n"), Err(Error::InvalidStepArgument { .. })));
        assert!(matches!(args.list("missing"), Err(Error::InvalidStepArgument { .. })));
    }
}
