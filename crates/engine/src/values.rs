//! `${name}` placeholder substitution.
//!
//! Display strings of entries (names, descriptions, button texts) may reference named
//! values. They are resolved on every read, so a value that changes over time shows up
//! without rebinding anything.

use std::sync::Arc;

use chrono::Local;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([^}]+?)\s*\}").expect("placeholder pattern is valid"));

/// A named value that placeholders can refer to.
pub trait ValueProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Current value. `None` leaves the placeholder untouched.
    fn value(&self) -> Option<String>;
}

/// A fixed value.
pub struct StaticValue {
    name: String,
    value: String,
}

impl StaticValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl ValueProvider for StaticValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<String> {
        Some(self.value.clone())
    }
}

/// Reads an environment variable on every access.
pub struct EnvValue {
    name: String,
    variable: String,
}

impl EnvValue {
    pub fn new(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
        }
    }
}

impl ValueProvider for EnvValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<String> {
        std::env::var(&self.variable).ok()
    }
}

/// The local time, formatted with a `chrono` format string.
pub struct ClockValue {
    name: String,
    format: String,
}

impl ClockValue {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
        }
    }
}

impl ValueProvider for ClockValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<String> {
        Some(Local::now().format(&self.format).to_string())
    }
}

/// An ordered set of value providers. The first provider with a matching name wins.
#[derive(Clone, Default)]
pub struct ValueContext {
    providers: Vec<Arc<dyn ValueProvider>>,
}

impl ValueContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl ValueProvider + 'static) -> Self {
        self.push(Arc::new(provider));
        self
    }

    pub fn push(&mut self, provider: Arc<dyn ValueProvider>) {
        self.providers.push(provider);
    }

    /// Every environment variable as `env:<NAME>`.
    pub fn with_environment(mut self) -> Self {
        for (variable, _) in std::env::vars() {
            let name = format!("env:{variable}");
            self.push(Arc::new(EnvValue::new(name, variable)));
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<String> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .and_then(|p| p.value())
    }

    /// Replaces every known `${name}` in `template`.
    pub fn resolve(&self, template: &str) -> String {
        if !template.contains("${") {
            return template.to_string();
        }

        PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl ValueProvider for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn value(&self) -> Option<String> {
            Some(self.0.fetch_add(1, Ordering::SeqCst).to_string())
        }
    }

    #[test]
    fn resolves_known_and_keeps_unknown() {
        let values = ValueContext::new()
            .with(StaticValue::new("user", "ada"))
            .with(StaticValue::new("user", "shadowed"));

        assert_eq!(
            values.resolve("Hi ${user}, ${ user } and ${missing}"),
            "Hi ada, ada and ${missing}"
        );
        assert_eq!(values.resolve("plain"), "plain");
    }

    #[test]
    fn values_are_recomputed_on_every_resolve() {
        let values = ValueContext::new().with(Counter(AtomicUsize::new(0)));

        assert_eq!(values.resolve("#${counter}"), "#0");
        assert_eq!(values.resolve("#${counter}"), "#1");
    }

    #[test]
    fn env_and_clock_values() {
        let values = ValueContext::new()
            .with(EnvValue::new("env:WORKBENCH_TEST_UNSET", "WORKBENCH_TEST_UNSET_VARIABLE"))
            .with(ClockValue::new("year", "%Y"));

        assert_eq!(
            values.resolve("${env:WORKBENCH_TEST_UNSET}"),
            "${env:WORKBENCH_TEST_UNSET}"
        );
        assert_eq!(values.resolve("${year}"), Local::now().format("%Y").to_string());
    }
}
