//! Column value templates.
//!
//! A template is text with `{{ ... }}` actions that operate on the value of
//! the column being masked:
//!
//! | Action            | Output                                   |
//! |-------------------|------------------------------------------|
//! | `{{ . }}`         | the value unchanged                      |
//! | `{{ .First N }}`  | first N characters                       |
//! | `{{ .Last N }}`   | last N characters                        |
//! | `{{ .Hashed }}`   | salted bcrypt hash of the value          |
//! | `{{/* ... */}}`   | nothing                                  |
//!
//! `{{- ` and ` -}}` trim the surrounding template whitespace.

mod parse;
pub mod value;

use parse::{Action, Segment};

pub use value::TemplateValue;

/// A template that compiled successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    /// Compile `source`. `name` identifies the template in diagnostics.
    ///
    /// The error is a human readable reason; the rule compiler attaches the
    /// table and column it belongs to.
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self, String> {
        let segments = parse::parse(source)?;
        Ok(Self {
            name: name.into(),
            source: source.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether rendering calls the hashing backend.
    pub fn uses_hash(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Action(Action::Hashed)))
    }

    /// Render the template against one value.
    pub fn render(&self, value: &TemplateValue<'_>) -> Result<String, bcrypt::BcryptError> {
        let mut out = String::with_capacity(self.source.len() + value.as_str().len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Action(Action::Value) => out.push_str(value.as_str()),
                Segment::Action(Action::First(n)) => out.push_str(&value.first(*n)),
                Segment::Action(Action::Last(n)) => out.push_str(&value.last(*n)),
                Segment::Action(Action::Hashed) => out.push_str(&value.hashed()?),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(source: &str, value: &str) -> String {
        CompiledTemplate::compile("t", source)
            .unwrap()
            .render(&TemplateValue::new(value, 4))
            .unwrap()
    }

    #[test]
    fn renders_truncations() {
        assert_eq!(render("{{ .First 3 }}***", "alice@example.com"), "ali***");
        assert_eq!(render("****{{ .Last 4 }}", "4111111111111234"), "****1234");
        assert_eq!(render("{{ .First 1 }}.{{ .Last 1 }}", "Smith"), "S.h");
        assert_eq!(render("<{{ . }}>", "raw"), "<raw>");
        assert_eq!(render("fixed", "anything"), "fixed");
    }

    #[test]
    fn truncation_is_deterministic() {
        let template = CompiledTemplate::compile("t", "{{ .First 2 }}-{{ .Last 2 }}").unwrap();
        let value = TemplateValue::new("determinism", 4);
        assert_eq!(
            template.render(&value).unwrap(),
            template.render(&value).unwrap()
        );
    }

    #[test]
    fn hashed_template_verifies() {
        let template = CompiledTemplate::compile("users.password", "{{ .Hashed }}").unwrap();
        assert!(template.uses_hash());

        let out = template.render(&TemplateValue::new("hunter2", 4)).unwrap();
        assert!(bcrypt::verify("hunter2", &out).unwrap());
    }

    #[test]
    fn exposes_name_and_source() {
        let template = CompiledTemplate::compile("users.email", "{{ .Last 3 }}").unwrap();
        assert_eq!(template.name(), "users.email");
        assert_eq!(template.source(), "{{ .Last 3 }}");
        assert!(!template.uses_hash());
    }

    #[test]
    fn compile_errors_are_reported() {
        assert!(CompiledTemplate::compile("t", "{{ .First").is_err());
    }
}
