use serde_json::Value;
use std::fmt::Write;

/// Expected content of one output field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Free-form field, described in natural language for the model.
    Literal(String),
    /// Closed set of allowed values; the model must choose exactly one.
    Enum(Vec<String>),
}

/// Ordered, unique-key schema for the JSON the model must produce.
///
/// Keys are unique: inserting an existing key replaces its spec in place,
/// keeping the original position. Order is preserved for prompt rendering
/// and for values-only output.
///
/// A key or enum value wrapped in angle brackets (`<topic>`) is a
/// placeholder: the model substitutes a contextually appropriate concrete
/// value, and the key becomes optional during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputShape {
    fields: Vec<(String, FieldSpec)>,
}

impl OutputShape {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert a field, replacing an existing key in place.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, spec: FieldSpec) -> Self {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = spec;
        } else {
            self.fields.push((key, spec));
        }
        self
    }

    /// Shorthand for a [`FieldSpec::Literal`] field.
    #[must_use]
    pub fn literal(self, key: impl Into<String>, description: impl Into<String>) -> Self {
        self.field(key, FieldSpec::Literal(description.into()))
    }

    /// Shorthand for a [`FieldSpec::Enum`] field.
    #[must_use]
    pub fn choice<I, S>(self, key: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field(
            key,
            FieldSpec::Enum(allowed.into_iter().map(Into::into).collect()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn fields(&self) -> &[(String, FieldSpec)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, spec)| spec)
    }

    /// Render the shape to the canonical textual form embedded in prompts:
    /// a JSON object mapping each key to its description or allowed values,
    /// in insertion order.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, spec)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: ", Value::String(key.clone()));
            match spec {
                FieldSpec::Literal(description) => {
                    let _ = write!(out, "{}", Value::String(description.clone()));
                }
                FieldSpec::Enum(allowed) => {
                    let _ = write!(out, "{}", Value::from(allowed.clone()));
                }
            }
        }
        out.push('}');
        out
    }

    /// True when any key, description, or allowed value carries an
    /// angle-bracket placeholder.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.fields.iter().any(|(key, spec)| {
            is_placeholder(key)
                || match spec {
                    FieldSpec::Literal(description) => is_placeholder(description),
                    FieldSpec::Enum(allowed) => allowed.iter().any(|v| is_placeholder(v)),
                }
        })
    }
}

/// True for text carrying an angle-bracket placeholder marker (`<topic>`).
#[must_use]
pub fn is_placeholder(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_replaces_in_place() {
        let shape = OutputShape::new()
            .literal("first", "a")
            .literal("second", "b")
            .literal("first", "replaced");

        assert_eq!(shape.len(), 2);
        assert_eq!(shape.keys().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(
            shape.get("first"),
            Some(&FieldSpec::Literal("replaced".into()))
        );
    }

    #[test]
    fn render_emits_descriptions_and_allowed_values_in_order() {
        let shape = OutputShape::new()
            .literal("answer", "a short answer")
            .choice("sentiment", ["positive", "negative"]);

        assert_eq!(
            shape.render(),
            r#"{"answer": "a short answer", "sentiment": ["positive","negative"]}"#
        );
    }

    #[test]
    fn render_escapes_special_characters() {
        let shape = OutputShape::new().literal("quote", "say \"hi\"");
        assert_eq!(shape.render(), r#"{"quote": "say \"hi\""}"#);
    }

    #[test]
    fn placeholder_detection_covers_keys_and_values() {
        assert!(is_placeholder("<topic>"));
        assert!(!is_placeholder("topic"));

        assert!(OutputShape::new().literal("<topic>", "x").has_placeholders());
        assert!(
            OutputShape::new()
                .choice("kind", ["<category>", "other"])
                .has_placeholders()
        );
        assert!(!OutputShape::new().literal("plain", "x").has_placeholders());
    }

    #[test]
    fn empty_shape_reports_empty() {
        assert!(OutputShape::new().is_empty());
        assert_eq!(OutputShape::new().render(), "{}");
    }
}
