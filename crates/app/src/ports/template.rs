//! Template port — rendering of start/end/offset/attribute templates.

use std::collections::BTreeSet;

/// Outcome of rendering one template.
///
/// A failed render never panics or errors past this boundary; the caller
/// decides what a failure means for the value being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub value: String,
    pub success: bool,
    /// Identifiers the template read while rendering.
    pub referenced: BTreeSet<String>,
}

impl Rendered {
    #[must_use]
    pub fn ok(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            success: true,
            referenced: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn referencing(mut self, identifier: impl Into<String>) -> Self {
        self.referenced.insert(identifier.into());
        self
    }
}

/// Renders template text to a string.
pub trait TemplateRenderer {
    fn render(&self, template: &str) -> Rendered;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
    fn render(&self, template: &str) -> Rendered {
        (**self).render(template)
    }
}
