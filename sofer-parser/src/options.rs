/// Extra tag names routed to the built-in heading, paragraph and character rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CustomTags {
    pub heading: Vec<String>,
    pub paragraph: Vec<String>,
    pub character: Vec<String>,
}

impl CustomTags {
    pub(crate) fn kind_of(&self, name: &str) -> Option<CustomTagKind> {
        let has = |list: &[String]| list.iter().any(|t| t == name);
        if has(&self.heading) {
            Some(CustomTagKind::Heading)
        } else if has(&self.paragraph) {
            Some(CustomTagKind::Paragraph)
        } else if has(&self.character) {
            Some(CustomTagKind::Character)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomTagKind {
    Heading,
    Paragraph,
    Character,
}

#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Options {
    /// Strict mode - fail on non-conformance instead of warn-and-continue.
    ///
    /// When enabled, every warning the lexer or parser would collect fails the
    /// document with [`crate::Error::StrictMode`] instead.
    pub strict: bool,
    pub custom_tags: CustomTags,
    /// Treat the first row of TSV input as a header row.
    pub tsv_header_row: bool,
}

impl Options {
    /// Create a new `OptionsBuilder` for fluent configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use sofer_parser::{CustomTagKind, Options};
    ///
    /// let options = Options::builder()
    ///     .with_strict()
    ///     .with_custom_tag(CustomTagKind::Character, "zlit")
    ///     .build();
    /// assert!(options.strict);
    /// ```
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Create a new `Options` with default settings.
    ///
    /// Equivalent to `Options::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builder for `Options` that provides an API for configuration.
///
/// Create an `OptionsBuilder` using `Options::builder()`.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct OptionsBuilder {
    strict: bool,
    custom_tags: CustomTags,
    tsv_header_row: bool,
}

impl OptionsBuilder {
    /// Enable strict mode.
    ///
    /// When enabled, issues that would normally result in a warning and fallback
    /// behavior will instead cause parsing to fail.
    #[must_use]
    pub fn with_strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Route an extra tag name to the heading, paragraph or character rule.
    ///
    /// # Example
    ///
    /// ```
    /// use sofer_parser::{CustomTagKind, Options};
    ///
    /// let options = Options::builder()
    ///     .with_custom_tag(CustomTagKind::Heading, "zhd")
    ///     .with_custom_tag(CustomTagKind::Paragraph, "zp")
    ///     .build();
    /// assert_eq!(options.custom_tags.heading, vec!["zhd".to_string()]);
    /// ```
    #[must_use]
    pub fn with_custom_tag(mut self, kind: CustomTagKind, name: impl Into<String>) -> Self {
        let list = match kind {
            CustomTagKind::Heading => &mut self.custom_tags.heading,
            CustomTagKind::Paragraph => &mut self.custom_tags.paragraph,
            CustomTagKind::Character => &mut self.custom_tags.character,
        };
        list.push(name.into());
        self
    }

    #[must_use]
    pub fn with_tsv_header_row(mut self) -> Self {
        self.tsv_header_row = true;
        self
    }

    /// Build the `Options` from this builder.
    #[must_use]
    pub fn build(self) -> Options {
        Options {
            strict: self.strict,
            custom_tags: self.custom_tags,
            tsv_header_row: self.tsv_header_row,
        }
    }
}
