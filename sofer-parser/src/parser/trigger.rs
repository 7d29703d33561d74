//! Scope labels and end triggers whose text is bound from the opening pretoken.
use crate::{
    Error,
    model::escape_component,
    pretoken::PreToken,
};

/// A pretoken field a label or trigger can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    /// Tag name with its level, level 1 omitted (`q2`, `p`).
    FullTagName,
    /// Zero-based table column taken from the tag level (`tc2` is column 1).
    Column,
    /// Chapter, printed chapter or verse number.
    Number,
    MilestoneName,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::FullTagName => "fullTagName",
            Self::Column => "column",
            Self::Number => "number",
            Self::MilestoneName => "milestoneName",
        }
    }

    pub(crate) fn resolve(self, pretoken: &PreToken) -> Option<String> {
        match (self, pretoken) {
            (Self::FullTagName, PreToken::Tag(tag)) => Some(tag.full_name()),
            (Self::Column, PreToken::Tag(tag)) => {
                let level: usize = tag.level.parse().ok()?;
                level.checked_sub(1).map(|column| column.to_string())
            }
            (
                Self::Number,
                PreToken::Chapter { number }
                | PreToken::PrintChapter { number }
                | PreToken::Verses { number, .. },
            ) => Some(number.clone()),
            (Self::MilestoneName, PreToken::Milestone { name, .. }) => Some(name.clone()),
            _ => None,
        }
    }
}

/// `{prefix}/{field}`, e.g. `blockTag/$fullTagName$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LabelSpec {
    pub(crate) prefix: &'static str,
    pub(crate) field: Field,
}

impl LabelSpec {
    pub(crate) const fn new(prefix: &'static str, field: Field) -> Self {
        Self { prefix, field }
    }

    pub(crate) fn resolve(&self, pretoken: &PreToken) -> Result<String, Error> {
        let value = self
            .field
            .resolve(pretoken)
            .ok_or_else(|| Error::UnresolvedTrigger {
                field: self.field.name(),
                label: format!("{}/${}$", self.prefix, self.field.name()),
            })?;
        Ok(format!("{}/{}", self.prefix, escape_component(&value)))
    }
}

/// One alternative of a scope's end rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TriggerSpec {
    Literal(&'static str),
    /// `{prefix}/{field}`, bound once when the scope opens.
    Bound { prefix: &'static str, field: Field },
    /// Whatever ends the innermost attribute context.
    AttributeContext,
}

/// Binds a scope's end rule against the pretoken that opens it.
///
/// `attribute_context` holds the triggers of the innermost attribute context, if any.
pub(crate) fn resolve_triggers(
    specs: &[TriggerSpec],
    pretoken: &PreToken,
    label: &str,
    attribute_context: Option<&[String]>,
) -> Result<Vec<String>, Error> {
    let mut triggers = Vec::with_capacity(specs.len());
    for spec in specs {
        match spec {
            TriggerSpec::Literal(literal) => triggers.push((*literal).to_string()),
            TriggerSpec::Bound { prefix, field } => {
                let value = field
                    .resolve(pretoken)
                    .ok_or_else(|| Error::UnresolvedTrigger {
                        field: field.name(),
                        label: label.to_string(),
                    })?;
                triggers.push(format!("{prefix}/{value}"));
            }
            TriggerSpec::AttributeContext => {
                let context = attribute_context.ok_or_else(|| Error::UnresolvedTrigger {
                    field: "attributeContext",
                    label: label.to_string(),
                })?;
                triggers.extend(context.iter().cloned());
            }
        }
    }
    Ok(triggers)
}
