use serde::Serialize;

/// A `Location` represents a span of the source text a diagnostic points at.
#[derive(Debug, Default, Clone, Hash, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Location {
    /// Byte offset where the span starts.
    pub absolute_start: usize,
    /// Byte offset where the span ends (exclusive).
    pub absolute_end: usize,

    pub start: Position,
    pub end: Position,
}

impl Location {
    /// Builds a location from two byte offsets into `input`, filling in the
    /// human-readable positions. Offsets past the end are clamped.
    #[must_use]
    pub fn from_offsets(input: &str, absolute_start: usize, absolute_end: usize) -> Self {
        let absolute_end = absolute_end.min(input.len());
        let absolute_start = absolute_start.min(absolute_end);
        Self {
            absolute_start,
            absolute_end,
            start: Position::at(input, absolute_start),
            end: Position::at(input, absolute_end),
        }
    }

    /// Checks that the offsets describe a valid range of `input`.
    ///
    /// # Errors
    /// Returned as strings for easier debugging.
    pub fn validate(&self, input: &str) -> Result<(), String> {
        if self.absolute_start > self.absolute_end {
            return Err(format!(
                "Invalid range: start {} > end {}",
                self.absolute_start, self.absolute_end
            ));
        }
        if self.absolute_end > input.len() {
            return Err(format!(
                "End offset {} exceeds input length {}",
                self.absolute_end,
                input.len()
            ));
        }
        if !input.is_char_boundary(self.absolute_start) || !input.is_char_boundary(self.absolute_end)
        {
            return Err(format!(
                "Offsets {}..{} not on UTF-8 boundaries",
                self.absolute_start, self.absolute_end
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "location.start({}), location.end({})",
            self.start, self.end
        )
    }
}

/// A `Position` represents a human-readable position in a document.
///
/// This is purely for display/error reporting purposes. For byte offsets,
/// use `Location.absolute_start` and `Location.absolute_end`.
#[derive(Debug, Default, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Position {
    /// The line number of the position (1-indexed).
    pub line: usize,
    /// The column number of the position (1-indexed, counted as Unicode scalar values).
    #[serde(rename = "col")]
    pub column: usize,
}

impl Position {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position of byte `offset` in `input`. The offset is rounded down to a char boundary.
    #[must_use]
    pub fn at(input: &str, offset: usize) -> Self {
        let mut offset = offset.min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = input.get(..offset).unwrap_or_default();
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before.get(line_start..).unwrap_or_default().chars().count() + 1;
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_chars_not_bytes() {
        let input = "\\id GEN\n\\p é\\x";
        let pos = Position::at(input, input.find("\\x").unwrap_or_default());
        assert_eq!(pos, Position::new(2, 5));
    }

    #[test]
    fn location_clamps_out_of_range_offsets() {
        let location = Location::from_offsets("abc", 2, 40);
        assert_eq!(location.absolute_end, 3);
        assert!(location.validate("abc").is_ok());
    }
}
