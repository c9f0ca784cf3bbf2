use serde::{Deserialize, Serialize};

use super::CodecError;

/// Per-payer delimiter set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Ends every segment
    pub segment_terminator: char,
    /// Separates the segment id and its elements
    pub element_separator: char,
    /// Separates components inside one element
    pub component_separator: char,
    /// Cosmetic token written after each terminator and stripped on parse
    #[serde(default)]
    pub line_ending: Option<String>,
}

impl Delimiters {
    /// `~` terminated X12-style set with a newline after each segment
    pub fn x12() -> Self {
        Self {
            segment_terminator: '~',
            element_separator: '*',
            component_separator: ':',
            line_ending: Some("\n".to_string()),
        }
    }

    /// Newline terminated, pipe separated
    pub fn pipe() -> Self {
        Self {
            segment_terminator: '\n',
            element_separator: '|',
            component_separator: '^',
            line_ending: None,
        }
    }

    /// Checks that the three delimiters are distinct and the line ending is
    /// disjoint from all of them
    pub fn validate(&self) -> Result<(), CodecError> {
        let chars = [self.segment_terminator, self.element_separator, self.component_separator];
        if chars[0] == chars[1] || chars[0] == chars[2] || chars[1] == chars[2] {
            return Err(CodecError::AmbiguousDelimiters(format!(
                "{:?} {:?} {:?}",
                chars[0], chars[1], chars[2]
            )));
        }
        if let Some(token) = &self.line_ending {
            if token.is_empty() || token.chars().any(|c| chars.contains(&c)) {
                return Err(CodecError::InvalidLineEnding);
            }
        }
        Ok(())
    }

    /// True if `value` contains any character the codec treats as structure
    pub fn is_reserved_in(&self, value: &str) -> bool {
        value.chars().any(|c| {
            c == self.segment_terminator || c == self.element_separator || c == self.component_separator
        }) || self
            .line_ending
            .as_deref()
            .is_some_and(|token| value.contains(token))
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::x12()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sets_are_valid() {
        assert!(Delimiters::x12().validate().is_ok());
        assert!(Delimiters::pipe().validate().is_ok());
    }

    #[test]
    fn test_duplicate_delimiters_rejected() {
        let delimiters = Delimiters {
            component_separator: '*',
            ..Delimiters::x12()
        };
        assert!(matches!(delimiters.validate(), Err(CodecError::AmbiguousDelimiters(_))));
    }

    #[test]
    fn test_line_ending_overlap_rejected() {
        let delimiters = Delimiters {
            line_ending: Some("~\n".to_string()),
            ..Delimiters::x12()
        };
        assert_eq!(delimiters.validate(), Err(CodecError::InvalidLineEnding));
    }

    #[test]
    fn test_reserved_detection() {
        let delimiters = Delimiters::x12();
        assert!(delimiters.is_reserved_in("A*B"));
        assert!(delimiters.is_reserved_in("line\nbreak"));
        assert!(!delimiters.is_reserved_in("SMITH"));
    }
}
