use serde::{Deserialize, Serialize};

use super::{CodecError, Delimiters};

/// One logical record: a segment id plus ordered elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub elements: Vec<String>,
}

impl Segment {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: Vec::new(),
        }
    }

    /// Builds a segment from a flat field list; the first field is the id
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = fields.into_iter().map(Into::into);
        Self {
            id: fields.next().unwrap_or_default(),
            elements: fields.collect(),
        }
    }

    /// Appends an element
    pub fn element(mut self, value: impl Into<String>) -> Self {
        self.elements.push(value.into());
        self
    }

    /// Element by zero-based position after the id
    pub fn get(&self, index: usize) -> Option<&str> {
        self.elements.get(index).map(String::as_str)
    }

    /// The id followed by the elements
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.elements.iter().map(String::as_str))
    }

    /// Splits an element on the component separator
    pub fn components(&self, index: usize, delimiters: &Delimiters) -> Vec<&str> {
        self.get(index)
            .map(|value| value.split(delimiters.component_separator).collect())
            .unwrap_or_default()
    }
}

/// Parser and renderer parameterised by a payer's delimiters
#[derive(Debug, Clone)]
pub struct SegmentCodec {
    delimiters: Delimiters,
}

impl SegmentCodec {
    pub fn new(delimiters: Delimiters) -> Result<Self, CodecError> {
        delimiters.validate()?;
        Ok(Self { delimiters })
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Splits `content` into segments
    ///
    /// A trailing empty segment left by the final terminator is dropped;
    /// empty input yields no segments.
    pub fn parse(&self, content: &str) -> Vec<Segment> {
        let mut raw: Vec<&str> = content
            .split(self.delimiters.segment_terminator)
            .map(|piece| self.strip_line_ending(piece))
            .collect();
        if raw.last().is_some_and(|piece| piece.is_empty()) {
            raw.pop();
        }
        raw.into_iter()
            .map(|piece| Segment::from_fields(piece.split(self.delimiters.element_separator)))
            .collect()
    }

    /// Inverse of [`parse`](Self::parse)
    pub fn render(&self, segments: &[Segment]) -> String {
        let separator = self.delimiters.element_separator.to_string();
        let line_ending = self.delimiters.line_ending.as_deref().unwrap_or("");
        let mut out = String::new();
        for segment in segments {
            out.push_str(&segment.fields().collect::<Vec<_>>().join(&separator));
            out.push(self.delimiters.segment_terminator);
            out.push_str(line_ending);
        }
        out
    }

    fn strip_line_ending<'a>(&self, piece: &'a str) -> &'a str {
        match self.delimiters.line_ending.as_deref() {
            Some(token) => piece.strip_prefix(token).unwrap_or(piece),
            None => piece,
        }
    }
}
