//! Record streams feeding a sequence module's `main` phase.

use crate::RuntimeError;
use std::collections::VecDeque;
use std::io::BufRead;

pub trait RecordSource {
    /// The next record, or `None` once the stream is exhausted.
    fn next_record(&mut self) -> Result<Option<String>, RuntimeError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: VecDeque<String>,
}

impl MemorySource {
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: records.into_iter().map(Into::into).collect(),
        }
    }
}

impl RecordSource for MemorySource {
    fn next_record(&mut self) -> Result<Option<String>, RuntimeError> {
        Ok(self.records.pop_front())
    }
}

/// One record per line; line terminators are stripped and blank lines skipped.
pub struct LineSource<R> {
    reader: R,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> RecordSource for LineSource<R> {
    fn next_record(&mut self) -> Result<Option<String>, RuntimeError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let record = line.trim_end_matches(['\n', '\r']);
            if !record.is_empty() {
                return Ok(Some(record.to_string()));
            }
        }
    }
}

/// A source with one record of lookahead, so `has_next` does not consume.
pub(crate) struct PeekableSource {
    inner: Box<dyn RecordSource>,
    peeked: Option<Option<String>>,
}

impl PeekableSource {
    pub fn new(inner: Box<dyn RecordSource>) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    pub fn has_next(&mut self) -> Result<bool, RuntimeError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.inner.next_record()?);
        }
        Ok(matches!(self.peeked, Some(Some(_))))
    }

    pub fn next(&mut self) -> Result<Option<String>, RuntimeError> {
        match self.peeked.take() {
            Some(record) => Ok(record),
            None => self.inner.next_record(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn line_source_strips_terminators_and_blank_lines() -> Result<(), RuntimeError> {
        let mut source = LineSource::new(Cursor::new("ACGT\r\n\nTTGA\n"));
        assert_eq!(source.next_record()?, Some("ACGT".to_string()));
        assert_eq!(source.next_record()?, Some("TTGA".to_string()));
        assert_eq!(source.next_record()?, None);
        Ok(())
    }

    #[test]
    fn peeking_does_not_consume() -> Result<(), RuntimeError> {
        let mut source = PeekableSource::new(Box::new(MemorySource::new(["a"])));
        assert!(source.has_next()?);
        assert!(source.has_next()?);
        assert_eq!(source.next()?, Some("a".to_string()));
        assert!(!source.has_next()?);
        Ok(())
    }
}
