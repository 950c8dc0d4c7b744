use std::cmp;
use std::fmt;
use std::iter::FromIterator;
use std::ops;
use std::result;
use std::str;

use bstr::BStr;

use crate::error::Utf8Error;

/// A single CSV record stored as raw bytes.
///
/// A byte record permits reading or writing CSV rows that are not UTF-8.
/// In general, you should prefer using a `StringRecord` since it is more
/// ergonomic, but a `ByteRecord` is provided in case you need it.
///
/// Fields are stored contiguously in a single buffer alongside the ending
/// position of each field, so reading into the same record repeatedly
/// amortizes its allocation.
#[derive(Clone, Eq)]
pub struct ByteRecord {
    /// All fields in this record, stored contiguously.
    fields: Vec<u8>,
    /// The number of and location of each field in this record.
    bounds: Bounds,
    /// The position of this record in the CSV data it was read from.
    pos: Option<Position>,
}

impl PartialEq for ByteRecord {
    fn eq(&self, other: &ByteRecord) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for ByteRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<[T]> for &'a ByteRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for ByteRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl fmt::Debug for ByteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&BStr> = self.iter().map(BStr::new).collect();
        write!(f, "ByteRecord({:?})", fields)
    }
}

impl Default for ByteRecord {
    fn default() -> ByteRecord {
        ByteRecord::new()
    }
}

impl ByteRecord {
    /// Create a new empty `ByteRecord`.
    pub fn new() -> ByteRecord {
        ByteRecord::with_capacity(0, 0)
    }

    /// Create a new empty `ByteRecord` with the given capacity settings.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    pub fn with_capacity(buffer: usize, fields: usize) -> ByteRecord {
        ByteRecord {
            fields: vec![0; buffer],
            bounds: Bounds::with_capacity(fields),
            pos: None,
        }
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.bounds.get(i).map(|range| &self.fields[range])
    }

    /// Returns true if and only if this record is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this record.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Clear this record so that it has zero fields.
    ///
    /// This also clears the position of this record. Note that it is not
    /// necessary to clear the record to reuse it with the CSV reader.
    pub fn clear(&mut self) {
        self.bounds.len = 0;
        self.pos = None;
    }

    /// Returns an iterator over all fields in this record.
    pub fn iter(&self) -> ByteRecordIter<'_> {
        ByteRecordIter { r: self, start: 0, i: 0 }
    }

    /// Add a new field to this record.
    pub fn push_field(&mut self, field: &[u8]) {
        let (s, e) = (self.bounds.end(), self.bounds.end() + field.len());
        while e > self.fields.len() {
            self.expand_fields();
        }
        self.fields[s..e].copy_from_slice(field);
        self.bounds.add(e);
    }

    /// Return the position of this record, if available.
    ///
    /// Records read by a CSV reader carry the position at which they start.
    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    /// Set the position of this record.
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.pos = pos;
    }

    /// Return the entire row as a single byte slice. The slice returned
    /// stores all fields contiguously. The boundaries of each field cannot
    /// be determined from the slice alone.
    pub fn as_slice(&self) -> &[u8] {
        &self.fields[..self.bounds.end()]
    }

    /// Retrieve the underlying parts of a byte record.
    pub(crate) fn as_parts(&mut self) -> (&mut Vec<u8>, &mut Vec<usize>) {
        (&mut self.fields, &mut self.bounds.ends)
    }

    /// Set the number of fields in this record.
    pub(crate) fn set_len(&mut self, len: usize) {
        self.bounds.len = len;
    }

    /// Expand the capacity for storing fields.
    pub(crate) fn expand_fields(&mut self) {
        let new_len = self.fields.len().saturating_mul(2);
        self.fields.resize(cmp::max(4, new_len), 0);
    }

    /// Expand the capacity for storing field ending positions.
    pub(crate) fn expand_ends(&mut self) {
        self.bounds.expand();
    }

    /// Validate this record as UTF-8.
    ///
    /// If it's not UTF-8, return an error naming the first offending field.
    pub(crate) fn validate(&self) -> result::Result<(), Utf8Error> {
        // If the entire buffer is ASCII, then we have nothing to fear.
        if self.as_slice().is_ascii() {
            return Ok(());
        }
        // Otherwise, we must check each field individually to ensure that
        // it's valid UTF-8.
        for (i, field) in self.iter().enumerate() {
            if let Err(err) = str::from_utf8(field) {
                return Err(Utf8Error::new(i, err.valid_up_to()));
            }
        }
        Ok(())
    }
}

/// A position in CSV data.
///
/// A position is used to report errors in CSV data. All positions include
/// the byte offset, line number and record index at which the error
/// occurred.
///
/// Byte offsets and record indices start at `0`. Line numbers start at `1`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Position {
    byte: u64,
    line: u64,
    record: u64,
}

impl Default for Position {
    fn default() -> Position {
        Position::new()
    }
}

impl Position {
    /// Returns a new position initialized to the start value.
    pub fn new() -> Position {
        Position { byte: 0, line: 1, record: 0 }
    }

    /// The byte offset, starting at `0`, of this position.
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The line number, starting at `1`, of this position.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The record index, starting with the first record at `0`.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// Set the byte offset of this position.
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the line number of this position.
    ///
    /// If the line number is less than `1`, then this method panics.
    pub fn set_line(&mut self, line: u64) -> &mut Position {
        assert!(line > 0);
        self.line = line;
        self
    }

    /// Set the record index of this position.
    pub fn set_record(&mut self, record: u64) -> &mut Position {
        self.record = record;
        self
    }
}

/// The bounds of fields in a single record.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Bounds {
    /// The ending index of each field.
    ends: Vec<usize>,
    /// The number of fields in this record.
    ///
    /// Technically, we could drop this field and maintain an invariant that
    /// `ends.len()` is always the number of fields, but the reader writes
    /// into `ends` as a pre-sized buffer.
    len: usize,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::with_capacity(0)
    }
}

impl Bounds {
    fn with_capacity(capacity: usize) -> Bounds {
        Bounds { ends: vec![0; capacity], len: 0 }
    }

    /// Returns the bounds of field `i`.
    fn get(&self, i: usize) -> Option<ops::Range<usize>> {
        if i >= self.len {
            return None;
        }
        let end = match self.ends.get(i) {
            None => return None,
            Some(&end) => end,
        };
        let start = match i.checked_sub(1).and_then(|i| self.ends.get(i)) {
            None => 0,
            Some(&start) => start,
        };
        Some(ops::Range { start, end })
    }

    /// Returns a slice of ending positions of all fields.
    fn ends(&self) -> &[usize] {
        &self.ends[..self.len]
    }

    /// Return the last position of the last field.
    ///
    /// If there are no fields, this returns `0`.
    #[inline(always)]
    fn end(&self) -> usize {
        self.ends().last().copied().unwrap_or(0)
    }

    /// Returns the number of fields in these bounds.
    fn len(&self) -> usize {
        self.len
    }

    /// Expand the capacity for storing field ending positions.
    fn expand(&mut self) {
        let new_len = self.ends.len().saturating_mul(2);
        self.ends.resize(cmp::max(4, new_len), 0);
    }

    /// Add a new field with the given ending position.
    fn add(&mut self, pos: usize) {
        if self.len >= self.ends.len() {
            self.expand();
        }
        self.ends[self.len] = pos;
        self.len += 1;
    }
}

impl ops::Index<usize> for ByteRecord {
    type Output = [u8];
    fn index(&self, i: usize) -> &[u8] {
        self.get(i).unwrap()
    }
}

impl<T: AsRef<[u8]>> From<Vec<T>> for ByteRecord {
    fn from(xs: Vec<T>) -> ByteRecord {
        ByteRecord::from_iter(&xs)
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a [T]> for ByteRecord {
    fn from(xs: &'a [T]) -> ByteRecord {
        ByteRecord::from_iter(xs)
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRecord {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> ByteRecord {
        let mut record = ByteRecord::new();
        record.extend(iter);
        record
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRecord {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a ByteRecord {
    type IntoIter = ByteRecordIter<'a>;
    type Item = &'a [u8];
    fn into_iter(self) -> ByteRecordIter<'a> {
        self.iter()
    }
}

/// An iterator over the fields in a byte record.
pub struct ByteRecordIter<'a> {
    r: &'a ByteRecord,
    start: usize,
    i: usize,
}

impl<'a> Iterator for ByteRecordIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        match self.r.bounds.ends().get(self.i) {
            None => None,
            Some(&end) => {
                let field = &self.r.fields[self.start..end];
                self.start = end;
                self.i += 1;
                Some(field)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.r.len() - self.i;
        (n, Some(n))
    }
}

impl<'a> ExactSizeIterator for ByteRecordIter<'a> {}
