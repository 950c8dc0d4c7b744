use std::fmt;
use std::io;
use std::iter::FromIterator;
use std::ops;
use std::result;
use std::str;

use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
use crate::error::{Error, FromUtf8Error, Result};
use crate::reader::Reader;

/// A single CSV record stored as valid UTF-8 bytes.
///
/// This is the row type most callers work with: an ordered sequence of text
/// fields. The number of fields may differ from one record to the next.
#[derive(Clone, Eq, PartialEq)]
pub struct StringRecord(ByteRecord);

impl Default for StringRecord {
    fn default() -> StringRecord {
        StringRecord::new()
    }
}

impl StringRecord {
    /// Create a new empty `StringRecord`.
    pub fn new() -> StringRecord {
        StringRecord(ByteRecord::new())
    }

    /// Create a new empty `StringRecord` with the given capacity.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    pub fn with_capacity(buffer: usize, fields: usize) -> StringRecord {
        StringRecord(ByteRecord::with_capacity(buffer, fields))
    }

    /// Create a new `StringRecord` from a `ByteRecord`.
    ///
    /// Note that this does UTF-8 validation. If the given `ByteRecord` does
    /// not contain valid UTF-8, then this returns an error. The error includes
    /// the UTF-8 error and the original `ByteRecord`.
    pub fn from_byte_record(
        record: ByteRecord,
    ) -> result::Result<StringRecord, FromUtf8Error> {
        match record.validate() {
            Ok(()) => Ok(StringRecord(record)),
            Err(err) => Err(FromUtf8Error::new(record, err)),
        }
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(|bytes| {
            debug_assert!(str::from_utf8(bytes).is_ok());
            // This is safe because we guarantee that all string records
            // have a valid UTF-8 buffer. It's also safe because we
            // individually check each field for valid UTF-8.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    /// Returns true if and only if this record is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this record.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Clear this record so that it has zero fields.
    ///
    /// Note that it is not necessary to clear the record to reuse it with
    /// the CSV reader.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add a new field to this record.
    pub fn push_field(&mut self, field: &str) {
        self.0.push_field(field.as_bytes());
    }

    /// Return the position of this record, if available.
    pub fn position(&self) -> Option<&Position> {
        self.0.position()
    }

    /// Set the position of this record.
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.0.set_position(pos);
    }

    /// Return the entire row as a single string slice. The slice returned
    /// stores all fields contiguously. The boundaries of each field cannot
    /// be determined from the slice alone.
    pub fn as_slice(&self) -> &str {
        // See StringRecord::get for safety argument.
        unsafe { str::from_utf8_unchecked(self.0.as_slice()) }
    }

    /// Return a reference to this record's raw `ByteRecord`.
    pub fn as_byte_record(&self) -> &ByteRecord {
        &self.0
    }

    /// Convert this `StringRecord` into a `ByteRecord`.
    pub fn into_byte_record(self) -> ByteRecord {
        self.0
    }

    /// Returns an iterator over all fields in this record.
    pub fn iter(&self) -> StringRecordIter<'_> {
        StringRecordIter(self.0.iter())
    }

    /// A safe function for reading CSV data into a `StringRecord`.
    ///
    /// This relies on the internal representation of `StringRecord`: the
    /// bytes are read first and wiped if they are not valid UTF-8.
    pub(crate) fn read<R: io::Read>(
        &mut self,
        rdr: &mut Reader<R>,
    ) -> Result<bool> {
        // SAFETY: Note that despite the absence of `unsafe` in this function,
        // this code is critical to upholding the safety of other `unsafe`
        // blocks in this module. Namely, after calling `read_byte_record`,
        // it is possible for `record` to contain invalid UTF-8. We check for
        // this in the `validate` method, and if it does have invalid UTF-8,
        // we clear the record.
        let read_res = rdr.read_byte_record(&mut self.0);
        let utf8_res = match self.0.validate() {
            Ok(()) => Ok(()),
            Err(err) => {
                // If this record isn't valid UTF-8, then completely wipe it.
                let pos = self.0.position().cloned();
                self.0.clear();
                Err(Error::Utf8 { pos, err })
            }
        };
        match (read_res, utf8_res) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Ok(more), Ok(())) => Ok(more),
        }
    }
}

impl fmt::Debug for StringRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.iter().collect();
        write!(f, "StringRecord({:?})", fields)
    }
}

impl ops::Index<usize> for StringRecord {
    type Output = str;
    fn index(&self, i: usize) -> &str {
        self.get(i).unwrap()
    }
}

impl<T: AsRef<str>> PartialEq<[T]> for StringRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<'a, T: AsRef<str>> PartialEq<[T]> for &'a StringRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<T: AsRef<str>> PartialEq<Vec<T>> for StringRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<T: AsRef<str>> From<Vec<T>> for StringRecord {
    fn from(xs: Vec<T>) -> StringRecord {
        StringRecord::from_iter(xs)
    }
}

impl<'a, T: AsRef<str>> From<&'a [T]> for StringRecord {
    fn from(xs: &'a [T]) -> StringRecord {
        StringRecord::from_iter(xs)
    }
}

impl<T: AsRef<str>> FromIterator<T> for StringRecord {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> StringRecord {
        let mut record = StringRecord::new();
        record.extend(iter);
        record
    }
}

impl<T: AsRef<str>> Extend<T> for StringRecord {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl From<StringRecord> for ByteRecord {
    fn from(record: StringRecord) -> ByteRecord {
        record.into_byte_record()
    }
}

impl<'a> IntoIterator for &'a StringRecord {
    type IntoIter = StringRecordIter<'a>;
    type Item = &'a str;
    fn into_iter(self) -> StringRecordIter<'a> {
        self.iter()
    }
}

/// An iterator over the fields in a string record.
pub struct StringRecordIter<'a>(ByteRecordIter<'a>);

impl<'a> Iterator for StringRecordIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.0.next().map(|bytes| {
            // See StringRecord::get for safety argument.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> ExactSizeIterator for StringRecordIter<'a> {}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::fmt;

    use serde::de::{Deserialize, Deserializer, SeqAccess, Visitor};
    use serde::ser::{Serialize, SerializeSeq, Serializer};

    use super::StringRecord;

    impl Serialize for StringRecord {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(self.len()))?;
            for field in self {
                seq.serialize_element(field)?;
            }
            seq.end()
        }
    }

    impl<'de> Deserialize<'de> for StringRecord {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<StringRecord, D::Error> {
            struct RecordVisitor;

            impl<'de> Visitor<'de> for RecordVisitor {
                type Value = StringRecord;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "a sequence of strings")
                }

                fn visit_seq<A: SeqAccess<'de>>(
                    self,
                    mut seq: A,
                ) -> Result<StringRecord, A::Error> {
                    let mut record = StringRecord::new();
                    while let Some(field) = seq.next_element::<String>()? {
                        record.push_field(&field);
                    }
                    Ok(record)
                }
            }

            deserializer.deserialize_seq(RecordVisitor)
        }
    }
}
