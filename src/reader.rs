use std::cmp;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use csv_stream_core::{
    ReadRecordResult, Reader as CoreReader, ReaderBuilder as CoreReaderBuilder,
};
use log::{debug, trace};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, Result};
use crate::string_record::StringRecord;

/// The default capacity of the internal input buffer.
const DEFAULT_BUFFER_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, quote character
/// and buffer size. Configuration is validated when a reader is built from
/// it, so a bad configuration is reported before any data is read.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
    builder: Box<CoreReaderBuilder>,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: DEFAULT_BUFFER_CAPACITY,
            builder: Box::new(CoreReaderBuilder::default()),
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::{ReaderBuilder, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// city;country;pop
    /// Boston;United States;4628910
    /// Concord;United States;42695
    /// ";
    ///     let mut rdr = ReaderBuilder::new()
    ///         .delimiter(b';')
    ///         .from_reader(data.as_bytes())?;
    ///
    ///     let records = rdr
    ///         .records()
    ///         .collect::<Result<Vec<StringRecord>, csv_stream::Error>>()?;
    ///     assert_eq!(records[1], vec!["Boston", "United States", "4628910"]);
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from the
    /// given file path.
    ///
    /// If there was a problem opening the file or the configuration is
    /// invalid, then this returns the corresponding error.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader<File>> {
        let core = self.builder.build()?;
        Ok(Reader::new(self.capacity, core, File::open(path)?))
    }

    /// Build a CSV parser from this configuration that reads data from `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Result<Reader<R>> {
        let core = self.builder.build()?;
        Ok(Reader::new(self.capacity, core, rdr))
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.builder.delimiter(delimiter);
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.builder.quote(quote);
        self
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    ///
    /// This bounds the amount of input held in memory at any one time,
    /// in addition to the record currently being read. A capacity of `0` is
    /// treated as `1`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// An already configured CSV reader.
///
/// A CSV reader takes as input CSV data and transforms that into standard
/// Rust values. Records are produced lazily, one at a time, and only the
/// record being read is kept in memory.
///
/// # Malformed data
///
/// Reading stops at the first malformed record: a quoted field that is never
/// closed, or data after a closing quote. The error is returned once, after
/// which the reader reports end of data and its iterators stop.
///
/// I/O errors between records do not stop the reader, and reading may be
/// retried. An I/O error in the middle of a record ends the reader the same
/// way, since the bytes of that record already read cannot be recovered.
///
/// # Example
///
/// ```
/// use csv_stream::Reader;
///
/// let data = "a,\"he said \"\"hi\"\"\",b\n";
/// let mut rdr = Reader::from_reader(data.as_bytes());
/// for result in rdr.records() {
///     let record = result.unwrap();
///     assert_eq!(record, vec!["a", "he said \"hi\"", "b"]);
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV parser.
    core: Box<CoreReader>,
    /// The underlying reader.
    rdr: io::BufReader<R>,
    /// Various state tracking.
    state: ReaderState,
}

#[derive(Debug)]
struct ReaderState {
    /// The current position of the parser.
    ///
    /// Note that this position is only observable by callers at the start
    /// of a record. More granular positions are not supported.
    cur_pos: Position,
    /// Whether the reader has stopped, either at the end of the data or
    /// at malformed data.
    done: bool,
}

impl Reader<File> {
    /// Create a new CSV parser with a default configuration for the given
    /// file path.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<R: io::Read> Reader<R> {
    /// Create a new CSV reader given a builder and a source of underlying
    /// bytes.
    fn new(capacity: usize, core: CoreReader, rdr: R) -> Reader<R> {
        // An empty buffer reads as the end of the data.
        let capacity = cmp::max(capacity, 1);
        Reader {
            core: Box::new(core),
            rdr: io::BufReader::with_capacity(capacity, rdr),
            state: ReaderState { cur_pos: Position::new(), done: false },
        }
    }

    /// Create a new CSV parser with a default configuration for the given
    /// reader.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        Reader::new(DEFAULT_BUFFER_CAPACITY, CoreReader::new(), rdr)
    }

    /// Returns a borrowed iterator over all records as strings.
    ///
    /// Each item yielded by this iterator is a `Result<StringRecord, Error>`.
    pub fn records(&mut self) -> StringRecordsIter<'_, R> {
        StringRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as strings.
    ///
    /// This is mostly useful when you want to return a CSV iterator or store
    /// it somewhere.
    pub fn into_records(self) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter::new(self)
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    ///
    /// Each item yielded by this iterator is a `Result<ByteRecord, Error>`.
    pub fn byte_records(&mut self) -> ByteRecordsIter<'_, R> {
        ByteRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as raw bytes.
    pub fn into_byte_records(self) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter::new(self)
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    ///
    /// This method may be used to achieve amortized allocation: the same
    /// record can be passed in repeatedly and its storage is reused.
    ///
    /// If the row is not valid UTF-8, then an error is returned and the
    /// record is cleared.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::{Reader, StringRecord};
    ///
    /// let mut rdr = Reader::from_reader("a,b,\nc\n".as_bytes());
    /// let mut record = StringRecord::new();
    ///
    /// assert!(rdr.read_record(&mut record).unwrap());
    /// assert_eq!(record, vec!["a", "b", ""]);
    /// assert!(rdr.read_record(&mut record).unwrap());
    /// assert_eq!(record, vec!["c"]);
    /// assert!(!rdr.read_record(&mut record).unwrap());
    /// ```
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        record.read(self)
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    ///
    /// This is the same as `read_record`, except no UTF-8 validation is
    /// performed.
    pub fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        record.clear();
        if self.state.done {
            return Ok(false);
        }
        if self.core.has_pending_lf() {
            let nin = {
                let input = self.rdr.fill_buf()?;
                self.core.skip_pending_lf(input)
            };
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state
                .cur_pos
                .set_byte(byte + nin as u64)
                .set_line(self.core.line());
        }
        record.set_position(Some(self.state.cur_pos.clone()));
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let input = match self.rdr.fill_buf() {
                    Ok(input) => input,
                    Err(err) => {
                        record.clear();
                        if !self.core.is_record_start() {
                            debug!(
                                "stopped reading CSV after an I/O error \
                                 inside record {}",
                                self.state.cur_pos.record()
                            );
                            self.state.done = true;
                        }
                        return Err(Error::Io(err));
                    }
                };
                let (fields, ends) = record.as_parts();
                self.core.read_record(
                    input,
                    &mut fields[outlen..],
                    &mut ends[endlen..],
                )
            };
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state
                .cur_pos
                .set_byte(byte + nin as u64)
                .set_line(self.core.line());
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    record.expand_fields();
                    continue;
                }
                ReadRecordResult::OutputEndsFull => {
                    record.expand_ends();
                    continue;
                }
                ReadRecordResult::Record => {
                    record.set_len(endlen);
                    let next = self.state.cur_pos.record() + 1;
                    self.state.cur_pos.set_record(next);
                    return Ok(true);
                }
                ReadRecordResult::End => {
                    trace!(
                        "end of CSV data after {} records",
                        self.state.cur_pos.record()
                    );
                    record.set_position(None);
                    self.state.done = true;
                    return Ok(false);
                }
                ReadRecordResult::Malformed(err) => {
                    let pos = self.state.cur_pos.clone();
                    debug!("stopped reading malformed CSV at {:?}: {}", pos, err);
                    record.clear();
                    self.state.done = true;
                    return Err(Error::Malformed { pos, err });
                }
            }
        }
    }

    /// Return the current position of this CSV reader.
    ///
    /// Before the first record is read, and after each record is read, this
    /// is the position at which the next record begins.
    pub fn position(&self) -> &Position {
        &self.state.cur_pos
    }

    /// Returns true if and only if this reader has stopped, either because
    /// all data was read, because malformed data was found or because an I/O
    /// error interrupted a record.
    pub fn is_done(&self) -> bool {
        self.state.done
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.rdr.get_ref()
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Reading from it directly may corrupt the state of this CSV reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.rdr.get_mut()
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }
}

/// An owned iterator over records as strings.
pub struct StringRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: StringRecord,
}

impl<R: io::Read> StringRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter { rdr, rec: StringRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for StringRecordsIntoIter<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: StringRecord,
}

impl<'r, R: io::Read> StringRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> StringRecordsIter<'r, R> {
        StringRecordsIter { rdr, rec: StringRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// An owned iterator over records as raw bytes.
pub struct ByteRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: ByteRecord,
}

impl<R: io::Read> ByteRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter { rdr, rec: ByteRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for ByteRecordsIntoIter<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: ByteRecord,
}

impl<'r, R: io::Read> ByteRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> ByteRecordsIter<'r, R> {
        ByteRecordsIter { rdr, rec: ByteRecord::new() }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}
