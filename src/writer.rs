use std::cmp;
use std::fs::File;
use std::io;
use std::path::Path;

use csv_stream_core::{
    QuoteStyle, Terminator, WriteResult, Writer as CoreWriter,
    WriterBuilder as CoreWriterBuilder,
};
use log::{debug, trace};

use crate::byte_record::ByteRecord;
use crate::error::{Error, IntoInnerError, Result};

/// The default capacity of the internal output buffer.
const DEFAULT_BUFFER_CAPACITY: usize = 8 * (1 << 10);

/// The smallest output buffer that can always hold a closing quote followed
/// by the longest terminator.
const MIN_BUFFER_CAPACITY: usize = 4;

/// Builds a CSV writer with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more. Once a CSV `Writer` is built, its configuration cannot be
/// changed.
#[derive(Debug)]
pub struct WriterBuilder {
    builder: CoreWriterBuilder,
    capacity: usize,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder {
            builder: CoreWriterBuilder::default(),
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::{Terminator, WriterBuilder};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = WriterBuilder::new()
    ///         .terminator(Terminator::CRLF)
    ///         .from_writer(vec![])?;
    ///     wtr.write_record(&["a", "b,c"])?;
    ///     wtr.write_record(&["x", "y"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "a,\"b,c\"\r\nx,y\r\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to the
    /// given file path. The file is truncated if it already exists.
    ///
    /// If there was a problem opening the file or the configuration is
    /// invalid, then this returns the corresponding error.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Writer<File>> {
        let core = self.builder.build()?;
        Ok(Writer::new(self.capacity, core, File::create(path)?))
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should not
    /// wrap `wtr` in a buffered writer like `io::BufWriter`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Result<Writer<W>> {
        let core = self.builder.build()?;
        Ok(Writer::new(self.capacity, core, wtr))
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.builder.delimiter(delimiter);
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.builder.quote(quote);
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// The default is `Terminator::LF`.
    ///
    /// Only `\r\n`, `\n` and `\r` are offered, because each of them is
    /// read back as exactly one record boundary. Arbitrary terminator bytes
    /// or strings are not supported.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.builder.terminator(term);
        self
    }

    /// The quoting style to use when writing CSV.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.builder.quote_style(style);
        self
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer.
    ///
    /// Very small values are rounded up to a few bytes.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }
}

/// An already configured CSV writer.
///
/// A CSV writer takes records as input and writes them to an underlying
/// `io::Write` as CSV. Fields are quoted only when needed, unless configured
/// otherwise, and embedded quotes are escaped by doubling them.
///
/// Output is buffered. The buffer is flushed when it fills up, when `flush`
/// or `into_inner` is called, and when the writer is dropped. Errors that
/// occur while flushing on drop are ignored, so call `flush` to observe them.
///
/// # Errors
///
/// If writing a field or terminator fails, the record being written is left
/// incomplete in the output. Every later `write_field`, `write_terminator`
/// and `write_record` call then fails too, so that no further records are
/// appended to a torn one. `flush` and `into_inner` keep working, which lets
/// callers recover what was written.
///
/// # Example
///
/// ```
/// use csv_stream::Writer;
///
/// let mut wtr = Writer::from_writer(vec![]);
/// wtr.write_record(&["a", "he said \"hi\"", ""]).unwrap();
///
/// let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
/// assert_eq!(data, "a,\"he said \"\"hi\"\"\",\n");
/// ```
#[derive(Debug)]
pub struct Writer<W: io::Write> {
    core: CoreWriter,
    /// Only ever `None` after `into_inner` has taken it.
    wtr: Option<W>,
    buf: Buffer,
    state: WriterState,
}

#[derive(Debug)]
struct WriterState {
    /// The number of fields written in the current record.
    fields_written: u64,
    /// Set while writing to the underlying writer, so that a panic there
    /// does not cause a second write when dropping.
    panicked: bool,
    /// Set once writing a field or terminator has failed.
    failed: bool,
}

/// A simple internal buffer for buffering writes.
///
/// The CSV core writer writes directly into the spare room of this buffer.
#[derive(Debug)]
struct Buffer {
    /// The contents of the buffer.
    buf: Vec<u8>,
    /// The number of bytes written to the buffer.
    len: usize,
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.state.panicked {
            let _ = self.flush();
        }
    }
}

impl Writer<File> {
    /// Build a CSV writer with a default configuration that writes data to
    /// the given file path. The file is truncated if it already exists.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
        WriterBuilder::new().from_path(path)
    }
}

impl<W: io::Write> Writer<W> {
    fn new(capacity: usize, core: CoreWriter, wtr: W) -> Writer<W> {
        let capacity = cmp::max(capacity, MIN_BUFFER_CAPACITY);
        Writer {
            core,
            wtr: Some(wtr),
            buf: Buffer { buf: vec![0; capacity], len: 0 },
            state: WriterState {
                fields_written: 0,
                panicked: false,
                failed: false,
            },
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        Writer::new(DEFAULT_BUFFER_CAPACITY, CoreWriter::new(), wtr)
    }

    /// Write a single record.
    ///
    /// This method accepts something that can be turned into an iterator
    /// that yields elements that can be represented by a `&[u8]`, such as
    /// `&[&str]` or a `StringRecord`. Writing a record with no fields
    /// writes only a record terminator.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::Writer;
    ///
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_record(&["x", "line1\nline2", "y"]).unwrap();
    /// wtr.write_record(vec![String::from("a"), String::from("")]).unwrap();
    ///
    /// let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    /// assert_eq!(data, "x,\"line1\nline2\",y\na,\n");
    /// ```
    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record.into_iter() {
            self.write_field(field)?;
        }
        self.write_terminator()
    }

    /// Write a single `ByteRecord`.
    ///
    /// This is the same as `write_record`, and exists for symmetry with
    /// `Reader::read_byte_record`.
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// Write every record yielded by `records`, in order.
    ///
    /// This stops at the first error.
    pub fn write_records<I, R, T>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Write a single field.
    ///
    /// One should prefer using `write_record` over this method. It is
    /// provided for cases where writing a field at a time is more
    /// convenient than writing a record at a time. A delimiter is written
    /// before every field but the first of a record.
    ///
    /// Note that if this API is used, `write_terminator` must be called at
    /// the end of each record.
    pub fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        self.check_failed()?;
        let res = self.write_field_impl(field.as_ref());
        self.record_failure(res)
    }

    fn write_field_impl(&mut self, mut field: &[u8]) -> Result<()> {
        if self.state.fields_written > 0 {
            self.write_delimiter()?;
        }
        loop {
            let (res, nin, nout) = self.core.field(field, self.buf.writable());
            field = &field[nin..];
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => {
                    self.state.fields_written += 1;
                    return Ok(());
                }
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    /// Write a record terminator, ending the current record.
    ///
    /// Callers using `write_field` must call this at the end of each record.
    pub fn write_terminator(&mut self) -> Result<()> {
        self.check_failed()?;
        let res = self.write_terminator_impl();
        self.record_failure(res)
    }

    fn write_terminator_impl(&mut self) -> Result<()> {
        loop {
            let (res, nout) = self.core.terminator(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => {
                    self.state.fields_written = 0;
                    return Ok(());
                }
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn check_failed(&self) -> Result<()> {
        if self.state.failed {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "CSV writer failed earlier while writing a record",
            )));
        }
        Ok(())
    }

    fn record_failure(&mut self, res: Result<()>) -> Result<()> {
        if let Err(ref err) = res {
            debug!(
                "CSV writer failed after {} fields of a record: {}",
                self.state.fields_written, err
            );
            self.state.failed = true;
        }
        res
    }

    fn write_delimiter(&mut self) -> Result<()> {
        loop {
            let (res, nout) = self.core.delimiter(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// and then flush the underlying writer itself.
    ///
    /// Note that this also flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        match self.wtr {
            Some(ref mut wtr) => wtr.flush(),
            None => Ok(()),
        }
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// without flushing the underlying writer.
    fn flush_buf(&mut self) -> io::Result<()> {
        let wtr = match self.wtr {
            Some(ref mut wtr) => wtr,
            None => return Ok(()),
        };
        self.state.panicked = true;
        let result = wtr.write_all(self.buf.readable());
        self.state.panicked = false;
        result?;
        trace!("flushed {} bytes of CSV data", self.buf.len);
        self.buf.clear();
        Ok(())
    }

    /// Return a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.wtr.as_ref().expect("writer is only taken by into_inner")
    }

    /// Flush the internal buffer and return the underlying writer.
    ///
    /// If flushing fails, then the error is returned along with this CSV
    /// writer, so that no data is lost.
    pub fn into_inner(
        mut self,
    ) -> std::result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Ok(()) => {
                Ok(self.wtr.take().expect("writer is only taken by into_inner"))
            }
            Err(err) => Err(IntoInnerError::new(self, err)),
        }
    }
}

impl Buffer {
    /// Returns a copy of the contents of the buffer.
    fn readable(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Returns a mutable slice of the remaining space in this buffer.
    fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Indicates that `n` bytes have been written to this buffer.
    fn written(&mut self, n: usize) {
        self.len += n;
    }

    /// Clear the buffer.
    fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use csv_stream_core::{ConfigError, QuoteStyle, Setting, Terminator};

    use crate::byte_record::ByteRecord;
    use crate::error::Error;
    use crate::reader::Reader;
    use crate::string_record::StringRecord;

    use super::{Writer, WriterBuilder};

    fn wtr_as_string(wtr: Writer<Vec<u8>>) -> String {
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn one_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["a", "b", "c"]).unwrap();

        assert_eq!(wtr_as_string(wtr), "a,b,c\n");
    }

    #[test]
    fn one_string_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&StringRecord::from(vec!["a", "b,c", ""])).unwrap();

        assert_eq!(wtr_as_string(wtr), "a,\"b,c\",\n");
    }

    #[test]
    fn one_byte_record() {
        let mut wtr = Writer::from_writer(vec![]);
        let rec = ByteRecord::from(vec![&b"a"[..], &b"\xFF\""[..]]);
        wtr.write_byte_record(&rec).unwrap();

        let got = wtr.into_inner().unwrap();
        assert_eq!(got, b"a,\"\xFF\"\"\"\n".to_vec());
    }

    #[test]
    fn empty_record_is_a_blank_line() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(Vec::<&str>::new()).unwrap();
        wtr.write_record(&[""]).unwrap();
        wtr.write_record(&["", ""]).unwrap();

        assert_eq!(wtr_as_string(wtr), "\n\n,\n");
    }

    #[test]
    fn field_at_a_time() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_field("a").unwrap();
        wtr.write_field("b\"").unwrap();
        wtr.write_terminator().unwrap();
        wtr.write_field("c").unwrap();
        wtr.write_terminator().unwrap();

        assert_eq!(wtr_as_string(wtr), "a,\"b\"\"\"\nc\n");
    }

    #[test]
    fn many_records() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_records(vec![vec!["a", "b"], vec!["x"], vec!["y", "z"]])
            .unwrap();

        assert_eq!(wtr_as_string(wtr), "a,b\nx\ny,z\n");
    }

    #[test]
    fn always_quote_crlf_tabs() {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .delimiter(b'\t')
            .from_writer(vec![])
            .unwrap();
        wtr.write_record(&["a", "", "b\tc"]).unwrap();

        assert_eq!(wtr_as_string(wtr), "\"a\"\t\"\"\t\"b\tc\"\r\n");
    }

    #[test]
    fn tiny_buffer_matches_default() {
        let rows = vec![
            vec!["he said \"hi\"", "\"\"\"", "plain"],
            vec!["", "a,b,c,d,e,f", "line1\r\nline2"],
        ];
        for style in &[QuoteStyle::Necessary, QuoteStyle::Always] {
            for term in &[Terminator::LF, Terminator::CRLF, Terminator::CR] {
                let mut builder = WriterBuilder::new();
                builder.quote_style(*style).terminator(*term);

                let mut big = builder.from_writer(vec![]).unwrap();
                big.write_records(&rows).unwrap();
                let mut small =
                    builder.buffer_capacity(1).from_writer(vec![]).unwrap();
                small.write_records(&rows).unwrap();
                assert_eq!(wtr_as_string(big), wtr_as_string(small));
            }
        }
    }

    #[test]
    fn every_terminator_is_one_record_boundary() {
        for term in &[Terminator::LF, Terminator::CRLF, Terminator::CR] {
            let mut wtr = WriterBuilder::new()
                .terminator(*term)
                .from_writer(vec![])
                .unwrap();
            wtr.write_record(&["a", "b"]).unwrap();
            wtr.write_record(&[""]).unwrap();
            wtr.write_record(&["c"]).unwrap();
            let data = wtr.into_inner().unwrap();

            let mut rdr = Reader::from_reader(&*data);
            let got: Vec<StringRecord> =
                rdr.records().collect::<Result<_, _>>().unwrap();
            assert_eq!(got, vec![vec!["a", "b"], vec![""], vec!["c"]]);
        }
    }

    #[test]
    fn flush_on_drop() {
        let mut buf = vec![];
        {
            let mut wtr = Writer::from_writer(&mut buf);
            wtr.write_record(&["a", "b"]).unwrap();
        }
        assert_eq!(buf, b"a,b\n".to_vec());
    }

    #[test]
    fn invalid_config() {
        let res = WriterBuilder::new().quote(b',').from_writer(vec![]);
        match res {
            Err(Error::Config(ConfigError::DelimiterIsQuote(b','))) => {}
            res => panic!("expected config error, got {:?}", res.err()),
        }
        let res = WriterBuilder::new().delimiter(b'\n').from_writer(vec![]);
        match res {
            Err(Error::Config(ConfigError::LineTerminator(
                Setting::Delimiter,
                b'\n',
            ))) => {}
            res => panic!("expected config error, got {:?}", res.err()),
        }
    }

    /// A writer that accepts a fixed number of bytes and fails afterwards.
    #[derive(Debug)]
    struct LimitedWriter {
        data: Vec<u8>,
        limit: usize,
    }

    impl io::Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() >= self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "full"));
            }
            let n = buf.len().min(self.limit - self.data.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn io_error_while_writing() {
        let inner = LimitedWriter { data: vec![], limit: 3 };
        let mut wtr =
            WriterBuilder::new().buffer_capacity(4).from_writer(inner).unwrap();
        let err = wtr.write_record(&["abcdefgh"]).unwrap_err();
        assert!(err.is_io_error());
        assert_eq!(wtr.get_ref().data, b"abc".to_vec());
    }

    #[test]
    fn into_inner_error_keeps_writer() {
        let inner = LimitedWriter { data: vec![], limit: 2 };
        let mut wtr = Writer::from_writer(inner);
        wtr.write_record(&["abc"]).unwrap();
        let err = wtr.into_inner().unwrap_err();
        assert_eq!(err.error().to_string(), "full");
        let mut wtr = err.into_inner();
        assert_eq!(wtr.get_ref().data, b"ab".to_vec());
        assert!(wtr.flush().is_err());
    }

    /// A sink whose first write fails and whose later writes succeed.
    #[derive(Debug)]
    struct FailOnce {
        data: Vec<u8>,
        failed: bool,
    }

    impl io::Write for FailOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::Error::new(io::ErrorKind::Other, "once"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_record_stops_later_writes() {
        let inner = FailOnce { data: vec![], failed: false };
        let mut wtr =
            WriterBuilder::new().buffer_capacity(4).from_writer(inner).unwrap();
        let err = wtr.write_record(&["a,b", "c"]).unwrap_err();
        assert!(err.is_io_error());

        // The sink works again, but the torn record must not be continued.
        assert!(wtr.write_record(&["x", "y"]).unwrap_err().is_io_error());
        assert!(wtr.write_field("x").is_err());
        assert!(wtr.write_terminator().is_err());
        wtr.flush().unwrap();
        let data = wtr.into_inner().unwrap().data;
        assert!(!data.contains(&b'x'), "{:?}", String::from_utf8_lossy(&data));
        assert!(!data.contains(&b'c'), "{:?}", String::from_utf8_lossy(&data));
    }

    #[test]
    fn failed_field_stops_later_writes() {
        let inner = LimitedWriter { data: vec![], limit: 3 };
        let mut wtr =
            WriterBuilder::new().buffer_capacity(4).from_writer(inner).unwrap();
        wtr.write_field("abc").unwrap();
        assert!(wtr.write_field("d").is_err());
        assert!(wtr.write_terminator().is_err());
        assert!(wtr.write_record(&["e"]).is_err());
        assert_eq!(wtr.get_ref().data, b"abc".to_vec());
    }
}
