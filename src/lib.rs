/*!
The `csv-stream` crate reads and writes CSV data one record at a time.

Records are never collected in memory: a reader holds its input buffer plus
the record currently being read, and a writer holds its output buffer. This
makes it suitable for data of any size.

The parsing and quoting logic lives in the `no_std` crate `csv-stream-core`,
which is driven incrementally. This crate connects it to `std::io`.

# Format

* Fields are separated by a delimiter, `,` by default.
* A field that starts with the quote byte, `"` by default, is quoted. Inside
  it, delimiters and line terminators are field content, and two quotes in a
  row stand for one literal quote.
* A quote anywhere else is an ordinary byte.
* Records end at `\n`, `\r\n` or `\r`. All three read identically, so a
  quoted field is the only way to keep a line terminator in a field.
* Records may have different numbers of fields. An empty line is a record
  with a single empty field.

Reading stops with an error at a quoted field that is never closed, or at
content following a closing quote. The error reports the byte offset, line
and record index at which it was found.

# Example

Reading records and writing them back out with a different delimiter:

```
use std::error::Error;

use csv_stream::{Reader, WriterBuilder};

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let data = "\
name,quote
alice,\"she said \"\"hi\"\"\"
bob,\"two
lines\"
";
    let mut rdr = Reader::from_reader(data.as_bytes());
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_writer(vec![])?;
    for result in rdr.records() {
        let record = result?;
        wtr.write_record(&record)?;
    }

    let out = String::from_utf8(wtr.into_inner()?)?;
    assert_eq!(out, "\
name\tquote
alice\t\"she said \"\"hi\"\"\"
bob\t\"two
lines\"
");
    Ok(())
}
```
*/

#![deny(missing_docs)]

pub use csv_stream_core::{
    ConfigError, Malformed, QuoteStyle, Setting, Terminator,
};

pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{
    Error, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::reader::{
    ByteRecordsIntoIter, ByteRecordsIter, Reader, ReaderBuilder,
    StringRecordsIntoIter, StringRecordsIter,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{Writer, WriterBuilder};

mod byte_record;
mod error;
mod reader;
mod string_record;
mod writer;
