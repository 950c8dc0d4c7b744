/*!
`csv-stream-core` provides the two state machines at the heart of
`csv-stream`: a CSV parser and a CSV escaper.

Neither of them allocates or performs I/O. Callers feed them slices of bytes
and provide slices to write into, and the machines report how far they got.
This makes them usable with any source or sink, including in `no_std`
environments. Most users want the `csv-stream` crate instead, which wraps
these machines around `std::io::Read` and `std::io::Write`.

# Example: parsing a record

```
use csv_stream_core::{ReadRecordResult, Reader};

let data = b"a,\"b \"\"c\"\"\",d\n";
let mut rdr = Reader::new();
let mut out = [0; 64];
let mut ends = [0; 8];

let (res, nin, nout, nend) = rdr.read_record(data, &mut out, &mut ends);
assert_eq!(res, ReadRecordResult::Record);
assert_eq!(nin, data.len());
assert_eq!(&out[..nout], b"ab \"c\"d");
assert_eq!(&ends[..nend], &[1, 6, 7]);
```

# Example: writing a field

```
use csv_stream_core::{WriteResult, Writer};

let mut wtr = Writer::new();
let mut out = [0; 64];

let (res, nin, n1) = wtr.field(b"x,y", &mut out);
assert_eq!((res, nin), (WriteResult::InputEmpty, 3));
let (_, n2) = wtr.terminator(&mut out[n1..]);
assert_eq!(&out[..n1 + n2], b"\"x,y\"\n");
```
*/

#![deny(missing_docs)]
#![no_std]

pub use crate::config::{ConfigError, Setting};
pub use crate::reader::{Malformed, ReadRecordResult, Reader, ReaderBuilder};
pub use crate::writer::{
    QuoteStyle, Terminator, WriteResult, Writer, WriterBuilder,
};

mod config;
mod reader;
mod writer;
