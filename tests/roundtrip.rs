use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use csv_stream::{
    ByteRecord, Error, Malformed, QuoteStyle, Reader, ReaderBuilder,
    StringRecord, Terminator, Writer, WriterBuilder,
};
use quickcheck::{quickcheck, TestResult};

fn write_rows(builder: &WriterBuilder, rows: &[Vec<String>]) -> Vec<u8> {
    let mut wtr = builder.from_writer(vec![]).unwrap();
    wtr.write_records(rows).unwrap();
    wtr.into_inner().unwrap()
}

fn read_rows(builder: &ReaderBuilder, data: &[u8]) -> Vec<Vec<String>> {
    let mut rdr = builder.from_reader(data).unwrap();
    let mut rows = vec![];
    for result in rdr.records() {
        let record = result.unwrap();
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }
    rows
}

/// A row with no fields is written as a blank line, which reads back as a
/// row with one empty field.
fn normalize(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| if row.is_empty() { vec![String::new()] } else { row.clone() })
        .collect()
}

#[test]
fn roundtrip_default() {
    fn prop(rows: Vec<Vec<String>>) -> bool {
        let data = write_rows(&WriterBuilder::new(), &rows);
        read_rows(&ReaderBuilder::new(), &data) == normalize(&rows)
    }
    quickcheck(prop as fn(Vec<Vec<String>>) -> bool);
}

#[test]
fn roundtrip_every_dialect() {
    fn prop(rows: Vec<Vec<String>>, pick: u8) -> bool {
        let style = if pick & 1 == 0 {
            QuoteStyle::Necessary
        } else {
            QuoteStyle::Always
        };
        let term = match (pick >> 1) % 3 {
            0 => Terminator::LF,
            1 => Terminator::CRLF,
            _ => Terminator::CR,
        };
        let (delimiter, quote) = match (pick >> 3) % 3 {
            0 => (b',', b'"'),
            1 => (b'\t', b'\''),
            _ => (b';', b'|'),
        };

        let mut wb = WriterBuilder::new();
        wb.quote_style(style).terminator(term).delimiter(delimiter).quote(quote);
        let mut rb = ReaderBuilder::new();
        rb.delimiter(delimiter).quote(quote);

        let data = write_rows(&wb, &rows);
        read_rows(&rb, &data) == normalize(&rows)
    }
    quickcheck(prop as fn(Vec<Vec<String>>, u8) -> bool);
}

#[test]
fn reserialize_is_stable() {
    fn prop(rows: Vec<Vec<String>>) -> bool {
        let once = write_rows(&WriterBuilder::new(), &rows);
        let parsed = read_rows(&ReaderBuilder::new(), &once);
        let twice = write_rows(&WriterBuilder::new(), &parsed);
        let normalized = write_rows(&WriterBuilder::new(), &normalize(&rows));
        once == twice && twice == normalized
    }
    quickcheck(prop as fn(Vec<Vec<String>>) -> bool);
}

#[test]
fn tiny_buffers_agree() {
    fn prop(rows: Vec<Vec<String>>) -> TestResult {
        if rows.is_empty() {
            return TestResult::discard();
        }
        let data = write_rows(&WriterBuilder::new(), &rows);
        let tiny = write_rows(WriterBuilder::new().buffer_capacity(1), &rows);
        if data != tiny {
            return TestResult::failed();
        }
        let got = read_rows(ReaderBuilder::new().buffer_capacity(1), &data);
        TestResult::from_bool(got == normalize(&rows))
    }
    quickcheck(prop as fn(Vec<Vec<String>>) -> TestResult);
}

#[test]
fn arbitrary_bytes_never_panic() {
    fn prop(data: Vec<u8>) -> bool {
        let mut rdr = Reader::from_reader(&*data);
        let mut rec = ByteRecord::new();
        loop {
            match rdr.read_byte_record(&mut rec) {
                Ok(true) => continue,
                Ok(false) => return true,
                Err(Error::Malformed { .. }) => return rdr.is_done(),
                Err(_) => return false,
            }
        }
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

fn records(data: &str) -> Vec<StringRecord> {
    let mut rdr = Reader::from_reader(data.as_bytes());
    rdr.records().collect::<Result<_, _>>().unwrap()
}

#[test]
fn escaped_quote() {
    assert_eq!(
        records("a,\"he said \"\"hi\"\"\",b"),
        vec![vec!["a", "he said \"hi\"", "b"]]
    );

    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(&["a", "he said \"hi\"", "b"]).unwrap();
    let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(data, "a,\"he said \"\"hi\"\"\",b\n");
}

#[test]
fn embedded_newline() {
    assert_eq!(
        records("x,\"line1\nline2\",y"),
        vec![vec!["x", "line1\nline2", "y"]]
    );
}

#[test]
fn crlf_and_lf_read_the_same() {
    assert_eq!(records("a,b\r\nc,d\r\n"), records("a,b\nc,d\n"));
    assert_eq!(records("a,b\r\nc,d\r\n"), vec![vec!["a", "b"], vec!["c", "d"]]);
}

#[test]
fn trailing_delimiter() {
    assert_eq!(records("a,b,"), vec![vec!["a", "b", ""]]);
}

#[test]
fn ragged_rows() {
    assert_eq!(
        records("a,b,c\nd\n\ne,f"),
        vec![vec!["a", "b", "c"], vec!["d"], vec![""], vec!["e", "f"]]
    );
}

#[test]
fn unterminated_quote_stops_reading() {
    let data = "name,note\nalice,\"fine\"\nbob,\"oops\n";
    let mut rdr = Reader::from_reader(data.as_bytes());
    let mut it = rdr.records();
    assert_eq!(it.next().unwrap().unwrap(), vec!["name", "note"]);
    assert_eq!(it.next().unwrap().unwrap(), vec!["alice", "fine"]);
    match it.next() {
        Some(Err(err)) => {
            let pos = err.position().unwrap().clone();
            assert_eq!(pos.byte(), data.len() as u64);
            assert_eq!(pos.line(), 4);
            assert_eq!(pos.record(), 2);
            match err {
                Error::Malformed { err, .. } => {
                    assert_eq!(err, Malformed::UnterminatedQuote)
                }
                err => panic!("unexpected error: {}", err),
            }
        }
        res => panic!("expected an error, got {:?}", res),
    }
    assert!(it.next().is_none());
}

#[test]
fn content_after_quote_is_reported() {
    let mut rdr = Reader::from_reader("x\n\"a\"b\n".as_bytes());
    let got: Vec<Result<StringRecord, Error>> = rdr.records().collect();
    assert_eq!(got.len(), 2);
    match got[1] {
        Err(Error::Malformed { ref pos, err }) => {
            assert_eq!(err, Malformed::ContentAfterQuote(b'b'));
            assert_eq!(pos.byte(), 6);
            assert_eq!(pos.line(), 2);
            assert_eq!(pos.record(), 1);
        }
        ref res => panic!("expected malformed error, got {:?}", res),
    }
}

#[test]
fn bad_config_is_rejected_up_front() {
    for &(delimiter, quote) in &[(b'"', b'"'), (b'\n', b'"'), (b',', b'\r')] {
        let res = ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .from_reader(io::empty());
        assert!(matches!(res, Err(Error::Config(_))));

        let res = WriterBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .from_writer(io::sink());
        assert!(matches!(res, Err(Error::Config(_))));
    }
}

/// An endless source of CSV rows.
struct Endless {
    row: &'static [u8],
    pos: usize,
    read: u64,
}

impl io::Read for Endless {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            buf[n] = self.row[self.pos];
            self.pos = (self.pos + 1) % self.row.len();
            n += 1;
        }
        self.read += n as u64;
        Ok(n)
    }
}

#[test]
fn early_stop_on_endless_input() {
    let src = Endless { row: b"a,\"b\nc\",d\n", pos: 0, read: 0 };
    let mut rdr = ReaderBuilder::new().buffer_capacity(64).from_reader(src).unwrap();
    let first: Vec<StringRecord> =
        rdr.records().take(1000).collect::<Result<_, _>>().unwrap();
    assert_eq!(first.len(), 1000);
    assert!(first.iter().all(|r| *r == vec!["a", "b\nc", "d"]));
    assert_eq!(rdr.position().record(), 1000);
    assert_eq!(rdr.position().line(), 2001);
    // Only what was needed, plus at most one buffer, was pulled.
    let src = rdr.into_inner();
    assert!(src.read <= 1000 * 10 + 64, "read {} bytes", src.read);
}

#[test]
fn streaming_copy() {
    let src = Endless { row: b"x,\"y,z\"\r\n", pos: 0, read: 0 };
    let rdr = Reader::from_reader(src);
    let mut wtr = Writer::from_writer(vec![]);
    for result in rdr.into_byte_records().take(3) {
        wtr.write_byte_record(&result.unwrap()).unwrap();
    }
    let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(data, "x,\"y,z\"\nx,\"y,z\"\nx,\"y,z\"\n");
}

fn tmp_path(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    path.push(format!("csv-stream-{}-{}", std::process::id(), name));
    path
}

#[test]
fn files() {
    let path = tmp_path("files.csv");
    {
        let mut wtr = Writer::from_path(&path).unwrap();
        wtr.write_record(&["a", "b\nc"]).unwrap();
        wtr.write_record(&["d", ""]).unwrap();
        wtr.flush().unwrap();
    }
    let mut rdr = Reader::from_path(&path).unwrap();
    let got: Vec<StringRecord> =
        rdr.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(got, vec![vec!["a", "b\nc"], vec!["d", ""]]);
    fs::remove_file(&path).unwrap();

    match Reader::from_path(tmp_path("does-not-exist.csv")) {
        Err(err) => assert!(err.is_io_error()),
        Ok(_) => panic!("opened a file that does not exist"),
    }
}
