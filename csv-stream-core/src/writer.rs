use core::cmp;

use memchr::memchr;

use crate::config::{self, ConfigError};

/// The quoting style to use when writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteStyle {
    /// This puts quotes around every field. Always.
    Always,
    /// This puts quotes around fields only when necessary.
    ///
    /// They are necessary when fields contain a quote, delimiter or line
    /// terminator (`\r` or `\n`).
    ///
    /// This is the default.
    Necessary,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// A record terminator for writing CSV data.
///
/// Every variant is recognized as a single record terminator when the data
/// is read back. There is no variant for an arbitrary byte, since a reader
/// would not split records on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// Writes `\r\n`.
    CRLF,
    /// Writes `\n`.
    LF,
    /// Writes `\r`.
    CR,
}

impl Terminator {
    fn as_bytes(&self) -> &'static [u8] {
        match *self {
            Terminator::CRLF => b"\r\n",
            Terminator::LF => b"\n",
            Terminator::CR => b"\r",
        }
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::LF
    }
}

/// A builder for configuring a CSV writer.
///
/// This builder permits specifying the CSV delimiter, terminator, quoting
/// style and quote character.
#[derive(Debug)]
pub struct WriterBuilder {
    wtr: Writer,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder::new()
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring a CSV writer.
    pub fn new() -> WriterBuilder {
        WriterBuilder { wtr: Writer::default() }
    }

    /// Build a CSV writer from this configuration.
    ///
    /// This fails if the delimiter and quote are equal, if either is `\r`
    /// or `\n`, or if either is not ASCII.
    pub fn build(&self) -> Result<Writer, ConfigError> {
        config::validate(self.wtr.delimiter, self.wtr.quote)?;
        let mut wtr = self.wtr.clone();
        wtr.requires_quotes = [false; 256];
        for &b in &[wtr.delimiter, wtr.quote, b'\r', b'\n'] {
            wtr.requires_quotes[b as usize] = true;
        }
        Ok(wtr)
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.wtr.delimiter = delimiter;
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// The default is `Terminator::LF`.
    ///
    /// Only the three terminators a reader recognizes as exactly one record
    /// boundary are offered. Arbitrary terminator bytes are not supported.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.wtr.term = term;
        self
    }

    /// The quoting style to use when writing CSV.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    /// `QuoteStyle::Always` forces quotes around every field.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.wtr.style = style;
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default value is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.wtr.quote = quote;
        self
    }
}

/// The result of writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// All of the input given was successfully copied to the output.
    InputEmpty,
    /// The output buffer was filled before all of the input could be copied.
    ///
    /// Callers should make more room in the output and call again with the
    /// remaining input.
    OutputFull,
}

/// A writer for CSV data.
///
/// # RFC 4180
///
/// This writer conforms to RFC 4180 with one exception: it doesn't guarantee
/// that all records written are of the same length. Instead, the onus is on
/// the caller to ensure that all records written are of the same length.
///
/// Quotes inside a quoted field are always escaped by doubling them.
#[derive(Clone, Debug)]
pub struct Writer {
    state: WriterState,
    requires_quotes: [bool; 256],
    delimiter: u8,
    term: Terminator,
    style: QuoteStyle,
    quote: u8,
}

#[derive(Clone, Debug, Default)]
struct WriterState {
    /// Whether `field` has been called since the last delimiter or
    /// terminator.
    in_field: bool,
    /// Whether the current field was opened with a quote.
    quoting: bool,
}

impl Default for Writer {
    fn default() -> Writer {
        let mut requires_quotes = [false; 256];
        for &b in &[b',', b'"', b'\r', b'\n'] {
            requires_quotes[b as usize] = true;
        }
        Writer {
            state: WriterState::default(),
            requires_quotes,
            delimiter: b',',
            term: Terminator::default(),
            style: QuoteStyle::default(),
            quote: b'"',
        }
    }
}

impl Writer {
    /// Creates a new CSV writer with the default configuration.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Returns true if and only if the given field must be quoted under this
    /// writer's configuration.
    pub fn should_quote(&self, field: &[u8]) -> bool {
        match self.style {
            QuoteStyle::Always => true,
            QuoteStyle::Necessary => {
                field.iter().any(|&b| self.requires_quotes[b as usize])
            }
        }
    }

    /// Write the contents of a field to `output`, quoting and escaping it
    /// as needed.
    ///
    /// The decision to quote is made on the first call for a field, so the
    /// entire field should be passed then. If `OutputFull` is returned, call
    /// again with the remaining input once `output` has room. The field is
    /// finished by a subsequent call to `delimiter` or `terminator`.
    ///
    /// This returns the result of writing, along with the number of bytes
    /// consumed from `input` and written to `output`.
    pub fn field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let mut nout = 0;
        if !self.state.in_field {
            let quoting = self.should_quote(input);
            if quoting {
                if output.is_empty() {
                    return (WriteResult::OutputFull, 0, 0);
                }
                output[0] = self.quote;
                nout += 1;
            }
            self.state.quoting = quoting;
            self.state.in_field = true;
        }
        let (res, i, o) = if self.state.quoting {
            quote(input, &mut output[nout..], self.quote)
        } else {
            copy(input, &mut output[nout..])
        };
        (res, i, nout + o)
    }

    /// Finish the current field and write a delimiter.
    ///
    /// If there is not enough room for the closing quote (if any) and the
    /// delimiter, then nothing is written and `OutputFull` is returned.
    pub fn delimiter(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let mut buf = [0; 2];
        let n = self.close_field(&mut buf);
        buf[n] = self.delimiter;
        self.write_and_reset(&buf[..n + 1], output)
    }

    /// Finish the current field and record and write a record terminator.
    ///
    /// If there is not enough room for the closing quote (if any) and the
    /// terminator, then nothing is written and `OutputFull` is returned.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let mut buf = [0; 3];
        let n = self.close_field(&mut buf);
        let term = self.term.as_bytes();
        buf[n..n + term.len()].copy_from_slice(term);
        self.write_and_reset(&buf[..n + term.len()], output)
    }

    /// Write the closing quote of the current field to `buf`, if it needs
    /// one, and return the number of bytes written.
    fn close_field(&self, buf: &mut [u8]) -> usize {
        if self.state.in_field && self.state.quoting {
            buf[0] = self.quote;
            1
        } else {
            0
        }
    }

    fn write_and_reset(
        &mut self,
        data: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize) {
        if data.len() > output.len() {
            return (WriteResult::OutputFull, 0);
        }
        output[..data.len()].copy_from_slice(data);
        self.state = WriterState::default();
        (WriteResult::InputEmpty, data.len())
    }
}

/// Copy as much of `input` to `output` as fits.
fn copy(input: &[u8], output: &mut [u8]) -> (WriteResult, usize, usize) {
    let n = cmp::min(input.len(), output.len());
    output[..n].copy_from_slice(&input[..n]);
    if n < input.len() {
        (WriteResult::OutputFull, n, n)
    } else {
        (WriteResult::InputEmpty, n, n)
    }
}

/// Copy `input` to `output`, doubling every occurrence of `quote`.
///
/// A quote is only consumed once both of its copies fit in `output`.
fn quote(
    input: &[u8],
    output: &mut [u8],
    quote: u8,
) -> (WriteResult, usize, usize) {
    let (mut nin, mut nout) = (0, 0);
    loop {
        let rest = &input[nin..];
        let next = memchr(quote, rest).unwrap_or(rest.len());
        let n = cmp::min(next, output.len() - nout);
        output[nout..nout + n].copy_from_slice(&rest[..n]);
        nin += n;
        nout += n;
        if n < next {
            return (WriteResult::OutputFull, nin, nout);
        }
        if nin >= input.len() {
            return (WriteResult::InputEmpty, nin, nout);
        }
        if output.len() - nout < 2 {
            return (WriteResult::OutputFull, nin, nout);
        }
        output[nout] = quote;
        output[nout + 1] = quote;
        nin += 1;
        nout += 2;
    }
}
