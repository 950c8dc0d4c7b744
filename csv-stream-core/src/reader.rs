use core::fmt;

use crate::config::{self, ConfigError};

/// An incremental CSV parser.
///
/// This reader parses CSV data using a four state machine. Callers feed it
/// input incrementally using the `read_record` method, which copies the
/// unescaped contents of fields into a caller provided buffer.
///
/// Note that this CSV reader is somewhat encoding agnostic. The source data
/// needs to be at least ASCII compatible. The delimiter and quote must be
/// ASCII bytes, which guarantees that they never appear inside a multi-byte
/// UTF-8 sequence.
///
/// # RFC 4180
///
/// [RFC 4180](https://tools.ietf.org/html/rfc4180)
/// is the closest thing to a specification for CSV data. This reader follows
/// it with a few differences:
///
/// * CRLF, LF and CR are each treated as a single record terminator.
/// * Records are permitted to be of varying length.
/// * A quote that does not start a field is an ordinary byte. For example,
///   `a"b` is parsed as the single field `a"b`.
/// * An empty line is a record with a single empty field.
///
/// Two inputs are rejected rather than given a best effort parse: a quoted
/// field that is still open at the end of the input, and a closing quote
/// that is followed by anything other than a delimiter, a line terminator or
/// the end of the input. Both are reported as `ReadRecordResult::Malformed`.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The current state of the machine.
    state: State,
    /// Set when the previous record ended with a `\r` at the very end of the
    /// input, so that a `\n` at the start of the next input is swallowed.
    skip_lf: bool,
    /// The number of fields completed in the current record.
    fields: usize,
    /// The current position in the output buffer when reading a record.
    output_pos: usize,
    /// Set once the input has been found to be malformed.
    failed: Option<Malformed>,
    /// The field delimiter.
    delimiter: u8,
    /// The quotation byte.
    quote: u8,
    /// The current line number.
    line: u64,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            state: State::FieldStart,
            skip_lf: false,
            fields: 0,
            output_pos: 0,
            failed: None,
            delimiter: b',',
            quote: b'"',
            line: 1,
        }
    }
}

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter and quote byte.
/// Once a CSV `Reader` is built, its configuration cannot be changed.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    rdr: Reader,
}

impl ReaderBuilder {
    /// Create a new builder.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration.
    ///
    /// This fails if the delimiter and quote are equal, if either is `\r`
    /// or `\n`, or if either is not ASCII.
    pub fn build(&self) -> Result<Reader, ConfigError> {
        config::validate(self.rdr.delimiter, self.rdr.quote)?;
        Ok(self.rdr.clone())
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.rdr.delimiter = delimiter;
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.rdr.quote = quote;
        self
    }
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The caller provided input was exhausted before the end of a record was
    /// found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The caller provided output buffer of field end positions was filled
    /// before the next field could be parsed.
    OutputEndsFull,
    /// The end of a record was found.
    Record,
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is provided
    /// by the caller.
    End,
    /// The input is not valid CSV.
    ///
    /// Once this is returned, every subsequent call returns the same result
    /// until the reader is `reset`.
    Malformed(Malformed),
}

impl ReadRecordResult {
    fn is_final(&self) -> bool {
        match *self {
            ReadRecordResult::Record
            | ReadRecordResult::End
            | ReadRecordResult::Malformed(_) => true,
            _ => false,
        }
    }
}

/// The ways in which CSV data can be malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Malformed {
    /// The input ended inside a quoted field.
    UnterminatedQuote,
    /// A closing quote was followed by the given byte instead of a
    /// delimiter, a line terminator or the end of input.
    ContentAfterQuote(u8),
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Malformed::UnterminatedQuote => {
                write!(f, "quoted field is not terminated before end of input")
            }
            Malformed::ContentAfterQuote(b) => write!(
                f,
                "found {:?} after a closing quote, expected a delimiter \
                 or line terminator",
                b as char
            ),
        }
    }
}

/// The state of the parser between two bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// At the beginning of a field.
    FieldStart,
    /// Inside a field that did not start with a quote.
    InUnquotedField,
    /// Inside a quoted field.
    InQuotedField,
    /// Just saw a quote inside a quoted field. The next byte decides whether
    /// it closed the field or was the first half of an escaped quote.
    QuotePending,
}

/// What the parser does with the byte that caused a transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Action {
    /// The byte is structural and dropped.
    Discard,
    /// The byte is field content.
    Append,
    /// The current field is complete.
    EndField,
    /// The current field and record are complete.
    EndRecord,
    /// The input is malformed.
    Fail(Malformed),
}

impl Reader {
    /// Create a new CSV reader with a default parser configuration.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    ///
    /// This also clears a previous `Malformed` result.
    pub fn reset(&mut self) {
        self.state = State::FieldStart;
        self.skip_lf = false;
        self.fields = 0;
        self.output_pos = 0;
        self.failed = None;
        self.line = 1;
    }

    /// Return the current line number as measured by the number of
    /// occurrences of `\n`.
    ///
    /// Line numbers starts at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Returns true if the previous record ended with a `\r` at the very end
    /// of the input given to `read_record`. A `\n` starting the next input
    /// still belongs to that record.
    pub fn has_pending_lf(&self) -> bool {
        self.skip_lf
    }

    /// Swallow the `\n` half of a `\r\n` terminator that was split across
    /// two inputs, and return the number of bytes consumed from `input`.
    ///
    /// This lets callers skip the `\n` before recording where the next
    /// record starts. `read_record` does the same on its own.
    pub fn skip_pending_lf(&mut self, input: &[u8]) -> usize {
        if !self.skip_lf || input.is_empty() {
            return 0;
        }
        self.skip_lf = false;
        if input[0] == b'\n' {
            self.line += 1;
            1
        } else {
            0
        }
    }

    /// Returns true if no byte of the current record has been read yet.
    pub fn is_record_start(&self) -> bool {
        self.state == State::FieldStart && self.fields == 0
    }

    /// Parse a single CSV record in `input` and copy each field contiguously
    /// to `output`, with the end position of each field written to `ends`.
    ///
    /// The field data copied to `output` has its quotes unescaped. The
    /// positions written to `ends` are relative to the start of the record,
    /// even when the record spans multiple calls. Callers are expected to
    /// pass the unused remainder of their buffers on each call.
    ///
    /// The first value returned, a `ReadRecordResult`, tells the caller what
    /// to do next. The remaining three are the number of bytes read from
    /// `input`, written to `output` and written to `ends`, respectively.
    ///
    /// # Termination
    ///
    /// This reader interprets an empty `input` buffer as an indication that
    /// there is no CSV data left to read. Namely, when the caller has
    /// exhausted all CSV data, the caller should continue to call `read` with
    /// an empty input buffer until `ReadRecordResult::End` is returned.
    ///
    /// # Errors
    ///
    /// Malformed input is reported as `ReadRecordResult::Malformed`. The
    /// byte that triggered it is counted as read.
    pub fn read_record(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if let Some(err) = self.failed {
            return (ReadRecordResult::Malformed(err), 0, 0, 0);
        }
        if input.is_empty() {
            return self.read_record_final(ends);
        }
        let (mut nin, mut nout, mut nend) = (self.skip_pending_lf(input), 0, 0);
        let mut res = ReadRecordResult::InputEmpty;
        while nin < input.len() {
            let b = input[nin];
            let (state, action) = self.transition(self.state, b);
            match action {
                Action::Append if nout >= output.len() => {
                    res = ReadRecordResult::OutputFull;
                    break;
                }
                Action::EndField | Action::EndRecord if nend >= ends.len() => {
                    res = ReadRecordResult::OutputEndsFull;
                    break;
                }
                _ => {}
            }
            self.state = state;
            self.line += (b == b'\n') as u64;
            nin += 1;
            match action {
                Action::Discard => {}
                Action::Append => {
                    output[nout] = b;
                    nout += 1;
                }
                Action::EndField => {
                    ends[nend] = self.output_pos + nout;
                    nend += 1;
                    self.fields += 1;
                }
                Action::EndRecord => {
                    ends[nend] = self.output_pos + nout;
                    nend += 1;
                    if b == b'\r' {
                        if input.get(nin) == Some(&b'\n') {
                            self.line += 1;
                            nin += 1;
                        } else {
                            self.skip_lf = true;
                        }
                    }
                    res = ReadRecordResult::Record;
                    break;
                }
                Action::Fail(err) => {
                    self.failed = Some(err);
                    res = ReadRecordResult::Malformed(err);
                    break;
                }
            }
        }
        if res.is_final() {
            self.fields = 0;
            self.output_pos = 0;
        } else {
            self.output_pos += nout;
        }
        (res, nin, nout, nend)
    }

    /// Handle the end of input.
    fn read_record_final(
        &mut self,
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        match self.state {
            State::InQuotedField => {
                let err = Malformed::UnterminatedQuote;
                self.failed = Some(err);
                (ReadRecordResult::Malformed(err), 0, 0, 0)
            }
            State::FieldStart if self.fields == 0 => {
                (ReadRecordResult::End, 0, 0, 0)
            }
            State::FieldStart
            | State::InUnquotedField
            | State::QuotePending => {
                if ends.is_empty() {
                    return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
                }
                ends[0] = self.output_pos;
                self.state = State::FieldStart;
                self.fields = 0;
                self.output_pos = 0;
                (ReadRecordResult::Record, 0, 0, 1)
            }
        }
    }

    #[inline(always)]
    fn is_line_term(&self, b: u8) -> bool {
        b == b'\n' || b == b'\r'
    }

    /// Compute the next state and what to do with `b`.
    #[inline(always)]
    pub(crate) fn transition(&self, state: State, b: u8) -> (State, Action) {
        use self::State::*;
        match state {
            FieldStart => {
                if b == self.quote {
                    (InQuotedField, Action::Discard)
                } else if b == self.delimiter {
                    (FieldStart, Action::EndField)
                } else if self.is_line_term(b) {
                    (FieldStart, Action::EndRecord)
                } else {
                    (InUnquotedField, Action::Append)
                }
            }
            InUnquotedField => {
                if b == self.delimiter {
                    (FieldStart, Action::EndField)
                } else if self.is_line_term(b) {
                    (FieldStart, Action::EndRecord)
                } else {
                    (InUnquotedField, Action::Append)
                }
            }
            InQuotedField => {
                if b == self.quote {
                    (QuotePending, Action::Discard)
                } else {
                    (InQuotedField, Action::Append)
                }
            }
            QuotePending => {
                if b == self.quote {
                    (InQuotedField, Action::Append)
                } else if b == self.delimiter {
                    (FieldStart, Action::EndField)
                } else if self.is_line_term(b) {
                    (FieldStart, Action::EndRecord)
                } else {
                    (QuotePending, Action::Fail(Malformed::ContentAfterQuote(b)))
                }
            }
        }
    }
}
