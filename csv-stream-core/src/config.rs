use core::fmt;

/// A configurable byte of a CSV reader or writer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Setting {
    /// The field delimiter.
    Delimiter,
    /// The quote character.
    Quote,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Setting::Delimiter => write!(f, "delimiter"),
            Setting::Quote => write!(f, "quote"),
        }
    }
}

/// An error that occurs when a reader or writer is built with a
/// configuration that cannot produce or parse unambiguous CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The delimiter and the quote character are the same byte.
    DelimiterIsQuote(u8),
    /// The given setting is `\r` or `\n`, which always terminate records.
    LineTerminator(Setting, u8),
    /// The given setting is not an ASCII byte.
    ///
    /// Non-ASCII bytes could split a multi-byte UTF-8 sequence.
    NotAscii(Setting, u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::DelimiterIsQuote(b) => write!(
                f,
                "delimiter and quote must differ, but both are {:?}",
                b as char
            ),
            ConfigError::LineTerminator(setting, b) => write!(
                f,
                "{} cannot be a line terminator, found {:?}",
                setting, b as char
            ),
            ConfigError::NotAscii(setting, b) => {
                write!(f, "{} must be an ASCII byte, found \\x{:02X}", setting, b)
            }
        }
    }
}

/// Check that a delimiter and quote pair describe an unambiguous dialect.
pub(crate) fn validate(delimiter: u8, quote: u8) -> Result<(), ConfigError> {
    for &(setting, b) in
        &[(Setting::Delimiter, delimiter), (Setting::Quote, quote)]
    {
        if !b.is_ascii() {
            return Err(ConfigError::NotAscii(setting, b));
        }
        if b == b'\r' || b == b'\n' {
            return Err(ConfigError::LineTerminator(setting, b));
        }
    }
    if delimiter == quote {
        return Err(ConfigError::DelimiterIsQuote(delimiter));
    }
    Ok(())
}
