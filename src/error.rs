//! Parse and resolve errors.
//!
//! Malformed input is reported as a [`Error`] value with byte offsets and
//! line numbers for diagnostics. Misuse of the tree API (invalid indices,
//! illegal shape changes) is a programming error and panics via assertions
//! instead; it never surfaces here.

use std::fmt;

/// Errors produced by the parser and by [`crate::Tree::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Tab character used for indentation (YAML forbids tabs).
    TabIndentation {
        /// Line number (1-indexed)
        line: usize,
        /// Byte offset in input
        offset: usize,
    },

    /// Content at a column that matches no open container and cannot open
    /// a nested one.
    BadIndentation {
        /// Line number (1-indexed)
        line: usize,
        /// Column of the offending content
        col: usize,
    },

    /// Unexpected character in the given context.
    UnexpectedCharacter {
        /// Byte offset in input
        offset: usize,
        /// The unexpected character
        found: char,
        /// Description of what was expected
        context: &'static str,
    },

    /// Unclosed quote in a quoted scalar.
    UnclosedQuote {
        /// Byte offset where the quote started
        start_offset: usize,
        /// The quote character (" or ')
        quote: char,
    },

    /// Invalid escape sequence in a double-quoted scalar.
    InvalidEscape {
        /// Byte offset of the backslash
        offset: usize,
        /// The offending sequence
        sequence: String,
    },

    /// Input ended while a container or scalar was still open.
    UnexpectedEof {
        /// What was being scanned
        context: &'static str,
    },

    /// An alias referenced an anchor name with no prior definition.
    UndefinedAnchor {
        /// The anchor name (without the leading `*`)
        name: String,
    },

    /// Scalar bytes are not valid UTF-8.
    InvalidUtf8 {
        /// Byte offset where decoding failed
        offset: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TabIndentation { line, offset } => {
                write!(
                    f,
                    "tab character used for indentation at line {} (offset {})",
                    line, offset
                )
            }
            Error::BadIndentation { line, col } => {
                write!(
                    f,
                    "invalid indentation at line {}: column {} matches no open container",
                    line, col
                )
            }
            Error::UnexpectedCharacter {
                offset,
                found,
                context,
            } => {
                write!(
                    f,
                    "unexpected character '{}' at offset {}: {}",
                    found, offset, context
                )
            }
            Error::UnclosedQuote {
                start_offset,
                quote,
            } => {
                write!(
                    f,
                    "unclosed {} quote starting at offset {}",
                    if *quote == '"' { "double" } else { "single" },
                    start_offset
                )
            }
            Error::InvalidEscape { offset, sequence } => {
                write!(
                    f,
                    "invalid escape sequence '{}' at offset {}",
                    sequence, offset
                )
            }
            Error::UnexpectedEof { context } => {
                write!(f, "unexpected end of input: {}", context)
            }
            Error::UndefinedAnchor { name } => {
                write!(f, "alias '*{}' refers to an undefined anchor", name)
            }
            Error::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 sequence at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
