use std::fmt;

use thiserror::Error;

/// Fatal decode failure. Any of these aborts the parse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("buffer too short: {length} bytes, a module needs at least 8")]
    TooShort { length: usize },

    #[error("invalid magic number: {0:#010x}")]
    InvalidMagic(u32),

    #[error("unexpected end of input at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("integer representation too long at offset {offset}")]
    IntegerTooLarge { offset: usize },

    #[error("invalid UTF-8 encoding at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("section code not allowed: {code}")]
    SectionCodeNotAllowed { code: u8 },

    #[error("section present more than once: {code}")]
    DuplicateSection { code: u8 },

    #[error("section out of order: {code} after {previous}")]
    SectionOutOfOrder { code: u8, previous: u8 },

    #[error("section {code} not end-aligned: consumed {consumed} of {length} bytes")]
    SectionNotAligned {
        code: u8,
        consumed: usize,
        length: usize,
    },

    #[error("function body size did not match: declared {declared}, consumed {consumed}")]
    FunctionBodySizeMismatch { declared: u32, consumed: usize },

    #[error("illegal opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("unknown name subsection type: {0}")]
    UnknownNameSubsection(u8),

    #[error("func_type form is not func: {0:#04x}")]
    InvalidFunctionForm(u8),

    #[error("invalid value type: {0:#04x}")]
    InvalidValueType(u8),

    #[error("invalid block type: {0:#04x}")]
    InvalidBlockType(u8),

    #[error("invalid element type: {0:#04x}")]
    InvalidElementType(u8),

    #[error("invalid result arity: {0}")]
    InvalidResultCount(u8),

    #[error("invalid external kind: {0}")]
    InvalidExternalKind(u8),

    #[error("invalid mutability: {0}")]
    InvalidMutability(u8),

    #[error("invalid limits flags: {0}")]
    InvalidLimitsFlags(u8),

    #[error("zero byte expected after {mnemonic}")]
    ReservedNotZero { mnemonic: &'static str },

    #[error("constant expression required: {0}")]
    InvalidConstantExpression(String),

    #[error("{what} count {count} exceeds implementation limit {limit}")]
    LimitExceeded {
        what: &'static str,
        count: u64,
        limit: u64,
    },
}

/// Non-fatal problem found while parsing or building. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Warning {
        Warning {
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Log a warning and add it to `warnings`.
pub(crate) fn push_warning(warnings: &mut Vec<Warning>, message: impl Into<String>) {
    let warning = Warning::new(message);
    log::warn!("{warning}");
    warnings.push(warning);
}

/// Fail with `LimitExceeded` when `count` is above `limit`.
pub(crate) fn check_limit(what: &'static str, count: u32, limit: u32) -> Result<(), ParseError> {
    if count > limit {
        return Err(ParseError::LimitExceeded {
            what,
            count: count as u64,
            limit: limit as u64,
        });
    }
    Ok(())
}
