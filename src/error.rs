use std::{io, path::PathBuf};

use thiserror::Error;

/// Input bytes are not a well-formed class file.
#[derive(Error, Debug)]
pub enum MalformedInputError {
    #[error("class file is malformed at byte {offset} ({kind:?})")]
    Syntax {
        offset: usize,
        kind: nom::error::ErrorKind,
    },
    #[error("class file ended unexpectedly")]
    Incomplete,
    #[error("invalid constant pool index {0}")]
    InvalidConstantIndex(u16),
    #[error("constant pool entry {index} is not a {expected}")]
    ConstantTypeMismatch { index: u16, expected: &'static str },
    #[error("constant pool entry {0} is not valid modified UTF-8")]
    InvalidModifiedUtf8(u16),
    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),
    #[error("invalid opcode 0x{opcode:02x} at code offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },
    #[error("code offset {0} does not start an instruction")]
    InvalidCodeOffset(u32),
    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),
    #[error("bootstrap method {0} is not declared")]
    MissingBootstrapMethod(u16),
    #[error("invalid method handle reference kind {0}")]
    InvalidReferenceKind(u8),
}

impl MalformedInputError {
    /// Maps a nom failure on `input` back to an absolute byte offset.
    pub(crate) fn from_nom(input: &[u8], err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => MalformedInputError::Incomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => MalformedInputError::Syntax {
                offset: input.len() - e.input.len(),
                kind: e.code,
            },
        }
    }
}

/// The enclosing class of a lambda site cannot be found on the lookup path.
#[derive(Error, Debug)]
pub enum ClassResolutionError {
    #[error("class {name} not found in {searched} classpath entries")]
    NotFound { name: String, searched: usize },
    #[error("failed to read class {name} from {}", path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read class {name} from archive {}", path.display())]
    Archive {
        name: String,
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// The reifier could not produce a factory method for a call site.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ReificationError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ReificationError {
    pub fn new(message: impl Into<String>) -> Self {
        ReificationError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ReificationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Failure of one class transformation. No output is produced.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("malformed class file: {0}")]
    MalformedInput(#[from] MalformedInputError),
    #[error("cannot resolve enclosing class: {0}")]
    ClassResolution(#[from] ClassResolutionError),
    #[error("cannot reify lambda call site {call_site} in {class}")]
    Reification {
        class: String,
        call_site: String,
        #[source]
        source: ReificationError,
    },
    #[error("factory {owner}.{name}{descriptor} does not match call site type {call_site}")]
    FactorySignatureMismatch {
        owner: String,
        name: String,
        descriptor: String,
        call_site: String,
    },
    #[error("constant pool is full")]
    ConstantPoolFull,
    #[error("string constant of {length} bytes exceeds the 65535-byte Utf8 limit")]
    ConstantTooLong { length: usize },
    #[error("branch at code offset {offset} no longer fits its encoding")]
    BranchOutOfRange { offset: u32 },
}
