mod parser;
mod structs;
pub(crate) mod writer;

pub use structs::*;

use crate::error::MalformedInputError;
use writer::ClassfileWritable;

pub(crate) use parser::parse_attributes;

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, MalformedInputError> {
        parser::class_file(bytes).map_err(|err| MalformedInputError::from_nom(bytes, err))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_classfile_bytes()
    }
}
