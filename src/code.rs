//! Method bodies: the `Code` attribute, its instruction stream and the
//! code-offset tables that must follow the instructions when they move.

mod instruction;
mod relocate;
mod stack_map;
mod type_annotation;

pub use instruction::{Instruction, decode};
pub(crate) use instruction::assemble;
pub(crate) use relocate::{OffsetMap, relocate_code_attribute};

use nom::{
    IResult, Parser,
    bytes::complete::take,
    combinator::eof,
    multi::count,
    number::complete::{be_u16, be_u32},
};

use crate::{
    class::{AttributeInfo, parse_attributes, writer::{ClassfileWritable, put_table, put_u16, put_u32}},
    error::MalformedInputError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Vec<u8>,
    pub(crate) exception_table: Vec<ExceptionTableItem>,
    pub(crate) attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableItem {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl CodeAttribute {
    pub fn parse(info: &[u8]) -> Result<Self, MalformedInputError> {
        parse_code_attribute(info)
            .map(|(_, code)| code)
            .map_err(|_| MalformedInputError::MalformedAttribute("Code"))
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn instructions(&self) -> Result<Vec<(u32, Instruction<'_>)>, MalformedInputError> {
        decode(&self.code)
    }

    pub fn exception_table(&self) -> &[ExceptionTableItem] {
        &self.exception_table
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }
}

impl ClassfileWritable for ExceptionTableItem {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.start_pc);
        put_u16(buffer, self.end_pc);
        put_u16(buffer, self.handler_pc);
        put_u16(buffer, self.catch_type);
    }
}

impl ClassfileWritable for CodeAttribute {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.max_stack);
        put_u16(buffer, self.max_locals);
        put_u32(buffer, self.code.len() as u32);
        buffer.extend_from_slice(&self.code);
        put_table(buffer, &self.exception_table);
        put_table(buffer, &self.attributes);
    }
}

fn parse_code_attribute(input: &[u8]) -> IResult<&[u8], CodeAttribute> {
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, code_length) = be_u32(input)?;
    let (input, code) = take(code_length)(input)?;
    let (input, exception_table_length) = be_u16(input)?;
    let (input, exception_table) =
        count(parse_exception_table_item, exception_table_length as _).parse(input)?;
    let (input, attributes) = parse_attributes(input)?;
    eof(input)?;

    Ok((
        input,
        CodeAttribute {
            max_stack,
            max_locals,
            code: code.to_vec(),
            exception_table,
            attributes,
        },
    ))
}

fn parse_exception_table_item(input: &[u8]) -> IResult<&[u8], ExceptionTableItem> {
    let (input, start_pc) = be_u16(input)?;
    let (input, end_pc) = be_u16(input)?;
    let (input, handler_pc) = be_u16(input)?;
    let (input, catch_type) = be_u16(input)?;
    Ok((
        input,
        ExceptionTableItem {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        },
    ))
}
