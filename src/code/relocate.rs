use nom::{
    IResult, Parser,
    combinator::eof,
    multi::count,
    number::complete::be_u16,
};

use super::{CodeAttribute, stack_map, type_annotation};
use crate::{
    class::ConstantPool,
    consts::attribute_names,
    error::{MalformedInputError, TransformError},
};

const UNMAPPED: u32 = u32::MAX;

/// Old code offset to new code offset, defined only at instruction
/// boundaries and at the end of the code.
#[derive(Debug, Clone)]
pub(crate) struct OffsetMap {
    offsets: Vec<u32>,
}

impl OffsetMap {
    pub(crate) fn new(original_length: u32) -> Self {
        OffsetMap {
            offsets: vec![UNMAPPED; original_length as usize + 1],
        }
    }

    pub(crate) fn insert(&mut self, original: u32, relocated: u32) {
        self.offsets[original as usize] = relocated;
    }

    pub(crate) fn get(&self, original: u32) -> Result<u32, MalformedInputError> {
        match self.offsets.get(original as usize) {
            Some(&relocated) if relocated != UNMAPPED => Ok(relocated),
            _ => Err(MalformedInputError::InvalidCodeOffset(original)),
        }
    }

    fn get_u16(&self, original: u16) -> Result<u16, MalformedInputError> {
        // new code is never longer than the original, which fit in a u16 range
        self.get(original as u32).map(|offset| offset as u16)
    }
}

/// Moves everything in a `Code` attribute that names a code offset.
/// Attributes that carry no offsets are left untouched.
pub(crate) fn relocate_code_attribute(
    code: &mut CodeAttribute,
    constant_pool: &ConstantPool,
    map: &OffsetMap,
) -> Result<(), TransformError> {
    for item in &mut code.exception_table {
        item.start_pc = map.get_u16(item.start_pc)?;
        item.end_pc = map.get_u16(item.end_pc)?;
        item.handler_pc = map.get_u16(item.handler_pc)?;
    }

    for attribute in &mut code.attributes {
        let name = attribute.name(constant_pool)?;
        let relocated = match name.as_ref() {
            attribute_names::LINE_NUMBER_TABLE => {
                relocate_line_numbers(&attribute.info, map).map_err(|err| {
                    malformed(err, attribute_names::LINE_NUMBER_TABLE)
                })?
            }
            attribute_names::LOCAL_VARIABLE_TABLE => {
                relocate_local_variables(&attribute.info, map).map_err(|err| {
                    malformed(err, attribute_names::LOCAL_VARIABLE_TABLE)
                })?
            }
            attribute_names::LOCAL_VARIABLE_TYPE_TABLE => {
                relocate_local_variables(&attribute.info, map).map_err(|err| {
                    malformed(err, attribute_names::LOCAL_VARIABLE_TYPE_TABLE)
                })?
            }
            attribute_names::STACK_MAP_TABLE => stack_map::relocate(&attribute.info, map)?,
            attribute_names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS => type_annotation::relocate(
                &attribute.info,
                map,
                attribute_names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS,
            )?,
            attribute_names::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => type_annotation::relocate(
                &attribute.info,
                map,
                attribute_names::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS,
            )?,
            _ => continue,
        };
        attribute.info = relocated;
    }

    Ok(())
}

/// Errors raised while rewriting a table: bad offsets are reported as
/// such, anything else as a malformed attribute.
#[derive(Debug)]
pub(super) enum RelocateError {
    Offset(MalformedInputError),
    Syntax,
}

impl From<MalformedInputError> for RelocateError {
    fn from(err: MalformedInputError) -> Self {
        RelocateError::Offset(err)
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for RelocateError {
    fn from(_: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        RelocateError::Syntax
    }
}

pub(super) fn malformed(err: RelocateError, attribute: &'static str) -> MalformedInputError {
    match err {
        RelocateError::Offset(err) => err,
        RelocateError::Syntax => MalformedInputError::MalformedAttribute(attribute),
    }
}

fn parse_u16_table<const N: usize>(input: &[u8]) -> IResult<&[u8], Vec<[u16; N]>> {
    let (input, length) = be_u16(input)?;
    let (input, rows) = count(parse_u16_row::<N>, length as usize).parse(input)?;
    eof(input)?;
    Ok((input, rows))
}

fn parse_u16_row<const N: usize>(mut input: &[u8]) -> IResult<&[u8], [u16; N]> {
    let mut row = [0u16; N];
    for cell in row.iter_mut() {
        (input, *cell) = be_u16(input)?;
    }
    Ok((input, row))
}

fn write_u16_table<const N: usize>(rows: &[[u16; N]]) -> Vec<u8> {
    let mut info = Vec::with_capacity(2 + rows.len() * N * 2);
    info.extend_from_slice(&(rows.len() as u16).to_be_bytes());
    for cell in rows.iter().flatten() {
        info.extend_from_slice(&cell.to_be_bytes());
    }
    info
}

fn relocate_line_numbers(info: &[u8], map: &OffsetMap) -> Result<Vec<u8>, RelocateError> {
    let (_, mut rows) = parse_u16_table::<2>(info)?;
    for [start_pc, _line] in &mut rows {
        *start_pc = map.get_u16(*start_pc)?;
    }
    Ok(write_u16_table(&rows))
}

/// Shared by LocalVariableTable and LocalVariableTypeTable, whose rows have
/// the same shape.
fn relocate_local_variables(info: &[u8], map: &OffsetMap) -> Result<Vec<u8>, RelocateError> {
    let (_, mut rows) = parse_u16_table::<5>(info)?;
    for [start_pc, length, ..] in &mut rows {
        let start = map.get_u16(*start_pc)?;
        let end = map.get(*start_pc as u32 + *length as u32)?;
        *start_pc = start;
        *length = (end - start as u32) as u16;
    }
    Ok(write_u16_table(&rows))
}
