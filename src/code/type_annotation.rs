//! Code-level type annotations. Only the `target_info` of each annotation
//! can name code offsets; the type path and the annotation body are copied.

use nom::{
    IResult, Parser,
    bytes::complete::take,
    combinator::{eof, recognize},
    multi::count,
    number::complete::{be_u16, u8},
};

use super::relocate::{OffsetMap, RelocateError, malformed};
use crate::error::MalformedInputError;

pub(super) fn relocate(
    info: &[u8],
    map: &OffsetMap,
    attribute: &'static str,
) -> Result<Vec<u8>, MalformedInputError> {
    relocate_annotations(info, map).map_err(|err| malformed(err, attribute))
}

fn relocate_annotations(info: &[u8], map: &OffsetMap) -> Result<Vec<u8>, RelocateError> {
    let mut relocated = Vec::with_capacity(info.len());
    let (mut input, num_annotations) = be_u16(info)?;
    relocated.extend_from_slice(&num_annotations.to_be_bytes());

    for _ in 0..num_annotations {
        let target_type;
        (input, target_type) = u8(input)?;
        relocated.push(target_type);

        match target_type {
            // local_var_target
            0x40 | 0x41 => {
                let table_length;
                (input, table_length) = be_u16(input)?;
                relocated.extend_from_slice(&table_length.to_be_bytes());
                for _ in 0..table_length {
                    let (start_pc, length, index);
                    (input, start_pc) = be_u16(input)?;
                    (input, length) = be_u16(input)?;
                    (input, index) = be_u16(input)?;
                    let start = map.get(start_pc as u32)?;
                    let end = map.get(start_pc as u32 + length as u32)?;
                    relocated.extend_from_slice(&(start as u16).to_be_bytes());
                    relocated.extend_from_slice(&((end - start) as u16).to_be_bytes());
                    relocated.extend_from_slice(&index.to_be_bytes());
                }
            }
            // offset_target
            0x43..=0x46 => {
                let offset;
                (input, offset) = be_u16(input)?;
                relocated.extend_from_slice(&(map.get(offset as u32)? as u16).to_be_bytes());
            }
            // type_argument_target
            0x47..=0x4b => {
                let (offset, type_argument_index);
                (input, offset) = be_u16(input)?;
                (input, type_argument_index) = u8(input)?;
                relocated.extend_from_slice(&(map.get(offset as u32)? as u16).to_be_bytes());
                relocated.push(type_argument_index);
            }
            _ => {
                let target_info;
                (input, target_info) = take(offset_free_target_len(target_type)?)(input)?;
                relocated.extend_from_slice(target_info);
            }
        }

        let rest;
        (input, rest) = recognize((type_path, annotation)).parse(input)?;
        relocated.extend_from_slice(rest);
    }
    eof(input)?;

    Ok(relocated)
}

/// Size of the `target_info` for targets that carry no code offsets.
fn offset_free_target_len(target_type: u8) -> Result<usize, RelocateError> {
    Ok(match target_type {
        0x00 | 0x01 => 1,
        0x10 => 2,
        0x11 | 0x12 => 2,
        0x13..=0x15 => 0,
        0x16 => 1,
        0x17 => 2,
        0x42 => 2,
        _ => return Err(RelocateError::Syntax),
    })
}

fn type_path(input: &[u8]) -> IResult<&[u8], ()> {
    let (input, path_length) = u8(input)?;
    let (input, _) = take(path_length as usize * 2)(input)?;
    Ok((input, ()))
}

fn annotation(input: &[u8]) -> IResult<&[u8], ()> {
    let (input, _type_index) = be_u16(input)?;
    let (input, num_pairs) = be_u16(input)?;
    let (input, _) = count((be_u16, element_value), num_pairs as usize).parse(input)?;
    Ok((input, ()))
}

fn element_value(input: &[u8]) -> IResult<&[u8], ()> {
    let tag_input = input;
    let (input, tag) = u8(input)?;
    let input = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => be_u16(input)?.0,
        b'e' => take(4usize)(input)?.0,
        b'@' => annotation(input)?.0,
        b'[' => {
            let (input, num_values) = be_u16(input)?;
            count(element_value, num_values as usize).parse(input)?.0
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                tag_input,
                nom::error::ErrorKind::Tag,
            )));
        }
    };
    Ok((input, ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_in_targets_are_relocated() {
        let mut map = OffsetMap::new(10);
        for (from, to) in [(0, 0), (5, 3), (8, 6), (10, 8)] {
            map.insert(from, to);
        }
        let info = [
            0, 2, //
            // `new` at offset 5, empty path, @A(value = 1)
            0x44, 0, 5, 0, 0, 9, 0, 1, 0, 10, b'I', 0, 11,
            // local variable live 8..10 in slot 2, path of one step
            0x40, 0, 1, 0, 8, 0, 2, 0, 2, 1, 3, 0, 0, 9, 0, 0,
        ];
        let relocated = relocate(&info, &map, "RuntimeVisibleTypeAnnotations").unwrap();
        assert_eq!(
            relocated,
            [
                0, 2, //
                0x44, 0, 3, 0, 0, 9, 0, 1, 0, 10, b'I', 0, 11, //
                0x40, 0, 1, 0, 6, 0, 2, 0, 2, 1, 3, 0, 0, 9, 0, 0,
            ]
        );
    }

    #[test]
    fn catch_targets_are_copied() {
        let info = [0, 1, 0x42, 0, 1, 0, 0, 9, 0, 0];
        let relocated = relocate(&info, &OffsetMap::new(0), "RuntimeVisibleTypeAnnotations").unwrap();
        assert_eq!(relocated, info);
    }

    #[test]
    fn unknown_element_tags_are_malformed() {
        let info = [0, 1, 0x42, 0, 1, 0, 0, 9, 0, 1, 0, 10, b'?', 0, 0];
        assert!(matches!(
            relocate(&info, &OffsetMap::new(0), "RuntimeInvisibleTypeAnnotations"),
            Err(MalformedInputError::MalformedAttribute("RuntimeInvisibleTypeAnnotations"))
        ));
    }
}
