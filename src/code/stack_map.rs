//! StackMapTable frames. Frame positions are delta-encoded, so any change in
//! instruction layout means re-encoding the whole table.

use nom::{
    IResult, Parser,
    combinator::eof,
    multi::count,
    number::complete::{be_u16, u8},
};

use super::relocate::{OffsetMap, RelocateError, malformed};
use crate::{consts::attribute_names, error::MalformedInputError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),
    /// Offset of the `new` that created the value.
    Uninitialized(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    Chop(u8),
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

/// A frame with its absolute code offset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    offset: u32,
    kind: FrameKind,
}

pub(super) fn relocate(info: &[u8], map: &OffsetMap) -> Result<Vec<u8>, MalformedInputError> {
    relocate_frames(info, map).map_err(|err| malformed(err, attribute_names::STACK_MAP_TABLE))
}

fn relocate_frames(info: &[u8], map: &OffsetMap) -> Result<Vec<u8>, RelocateError> {
    let (_, mut frames) = parse_stack_map_table(info)?;
    for frame in &mut frames {
        frame.offset = map.get(frame.offset)?;
        match &mut frame.kind {
            FrameKind::SameLocals1StackItem(item) => relocate_item(item, map)?,
            FrameKind::Append(locals) => {
                for item in locals {
                    relocate_item(item, map)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                for item in locals.iter_mut().chain(stack.iter_mut()) {
                    relocate_item(item, map)?;
                }
            }
            FrameKind::Same | FrameKind::Chop(_) => {}
        }
    }
    Ok(write_stack_map_table(&frames))
}

fn relocate_item(item: &mut VerificationType, map: &OffsetMap) -> Result<(), MalformedInputError> {
    if let VerificationType::Uninitialized(offset) = item {
        *offset = map.get(*offset as u32)? as u16;
    }
    Ok(())
}

fn parse_stack_map_table(input: &[u8]) -> IResult<&[u8], Vec<Frame>> {
    let (mut input, number_of_entries) = be_u16(input)?;
    let mut frames: Vec<Frame> = Vec::with_capacity(number_of_entries as usize);
    for _ in 0..number_of_entries {
        let (delta, kind);
        (input, (delta, kind)) = parse_frame(input)?;
        let offset = match frames.last() {
            None => delta as u32,
            Some(previous) => previous.offset + delta as u32 + 1,
        };
        frames.push(Frame { offset, kind });
    }
    eof(input)?;
    Ok((input, frames))
}

fn parse_frame(input: &[u8]) -> IResult<&[u8], (u16, FrameKind)> {
    let frame_input = input;
    let (input, frame_type) = u8(input)?;
    match frame_type {
        0..=63 => Ok((input, (frame_type as u16, FrameKind::Same))),
        64..=127 => {
            let (input, item) = parse_verification_type(input)?;
            Ok((
                input,
                ((frame_type - 64) as u16, FrameKind::SameLocals1StackItem(item)),
            ))
        }
        247 => {
            let (input, delta) = be_u16(input)?;
            let (input, item) = parse_verification_type(input)?;
            Ok((input, (delta, FrameKind::SameLocals1StackItem(item))))
        }
        248..=250 => {
            let (input, delta) = be_u16(input)?;
            Ok((input, (delta, FrameKind::Chop(251 - frame_type))))
        }
        251 => {
            let (input, delta) = be_u16(input)?;
            Ok((input, (delta, FrameKind::Same)))
        }
        252..=254 => {
            let (input, delta) = be_u16(input)?;
            let (input, locals) =
                count(parse_verification_type, (frame_type - 251) as usize).parse(input)?;
            Ok((input, (delta, FrameKind::Append(locals))))
        }
        255 => {
            let (input, delta) = be_u16(input)?;
            let (input, number_of_locals) = be_u16(input)?;
            let (input, locals) =
                count(parse_verification_type, number_of_locals as usize).parse(input)?;
            let (input, number_of_stack_items) = be_u16(input)?;
            let (input, stack) =
                count(parse_verification_type, number_of_stack_items as usize).parse(input)?;
            Ok((input, (delta, FrameKind::Full { locals, stack })))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            frame_input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn parse_verification_type(input: &[u8]) -> IResult<&[u8], VerificationType> {
    let tag_input = input;
    let (input, tag) = u8(input)?;
    Ok(match tag {
        0 => (input, VerificationType::Top),
        1 => (input, VerificationType::Integer),
        2 => (input, VerificationType::Float),
        3 => (input, VerificationType::Double),
        4 => (input, VerificationType::Long),
        5 => (input, VerificationType::Null),
        6 => (input, VerificationType::UninitializedThis),
        7 => {
            let (input, class_index) = be_u16(input)?;
            (input, VerificationType::Object(class_index))
        }
        8 => {
            let (input, offset) = be_u16(input)?;
            (input, VerificationType::Uninitialized(offset))
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                tag_input,
                nom::error::ErrorKind::Tag,
            )));
        }
    })
}

fn write_stack_map_table(frames: &[Frame]) -> Vec<u8> {
    let mut info = Vec::new();
    info.extend_from_slice(&(frames.len() as u16).to_be_bytes());
    let mut previous: Option<u32> = None;
    for frame in frames {
        let delta = match previous {
            None => frame.offset,
            Some(previous) => frame.offset - previous - 1,
        } as u16;
        previous = Some(frame.offset);

        match &frame.kind {
            FrameKind::Same if delta <= 63 => info.push(delta as u8),
            FrameKind::Same => {
                info.push(251);
                info.extend_from_slice(&delta.to_be_bytes());
            }
            FrameKind::SameLocals1StackItem(item) => {
                if delta <= 63 {
                    info.push(64 + delta as u8);
                } else {
                    info.push(247);
                    info.extend_from_slice(&delta.to_be_bytes());
                }
                write_verification_type(&mut info, item);
            }
            FrameKind::Chop(k) => {
                info.push(251 - k);
                info.extend_from_slice(&delta.to_be_bytes());
            }
            FrameKind::Append(locals) => {
                info.push(251 + locals.len() as u8);
                info.extend_from_slice(&delta.to_be_bytes());
                for item in locals {
                    write_verification_type(&mut info, item);
                }
            }
            FrameKind::Full { locals, stack } => {
                info.push(255);
                info.extend_from_slice(&delta.to_be_bytes());
                for items in [locals, stack] {
                    info.extend_from_slice(&(items.len() as u16).to_be_bytes());
                    for item in items {
                        write_verification_type(&mut info, item);
                    }
                }
            }
        }
    }
    info
}

fn write_verification_type(info: &mut Vec<u8>, item: &VerificationType) {
    match *item {
        VerificationType::Top => info.push(0),
        VerificationType::Integer => info.push(1),
        VerificationType::Float => info.push(2),
        VerificationType::Double => info.push(3),
        VerificationType::Long => info.push(4),
        VerificationType::Null => info.push(5),
        VerificationType::UninitializedThis => info.push(6),
        VerificationType::Object(class_index) => {
            info.push(7);
            info.extend_from_slice(&class_index.to_be_bytes());
        }
        VerificationType::Uninitialized(offset) => {
            info.push(8);
            info.extend_from_slice(&offset.to_be_bytes());
        }
    }
}
