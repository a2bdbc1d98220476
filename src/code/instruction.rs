use nom::number::complete::{be_i16, be_i32, be_u16, u8};

use super::OffsetMap;
use crate::{
    consts::instructions as inst,
    error::{MalformedInputError, TransformError},
};

/// One decoded instruction. Only the shapes that must be re-encoded when
/// code moves, or that the lowering inspects, get their own variant;
/// everything else is carried as its original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    Plain { opcode: u8, operands: &'a [u8] },
    Ldc { opcode: u8, index: u16 },
    /// Absolute target offset.
    Branch { opcode: u8, target: u32 },
    TableSwitch {
        default: u32,
        low: i32,
        targets: Vec<u32>,
    },
    LookupSwitch {
        default: u32,
        pairs: Vec<(i32, u32)>,
    },
    /// invokevirtual, invokespecial or invokestatic.
    MethodCall { opcode: u8, index: u16 },
    InvokeDynamic { index: u16 },
}

impl Instruction<'_> {
    pub fn opcode(&self) -> u8 {
        match *self {
            Instruction::Plain { opcode, .. }
            | Instruction::Ldc { opcode, .. }
            | Instruction::Branch { opcode, .. }
            | Instruction::MethodCall { opcode, .. } => opcode,
            Instruction::TableSwitch { .. } => inst::TABLESWITCH,
            Instruction::LookupSwitch { .. } => inst::LOOKUPSWITCH,
            Instruction::InvokeDynamic { .. } => inst::INVOKEDYNAMIC,
        }
    }

    /// Encoded size when placed at `offset`.
    fn encoded_len(&self, offset: u32) -> u32 {
        match self {
            Instruction::Plain { operands, .. } => 1 + operands.len() as u32,
            Instruction::Ldc { opcode, .. } => {
                if *opcode == inst::LDC {
                    2
                } else {
                    3
                }
            }
            Instruction::Branch { opcode, .. } => {
                if is_wide_branch(*opcode) {
                    5
                } else {
                    3
                }
            }
            Instruction::TableSwitch { targets, .. } => {
                1 + switch_padding(offset) + 12 + 4 * targets.len() as u32
            }
            Instruction::LookupSwitch { pairs, .. } => {
                1 + switch_padding(offset) + 8 + 8 * pairs.len() as u32
            }
            Instruction::MethodCall { .. } => 3,
            Instruction::InvokeDynamic { .. } => 5,
        }
    }
}

fn is_wide_branch(opcode: u8) -> bool {
    matches!(opcode, inst::GOTO_W | inst::JSR_W)
}

/// Zero bytes between a switch opcode and its 4-byte aligned operands.
fn switch_padding(opcode_offset: u32) -> u32 {
    (4 - (opcode_offset + 1) % 4) % 4
}

/// Operand bytes of the instructions carried verbatim.
fn plain_operand_len(opcode: u8) -> Option<usize> {
    Some(match opcode {
        0x00..=0x0f => 0,
        inst::BIPUSH => 1,
        inst::SIPUSH => 2,
        0x15..=0x19 => 1,
        0x1a..=0x35 => 0,
        0x36..=0x3a => 1,
        0x3b..=0x83 => 0,
        inst::IINC => 2,
        0x85..=0x98 => 0,
        inst::RET => 1,
        0xac..=0xb1 => 0,
        0xb2..=0xb5 => 2,
        inst::INVOKEINTERFACE => 4,
        inst::NEW => 2,
        inst::NEWARRAY => 1,
        inst::ANEWARRAY => 2,
        0xbe | 0xbf => 0,
        inst::CHECKCAST | inst::INSTANCEOF => 2,
        0xc2 | 0xc3 => 0,
        inst::MULTIANEWARRAY => 3,
        inst::BREAKPOINT | inst::IMPDEP1 | inst::IMPDEP2 => 0,
        _ => return None,
    })
}

type DecodeResult<'a, T> = Result<(&'a [u8], T), MalformedInputError>;

fn truncated(_: nom::Err<nom::error::Error<&[u8]>>) -> MalformedInputError {
    MalformedInputError::MalformedAttribute("Code")
}

fn absolute(offset: usize, relative: i64) -> Result<u32, MalformedInputError> {
    let target = offset as i64 + relative;
    u32::try_from(target).map_err(|_| MalformedInputError::InvalidCodeOffset(offset as u32))
}

/// Decodes a whole instruction stream into `(offset, instruction)` pairs.
pub fn decode(code: &[u8]) -> Result<Vec<(u32, Instruction<'_>)>, MalformedInputError> {
    let mut instructions = Vec::new();
    let mut input = code;
    while !input.is_empty() {
        let offset = code.len() - input.len();
        let instruction;
        (input, instruction) = decode_one(input, offset)?;
        instructions.push((offset as u32, instruction));
    }
    Ok(instructions)
}

fn decode_one(input: &[u8], offset: usize) -> DecodeResult<'_, Instruction<'_>> {
    let (rest, opcode) = u8(input).map_err(truncated)?;
    let operand_len = match opcode {
        inst::LDC => {
            let (rest, index) = u8(rest).map_err(truncated)?;
            return Ok((
                rest,
                Instruction::Ldc {
                    opcode,
                    index: index as u16,
                },
            ));
        }
        inst::LDC_W | inst::LDC2_W => {
            let (rest, index) = be_u16(rest).map_err(truncated)?;
            return Ok((rest, Instruction::Ldc { opcode, index }));
        }
        0x99..=0xa8 | inst::IFNULL | inst::IFNONNULL => {
            let (rest, relative) = be_i16(rest).map_err(truncated)?;
            let target = absolute(offset, relative as i64)?;
            return Ok((rest, Instruction::Branch { opcode, target }));
        }
        inst::GOTO_W | inst::JSR_W => {
            let (rest, relative) = be_i32(rest).map_err(truncated)?;
            let target = absolute(offset, relative as i64)?;
            return Ok((rest, Instruction::Branch { opcode, target }));
        }
        inst::TABLESWITCH => return decode_table_switch(rest, offset),
        inst::LOOKUPSWITCH => return decode_lookup_switch(rest, offset),
        inst::INVOKEVIRTUAL | inst::INVOKESPECIAL | inst::INVOKESTATIC => {
            let (rest, index) = be_u16(rest).map_err(truncated)?;
            return Ok((rest, Instruction::MethodCall { opcode, index }));
        }
        inst::INVOKEDYNAMIC => {
            let (rest, index) = be_u16(rest).map_err(truncated)?;
            let (rest, _) = be_u16(rest).map_err(truncated)?;
            return Ok((rest, Instruction::InvokeDynamic { index }));
        }
        inst::WIDE => {
            let (_, modified) = u8(rest).map_err(truncated)?;
            match modified {
                inst::IINC => 5,
                0x15..=0x19 | 0x36..=0x3a | inst::RET => 3,
                _ => {
                    return Err(MalformedInputError::InvalidOpcode {
                        opcode: modified,
                        offset: offset + 1,
                    });
                }
            }
        }
        _ => plain_operand_len(opcode).ok_or(MalformedInputError::InvalidOpcode { opcode, offset })?,
    };
    if rest.len() < operand_len {
        return Err(MalformedInputError::MalformedAttribute("Code"));
    }
    let (operands, rest) = rest.split_at(operand_len);
    Ok((rest, Instruction::Plain { opcode, operands }))
}

fn skip_padding(input: &[u8], offset: usize) -> Result<&[u8], MalformedInputError> {
    let padding = switch_padding(offset as u32) as usize;
    input
        .get(padding..)
        .ok_or(MalformedInputError::MalformedAttribute("Code"))
}

fn decode_table_switch(input: &[u8], offset: usize) -> DecodeResult<'_, Instruction<'_>> {
    let input = skip_padding(input, offset)?;
    let (input, default) = be_i32(input).map_err(truncated)?;
    let (input, low) = be_i32(input).map_err(truncated)?;
    let (mut input, high) = be_i32(input).map_err(truncated)?;
    if high < low {
        return Err(MalformedInputError::MalformedAttribute("Code"));
    }
    let entries = (high as i64 - low as i64 + 1) as usize;
    if input.len() / 4 < entries {
        return Err(MalformedInputError::MalformedAttribute("Code"));
    }
    let mut targets = Vec::with_capacity(entries);
    for _ in 0..entries {
        let relative;
        (input, relative) = be_i32(input).map_err(truncated)?;
        targets.push(absolute(offset, relative as i64)?);
    }
    Ok((
        input,
        Instruction::TableSwitch {
            default: absolute(offset, default as i64)?,
            low,
            targets,
        },
    ))
}

fn decode_lookup_switch(input: &[u8], offset: usize) -> DecodeResult<'_, Instruction<'_>> {
    let input = skip_padding(input, offset)?;
    let (input, default) = be_i32(input).map_err(truncated)?;
    let (mut input, npairs) = be_i32(input).map_err(truncated)?;
    let npairs = usize::try_from(npairs).map_err(|_| MalformedInputError::MalformedAttribute("Code"))?;
    if input.len() / 8 < npairs {
        return Err(MalformedInputError::MalformedAttribute("Code"));
    }
    let mut pairs = Vec::with_capacity(npairs);
    for _ in 0..npairs {
        let (key, relative);
        (input, key) = be_i32(input).map_err(truncated)?;
        (input, relative) = be_i32(input).map_err(truncated)?;
        pairs.push((key, absolute(offset, relative as i64)?));
    }
    Ok((
        input,
        Instruction::LookupSwitch {
            default: absolute(offset, default as i64)?,
            pairs,
        },
    ))
}

/// Lays the instructions out afresh. Returns the new code and the mapping
/// from every original instruction offset (and the original code length) to
/// its new position.
pub(crate) fn assemble(
    instructions: &[(u32, Instruction<'_>)],
    original_length: u32,
) -> Result<(Vec<u8>, OffsetMap), TransformError> {
    let mut map = OffsetMap::new(original_length);
    let mut position = 0u32;
    for (original, instruction) in instructions {
        map.insert(*original, position);
        position += instruction.encoded_len(position);
    }
    map.insert(original_length, position);

    let mut code = Vec::with_capacity(position as usize);
    for (original, instruction) in instructions {
        let at = code.len() as u32;
        let relative = |target: u32| -> Result<i64, TransformError> {
            Ok(map.get(target)? as i64 - at as i64)
        };
        let short = |target: u32| -> Result<[u8; 2], TransformError> {
            let relative = relative(target)?;
            i16::try_from(relative)
                .map(i16::to_be_bytes)
                .map_err(|_| TransformError::BranchOutOfRange { offset: *original })
        };
        let long = |target: u32| -> Result<[u8; 4], TransformError> {
            let relative = relative(target)?;
            i32::try_from(relative)
                .map(i32::to_be_bytes)
                .map_err(|_| TransformError::BranchOutOfRange { offset: *original })
        };

        code.push(instruction.opcode());
        match instruction {
            Instruction::Plain { operands, .. } => code.extend_from_slice(operands),
            Instruction::Ldc { opcode, index } => {
                if *opcode == inst::LDC {
                    code.push(*index as u8);
                } else {
                    code.extend_from_slice(&index.to_be_bytes());
                }
            }
            Instruction::Branch { opcode, target } => {
                if is_wide_branch(*opcode) {
                    code.extend_from_slice(&long(*target)?);
                } else {
                    code.extend_from_slice(&short(*target)?);
                }
            }
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                code.resize(code.len() + switch_padding(at) as usize, 0);
                code.extend_from_slice(&long(*default)?);
                code.extend_from_slice(&low.to_be_bytes());
                let high = *low as i64 + targets.len() as i64 - 1;
                code.extend_from_slice(&(high as i32).to_be_bytes());
                for target in targets {
                    code.extend_from_slice(&long(*target)?);
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                code.resize(code.len() + switch_padding(at) as usize, 0);
                code.extend_from_slice(&long(*default)?);
                code.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                for (key, target) in pairs {
                    code.extend_from_slice(&key.to_be_bytes());
                    code.extend_from_slice(&long(*target)?);
                }
            }
            Instruction::MethodCall { index, .. } => code.extend_from_slice(&index.to_be_bytes()),
            Instruction::InvokeDynamic { index } => {
                code.extend_from_slice(&index.to_be_bytes());
                code.extend_from_slice(&[0, 0]);
            }
        }
    }
    debug_assert_eq!(code.len() as u32, position);

    Ok((code, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_every_shape() {
        let code = [
            inst::ALOAD_0,
            inst::INVOKEDYNAMIC, 0, 7, 0, 0,
            inst::IFNULL, 0, 14,
            inst::LDC, 3,
            inst::WIDE, inst::IINC, 0, 1, 0, 2,
            inst::INVOKESTATIC, 0, 9,
            inst::RETURN,
        ];
        let decoded = decode(&code).unwrap();
        assert_eq!(
            decoded,
            vec![
                (0, Instruction::Plain { opcode: inst::ALOAD_0, operands: &[] }),
                (1, Instruction::InvokeDynamic { index: 7 }),
                (6, Instruction::Branch { opcode: inst::IFNULL, target: 20 }),
                (9, Instruction::Ldc { opcode: inst::LDC, index: 3 }),
                (11, Instruction::Plain { opcode: inst::WIDE, operands: &[inst::IINC, 0, 1, 0, 2] }),
                (17, Instruction::MethodCall { opcode: inst::INVOKESTATIC, index: 9 }),
                (20, Instruction::Plain { opcode: inst::RETURN, operands: &[] }),
            ]
        );
    }

    #[test]
    fn reassembling_unchanged_code_is_identity() {
        let code = [
            inst::ILOAD, 1,
            inst::TABLESWITCH, 0, // padding up to offset 4
            0, 0, 0, 26, // default -> 28
            0, 0, 0, 0, // low
            0, 0, 0, 1, // high
            0, 0, 0, 26, 0, 0, 0, 27,
            inst::NOP,
            inst::GOTO, 0xff, 0xff, // back to the nop
            inst::RETURN,
            inst::RETURN,
        ];
        let decoded = decode(&code).unwrap();
        let (assembled, map) = assemble(&decoded, code.len() as u32).unwrap();
        assert_eq!(assembled, code);
        assert_eq!(map.get(24).unwrap(), 24);
        assert_eq!(map.get(code.len() as u32).unwrap(), code.len() as u32);
    }

    #[test]
    fn shrinking_an_instruction_moves_branches_and_switch_padding() {
        let code = [
            inst::INVOKEDYNAMIC, 0, 7, 0, 0, // 0
            inst::GOTO, 0, 4, // 5 -> 9
            inst::NOP, // 8
            inst::LOOKUPSWITCH, 0, 0, // 9, padded to 12
            0, 0, 0, 12, // default -> 21
            0, 0, 0, 0, // npairs
            inst::RETURN, // 20
            inst::RETURN, // 21
        ];
        let mut decoded = decode(&code).unwrap();
        decoded[0].1 = Instruction::MethodCall {
            opcode: inst::INVOKESTATIC,
            index: 8,
        };
        let (assembled, map) = assemble(&decoded, code.len() as u32).unwrap();
        assert_eq!(
            assembled,
            vec![
                inst::INVOKESTATIC, 0, 8, // 0
                inst::GOTO, 0, 4, // 3 -> 7
                inst::NOP, // 6
                inst::LOOKUPSWITCH, // 7, no padding needed
                0, 0, 0, 10, // default -> 17
                0, 0, 0, 0,
                inst::RETURN, // 16
                inst::RETURN, // 17
            ]
        );
        assert_eq!(map.get(9).unwrap(), 7);
        assert_eq!(map.get(21).unwrap(), 17);
        assert_eq!(map.get(22).unwrap(), 18);
        assert!(map.get(2).is_err());
    }

    #[test]
    fn rejects_unknown_opcodes_and_truncation() {
        assert!(matches!(
            decode(&[inst::NOP, 0xe0]),
            Err(MalformedInputError::InvalidOpcode { opcode: 0xe0, offset: 1 })
        ));
        assert!(decode(&[inst::SIPUSH, 1]).is_err());
        assert!(decode(&[inst::WIDE, inst::NOP]).is_err());
        assert!(decode(&[inst::GOTO, 0xff, 0x00]).is_err());
    }
}
