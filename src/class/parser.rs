use crate::{
    class::{AttributeInfo, ClassFile, ConstantPool, ConstantPoolInfo, FieldInfo, JavaString, MethodInfo},
    consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag},
};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, take},
    combinator::{eof, map},
    error::{Error, ErrorKind},
    multi::length_count,
    number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, u8},
    sequence::preceded,
};

const MAGIC: &[u8] = &[0xca, 0xfe, 0xba, 0xbe];

pub fn class_file(input: &[u8]) -> Result<ClassFile, nom::Err<Error<&[u8]>>> {
    let (input, (minor_version, major_version)) = preceded(tag(MAGIC), (be_u16, be_u16)).parse(input)?;
    let (input, constant_pool) = parse_constant_pool(input)?;
    let (input, (access_flags, this_class, super_class)) = (be_u16, be_u16, be_u16).parse(input)?;
    let (input, interfaces) = length_count(be_u16, be_u16).parse(input)?;
    let (input, fields) = length_count(be_u16, parse_field).parse(input)?;
    let (input, methods) = length_count(be_u16, parse_method).parse(input)?;
    let (input, attributes) = parse_attributes(input)?;
    eof(input)?;

    Ok(ClassFile {
        minor_version,
        major_version,
        constant_pool: ConstantPool::new(constant_pool),
        access_flags: ClassAccessFlag::from_bits_retain(access_flags),
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

/// Long and Double take two slots; the second is kept as `Empty` so that
/// entries stay addressable by their 1-based index.
fn parse_constant_pool(input: &[u8]) -> IResult<&[u8], Vec<ConstantPoolInfo>> {
    let (mut input, constant_pool_count) = be_u16(input)?;
    let slots = usize::from(constant_pool_count).saturating_sub(1);

    let mut entries = Vec::with_capacity(slots);
    while entries.len() < slots {
        let (rest, entry) = parse_constant(input)?;
        input = rest;
        let wide = matches!(entry, ConstantPoolInfo::Long(_) | ConstantPoolInfo::Double(_));
        entries.push(entry);
        if wide {
            entries.push(ConstantPoolInfo::Empty);
        }
    }
    if entries.len() != slots {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Count)));
    }

    Ok((input, entries))
}

fn utf8_bytes(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, length) = be_u16(input)?;
    take(length)(input)
}

fn attribute_info(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, length) = be_u32(input)?;
    take(length)(input)
}

fn index_pair(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    (be_u16, be_u16).parse(input)
}

fn parse_constant(input: &[u8]) -> IResult<&[u8], ConstantPoolInfo> {
    let (rest, tag) = u8(input)?;
    match tag {
        1 => map(utf8_bytes, |bytes: &[u8]| {
            ConstantPoolInfo::Utf8(JavaString::from_class_bytes(bytes))
        })
        .parse(rest),
        3 => map(be_i32, ConstantPoolInfo::Integer).parse(rest),
        4 => map(be_f32, ConstantPoolInfo::Float).parse(rest),
        5 => map(be_i64, ConstantPoolInfo::Long).parse(rest),
        6 => map(be_f64, ConstantPoolInfo::Double).parse(rest),
        7 => map(be_u16, |name_index| ConstantPoolInfo::Class { name_index }).parse(rest),
        8 => map(be_u16, |string_index| ConstantPoolInfo::String { string_index }).parse(rest),
        9 => map(index_pair, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::Fieldref {
                class_index,
                name_and_type_index,
            }
        })
        .parse(rest),
        10 => map(index_pair, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            }
        })
        .parse(rest),
        11 => map(index_pair, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            }
        })
        .parse(rest),
        12 => map(index_pair, |(name_index, descriptor_index)| {
            ConstantPoolInfo::NameAndType {
                name_index,
                descriptor_index,
            }
        })
        .parse(rest),
        15 => map((u8, be_u16), |(reference_kind, reference_index)| {
            ConstantPoolInfo::MethodHandle {
                reference_kind,
                reference_index,
            }
        })
        .parse(rest),
        16 => map(be_u16, |descriptor_index| ConstantPoolInfo::MethodType { descriptor_index }).parse(rest),
        17 => map(index_pair, |(bootstrap_method_attr_index, name_and_type_index)| {
            ConstantPoolInfo::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
        })
        .parse(rest),
        18 => map(index_pair, |(bootstrap_method_attr_index, name_and_type_index)| {
            ConstantPoolInfo::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
        })
        .parse(rest),
        19 => map(be_u16, |name_index| ConstantPoolInfo::Module { name_index }).parse(rest),
        20 => map(be_u16, |name_index| ConstantPoolInfo::Package { name_index }).parse(rest),
        _ => {
            tracing::debug!(tag, "unknown constant pool tag");
            Err(nom::Err::Failure(Error::new(input, ErrorKind::Tag)))
        }
    }
}

/// Access flags, name index, descriptor index and attributes: the layout
/// shared by fields and methods.
fn parse_member(input: &[u8]) -> IResult<&[u8], (u16, u16, u16, Vec<AttributeInfo>)> {
    (be_u16, be_u16, be_u16, parse_attributes).parse(input)
}

fn parse_field(input: &[u8]) -> IResult<&[u8], FieldInfo> {
    map(parse_member, |(access_flags, name_index, descriptor_index, attributes)| FieldInfo {
        access_flags: FieldAccessFlag::from_bits_retain(access_flags),
        name_index,
        descriptor_index,
        attributes,
    })
    .parse(input)
}

fn parse_method(input: &[u8]) -> IResult<&[u8], MethodInfo> {
    map(parse_member, |(access_flags, name_index, descriptor_index, attributes)| MethodInfo {
        access_flags: MethodAccessFlag::from_bits_retain(access_flags),
        name_index,
        descriptor_index,
        attributes,
    })
    .parse(input)
}

/// Attributes are kept raw; only the ones the lowering edits are decoded,
/// and only when it edits them.
pub(crate) fn parse_attributes(input: &[u8]) -> IResult<&[u8], Vec<AttributeInfo>> {
    length_count(
        be_u16,
        map((be_u16, attribute_info), |(attribute_name_index, info): (u16, &[u8])| {
            AttributeInfo {
                attribute_name_index,
                info: info.to_vec(),
            }
        }),
    )
    .parse(input)
}
