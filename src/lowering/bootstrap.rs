use std::{collections::HashSet, mem};

use nom::{
    IResult, Parser,
    combinator::eof,
    multi::{count, length_count},
    number::complete::be_u16,
};

use crate::{
    class::{ClassFile, ConstantPoolInfo},
    code::Instruction,
    consts::attribute_names,
    error::MalformedInputError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct BootstrapMethod {
    pub(super) method_ref: u16,
    pub(super) arguments: Vec<u16>,
}

/// The class's bootstrap method table, empty if it has none.
pub(super) fn read_bootstrap_methods(
    class: &ClassFile,
) -> Result<Vec<BootstrapMethod>, MalformedInputError> {
    for attribute in class.attributes() {
        if attribute.is_named(class.constant_pool(), attribute_names::BOOTSTRAP_METHODS)? {
            return parse_bootstrap_methods(attribute.info())
                .map(|(_, methods)| methods)
                .map_err(|_| MalformedInputError::MalformedAttribute(attribute_names::BOOTSTRAP_METHODS));
        }
    }
    Ok(Vec::new())
}

fn parse_bootstrap_methods(input: &[u8]) -> IResult<&[u8], Vec<BootstrapMethod>> {
    let (input, num_bootstrap_methods) = be_u16(input)?;
    let (input, methods) =
        count(parse_bootstrap_method, num_bootstrap_methods as usize).parse(input)?;
    eof(input)?;
    Ok((input, methods))
}

fn parse_bootstrap_method(input: &[u8]) -> IResult<&[u8], BootstrapMethod> {
    let (input, method_ref) = be_u16(input)?;
    let (input, arguments) = length_count(be_u16, be_u16).parse(input)?;
    Ok((
        input,
        BootstrapMethod {
            method_ref,
            arguments,
        },
    ))
}

/// Removes dynamic-linkage leftovers once no method needs them: the
/// BootstrapMethods attribute, and for pre-51 output also the constants an
/// older verifier would reject.
pub(super) fn tidy(class: &mut ClassFile) -> Result<(), MalformedInputError> {
    let mut has_invokedynamic = false;
    let mut loaded_constants = HashSet::new();
    for method in class.methods() {
        let Some(code) = method.code(class.constant_pool())? else {
            continue;
        };
        for (_, instruction) in code.instructions()? {
            match instruction {
                Instruction::InvokeDynamic { .. } => has_invokedynamic = true,
                Instruction::Ldc { index, .. } => {
                    loaded_constants.insert(index);
                }
                _ => {}
            }
        }
    }
    if has_invokedynamic || class.constant_pool().has_dynamic_constants() {
        return Ok(());
    }

    let mut attributes = Vec::with_capacity(class.attributes.len());
    for attribute in mem::take(&mut class.attributes) {
        if attribute.is_named(&class.constant_pool, attribute_names::BOOTSTRAP_METHODS)? {
            tracing::debug!("dropping unused BootstrapMethods attribute");
        } else {
            attributes.push(attribute);
        }
    }
    class.attributes = attributes;

    if class.version().supports_dynamic_linkage() {
        return Ok(());
    }

    let stale: Vec<u16> = class
        .constant_pool()
        .iter()
        .filter_map(|(index, entry)| match entry {
            ConstantPoolInfo::InvokeDynamic { .. } => Some(index),
            ConstantPoolInfo::MethodHandle { .. } | ConstantPoolInfo::MethodType { .. }
                if !loaded_constants.contains(&index) =>
            {
                Some(index)
            }
            _ => None,
        })
        .collect();
    for index in stale {
        tracing::trace!(index, "scrubbing dynamic-linkage constant");
        class.constant_pool.scrub(index);
    }

    Ok(())
}
