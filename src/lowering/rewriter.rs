use std::sync::Arc;

use super::{bootstrap::BootstrapMethod, class_visitor::ClassContext};
use crate::{
    class::{ClassFile, ConstantPool, MethodInfo, writer::ClassfileWritable},
    classpath::{ClassHandle, ClassResolver},
    code::{CodeAttribute, Instruction, assemble, relocate_code_attribute},
    consts::instructions::INVOKESTATIC,
    descriptor::MethodDescriptor,
    error::{MalformedInputError, TransformError},
    naming::LAMBDA_METAFACTORY,
    reifier::{DynamicCallSite, LambdaFactoryMethod, LambdaReifier, ReifyRequest},
    sequence::NameSequence,
};

/// Replaces every lambda `invokedynamic` of one class with an
/// `invokestatic` of the factory its reifier names.
pub(super) struct InstructionRewriter<'a> {
    context: &'a ClassContext,
    resolver: &'a dyn ClassResolver,
    reifier: &'a dyn LambdaReifier,
    sequence: &'a NameSequence,
    bootstrap_methods: &'a [BootstrapMethod],
    /// Looked up on the first lambda site only.
    owner: Option<Arc<ClassHandle>>,
}

impl<'a> InstructionRewriter<'a> {
    pub(super) fn new(
        context: &'a ClassContext,
        resolver: &'a dyn ClassResolver,
        reifier: &'a dyn LambdaReifier,
        sequence: &'a NameSequence,
        bootstrap_methods: &'a [BootstrapMethod],
    ) -> Self {
        InstructionRewriter {
            context,
            resolver,
            reifier,
            sequence,
            bootstrap_methods,
            owner: None,
        }
    }

    pub(super) fn rewrite_class(&mut self, class: &mut ClassFile) -> Result<(), TransformError> {
        let ClassFile {
            constant_pool,
            methods,
            ..
        } = class;
        for method in methods {
            self.rewrite_method(constant_pool, method)?;
        }
        Ok(())
    }

    fn rewrite_method(
        &mut self,
        constant_pool: &mut ConstantPool,
        method: &mut MethodInfo,
    ) -> Result<(), TransformError> {
        let method_name = format!(
            "{}{}",
            method.name(constant_pool)?,
            method.descriptor(constant_pool)?
        );
        let Some(attribute) = method.code_attribute_mut(constant_pool)? else {
            return Ok(());
        };
        let mut code = CodeAttribute::parse(&attribute.info)?;

        let mut instructions = code.instructions()?;
        let mut rewritten = 0usize;
        for (_, instruction) in &mut instructions {
            let Instruction::InvokeDynamic { index } = *instruction else {
                continue;
            };
            let Some(call_site) = self.lambda_call_site(constant_pool, index, &method_name)? else {
                continue;
            };

            let factory = self.reify(&call_site)?;
            let method_ref =
                constant_pool.find_or_add_method_ref(&factory.owner, &factory.name, &factory.descriptor, false)?;
            tracing::debug!(
                class = %self.context.name,
                method = %method_name,
                %factory,
                "rewrote lambda call site"
            );
            *instruction = Instruction::MethodCall {
                opcode: INVOKESTATIC,
                index: method_ref,
            };
            rewritten += 1;
        }

        if rewritten == 0 {
            return Ok(());
        }

        let (relocated, offsets) = assemble(&instructions, code.code.len() as u32)?;
        drop(instructions);
        code.code = relocated;
        relocate_code_attribute(&mut code, constant_pool, &offsets)?;
        attribute.info = code.to_classfile_bytes();

        Ok(())
    }

    /// Decodes the site at `index` if LambdaMetafactory bootstraps it.
    /// Arguments of other bootstraps are never read, so whatever constants
    /// they carry cannot fail the class.
    fn lambda_call_site(
        &self,
        constant_pool: &ConstantPool,
        index: u16,
        method_name: &str,
    ) -> Result<Option<DynamicCallSite>, MalformedInputError> {
        let (bootstrap_index, name, descriptor) = constant_pool.invoke_dynamic(index)?;
        let bootstrap_method = self
            .bootstrap_methods
            .get(bootstrap_index as usize)
            .ok_or(MalformedInputError::MissingBootstrapMethod(bootstrap_index))?;
        let bootstrap = constant_pool.method_handle(bootstrap_method.method_ref)?;
        if bootstrap.owner != LAMBDA_METAFACTORY {
            tracing::trace!(
                method = method_name,
                site = %format_args!("{name}{descriptor}"),
                %bootstrap,
                "passing through dynamic call site"
            );
            return Ok(None);
        }

        let bootstrap_arguments = bootstrap_method
            .arguments
            .iter()
            .map(|&argument| constant_pool.loadable(argument))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(DynamicCallSite {
            name: name.into_owned(),
            descriptor: descriptor.into_owned(),
            bootstrap,
            bootstrap_arguments,
        }))
    }

    fn owner(&mut self) -> Result<Arc<ClassHandle>, TransformError> {
        if let Some(owner) = &self.owner {
            return Ok(Arc::clone(owner));
        }
        let owner = self.resolver.resolve(&self.context.name)?;
        self.owner = Some(Arc::clone(&owner));
        Ok(owner)
    }

    fn reify(&mut self, call_site: &DynamicCallSite) -> Result<LambdaFactoryMethod, TransformError> {
        let owner = self.owner()?;
        let factory = self
            .reifier
            .reify(ReifyRequest {
                owner: &owner,
                call_site,
                sequence: self.sequence,
            })
            .map_err(|source| TransformError::Reification {
                class: self.context.name.clone(),
                call_site: call_site.to_string(),
                source,
            })?;
        check_factory_signature(call_site, &factory)?;
        Ok(factory)
    }
}

/// The factory replaces the call site on the operand stack, so it must take
/// exactly the captured arguments and leave one reference behind.
fn check_factory_signature(
    call_site: &DynamicCallSite,
    factory: &LambdaFactoryMethod,
) -> Result<(), TransformError> {
    let expected = call_site.method_descriptor()?;
    let matches = MethodDescriptor::parse(&factory.descriptor).is_ok_and(|actual| {
        actual.parameters == expected.parameters
            && actual.return_type.as_ref().is_some_and(|ty| ty.is_reference())
    });
    if matches {
        Ok(())
    } else {
        Err(TransformError::FactorySignatureMismatch {
            owner: factory.owner.clone(),
            name: factory.name.clone(),
            descriptor: factory.descriptor.clone(),
            call_site: call_site.descriptor.clone(),
        })
    }
}
