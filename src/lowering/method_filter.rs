use std::mem;

use super::class_visitor::ClassContext;
use crate::{
    class::{ClassFile, ConstantPool, MethodInfo},
    consts::MethodAccessFlag,
    diagnostics::{Diagnostic, Diagnostics},
    error::MalformedInputError,
    naming::is_lambda_implementation,
};

/// Drops interface bridges, flags other interface bodies and opens lambda
/// bodies up to the synthesized classes. Order is preserved.
pub(super) fn filter_methods(
    class: &mut ClassFile,
    context: &ClassContext,
    diagnostics: &dyn Diagnostics,
) -> Result<(), MalformedInputError> {
    let mut kept = Vec::with_capacity(class.methods.len());
    for mut method in mem::take(&mut class.methods) {
        if filter_method(&mut method, &class.constant_pool, context, diagnostics)? {
            kept.push(method);
        }
    }
    class.methods = kept;
    Ok(())
}

/// `false` when the method must not be emitted.
fn filter_method(
    method: &mut MethodInfo,
    constant_pool: &ConstantPool,
    context: &ClassContext,
    diagnostics: &dyn Diagnostics,
) -> Result<bool, MalformedInputError> {
    let access_flags = method.access_flags();
    let name = method.name(constant_pool)?;

    if context.is_interface() && access_flags.contains(MethodAccessFlag::BRIDGE) {
        tracing::debug!(class = %context.name, method = %name, "dropping bridge method on interface");
        return Ok(false);
    }

    if context.is_interface() && !access_flags.contains(MethodAccessFlag::ABSTRACT) {
        let descriptor = method.descriptor(constant_pool)?;
        diagnostics.report(Diagnostic::NonAbstractInterfaceMethod {
            class: context.name.clone(),
            method: format!("{name}{descriptor}"),
        });
    }

    if is_lambda_implementation(&name) && access_flags.contains(MethodAccessFlag::PRIVATE) {
        tracing::debug!(class = %context.name, method = %name, "widening lambda implementation method");
        method.access_flags = access_flags.non_private();
    }

    Ok(true)
}
