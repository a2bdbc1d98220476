use crate::{
    class::ClassFile,
    consts::{ClassAccessFlag, ClassVersion},
    error::MalformedInputError,
};

/// What later stages need to know about the class being lowered.
#[derive(Debug, Clone)]
pub(super) struct ClassContext {
    pub(super) name: String,
    pub(super) access_flags: ClassAccessFlag,
}

impl ClassContext {
    pub(super) fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlag::INTERFACE)
    }
}

/// Clamps the declared version to `target` and records the class identity.
pub(super) fn visit_class(
    class: &mut ClassFile,
    target: ClassVersion,
) -> Result<ClassContext, MalformedInputError> {
    let name = class.name()?.into_owned();
    let declared = class.version();
    if declared > target {
        tracing::debug!(class = %name, from = %declared, to = %target, "clamping class version");
        class.set_version(target);
    }

    Ok(ClassContext {
        name,
        access_flags: class.access_flags(),
    })
}
