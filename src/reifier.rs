//! The contract between the lowering and whatever synthesizes lambda classes.

use std::fmt;

pub use crate::class::{Loadable as BootstrapArgument, MethodHandle, ReferenceKind};

use crate::{
    classpath::ClassHandle,
    descriptor::MethodDescriptor,
    error::{MalformedInputError, ReificationError},
    naming::{FACTORY_METHOD_NAME, LAMBDA_METAFACTORY, lambda_class_name},
    sequence::NameSequence,
};

/// An `invokedynamic` site, resolved out of the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicCallSite {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: MethodHandle,
    pub bootstrap_arguments: Vec<BootstrapArgument>,
}

impl DynamicCallSite {
    pub fn is_lambda_construction(&self) -> bool {
        self.bootstrap.owner == LAMBDA_METAFACTORY
    }

    pub fn method_descriptor(&self) -> Result<MethodDescriptor, MalformedInputError> {
        MethodDescriptor::parse(&self.descriptor)
    }
}

impl fmt::Display for DynamicCallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} via {}", self.name, self.descriptor, self.bootstrap)
    }
}

/// The static method called in place of a lambda call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LambdaFactoryMethod {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl LambdaFactoryMethod {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        LambdaFactoryMethod {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// `lambdaFactory$` on `owner`, taking the captured arguments and
    /// returning the functional interface, exactly as the call site does.
    pub fn for_call_site(owner: impl Into<String>, call_site: &DynamicCallSite) -> Self {
        Self::new(owner, FACTORY_METHOD_NAME, call_site.descriptor.clone())
    }

    /// Factory on the next `<owner>$$Lambda$<n>` class of `sequence`.
    pub fn next_in_sequence(
        enclosing_class: &str,
        call_site: &DynamicCallSite,
        sequence: &NameSequence,
    ) -> Self {
        Self::for_call_site(lambda_class_name(enclosing_class, sequence.next()), call_site)
    }
}

impl fmt::Display for LambdaFactoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Everything a reifier gets for one lambda call site.
#[derive(Debug, Clone, Copy)]
pub struct ReifyRequest<'a> {
    /// The class being transformed, as found on the lookup path.
    pub owner: &'a ClassHandle,
    pub call_site: &'a DynamicCallSite,
    pub sequence: &'a NameSequence,
}

/// Synthesizes (or reuses) a class implementing the call site's functional
/// interface and names the static factory to call instead.
///
/// Called once per lambda call site, in code order. Repeating a request
/// within one run must be harmless.
pub trait LambdaReifier: Send + Sync {
    fn reify(&self, request: ReifyRequest<'_>) -> Result<LambdaFactoryMethod, ReificationError>;
}

impl<F> LambdaReifier for F
where
    F: Fn(ReifyRequest<'_>) -> Result<LambdaFactoryMethod, ReificationError> + Send + Sync,
{
    fn reify(&self, request: ReifyRequest<'_>) -> Result<LambdaFactoryMethod, ReificationError> {
        self(request)
    }
}
