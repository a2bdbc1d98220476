//! Lowers Java 8 lambda call sites so that class files run on older JVMs.
//!
//! Each `invokedynamic` bound to `LambdaMetafactory` is replaced by an
//! `invokestatic` of a factory method that a [`LambdaReifier`] provides, the
//! class version is clamped to a target, and interface bridge methods are
//! dropped. Everything else in the class is written back unchanged.

pub mod class;
pub mod classpath;
pub mod code;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod lowering;
pub mod naming;
pub mod reifier;
pub mod sequence;

pub use class::ClassFile;
pub use classpath::{ClassHandle, ClassResolver, ClasspathResolver};
pub use config::Config;
pub use consts::ClassVersion;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{ClassResolutionError, MalformedInputError, ReificationError, TransformError};
pub use lowering::LambdaBackporter;
pub use reifier::{DynamicCallSite, LambdaFactoryMethod, LambdaReifier, ReifyRequest};
pub use sequence::NameSequence;
