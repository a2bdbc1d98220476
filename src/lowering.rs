//! The backport pipeline: version clamp, method filter, lambda rewrite and
//! bootstrap tidy-up over one owned [`ClassFile`].

mod bootstrap;
mod class_visitor;
mod method_filter;
mod rewriter;

use once_cell::sync::OnceCell;

use crate::{
    class::ClassFile,
    classpath::{ClassResolver, ClasspathError, ClasspathResolver},
    config::Config,
    consts::ClassVersion,
    diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics},
    error::TransformError,
    reifier::LambdaReifier,
    sequence::NameSequence,
};

use rewriter::InstructionRewriter;

/// Lowers lambda call sites of Java 8+ class files for an older runtime.
///
/// One backporter is one run: the name sequence is reset before the first
/// class it transforms, and not again until [`restart_run`] is called.
///
/// [`restart_run`]: LambdaBackporter::restart_run
pub struct LambdaBackporter {
    resolver: Box<dyn ClassResolver + 'static>,
    reifier: Box<dyn LambdaReifier + 'static>,
    diagnostics: Box<dyn Diagnostics + 'static>,
    sequence: NameSequence,
    target_version: ClassVersion,
    run_started: OnceCell<()>,
}

impl LambdaBackporter {
    pub fn new(
        resolver: impl ClassResolver + 'static,
        reifier: impl LambdaReifier + 'static,
    ) -> Self {
        LambdaBackporter {
            resolver: Box::new(resolver),
            reifier: Box::new(reifier),
            diagnostics: Box::new(TracingDiagnostics),
            sequence: NameSequence::new(),
            target_version: Config::default().target_version,
            run_started: OnceCell::new(),
        }
    }

    /// Uses a classpath built from `config` and transforms to its target.
    pub fn from_config(
        config: &Config,
        reifier: impl LambdaReifier + 'static,
    ) -> Result<Self, ClasspathError> {
        let resolver = ClasspathResolver::from_paths(&config.classpath)?;
        Ok(Self::new(resolver, reifier).with_target_version(config.target_version))
    }

    /// Shares `sequence` with whatever else numbers lambda classes.
    pub fn with_sequence(mut self, sequence: NameSequence) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    pub fn with_target_version(mut self, target_version: ClassVersion) -> Self {
        self.target_version = target_version;
        self
    }

    pub fn sequence(&self) -> &NameSequence {
        &self.sequence
    }

    pub fn target_version(&self) -> ClassVersion {
        self.target_version
    }

    /// Starts a new run; the next transform resets the name sequence again.
    pub fn restart_run(&mut self) {
        self.run_started = OnceCell::new();
    }

    /// Transforms one class file. Either the whole class is lowered or an
    /// error is returned; there is no partial output.
    pub fn transform(&self, bytes: &[u8], target: ClassVersion) -> Result<Vec<u8>, TransformError> {
        self.begin_run();

        let mut class = ClassFile::parse(bytes)?;
        let context = class_visitor::visit_class(&mut class, target)?;
        method_filter::filter_methods(&mut class, &context, self.diagnostics.as_ref())?;

        let bootstrap_methods = bootstrap::read_bootstrap_methods(&class)?;
        InstructionRewriter::new(
            &context,
            self.resolver.as_ref(),
            self.reifier.as_ref(),
            &self.sequence,
            &bootstrap_methods,
        )
        .rewrite_class(&mut class)?;
        bootstrap::tidy(&mut class)?;

        Ok(class.to_bytes())
    }

    /// [`transform`](Self::transform) to the configured target version.
    pub fn transform_with_config(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        self.transform(bytes, self.target_version)
    }

    fn begin_run(&self) {
        self.run_started.get_or_init(|| {
            if let Err(err) = self.sequence.reset() {
                self.diagnostics.report(Diagnostic::SequenceResetUnavailable {
                    reason: err.to_string(),
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::CollectedDiagnostics,
        error::{ClassResolutionError, ReificationError},
        reifier::{LambdaFactoryMethod, ReifyRequest},
    };
    use std::sync::Arc;

    struct NoClasses;

    impl ClassResolver for NoClasses {
        fn resolve(
            &self,
            name: &str,
        ) -> Result<Arc<crate::classpath::ClassHandle>, ClassResolutionError> {
            Err(ClassResolutionError::NotFound {
                name: name.to_string(),
                searched: 0,
            })
        }
    }

    fn unused_reifier(_: ReifyRequest<'_>) -> Result<LambdaFactoryMethod, ReificationError> {
        Err(ReificationError::new("no lambdas expected"))
    }

    #[test]
    fn sequence_is_reset_once_per_run() {
        let sequence = NameSequence::new();
        let mut backporter = LambdaBackporter::new(NoClasses, unused_reifier)
            .with_sequence(sequence.clone());

        sequence.next();
        backporter.begin_run();
        assert_eq!(sequence.current(), 0);

        sequence.next();
        backporter.begin_run();
        assert_eq!(sequence.current(), 1);

        backporter.restart_run();
        backporter.begin_run();
        assert_eq!(sequence.current(), 0);
    }

    #[test]
    fn failed_reset_is_only_reported() {
        let sequence = NameSequence::new();
        let diagnostics = Arc::new(CollectedDiagnostics::new());
        let backporter = LambdaBackporter::new(NoClasses, unused_reifier)
            .with_sequence(sequence.clone())
            .with_diagnostics(Arc::clone(&diagnostics));

        sequence.next();
        let guard = sequence.hold();
        backporter.begin_run();
        drop(guard);

        assert_eq!(sequence.current(), 1);
        assert!(matches!(
            diagnostics.snapshot().as_slice(),
            [Diagnostic::SequenceResetUnavailable { .. }]
        ));
    }

    #[test]
    fn garbage_is_malformed_input() {
        let backporter = LambdaBackporter::new(NoClasses, unused_reifier);
        assert!(matches!(
            backporter.transform(b"definitely not a class", ClassVersion::JAVA_7),
            Err(TransformError::MalformedInput(_))
        ));
    }
}
