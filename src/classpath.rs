//! Lookup of the classes whose lambda sites are being lowered.

mod entry;

pub use entry::{ClasspathEntry, DirectoryEntry, JarEntry};

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::{
    class::ClassFile,
    error::{ClassResolutionError, MalformedInputError},
};

pub trait ClassResolver: Send + Sync {
    /// Finds a class by internal name (`java/lang/Object`).
    fn resolve(&self, name: &str) -> Result<Arc<ClassHandle>, ClassResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOrigin {
    File(PathBuf),
    Archive { archive: PathBuf, entry: String },
}

/// A class located on the lookup path, still in its raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    name: String,
    origin: ClassOrigin,
    bytes: Vec<u8>,
}

impl ClassHandle {
    pub fn new(name: impl Into<String>, origin: ClassOrigin, bytes: Vec<u8>) -> Self {
        ClassHandle {
            name: name.into(),
            origin,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ClassOrigin {
        &self.origin
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn class_file(&self) -> Result<ClassFile, MalformedInputError> {
        ClassFile::parse(&self.bytes)
    }
}

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("cannot open classpath entry {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open classpath archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Searches directories and jars in order; the first entry that has a class
/// wins.
#[derive(Debug, Default)]
pub struct ClasspathResolver {
    entries: Vec<Box<dyn ClasspathEntry + Send + Sync + 'static>>,
    class_registry: DashMap<String, Arc<OnceCell<Arc<ClassHandle>>>>,
}

impl ClasspathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.jar` and `.zip` paths become archive entries, directories become
    /// directory entries, paths that do not exist are skipped.
    pub fn from_paths<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, ClasspathError> {
        let mut resolver = Self::new();
        for path in paths {
            let path = path.as_ref();
            if is_archive(path) && path.is_file() {
                resolver.add_entry(Box::new(JarEntry::open(path)?));
            } else if path.is_dir() {
                resolver.add_entry(Box::new(DirectoryEntry::new(path)));
            } else {
                tracing::debug!(path = %path.display(), "skipping missing classpath entry");
            }
        }
        Ok(resolver)
    }

    pub fn add_entry(&mut self, entry: Box<dyn ClasspathEntry + Send + Sync + 'static>) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|entry| entry.location())
    }

    fn find_class(&self, name: &str) -> Result<Arc<ClassHandle>, ClassResolutionError> {
        for entry in &self.entries {
            if let Some(handle) = entry.find_class(name)? {
                tracing::trace!(class = name, entry = %entry.location().display(), "resolved");
                return Ok(Arc::new(handle));
            }
        }
        Err(ClassResolutionError::NotFound {
            name: name.to_string(),
            searched: self.entries.len(),
        })
    }
}

impl ClassResolver for ClasspathResolver {
    fn resolve(&self, name: &str) -> Result<Arc<ClassHandle>, ClassResolutionError> {
        let class_cell = Arc::clone(
            self.class_registry
                .entry(name.to_string())
                .or_default()
                .value(),
        );

        let class = class_cell.get_or_try_init(|| self.find_class(name))?;

        Ok(Arc::clone(class))
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}
