use std::{
    fmt::Debug,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use zip::{ZipArchive, result::ZipError};

use super::{ClassHandle, ClassOrigin, ClasspathError};
use crate::error::ClassResolutionError;

/// One element of the lookup path.
pub trait ClasspathEntry: Debug {
    fn location(&self) -> &Path;
    /// `Ok(None)` when this entry simply does not have the class.
    fn find_class(&self, class_name: &str) -> Result<Option<ClassHandle>, ClassResolutionError>;
}

/// A directory of `.class` files laid out by package.
#[derive(Debug)]
pub struct DirectoryEntry {
    base_path: PathBuf,
}

impl DirectoryEntry {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl ClasspathEntry for DirectoryEntry {
    fn location(&self) -> &Path {
        &self.base_path
    }

    fn find_class(&self, class_name: &str) -> Result<Option<ClassHandle>, ClassResolutionError> {
        let path = self.base_path.join(format!("{class_name}.class"));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(ClassHandle::new(
                class_name,
                ClassOrigin::File(path),
                bytes,
            ))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ClassResolutionError::Io {
                name: class_name.to_string(),
                path,
                source,
            }),
        }
    }
}

/// A jar (or any zip) with classes at their package paths.
#[derive(Debug)]
pub struct JarEntry {
    path: PathBuf,
    zip_file: Mutex<ZipArchive<File>>,
}

impl JarEntry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClasspathError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ClasspathError::Io {
            path: path.clone(),
            source,
        })?;
        let archive = ZipArchive::new(file).map_err(|source| ClasspathError::Archive {
            path: path.clone(),
            source,
        })?;
        Ok(JarEntry {
            path,
            zip_file: Mutex::new(archive),
        })
    }
}

impl ClasspathEntry for JarEntry {
    fn location(&self) -> &Path {
        &self.path
    }

    fn find_class(&self, class_name: &str) -> Result<Option<ClassHandle>, ClassResolutionError> {
        let entry_name = format!("{class_name}.class");
        let mut archive = self.zip_file.lock();
        let mut class_file = match archive.by_name(&entry_name) {
            Ok(class_file) => class_file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(ClassResolutionError::Archive {
                    name: class_name.to_string(),
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut bytes = Vec::with_capacity(class_file.size() as usize);
        class_file
            .read_to_end(&mut bytes)
            .map_err(|source| ClassResolutionError::Io {
                name: class_name.to_string(),
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(ClassHandle::new(
            class_name,
            ClassOrigin::Archive {
                archive: self.path.clone(),
                entry: entry_name,
            },
            bytes,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn jar_entries_are_found_by_package_path() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("lib.jar");
        write_jar(&jar_path, &[("com/example/Main.class", &[0xca, 0xfe])]);

        let jar = JarEntry::open(&jar_path).unwrap();
        let handle = jar.find_class("com/example/Main").unwrap().unwrap();
        assert_eq!(handle.name(), "com/example/Main");
        assert_eq!(handle.bytes(), [0xca, 0xfe]);
        assert_eq!(
            handle.origin(),
            &ClassOrigin::Archive {
                archive: jar_path.clone(),
                entry: "com/example/Main.class".to_string(),
            }
        );
        assert!(jar.find_class("com/example/Other").unwrap().is_none());
    }

    #[test]
    fn directory_miss_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = DirectoryEntry::new(dir.path());
        assert!(entry.find_class("a/B").unwrap().is_none());
    }

    #[test]
    fn directory_read_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the class file should be
        fs::create_dir_all(dir.path().join("a/B.class")).unwrap();
        let entry = DirectoryEntry::new(dir.path());
        assert!(matches!(
            entry.find_class("a/B"),
            Err(ClassResolutionError::Io { .. })
        ));
    }
}
