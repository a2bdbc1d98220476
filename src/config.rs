use std::{env, ffi::OsString, path::PathBuf};

use thiserror::Error;

use crate::consts::{ClassVersion, ParseVersionError};

pub const BYTECODE_VERSION_VAR: &str = "JVM_BACKPORT_BYTECODE_VERSION";
pub const CLASSPATH_VAR: &str = "JVM_BACKPORT_CLASSPATH";
const FALLBACK_CLASSPATH_VAR: &str = "CLASSPATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Highest class file version the output may declare.
    pub target_version: ClassVersion,
    /// Where enclosing classes of lambda sites are looked up.
    pub classpath: Vec<PathBuf>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid JVM_BACKPORT_BYTECODE_VERSION")]
    BytecodeVersion(#[source] ParseVersionError),
    #[error("{variable} is not valid unicode")]
    NotUnicode { variable: &'static str },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_version: ClassVersion::JAVA_7,
            classpath: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var_os(name))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(version) = lookup(BYTECODE_VERSION_VAR) {
            let version = version.into_string().map_err(|_| ConfigError::NotUnicode {
                variable: BYTECODE_VERSION_VAR,
            })?;
            config.target_version = version.parse().map_err(ConfigError::BytecodeVersion)?;
        }

        if let Some(classpath) = lookup(CLASSPATH_VAR).or_else(|| lookup(FALLBACK_CLASSPATH_VAR)) {
            config.classpath = env::split_paths(&classpath)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
        }

        Ok(config)
    }

    pub fn with_target_version(mut self, target_version: ClassVersion) -> Self {
        self.target_version = target_version;
        self
    }

    pub fn with_classpath(mut self, classpath: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.classpath = classpath.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_java_7_and_no_classpath() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.target_version, ClassVersion::new(51));
    }

    #[test]
    fn reads_version_and_classpath() {
        let classpath = env::join_paths(["build/classes", "", "lib/dep.jar"]).unwrap();
        let config = Config::from_lookup(lookup(&[
            (BYTECODE_VERSION_VAR, "1.6"),
            (CLASSPATH_VAR, classpath.to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(config.target_version, ClassVersion::JAVA_6);
        assert_eq!(
            config.classpath,
            vec![PathBuf::from("build/classes"), PathBuf::from("lib/dep.jar")]
        );
    }

    #[test]
    fn falls_back_to_plain_classpath() {
        let config = Config::from_lookup(lookup(&[(FALLBACK_CLASSPATH_VAR, "out")])).unwrap();
        assert_eq!(config.classpath, vec![PathBuf::from("out")]);

        let config = Config::from_lookup(lookup(&[
            (FALLBACK_CLASSPATH_VAR, "out"),
            (CLASSPATH_VAR, "preferred"),
        ]))
        .unwrap();
        assert_eq!(config.classpath, vec![PathBuf::from("preferred")]);
    }

    #[test]
    fn rejects_bad_version() {
        let err = Config::from_lookup(lookup(&[(BYTECODE_VERSION_VAR, "java7")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::BytecodeVersion(ParseVersionError("java7".to_string()))
        );
    }
}
