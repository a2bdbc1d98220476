use std::{borrow::Cow, fmt, sync::Arc};

use cesu8_str::java as cesu8_java;

/// Modified UTF-8 bytes exactly as stored in a `CONSTANT_Utf8` entry.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct JavaString {
    inner: Arc<[u8]>,
}

impl JavaString {
    pub(crate) fn from_class_bytes(bytes: &[u8]) -> Self {
        JavaString {
            inner: Arc::from(bytes),
        }
    }

    pub fn from_utf8(s: &str) -> Self {
        let inner: Arc<[u8]> = match cesu8_java::from_utf8(s) {
            Cow::Borrowed(b) => Arc::from(b.as_bytes()),
            Cow::Owned(o) => Arc::from(o.into_bytes()),
        };
        JavaString { inner }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// `None` when the bytes are not valid modified UTF-8.
    pub fn to_str(&self) -> Option<Cow<'_, str>> {
        let java_str = cesu8_java::JavaStr::from_java_cesu8(&self.inner).ok()?;
        Some(cesu8_java::from_java_cesu8(java_str))
    }
}

impl fmt::Debug for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&String::from_utf8_lossy(&self.inner), f)
    }
}
