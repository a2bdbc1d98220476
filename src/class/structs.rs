use std::borrow::Cow;

mod constant_pool;
mod java_str;

pub use constant_pool::*;
pub use java_str::JavaString;

use crate::{
    code::CodeAttribute,
    consts::{ClassAccessFlag, ClassVersion, FieldAccessFlag, MethodAccessFlag, attribute_names},
    error::MalformedInputError,
};

/// One class file held in memory. Everything the lowering pipeline does not
/// edit stays in its raw, index-addressed form so that it is written back
/// byte for byte.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: ClassAccessFlag,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn version(&self) -> ClassVersion {
        ClassVersion::with_minor(self.major_version, self.minor_version)
    }

    pub(crate) fn set_version(&mut self, version: ClassVersion) {
        self.major_version = version.major;
        self.minor_version = version.minor;
    }

    pub fn access_flags(&self) -> ClassAccessFlag {
        self.access_flags
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlag::INTERFACE)
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    /// Internal (slash-separated) name of this class.
    pub fn name(&self) -> Result<Cow<'_, str>, MalformedInputError> {
        self.constant_pool.class_name(self.this_class)
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| {
            m.name(&self.constant_pool).is_ok_and(|n| n == name)
                && m.descriptor(&self.constant_pool).is_ok_and(|d| d == descriptor)
        })
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldAccessFlag,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn access_flags(&self) -> FieldAccessFlag {
        self.access_flags
    }

    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<Cow<'a, str>, MalformedInputError> {
        cp.utf8(self.name_index)
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub(crate) access_flags: MethodAccessFlag,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn access_flags(&self) -> MethodAccessFlag {
        self.access_flags
    }

    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<Cow<'a, str>, MalformedInputError> {
        cp.utf8(self.name_index)
    }

    pub fn descriptor<'a>(
        &self,
        cp: &'a ConstantPool,
    ) -> Result<Cow<'a, str>, MalformedInputError> {
        cp.utf8(self.descriptor_index)
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub(crate) fn code_attribute_mut(
        &mut self,
        cp: &ConstantPool,
    ) -> Result<Option<&mut AttributeInfo>, MalformedInputError> {
        for attribute in &mut self.attributes {
            if attribute.is_named(cp, attribute_names::CODE)? {
                return Ok(Some(attribute));
            }
        }
        Ok(None)
    }

    /// Parsed `Code` attribute; `None` for abstract and native methods.
    pub fn code(&self, cp: &ConstantPool) -> Result<Option<CodeAttribute>, MalformedInputError> {
        for attribute in &self.attributes {
            if attribute.is_named(cp, attribute_names::CODE)? {
                return CodeAttribute::parse(&attribute.info).map(Some);
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub(crate) attribute_name_index: u16,
    pub(crate) info: Vec<u8>,
}

impl AttributeInfo {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<Cow<'a, str>, MalformedInputError> {
        cp.utf8(self.attribute_name_index)
    }

    pub(crate) fn is_named(&self, cp: &ConstantPool, name: &str) -> Result<bool, MalformedInputError> {
        Ok(self.name(cp)? == name)
    }

    pub fn info(&self) -> &[u8] {
        &self.info
    }
}
