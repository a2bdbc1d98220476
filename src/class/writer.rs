//! Serialization back to the class file format.

use crate::class::{AttributeInfo, ClassFile, ConstantPool, ConstantPoolInfo, FieldInfo, MethodInfo};

mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

/// An object which can be written into a class file.
pub(crate) trait ClassfileWritable {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>);

    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_to_classfile(&mut buffer);
        buffer
    }
}

pub(crate) fn put_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

/// Writes a length-prefixed table; lengths come from parsed u16 counts.
pub(crate) fn put_table<T: ClassfileWritable>(buffer: &mut Vec<u8>, items: &[T]) {
    put_u16(buffer, items.len() as u16);
    for item in items {
        item.write_to_classfile(buffer);
    }
}

fn put_ref_pair(buffer: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
    buffer.push(tag);
    put_u16(buffer, first);
    put_u16(buffer, second);
}

impl ClassfileWritable for ConstantPoolInfo {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        use constant_tags::*;
        match *self {
            ConstantPoolInfo::Utf8(ref value) => {
                buffer.push(CONSTANT_UTF8);
                let bytes = value.as_bytes();
                // parsed with a u16 length or length-checked when added
                put_u16(buffer, bytes.len() as u16);
                buffer.extend_from_slice(bytes);
            }
            ConstantPoolInfo::Integer(value) => {
                buffer.push(CONSTANT_INTEGER);
                buffer.extend_from_slice(&value.to_be_bytes());
            }
            ConstantPoolInfo::Float(value) => {
                buffer.push(CONSTANT_FLOAT);
                buffer.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            ConstantPoolInfo::Long(value) => {
                buffer.push(CONSTANT_LONG);
                buffer.extend_from_slice(&value.to_be_bytes());
            }
            ConstantPoolInfo::Double(value) => {
                buffer.push(CONSTANT_DOUBLE);
                buffer.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            ConstantPoolInfo::Class { name_index } => {
                buffer.push(CONSTANT_CLASS);
                put_u16(buffer, name_index);
            }
            ConstantPoolInfo::String { string_index } => {
                buffer.push(CONSTANT_STRING);
                put_u16(buffer, string_index);
            }
            ConstantPoolInfo::Fieldref {
                class_index,
                name_and_type_index,
            } => put_ref_pair(buffer, CONSTANT_FIELDREF, class_index, name_and_type_index),
            ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            } => put_ref_pair(buffer, CONSTANT_METHODREF, class_index, name_and_type_index),
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => put_ref_pair(
                buffer,
                CONSTANT_INTERFACEMETHODREF,
                class_index,
                name_and_type_index,
            ),
            ConstantPoolInfo::NameAndType {
                name_index,
                descriptor_index,
            } => put_ref_pair(buffer, CONSTANT_NAMEANDTYPE, name_index, descriptor_index),
            ConstantPoolInfo::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                buffer.push(CONSTANT_METHODHANDLE);
                buffer.push(reference_kind);
                put_u16(buffer, reference_index);
            }
            ConstantPoolInfo::MethodType { descriptor_index } => {
                buffer.push(CONSTANT_METHODTYPE);
                put_u16(buffer, descriptor_index);
            }
            ConstantPoolInfo::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => put_ref_pair(
                buffer,
                CONSTANT_DYNAMIC,
                bootstrap_method_attr_index,
                name_and_type_index,
            ),
            ConstantPoolInfo::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => put_ref_pair(
                buffer,
                CONSTANT_INVOKEDYNAMIC,
                bootstrap_method_attr_index,
                name_and_type_index,
            ),
            ConstantPoolInfo::Module { name_index } => {
                buffer.push(CONSTANT_MODULE);
                put_u16(buffer, name_index);
            }
            ConstantPoolInfo::Package { name_index } => {
                buffer.push(CONSTANT_PACKAGE);
                put_u16(buffer, name_index);
            }
            ConstantPoolInfo::Empty => {}
        }
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.count());
        for entry in self.entries() {
            entry.write_to_classfile(buffer);
        }
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.attribute_name_index);
        // parsed from a u32 length, or assembled from u16-bounded code
        put_u32(buffer, self.info.len() as u32);
        buffer.extend_from_slice(&self.info);
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.access_flags.bits());
        put_u16(buffer, self.name_index);
        put_u16(buffer, self.descriptor_index);
        put_table(buffer, &self.attributes);
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, self.access_flags.bits());
        put_u16(buffer, self.name_index);
        put_u16(buffer, self.descriptor_index);
        put_table(buffer, &self.attributes);
    }
}

impl ClassfileWritable for u16 {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        put_u16(buffer, *self);
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&[0xca, 0xfe, 0xba, 0xbe]);
        put_u16(buffer, self.minor_version);
        put_u16(buffer, self.major_version);
        self.constant_pool.write_to_classfile(buffer);
        put_u16(buffer, self.access_flags.bits());
        put_u16(buffer, self.this_class);
        put_u16(buffer, self.super_class);
        put_table(buffer, &self.interfaces);
        put_table(buffer, &self.fields);
        put_table(buffer, &self.methods);
        put_table(buffer, &self.attributes);
    }
}
