use std::{borrow::Cow, fmt};

use super::JavaString;
use crate::error::{MalformedInputError, TransformError};

#[derive(Debug, Clone)]
pub enum ConstantPoolInfo {
    Utf8(JavaString),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    /// Second slot of a Long or Double.
    Empty,
}

impl ConstantPoolInfo {
    fn kind(&self) -> &'static str {
        match self {
            ConstantPoolInfo::Utf8(_) => "Utf8",
            ConstantPoolInfo::Integer(_) => "Integer",
            ConstantPoolInfo::Float(_) => "Float",
            ConstantPoolInfo::Long(_) => "Long",
            ConstantPoolInfo::Double(_) => "Double",
            ConstantPoolInfo::Class { .. } => "Class",
            ConstantPoolInfo::String { .. } => "String",
            ConstantPoolInfo::Fieldref { .. } => "Fieldref",
            ConstantPoolInfo::Methodref { .. } => "Methodref",
            ConstantPoolInfo::InterfaceMethodref { .. } => "InterfaceMethodref",
            ConstantPoolInfo::NameAndType { .. } => "NameAndType",
            ConstantPoolInfo::MethodHandle { .. } => "MethodHandle",
            ConstantPoolInfo::MethodType { .. } => "MethodType",
            ConstantPoolInfo::Dynamic { .. } => "Dynamic",
            ConstantPoolInfo::InvokeDynamic { .. } => "InvokeDynamic",
            ConstantPoolInfo::Module { .. } => "Module",
            ConstantPoolInfo::Package { .. } => "Package",
            ConstantPoolInfo::Empty => "Empty",
        }
    }
}

/// A resolved field or method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl TryFrom<u8> for ReferenceKind {
    type Error = MalformedInputError;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        Ok(match kind {
            1 => ReferenceKind::GetField,
            2 => ReferenceKind::GetStatic,
            3 => ReferenceKind::PutField,
            4 => ReferenceKind::PutStatic,
            5 => ReferenceKind::InvokeVirtual,
            6 => ReferenceKind::InvokeStatic,
            7 => ReferenceKind::InvokeSpecial,
            8 => ReferenceKind::NewInvokeSpecial,
            9 => ReferenceKind::InvokeInterface,
            _ => return Err(MalformedInputError::InvalidReferenceKind(kind)),
        })
    }
}

/// A resolved `CONSTANT_MethodHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub kind: ReferenceKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{} ({:?})",
            self.owner, self.name, self.descriptor, self.kind
        )
    }
}

/// A constant usable by `ldc` or as a bootstrap argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(String),
    MethodType(String),
    MethodHandle(MethodHandle),
    Dynamic {
        bootstrap_method_attr_index: u16,
        name: String,
        descriptor: String,
    },
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolInfo>,
}

impl ConstantPool {
    /// Largest usable index; `constant_pool_count` is a u16 one past it.
    const MAX_INDEX: usize = u16::MAX as usize - 1;

    pub(crate) fn new(entries: Vec<ConstantPoolInfo>) -> Self {
        ConstantPool { entries }
    }

    pub(crate) fn entries(&self) -> &[ConstantPoolInfo] {
        &self.entries
    }

    /// `constant_pool_count` as written in the class file.
    pub fn count(&self) -> u16 {
        // bounded by MAX_INDEX on every push and by the u16 count on parse
        (self.entries.len() + 1) as u16
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantPoolInfo)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ((i + 1) as u16, entry))
    }

    pub fn get(&self, index: u16) -> Result<&ConstantPoolInfo, MalformedInputError> {
        match index.checked_sub(1).and_then(|i| self.entries.get(i as usize)) {
            Some(ConstantPoolInfo::Empty) | None => {
                Err(MalformedInputError::InvalidConstantIndex(index))
            }
            Some(entry) => Ok(entry),
        }
    }

    fn mismatch(&self, index: u16, expected: &'static str) -> MalformedInputError {
        tracing::trace!(
            index,
            expected,
            found = self.get(index).map(ConstantPoolInfo::kind).unwrap_or("nothing"),
            "constant pool type mismatch"
        );
        MalformedInputError::ConstantTypeMismatch { index, expected }
    }

    pub fn utf8(&self, index: u16) -> Result<Cow<'_, str>, MalformedInputError> {
        let ConstantPoolInfo::Utf8(string) = self.get(index)? else {
            return Err(self.mismatch(index, "Utf8"));
        };
        string
            .to_str()
            .ok_or(MalformedInputError::InvalidModifiedUtf8(index))
    }

    pub fn class_name(&self, index: u16) -> Result<Cow<'_, str>, MalformedInputError> {
        let &ConstantPoolInfo::Class { name_index } = self.get(index)? else {
            return Err(self.mismatch(index, "Class"));
        };
        self.utf8(name_index)
    }

    pub fn name_and_type(
        &self,
        index: u16,
    ) -> Result<(Cow<'_, str>, Cow<'_, str>), MalformedInputError> {
        let &ConstantPoolInfo::NameAndType {
            name_index,
            descriptor_index,
        } = self.get(index)?
        else {
            return Err(self.mismatch(index, "NameAndType"));
        };
        Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?))
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef, MalformedInputError> {
        let (class_index, name_and_type_index, interface) = match *self.get(index)? {
            ConstantPoolInfo::Fieldref {
                class_index,
                name_and_type_index,
            }
            | ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            } => (class_index, name_and_type_index, false),
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (class_index, name_and_type_index, true),
            _ => return Err(self.mismatch(index, "member reference")),
        };
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            owner: self.class_name(class_index)?.into_owned(),
            name: name.into_owned(),
            descriptor: descriptor.into_owned(),
            interface,
        })
    }

    pub fn method_handle(&self, index: u16) -> Result<MethodHandle, MalformedInputError> {
        let &ConstantPoolInfo::MethodHandle {
            reference_kind,
            reference_index,
        } = self.get(index)?
        else {
            return Err(self.mismatch(index, "MethodHandle"));
        };
        let member = self.member_ref(reference_index)?;
        Ok(MethodHandle {
            kind: ReferenceKind::try_from(reference_kind)?,
            owner: member.owner,
            name: member.name,
            descriptor: member.descriptor,
            interface: member.interface,
        })
    }

    /// `(bootstrap_method_attr_index, name, descriptor)` of an invokedynamic entry.
    pub fn invoke_dynamic(
        &self,
        index: u16,
    ) -> Result<(u16, Cow<'_, str>, Cow<'_, str>), MalformedInputError> {
        let &ConstantPoolInfo::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } = self.get(index)?
        else {
            return Err(self.mismatch(index, "InvokeDynamic"));
        };
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok((bootstrap_method_attr_index, name, descriptor))
    }

    pub fn loadable(&self, index: u16) -> Result<Loadable, MalformedInputError> {
        Ok(match *self.get(index)? {
            ConstantPoolInfo::Integer(v) => Loadable::Integer(v),
            ConstantPoolInfo::Float(v) => Loadable::Float(v),
            ConstantPoolInfo::Long(v) => Loadable::Long(v),
            ConstantPoolInfo::Double(v) => Loadable::Double(v),
            ConstantPoolInfo::String { string_index } => {
                Loadable::String(self.utf8(string_index)?.into_owned())
            }
            ConstantPoolInfo::Class { .. } => Loadable::Class(self.class_name(index)?.into_owned()),
            ConstantPoolInfo::MethodType { descriptor_index } => {
                Loadable::MethodType(self.utf8(descriptor_index)?.into_owned())
            }
            ConstantPoolInfo::MethodHandle { .. } => {
                Loadable::MethodHandle(self.method_handle(index)?)
            }
            ConstantPoolInfo::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                Loadable::Dynamic {
                    bootstrap_method_attr_index,
                    name: name.into_owned(),
                    descriptor: descriptor.into_owned(),
                }
            }
            _ => return Err(self.mismatch(index, "loadable constant")),
        })
    }

    pub fn has_dynamic_constants(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, ConstantPoolInfo::Dynamic { .. }))
    }

    fn push(&mut self, entry: ConstantPoolInfo) -> Result<u16, TransformError> {
        if self.entries.len() >= Self::MAX_INDEX {
            return Err(TransformError::ConstantPoolFull);
        }
        self.entries.push(entry);
        Ok(self.entries.len() as u16)
    }

    fn position(&self, pred: impl Fn(&ConstantPoolInfo) -> bool) -> Option<u16> {
        self.entries
            .iter()
            .position(pred)
            .map(|i| (i + 1) as u16)
    }

    pub(crate) fn find_or_add_utf8(&mut self, value: &str) -> Result<u16, TransformError> {
        let encoded = JavaString::from_utf8(value);
        let length = encoded.as_bytes().len();
        if length > usize::from(u16::MAX) {
            return Err(TransformError::ConstantTooLong { length });
        }
        match self.position(|e| matches!(e, ConstantPoolInfo::Utf8(s) if *s == encoded)) {
            Some(index) => Ok(index),
            None => self.push(ConstantPoolInfo::Utf8(encoded)),
        }
    }

    pub(crate) fn find_or_add_class(&mut self, name: &str) -> Result<u16, TransformError> {
        let name_index = self.find_or_add_utf8(name)?;
        let entry = ConstantPoolInfo::Class { name_index };
        match self.position(|e| matches!(e, ConstantPoolInfo::Class { name_index: n } if *n == name_index)) {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    pub(crate) fn find_or_add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, TransformError> {
        let name_index = self.find_or_add_utf8(name)?;
        let descriptor_index = self.find_or_add_utf8(descriptor)?;
        let found = self.position(|e| {
            matches!(e, ConstantPoolInfo::NameAndType { name_index: n, descriptor_index: d }
                if *n == name_index && *d == descriptor_index)
        });
        match found {
            Some(index) => Ok(index),
            None => self.push(ConstantPoolInfo::NameAndType {
                name_index,
                descriptor_index,
            }),
        }
    }

    /// Index of a `Methodref` (or `InterfaceMethodref`) to `owner.name descriptor`.
    pub(crate) fn find_or_add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16, TransformError> {
        let class_index = self.find_or_add_class(owner)?;
        let name_and_type_index = self.find_or_add_name_and_type(name, descriptor)?;
        let found = self.position(|e| match *e {
            ConstantPoolInfo::Methodref {
                class_index: c,
                name_and_type_index: n,
            } if !interface => c == class_index && n == name_and_type_index,
            ConstantPoolInfo::InterfaceMethodref {
                class_index: c,
                name_and_type_index: n,
            } if interface => c == class_index && n == name_and_type_index,
            _ => false,
        });
        if let Some(index) = found {
            return Ok(index);
        }
        self.push(if interface {
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            }
        } else {
            ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            }
        })
    }

    /// Overwrites an entry with an empty Utf8 so that no index shifts.
    pub(crate) fn scrub(&mut self, index: u16) {
        if let Some(entry) = index
            .checked_sub(1)
            .and_then(|i| self.entries.get_mut(i as usize))
        {
            *entry = ConstantPoolInfo::Utf8(JavaString::from_utf8(""));
        }
    }
}
