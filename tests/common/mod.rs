#![allow(dead_code)]

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use jvm_backport::{
    ClassFile, ClasspathResolver, DynamicCallSite, LambdaFactoryMethod, LambdaReifier,
    ReificationError, ReifyRequest,
    code::{CodeAttribute, Instruction},
    naming::LAMBDA_METAFACTORY,
};
use parking_lot::Mutex;
use tempfile::TempDir;

pub use jvm_backport::consts::instructions as op;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SUPER: u16 = 0x0020;

const METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const STRING_CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";
const CONCAT_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

/// Body of a Code attribute; attribute names are added to the pool by
/// [`ClassBuilder::method`].
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    /// start, end, handler, catch type
    pub exception_table: Vec<[u16; 4]>,
    pub attributes: Vec<(&'static str, Vec<u8>)>,
}

/// Assembles class files byte by byte.
pub struct ClassBuilder {
    major: u16,
    access: u16,
    this_class: u16,
    super_class: u16,
    pool: Vec<u8>,
    next_index: u16,
    utf8_entries: HashMap<String, u16>,
    methods: Vec<u8>,
    method_count: u16,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassBuilder {
    pub fn new(name: &str, major: u16, access: u16) -> Self {
        let mut builder = ClassBuilder {
            major,
            access,
            this_class: 0,
            super_class: 0,
            pool: Vec::new(),
            next_index: 1,
            utf8_entries: HashMap::new(),
            methods: Vec::new(),
            method_count: 0,
            bootstrap_methods: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    fn entry(&mut self, bytes: &[u8]) -> u16 {
        self.pool.extend_from_slice(bytes);
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn tagged(&mut self, tag: u8, values: &[u16]) -> u16 {
        let mut bytes = vec![tag];
        for value in values {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        self.entry(&bytes)
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8_entries.get(value) {
            return index;
        }
        let mut bytes = vec![1];
        bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        bytes.extend_from_slice(value.as_bytes());
        let index = self.entry(&bytes);
        self.utf8_entries.insert(value.to_string(), index);
        index
    }

    /// A Utf8 entry holding `bytes` as is, valid modified UTF-8 or not.
    pub fn raw_utf8(&mut self, bytes: &[u8]) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(bytes);
        self.entry(&entry)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.entry(&bytes)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.tagged(7, &[name])
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let value = self.utf8(value);
        self.tagged(8, &[value])
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.tagged(12, &[name, descriptor])
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let owner = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        self.tagged(10, &[owner, name_and_type])
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor = self.utf8(descriptor);
        self.tagged(16, &[descriptor])
    }

    pub fn invoke_static_handle(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let reference = self.method_ref(owner, name, descriptor);
        let [hi, lo] = reference.to_be_bytes();
        self.entry(&[15, 6, hi, lo])
    }

    pub fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type = self.name_and_type(name, descriptor);
        self.tagged(18, &[bootstrap, name_and_type])
    }

    /// Index into the BootstrapMethods table.
    pub fn bootstrap_method(&mut self, handle: u16, arguments: Vec<u16>) -> u16 {
        self.bootstrap_methods.push((handle, arguments));
        (self.bootstrap_methods.len() - 1) as u16
    }

    /// A `LambdaMetafactory.metafactory` call site implemented by a static
    /// method of this class.
    pub fn lambda_call_site(
        &mut self,
        owner: &str,
        interface_method: &str,
        call_site_descriptor: &str,
        erased_descriptor: &str,
        implementation: (&str, &str),
    ) -> u16 {
        let handle = self.invoke_static_handle(LAMBDA_METAFACTORY, "metafactory", METAFACTORY_DESCRIPTOR);
        let erased = self.method_type(erased_descriptor);
        let implementation = self.invoke_static_handle(owner, implementation.0, implementation.1);
        let instantiated = self.method_type(erased_descriptor);
        let bootstrap = self.bootstrap_method(handle, vec![erased, implementation, instantiated]);
        self.invoke_dynamic(bootstrap, interface_method, call_site_descriptor)
    }

    /// A `StringConcatFactory` call site, which must pass through untouched.
    pub fn concat_call_site(&mut self, descriptor: &str, recipe: &str) -> u16 {
        let recipe = self.utf8(recipe);
        self.concat_call_site_with(descriptor, recipe)
    }

    /// Like [`ClassBuilder::concat_call_site`] with the recipe taken from
    /// the Utf8 entry `recipe`.
    pub fn concat_call_site_with(&mut self, descriptor: &str, recipe: u16) -> u16 {
        let handle =
            self.invoke_static_handle(STRING_CONCAT_FACTORY, "makeConcatWithConstants", CONCAT_DESCRIPTOR);
        let recipe = self.tagged(8, &[recipe]);
        let bootstrap = self.bootstrap_method(handle, vec![recipe]);
        self.invoke_dynamic(bootstrap, "makeConcatWithConstants", descriptor)
    }

    pub fn method(&mut self, access: u16, name: &str, descriptor: &str, code: Option<Code>) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut method = Vec::new();
        put_u16(&mut method, access);
        put_u16(&mut method, name);
        put_u16(&mut method, descriptor);
        match code {
            Some(code) => {
                let info = self.code_info(code);
                put_u16(&mut method, 1);
                let code_name = self.utf8("Code");
                put_attribute(&mut method, code_name, &info);
            }
            None => put_u16(&mut method, 0),
        }
        self.methods.extend_from_slice(&method);
        self.method_count += 1;
    }

    fn code_info(&mut self, code: Code) -> Vec<u8> {
        let mut info = Vec::new();
        put_u16(&mut info, code.max_stack);
        put_u16(&mut info, code.max_locals);
        info.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
        info.extend_from_slice(&code.bytes);
        put_u16(&mut info, code.exception_table.len() as u16);
        for row in code.exception_table {
            for value in row {
                put_u16(&mut info, value);
            }
        }
        put_u16(&mut info, code.attributes.len() as u16);
        for (name, body) in code.attributes {
            let name = self.utf8(name);
            put_attribute(&mut info, name, &body);
        }
        info
    }

    pub fn build(mut self) -> Vec<u8> {
        let mut attributes = Vec::new();
        let mut attribute_count = 0u16;
        if !self.bootstrap_methods.is_empty() {
            let name = self.utf8("BootstrapMethods");
            let mut body = Vec::new();
            put_u16(&mut body, self.bootstrap_methods.len() as u16);
            for (handle, arguments) in &self.bootstrap_methods {
                put_u16(&mut body, *handle);
                put_u16(&mut body, arguments.len() as u16);
                for argument in arguments {
                    put_u16(&mut body, *argument);
                }
            }
            put_attribute(&mut attributes, name, &body);
            attribute_count += 1;
        }

        let mut class = vec![0xCA, 0xFE, 0xBA, 0xBE];
        put_u16(&mut class, 0);
        put_u16(&mut class, self.major);
        put_u16(&mut class, self.next_index);
        class.extend_from_slice(&self.pool);
        put_u16(&mut class, self.access);
        put_u16(&mut class, self.this_class);
        put_u16(&mut class, self.super_class);
        put_u16(&mut class, 0);
        put_u16(&mut class, 0);
        put_u16(&mut class, self.method_count);
        class.extend_from_slice(&self.methods);
        put_u16(&mut class, attribute_count);
        class.extend_from_slice(&attributes);
        class
    }
}

pub fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_attribute(out: &mut Vec<u8>, name: u16, body: &[u8]) {
    put_u16(out, name);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

/// `u16` rows as attribute bytes, count first.
pub fn u16_table(rows: &[&[u16]]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, rows.len() as u16);
    for row in rows {
        for value in *row {
            put_u16(&mut out, *value);
        }
    }
    out
}

pub const GREETER: &str = "demo/Greeter";
pub const SUPPLIER_SITE: &str = "(Ljava/lang/String;I)Ljava/util/function/Supplier;";
pub const GREETER_LAMBDA: &str = "lambda$greet$0";
pub const GREETER_LAMBDA_DESCRIPTOR: &str = "(Ljava/lang/String;I)Ljava/lang/Object;";

/// `static Supplier greet(String s, int n) { return () -> s; }` compiled
/// with major version `major`.
pub fn greeter_class(major: u16) -> Vec<u8> {
    let mut class = ClassBuilder::new(GREETER, major, ACC_PUBLIC | ACC_SUPER);
    let site = class.lambda_call_site(
        GREETER,
        "get",
        SUPPLIER_SITE,
        "()Ljava/lang/Object;",
        (GREETER_LAMBDA, GREETER_LAMBDA_DESCRIPTOR),
    );
    let [hi, lo] = site.to_be_bytes();
    class.method(
        ACC_PUBLIC | ACC_STATIC,
        "greet",
        SUPPLIER_SITE,
        Some(Code {
            max_stack: 2,
            max_locals: 2,
            bytes: vec![op::ALOAD_0, op::ILOAD_1, op::INVOKEDYNAMIC, hi, lo, 0, 0, op::ARETURN],
            ..Code::default()
        }),
    );
    class.method(
        ACC_PRIVATE | ACC_STATIC | ACC_SYNTHETIC,
        GREETER_LAMBDA,
        GREETER_LAMBDA_DESCRIPTOR,
        Some(Code {
            max_stack: 1,
            max_locals: 2,
            bytes: vec![op::ALOAD_0, op::ARETURN],
            ..Code::default()
        }),
    );
    class.build()
}

/// A reifier that names `lambdaFactory$` on the next lambda class of the
/// run and records what it was asked.
#[derive(Debug, Clone, Default)]
pub struct StubReifier {
    requests: Arc<Mutex<Vec<(String, DynamicCallSite)>>>,
}

impl StubReifier {
    pub fn requests(&self) -> Vec<(String, DynamicCallSite)> {
        self.requests.lock().clone()
    }
}

impl LambdaReifier for StubReifier {
    fn reify(&self, request: ReifyRequest<'_>) -> Result<LambdaFactoryMethod, ReificationError> {
        self.requests
            .lock()
            .push((request.owner.name().to_string(), request.call_site.clone()));
        Ok(LambdaFactoryMethod::next_in_sequence(
            request.owner.name(),
            request.call_site,
            request.sequence,
        ))
    }
}

/// Writes `classes` under a fresh directory and resolves from it.
pub fn classpath_with(classes: &[(&str, &[u8])]) -> (TempDir, ClasspathResolver) {
    let dir = tempfile::tempdir().unwrap();
    for (name, bytes) in classes {
        write_class(dir.path(), name, bytes);
    }
    let resolver = ClasspathResolver::from_paths([dir.path()]).unwrap();
    (dir, resolver)
}

pub fn write_class(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(format!("{name}.class"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

pub fn method_code(class: &ClassFile, name: &str) -> CodeAttribute {
    class
        .methods()
        .iter()
        .find(|method| method.name(class.constant_pool()).unwrap() == name)
        .unwrap_or_else(|| panic!("no method {name}"))
        .code(class.constant_pool())
        .unwrap()
        .unwrap_or_else(|| panic!("method {name} has no code"))
}

pub fn method_names(class: &ClassFile) -> Vec<String> {
    class
        .methods()
        .iter()
        .map(|method| method.name(class.constant_pool()).unwrap().into_owned())
        .collect()
}

pub fn opcodes(code: &CodeAttribute) -> Vec<u8> {
    code.instructions()
        .unwrap()
        .iter()
        .map(|(_, instruction)| instruction.opcode())
        .collect()
}

/// Owner, name and descriptor of the one invokestatic in `code`.
pub fn invoked_static(class: &ClassFile, code: &CodeAttribute) -> (String, String, String) {
    let calls: Vec<_> = code
        .instructions()
        .unwrap()
        .into_iter()
        .filter_map(|(_, instruction)| match instruction {
            Instruction::MethodCall { opcode, index } if opcode == op::INVOKESTATIC => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 1, "expected exactly one invokestatic");
    let member = class.constant_pool().member_ref(calls[0]).unwrap();
    (member.owner, member.name, member.descriptor)
}

pub fn has_attribute(class: &ClassFile, name: &str) -> bool {
    class
        .attributes()
        .iter()
        .any(|attribute| attribute.name(class.constant_pool()).unwrap() == name)
}

pub fn code_attribute_bytes<'a>(class: &'a ClassFile, method: &str) -> &'a [u8] {
    let pool = class.constant_pool();
    class
        .methods()
        .iter()
        .find(|candidate| candidate.name(pool).unwrap() == method)
        .unwrap()
        .attributes()
        .iter()
        .find(|attribute| attribute.name(pool).unwrap() == "Code")
        .unwrap()
        .info()
}
