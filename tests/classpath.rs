mod common;

use std::{fs::File, io::Write, path::Path};

use common::*;
use jvm_backport::{
    ClassFile, ClassResolver, ClassVersion, ClasspathResolver, Config, LambdaBackporter,
    classpath::ClassOrigin,
};
use pretty_assertions::assert_eq;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

fn write_jar(path: &Path, classes: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in classes {
        writer.start_file(format!("{name}.class"), options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn enclosing_class_is_found_in_a_jar() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("app.jar");
    let input = greeter_class(52);
    write_jar(&jar, &[(GREETER, &input)]);

    let config = Config::default()
        .with_target_version(ClassVersion::JAVA_6)
        .with_classpath([dir.path().join("missing"), jar.clone()]);
    let reifier = StubReifier::default();
    let backporter = LambdaBackporter::from_config(&config, reifier.clone()).unwrap();
    assert_eq!(backporter.target_version(), ClassVersion::JAVA_6);

    let output = backporter.transform_with_config(&input).unwrap();
    let class = ClassFile::parse(&output).unwrap();
    assert_eq!(class.version(), ClassVersion::JAVA_6);
    assert_eq!(
        invoked_static(&class, &method_code(&class, "greet")).0,
        "demo/Greeter$$Lambda$1"
    );
    assert_eq!(reifier.requests()[0].0, GREETER);
}

#[test]
fn earlier_entries_win() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_class(first.path(), GREETER, &greeter_class(52));
    let jar = second.path().join("shadowed.jar");
    write_jar(&jar, &[(GREETER, &greeter_class(51))]);

    let resolver = ClasspathResolver::from_paths([first.path(), jar.as_path()]).unwrap();
    let handle = resolver.resolve(GREETER).unwrap();
    assert_eq!(handle.name(), GREETER);
    assert_eq!(handle.class_file().unwrap().version(), ClassVersion::JAVA_8);
    assert!(matches!(handle.origin(), ClassOrigin::File(path) if path.starts_with(first.path())));

    let again = resolver.resolve(GREETER).unwrap();
    assert!(std::sync::Arc::ptr_eq(&handle, &again));
}

#[test]
fn entries_are_listed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("lib.jar");
    write_jar(&jar, &[]);

    let resolver = ClasspathResolver::from_paths([jar.as_path(), dir.path()]).unwrap();
    let entries: Vec<_> = resolver.entries().collect();
    assert_eq!(entries, vec![jar.as_path(), dir.path()]);
}
