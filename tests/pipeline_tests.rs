//! End-to-end tests: class definitions in, running objects out.

use std::sync::Arc;

use classforge::{
    ClassLoader, CompilationUnit, CompileError, CompilerConfig, GeneratedArtifact, LoadError, Value, Vm,
};
use classforge_ast::build::*;
use classforge_ast::{BinaryOp, ClassDefinition};
use classforge_core::{DataType, Modifiers, QualifiedName};

fn q(s: &str) -> QualifiedName {
    QualifiedName::parse(s).unwrap()
}

fn both_modes() -> [CompilerConfig; 2] {
    [
        CompilerConfig::default(),
        CompilerConfig::default().with_static_type_checking(false),
    ]
}

/// Compile `classes` together and define them into a fresh loader.
fn build(config: CompilerConfig, classes: Vec<ClassDefinition>) -> anyhow::Result<(Arc<ClassLoader>, Vm)> {
    let mut unit = CompilationUnit::new(config);
    for class in classes {
        unit.add_class(class)?;
    }
    unit.compile_all()?;
    let loader = Arc::new(ClassLoader::new());
    unit.load_into(&loader)?;
    let vm = Vm::with_config(Arc::clone(&loader), config.vm);
    Ok((loader, vm))
}

fn artifacts(classes: Vec<ClassDefinition>) -> Vec<GeneratedArtifact> {
    let mut unit = CompilationUnit::new(CompilerConfig::default());
    for class in classes {
        unit.add_class(class).unwrap();
    }
    unit.compile_all().unwrap();
    unit.artifacts().cloned().collect()
}

fn greeter() -> ClassDefinition {
    let mut class = ClassDefinition::new(q("pkg.Greeter"));
    class.add_method(
        "greet",
        Modifiers::PUBLIC,
        DataType::string(),
        vec![],
        block(vec![
            decl("sb", DataType::string_builder(), new_instance(q("lang.StringBuilder"), vec![])),
            expr_stmt(call(var("sb"), "append", vec![lit_str("testString")])),
            ret(call(var("sb"), "toString", vec![])),
        ]),
    );
    class
}

/// `build()` returns `new StringBuilder().append("testString")` through a
/// local of the builder type.
fn add_chained_build(class: &mut ClassDefinition) {
    let chained = call(
        new_instance(q("lang.StringBuilder"), vec![]),
        "append",
        vec![lit_str("testString")],
    );
    class.add_method(
        "build",
        Modifiers::PUBLIC,
        DataType::string_builder(),
        vec![],
        block(vec![decl("sb", DataType::string_builder(), chained), ret(var("sb"))]),
    );
}

fn outer_with_inner() -> ClassDefinition {
    let outer_name = q("pkg.Outer");
    let inner_name = outer_name.nested("Inner").unwrap();

    let mut inner = ClassDefinition::nested_in(&outer_name, "Inner", Modifiers::PUBLIC).unwrap();
    inner.add_method(
        "value",
        Modifiers::PUBLIC,
        DataType::Int,
        vec![],
        block(vec![ret(binary(BinaryOp::Add, field(outer_this(), "count"), lit_int(1)))]),
    );

    let mut helper = ClassDefinition::nested_in(&outer_name, "Helper", Modifiers::PUBLIC | Modifiers::STATIC).unwrap();
    helper.add_method(
        "twice",
        Modifiers::PUBLIC | Modifiers::STATIC,
        DataType::Int,
        vec![param("n", DataType::Int)],
        block(vec![ret(binary(BinaryOp::Mul, var("n"), lit_int(2)))]),
    );

    let mut outer = ClassDefinition::new(outer_name);
    outer.add_field("count", DataType::Int, Modifiers::PRIVATE, Some(lit_int(41)));
    outer.add_method(
        "make",
        Modifiers::PUBLIC,
        DataType::Class(inner_name.clone()),
        vec![],
        block(vec![ret(new_instance(inner_name, vec![]))]),
    );
    outer.add_nested(inner).unwrap();
    outer.add_nested(helper).unwrap();
    outer
}

#[test]
fn test_string_scenario() -> anyhow::Result<()> {
    for config in both_modes() {
        let (loader, mut vm) = build(config, vec![greeter()])?;
        let class = loader.resolve("pkg.Greeter").unwrap();
        let greeter = vm.instantiate(&class, &[])?;
        assert_eq!(vm.invoke(&greeter, "greet", &[])?, Value::from("testString"));
    }
    Ok(())
}

#[test]
fn chained_call_returns_the_builder() -> anyhow::Result<()> {
    let mut top = ClassDefinition::new(q("pkg.Chained"));
    add_chained_build(&mut top);

    let mut nested = ClassDefinition::nested_in(&q("pkg.Host"), "Chain", Modifiers::PUBLIC | Modifiers::STATIC)?;
    add_chained_build(&mut nested);
    let mut host = ClassDefinition::new(q("pkg.Host"));
    host.add_nested(nested)?;

    for config in both_modes() {
        let (loader, mut vm) = build(config, vec![top.clone(), host.clone()])?;
        for name in ["pkg.Chained", "pkg.Host$Chain"] {
            let class = loader.resolve(name).unwrap();
            let instance = vm.instantiate(&class, &[])?;
            let builder = vm.invoke(&instance, "build", &[])?;
            let object = builder.as_object().unwrap();
            assert_eq!(object.class().name(), &q("lang.StringBuilder"), "{name}");
            assert_eq!(vm.invoke(&builder, "toString", &[])?, Value::from("testString"), "{name}");
        }
    }
    Ok(())
}

#[test]
fn nested_classes_load_under_dollar_names() -> anyhow::Result<()> {
    for config in both_modes() {
        let (loader, mut vm) = build(config, vec![outer_with_inner()])?;

        let outer = loader.resolve("pkg.Outer").unwrap();
        let inner = loader.resolve("pkg.Outer$Inner").unwrap();
        assert_eq!(inner.simple_name(), "Inner");
        assert_eq!(inner.enclosing_class(), Some(&q("pkg.Outer")));
        assert!(inner.is_inner());
        assert!(outer.nested_classes().contains(&q("pkg.Outer$Inner")));
        assert!(outer.nested_classes().contains(&q("pkg.Outer$Helper")));

        // created by the outer instance
        let outer_instance = vm.instantiate(&outer, &[])?;
        let made = vm.invoke(&outer_instance, "make", &[])?;
        assert_eq!(vm.invoke(&made, "value", &[])?, Value::Int(42));

        // created reflectively
        let direct = vm.instantiate_inner(&inner, &outer_instance, &[])?;
        assert_eq!(vm.invoke(&direct, "value", &[])?, Value::Int(42));

        let helper = loader.resolve("pkg.Outer$Helper").unwrap();
        assert!(!helper.is_inner());
        assert_eq!(vm.invoke_static(&helper, "twice", &[Value::Int(21)])?, Value::Int(42));
    }
    Ok(())
}

#[test]
fn classes_referencing_each_other_resolve() -> anyhow::Result<()> {
    let mut holder = ClassDefinition::new(q("pkg.Holder"));
    holder.add_field("part", DataType::Class(q("pkg.Part")), Modifiers::PRIVATE, None);
    holder.add_method(
        "setPart",
        Modifiers::PUBLIC,
        DataType::Void,
        vec![param("p", DataType::Class(q("pkg.Part")))],
        block(vec![expr_stmt(assign(field(this(), "part"), var("p")))]),
    );
    holder.add_method(
        "total",
        Modifiers::PUBLIC,
        DataType::Long,
        vec![],
        block(vec![ret(binary(BinaryOp::Add, call(var("part"), "weight", vec![]), lit_long(1)))]),
    );

    let mut part = ClassDefinition::new(q("pkg.Part"));
    part.add_method("weight", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_int(5))]));

    for config in both_modes() {
        let (loader, mut vm) = build(config, vec![holder.clone(), part.clone()])?;
        let holder = vm.instantiate(&loader.resolve("pkg.Holder").unwrap(), &[])?;
        let part = vm.instantiate(&loader.resolve("pkg.Part").unwrap(), &[])?;
        assert_eq!(vm.invoke(&holder, "setPart", &[part])?, Value::Null);
        assert_eq!(vm.invoke(&holder, "total", &[])?, Value::Long(6));
    }
    Ok(())
}

#[test]
fn virtual_dispatch_through_abstract_base() -> anyhow::Result<()> {
    let mut shape = ClassDefinition::new(q("pkg.Shape")).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
    shape.add_abstract_method("area", Modifiers::PUBLIC, DataType::Int, vec![]);
    shape.add_method(
        "describe",
        Modifiers::PUBLIC,
        DataType::string(),
        vec![],
        block(vec![ret(binary(BinaryOp::Add, lit_str("area="), call(this(), "area", vec![])))]),
    );

    let mut square = ClassDefinition::new(q("pkg.Square")).with_superclass(q("pkg.Shape"));
    square.add_field("side", DataType::Int, Modifiers::PRIVATE, None);
    square.add_constructor(
        Modifiers::PUBLIC,
        vec![param("side", DataType::Int)],
        block(vec![
            super_call(vec![]),
            expr_stmt(assign(field(this(), "side"), var("side"))),
        ]),
    );
    square.add_method(
        "area",
        Modifiers::PUBLIC,
        DataType::Int,
        vec![],
        block(vec![ret(binary(BinaryOp::Mul, var("side"), var("side")))]),
    );

    for config in both_modes() {
        let (loader, mut vm) = build(config, vec![shape.clone(), square.clone()])?;
        let square = vm.instantiate(&loader.resolve("pkg.Square").unwrap(), &[Value::Int(3)])?;
        assert_eq!(vm.invoke(&square, "describe", &[])?, Value::from("area=9"));

        let shape = loader.resolve("pkg.Shape").unwrap();
        assert!(vm.instantiate(&shape, &[]).is_err());
    }
    Ok(())
}

#[test]
fn duplicate_definition_keeps_the_first() -> anyhow::Result<()> {
    let artifacts = artifacts(vec![greeter()]);
    let loader = ClassLoader::new();
    let first = loader.define(&artifacts[0])?;

    let again = loader.define(&artifacts[0]);
    assert_eq!(again.unwrap_err(), LoadError::DuplicateDefinition("pkg.Greeter".into()));
    assert!(Arc::ptr_eq(&first, &loader.resolve("pkg.Greeter").unwrap()));
    Ok(())
}

#[test]
fn disabled_type_checking_reaches_code_generation() -> anyhow::Result<()> {
    let mut loose = ClassDefinition::new(q("pkg.Loose"));
    loose.add_method(
        "run",
        Modifiers::PUBLIC,
        DataType::string(),
        vec![],
        block(vec![
            decl("o", DataType::object(), new_instance(q("lang.StringBuilder"), vec![])),
            expr_stmt(call(var("o"), "append", vec![lit_str("x")])),
            ret(call(var("o"), "toString", vec![])),
        ]),
    );

    let mut checked = CompilationUnit::new(CompilerConfig::default());
    checked.add_class(loose.clone())?;
    let Err(CompileError::Semantic { failed_classes, .. }) = checked.compile_all() else {
        panic!("append is not a member of lang.Object");
    };
    assert_eq!(failed_classes, ["pkg.Loose"]);
    assert_eq!(checked.artifacts().count(), 0);

    let (loader, mut vm) = build(CompilerConfig::default().with_static_type_checking(false), vec![loose])?;
    let instance = vm.instantiate(&loader.resolve("pkg.Loose").unwrap(), &[])?;
    assert_eq!(vm.invoke(&instance, "run", &[])?, Value::from("x"));
    Ok(())
}

#[test]
fn partial_success_loads_the_good_classes() -> anyhow::Result<()> {
    let mut bad = ClassDefinition::new(q("pkg.Bad"));
    bad.add_method("get", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_bool(true))]));

    let mut unit = CompilationUnit::new(CompilerConfig::default());
    unit.add_class(greeter())?;
    unit.add_class(bad.clone())?;
    let err = unit.compile_all().unwrap_err();
    assert!(err.diagnostics().iter().all(|d| d.class == "pkg.Bad"));

    let loader = Arc::new(ClassLoader::new());
    let defined = unit.load_into(&loader)?;
    assert_eq!(defined.len(), 1);
    assert!(loader.resolve("pkg.Bad").is_none());
    let mut vm = Vm::new(Arc::clone(&loader));
    let greeter = vm.instantiate(&loader.resolve("pkg.Greeter").unwrap(), &[])?;
    assert_eq!(vm.invoke(&greeter, "greet", &[])?, Value::from("testString"));

    let mut atomic = CompilationUnit::new(CompilerConfig::default().with_atomic(true));
    atomic.add_class(greeter_class_named("pkg.Other"))?;
    atomic.add_class(bad)?;
    assert!(atomic.compile_all().is_err());
    assert_eq!(atomic.artifacts().count(), 0);
    Ok(())
}

fn greeter_class_named(name: &str) -> ClassDefinition {
    let mut class = greeter();
    class.name = q(name);
    class
}

#[test]
fn nested_class_may_be_defined_before_its_enclosing_class() -> anyhow::Result<()> {
    let artifacts = artifacts(vec![outer_with_inner()]);
    let position = |name: &str| artifacts.iter().position(|a| a.name.to_string() == name).unwrap();

    let loader = Arc::new(ClassLoader::new());
    loader.define(&artifacts[position("pkg.Outer$Inner")])?;
    loader.define(&artifacts[position("pkg.Outer$Helper")])?;
    loader.define(&artifacts[position("pkg.Outer")])?;

    let mut vm = Vm::new(Arc::clone(&loader));
    let outer = vm.instantiate(&loader.resolve("pkg.Outer").unwrap(), &[])?;
    let inner = vm.invoke(&outer, "make", &[])?;
    assert_eq!(vm.invoke(&inner, "value", &[])?, Value::Int(42));
    Ok(())
}

#[test]
fn superclass_must_be_defined_first() {
    let base = ClassDefinition::new(q("pkg.Base"));
    let derived = ClassDefinition::new(q("pkg.Derived")).with_superclass(q("pkg.Base"));
    let artifacts = artifacts(vec![base, derived]);
    let derived = artifacts.iter().find(|a| a.name == q("pkg.Derived")).unwrap();

    let loader = ClassLoader::new();
    assert_eq!(
        loader.define(derived).unwrap_err(),
        LoadError::UndefinedDependency {
            class: "pkg.Derived".into(),
            dependency: "pkg.Base".into(),
        }
    );
    assert!(!loader.contains("pkg.Derived"));

    // batches are ordered by dependency
    let reversed: Vec<&GeneratedArtifact> = artifacts.iter().rev().collect();
    assert_eq!(loader.define_all(reversed).unwrap().len(), 2);
}

#[test]
fn malformed_bytes_are_rejected() {
    let artifact = artifacts(vec![greeter()]).remove(0);
    let loader = ClassLoader::new();

    let truncated = &artifact.bytes[..artifact.bytes.len() / 2];
    assert!(matches!(
        loader.define_bytes("pkg.Greeter", truncated),
        Err(LoadError::Verification { .. })
    ));

    let mut bad_magic = artifact.bytes.clone();
    bad_magic[0] ^= 0xFF;
    assert!(matches!(
        loader.define_bytes("pkg.Greeter", &bad_magic),
        Err(LoadError::Verification { .. })
    ));

    assert!(!loader.contains("pkg.Greeter"));
    loader.define(&artifact).unwrap();
}

#[test]
fn independent_units_on_separate_threads() {
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                scope.spawn(move || -> anyhow::Result<Value> {
                    let mut class = ClassDefinition::new(q(&format!("pkg.Worker{i}")));
                    class.add_method(
                        "id",
                        Modifiers::PUBLIC,
                        DataType::Int,
                        vec![],
                        block(vec![ret(binary(BinaryOp::Mul, lit_int(i), lit_int(10)))]),
                    );
                    let (loader, mut vm) = build(CompilerConfig::default(), vec![class, greeter()])?;
                    let worker = vm.instantiate(&loader.resolve(&format!("pkg.Worker{i}")).unwrap(), &[])?;
                    Ok(vm.invoke(&worker, "id", &[])?)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.join().unwrap().unwrap();
            assert_eq!(value, Value::Int(i as i32 * 10));
        }
    });
}
