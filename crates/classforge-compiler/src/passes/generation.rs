//! Generation Pass - emit a class file per lowered class.

use classforge_core::{Diagnostic, ErrorCode, method_descriptor};
use classforge_registry::SymbolRegistry;
use tracing::{debug, trace};

use crate::GeneratedArtifact;
use crate::classfile::{ClassFile, FieldInfo, InnerClassInfo, MethodInfo};
use crate::context::MethodContext;
use crate::method_compiler::{CodegenMode, MethodCompiler};
use crate::passes::lowering::LoweredClass;

pub struct GenerationPass<'a> {
    registry: &'a SymbolRegistry,
    mode: CodegenMode,
}

impl<'a> GenerationPass<'a> {
    pub fn new(registry: &'a SymbolRegistry, mode: CodegenMode) -> Self {
        Self { registry, mode }
    }

    /// Generate the class file of `class`.
    ///
    /// Every method is compiled even after one fails, so all diagnostics of
    /// the class are reported together.
    pub fn generate(&self, class: &LoweredClass) -> Result<GeneratedArtifact, Vec<Diagnostic>> {
        let name = class.name.to_string();
        let error = |code, message: String| Diagnostic::error(code, name.clone(), message);

        let Some(entry) = self.registry.get_class(&class.name) else {
            return Err(vec![error(
                ErrorCode::UnknownType,
                format!("class '{name}' was never declared"),
            )]);
        };

        let mut file = ClassFile::new();
        file.access = class.modifiers.bits();
        file.this_class = file.constants.add_class(&name);
        file.super_class = file.constants.add_class(&class.superclass.to_string());

        // inner-class metadata for this class and for classes nested in it
        if let Some(outer) = &class.enclosing {
            let outer_class = file.constants.add_class(&outer.to_string());
            let simple_name = file.constants.add_utf8(class.name.simple_name());
            file.inner_classes.push(InnerClassInfo {
                inner_class: file.this_class,
                outer_class,
                simple_name,
                access: class.modifiers.bits(),
            });
        }
        for nested in self
            .registry
            .classes()
            .filter(|e| e.enclosing.as_ref() == Some(&class.name))
        {
            let inner_class = file.constants.add_class(&nested.name.to_string());
            let simple_name = file.constants.add_utf8(nested.name.simple_name());
            file.inner_classes.push(InnerClassInfo {
                inner_class,
                outer_class: file.this_class,
                simple_name,
                access: nested.modifiers.bits(),
            });
        }

        for field in &class.fields {
            let info = FieldInfo {
                access: field.modifiers.bits(),
                name: file.constants.add_utf8(&field.name),
                descriptor: file.constants.add_utf8(&field.ty.descriptor()),
            };
            file.fields.push(info);
        }

        let mut diagnostics = Vec::new();
        for method in &class.methods {
            let ctx = MethodContext {
                registry: self.registry,
                class: entry,
                member: method.name.clone(),
                is_static: method.modifiers.is_static(),
                is_constructor: method.is_constructor(),
                return_type: method.return_type.clone(),
            };
            let descriptor = method_descriptor(&method.param_types(), &method.return_type);
            match MethodCompiler::compile(&ctx, &mut file.constants, self.mode, method) {
                Ok(compiled) => {
                    trace!(class = %name, method = %method.name, bytes = compiled.code.len(), "method compiled");
                    let info = MethodInfo {
                        access: method.modifiers.bits(),
                        name: file.constants.add_utf8(&method.name),
                        descriptor: file.constants.add_utf8(&descriptor),
                        max_locals: compiled.max_locals,
                        code: compiled.code,
                    };
                    file.methods.push(info);
                }
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let over_limit = [
            ("field", file.fields.len()),
            ("method", file.methods.len()),
            ("inner class", file.inner_classes.len()),
        ]
        .into_iter()
        .find(|(_, count)| *count > u16::MAX as usize);
        if let Some((what, count)) = over_limit {
            diagnostics.push(error(
                ErrorCode::CodegenLimit,
                format!("{count} {what} entries exceed the class file limit"),
            ));
        }
        if let Some(code) = file.methods.iter().find(|m| m.code.len() > u32::MAX as usize) {
            diagnostics.push(error(
                ErrorCode::CodegenLimit,
                format!("method code of {} bytes exceeds the class file limit", code.code.len()),
            ));
        }
        if file.constants.is_overflowed() {
            diagnostics.push(error(
                ErrorCode::CodegenLimit,
                "constant pool exceeds the class file limit".to_string(),
            ));
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let bytes = file
            .to_bytes()
            .map_err(|e| vec![error(ErrorCode::CodegenLimit, e.to_string())])?;
        debug!(class = %name, bytes = bytes.len(), "class generated");
        Ok(GeneratedArtifact {
            name: class.name.clone(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{OpCode, decode_opcodes};
    use crate::passes::lowering::LoweringPass;
    use crate::passes::resolution::ResolutionPass;
    use classforge_ast::ClassDefinition;
    use classforge_ast::build::*;
    use classforge_core::{DataType, Modifiers, QualifiedName};

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn generate_all(classes: &[ClassDefinition], mode: CodegenMode) -> Vec<Result<GeneratedArtifact, Vec<Diagnostic>>> {
        let mut registry = SymbolRegistry::with_host_library();
        let refs: Vec<&ClassDefinition> = classes.iter().collect();
        let diagnostics = ResolutionPass::new(&mut registry).run(&refs);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let lowering = LoweringPass::new(true);
        let generation = GenerationPass::new(&registry, mode);
        classes
            .iter()
            .map(|c| generation.generate(&lowering.lower_class(c)))
            .collect()
    }

    fn test_string_class() -> ClassDefinition {
        let mut class = ClassDefinition::new(q("pkg.Greeter"));
        class.add_method(
            "greet",
            Modifiers::PUBLIC,
            DataType::string(),
            vec![],
            block(vec![
                decl("sb", DataType::string_builder(), new_instance(known_class::string_builder(), vec![])),
                expr_stmt(call(var("sb"), "append", vec![lit_str("testString")])),
                ret(call(var("sb"), "toString", vec![])),
            ]),
        );
        class
    }

    #[test]
    fn generates_loadable_class_file() {
        let artifact = generate_all(&[test_string_class()], CodegenMode::Static)
            .remove(0)
            .unwrap();
        assert_eq!(artifact.name, q("pkg.Greeter"));

        let file = ClassFile::parse(&artifact.bytes).unwrap();
        assert_eq!(file.name(), Some("pkg.Greeter"));
        assert_eq!(file.super_name(), Some("lang.Object"));
        assert!(file.inner_classes.is_empty());

        let names: Vec<&str> = file.methods.iter().filter_map(|m| file.constants.utf8(m.name)).collect();
        assert_eq!(names, vec!["<init>", "greet"]);
        let greet = &file.methods[1];
        assert_eq!(file.constants.utf8(greet.descriptor), Some("()Llang.String;"));
        assert_eq!(greet.max_locals, 2);
        assert_eq!(decode_opcodes(&greet.code).last(), Some(&OpCode::Return));
    }

    #[test]
    fn inner_class_metadata_on_both_sides() {
        let outer = q("pkg.Outer");
        let inner = ClassDefinition::nested_in(&outer, "Inner", Modifiers::PUBLIC).unwrap();
        let results = generate_all(&[ClassDefinition::new(outer), inner], CodegenMode::Static);

        let outer_file = ClassFile::parse(&results[0].as_ref().unwrap().bytes).unwrap();
        let inner_file = ClassFile::parse(&results[1].as_ref().unwrap().bytes).unwrap();

        for file in [&outer_file, &inner_file] {
            assert_eq!(file.inner_classes.len(), 1);
            let info = file.inner_classes[0];
            assert_eq!(file.constants.class_name(info.inner_class), Some("pkg.Outer$Inner"));
            assert_eq!(file.constants.class_name(info.outer_class), Some("pkg.Outer"));
            assert_eq!(file.constants.utf8(info.simple_name), Some("Inner"));
        }

        let ctor = &inner_file.methods[0];
        assert_eq!(inner_file.constants.utf8(ctor.descriptor), Some("(Lpkg.Outer;)V"));
        let field = inner_file.fields[0];
        assert_eq!(inner_file.constants.utf8(field.name), Some("this$0"));
    }

    #[test]
    fn codegen_errors_become_diagnostics() {
        let mut class = ClassDefinition::new(q("pkg.Huge"));
        class.add_method(
            "text",
            Modifiers::PUBLIC,
            DataType::string(),
            vec![],
            block(vec![ret(lit_str(&"x".repeat(70_000)))]),
        );
        let result = generate_all(&[class], CodegenMode::Static).remove(0);
        let diagnostics = result.unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::CodegenLimit);
        assert_eq!(diagnostics[0].member.as_deref(), Some("text"));
    }

    #[test]
    fn oversized_member_name_is_a_limit_diagnostic() {
        let mut class = ClassDefinition::new(q("pkg.Big"));
        class.add_field("f".repeat(70_000), DataType::Int, Modifiers::PRIVATE, None);
        let diagnostics = generate_all(&[class], CodegenMode::Static).remove(0).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::CodegenLimit);
        assert!(diagnostics[0].message.contains("70000"), "{}", diagnostics[0].message);
    }

    #[test]
    fn dynamic_mode_uses_name_based_access() {
        let mut class = ClassDefinition::new(q("pkg.Loose"));
        class.add_method(
            "run",
            Modifiers::PUBLIC,
            DataType::object(),
            vec![],
            block(vec![
                decl("o", DataType::object(), new_instance(known_class::string_builder(), vec![])),
                ret(call(var("o"), "append", vec![lit_str("x")])),
            ]),
        );
        let artifact = generate_all(&[class], CodegenMode::Dynamic).remove(0).unwrap();
        let file = ClassFile::parse(&artifact.bytes).unwrap();
        let ops = decode_opcodes(&file.methods[1].code);
        assert!(ops.contains(&OpCode::InvokeDynamic));
        assert!(!ops.contains(&OpCode::InvokeVirtual));
    }
}
