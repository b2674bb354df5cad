//! Resolution Pass - declare class signatures and resolve type references.
//!
//! Runs in three steps over every class of the unit:
//!
//! 1. **Declare**: register an entry per class so classes can reference each
//!    other regardless of order.
//! 2. **Resolve**: check enclosing classes, superclasses and member
//!    signatures, and fill in fields, methods and constructors. Inner classes
//!    get the synthetic outer-instance field; classes without constructors get
//!    the default one.
//! 3. **Validate**: inheritance cycles, overrides and unimplemented abstract
//!    methods, which need every signature in place.
//!
//! Type references inside member bodies (local declarations, `new`, static
//! calls) are resolved here as well, so they are checked even when static
//! type checking is disabled.

use rustc_hash::FxHashSet;
use tracing::debug;

use classforge_ast::{ClassDefinition, Expr, Stmt};
use classforge_core::{DataType, Diagnostic, ErrorCode, Modifiers, QualifiedName, known};
use classforge_registry::{ClassEntry, FieldEntry, MethodEntry, SymbolRegistry};

use crate::{OUTER_FIELD, OUTER_FIELD_MODIFIERS};

pub struct ResolutionPass<'r> {
    registry: &'r mut SymbolRegistry,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> ResolutionPass<'r> {
    pub fn new(registry: &'r mut SymbolRegistry) -> Self {
        Self {
            registry,
            diagnostics: Vec::new(),
        }
    }

    /// Resolve all classes of a unit, returning the diagnostics found.
    pub fn run(mut self, classes: &[&ClassDefinition]) -> Vec<Diagnostic> {
        for class in classes {
            self.declare(class);
        }
        for class in classes {
            self.resolve_class(class);
        }
        for class in classes {
            self.validate_class(class);
        }
        debug!(
            classes = classes.len(),
            errors = self.diagnostics.len(),
            "resolution finished"
        );
        self.diagnostics
    }

    fn error(&mut self, class: &QualifiedName, member: Option<&str>, code: ErrorCode, message: impl Into<String>) {
        let mut diagnostic = Diagnostic::error(code, class.to_string(), message);
        if let Some(member) = member {
            diagnostic = diagnostic.with_member(member);
        }
        self.diagnostics.push(diagnostic);
    }

    // ==========================================================================
    // Declare
    // ==========================================================================

    fn declare(&mut self, class: &ClassDefinition) {
        let name = &class.name;
        let mods = class.modifiers;
        if mods.has_conflicting_visibility() {
            self.error(name, None, ErrorCode::InvalidModifiers, "conflicting visibility modifiers");
        }
        if mods.is_abstract() && mods.is_final() {
            self.error(name, None, ErrorCode::InvalidModifiers, "a class cannot be both abstract and final");
        }
        if mods.is_static() && class.enclosing.is_none() {
            self.error(name, None, ErrorCode::InvalidModifiers, "only nested classes can be static");
        }

        let mut entry = ClassEntry::script(name.clone(), mods);
        entry.superclass = Some(class.superclass.clone());
        entry.enclosing = class.enclosing.clone();
        if self.registry.register_class(entry).is_err() {
            self.error(name, None, ErrorCode::DuplicateMember, format!("class '{name}' is already declared"));
        }
    }

    // ==========================================================================
    // Resolve
    // ==========================================================================

    fn resolve_class(&mut self, class: &ClassDefinition) {
        let name = &class.name;

        if let Some(enclosing) = &class.enclosing
            && !self.is_script_class(enclosing)
        {
            self.error(
                name,
                None,
                ErrorCode::UnknownEnclosingClass,
                format!("enclosing class '{enclosing}' is not part of the unit"),
            );
        }

        self.check_superclass(class);

        let mut fields = Vec::new();
        let mut seen_fields = FxHashSet::default();
        for field in class.fields() {
            let member = Some(field.name.as_str());
            self.check_value_type(name, member, &field.ty);
            if field.modifiers.is_static() {
                self.error(name, member, ErrorCode::InvalidModifiers, "static fields are not supported");
            }
            if field.modifiers.is_abstract() || field.modifiers.has_conflicting_visibility() {
                self.error(name, member, ErrorCode::InvalidModifiers, "invalid field modifiers");
            }
            if !seen_fields.insert(field.name.clone()) || (class.is_inner() && field.name == OUTER_FIELD) {
                self.error(
                    name,
                    member,
                    ErrorCode::DuplicateMember,
                    format!("field '{}' is already declared", field.name),
                );
                continue;
            }
            if let Some(init) = &field.init {
                self.check_expr_types(name, member, init);
            }
            fields.push(FieldEntry::new(name.clone(), field.name.clone(), field.ty.clone(), field.modifiers));
        }
        if class.is_inner()
            && let Some(enclosing) = &class.enclosing
        {
            fields.push(FieldEntry::new(
                name.clone(),
                OUTER_FIELD,
                DataType::Class(enclosing.clone()),
                OUTER_FIELD_MODIFIERS,
            ));
        }

        let mut methods: Vec<MethodEntry> = Vec::new();
        for method in class.methods() {
            let member = Some(method.name.as_str());
            for param in &method.params {
                self.check_value_type(name, member, &param.ty);
            }
            self.check_type(name, member, &method.return_type);

            let mut mods = method.modifiers;
            match &method.body {
                Some(body) => {
                    if mods.is_abstract() {
                        self.error(name, member, ErrorCode::InvalidModifiers, "an abstract method cannot have a body");
                    }
                    self.check_stmts(name, member, &body.stmts, false);
                }
                None => {
                    mods |= Modifiers::ABSTRACT;
                    if !class.is_abstract() {
                        self.error(
                            name,
                            member,
                            ErrorCode::InvalidModifiers,
                            format!("method '{}' has no body in a non-abstract class", method.name),
                        );
                    }
                    if mods.is_static() || mods.is_final() || mods.is_private() {
                        self.error(
                            name,
                            member,
                            ErrorCode::InvalidModifiers,
                            "an abstract method cannot be static, final or private",
                        );
                    }
                }
            }
            if mods.has_conflicting_visibility() {
                self.error(name, member, ErrorCode::InvalidModifiers, "conflicting visibility modifiers");
            }

            let entry = MethodEntry::method(
                name.clone(),
                method.name.clone(),
                mods,
                method.param_types(),
                method.return_type.clone(),
            );
            if methods.iter().any(|m| m.name == entry.name && m.params == entry.params) {
                self.error(
                    name,
                    member,
                    ErrorCode::DuplicateMember,
                    format!("method '{}' is already declared", entry.signature()),
                );
                continue;
            }
            methods.push(entry);
        }

        let mut constructors: Vec<MethodEntry> = Vec::new();
        for ctor in class.constructors() {
            let member = Some(MethodEntry::CONSTRUCTOR_NAME);
            for param in &ctor.params {
                self.check_value_type(name, member, &param.ty);
            }
            if ctor.modifiers.intersects(Modifiers::STATIC | Modifiers::ABSTRACT | Modifiers::FINAL)
                || ctor.modifiers.has_conflicting_visibility()
            {
                self.error(name, member, ErrorCode::InvalidModifiers, "invalid constructor modifiers");
            }
            self.check_stmts(name, member, &ctor.body.stmts, true);

            let entry = MethodEntry::constructor(name.clone(), ctor.modifiers, ctor.param_types());
            if constructors.iter().any(|c| c.params == entry.params) {
                self.error(
                    name,
                    member,
                    ErrorCode::DuplicateMember,
                    format!("constructor '{}' is already declared", entry.signature()),
                );
                continue;
            }
            constructors.push(entry);
        }
        if constructors.is_empty() {
            constructors.push(MethodEntry::constructor(name.clone(), Modifiers::PUBLIC, Vec::new()));
        }

        if let Some(entry) = self.registry.get_class_mut(name) {
            entry.fields = fields;
            entry.methods = methods;
            entry.constructors = constructors;
        }
    }

    fn is_script_class(&self, name: &QualifiedName) -> bool {
        self.registry.get_class(name).is_some_and(|entry| !entry.is_host())
    }

    fn check_superclass(&mut self, class: &ClassDefinition) {
        let name = &class.name;
        let superclass = &class.superclass;
        let problem = match self.registry.get_class(superclass) {
            None => Some(format!("superclass '{superclass}' is not defined")),
            Some(_) if superclass == name => Some(format!("class '{name}' cannot extend itself")),
            Some(entry) if entry.is_host() && *superclass != known::object() => {
                Some(format!("host class '{superclass}' cannot be extended"))
            }
            Some(entry) if entry.modifiers.is_final() => Some(format!("superclass '{superclass}' is final")),
            Some(entry) if entry.is_inner() => Some(format!("inner class '{superclass}' cannot be extended")),
            Some(_) => None,
        };
        if let Some(message) = problem {
            let code = if superclass == name {
                ErrorCode::CircularInheritance
            } else {
                ErrorCode::InvalidSuperclass
            };
            self.error(name, None, code, message);
        }
    }

    /// A declared type that must name something.
    fn check_type(&mut self, class: &QualifiedName, member: Option<&str>, ty: &DataType) {
        match ty {
            DataType::Class(target) if !self.registry.contains_class(target) => {
                self.error(class, member, ErrorCode::UnknownType, format!("unknown type '{target}'"));
            }
            DataType::Null => {
                self.error(class, member, ErrorCode::UnknownType, "'null' is not a declarable type");
            }
            _ => {}
        }
    }

    /// A declared type of a field, parameter or local, which cannot be void.
    fn check_value_type(&mut self, class: &QualifiedName, member: Option<&str>, ty: &DataType) {
        if ty.is_void() {
            self.error(class, member, ErrorCode::TypeMismatch, "'void' is not a value type");
        } else {
            self.check_type(class, member, ty);
        }
    }

    /// Walk a body for type references and superclass call placement.
    fn check_stmts(&mut self, class: &QualifiedName, member: Option<&str>, stmts: &[Stmt], constructor: bool) {
        for (index, stmt) in stmts.iter().enumerate() {
            let allow_super = constructor && index == 0;
            self.check_stmt(class, member, stmt, allow_super);
        }
    }

    fn check_stmt(&mut self, class: &QualifiedName, member: Option<&str>, stmt: &Stmt, allow_super: bool) {
        match stmt {
            Stmt::Block(block) => self.check_stmts(class, member, &block.stmts, false),
            Stmt::VarDecl(decl) => {
                self.check_value_type(class, member, &decl.ty);
                if let Some(init) = &decl.init {
                    self.check_expr_types(class, member, init);
                }
            }
            Stmt::Expr(expr) | Stmt::Return(Some(expr)) => self.check_expr_types(class, member, expr),
            Stmt::Return(None) => {}
            Stmt::If(if_stmt) => {
                self.check_expr_types(class, member, &if_stmt.condition);
                self.check_stmt(class, member, &if_stmt.then_branch, false);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.check_stmt(class, member, else_branch, false);
                }
            }
            Stmt::While(while_stmt) => {
                self.check_expr_types(class, member, &while_stmt.condition);
                self.check_stmt(class, member, &while_stmt.body, false);
            }
            Stmt::SuperCall(args) => {
                if !allow_super {
                    self.error(
                        class,
                        member,
                        ErrorCode::MisplacedSuperCall,
                        "superclass constructor call must be the first statement of a constructor",
                    );
                }
                for arg in args {
                    self.check_expr_types(class, member, arg);
                }
            }
        }
    }

    fn check_expr_types(&mut self, class: &QualifiedName, member: Option<&str>, expr: &Expr) {
        match expr {
            Expr::Literal(_) | Expr::Variable(_) | Expr::This | Expr::OuterThis => {}
            Expr::Field { target, .. } => self.check_expr_types(class, member, target),
            Expr::Assign { target, value } => {
                self.check_expr_types(class, member, target);
                self.check_expr_types(class, member, value);
            }
            Expr::Call { receiver, args, .. } => {
                self.check_expr_types(class, member, receiver);
                for arg in args {
                    self.check_expr_types(class, member, arg);
                }
            }
            Expr::StaticCall { class: target, args, .. } | Expr::New { class: target, args } => {
                self.check_type(class, member, &DataType::Class(target.clone()));
                for arg in args {
                    self.check_expr_types(class, member, arg);
                }
            }
            Expr::Binary { left, right, .. } => {
                self.check_expr_types(class, member, left);
                self.check_expr_types(class, member, right);
            }
            Expr::Unary { operand, .. } => self.check_expr_types(class, member, operand),
        }
    }

    // ==========================================================================
    // Validate
    // ==========================================================================

    fn validate_class(&mut self, class: &ClassDefinition) {
        let name = &class.name;
        let graph = self.registry.inheritance_graph();
        if class.superclass != *name && graph.is_cyclic(name) {
            self.error(
                name,
                None,
                ErrorCode::CircularInheritance,
                format!("class '{name}' inherits from itself"),
            );
            return;
        }

        let registry: &SymbolRegistry = &*self.registry;
        let Some(entry) = registry.get_class(name) else { return };
        let mut problems: Vec<(Option<String>, ErrorCode, String)> = Vec::new();

        // overrides must keep the return type and cannot replace final methods
        let ancestors = registry.superclass_chain(name).into_iter().skip(1).collect::<Vec<_>>();
        for method in &entry.methods {
            let overridden = ancestors
                .iter()
                .flat_map(|a| a.own_methods(&method.name))
                .find(|m| m.params == method.params);
            if let Some(base) = overridden {
                if base.return_type != method.return_type {
                    problems.push((
                        Some(method.name.clone()),
                        ErrorCode::TypeMismatch,
                        format!("override of '{}' changes the return type", base.signature()),
                    ));
                }
                if base.modifiers.is_final() {
                    problems.push((
                        Some(method.name.clone()),
                        ErrorCode::InvalidModifiers,
                        format!("'{}' is final in '{}'", base.signature(), base.owner),
                    ));
                }
            }
        }

        if !entry.is_abstract() {
            for ancestor in &ancestors {
                for method in ancestor.methods.iter().filter(|m| m.modifiers.is_abstract()) {
                    let implemented = registry
                        .find_methods(name, &method.name)
                        .into_iter()
                        .find(|m| m.params == method.params)
                        .is_some_and(|m| !m.modifiers.is_abstract());
                    if !implemented {
                        problems.push((
                            None,
                            ErrorCode::InvalidModifiers,
                            format!(
                                "class must be abstract or implement '{}' from '{}'",
                                method.signature(),
                                method.owner
                            ),
                        ));
                    }
                }
            }
        }

        for (member, code, message) in problems {
            self.error(name, member.as_deref(), code, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_ast::build::*;

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn resolve(classes: &[ClassDefinition]) -> (SymbolRegistry, Vec<Diagnostic>) {
        let mut registry = SymbolRegistry::with_host_library();
        let refs: Vec<&ClassDefinition> = classes.iter().collect();
        let diagnostics = ResolutionPass::new(&mut registry).run(&refs);
        (registry, diagnostics)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn classes_reference_each_other_in_any_order() {
        let mut a = ClassDefinition::new(q("p.A"));
        a.add_field("b", DataType::class(q("p.B")), Modifiers::PRIVATE, None);
        let mut b = ClassDefinition::new(q("p.B"));
        b.add_method(
            "make",
            Modifiers::PUBLIC,
            DataType::class(q("p.A")),
            vec![],
            block(vec![ret(new_instance(q("p.A"), vec![]))]),
        );
        let (registry, diagnostics) = resolve(&[a, b]);
        assert_eq!(diagnostics, vec![]);
        assert_eq!(registry.get_class(&q("p.A")).unwrap().fields.len(), 1);
        // default constructor
        assert_eq!(registry.get_class(&q("p.B")).unwrap().constructors.len(), 1);
    }

    #[test]
    fn inner_class_gets_outer_field() {
        let outer = q("p.Outer");
        let inner = ClassDefinition::nested_in(&outer, "Inner", Modifiers::PUBLIC).unwrap();
        let (registry, diagnostics) = resolve(&[ClassDefinition::new(outer.clone()), inner]);
        assert_eq!(diagnostics, vec![]);
        let entry = registry.get_class(&q("p.Outer$Inner")).unwrap();
        let field = entry.own_field(OUTER_FIELD).unwrap();
        assert_eq!(field.ty, DataType::Class(outer));
        assert!(field.modifiers.contains(Modifiers::SYNTHETIC));
        // declared parameters only
        assert!(entry.constructors[0].params.is_empty());
    }

    #[test]
    fn missing_enclosing_class() {
        let inner = ClassDefinition::nested_in(&q("p.Gone"), "Inner", Modifiers::PUBLIC).unwrap();
        let (_, diagnostics) = resolve(&[inner]);
        assert_eq!(codes(&diagnostics), vec![ErrorCode::UnknownEnclosingClass]);
    }

    #[test]
    fn superclass_rules() {
        let missing = ClassDefinition::new(q("p.A")).with_superclass(q("p.Missing"));
        let host = ClassDefinition::new(q("p.B")).with_superclass(known::string_builder());
        let base = ClassDefinition::new(q("p.Final")).with_modifiers(Modifiers::PUBLIC | Modifiers::FINAL);
        let derived = ClassDefinition::new(q("p.C")).with_superclass(q("p.Final"));
        let (_, diagnostics) = resolve(&[missing, host, base, derived]);
        assert_eq!(
            codes(&diagnostics),
            vec![
                ErrorCode::InvalidSuperclass,
                ErrorCode::InvalidSuperclass,
                ErrorCode::InvalidSuperclass
            ]
        );
    }

    #[test]
    fn inheritance_cycle() {
        let a = ClassDefinition::new(q("p.A")).with_superclass(q("p.B"));
        let b = ClassDefinition::new(q("p.B")).with_superclass(q("p.A"));
        let (_, diagnostics) = resolve(&[a, b]);
        assert_eq!(
            codes(&diagnostics),
            vec![ErrorCode::CircularInheritance, ErrorCode::CircularInheritance]
        );
    }

    #[test]
    fn duplicate_members() {
        let mut class = ClassDefinition::new(q("p.A"));
        class.add_field("x", DataType::Int, Modifiers::PRIVATE, None);
        class.add_field("x", DataType::Long, Modifiers::PRIVATE, None);
        class.add_method("f", Modifiers::PUBLIC, DataType::Void, vec![], block(vec![]));
        class.add_method("f", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_int(1))]));
        class.add_method(
            "f",
            Modifiers::PUBLIC,
            DataType::Void,
            vec![param("n", DataType::Int)],
            block(vec![]),
        );
        let (registry, diagnostics) = resolve(&[class]);
        assert_eq!(
            codes(&diagnostics),
            vec![ErrorCode::DuplicateMember, ErrorCode::DuplicateMember]
        );
        assert_eq!(registry.get_class(&q("p.A")).unwrap().methods.len(), 2);
    }

    #[test]
    fn unknown_types_in_signatures_and_bodies() {
        let mut class = ClassDefinition::new(q("p.A"));
        class.add_method(
            "f",
            Modifiers::PUBLIC,
            DataType::Void,
            vec![param("g", DataType::class(q("p.Ghost")))],
            block(vec![
                decl_uninit("h", DataType::class(q("p.Phantom"))),
                expr_stmt(static_call(q("p.Nowhere"), "go", vec![])),
            ]),
        );
        let (_, diagnostics) = resolve(&[class]);
        assert_eq!(
            codes(&diagnostics),
            vec![ErrorCode::UnknownType, ErrorCode::UnknownType, ErrorCode::UnknownType]
        );
        assert!(diagnostics.iter().all(|d| d.member.as_deref() == Some("f")));
    }

    #[test]
    fn modifier_rules() {
        let mut class = ClassDefinition::new(q("p.A"));
        class.add_field("count", DataType::Int, Modifiers::STATIC, None);
        class.add_abstract_method("area", Modifiers::PUBLIC, DataType::Double, vec![]);
        let top_static = ClassDefinition::new(q("p.B")).with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC);
        let (_, diagnostics) = resolve(&[class, top_static]);
        assert_eq!(
            codes(&diagnostics),
            vec![
                ErrorCode::InvalidModifiers,
                ErrorCode::InvalidModifiers,
                ErrorCode::InvalidModifiers
            ]
        );
    }

    #[test]
    fn misplaced_super_call() {
        let mut class = ClassDefinition::new(q("p.A"));
        class.add_constructor(
            Modifiers::PUBLIC,
            vec![],
            block(vec![expr_stmt(lit_int(1)), super_call(vec![])]),
        );
        let (_, diagnostics) = resolve(&[class]);
        assert_eq!(codes(&diagnostics), vec![ErrorCode::MisplacedSuperCall]);
    }

    #[test]
    fn abstract_methods_must_be_implemented() {
        let mut shape = ClassDefinition::new(q("p.Shape")).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        shape.add_abstract_method("area", Modifiers::PUBLIC, DataType::Double, vec![]);
        let square = ClassDefinition::new(q("p.Square")).with_superclass(q("p.Shape"));
        let mut circle = ClassDefinition::new(q("p.Circle")).with_superclass(q("p.Shape"));
        circle.add_method(
            "area",
            Modifiers::PUBLIC,
            DataType::Double,
            vec![],
            block(vec![ret(lit_double(3.14))]),
        );
        let (_, diagnostics) = resolve(&[shape, square, circle]);
        assert_eq!(codes(&diagnostics), vec![ErrorCode::InvalidModifiers]);
        assert_eq!(diagnostics[0].class, "p.Square");
    }

    #[test]
    fn override_must_keep_return_type() {
        let mut base = ClassDefinition::new(q("p.Base"));
        base.add_method("size", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_int(1))]));
        let mut derived = ClassDefinition::new(q("p.Derived")).with_superclass(q("p.Base"));
        derived.add_method("size", Modifiers::PUBLIC, DataType::Long, vec![], block(vec![ret(lit_long(1))]));
        let (_, diagnostics) = resolve(&[base, derived]);
        assert_eq!(codes(&diagnostics), vec![ErrorCode::TypeMismatch]);
    }
}
