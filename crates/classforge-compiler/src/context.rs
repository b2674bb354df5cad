//! Per-member compilation context.

use classforge_ast::{FieldMember, MethodMember};
use classforge_core::{DataType, Diagnostic, ErrorCode, QualifiedName};
use classforge_registry::{ClassEntry, MethodEntry, SymbolRegistry};

/// Where the outer instance for a new inner-class instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterInstance {
    /// The current instance is (a subclass of) the enclosing class.
    This,
    /// The current instance's own outer instance (`this.this$0`).
    EnclosingOfThis,
}

/// The class and member whose body is being checked or compiled.
#[derive(Debug, Clone)]
pub struct MethodContext<'a> {
    pub registry: &'a SymbolRegistry,
    pub class: &'a ClassEntry,
    /// Member name for diagnostics (`<init>` for constructors).
    pub member: String,
    pub is_static: bool,
    pub is_constructor: bool,
    pub return_type: DataType,
}

impl<'a> MethodContext<'a> {
    pub fn for_method(registry: &'a SymbolRegistry, class: &'a ClassEntry, method: &MethodMember) -> Self {
        Self {
            registry,
            class,
            member: method.name.clone(),
            is_static: method.modifiers.is_static(),
            is_constructor: false,
            return_type: method.return_type.clone(),
        }
    }

    pub fn for_constructor(registry: &'a SymbolRegistry, class: &'a ClassEntry) -> Self {
        Self {
            registry,
            class,
            member: MethodEntry::CONSTRUCTOR_NAME.to_string(),
            is_static: false,
            is_constructor: true,
            return_type: DataType::Void,
        }
    }

    /// Field initializers run inside every constructor.
    pub fn for_field_init(registry: &'a SymbolRegistry, class: &'a ClassEntry, field: &FieldMember) -> Self {
        Self {
            member: field.name.clone(),
            ..Self::for_constructor(registry, class)
        }
    }

    pub fn class_name(&self) -> &QualifiedName {
        &self.class.name
    }

    /// Diagnostic attributed to this class and member.
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(code, self.class.name.to_string(), message).with_member(self.member.clone())
    }

    pub fn this_type(&self) -> DataType {
        DataType::Class(self.class.name.clone())
    }

    /// Outer instance available for instantiating the inner class `target`.
    pub fn outer_instance(&self, target: &ClassEntry) -> Result<OuterInstance, Diagnostic> {
        let no_outer = || {
            self.error(
                ErrorCode::NoOuterInstance,
                format!("no enclosing instance of type '{}' is available", display_enclosing(target)),
            )
        };
        let Some(enclosing) = target.enclosing.as_ref() else {
            return Err(no_outer());
        };
        if self.is_static {
            return Err(no_outer());
        }
        if self.registry.is_subclass_of(&self.class.name, enclosing) {
            return Ok(OuterInstance::This);
        }
        match &self.class.enclosing {
            Some(own) if self.class.is_inner() && self.registry.is_subclass_of(own, enclosing) => {
                Ok(OuterInstance::EnclosingOfThis)
            }
            _ => Err(no_outer()),
        }
    }
}

fn display_enclosing(target: &ClassEntry) -> String {
    target
        .enclosing
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}
