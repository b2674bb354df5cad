//! Class and member nodes.

use classforge_core::{ConstructionError, DataType, Modifiers, QualifiedName, known};

use crate::expr::Expr;
use crate::stmt::Block;

/// A class built in memory rather than parsed from text.
///
/// Nested classes are owned by their enclosing definition. The `enclosing`
/// field is a non-owning back-reference by name, used for name derivation and
/// class-file metadata only.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    /// Fully qualified name, `Outer$Inner` for nested classes.
    pub name: QualifiedName,
    /// Class access and storage flags.
    pub modifiers: Modifiers,
    /// Direct superclass (`lang.Object` unless set).
    pub superclass: QualifiedName,
    /// Fields, methods and constructors in declaration order.
    pub members: Vec<Member>,
    /// Enclosing class for nested classes.
    pub enclosing: Option<QualifiedName>,
    /// Owned nested class definitions.
    pub nested: Vec<ClassDefinition>,
}

impl ClassDefinition {
    /// Create a public top-level class extending `lang.Object`.
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            modifiers: Modifiers::PUBLIC,
            superclass: known::object(),
            members: Vec::new(),
            enclosing: None,
            nested: Vec::new(),
        }
    }

    /// Create a class from a qualified name string.
    pub fn named(name: &str) -> Result<Self, ConstructionError> {
        Ok(Self::new(QualifiedName::parse(name)?))
    }

    /// Create a class nested in `outer`, named `<outer>$<simple_name>`.
    ///
    /// The definition is not attached to `outer`; pass it to
    /// [`add_nested`](Self::add_nested) or add it to a compilation unit alongside
    /// the outer class.
    pub fn nested_in(
        outer: &QualifiedName,
        simple_name: &str,
        modifiers: Modifiers,
    ) -> Result<Self, ConstructionError> {
        Ok(Self {
            name: outer.nested(simple_name)?,
            modifiers,
            superclass: known::object(),
            members: Vec::new(),
            enclosing: Some(outer.clone()),
            nested: Vec::new(),
        })
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_superclass(mut self, superclass: QualifiedName) -> Self {
        self.superclass = superclass;
        self
    }

    /// Attach an owned nested class.
    ///
    /// The nested class must already carry this class as its enclosing class.
    pub fn add_nested(&mut self, nested: ClassDefinition) -> Result<&mut Self, ConstructionError> {
        let expected = self.name.nested(nested.name.simple_name())?;
        if nested.name != expected || nested.enclosing.as_ref() != Some(&self.name) {
            return Err(ConstructionError::NestedNameMismatch {
                name: nested.name.to_string(),
                expected: expected.to_string(),
            });
        }
        self.nested.push(nested);
        Ok(self)
    }

    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        ty: DataType,
        modifiers: Modifiers,
        init: Option<Expr>,
    ) -> &mut Self {
        self.members.push(Member::Field(FieldMember {
            name: name.into(),
            ty,
            modifiers,
            init,
        }));
        self
    }

    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: DataType,
        params: Vec<Parameter>,
        body: Block,
    ) -> &mut Self {
        self.members.push(Member::Method(MethodMember {
            name: name.into(),
            modifiers,
            params,
            return_type,
            body: Some(body),
        }));
        self
    }

    /// Add a method without a body. The method is marked abstract.
    pub fn add_abstract_method(
        &mut self,
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: DataType,
        params: Vec<Parameter>,
    ) -> &mut Self {
        self.members.push(Member::Method(MethodMember {
            name: name.into(),
            modifiers: modifiers | Modifiers::ABSTRACT,
            params,
            return_type,
            body: None,
        }));
        self
    }

    pub fn add_constructor(
        &mut self,
        modifiers: Modifiers,
        params: Vec<Parameter>,
        body: Block,
    ) -> &mut Self {
        self.members.push(Member::Constructor(ConstructorMember {
            modifiers,
            params,
            body,
        }));
        self
    }

    pub fn simple_name(&self) -> &str {
        self.name.simple_name()
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    /// A nested class without `static`: instances carry an outer instance.
    pub fn is_inner(&self) -> bool {
        self.enclosing.is_some() && !self.is_static()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldMember> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodMember> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(f) => Some(f),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorMember> {
        self.members.iter().filter_map(|m| match m {
            Member::Constructor(c) => Some(c),
            _ => None,
        })
    }

    /// This class followed by all transitively nested classes, depth first.
    pub fn flatten(&self) -> Vec<&ClassDefinition> {
        let mut out = vec![self];
        for nested in &self.nested {
            out.extend(nested.flatten());
        }
        out
    }
}

/// A class member.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldMember),
    Method(MethodMember),
    Constructor(ConstructorMember),
}

impl Member {
    /// Member name (`<init>` for constructors).
    pub fn name(&self) -> &str {
        match self {
            Member::Field(f) => &f.name,
            Member::Method(m) => &m.name,
            Member::Constructor(_) => "<init>",
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Member::Field(f) => f.modifiers,
            Member::Method(m) => m.modifiers,
            Member::Constructor(c) => c.modifiers,
        }
    }
}

/// An instance field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMember {
    pub name: String,
    pub ty: DataType,
    pub modifiers: Modifiers,
    /// Initializer run by every constructor after the superclass constructor.
    pub init: Option<Expr>,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: DataType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodMember {
    pub name: String,
    pub modifiers: Modifiers,
    pub params: Vec<Parameter>,
    pub return_type: DataType,
    /// `None` for abstract methods.
    pub body: Option<Block>,
}

impl MethodMember {
    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

/// A constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorMember {
    pub modifiers: Modifiers,
    pub params: Vec<Parameter>,
    pub body: Block,
}

impl ConstructorMember {
    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}
