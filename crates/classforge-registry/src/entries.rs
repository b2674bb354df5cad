//! Registry entries for classes and their members.

use classforge_core::{DataType, Modifiers, QualifiedName, TypeHash, method_descriptor};

/// Where a class comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassSource {
    /// Provided by the host runtime; never compiled.
    Host,
    /// Declared by a class definition in the current run.
    Script,
}

/// Signature of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    pub name: QualifiedName,
    pub modifiers: Modifiers,
    /// `None` only for the root class.
    pub superclass: Option<QualifiedName>,
    pub enclosing: Option<QualifiedName>,
    pub source: ClassSource,
    pub fields: Vec<FieldEntry>,
    pub methods: Vec<MethodEntry>,
    /// Constructors with their declared parameters. The outer instance
    /// parameter of inner classes is not included.
    pub constructors: Vec<MethodEntry>,
}

impl ClassEntry {
    /// Create an empty script class entry.
    pub fn script(name: QualifiedName, modifiers: Modifiers) -> Self {
        Self {
            name,
            modifiers,
            superclass: None,
            enclosing: None,
            source: ClassSource::Script,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Create an empty host class entry.
    pub fn host(name: QualifiedName, modifiers: Modifiers, superclass: Option<QualifiedName>) -> Self {
        Self {
            superclass,
            source: ClassSource::Host,
            ..Self::script(name, modifiers)
        }
    }

    pub fn is_host(&self) -> bool {
        self.source == ClassSource::Host
    }

    /// Non-static nested class whose instances carry an outer instance.
    pub fn is_inner(&self) -> bool {
        self.enclosing.is_some() && !self.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    /// Field declared directly on this class.
    pub fn own_field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Methods declared directly on this class with the given name.
    pub fn own_methods<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a MethodEntry> {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

/// Signature of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub owner: QualifiedName,
    pub name: String,
    pub ty: DataType,
    pub modifiers: Modifiers,
}

impl FieldEntry {
    pub fn new(owner: QualifiedName, name: impl Into<String>, ty: DataType, modifiers: Modifiers) -> Self {
        Self {
            owner,
            name: name.into(),
            ty,
            modifiers,
        }
    }
}

/// Signature of a method or constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry {
    pub owner: QualifiedName,
    /// Method name, `<init>` for constructors.
    pub name: String,
    pub modifiers: Modifiers,
    pub params: Vec<DataType>,
    pub return_type: DataType,
    /// Identity of the signature; the runtime binds host natives by it.
    pub hash: TypeHash,
}

impl MethodEntry {
    /// Name used for constructors.
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";

    pub fn method(
        owner: QualifiedName,
        name: impl Into<String>,
        modifiers: Modifiers,
        params: Vec<DataType>,
        return_type: DataType,
    ) -> Self {
        let name = name.into();
        let descriptors: Vec<String> = params.iter().map(DataType::descriptor).collect();
        let refs: Vec<&str> = descriptors.iter().map(String::as_str).collect();
        let hash = TypeHash::from_method(owner.to_type_hash(), &name, &refs);
        Self {
            owner,
            name,
            modifiers,
            params,
            return_type,
            hash,
        }
    }

    pub fn constructor(owner: QualifiedName, modifiers: Modifiers, params: Vec<DataType>) -> Self {
        let descriptors: Vec<String> = params.iter().map(DataType::descriptor).collect();
        let refs: Vec<&str> = descriptors.iter().map(String::as_str).collect();
        let hash = TypeHash::from_constructor(owner.to_type_hash(), &refs);
        Self {
            owner,
            name: Self::CONSTRUCTOR_NAME.to_string(),
            modifiers,
            params,
            return_type: DataType::Void,
            hash,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name == Self::CONSTRUCTOR_NAME
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Method descriptor of the declared signature.
    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.return_type)
    }

    /// `name(int, lang.String)` for diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}
