//! Loaded classes and their reflection data.

use std::sync::Arc;

use classforge_compiler::bytecode::ConstantPool;
use classforge_compiler::classfile::ClassFile;
use classforge_core::{DataType, Modifiers, QualifiedName, known, parse_method_descriptor};
use classforge_registry::MethodEntry;

use crate::natives::NativeFn;
use crate::object::NativeData;
use crate::verify::VerifyError;

/// Host classes provided by the runtime itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClass {
    Object,
    String,
    StringBuilder,
}

impl HostClass {
    pub fn name(self) -> &'static str {
        match self {
            HostClass::Object => known::OBJECT,
            HostClass::String => known::STRING,
            HostClass::StringBuilder => known::STRING_BUILDER,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [HostClass::Object, HostClass::String, HostClass::StringBuilder]
            .into_iter()
            .find(|host| host.name() == name)
    }

    /// Native state of a fresh instance.
    pub(crate) fn native_state(self) -> Option<NativeData> {
        match self {
            HostClass::StringBuilder => Some(NativeData::StringBuilder(String::new())),
            HostClass::Object | HostClass::String => None,
        }
    }
}

/// A field declared by a loaded class.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedField {
    pub name: String,
    pub ty: DataType,
    pub access: Modifiers,
}

/// One slot of an instance's field layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    /// Class declaring the field.
    pub owner: QualifiedName,
    pub name: String,
    pub ty: DataType,
}

/// Executable body of a method.
#[derive(Clone)]
pub enum MethodBody {
    Abstract,
    Bytecode { max_locals: u16, code: Vec<u8> },
    Native(NativeFn),
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodBody::Abstract => write!(f, "Abstract"),
            MethodBody::Bytecode { max_locals, code } => f
                .debug_struct("Bytecode")
                .field("max_locals", max_locals)
                .field("code_len", &code.len())
                .finish(),
            MethodBody::Native(_) => write!(f, "Native"),
        }
    }
}

/// A method or constructor of a loaded class.
#[derive(Debug, Clone)]
pub struct LoadedMethod {
    pub name: String,
    pub descriptor: String,
    pub params: Vec<DataType>,
    pub return_type: DataType,
    pub access: Modifiers,
    pub body: MethodBody,
}

impl LoadedMethod {
    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == MethodEntry::CONSTRUCTOR_NAME
    }

    /// `name(descriptor)` for messages.
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

/// A method together with the class declaring it.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    pub class: Arc<LoadedClass>,
    pub method: Arc<LoadedMethod>,
}

/// A class defined in a loader.
#[derive(Debug)]
pub struct LoadedClass {
    name: QualifiedName,
    access: Modifiers,
    superclass: Option<Arc<LoadedClass>>,
    enclosing: Option<QualifiedName>,
    nested: Vec<QualifiedName>,
    fields: Vec<LoadedField>,
    layout: Vec<FieldSlot>,
    methods: Vec<Arc<LoadedMethod>>,
    constants: ConstantPool,
    host: Option<HostClass>,
}

impl LoadedClass {
    /// Build a class from a verified class file.
    pub(crate) fn from_class_file(
        file: ClassFile,
        superclass: Option<Arc<LoadedClass>>,
    ) -> Result<Self, VerifyError> {
        let bad = |message: &str| VerifyError::BadClass(message.to_string());
        let name = file
            .name()
            .and_then(|n| QualifiedName::parse(n).ok())
            .ok_or_else(|| bad("this_class is not a class name"))?;
        let this = name.to_string();

        let mut enclosing = None;
        let mut nested = Vec::new();
        for info in &file.inner_classes {
            let inner = file.constants.class_name(info.inner_class);
            let outer = file.constants.class_name(info.outer_class);
            let (Some(inner), Some(outer)) = (inner, outer) else {
                return Err(bad("inner class entry does not name classes"));
            };
            if inner == this {
                enclosing = QualifiedName::parse(outer).ok();
            } else if outer == this {
                nested.push(QualifiedName::parse(inner).map_err(|_| bad("invalid nested class name"))?);
            }
        }

        let mut fields = Vec::with_capacity(file.fields.len());
        for info in &file.fields {
            let field_name = file.constants.utf8(info.name).ok_or_else(|| bad("field name"))?;
            let ty = file
                .constants
                .utf8(info.descriptor)
                .and_then(DataType::from_descriptor)
                .ok_or_else(|| bad("field descriptor"))?;
            fields.push(LoadedField {
                name: field_name.to_string(),
                ty,
                access: Modifiers::from_bits_truncate(info.access),
            });
        }

        let mut layout = superclass.as_ref().map(|s| s.layout.clone()).unwrap_or_default();
        layout.extend(fields.iter().map(|f| FieldSlot {
            owner: name.clone(),
            name: f.name.clone(),
            ty: f.ty.clone(),
        }));

        let mut methods = Vec::with_capacity(file.methods.len());
        for info in file.methods {
            let method_name = file.constants.utf8(info.name).ok_or_else(|| bad("method name"))?;
            let descriptor = file.constants.utf8(info.descriptor).ok_or_else(|| bad("method descriptor"))?;
            let (params, return_type) =
                parse_method_descriptor(descriptor).ok_or_else(|| bad("method descriptor"))?;
            let access = Modifiers::from_bits_truncate(info.access);
            let body = if access.is_abstract() {
                MethodBody::Abstract
            } else {
                MethodBody::Bytecode {
                    max_locals: info.max_locals,
                    code: info.code,
                }
            };
            methods.push(Arc::new(LoadedMethod {
                name: method_name.to_string(),
                descriptor: descriptor.to_string(),
                params,
                return_type,
                access,
                body,
            }));
        }

        Ok(Self {
            name,
            access: Modifiers::from_bits_truncate(file.access),
            superclass,
            enclosing,
            nested,
            fields,
            layout,
            methods,
            constants: file.constants,
            host: None,
        })
    }

    /// A host class with native methods.
    pub(crate) fn new_host(
        host: HostClass,
        name: QualifiedName,
        access: Modifiers,
        superclass: Option<Arc<LoadedClass>>,
        methods: Vec<LoadedMethod>,
    ) -> Self {
        Self {
            name,
            access,
            superclass,
            enclosing: None,
            nested: Vec::new(),
            fields: Vec::new(),
            layout: Vec::new(),
            methods: methods.into_iter().map(Arc::new).collect(),
            constants: ConstantPool::new(),
            host: Some(host),
        }
    }

    // ==========================================================================
    // Reflection
    // ==========================================================================

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Name without package or enclosing classes: `Inner` for `pkg.Outer$Inner`.
    pub fn simple_name(&self) -> &str {
        self.name.simple_name()
    }

    pub fn access(&self) -> Modifiers {
        self.access
    }

    pub fn superclass(&self) -> Option<&Arc<LoadedClass>> {
        self.superclass.as_ref()
    }

    /// Enclosing class recorded in the inner-class metadata.
    pub fn enclosing_class(&self) -> Option<&QualifiedName> {
        self.enclosing.as_ref()
    }

    /// Classes declared directly inside this one.
    pub fn nested_classes(&self) -> &[QualifiedName] {
        &self.nested
    }

    /// Fields declared by this class, inherited ones excluded.
    pub fn fields(&self) -> &[LoadedField] {
        &self.fields
    }

    /// Methods and constructors declared by this class.
    pub fn methods(&self) -> &[Arc<LoadedMethod>] {
        &self.methods
    }

    /// Instance layout, superclass slots first.
    pub fn layout(&self) -> &[FieldSlot] {
        &self.layout
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn host(&self) -> Option<HostClass> {
        self.host
    }

    pub fn is_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    /// Non-static nested class; instances need an outer instance.
    pub fn is_inner(&self) -> bool {
        self.enclosing.is_some() && !self.access.is_static()
    }

    // ==========================================================================
    // Hierarchy
    // ==========================================================================

    /// Superclass steps from this class to `ancestor`, 0 for itself.
    pub fn distance_to(&self, ancestor: &str) -> Option<u32> {
        let mut current = Some(self);
        let mut distance = 0;
        while let Some(class) = current {
            if class.name.to_string() == ancestor {
                return Some(distance);
            }
            distance += 1;
            current = class.superclass.as_deref();
        }
        None
    }

    pub fn is_subclass_of(&self, ancestor: &str) -> bool {
        self.distance_to(ancestor).is_some()
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    /// Layout slot of the field `name` declared by `owner`.
    pub fn field_slot(&self, owner: &str, name: &str) -> Option<usize> {
        self.layout
            .iter()
            .position(|slot| slot.name == name && slot.owner.to_string() == owner)
    }

    /// Layout slot of the most derived field called `name`.
    pub fn field_slot_by_name(&self, name: &str) -> Option<usize> {
        self.layout.iter().rposition(|slot| slot.name == name)
    }

    /// Method declared by this class with an exact descriptor.
    pub fn declared_method(&self, name: &str, descriptor: &str) -> Option<&Arc<LoadedMethod>> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Method with an exact descriptor, searched up the superclass chain.
    pub fn find_method(self: &Arc<Self>, name: &str, descriptor: &str) -> Option<ResolvedMethod> {
        self.chain().find_map(|class| {
            class.declared_method(name, descriptor).map(|method| ResolvedMethod {
                class: Arc::clone(class),
                method: Arc::clone(method),
            })
        })
    }

    /// Every method called `name` taking `argc` arguments, most derived
    /// first. Overridden methods appear once.
    pub fn methods_named(self: &Arc<Self>, name: &str, argc: usize) -> Vec<ResolvedMethod> {
        let mut found: Vec<ResolvedMethod> = Vec::new();
        for class in self.chain() {
            for method in class.methods.iter().filter(|m| m.name == name && m.params.len() == argc) {
                if found.iter().any(|r| r.method.descriptor == method.descriptor) {
                    continue;
                }
                found.push(ResolvedMethod {
                    class: Arc::clone(class),
                    method: Arc::clone(method),
                });
            }
        }
        found
    }

    /// Constructors of this class taking `argc` arguments.
    pub fn constructors(self: &Arc<Self>, argc: usize) -> Vec<ResolvedMethod> {
        self.methods
            .iter()
            .filter(|m| m.is_constructor() && m.params.len() == argc)
            .map(|method| ResolvedMethod {
                class: Arc::clone(self),
                method: Arc::clone(method),
            })
            .collect()
    }

    /// This class followed by its superclasses.
    fn chain(self: &Arc<Self>) -> impl Iterator<Item = &Arc<LoadedClass>> {
        std::iter::successors(Some(self), |class| class.superclass.as_ref())
    }
}
