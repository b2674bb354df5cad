//! Semantic diagnostics.
//!
//! Class definitions have no source text, so a diagnostic is located by the
//! class (and member, when known) it was raised for rather than by a span.

use std::fmt;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Categories of semantic diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Resolution
    /// A referenced class does not exist in the unit or the host library.
    UnknownType,
    /// A class declares an enclosing class that is not part of the unit.
    UnknownEnclosingClass,
    /// A superclass is final, a host class other than `lang.Object`, or missing.
    InvalidSuperclass,
    /// A class is (transitively) its own superclass.
    CircularInheritance,
    /// Two members share a name and signature.
    DuplicateMember,
    /// Conflicting or misplaced modifiers.
    InvalidModifiers,

    // Type checking
    /// A local variable is not declared in scope.
    UnknownVariable,
    /// A field does not exist on the target type.
    UnknownField,
    /// No method with that name exists on the target type.
    UnknownMethod,
    /// No overload accepts the argument types.
    NoMatchingOverload,
    /// More than one overload accepts the argument types equally well.
    AmbiguousCall,
    /// A value is not assignable to the expected type.
    TypeMismatch,
    /// An operator does not accept its operand types.
    InvalidOperand,
    /// Assignment to something that is not a variable or field.
    InvalidAssignmentTarget,
    /// A local variable is declared twice in one method.
    DuplicateVariable,
    /// A non-void method can complete without returning a value.
    MissingReturn,
    /// `this` or an instance member used from a static method.
    StaticContext,
    /// Outer instance requested where none exists.
    NoOuterInstance,
    /// Instantiation of an abstract class.
    AbstractInstantiation,
    /// Member access on a primitive value.
    NotAnObject,
    /// A superclass constructor call outside the first statement of a constructor.
    MisplacedSuperCall,

    // Generation
    /// Code generation limits were exceeded.
    CodegenLimit,
}

impl ErrorCode {
    /// Stable short code, e.g. `CF0101`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownType => "CF0001",
            ErrorCode::UnknownEnclosingClass => "CF0002",
            ErrorCode::InvalidSuperclass => "CF0003",
            ErrorCode::CircularInheritance => "CF0004",
            ErrorCode::DuplicateMember => "CF0005",
            ErrorCode::InvalidModifiers => "CF0006",
            ErrorCode::UnknownVariable => "CF0101",
            ErrorCode::UnknownField => "CF0102",
            ErrorCode::UnknownMethod => "CF0103",
            ErrorCode::NoMatchingOverload => "CF0104",
            ErrorCode::AmbiguousCall => "CF0105",
            ErrorCode::TypeMismatch => "CF0106",
            ErrorCode::InvalidOperand => "CF0107",
            ErrorCode::InvalidAssignmentTarget => "CF0108",
            ErrorCode::DuplicateVariable => "CF0109",
            ErrorCode::MissingReturn => "CF0110",
            ErrorCode::StaticContext => "CF0111",
            ErrorCode::NoOuterInstance => "CF0112",
            ErrorCode::AbstractInstantiation => "CF0113",
            ErrorCode::NotAnObject => "CF0114",
            ErrorCode::MisplacedSuperCall => "CF0115",
            ErrorCode::CodegenLimit => "CF0201",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic attributed to a class and, optionally, a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// Qualified name of the class the diagnostic belongs to.
    pub class: String,
    /// Member name (`<init>` for constructors).
    pub member: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            class: class.into(),
            member: None,
        }
    }

    pub fn warning(code: ErrorCode, class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, class, message)
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.class)?;
        if let Some(member) = &self.member {
            write!(f, ".{member}")?;
        }
        write!(f, ": {}", self.message)
    }
}
