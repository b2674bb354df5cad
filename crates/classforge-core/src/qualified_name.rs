use std::fmt;

use crate::ConstructionError;

/// Separator between an enclosing class and a nested class simple name.
pub const NESTED_SEPARATOR: char = '$';

/// Separator between package segments.
pub const PACKAGE_SEPARATOR: char = '.';

/// Fully qualified class name.
///
/// Package segments are dot separated; nested classes append `$Simple` to the
/// name of their enclosing class.
///
/// # Examples
///
/// ```
/// use classforge_core::QualifiedName;
///
/// let outer = QualifiedName::parse("com.example.TopLevelClass").unwrap();
/// let inner = outer.nested("NestedClass").unwrap();
/// assert_eq!(inner.to_string(), "com.example.TopLevelClass$NestedClass");
/// assert_eq!(inner.simple_name(), "NestedClass");
/// assert_eq!(inner.enclosing(), Some(outer));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    /// Package path (e.g. `["com", "example"]`), empty for the default package.
    package: Vec<String>,
    /// Class name within the package, including `$` nesting.
    name: String,
}

impl QualifiedName {
    /// Parse and validate a qualified name.
    ///
    /// Every segment must be a non-empty identifier.
    pub fn parse(s: &str) -> Result<Self, ConstructionError> {
        if s.is_empty() {
            return Err(ConstructionError::EmptyName);
        }

        let mut segments: Vec<&str> = s.split(PACKAGE_SEPARATOR).collect();
        let name = segments.pop().unwrap_or_default();

        for segment in &segments {
            if !is_identifier(segment) {
                return Err(ConstructionError::InvalidName {
                    name: s.to_string(),
                    reason: format!("invalid package segment '{segment}'"),
                });
            }
        }

        for part in name.split(NESTED_SEPARATOR) {
            if !is_identifier(part) {
                return Err(ConstructionError::InvalidName {
                    name: s.to_string(),
                    reason: format!("invalid class name segment '{part}'"),
                });
            }
        }

        Ok(Self {
            package: segments.into_iter().map(String::from).collect(),
            name: name.to_string(),
        })
    }

    pub(crate) fn new_unchecked(package: &[&str], name: &str) -> Self {
        Self {
            package: package.iter().map(|s| s.to_string()).collect(),
            name: name.to_string(),
        }
    }

    /// Derive the qualified name of a class nested in this one.
    pub fn nested(&self, simple_name: &str) -> Result<Self, ConstructionError> {
        if !is_identifier(simple_name) {
            return Err(ConstructionError::InvalidName {
                name: format!("{self}{NESTED_SEPARATOR}{simple_name}"),
                reason: format!("invalid nested class name '{simple_name}'"),
            });
        }
        Ok(Self {
            package: self.package.clone(),
            name: format!("{}{NESTED_SEPARATOR}{simple_name}", self.name),
        })
    }

    /// Simple name: the part after the last `$` or `.`.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(NESTED_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    /// Name within the package, including nesting (e.g. `Outer$Inner`).
    pub fn class_name(&self) -> &str {
        &self.name
    }

    /// Package path segments.
    pub fn package(&self) -> &[String] {
        &self.package
    }

    /// Package as a dotted string, empty for the default package.
    pub fn package_string(&self) -> String {
        self.package.join(".")
    }

    /// Whether the name carries a `$` nesting component.
    pub fn is_nested(&self) -> bool {
        self.name.contains(NESTED_SEPARATOR)
    }

    /// The name of the enclosing class derived from the `$` separator.
    pub fn enclosing(&self) -> Option<Self> {
        let (outer, _) = self.name.rsplit_once(NESTED_SEPARATOR)?;
        Some(Self {
            package: self.package.clone(),
            name: outer.to_string(),
        })
    }

    /// Type hash of this class name.
    pub fn to_type_hash(&self) -> crate::TypeHash {
        crate::TypeHash::from_name(&self.to_string())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.package {
            write!(f, "{segment}{PACKAGE_SEPARATOR}")?;
        }
        write!(f, "{}", self.name)
    }
}

impl TryFrom<&str> for QualifiedName {
    type Error = ConstructionError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
