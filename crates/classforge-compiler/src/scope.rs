//! Local scope management for method compilation.
//!
//! `LocalScope` tracks local variables while a method body is checked or
//! compiled:
//! - slot allocation for the receiver, parameters and locals
//! - nested block scopes (if/while bodies and blocks)
//!
//! A name may be declared only once while it is visible; sibling blocks may
//! reuse a name. Slots are never reused within a method.

use classforge_core::DataType;
use rustc_hash::FxHashMap;

// ============================================================================
// Types
// ============================================================================

/// Information about a local variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub data_type: DataType,
    pub slot: u16,
    /// Scope depth where declared.
    pub depth: u32,
}

/// Why a declaration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareError {
    /// The name is already visible.
    Duplicate,
    /// The method needs more than `u16::MAX` slots.
    TooManyLocals,
}

// ============================================================================
// LocalScope
// ============================================================================

#[derive(Debug, Default)]
pub struct LocalScope {
    /// Visible variables by name.
    variables: FxHashMap<String, LocalVar>,
    /// Current scope depth (0 = method scope).
    scope_depth: u32,
    /// Next available slot.
    next_slot: u32,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope of an instance method: slot 0 holds the receiver.
    pub fn for_instance() -> Self {
        Self {
            next_slot: 1,
            ..Self::default()
        }
    }

    /// Enter a new block scope.
    pub fn push_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Exit the current block scope, removing variables declared in it.
    pub fn pop_scope(&mut self) {
        let depth = self.scope_depth;
        self.variables.retain(|_, var| var.depth < depth);
        self.scope_depth = self.scope_depth.saturating_sub(1);
    }

    /// Declare a variable in the current scope and allocate its slot.
    pub fn declare(&mut self, name: &str, data_type: DataType) -> Result<u16, DeclareError> {
        if self.variables.contains_key(name) {
            return Err(DeclareError::Duplicate);
        }
        let slot = u16::try_from(self.next_slot).map_err(|_| DeclareError::TooManyLocals)?;
        self.next_slot += 1;
        self.variables.insert(
            name.to_string(),
            LocalVar {
                name: name.to_string(),
                data_type,
                slot,
                depth: self.scope_depth,
            },
        );
        Ok(slot)
    }

    pub fn lookup(&self, name: &str) -> Option<&LocalVar> {
        self.variables.get(name)
    }

    /// Number of slots the method needs.
    pub fn max_locals(&self) -> u16 {
        u16::try_from(self.next_slot).unwrap_or(u16::MAX)
    }
}
