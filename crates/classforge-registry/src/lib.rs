//! Symbol registry for classforge.
//!
//! Stores the signatures of every class visible to a compilation run: the
//! host library (`lang.Object`, `lang.String`, `lang.StringBuilder`) and the
//! classes declared by the run itself. Member bodies are not stored here.
//!
//! - [`SymbolRegistry`]: name keyed class storage, member lookup,
//!   assignability and overload resolution
//! - [`InheritanceGraph`]: superclass edges for cycle detection
//! - [`host`]: signatures of the host library classes

mod entries;
mod hierarchy;
pub mod host;
mod overload;
mod registry;

pub use entries::{ClassEntry, ClassSource, FieldEntry, MethodEntry};
pub use hierarchy::InheritanceGraph;
pub use overload::{OverloadResult, conversion_cost};
pub use registry::SymbolRegistry;
