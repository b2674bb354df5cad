//! Cost-based overload resolution.
//!
//! Each argument is converted to its parameter type with a cost: 0 for an
//! identical type, 1 per widening step (`int → long → double`), 1 per
//! superclass step for references, and 1 for `null` to any reference. The
//! candidate with the lowest total cost wins; a tie on the lowest cost is
//! ambiguous.

use classforge_core::DataType;

use crate::{MethodEntry, SymbolRegistry};

/// Outcome of overload resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum OverloadResult<'a> {
    /// Exactly one best candidate.
    Found(&'a MethodEntry),
    /// Several candidates share the lowest cost.
    Ambiguous(Vec<&'a MethodEntry>),
    /// No candidate accepts the arguments.
    NoMatch,
}

impl<'a> OverloadResult<'a> {
    pub fn is_found(&self) -> bool {
        matches!(self, OverloadResult::Found(_))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, OverloadResult::Ambiguous(_))
    }

    pub fn ok(self) -> Option<&'a MethodEntry> {
        match self {
            OverloadResult::Found(m) => Some(m),
            _ => None,
        }
    }
}

/// Cost of converting a value of type `from` to `to`, `None` if not assignable.
pub fn conversion_cost(registry: &SymbolRegistry, from: &DataType, to: &DataType) -> Option<u32> {
    if from.is_void() || to.is_void() {
        return None;
    }
    if from == to {
        return Some(0);
    }
    match (from, to) {
        (DataType::Int, DataType::Long) | (DataType::Long, DataType::Double) => Some(1),
        (DataType::Int, DataType::Double) => Some(2),
        (DataType::Null, DataType::Class(_)) => Some(1),
        (DataType::Class(sub), DataType::Class(sup)) => registry.inheritance_distance(sub, sup),
        _ => None,
    }
}

/// Pick the best candidate for the argument types.
pub(crate) fn select<'a>(
    registry: &SymbolRegistry,
    candidates: impl IntoIterator<Item = &'a MethodEntry>,
    args: &[DataType],
) -> OverloadResult<'a> {
    let mut viable: Vec<(u32, &'a MethodEntry)> = candidates
        .into_iter()
        .filter(|m| m.params.len() == args.len())
        .filter_map(|m| {
            let mut total = 0;
            for (arg, param) in args.iter().zip(&m.params) {
                total += conversion_cost(registry, arg, param)?;
            }
            Some((total, m))
        })
        .collect();

    if viable.is_empty() {
        return OverloadResult::NoMatch;
    }

    viable.sort_by_key(|(cost, _)| *cost);
    let best = viable[0].0;
    let tied: Vec<&'a MethodEntry> = viable
        .iter()
        .take_while(|(cost, _)| *cost == best)
        .map(|(_, m)| *m)
        .collect();

    if tied.len() == 1 {
        OverloadResult::Found(tied[0])
    } else {
        OverloadResult::Ambiguous(tied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_core::known;

    #[test]
    fn primitive_costs() {
        let registry = SymbolRegistry::with_host_library();
        assert_eq!(conversion_cost(&registry, &DataType::Int, &DataType::Int), Some(0));
        assert_eq!(conversion_cost(&registry, &DataType::Int, &DataType::Long), Some(1));
        assert_eq!(conversion_cost(&registry, &DataType::Int, &DataType::Double), Some(2));
        assert_eq!(conversion_cost(&registry, &DataType::Double, &DataType::Int), None);
        assert_eq!(conversion_cost(&registry, &DataType::Boolean, &DataType::Int), None);
        assert_eq!(conversion_cost(&registry, &DataType::Void, &DataType::Void), None);
    }

    #[test]
    fn reference_costs() {
        let registry = SymbolRegistry::with_host_library();
        assert_eq!(
            conversion_cost(&registry, &DataType::string(), &DataType::object()),
            Some(1)
        );
        assert_eq!(
            conversion_cost(&registry, &DataType::Null, &DataType::string()),
            Some(1)
        );
        assert_eq!(
            conversion_cost(&registry, &DataType::object(), &DataType::string()),
            None
        );
        assert_eq!(conversion_cost(&registry, &DataType::Null, &DataType::Int), None);
    }

    #[test]
    fn string_builder_append_prefers_exact_overload() {
        let registry = SymbolRegistry::with_host_library();
        let sb = known::string_builder();

        let m = registry
            .resolve_method(&sb, "append", &[DataType::string()])
            .ok()
            .unwrap();
        assert_eq!(m.params, vec![DataType::string()]);

        let m = registry
            .resolve_method(&sb, "append", &[DataType::Int])
            .ok()
            .unwrap();
        assert_eq!(m.params, vec![DataType::Int]);

        // null converts to String and Object at equal cost
        assert!(
            registry
                .resolve_method(&sb, "append", &[DataType::Null])
                .is_ambiguous()
        );
        assert_eq!(
            registry.resolve_method(&sb, "append", &[]),
            OverloadResult::NoMatch
        );
    }
}
