// tests/property/table_test.rs

//! Property-based tests for command registration and lookup

use linewire::core::HandlerError;
use linewire::core::commands::{CommandContext, CommandTable};
use proptest::prelude::*;
use std::collections::HashSet;

fn noop(_: &CommandContext<'_>, _: &[String]) -> Result<(), HandlerError> {
    Ok(())
}

proptest! {
    #[test]
    fn test_at_most_one_registration_per_name_and_arity(
        entries in prop::collection::vec(("[A-D]{1,2}", 0usize..4), 0..24),
    ) {
        let mut table = CommandTable::new();
        let mut seen = HashSet::new();

        for (name, arity) in &entries {
            let fresh = seen.insert((name.clone(), *arity));
            prop_assert_eq!(table.register(name, *arity, noop).is_ok(), fresh);
        }
        prop_assert_eq!(table.len(), seen.len());

        for name in ["A", "B", "AB", "DD"] {
            for arity in 0..4 {
                let found = table.find(name, arity);
                prop_assert_eq!(found.is_some(), seen.contains(&(name.to_string(), arity)));
                if let Some(registration) = found {
                    prop_assert_eq!(&registration.name, name);
                    prop_assert_eq!(registration.arity, arity);
                }
            }
        }
    }
}
