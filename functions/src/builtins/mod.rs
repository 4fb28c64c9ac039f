mod aggregate;
mod date;
mod json;
mod scalar;

use crate::registry::FunctionRegistry;

/// Registers every built-in function this server ships. Called once by
/// `FunctionRegistry::with_builtins` at startup; a deployment's own UDFs
/// are registered afterward via `register_udf` and may shadow any of these.
pub fn register_all(registry: &FunctionRegistry) {
    registry.register(Box::new(scalar::Upper));
    registry.register(Box::new(scalar::Lower));
    registry.register(Box::new(scalar::Length));
    registry.register(Box::new(scalar::Concat));
    registry.register(Box::new(scalar::Substring));
    registry.register(Box::new(scalar::Coalesce));
    registry.register(Box::new(scalar::Abs));
    registry.register(Box::new(scalar::Round));
    registry.register(Box::new(scalar::Database));

    registry.register(Box::new(aggregate::Count));
    registry.register(Box::new(aggregate::Sum));
    registry.register(Box::new(aggregate::Avg));
    registry.register(Box::new(aggregate::Min));
    registry.register(Box::new(aggregate::Max));

    registry.register(Box::new(date::Now));
    registry.register(Box::new(date::DateFormat));
    registry.register(Box::new(date::DateDiff));

    registry.register(Box::new(json::JsonExtract));
    registry.register(Box::new(json::JsonValid));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_all_covers_every_named_builtin() {
        let registry = FunctionRegistry::new();
        register_all(&registry);
        for name in [
            "UPPER", "LOWER", "LENGTH", "CONCAT", "SUBSTRING", "COALESCE", "ABS", "ROUND",
            "DATABASE", "COUNT", "SUM", "AVG", "MIN", "MAX", "NOW", "DATE_FORMAT", "DATEDIFF",
            "JSON_EXTRACT", "JSON_VALID",
        ] {
            assert!(registry.is_registered(name), "{name} not registered");
        }
    }
}
