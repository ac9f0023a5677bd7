//! `CrossDatabaseMapping`: an operator-configured join alias between two independent databases.

use serde::{Deserialize, Serialize};

/// One endpoint of a [`CrossDatabaseMapping`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEndpoint {
    /// Database id, as registered with the [`crate::schema_registry::SchemaRegistry`].
    pub database_id: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

/// An operator-declared correspondence between columns in two independent
/// databases, used when conventional foreign-key discovery is impossible
/// because the databases have no shared constraint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossDatabaseMapping {
    /// The source side of the mapping.
    pub source: MappingEndpoint,
    /// The target side of the mapping.
    pub target: MappingEndpoint,
}

impl CrossDatabaseMapping {
    /// Returns `true` if `database_id`/`table` matches either endpoint of this mapping.
    #[must_use]
    pub fn touches(&self, database_id: &str, table: &str) -> bool {
        (self.source.database_id == database_id && self.source.table.eq_ignore_ascii_case(table))
            || (self.target.database_id == database_id && self.target.table.eq_ignore_ascii_case(table))
    }

    /// Returns the endpoint opposite the one identified by `database_id`/`table`, if it matches.
    #[must_use]
    pub fn other_end(&self, database_id: &str, table: &str) -> Option<&MappingEndpoint> {
        if self.source.database_id == database_id && self.source.table.eq_ignore_ascii_case(table) {
            Some(&self.target)
        } else if self.target.database_id == database_id && self.target.table.eq_ignore_ascii_case(table) {
            Some(&self.source)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> CrossDatabaseMapping {
        CrossDatabaseMapping {
            source: MappingEndpoint {
                database_id: "orders_db".into(),
                table: "Orders".into(),
                column: "CustomerId".into(),
            },
            target: MappingEndpoint {
                database_id: "crm_db".into(),
                table: "Customers".into(),
                column: "Id".into(),
            },
        }
    }

    #[test]
    fn touches_matches_either_endpoint_case_insensitively() {
        let m = mapping();
        assert!(m.touches("orders_db", "orders"));
        assert!(m.touches("crm_db", "Customers"));
        assert!(!m.touches("crm_db", "Orders"));
    }

    #[test]
    fn other_end_returns_opposite_endpoint() {
        let m = mapping();
        let other = m.other_end("orders_db", "Orders").unwrap();
        assert_eq!(other.database_id, "crm_db");
        assert_eq!(other.column, "Id");
    }
}
