//! Testing utilities and fixtures for Quarry.
//!
//! These schemas mirror the situations exercised by the optimizer tests:
//! nullable unique constraints, non-null primary keys and foreign keys.

use crate::metadata::{InMemoryMetadata, RelationDefinition};
use crate::types::DbType;

fn nullable_uc_table(name: &str, uc: &str) -> RelationDefinition {
    RelationDefinition::builder(name)
        .attribute("col1", DbType::BigInt, true)
        .attribute("col2", DbType::BigInt, true)
        .attribute("col3", DbType::BigInt, true)
        .unique_constraint(uc, &[0])
        .build()
        .expect("fixture relation is well formed")
}

/// `TABLE1(col1, col2, col3)` and `TABLE2(col1, col2, col3)`: all columns
/// nullable, unique constraint on `col1`.
pub fn nullable_unique_metadata() -> InMemoryMetadata {
    metadata_of([
        nullable_uc_table("TABLE1", "uc1"),
        nullable_uc_table("TABLE2", "uc2"),
    ])
}

fn keyed_relation() -> RelationDefinition {
    RelationDefinition::builder("R")
        .attribute("k", DbType::BigInt, false)
        .attribute("a", DbType::BigInt, true)
        .attribute("b", DbType::BigInt, true)
        .primary_key("pk_r", &[0])
        .build()
        .expect("fixture relation is well formed")
}

fn person_and_address() -> [RelationDefinition; 2] {
    let person = RelationDefinition::builder("PERSON")
        .attribute("id", DbType::BigInt, false)
        .attribute("name", DbType::Varchar, true)
        .primary_key("pk_person", &[0])
        .build()
        .expect("fixture relation is well formed");
    let address = RelationDefinition::builder("ADDRESS")
        .attribute("id", DbType::BigInt, false)
        .attribute("person", DbType::BigInt, false)
        .attribute("city", DbType::Varchar, true)
        .primary_key("pk_address", &[0])
        .foreign_key("fk_address_person", "PERSON", &[(1, 0)])
        .build()
        .expect("fixture relation is well formed");
    [person, address]
}

fn metadata_of(relations: impl IntoIterator<Item = RelationDefinition>) -> InMemoryMetadata {
    relations
        .into_iter()
        .try_fold(InMemoryMetadata::new(), InMemoryMetadata::with_relation)
        .expect("fixture metadata is well formed")
}

/// `R(k, a, b)` with primary key `k`.
pub fn keyed_relation_metadata() -> InMemoryMetadata {
    metadata_of([keyed_relation()])
}

/// `PERSON(id, name)` with primary key `id` and
/// `ADDRESS(id, person, city)` whose non-null `person` references `PERSON`.
pub fn foreign_key_metadata() -> InMemoryMetadata {
    metadata_of(person_and_address())
}

/// Every fixture relation at once: `TABLE1`, `TABLE2`, `R`, `PERSON` and
/// `ADDRESS`.
pub fn mixed_constraint_metadata() -> InMemoryMetadata {
    let [person, address] = person_and_address();
    metadata_of([
        nullable_uc_table("TABLE1", "uc1"),
        nullable_uc_table("TABLE2", "uc2"),
        keyed_relation(),
        person,
        address,
    ])
}
