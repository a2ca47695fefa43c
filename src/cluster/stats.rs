//! Parser for the info text format
//!
//! Responses are `;`-separated blocks. A block is either a single
//! `key=value` pair or a `:`-separated record of pairs, e.g.
//!
//! ```text
//! ns=test:set=demo:objects=123:tombstones=0;ns=test:set=other:objects=7
//! ```
//!
//! Lookups are first-match-wins and never schema-validated: a missing field
//! is `None`, so older nodes with fewer fields still parse. Only a numeric
//! field that is present but malformed is an error.

use crate::common::{Error, Result};
use std::collections::HashMap;

fn blocks(response: &str) -> impl Iterator<Item = &str> {
    response
        .split(';')
        .map(str::trim)
        .filter(|block| !block.is_empty())
}

/// `key=value` pairs of one block; bare keys without `=` are skipped
fn pairs(block: &str) -> impl Iterator<Item = (&str, &str)> {
    block
        .split(':')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
}

/// Raw value of the first `field=` pair anywhere in the response
pub fn parse_field<'a>(response: &'a str, field: &str) -> Option<&'a str> {
    blocks(response)
        .flat_map(pairs)
        .find(|(key, _)| *key == field)
        .map(|(_, value)| value)
}

fn parse_number(field: &str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|_| Error::Parse {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Numeric value of `field`; present but malformed is an error
pub fn parse_u64(response: &str, field: &str) -> Result<Option<u64>> {
    parse_field(response, field)
        .map(|raw| parse_number(field, raw))
        .transpose()
}

/// First block whose pairs contain every `(key, value)` in `selector`
pub fn find_record<'a>(response: &'a str, selector: &[(&str, &str)]) -> Option<&'a str> {
    blocks(response).find(|block| {
        selector
            .iter()
            .all(|(key, value)| pairs(block).any(|(k, v)| k == *key && v == *value))
    })
}

/// Every block as a map of its pairs
pub fn records(response: &str) -> Vec<HashMap<&str, &str>> {
    blocks(response)
        .map(|block| {
            let mut map = HashMap::new();
            for (k, v) in pairs(block) {
                map.entry(k).or_insert(v);
            }
            map
        })
        .filter(|map| !map.is_empty())
        .collect()
}

/// Per-node view of one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceStats {
    /// Records this node owns as master
    pub master_objects: u64,
    pub replication_factor: u32,
}

impl NamespaceStats {
    /// Parse a `namespace/<ns>` response
    ///
    /// Older nodes report `replication-factor` here, newer ones only in the
    /// namespace config; absent means 1.
    pub fn parse(response: &str) -> Result<Self> {
        let master_objects = parse_u64(response, "master_objects")?.unwrap_or(0);
        let replication_factor = parse_replication_factor(response)?;
        Ok(Self {
            master_objects,
            replication_factor,
        })
    }
}

/// `replication-factor` of a `get-config:context=namespace` response, 1 when absent
pub fn parse_replication_factor(response: &str) -> Result<u32> {
    match parse_field(response, "replication-factor") {
        None => Ok(1),
        Some(raw) => raw.parse().map_err(|_| Error::Parse {
            field: "replication-factor".into(),
            value: raw.to_string(),
        }),
    }
}

/// Per-node view of one set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStats {
    pub namespace: String,
    pub set: String,
    /// Every replica of the set held by the node, not only masters
    pub objects: u64,
}

impl SetStats {
    /// Locate `ns=<namespace>:set=<set>` in a `sets` response
    ///
    /// A set the node does not know about counts as empty.
    pub fn parse(response: &str, namespace: &str, set: &str) -> Result<Self> {
        let objects = match find_record(response, &[("ns", namespace), ("set", set)]) {
            Some(record) => parse_u64(record, "objects")?.unwrap_or(0),
            None => 0,
        };
        Ok(Self {
            namespace: namespace.to_string(),
            set: set.to_string(),
            objects,
        })
    }

    /// Every set record of `namespace` in a `sets` response
    pub fn parse_all(response: &str, namespace: &str) -> Result<Vec<Self>> {
        let mut sets = Vec::new();
        for record in records(response) {
            if record.get("ns") != Some(&namespace) {
                continue;
            }
            let objects = match record.get("objects") {
                Some(raw) => parse_number("objects", raw)?,
                None => 0,
            };
            sets.push(Self {
                namespace: namespace.to_string(),
                set: record.get("set").copied().unwrap_or_default().to_string(),
                objects,
            });
        }
        Ok(sets)
    }
}
