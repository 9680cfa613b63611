//! Records taking part in a search, the base one and every joined child

use crate::error::MapperError;
use crate::records::Record;
use crate::storage::query_builder::Join;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Graph};
use std::collections::HashMap;

/// Record reachable under a store key
#[derive(Debug, Clone)]
pub(crate) struct RecordInJoin {
    pub record: Record,
    /// Name of the table inside the query
    pub store_key: String,
    /// Store key of the parent, `None` for the base record
    pub parent: Option<String>,
    /// Foreign key name on the parent, the array entry children go into
    pub known_as: String,
}

#[derive(Debug, Clone)]
pub(crate) struct JoinLookup {
    records: Vec<RecordInJoin>,
}

impl JoinLookup {
    pub fn new(base: &Record) -> Result<Self, MapperError> {
        let alias = base.mapper()?.alias().to_string();
        Ok(Self {
            records: vec![RecordInJoin {
                record: base.blank(),
                store_key: alias.clone(),
                parent: None,
                known_as: alias,
            }],
        })
    }

    pub fn base(&self) -> &RecordInJoin {
        &self.records[0]
    }

    pub fn get(&self, store_key: &str) -> Option<&RecordInJoin> {
        self.records.iter().find(|known| known.store_key == store_key)
    }

    /// Record under the store key, created from a foreign key named
    /// `known_as` (or the store key itself) of an already known record.
    /// With `parent` set only the record under that store key is asked.
    pub fn lookup(
        &mut self,
        store_key: &str,
        known_as: &str,
        parent: Option<&str>,
    ) -> Result<Option<&RecordInJoin>, MapperError> {
        if let Some(index) = self.position(store_key) {
            return Ok(Some(&self.records[index]));
        }

        let foreign_key_name = if known_as.is_empty() { store_key } else { known_as };
        let mut found = None;
        let candidates = self
            .records
            .iter()
            .filter(|known| parent.is_none_or(|parent| known.store_key == parent));
        for known in candidates {
            let mapper = known.record.mapper()?;
            if let Some(foreign_key) = mapper.map().foreign_key(foreign_key_name) {
                let record = foreign_key.remote_record()?;
                record.mapper()?;
                found = Some(RecordInJoin {
                    record,
                    store_key: store_key.to_string(),
                    parent: Some(known.store_key.clone()),
                    known_as: foreign_key_name.to_string(),
                });
                break;
            }
        }

        match found {
            Some(record) => {
                self.records.push(record);
                Ok(self.records.last())
            }
            None => Ok(None),
        }
    }

    fn position(&self, store_key: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|known| known.store_key == store_key)
    }

    /// Base record followed by the joined ones, parents always before children
    pub fn in_join_order(&self, joins: &[Join]) -> Result<Vec<&RecordInJoin>, MapperError> {
        let base = self.base();
        let mut graph = Graph::<&str, (), Directed>::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        nodes.insert(base.store_key.as_str(), graph.add_node(base.store_key.as_str()));

        for join in joins {
            let parent = *nodes
                .entry(join.known_table.as_str())
                .or_insert_with(|| graph.add_node(join.known_table.as_str()));
            let child = *nodes
                .entry(join.table_reference())
                .or_insert_with(|| graph.add_node(join.table_reference()));
            graph.add_edge(parent, child, ());
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            MapperError::Join(format!(
                "Joins make a cycle through *{}*",
                graph[cycle.node_id()]
            ))
        })?;
        sorted
            .into_iter()
            .map(|node| {
                let store_key = graph[node];
                self.get(store_key).ok_or_else(|| {
                    MapperError::Join(format!("Unknown record for alias *{}*", store_key))
                })
            })
            .collect()
    }
}
