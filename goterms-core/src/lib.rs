#[cfg(test)]
#[macro_use]
extern crate lazy_static;

use std::convert::TryFrom;
use std::fmt;
use serde::{Deserialize, Serialize};

mod error;
mod cache;
mod graph;
mod annotation;
mod propagate;
mod index;
mod queries;
mod ingest;
mod export;
pub mod evidence;

pub use error::{GoError, Result};
pub use cache::{Memo, SlotCache};
pub use graph::{build_term_graph, Relation, Term, TermGraph, TermGraphBuilder, TermKey, TermRecord, TermSet};
pub use annotation::{load_annotations, AnnotationFilter, AnnotationRecord, AnnotationTable};
pub use propagate::{propagate, Propagator};
pub use index::{GeneKey, PropagatedIndex};
pub use queries::{Query, QueryResult};
pub use ingest::{parse_gaf, parse_obo, read_gene_list, GafOptions, GeneColumn, MetadataReader};
pub use export::{GeneTermRow, TermSummaryRow, TsvExporter};

/// The three top-level GO categories a term belongs to.
#[derive(Debug, Hash, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Namespace {
    #[serde(rename = "biological_process")]
    BiologicalProcess,
    #[serde(rename = "molecular_function")]
    MolecularFunction,
    #[serde(rename = "cellular_component")]
    CellularComponent,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::BiologicalProcess => "biological_process",
            Namespace::MolecularFunction => "molecular_function",
            Namespace::CellularComponent => "cellular_component",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            Namespace::BiologicalProcess => "BP",
            Namespace::MolecularFunction => "MF",
            Namespace::CellularComponent => "CC",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts OBO namespace names as well as GAF aspect letters.
impl TryFrom<&str> for Namespace {
    type Error = GoError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        let namespace = match value {
            "biological_process" | "P" | "BP" => Namespace::BiologicalProcess,
            "molecular_function" | "F" | "MF" => Namespace::MolecularFunction,
            "cellular_component" | "C" | "CC" => Namespace::CellularComponent,
            _ => return Err(GoError::InvalidNamespace(value.to_string())),
        };
        Ok(namespace)
    }
}

/// The relation kinds treated as ancestry edges.
#[derive(Debug, Hash, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum RelationKind {
    #[serde(rename = "is_a")]
    IsA,
    #[serde(rename = "part_of")]
    PartOf,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::IsA => "is_a",
            RelationKind::PartOf => "part_of",
        }
    }
}

impl TryFrom<&str> for RelationKind {
    type Error = GoError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "is_a" => Ok(RelationKind::IsA),
            "part_of" => Ok(RelationKind::PartOf),
            _ => Err(GoError::InvalidRelation(value.to_string())),
        }
    }
}
