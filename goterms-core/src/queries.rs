use std::collections::HashSet;
use serde::{Deserialize, Serialize};

use crate::index::GeneKey;
use crate::PropagatedIndex;

#[derive(Debug)]
pub struct QueryResult<'a> {
    genes: HashSet<&'a str>,
}

impl<'a> QueryResult<'a> {
    pub fn genes(&self) -> &HashSet<&'a str> {
        &self.genes
    }

    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    pub fn into_genes(self) -> HashSet<&'a str> {
        self.genes
    }
}

/// Gene selections over a propagated index.
///
/// Term lookups are propagated, so `Term("GO:0008150")` selects every gene
/// annotated anywhere beneath that term.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Query {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "term")]
    Term(String),
    #[serde(rename = "union")]
    Union(Vec<String>),
    #[serde(rename = "intersection")]
    Intersection(Vec<String>),
}

impl Query {
    pub fn execute<'a>(&self, index: &'a PropagatedIndex) -> QueryResult<'a> {
        let keys = match self {
            Query::All => index.all_gene_keys(),
            Query::Term(term) => query_term(index, term),
            Query::Union(terms) => query_union(index, terms),
            Query::Intersection(terms) => query_intersection(index, terms),
        };
        QueryResult { genes: index.gene_ids(&keys) }
    }
}

fn query_term(index: &PropagatedIndex, term: &str) -> HashSet<GeneKey> {
    index.gene_keys_for_term(term).cloned().unwrap_or_default()
}

fn query_union(index: &PropagatedIndex, terms: &[String]) -> HashSet<GeneKey> {
    let mut union_genes = HashSet::new();
    for term in terms {
        if let Some(genes) = index.gene_keys_for_term(term) {
            union_genes.extend(genes.iter().copied());
        }
    }
    union_genes
}

/// An empty term list intersects to the empty set, not to every gene.
fn query_intersection(index: &PropagatedIndex, terms: &[String]) -> HashSet<GeneKey> {
    let mut sets = terms.iter().map(|term| index.gene_keys_for_term(term));
    let mut intersection = match sets.next() {
        Some(Some(first)) => first.clone(),
        _ => return HashSet::new(),
    };

    for genes in sets {
        match genes {
            Some(genes) => intersection.retain(|gene| genes.contains(gene)),
            None => return HashSet::new(),
        }
        if intersection.is_empty() {
            break;
        }
    }
    intersection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_term_graph, propagate, AnnotationTable, Namespace, TermRecord};

    fn index() -> PropagatedIndex {
        let graph = build_term_graph(vec![
            TermRecord::new("GO:0003674", "molecular_function", Namespace::MolecularFunction),
            TermRecord::new("GO:0003824", "catalytic activity", Namespace::MolecularFunction)
                .is_a("GO:0003674"),
            TermRecord::new("GO:0005488", "binding", Namespace::MolecularFunction)
                .is_a("GO:0003674"),
        ]).unwrap();

        let mut table = AnnotationTable::new();
        table.add_annotation("AT1G74030", "GO:0003824", "IDA", "taxon:3702", None);
        table.add_annotation("AT1G74030", "GO:0005488", "IDA", "taxon:3702", None);
        table.add_annotation("AT1G74040", "GO:0005488", "IEA", "taxon:3702", None);
        table.add_annotation("AT2G29560", "GO:0003824", "IEA", "taxon:3702", None);
        propagate(&graph, &table).unwrap()
    }

    fn sorted(result: QueryResult) -> Vec<&str> {
        let mut genes: Vec<&str> = result.into_genes().into_iter().collect();
        genes.sort();
        genes
    }

    #[test]
    fn test_query_all() {
        let index = index();
        assert_eq!(Query::All.execute(&index).gene_count(), 3);
    }

    #[test]
    fn test_query_term_is_propagated() {
        let index = index();
        let result = Query::Term("GO:0003674".to_string()).execute(&index);
        assert_eq!(sorted(result), vec!["AT1G74030", "AT1G74040", "AT2G29560"]);
    }

    #[test]
    fn test_query_union() {
        let index = index();
        let query = Query::Union(vec!["GO:0005488".to_string(), "GO:9999999".to_string()]);
        assert_eq!(sorted(query.execute(&index)), vec!["AT1G74030", "AT1G74040"]);
    }

    #[test]
    fn test_query_intersection() {
        let index = index();
        let query = Query::Intersection(vec!["GO:0005488".to_string(), "GO:0003824".to_string()]);
        assert_eq!(sorted(query.execute(&index)), vec!["AT1G74030"]);

        let with_unknown = Query::Intersection(vec!["GO:0005488".to_string(), "GO:9999999".to_string()]);
        assert!(with_unknown.execute(&index).genes().is_empty());
        assert!(Query::Intersection(Vec::new()).execute(&index).genes().is_empty());
    }
}
