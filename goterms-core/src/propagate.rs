use std::collections::HashMap;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{AnnotationTable, GoError, PropagatedIndex, Result, TermGraph, TermSet};

/// Expands each gene's direct terms to their full ancestor closure.
#[derive(Debug, Copy, Clone)]
pub struct Propagator<'g> {
    graph: &'g TermGraph,
    parallel: bool,
}

impl<'g> Propagator<'g> {
    pub fn new(graph: &'g TermGraph) -> Propagator<'g> {
        Propagator { graph, parallel: true }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fails on the first record whose term is not in the graph.
    pub fn run(&self, table: &AnnotationTable) -> Result<PropagatedIndex> {
        let (genes, direct) = self.resolve(table)?;
        debug!(genes = genes.len(), records = table.len(), "resolved direct annotations");

        let closures: Vec<TermSet> = if self.parallel {
            direct.par_iter().map(|terms| self.close(terms)).collect()
        } else {
            direct.iter().map(|terms| self.close(terms)).collect()
        };

        let index = PropagatedIndex::new(self.graph, genes, direct, closures);
        info!(
            genes = index.gene_count(),
            terms = index.annotated_term_count(),
            "propagated annotations"
        );
        Ok(index)
    }

    /// Groups records by gene (in first-seen order) and resolves term ids to keys.
    fn resolve(&self, table: &AnnotationTable) -> Result<(Vec<String>, Vec<TermSet>)> {
        let mut genes: Vec<String> = Vec::new();
        let mut direct: Vec<TermSet> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for record in table {
            let term = self.graph.key_of(&record.term_id)
                .ok_or_else(|| GoError::Propagation {
                    gene: record.gene_id.clone(),
                    term: record.term_id.clone(),
                })?;

            let position = *positions.entry(record.gene_id.as_str()).or_insert_with(|| {
                genes.push(record.gene_id.clone());
                direct.push(TermSet::new());
                genes.len() - 1
            });
            direct[position].insert(term);
        }

        Ok((genes, direct))
    }

    fn close(&self, direct: &TermSet) -> TermSet {
        let mut closure = direct.clone();
        for term in direct {
            closure.extend(self.graph.ancestor_keys(*term).iter().copied());
        }
        closure
    }
}

pub fn propagate(graph: &TermGraph, table: &AnnotationTable) -> Result<PropagatedIndex> {
    Propagator::new(graph).run(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::{build_term_graph, AnnotationFilter, Namespace, TermRecord};

    lazy_static! {
        static ref CHAIN: TermGraph = build_term_graph(vec![
            TermRecord::new("T1", "root", Namespace::BiologicalProcess),
            TermRecord::new("T2", "child", Namespace::BiologicalProcess).is_a("T1"),
            TermRecord::new("T3", "grandchild", Namespace::BiologicalProcess).is_a("T2"),
        ]).unwrap();

        // Two roots, a diamond and a part_of shortcut
        static ref DAG: TermGraph = build_term_graph(vec![
            TermRecord::new("GO:0008150", "biological_process", Namespace::BiologicalProcess),
            TermRecord::new("GO:0005575", "cellular_component", Namespace::CellularComponent),
            TermRecord::new("GO:0009987", "cellular process", Namespace::BiologicalProcess)
                .is_a("GO:0008150"),
            TermRecord::new("GO:0008152", "metabolic process", Namespace::BiologicalProcess)
                .is_a("GO:0008150"),
            TermRecord::new("GO:0044237", "cellular metabolic process", Namespace::BiologicalProcess)
                .is_a("GO:0009987").is_a("GO:0008152"),
            TermRecord::new("GO:0005622", "intracellular", Namespace::CellularComponent)
                .is_a("GO:0005575"),
            TermRecord::new("GO:0005634", "nucleus", Namespace::CellularComponent)
                .is_a("GO:0005575").part_of("GO:0005622"),
        ]).unwrap();
    }

    fn set(ids: &[&'static str]) -> HashSet<&'static str> {
        ids.iter().copied().collect()
    }

    fn dag_table() -> AnnotationTable {
        let mut table = AnnotationTable::new();
        table.add_annotation("MYC", "GO:0044237", "IDA", "taxon:9606", None);
        table.add_annotation("MYC", "GO:0005634", "IEA", "taxon:9606", None);
        table.add_annotation("TP53", "GO:0009987", "IEA", "taxon:9606", None);
        table.add_annotation("TP53", "GO:0005622", "TAS", "taxon:9606", None);
        table.add_annotation("Trp53", "GO:0008152", "IEA", "taxon:10090", None);
        table.add_annotation("BRCA1", "GO:0005634", "IMP", "taxon:9606", Some("NOT"));
        table
    }

    #[test]
    fn test_chain_scenario() {
        let mut table = AnnotationTable::new();
        table.add_annotation("geneA", "T3", "EXP", "human", None);
        let index = propagate(&CHAIN, &table).unwrap();

        assert_eq!(index.terms_for_gene("geneA"), set(&["T1", "T2", "T3"]));
        assert_eq!(index.genes_for_term("T1"), set(&["geneA"]));
        assert_eq!(index.genes_for_term("T3"), set(&["geneA"]));
    }

    #[test]
    fn test_negated_annotation_is_filtered_out() {
        let mut table = AnnotationTable::new();
        table.add_annotation("geneB", "T3", "EXP", "human", Some("NOT"));
        let filtered = table.filter(&AnnotationFilter::default());
        let index = propagate(&CHAIN, &filtered).unwrap();

        assert!(index.terms_for_gene("geneB").is_empty());
        assert!(index.genes_for_term("T3").is_empty());
    }

    #[test]
    fn test_dangling_term_fails() {
        let mut table = AnnotationTable::new();
        table.add_annotation("geneA", "T3", "EXP", "human", None);
        table.add_annotation("geneX", "T9", "EXP", "human", None);
        table.add_annotation("geneY", "T8", "EXP", "human", None);

        match propagate(&CHAIN, &table) {
            Err(GoError::Propagation { gene, term }) => {
                assert_eq!(gene, "geneX");
                assert_eq!(term, "T9");
            }
            other => panic!("expected propagation error, got {:?}", other),
        }
    }

    #[test]
    fn test_monotone_and_inverted() {
        let table = dag_table();
        let index = propagate(&DAG, &table).unwrap();

        for gene in index.genes() {
            let terms = index.terms_for_gene(gene);
            for term in &terms {
                for ancestor in DAG.ancestors_of(term).unwrap() {
                    assert!(terms.contains(ancestor), "{} misses ancestor {} of {}", gene, ancestor, term);
                }
            }
        }

        for (_, term) in DAG.iter_terms() {
            let term = term.id();
            let genes = index.genes_for_term(term);
            for gene in index.genes() {
                assert_eq!(index.terms_for_gene(gene).contains(term), genes.contains(gene));
            }
        }
    }

    #[test]
    fn test_diamond_and_part_of() {
        let filtered = dag_table().filter(&AnnotationFilter::default());
        let index = propagate(&DAG, &filtered).unwrap();
        assert_eq!(
            index.terms_for_gene("MYC"),
            set(&[
                "GO:0044237", "GO:0009987", "GO:0008152", "GO:0008150",
                "GO:0005634", "GO:0005622", "GO:0005575",
            ])
        );
        assert_eq!(index.genes_for_term("GO:0005622"), set(&["MYC", "TP53"]));
    }

    #[test]
    fn test_filter_exclusivity() {
        let filtered = dag_table().filter(&AnnotationFilter::new().with_evidence(vec!["IEA"]));
        let index = propagate(&DAG, &filtered).unwrap();

        // Only IEA records survive: MYC's IDA term and TP53's TAS term are gone
        assert!(!index.terms_for_gene("MYC").contains("GO:0044237"));
        assert_eq!(index.terms_for_gene("MYC"), set(&["GO:0005634", "GO:0005622", "GO:0005575"]));
        assert!(!index.terms_for_gene("TP53").contains("GO:0005622"));
        assert!(!index.contains_gene("BRCA1"));
    }

    #[test]
    fn test_species_filter() {
        let filtered = dag_table().filter(&AnnotationFilter::new().with_species(vec!["taxon:10090"]));
        let index = propagate(&DAG, &filtered).unwrap();
        assert_eq!(index.genes().collect::<Vec<_>>(), vec!["Trp53"]);
        assert_eq!(index.terms_for_gene("Trp53"), set(&["GO:0008152", "GO:0008150"]));
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let table = dag_table();
        let parallel = Propagator::new(&DAG).run(&table).unwrap();
        let sequential = Propagator::new(&DAG).parallel(false).run(&table).unwrap();

        for gene in parallel.genes() {
            assert_eq!(parallel.terms_for_gene(gene), sequential.terms_for_gene(gene));
        }
        assert_eq!(parallel.reverse_mapping(None), sequential.reverse_mapping(None));
    }

    #[test]
    fn test_empty_table() {
        let index = propagate(&CHAIN, &AnnotationTable::new()).unwrap();
        assert_eq!(index.gene_count(), 0);
        assert!(index.genes_for_term("T1").is_empty());
    }
}
