use std::collections::{HashMap, HashSet};
use crate::{Namespace, TermGraph, TermKey, TermSet};

#[cfg(not(test))]
#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub struct GeneKey(usize);
#[cfg(test)]
#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub struct GeneKey(pub usize);

type GeneSet = HashSet<GeneKey>;

/// Unknown genes and terms look up as empty sets.
#[derive(Debug)]
pub struct PropagatedIndex {
    genes: Vec<String>,
    gene_index: HashMap<String, GeneKey>,
    terms: Vec<(String, Namespace)>,
    term_index: HashMap<String, TermKey>,
    direct_terms: Vec<TermSet>,
    gene_terms: Vec<TermSet>,
    direct_genes: Vec<GeneSet>,
    term_genes: Vec<GeneSet>,
}

impl PropagatedIndex {

    /// `direct_terms` and `gene_terms` are parallel to `genes`.
    pub(crate) fn new(
        graph: &TermGraph,
        genes: Vec<String>,
        direct_terms: Vec<TermSet>,
        gene_terms: Vec<TermSet>,
    ) -> PropagatedIndex {
        let terms: Vec<(String, Namespace)> = graph.iter_terms()
            .map(|(_, term)| (term.id().to_string(), term.namespace()))
            .collect();

        let gene_index = genes.iter().enumerate()
            .map(|(i, gene)| (gene.clone(), GeneKey(i)))
            .collect();

        // Transpose both gene->terms mappings into term->genes
        let mut direct_genes: Vec<GeneSet> = vec![GeneSet::new(); terms.len()];
        let mut term_genes: Vec<GeneSet> = vec![GeneSet::new(); terms.len()];
        for (i, (direct, closure)) in direct_terms.iter().zip(&gene_terms).enumerate() {
            for term in direct {
                direct_genes[term.0].insert(GeneKey(i));
            }
            for term in closure {
                term_genes[term.0].insert(GeneKey(i));
            }
        }

        PropagatedIndex {
            genes,
            gene_index,
            terms,
            term_index: graph.lookup_table(),
            direct_terms,
            gene_terms,
            direct_genes,
            term_genes,
        }
    }

    /// Every term the gene is annotated with, directly or through ancestry.
    pub fn terms_for_gene(&self, gene_id: &str) -> HashSet<&str> {
        self.gene_key(gene_id)
            .map(|gene| self.term_ids(&self.gene_terms[gene.0], None))
            .unwrap_or_default()
    }

    /// Like [`terms_for_gene`](Self::terms_for_gene), restricted to one namespace.
    pub fn terms_for_gene_in(&self, gene_id: &str, namespace: Namespace) -> HashSet<&str> {
        self.gene_key(gene_id)
            .map(|gene| self.term_ids(&self.gene_terms[gene.0], Some(namespace)))
            .unwrap_or_default()
    }

    /// Terms the gene was annotated with before propagation.
    pub fn direct_terms_for_gene(&self, gene_id: &str) -> HashSet<&str> {
        self.gene_key(gene_id)
            .map(|gene| self.term_ids(&self.direct_terms[gene.0], None))
            .unwrap_or_default()
    }

    /// Every gene annotated with the term or any of its descendants.
    pub fn genes_for_term(&self, term_id: &str) -> HashSet<&str> {
        self.gene_keys_for_term(term_id)
            .map(|genes| self.gene_ids(genes))
            .unwrap_or_default()
    }

    /// Genes annotated with exactly this term before propagation.
    pub fn direct_genes_for_term(&self, term_id: &str) -> HashSet<&str> {
        self.term_index.get(term_id)
            .map(|term| self.gene_ids(&self.direct_genes[term.0]))
            .unwrap_or_default()
    }

    /// The term-to-genes mapping for every term with at least one gene,
    /// optionally limited to a single namespace.
    pub fn reverse_mapping(&self, namespace: Option<Namespace>) -> HashMap<&str, HashSet<&str>> {
        self.terms.iter().zip(&self.term_genes)
            .filter(|((_, ns), genes)| !genes.is_empty() && namespace.map_or(true, |n| n == *ns))
            .map(|((id, _), genes)| (&**id, self.gene_ids(genes)))
            .collect()
    }

    /// `(gene, term, namespace, direct)` for every propagated membership.
    pub fn iter_memberships(&self) -> impl Iterator<Item=(&str, &str, Namespace, bool)> {
        self.genes.iter().enumerate().flat_map(move |(i, gene)| {
            let direct = &self.direct_terms[i];
            self.gene_terms[i].iter().map(move |term| {
                let (id, namespace) = &self.terms[term.0];
                (&**gene, &**id, *namespace, direct.contains(term))
            })
        })
    }

    pub fn genes(&self) -> impl Iterator<Item=&str> {
        self.genes.iter().map(|gene| &**gene)
    }

    pub fn contains_gene(&self, gene_id: &str) -> bool {
        self.gene_index.contains_key(gene_id)
    }

    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    /// Number of terms with at least one gene after propagation.
    pub fn annotated_term_count(&self) -> usize {
        self.term_genes.iter().filter(|genes| !genes.is_empty()).count()
    }

    pub fn term_namespace(&self, term_id: &str) -> Option<Namespace> {
        self.term_index.get(term_id).map(|term| self.terms[term.0].1)
    }

    pub(crate) fn gene_keys_for_term(&self, term_id: &str) -> Option<&GeneSet> {
        self.term_index.get(term_id).map(|term| &self.term_genes[term.0])
    }

    pub(crate) fn all_gene_keys(&self) -> GeneSet {
        (0..self.genes.len()).map(GeneKey).collect()
    }

    pub(crate) fn gene_ids(&self, genes: &GeneSet) -> HashSet<&str> {
        genes.iter().map(|gene| &*self.genes[gene.0]).collect()
    }

    fn gene_key(&self, gene_id: &str) -> Option<GeneKey> {
        self.gene_index.get(gene_id).copied()
    }

    fn term_ids(&self, terms: &TermSet, namespace: Option<Namespace>) -> HashSet<&str> {
        terms.iter()
            .map(|term| &self.terms[term.0])
            .filter(|(_, ns)| namespace.map_or(true, |n| n == *ns))
            .map(|(id, _)| &**id)
            .collect()
    }
}
