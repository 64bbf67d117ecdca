use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub gene_id: String,
    pub term_id: String,
    pub evidence_code: String,
    pub species: String,
    pub qualifier: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl AnnotationRecord {
    pub fn new(
        gene_id: &str,
        term_id: &str,
        evidence_code: &str,
        species: &str,
        qualifier: Option<&str>,
    ) -> AnnotationRecord {
        AnnotationRecord {
            gene_id: gene_id.to_string(),
            term_id: term_id.to_string(),
            evidence_code: evidence_code.to_string(),
            species: species.to_string(),
            qualifier: qualifier.map(str::to_string),
            references: Vec::new(),
        }
    }

    pub fn with_references<I, S>(mut self, references: I) -> AnnotationRecord
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    /// Individual qualifiers, which GAF 2.x joins with `|` (e.g. `NOT|enables`).
    pub fn qualifiers(&self) -> impl Iterator<Item=&str> {
        self.qualifier.iter()
            .flat_map(|qualifier| qualifier.split('|'))
            .map(str::trim)
            .filter(|qualifier| !qualifier.is_empty())
    }

    /// The organism of the gene product. In `taxon:1280|taxon:9606` the
    /// second taxon is only the interacting organism.
    pub fn primary_species(&self) -> &str {
        self.species.split('|').next().unwrap_or_default().trim()
    }
}

/// An empty allow-set admits everything. `evidence_exclude` only applies
/// when `evidence_allow` is empty.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationFilter {
    pub evidence_allow: HashSet<String>,
    pub evidence_exclude: HashSet<String>,
    pub species_allow: HashSet<String>,
    pub exclude_qualifiers: HashSet<String>,
    /// Only checked against records citing exactly one reference.
    pub exclude_references: HashSet<String>,
    pub gene_allow: Option<HashSet<String>>,
    /// Match `gene_allow` case-insensitively. Kept records take the
    /// allow-list's spelling of the gene.
    pub ignore_case: bool,
}

impl Default for AnnotationFilter {
    fn default() -> Self {
        AnnotationFilter {
            evidence_allow: HashSet::new(),
            evidence_exclude: HashSet::new(),
            species_allow: HashSet::new(),
            exclude_qualifiers: std::iter::once("NOT".to_string()).collect(),
            exclude_references: HashSet::new(),
            gene_allow: None,
            ignore_case: false,
        }
    }
}

impl AnnotationFilter {
    pub fn new() -> AnnotationFilter {
        AnnotationFilter::default()
    }

    pub fn with_evidence<I, S>(mut self, codes: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.evidence_allow.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn excluding_evidence<I, S>(mut self, codes: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.evidence_exclude.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn with_species<I, S>(mut self, species: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.species_allow.extend(species.into_iter().map(Into::into));
        self
    }

    /// Replaces the excluded qualifiers. Passing nothing keeps negated records.
    pub fn excluding_qualifiers<I, S>(mut self, qualifiers: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.exclude_qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_references<I, S>(mut self, references: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.exclude_references.extend(references.into_iter().map(Into::into));
        self
    }

    pub fn with_genes<I, S>(mut self, genes: I) -> Self
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.gene_allow = Some(genes.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignoring_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn accepts(&self, record: &AnnotationRecord) -> bool {
        self.accepts_fields(record)
            && GeneMatcher::new(self.gene_allow.as_ref(), self.ignore_case)
                .resolve(&record.gene_id)
                .is_some()
    }

    fn accepts_fields(&self, record: &AnnotationRecord) -> bool {
        self.accepts_evidence(&record.evidence_code)
            && self.accepts_species(record)
            && self.accepts_qualifiers(record)
            && self.accepts_references(record)
    }

    fn accepts_evidence(&self, code: &str) -> bool {
        if !self.evidence_allow.is_empty() {
            return self.evidence_allow.contains(code);
        }
        !self.evidence_exclude.contains(code)
    }

    fn accepts_species(&self, record: &AnnotationRecord) -> bool {
        self.species_allow.is_empty()
            || self.species_allow.contains(record.primary_species())
    }

    fn accepts_qualifiers(&self, record: &AnnotationRecord) -> bool {
        !record.qualifiers().any(|qualifier| {
            self.exclude_qualifiers.iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(qualifier))
        })
    }

    fn accepts_references(&self, record: &AnnotationRecord) -> bool {
        match record.references.as_slice() {
            [reference] => !self.exclude_references.contains(reference),
            _ => true,
        }
    }
}

/// Resolves a record's gene against an optional gene list, returning the
/// spelling the kept record should carry.
enum GeneMatcher<'a> {
    Any,
    Exact(&'a HashSet<String>),
    Folded(HashMap<String, &'a str>),
}

impl<'a> GeneMatcher<'a> {
    fn new(genes: Option<&'a HashSet<String>>, ignore_case: bool) -> GeneMatcher<'a> {
        match genes {
            None => GeneMatcher::Any,
            Some(genes) if !ignore_case => GeneMatcher::Exact(genes),
            Some(genes) => GeneMatcher::Folded(
                genes.iter().map(|gene| (gene.to_uppercase(), gene.as_str())).collect()
            ),
        }
    }

    fn resolve<'s>(&'s self, gene: &'s str) -> Option<&'s str> {
        match self {
            GeneMatcher::Any => Some(gene),
            GeneMatcher::Exact(genes) => genes.get(gene).map(String::as_str),
            GeneMatcher::Folded(genes) => genes.get(&gene.to_uppercase()).copied(),
        }
    }
}

/// Records in load order. Term ids are only resolved at propagation.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AnnotationTable {
    records: Vec<AnnotationRecord>,
}

impl AnnotationTable {
    pub fn new() -> AnnotationTable {
        AnnotationTable::default()
    }

    pub fn add_annotation(
        &mut self,
        gene_id: &str,
        term_id: &str,
        evidence_code: &str,
        species: &str,
        qualifier: Option<&str>,
    ) {
        self.records.push(AnnotationRecord::new(gene_id, term_id, evidence_code, species, qualifier));
    }

    pub fn push(&mut self, record: AnnotationRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item=&AnnotationRecord> {
        self.records.iter()
    }

    pub fn genes(&self) -> HashSet<&str> {
        self.records.iter().map(|record| &*record.gene_id).collect()
    }

    pub fn contains_gene(&self, gene_id: &str) -> bool {
        self.records.iter().any(|record| record.gene_id == gene_id)
    }

    pub fn filter(&self, filter: &AnnotationFilter) -> AnnotationTable {
        let genes = GeneMatcher::new(filter.gene_allow.as_ref(), filter.ignore_case);
        let records: Vec<AnnotationRecord> = self.records.iter()
            .filter(|record| filter.accepts_fields(record))
            .filter_map(|record| keep_as(record, &genes))
            .collect();
        debug!(kept = records.len(), dropped = self.records.len() - records.len(), "filtered annotations");
        AnnotationTable { records }
    }

    /// Keeps only records for the given genes. Unknown genes are not an error.
    pub fn restrict_to_genes(&self, genes: &HashSet<String>) -> AnnotationTable {
        self.restrict(GeneMatcher::new(Some(genes), false))
    }

    /// Like [`restrict_to_genes`](Self::restrict_to_genes), comparing genes
    /// case-insensitively and renaming kept records to the list's spelling.
    pub fn restrict_to_genes_ignoring_case(&self, genes: &HashSet<String>) -> AnnotationTable {
        self.restrict(GeneMatcher::new(Some(genes), true))
    }

    fn restrict(&self, genes: GeneMatcher) -> AnnotationTable {
        let records = self.records.iter()
            .filter_map(|record| keep_as(record, &genes))
            .collect();
        AnnotationTable { records }
    }
}

fn keep_as(record: &AnnotationRecord, genes: &GeneMatcher) -> Option<AnnotationRecord> {
    let gene = genes.resolve(&record.gene_id)?;
    let mut kept = record.clone();
    if gene != kept.gene_id {
        kept.gene_id = gene.to_string();
    }
    Some(kept)
}

impl std::iter::FromIterator<AnnotationRecord> for AnnotationTable {
    fn from_iter<I: IntoIterator<Item=AnnotationRecord>>(iter: I) -> Self {
        AnnotationTable { records: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a AnnotationTable {
    type Item = &'a AnnotationRecord;
    type IntoIter = std::slice::Iter<'a, AnnotationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

pub fn load_annotations<I>(records: I) -> AnnotationTable
    where I: IntoIterator<Item=AnnotationRecord>
{
    records.into_iter().collect()
}
