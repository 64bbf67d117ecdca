use std::collections::HashSet;
use std::convert::TryFrom;
use std::io::{BufRead, Cursor, Error, Read};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AnnotationRecord, GoError, Namespace, RelationKind, Result, TermRecord};

pub struct MetadataReader<B> {
    reader: B,
    metadata: String,
    metadata_finished: bool,
    buffer: Cursor<String>,
}

impl<B: BufRead> MetadataReader<B> {
    pub fn new(reader: B) -> MetadataReader<B> {
        MetadataReader {
            reader,
            metadata: String::new(),
            metadata_finished: false,
            buffer: Cursor::new(String::new()),
        }
    }

    pub fn metadata(&self) -> Option<&str> {
        if !self.metadata_finished { return None; }
        Some(&self.metadata)
    }
}

impl<B: BufRead> Read for MetadataReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, Error> {
        let len = self.buffer.read(buf)?;
        if len != 0 { return Ok(len); }

        if self.metadata_finished {
            return self.reader.read(buf);
        }

        loop {
            self.buffer.get_mut().clear();
            self.buffer.set_position(0);

            let len = self.reader.read_line(self.buffer.get_mut())?;
            if len == 0 {
                self.metadata_finished = true;
                return Ok(0);
            }

            let (blank, comment) = {
                let line = self.buffer.get_ref().trim_start();
                (line.is_empty(), line.starts_with('!'))
            };
            if blank {
                self.metadata.push('\n');
            } else if comment {
                self.metadata.push_str(self.buffer.get_ref());
            } else {
                // First data line: hand it out from the buffer, then stream
                self.metadata_finished = true;
                return self.buffer.read(buf);
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneColumn {
    /// Column 3, `DB Object Symbol`
    Symbol,
    /// Column 2, `DB Object ID`
    ObjectId,
}

impl Default for GeneColumn {
    fn default() -> Self {
        GeneColumn::Symbol
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GafOptions {
    pub gene_column: GeneColumn,
    /// Keep only rows from this source database (column 1), e.g. `UniProtKB`.
    pub db: Option<String>,
    /// Drop a trailing `_SPECIES` suffix from gene ids, so `P53_HUMAN` reads as `P53`.
    pub strip_species: bool,
}

const GAF_DB: usize = 0;
const GAF_OBJECT_ID: usize = 1;
const GAF_SYMBOL: usize = 2;
const GAF_QUALIFIER: usize = 3;
const GAF_TERM: usize = 4;
const GAF_REFERENCE: usize = 5;
const GAF_EVIDENCE: usize = 6;
const GAF_TAXON: usize = 12;

/// Qualifiers are kept verbatim; `NOT` rows are dropped by the filter stage.
pub fn parse_gaf<R: Read>(reader: R, options: &GafOptions) -> Result<Vec<AnnotationRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .comment(Some(b'!'))
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut row = csv::StringRecord::new();
    while csv_reader.read_record(&mut row)? {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        if row.len() <= GAF_TAXON {
            return Err(GoError::Gaf {
                line,
                message: format!("expected at least {} columns, found {}", GAF_TAXON + 1, row.len()),
            });
        }

        let field = |i: usize| row.get(i).map(str::trim).unwrap_or_default();
        if let Some(db) = &options.db {
            if field(GAF_DB) != db.as_str() {
                skipped += 1;
                continue;
            }
        }

        let gene = match options.gene_column {
            GeneColumn::Symbol => field(GAF_SYMBOL),
            GeneColumn::ObjectId => field(GAF_OBJECT_ID),
        };
        if gene.is_empty() {
            return Err(GoError::Gaf { line, message: "missing gene identifier".to_string() });
        }
        let gene = if options.strip_species { strip_species(gene) } else { gene };
        let term = field(GAF_TERM);
        if term.is_empty() {
            return Err(GoError::Gaf { line, message: "missing GO id".to_string() });
        }

        let qualifier = Some(field(GAF_QUALIFIER)).filter(|q| !q.is_empty());
        let references = field(GAF_REFERENCE).split('|').filter(|r| !r.is_empty());
        records.push(AnnotationRecord::new(
            gene,
            term,
            field(GAF_EVIDENCE),
            field(GAF_TAXON),
            qualifier,
        ).with_references(references));
    }

    debug!(records = records.len(), skipped, "parsed annotation rows");
    Ok(records)
}

fn strip_species(gene: &str) -> &str {
    match gene.rfind('_') {
        Some(i) => &gene[..i],
        None => gene,
    }
}

/// Reads a gene universe: the first tab-separated column of every line.
/// Lines starting with `#` are comments.
pub fn read_gene_list<R: Read>(reader: R) -> Result<HashSet<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut genes = HashSet::new();
    let mut row = csv::StringRecord::new();
    while csv_reader.read_record(&mut row)? {
        if let Some(gene) = row.get(0).map(str::trim).filter(|gene| !gene.is_empty()) {
            genes.insert(gene.to_string());
        }
    }
    Ok(genes)
}

/// A `[Term]` stanza being accumulated line by line.
#[derive(Default)]
struct TermStanza {
    line: usize,
    id: Option<String>,
    name: Option<String>,
    namespace: Option<Namespace>,
    relations: Vec<(RelationKind, String)>,
    alt_ids: Vec<String>,
    synonyms: Vec<String>,
    obsolete: bool,
}

impl TermStanza {
    fn starting_at(line: usize) -> TermStanza {
        TermStanza { line, ..TermStanza::default() }
    }

    fn finish(self) -> Result<TermRecord> {
        let line = self.line;
        let missing = |tag: &str| GoError::Obo { line, message: format!("term stanza has no {}", tag) };

        Ok(TermRecord {
            id: self.id.ok_or_else(|| missing("id"))?,
            name: self.name.ok_or_else(|| missing("name"))?,
            namespace: self.namespace.ok_or_else(|| missing("namespace"))?,
            relations: self.relations,
            alt_ids: self.alt_ids,
            synonyms: self.synonyms,
            obsolete: self.obsolete,
        })
    }
}

/// Keeps `is_a` and `part_of` edges and EXACT synonyms of `[Term]` stanzas.
pub fn parse_obo<R: BufRead>(reader: R) -> Result<Vec<TermRecord>> {
    let mut records = Vec::new();
    let mut stanza: Option<TermStanza> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let number = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(done) = stanza.take() {
                records.push(done.finish()?);
            }
            if line == "[Term]" {
                stanza = Some(TermStanza::starting_at(number));
            }
            continue;
        }

        // Header tags and non-term stanzas
        let stanza = match stanza.as_mut() {
            Some(stanza) => stanza,
            None => continue,
        };

        let (tag, value) = split_tag(line).ok_or_else(|| GoError::Obo {
            line: number,
            message: format!("expected `tag: value`, found {:?}", line),
        })?;

        match tag {
            "id" => stanza.id = Some(first_token(value, number)?),
            "name" => stanza.name = Some(value.to_string()),
            "namespace" => {
                let namespace = Namespace::try_from(value)
                    .map_err(|e| GoError::Obo { line: number, message: e.to_string() })?;
                stanza.namespace = Some(namespace);
            }
            "alt_id" => stanza.alt_ids.push(first_token(value, number)?),
            "is_a" => stanza.relations.push((RelationKind::IsA, first_token(value, number)?)),
            "relationship" => {
                let mut parts = value.split_whitespace();
                if let (Some(kind), Some(target)) = (parts.next(), parts.next()) {
                    if let Ok(kind @ RelationKind::PartOf) = RelationKind::try_from(kind) {
                        stanza.relations.push((kind, target.to_string()));
                    }
                }
            }
            "synonym" => {
                if let Some(synonym) = exact_synonym(value) {
                    stanza.synonyms.push(synonym);
                }
            }
            "is_obsolete" => stanza.obsolete = value == "true",
            _ => {}
        }
    }

    if let Some(done) = stanza.take() {
        records.push(done.finish()?);
    }

    debug!(terms = records.len(), "parsed ontology");
    Ok(records)
}

fn split_tag(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    Some((line[..colon].trim(), line[colon + 1..].trim()))
}

/// The id at the start of a value such as `GO:0008150 ! biological_process`.
fn first_token(value: &str, line: usize) -> Result<String> {
    value.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| GoError::Obo { line, message: "missing term id".to_string() })
}

/// The quoted text of a synonym whose scope is `EXACT`.
fn exact_synonym(value: &str) -> Option<String> {
    let rest = value.strip_prefix('"')?;
    let mut text = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    text.push(escaped);
                }
            }
            '"' => {
                let scope = rest[i + 1..].split_whitespace().next();
                return if scope == Some("EXACT") { Some(text) } else { None };
            }
            _ => text.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBO: &str = r#"format-version: 1.2
data-version: releases/2020-01-01
ontology: go

[Term]
id: GO:0008150
name: biological_process
namespace: biological_process
alt_id: GO:0000004
synonym: "physiological process" EXACT []
synonym: "biological process unknown" NARROW []

[Term]
id: GO:0009987
name: cellular process
namespace: biological_process
is_a: GO:0008150 ! biological_process

[Term]
id: GO:0005634
name: nucleus
namespace: cellular_component
synonym: "cell \"nucleus\"" EXACT []
is_a: GO:0043231 ! intracellular membrane-bounded organelle
relationship: part_of GO:0005622 ! intracellular
relationship: has_part GO:0005654 ! nucleoplasm

[Term]
id: GO:0000005
name: obsolete ribosomal chaperone activity
namespace: molecular_function
is_obsolete: true

[Typedef]
id: part_of
name: part of
is_transitive: true
"#;

    #[test]
    fn test_parse_obo() {
        let records = parse_obo(OBO.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);

        let root = &records[0];
        assert_eq!(root.id, "GO:0008150");
        assert_eq!(root.namespace, Namespace::BiologicalProcess);
        assert_eq!(root.alt_ids, vec!["GO:0000004"]);
        assert_eq!(root.synonyms, vec!["physiological process"]);
        assert!(root.relations.is_empty());

        assert_eq!(records[1].relations, vec![(RelationKind::IsA, "GO:0008150".to_string())]);

        let nucleus = &records[2];
        assert_eq!(nucleus.synonyms, vec!["cell \"nucleus\""]);
        assert_eq!(nucleus.relations, vec![
            (RelationKind::IsA, "GO:0043231".to_string()),
            (RelationKind::PartOf, "GO:0005622".to_string()),
        ]);

        assert!(records[3].obsolete);
        assert_eq!(records[3].namespace, Namespace::MolecularFunction);
    }

    #[test]
    fn test_parse_obo_missing_namespace() {
        let input = "[Term]\nid: GO:0000001\nname: orphan\n";
        match parse_obo(input.as_bytes()) {
            Err(GoError::Obo { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("namespace"));
            }
            other => panic!("expected ontology error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_obo_bad_namespace() {
        let input = "[Term]\nid: GO:0000001\nname: orphan\nnamespace: external\n";
        match parse_obo(input.as_bytes()) {
            Err(GoError::Obo { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected ontology error, got {:?}", other),
        }
    }

    #[test]
    fn test_parsed_obo_builds_graph() {
        let input = "[Term]\nid: GO:1\nname: a\nnamespace: P\n\n[Term]\nid: GO:2\nname: b\nnamespace: P\nis_a: GO:1\n";
        let graph = crate::build_term_graph(parse_obo(input.as_bytes()).unwrap()).unwrap();
        let expected: HashSet<&str> = vec!["GO:1"].into_iter().collect();
        assert_eq!(graph.ancestors_of("GO:2").unwrap(), expected);
    }

    const GAF: &str = "!gaf-version: 2.1
!
!Generated by GO Central

UniProtKB\tP04637\tTP53\t\tGO:0006915\tPMID:1\tIDA\t\tP\tCellular tumor antigen p53\t\tprotein\ttaxon:9606\t20200101\tUniProt
UniProtKB\tP38398\tBRCA1\tNOT|enables\tGO:0003677\tPMID:2\tIMP\t\tF\tBreast cancer type 1\t\tprotein\ttaxon:9606\t20200101\tUniProt
ComplexPortal\tCPX-1\tMCM\t\tGO:0005634\tPMID:3\tIPI\t\tC\tMCM complex\t\tprotein_complex\ttaxon:9606\t20200101\tComplexPortal
";

    #[test]
    fn test_parse_gaf() {
        let records = parse_gaf(GAF.as_bytes(), &GafOptions::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            AnnotationRecord::new("TP53", "GO:0006915", "IDA", "taxon:9606", None)
                .with_references(vec!["PMID:1"])
        );
        assert_eq!(records[1].qualifier.as_deref(), Some("NOT|enables"));
        assert_eq!(records[1].qualifiers().collect::<Vec<_>>(), vec!["NOT", "enables"]);
    }

    #[test]
    fn test_parse_gaf_options() {
        let options = GafOptions {
            gene_column: GeneColumn::ObjectId,
            db: Some("UniProtKB".to_string()),
            strip_species: false,
        };
        let records = parse_gaf(GAF.as_bytes(), &options).unwrap();
        let genes: Vec<&str> = records.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(genes, vec!["P04637", "P38398"]);
    }

    #[test]
    fn test_parse_gaf_strips_species_and_splits_references() {
        let input = "UniProtKB\tP04637\tP53_HUMAN\t\tGO:0006915\tGO_REF:0000024|PMID:7\tISS\t\tP\t\t\tprotein\ttaxon:9606\n\
            UniProtKB\tQ00000\tNOSUFFIX\t\tGO:0006915\t\tIEA\t\tP\t\t\tprotein\ttaxon:9606\n";
        let options = GafOptions { strip_species: true, ..GafOptions::default() };
        let records = parse_gaf(input.as_bytes(), &options).unwrap();

        assert_eq!(records[0].gene_id, "P53");
        assert_eq!(records[0].references, vec!["GO_REF:0000024", "PMID:7"]);
        assert_eq!(records[1].gene_id, "NOSUFFIX");
        assert!(records[1].references.is_empty());

        let unstripped = parse_gaf(input.as_bytes(), &GafOptions::default()).unwrap();
        assert_eq!(unstripped[0].gene_id, "P53_HUMAN");
    }

    #[test]
    fn test_parse_gaf_short_row() {
        let input = "UniProtKB\tP04637\tTP53\t\tGO:0006915\n";
        match parse_gaf(input.as_bytes(), &GafOptions::default()) {
            Err(GoError::Gaf { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected annotation error, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_reader() {
        let mut metadata_reader = MetadataReader::new(GAF.as_bytes());
        assert!(metadata_reader.metadata().is_none());

        let mut body = String::new();
        metadata_reader.read_to_string(&mut body).unwrap();
        assert_eq!(
            metadata_reader.metadata().unwrap(),
            "!gaf-version: 2.1\n!\n!Generated by GO Central\n\n"
        );
        assert!(body.starts_with("UniProtKB\tP04637\tTP53"));
        assert_eq!(body.lines().count(), 3);

        let records = parse_gaf(body.as_bytes(), &GafOptions::default()).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_read_gene_list() {
        let input = "# background\nTP53\tprotein\nBRCA1\n\nMYC\textra\tcolumns\n";
        let genes = read_gene_list(input.as_bytes()).unwrap();
        let expected: HashSet<String> = ["TP53", "BRCA1", "MYC"].iter().map(|g| g.to_string()).collect();
        assert_eq!(genes, expected);
    }
}
