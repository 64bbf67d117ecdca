use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Hash, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Experimental,
    HighThroughput,
    Phylogenetic,
    Computational,
    AuthorStatement,
    Curator,
    NoData,
    Automatic,
}

impl EvidenceCategory {
    pub fn short(&self) -> &'static str {
        match self {
            EvidenceCategory::Experimental => "exp.",
            EvidenceCategory::HighThroughput => "htp.",
            EvidenceCategory::Phylogenetic => "phylo.",
            EvidenceCategory::Computational => "comp.",
            EvidenceCategory::AuthorStatement => "lit.",
            EvidenceCategory::Curator => "cur.",
            EvidenceCategory::NoData => "n.d.",
            EvidenceCategory::Automatic => "autom.",
        }
    }
}

impl TryFrom<&str> for EvidenceCategory {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let category = match value {
            "experimental" | "EXP" => EvidenceCategory::Experimental,
            "high_throughput" | "HTP" => EvidenceCategory::HighThroughput,
            "phylogenetic" => EvidenceCategory::Phylogenetic,
            "computational" => EvidenceCategory::Computational,
            "author_statement" | "literature" => EvidenceCategory::AuthorStatement,
            "curator" => EvidenceCategory::Curator,
            "no_data" | "ND" => EvidenceCategory::NoData,
            "automatic" | "IEA" => EvidenceCategory::Automatic,
            _ => return Err(()),
        };
        Ok(category)
    }
}

lazy_static! {
    static ref EVIDENCE_CODES: HashMap<&'static str, (&'static str, EvidenceCategory)> = {
        use crate::evidence::EvidenceCategory::*;
        vec![
            ("EXP", "inferred from experiment", Experimental),
            ("IDA", "inferred from direct assay", Experimental),
            ("IPI", "inferred from physical interaction", Experimental),
            ("IMP", "inferred from mutant phenotype", Experimental),
            ("IGI", "inferred from genetic interaction", Experimental),
            ("IEP", "inferred from expression pattern", Experimental),
            ("HTP", "inferred from high throughput experiment", HighThroughput),
            ("HDA", "inferred from high throughput direct assay", HighThroughput),
            ("HMP", "inferred from high throughput mutant phenotype", HighThroughput),
            ("HGI", "inferred from high throughput genetic interaction", HighThroughput),
            ("HEP", "inferred from high throughput expression pattern", HighThroughput),
            ("IBA", "inferred from biological aspect of ancestor", Phylogenetic),
            ("IBD", "inferred from biological aspect of descendant", Phylogenetic),
            ("IKR", "inferred from key residues", Phylogenetic),
            ("IRD", "inferred from rapid divergence", Phylogenetic),
            ("ISS", "inferred from sequence or structural similarity", Computational),
            ("ISO", "inferred from sequence orthology", Computational),
            ("ISA", "inferred from sequence alignment", Computational),
            ("ISM", "inferred from sequence model", Computational),
            ("IGC", "inferred from genomic context", Computational),
            ("RCA", "inferred from reviewed computational analysis", Computational),
            ("TAS", "traceable author statement", AuthorStatement),
            ("NAS", "non-traceable author statement", AuthorStatement),
            ("IC", "inferred by curator", Curator),
            ("ND", "no biological data available", NoData),
            ("IEA", "inferred from electronic annotation", Automatic),
        ].into_iter()
            .map(|(code, name, category)| (code, (name, category)))
            .collect()
    };
}

pub fn category_of(code: &str) -> Option<EvidenceCategory> {
    EVIDENCE_CODES.get(code).map(|(_, category)| *category)
}

pub fn name_of(code: &str) -> Option<&'static str> {
    EVIDENCE_CODES.get(code).map(|(name, _)| *name)
}

/// All known codes in `category`, ready to use as an evidence allow-set.
pub fn codes_in(category: EvidenceCategory) -> HashSet<String> {
    EVIDENCE_CODES.iter()
        .filter(|(_, (_, c))| *c == category)
        .map(|(code, _)| code.to_string())
        .collect()
}
