use std::collections::HashSet;
use std::io::Write;
use itertools::Itertools;
use serde::Serialize;

use crate::{Namespace, PropagatedIndex, TermGraph};

/// One propagated gene/term membership.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct GeneTermRow<'a> {
    pub gene: &'a str,
    pub term: &'a str,
    pub namespace: Namespace,
    /// False when the membership was inferred through an ancestor.
    pub direct: bool,
}

impl<'a> GeneTermRow<'a> {
    /// Every membership in `index`, sorted by gene then term.
    ///
    /// `genes` limits the rows to a gene selection such as a query result.
    pub fn collect(
        index: &'a PropagatedIndex,
        namespace: Option<Namespace>,
        genes: Option<&HashSet<&str>>,
    ) -> Vec<GeneTermRow<'a>> {
        index.iter_memberships()
            .filter(|(_, _, ns, _)| namespace.map_or(true, |n| n == *ns))
            .filter(|(gene, _, _, _)| genes.map_or(true, |genes| genes.contains(gene)))
            .map(|(gene, term, namespace, direct)| GeneTermRow { gene, term, namespace, direct })
            .sorted_by(|a, b| (a.gene, a.term).cmp(&(b.gene, b.term)))
            .collect()
    }
}

/// Gene counts per term after propagation.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct TermSummaryRow<'a> {
    pub term: &'a str,
    pub name: &'a str,
    pub namespace: Namespace,
    pub gene_count: usize,
}

impl<'a> TermSummaryRow<'a> {
    /// One row per annotated term, largest gene count first.
    pub fn collect(
        graph: &'a TermGraph,
        index: &PropagatedIndex,
        namespace: Option<Namespace>,
    ) -> Vec<TermSummaryRow<'a>> {
        index.reverse_mapping(namespace)
            .into_iter()
            .filter_map(|(term, genes)| {
                let term = graph.get(term)?;
                Some(TermSummaryRow {
                    term: term.id(),
                    name: term.name(),
                    namespace: term.namespace(),
                    gene_count: genes.len(),
                })
            })
            .sorted_by(|a, b| b.gene_count.cmp(&a.gene_count).then_with(|| a.term.cmp(b.term)))
            .collect()
    }
}

/// Writes a `!` comment block followed by tab-separated rows with a header.
pub struct TsvExporter<I: Iterator> {
    metadata: String,
    record_iter: I,
}

impl<T, I: Iterator<Item=T>> TsvExporter<I>
    where T: Serialize
{
    pub fn new(metadata: String, record_iter: I) -> TsvExporter<I> {
        TsvExporter { metadata, record_iter }
    }

    pub fn write_all<W: Write>(&mut self, mut writer: W) -> crate::Result<()> {
        for line in self.metadata.lines() {
            if line.starts_with('!') {
                writeln!(&mut writer, "{}", line)?;
            } else {
                writeln!(&mut writer, "!{}", line)?;
            }
        }

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        for record in &mut self.record_iter {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
