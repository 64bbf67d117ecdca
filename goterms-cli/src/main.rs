use clap::{App, Arg, ArgMatches};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, Write};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use goterms::evidence::{self, EvidenceCategory};
use goterms::{
    build_term_graph, parse_gaf, parse_obo, read_gene_list, AnnotationFilter, AnnotationTable,
    GafOptions, GeneColumn, GeneTermRow, MetadataReader, Namespace, Propagator, Query,
    TermSummaryRow, TsvExporter,
};

fn app<'a, 'b>() -> clap::App<'a, 'b> {
    App::new("goterms")
        .about("Propagates GO annotations up the ontology and exports gene/term tables")
        .arg(Arg::with_name("ontology")
            .long("ontology")
            .env("GO_ONTOLOGY_FILE")
            .help("Ontology in OBO format")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("annotations")
            .long("annotations")
            .env("GO_ANNOTATIONS_FILE")
            .help("Annotations in GAF 2.x format")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("genes")
            .long("genes")
            .env("GO_GENES_FILE")
            .help("Restrict annotations to the genes listed in the first column")
            .takes_value(true))
        .arg(Arg::with_name("gene_column")
            .long("gene-column")
            .possible_values(&["symbol", "object-id"])
            .default_value("symbol")
            .takes_value(true))
        .arg(Arg::with_name("strip_species")
            .long("strip-species")
            .help("Drop the _SPECIES suffix from gene symbols, e.g. P53_HUMAN"))
        .arg(Arg::with_name("ignore_case")
            .long("ignore-case")
            .help("Match annotated genes against --genes case-insensitively"))
        .arg(Arg::with_name("db")
            .long("db")
            .help("Keep only annotation rows from this source database, e.g. UniProtKB")
            .takes_value(true))
        .arg(Arg::with_name("evidence")
            .long("evidence")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("evidence_category")
            .long("evidence-category")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("exclude_evidence")
            .long("exclude-evidence")
            .help("Ignored when --evidence or --evidence-category is given")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("exclude_reference")
            .long("exclude-reference")
            .help("Drop annotations whose only reference is this one, e.g. GO_REF:0000002")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("species")
            .long("species")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("exclude_qualifier")
            .long("exclude-qualifier")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("keep_negated")
            .long("keep-negated")
            .help("Keep NOT-qualified annotations")
            .conflicts_with("exclude_qualifier"))
        .arg(Arg::with_name("namespace")
            .long("namespace")
            .possible_values(&["P", "F", "C"])
            .takes_value(true))
        .arg(Arg::with_name("term")
            .long("term")
            .help("Only export genes annotated (after propagation) with these terms")
            .multiple(true)
            .number_of_values(1)
            .takes_value(true))
        .arg(Arg::with_name("strategy")
            .long("strategy")
            .possible_values(&["union", "intersection"])
            .default_value("union")
            .takes_value(true))
        .arg(Arg::with_name("format")
            .long("format")
            .possible_values(&["gene-terms", "term-summary"])
            .default_value("gene-terms")
            .takes_value(true))
        .arg(Arg::with_name("sequential")
            .long("sequential")
            .help("Propagate on a single thread"))
        .arg(Arg::with_name("output")
            .long("output")
            .short("o")
            .help("Output file, defaults to stdout")
            .takes_value(true))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true))
}

fn main() {
    dotenv::dotenv().ok();
    let matches = app().get_matches();

    let directives = log_directives(
        matches.occurrences_of("verbose"),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&matches) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `-v`, which raises the default from `warn` to `debug`.
fn log_directives(verbose: u64, rust_log: Option<String>) -> String {
    match rust_log.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => directives,
        None if verbose > 0 => "debug".to_string(),
        None => "warn".to_string(),
    }
}

fn values<'a>(args: &'a ArgMatches, name: &str) -> Vec<&'a str> {
    args.values_of(name).map(|values| values.collect()).unwrap_or_default()
}

fn annotation_filter(args: &ArgMatches) -> Result<AnnotationFilter, String> {
    let mut filter = AnnotationFilter::new()
        .with_evidence(values(args, "evidence"))
        .excluding_evidence(values(args, "exclude_evidence"))
        .excluding_references(values(args, "exclude_reference"))
        .with_species(values(args, "species"));

    for name in values(args, "evidence_category") {
        let category = EvidenceCategory::try_from(name)
            .map_err(|_| format!("unknown evidence category: {}", name))?;
        filter = filter.with_evidence(evidence::codes_in(category));
    }

    if args.is_present("keep_negated") {
        filter = filter.excluding_qualifiers(Vec::<String>::new());
    } else if args.is_present("exclude_qualifier") {
        filter = filter.excluding_qualifiers(values(args, "exclude_qualifier"));
    }
    Ok(filter)
}

fn run(args: &ArgMatches) -> Result<(), String> {
    let ontology_path = args.value_of("ontology").ok_or("missing ontology file")?;
    let annotations_path = args.value_of("annotations").ok_or("missing annotations file")?;
    let namespace = args.value_of("namespace")
        .map(Namespace::try_from)
        .transpose()
        .map_err(|e| e.to_string())?;

    let ontology_file = File::open(ontology_path)
        .map_err(|e| format!("failed to open ontology file {}: {}", ontology_path, e))?;
    let term_records = parse_obo(BufReader::new(ontology_file))
        .map_err(|e| format!("failed to parse ontology: {}", e))?;
    let graph = build_term_graph(term_records)
        .map_err(|e| format!("failed to build ontology graph: {}", e))?;

    let gaf_options = GafOptions {
        gene_column: match args.value_of("gene_column") {
            Some("object-id") => GeneColumn::ObjectId,
            _ => GeneColumn::Symbol,
        },
        db: args.value_of("db").map(str::to_string),
        strip_species: args.is_present("strip_species"),
    };
    let annotations_file = File::open(annotations_path)
        .map_err(|e| format!("failed to open annotations file {}: {}", annotations_path, e))?;
    let mut annotation_reader = MetadataReader::new(BufReader::new(annotations_file));
    let annotation_records = parse_gaf(&mut annotation_reader, &gaf_options)
        .map_err(|e| format!("failed to parse annotations: {}", e))?;
    let annotation_metadata = annotation_reader.metadata().unwrap_or_default().to_string();

    let mut table: AnnotationTable = annotation_records.into_iter().collect();
    if let Some(genes_path) = args.value_of("genes") {
        let genes_file = File::open(genes_path)
            .map_err(|e| format!("failed to open genes file {}: {}", genes_path, e))?;
        let genes = read_gene_list(genes_file)
            .map_err(|e| format!("failed to read gene list: {}", e))?;
        info!(genes = genes.len(), "restricting to gene list");
        table = if args.is_present("ignore_case") {
            table.restrict_to_genes_ignoring_case(&genes)
        } else {
            table.restrict_to_genes(&genes)
        };
    }
    let table = table.filter(&annotation_filter(args)?);

    let index = Propagator::new(&graph)
        .parallel(!args.is_present("sequential"))
        .run(&table)
        .map_err(|e| format!("failed to propagate annotations: {}", e))?;

    let terms: Vec<String> = values(args, "term").into_iter().map(str::to_string).collect();
    let selection: Option<HashSet<&str>> = if terms.is_empty() {
        None
    } else {
        let query = match args.value_of("strategy") {
            Some("intersection") => Query::Intersection(terms),
            _ => Query::Union(terms),
        };
        let result = query.execute(&index);
        info!(genes = result.gene_count(), "selected genes by term query");
        Some(result.into_genes())
    };

    let metadata = format!(
        "{}!generated-by: goterms {}\n",
        annotation_metadata,
        env!("CARGO_PKG_VERSION"),
    );
    let writer: Box<dyn Write> = match args.value_of("output") {
        Some(path) => Box::new(File::create(path)
            .map_err(|e| format!("failed to create output file {}: {}", path, e))?),
        None => Box::new(std::io::stdout()),
    };

    match args.value_of("format") {
        Some("term-summary") => {
            // Counts reflect only the selected genes
            let restricted;
            let summary_index = match &selection {
                Some(genes) => {
                    let genes: HashSet<String> = genes.iter().map(|gene| gene.to_string()).collect();
                    restricted = Propagator::new(&graph)
                        .run(&table.restrict_to_genes(&genes))
                        .map_err(|e| format!("failed to propagate annotations: {}", e))?;
                    &restricted
                }
                None => &index,
            };
            let rows = TermSummaryRow::collect(&graph, summary_index, namespace);
            TsvExporter::new(metadata, rows.into_iter())
                .write_all(writer)
                .map_err(|e| format!("failed to write output: {}", e))?;
        }
        _ => {
            let rows = GeneTermRow::collect(&index, namespace, selection.as_ref());
            TsvExporter::new(metadata, rows.into_iter())
                .write_all(writer)
                .map_err(|e| format!("failed to write output: {}", e))?;
        }
    }

    Ok(())
}
