//! Implementation of the `seqvars convert` subcommand.
//!
//! Converts a VEP-annotated VCF file into the JSON document that the
//! curation portal's variant import consumes: annotations are ranked by
//! severity, only variants with at least one loss-of-function annotation are
//! kept, and a bounded, genotype-balanced subset of supporting samples is
//! retained per variant.

pub mod csq;
pub mod output;
pub mod samples;
pub mod vcf;

use indexmap::map::Entry;
use indexmap::IndexMap;
use thousands::Separable;

use crate::common::{self, io::open_write_maybe_gz};

use self::output::VariantRecord;
use self::vcf::{VcfReader, VcfRow};

/// Command line arguments for `seqvars convert` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "convert annotated VCF to curation JSON", long_about = None)]
pub struct Args {
    /// Path to input VCF file.
    #[clap(long)]
    pub path_in: String,
    /// Path to output JSON file.
    #[clap(long)]
    pub path_out: String,
    /// Maximal number of samples to keep per distinct genotype.
    #[clap(long, default_value_t = 5)]
    pub max_samples_per_genotype: usize,
}

/// Insertion-ordered aggregation of output records, keyed by variant
/// identifier.
///
/// Rows are merged with a first-occurrence-wins policy for the site-level
/// scalar fields while annotations and samples accumulate across rows; the
/// final collection keeps the first-seen order of variant identifiers.
#[derive(Debug)]
pub struct VariantAggregator {
    /// The collected records.
    variants: IndexMap<String, VariantRecord>,
    /// Per-genotype sample quota handed to the sample selection.
    max_samples_per_genotype: usize,
}

impl VariantAggregator {
    /// Construct with the given per-genotype sample quota.
    pub fn new(max_samples_per_genotype: usize) -> Self {
        Self {
            variants: IndexMap::new(),
            max_samples_per_genotype,
        }
    }

    /// Merge one parsed row into the collection.
    ///
    /// Rows without any LoF annotation are logged and skipped entirely; such
    /// a site is neither inserted nor does it update an existing record.
    pub fn handle_row(&mut self, row: VcfRow) -> Result<(), anyhow::Error> {
        let variant_id = row.variant_id();
        let VcfRow {
            qc_filter,
            ac,
            an,
            af,
            annotations,
            calls,
            ..
        } = row;

        let annotations = csq::filter_lof_annotations(annotations)?;
        if annotations.is_empty() {
            tracing::info!("skipping {}, no LoF annotations", &variant_id);
            return Ok(());
        }

        let variant = match self.variants.entry(variant_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let record = VariantRecord {
                    variant_id: entry.key().clone(),
                    qc_filter,
                    ac,
                    an,
                    af,
                    annotations: Vec::new(),
                    samples: Vec::new(),
                };
                entry.insert(record)
            }
        };
        variant.annotations.extend(annotations);
        samples::extend_samples(&mut variant.samples, &calls, self.max_samples_per_genotype)?;

        Ok(())
    }

    /// Number of variants collected so far.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether no variant has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Finalize into the output collection, in first-seen order.
    pub fn into_records(self) -> Vec<VariantRecord> {
        self.variants.into_values().collect()
    }
}

/// Main entry point for `seqvars convert` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("curation-portal-worker {}", common::worker_version());
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    common::trace_rss_now();

    tracing::info!("opening input file...");
    let mut input_reader = VcfReader::from_path(&args.path_in)
        .map_err(|e| anyhow::anyhow!("could not open input file {}: {}", &args.path_in, e))?;
    tracing::debug!("CSQ fields = {:?}", input_reader.csq_format().fields());
    tracing::debug!(
        "input file declares {} samples",
        input_reader.sample_names().len()
    );

    tracing::info!("converting rows...");
    let start = std::time::Instant::now();
    let mut prev = std::time::Instant::now();
    let mut aggregator = VariantAggregator::new(args.max_samples_per_genotype);
    let mut total_read = 0usize;
    for row in input_reader.rows() {
        let row = row?;
        total_read += 1;

        if prev.elapsed().as_secs() >= 60 {
            tracing::info!("at {}", row.variant_id());
            prev = std::time::Instant::now();
        }

        aggregator.handle_row(row)?;
    }
    tracing::info!(
        "... collected {} variants from {} rows in {:?}",
        aggregator.len().separate_with_commas(),
        total_read.separate_with_commas(),
        start.elapsed()
    );

    common::trace_rss_now();

    tracing::info!("writing output...");
    let records = aggregator.into_records();
    let mut output_writer = open_write_maybe_gz(&args.path_out)
        .map_err(|e| anyhow::anyhow!("could not open output file {}: {}", &args.path_out, e))?;
    output::write_json(&mut output_writer, &records)?;

    tracing::info!(
        "All of `seqvars convert` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
