//! Data structures for writing the curation JSON output.
//!
//! The document written here is the interchange contract with the portal's
//! bulk variant import; field names and nesting must stay stable.

use std::io::Write;

use super::vcf::Annotation;

/// Summary of one retained supporting sample.
///
/// `sample_id` is the position within the variant's sample list, not an
/// identity tied to the input file's sample columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct SampleSummary {
    /// Position of the sample within the variant's sample list.
    pub sample_id: usize,
    /// The genotype, e.g., "0/1".
    #[serde(rename = "GT")]
    pub gt: String,
    /// Total read depth at the site.
    #[serde(rename = "DP")]
    pub dp: i32,
    /// Genotype quality score, if any.
    #[serde(rename = "GQ")]
    pub gq: Option<i32>,
    /// Reference allele read depth.
    #[serde(rename = "AD_REF")]
    pub ad_ref: i32,
    /// Total alternate allele read depth.
    #[serde(rename = "AD_ALT")]
    pub ad_alt: i32,
    /// Allele balance; NaN when the read depth is zero, which serializes as
    /// `null`.
    #[serde(rename = "AB")]
    pub ab: f64,
}

/// One curated variant as consumed by the portal's bulk import.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantRecord {
    /// Key `"{chrom}-{pos}-{ref}-{alt}"` of the first alternate allele.
    pub variant_id: String,
    /// Site filter status, "PASS" if none recorded.
    pub qc_filter: String,
    /// Allele count in called genotypes.
    #[serde(rename = "AC")]
    pub ac: i32,
    /// Total number of called alleles.
    #[serde(rename = "AN")]
    pub an: i32,
    /// Allele frequency.
    #[serde(rename = "AF")]
    pub af: f64,
    /// Loss-of-function annotations, most severe first.
    pub annotations: Vec<Annotation>,
    /// Retained supporting samples.
    pub samples: Vec<SampleSummary>,
}

/// Serialize the final collection as a single JSON document.
///
/// The whole result set is materialized before the first output byte is
/// written.  Should memory on very large result sets ever become a concern,
/// this function is the seam where streaming serialization would go without
/// touching the upstream stages.
pub fn write_json<W: Write>(
    writer: &mut W,
    variants: &[VariantRecord],
) -> Result<(), anyhow::Error> {
    serde_json::to_writer(&mut *writer, variants)
        .map_err(|e| anyhow::anyhow!("problem serializing variants: {}", e))?;
    writer
        .flush()
        .map_err(|e| anyhow::anyhow!("problem flushing output: {}", e))?;

    Ok(())
}
