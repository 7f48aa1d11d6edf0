//! Severity ranking of VEP consequence terms and the LoF filter built on it.

use std::str::FromStr;

use itertools::Itertools;

use super::vcf::Annotation;

/// Error type for consequence severity lookup.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    /// The term is not part of the severity table.
    #[error("consequence term {0:?} is not in the severity table")]
    UnknownTerm(String),
}

/// VEP consequence terms, ordered from most to least severe.
///
/// The order follows the Sequence Ontology severity convention used by VEP.
/// Deprecated terms (`initiator_codon_variant`, `non_coding_exon_variant`,
/// `nc_transcript_variant`) keep their historical positions next to their
/// replacements and must not be folded into them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Consequence {
    #[strum(serialize = "transcript_ablation")]
    TranscriptAblation,
    #[strum(serialize = "splice_acceptor_variant")]
    SpliceAcceptorVariant,
    #[strum(serialize = "splice_donor_variant")]
    SpliceDonorVariant,
    #[strum(serialize = "stop_gained")]
    StopGained,
    #[strum(serialize = "frameshift_variant")]
    FrameshiftVariant,
    #[strum(serialize = "stop_lost")]
    StopLost,
    /// New in VEP v81.
    #[strum(serialize = "start_lost")]
    StartLost,
    /// Deprecated, replaced by `start_lost`.
    #[strum(serialize = "initiator_codon_variant")]
    InitiatorCodonVariant,
    #[strum(serialize = "transcript_amplification")]
    TranscriptAmplification,
    #[strum(serialize = "inframe_insertion")]
    InframeInsertion,
    #[strum(serialize = "inframe_deletion")]
    InframeDeletion,
    #[strum(serialize = "missense_variant")]
    MissenseVariant,
    /// New in VEP v79.
    #[strum(serialize = "protein_altering_variant")]
    ProteinAlteringVariant,
    #[strum(serialize = "splice_region_variant")]
    SpliceRegionVariant,
    #[strum(serialize = "incomplete_terminal_codon_variant")]
    IncompleteTerminalCodonVariant,
    #[strum(serialize = "stop_retained_variant")]
    StopRetainedVariant,
    #[strum(serialize = "synonymous_variant")]
    SynonymousVariant,
    #[strum(serialize = "coding_sequence_variant")]
    CodingSequenceVariant,
    #[strum(serialize = "mature_miRNA_variant")]
    MatureMirnaVariant,
    #[strum(serialize = "5_prime_UTR_variant")]
    FivePrimeUtrVariant,
    #[strum(serialize = "3_prime_UTR_variant")]
    ThreePrimeUtrVariant,
    #[strum(serialize = "non_coding_transcript_exon_variant")]
    NonCodingTranscriptExonVariant,
    /// Deprecated, replaced by `non_coding_transcript_exon_variant`.
    #[strum(serialize = "non_coding_exon_variant")]
    NonCodingExonVariant,
    #[strum(serialize = "intron_variant")]
    IntronVariant,
    #[strum(serialize = "NMD_transcript_variant")]
    NmdTranscriptVariant,
    #[strum(serialize = "non_coding_transcript_variant")]
    NonCodingTranscriptVariant,
    /// Deprecated, replaced by `non_coding_transcript_variant`.
    #[strum(serialize = "nc_transcript_variant")]
    NcTranscriptVariant,
    #[strum(serialize = "upstream_gene_variant")]
    UpstreamGeneVariant,
    #[strum(serialize = "downstream_gene_variant")]
    DownstreamGeneVariant,
    #[strum(serialize = "TFBS_ablation")]
    TfbsAblation,
    #[strum(serialize = "TFBS_amplification")]
    TfbsAmplification,
    #[strum(serialize = "TF_binding_site_variant")]
    TfBindingSiteVariant,
    #[strum(serialize = "regulatory_region_ablation")]
    RegulatoryRegionAblation,
    #[strum(serialize = "regulatory_region_amplification")]
    RegulatoryRegionAmplification,
    #[strum(serialize = "feature_elongation")]
    FeatureElongation,
    #[strum(serialize = "regulatory_region_variant")]
    RegulatoryRegionVariant,
    #[strum(serialize = "feature_truncation")]
    FeatureTruncation,
    #[strum(serialize = "intergenic_variant")]
    IntergenicVariant,
}

impl Consequence {
    /// Severity rank of the term; `0` is the most severe.
    pub fn rank(self) -> usize {
        self as usize
    }
}

/// The least severe term still considered loss-of-function.
pub const LOF_CUTOFF: Consequence = Consequence::FrameshiftVariant;

/// Look up the severity rank of a single consequence term.
pub fn rank(term: &str) -> Result<usize, RankError> {
    Consequence::from_str(term)
        .map(Consequence::rank)
        .map_err(|_| RankError::UnknownTerm(term.to_string()))
}

/// Effective severity rank of a compound consequence label.
///
/// Labels joining multiple terms with `&` rank as their most severe term.
/// Any unknown component term is an error, never a guessed rank.
pub fn effective_rank(label: &str) -> Result<usize, RankError> {
    label
        .split('&')
        .map(rank)
        .fold_ok(usize::MAX, std::cmp::min)
}

/// Retain only the loss-of-function annotations, most severe first.
///
/// Every annotation is ranked before filtering, so an unknown consequence
/// term is surfaced even when the annotation carrying it would be discarded.
/// Survivors are sorted ascending by effective rank; ties keep their input
/// order.
pub fn filter_lof_annotations(annotations: Vec<Annotation>) -> Result<Vec<Annotation>, RankError> {
    let mut ranked = annotations
        .into_iter()
        .map(|annotation| Ok((effective_rank(&annotation.consequence)?, annotation)))
        .collect::<Result<Vec<_>, RankError>>()?;
    ranked.retain(|(rank, _)| *rank <= LOF_CUTOFF.rank());
    ranked.sort_by_key(|(rank, _)| *rank);
    Ok(ranked
        .into_iter()
        .map(|(_, annotation)| annotation)
        .collect())
}
