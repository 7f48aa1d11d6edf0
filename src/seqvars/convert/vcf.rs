//! Streaming reader for VEP-annotated VCF files.
//!
//! This is not a general purpose VCF parser.  It decodes exactly the site and
//! genotype fields the conversion needs and treats everything it cannot
//! decode as a fatal error, so a run either consumes the whole file or stops
//! at the first malformed row.

use std::io::BufRead;
use std::path::Path;

use crate::common::io::open_read_maybe_gz;

/// A single transcript-level annotation decoded from `INFO/CSQ`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    /// Compound consequence label, individual terms joined by `&`.
    pub consequence: String,
    /// Gene identifier.
    pub gene_id: String,
    /// Gene symbol.
    pub gene_symbol: String,
    /// Transcript identifier.
    pub transcript_id: String,
}

/// Per-sample genotype information at one site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenotypeCall {
    /// Index of the sample in the file's sample column order.
    pub sample_index: usize,
    /// The genotype, e.g., "0/1"; `"."` if missing.
    pub gt: String,
    /// Genotype quality score, if any.
    pub gq: Option<i32>,
    /// Total read depth at the site, if any.
    pub dp: Option<i32>,
    /// Per-allele read depths, reference allele first, if any.
    pub ad: Option<Vec<i32>>,
}

/// One decoded site row of the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct VcfRow {
    /// Chromosome name.
    pub chrom: String,
    /// 1-based position.
    pub pos: i32,
    /// Reference allele sequence.
    pub reference: String,
    /// Alternate allele sequences; never empty.
    pub alternatives: Vec<String>,
    /// Site filter status, normalized to "PASS" if none recorded.
    pub qc_filter: String,
    /// Allele count in called genotypes (`INFO/AC`, first value).
    pub ac: i32,
    /// Total number of called alleles (`INFO/AN`).
    pub an: i32,
    /// Allele frequency (`INFO/AF`, first value).
    pub af: f64,
    /// Transcript annotations decoded from `INFO/CSQ`; empty if absent.
    pub annotations: Vec<Annotation>,
    /// Genotype calls, aligned to the header's sample ordering.
    pub calls: Vec<GenotypeCall>,
}

impl VcfRow {
    /// Identifier of this site's first alternate allele,
    /// `"{chrom}-{pos}-{ref}-{alt}"`.
    ///
    /// Further alternate alleles of a multi-allelic site do not contribute;
    /// such sites are keyed by their first allele only.
    pub fn variant_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.chrom, self.pos, self.reference, self.alternatives[0]
        )
    }
}

/// Field order of the `INFO/CSQ` entries, as declared by the file header.
#[derive(Debug, Clone)]
pub struct CsqFormat {
    /// Field names in the order they appear in each entry.
    fields: Vec<String>,
    /// Position of the `Consequence` field.
    idx_consequence: usize,
    /// Position of the `Gene` field.
    idx_gene: usize,
    /// Position of the `SYMBOL` field.
    idx_symbol: usize,
    /// Position of the `Feature` field.
    idx_feature: usize,
}

impl CsqFormat {
    /// Extract the format declaration from the description text of a
    /// `##INFO=<ID=CSQ,...>` header line.
    ///
    /// The description embeds the pipe-delimited field order behind a
    /// literal `"Format: "` marker.
    fn from_description(description: &str) -> Result<Self, anyhow::Error> {
        let (_, rest) = description.split_once("Format: ").ok_or_else(|| {
            anyhow::anyhow!("no \"Format: \" marker in CSQ header line: {}", description)
        })?;
        let list = match rest.find('"') {
            Some(end) => &rest[..end],
            None => rest,
        };
        let fields = list
            .trim_end_matches('>')
            .split('|')
            .map(|field| field.trim().to_string())
            .collect::<Vec<_>>();

        let index_of = |name: &str| {
            fields.iter().position(|field| field == name).ok_or_else(|| {
                anyhow::anyhow!("CSQ format declaration lacks required field {:?}", name)
            })
        };
        let idx_consequence = index_of("Consequence")?;
        let idx_gene = index_of("Gene")?;
        let idx_symbol = index_of("SYMBOL")?;
        let idx_feature = index_of("Feature")?;

        Ok(Self {
            fields,
            idx_consequence,
            idx_gene,
            idx_symbol,
            idx_feature,
        })
    }

    /// The declared field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Decode a single pipe-delimited `CSQ` entry.
    pub fn decode(&self, entry: &str) -> Result<Annotation, anyhow::Error> {
        let values = entry.split('|').collect::<Vec<_>>();
        if values.len() != self.fields.len() {
            anyhow::bail!(
                "CSQ entry has {} fields, the header declares {}: {:?}",
                values.len(),
                self.fields.len(),
                entry
            );
        }

        Ok(Annotation {
            consequence: values[self.idx_consequence].to_string(),
            gene_id: values[self.idx_gene].to_string(),
            gene_symbol: values[self.idx_symbol].to_string(),
            transcript_id: values[self.idx_feature].to_string(),
        })
    }
}

/// Streaming reader over a (possibly gzip-compressed) VEP-annotated VCF file.
///
/// Construction consumes the meta header; afterwards `read_row`/`rows` yield
/// the data rows lazily in a single, non-restartable pass.
pub struct VcfReader<R: BufRead> {
    /// The underlying line source.
    inner: R,
    /// Decoded `INFO/CSQ` field order.
    csq_format: CsqFormat,
    /// Sample names from the column header line.
    sample_names: Vec<String>,
    /// Column count of the header line, rows must match it.
    n_cols: usize,
    /// Current 1-based line number, for error messages.
    line_no: usize,
}

impl VcfReader<Box<dyn BufRead>> {
    /// Open the file at `path`, transparently decompressing gzip, and read
    /// the header.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        Self::new(open_read_maybe_gz(path)?)
    }
}

impl<R: BufRead> VcfReader<R> {
    /// Read the meta header from `inner` and return the reader positioned on
    /// the first data row.
    ///
    /// A header without a parsable CSQ format declaration or without the
    /// `#CHROM` column header line is a fatal error; no row is processed.
    pub fn new(mut inner: R) -> Result<Self, anyhow::Error> {
        let mut csq_format = None;
        let mut line = String::new();
        let mut line_no = 0;
        loop {
            line.clear();
            if inner.read_line(&mut line)? == 0 {
                anyhow::bail!("unexpected end of file in VCF header");
            }
            line_no += 1;

            let trimmed = line.trim_end();
            if let Some(meta) = trimmed.strip_prefix("##") {
                if meta.starts_with("INFO=<ID=CSQ,") {
                    csq_format = Some(CsqFormat::from_description(meta).map_err(|e| {
                        anyhow::anyhow!("problem in header line {}: {}", line_no, e)
                    })?);
                }
            } else if trimmed.starts_with('#') {
                let columns = trimmed.split('\t').collect::<Vec<_>>();
                if columns.len() < 8 {
                    anyhow::bail!(
                        "truncated column header line with {} columns",
                        columns.len()
                    );
                }
                let csq_format = csq_format.ok_or_else(|| {
                    anyhow::anyhow!("no ##INFO=<ID=CSQ,...> line found in VCF header")
                })?;
                let sample_names = columns
                    .iter()
                    .skip(9)
                    .map(|name| name.to_string())
                    .collect::<Vec<_>>();
                return Ok(Self {
                    inner,
                    csq_format,
                    sample_names,
                    n_cols: columns.len(),
                    line_no,
                });
            } else {
                anyhow::bail!("data row before #CHROM column header at line {}", line_no);
            }
        }
    }

    /// Decoded `INFO/CSQ` field order.
    pub fn csq_format(&self) -> &CsqFormat {
        &self.csq_format
    }

    /// Sample names declared by the column header.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Read the next data row; `Ok(None)` at end of input.
    pub fn read_row(&mut self) -> Result<Option<VcfRow>, anyhow::Error> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.inner.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !line.trim_end().is_empty() {
                break;
            }
        }

        self.parse_row(line.trim_end())
            .map(Some)
            .map_err(|e| anyhow::anyhow!("malformed VCF row at line {}: {}", self.line_no, e))
    }

    /// Iterator over all remaining rows.
    pub fn rows(&mut self) -> Rows<'_, R> {
        Rows { reader: self }
    }

    fn parse_row(&self, line: &str) -> Result<VcfRow, anyhow::Error> {
        let fields = line.split('\t').collect::<Vec<_>>();
        if fields.len() != self.n_cols {
            anyhow::bail!("expected {} columns, found {}", self.n_cols, fields.len());
        }

        let chrom = fields[0].to_string();
        let pos = fields[1]
            .parse::<i32>()
            .map_err(|e| anyhow::anyhow!("invalid POS value {:?}: {}", fields[1], e))?;
        let reference = fields[3].to_string();
        if fields[4] == "." || fields[4].is_empty() {
            anyhow::bail!("site has no alternate allele");
        }
        let alternatives = fields[4]
            .split(',')
            .map(|allele| allele.to_string())
            .collect::<Vec<_>>();
        let qc_filter = match fields[6] {
            "." | "PASS" | "" => "PASS".to_string(),
            filters => filters.replace(';', ","),
        };

        let (ac, an, af, annotations) = self.parse_info(fields[7])?;

        let calls = if self.sample_names.is_empty() {
            Vec::new()
        } else {
            let format_keys = fields[8].split(':').collect::<Vec<_>>();
            fields[9..]
                .iter()
                .enumerate()
                .map(|(sample_index, sample)| parse_call(sample_index, &format_keys, sample))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(VcfRow {
            chrom,
            pos,
            reference,
            alternatives,
            qc_filter,
            ac,
            an,
            af,
            annotations,
            calls,
        })
    }

    /// Decode the INFO column into the scalar site fields and the CSQ
    /// annotations.  `AC`/`AN`/`AF` are required, `CSQ` is not.
    fn parse_info(&self, info: &str) -> Result<(i32, i32, f64, Vec<Annotation>), anyhow::Error> {
        let mut ac = None;
        let mut an = None;
        let mut af = None;
        let mut annotations = Vec::new();

        for entry in info.split(';') {
            match entry.split_once('=') {
                Some(("AC", value)) => ac = Some(parse_info_scalar::<i32>("AC", value)?),
                Some(("AN", value)) => an = Some(parse_info_scalar::<i32>("AN", value)?),
                Some(("AF", value)) => af = Some(parse_info_scalar::<f64>("AF", value)?),
                Some(("CSQ", value)) => {
                    annotations = value
                        .split(',')
                        .map(|entry| self.csq_format.decode(entry))
                        .collect::<Result<Vec<_>, _>>()?;
                }
                _ => (), // flag entries and keys the conversion does not use
            }
        }

        let ac = ac.ok_or_else(|| anyhow::anyhow!("INFO lacks required field AC"))?;
        let an = an.ok_or_else(|| anyhow::anyhow!("INFO lacks required field AN"))?;
        let af = af.ok_or_else(|| anyhow::anyhow!("INFO lacks required field AF"))?;

        Ok((ac, an, af, annotations))
    }
}

/// Iterator over the rows of a `VcfReader`.
pub struct Rows<'r, R: BufRead> {
    reader: &'r mut VcfReader<R>,
}

impl<'r, R: BufRead> Iterator for Rows<'r, R> {
    type Item = Result<VcfRow, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_row().transpose()
    }
}

/// Consume the first value of a possibly comma-separated INFO value.
///
/// For `Number=A` fields this is the value of the first alternate allele,
/// consistent with keying multi-allelic sites by their first allele only.
fn parse_info_scalar<T>(key: &str, value: &str) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let first = value.split(',').next().unwrap_or(value);
    first
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid INFO/{} value {:?}: {}", key, first, e))
}

/// Decode one sample column against the row's `FORMAT` keys.
///
/// Trailing fields may be dropped from the sample column; a `.` value means
/// the field is absent for this sample.
fn parse_call(
    sample_index: usize,
    format_keys: &[&str],
    raw: &str,
) -> Result<GenotypeCall, anyhow::Error> {
    let mut call = GenotypeCall {
        sample_index,
        gt: ".".to_string(),
        ..Default::default()
    };

    for (key, value) in format_keys.iter().zip(raw.split(':')) {
        if value == "." {
            continue;
        }
        match *key {
            "GT" => call.gt = value.to_string(),
            "GQ" => {
                call.gq = Some(value.parse::<i32>().map_err(|e| {
                    anyhow::anyhow!("sample {}: invalid GQ value {:?}: {}", sample_index, value, e)
                })?)
            }
            "DP" => {
                call.dp = Some(value.parse::<i32>().map_err(|e| {
                    anyhow::anyhow!("sample {}: invalid DP value {:?}: {}", sample_index, value, e)
                })?)
            }
            "AD" => {
                call.ad = Some(
                    value
                        .split(',')
                        .map(|depth| {
                            depth.parse::<i32>().map_err(|e| {
                                anyhow::anyhow!(
                                    "sample {}: invalid AD value {:?}: {}",
                                    sample_index,
                                    value,
                                    e
                                )
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
            _ => (),
        }
    }

    Ok(call)
}
