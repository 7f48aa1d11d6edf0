//! Selection of supporting samples for one variant.

use itertools::Itertools;

use crate::common::Genotype;

use super::output::SampleSummary;
use super::vcf::GenotypeCall;

/// Append the supporting samples of one input row to `samples`.
///
/// Candidates are the row's het. and hom. alt. calls, considered ascending by
/// GQ with an absent GQ counting as 0 -- the lowest-confidence calls fill the
/// quota first.  This mirrors the selection the portal has always shipped and
/// is kept as observed behavior.  A candidate is accepted while fewer than
/// `max_per_genotype` already accepted entries share its exact GT value; the
/// rest is discarded.
///
/// The sort is stable, so calls with equal GQ keep their input order and the
/// whole selection is deterministic.
pub fn extend_samples(
    samples: &mut Vec<SampleSummary>,
    calls: &[GenotypeCall],
    max_per_genotype: usize,
) -> Result<(), anyhow::Error> {
    for call in calls.iter().sorted_by_key(|call| call.gq.unwrap_or(0)) {
        let genotype: Genotype = call.gt.parse()?;
        if !matches!(genotype, Genotype::Het | Genotype::HomAlt) {
            continue;
        }

        if samples.iter().filter(|sample| sample.gt == call.gt).count() >= max_per_genotype {
            continue;
        }

        let summary = summarize(samples.len(), call)?;
        samples.push(summary);
    }

    Ok(())
}

/// Compute the derived per-sample statistics for an accepted candidate.
///
/// Accepted candidates must carry read depths; discarded ones are never
/// touched, so files with depth-less no-calls still convert.
fn summarize(sample_id: usize, call: &GenotypeCall) -> Result<SampleSummary, anyhow::Error> {
    let ad = call.ad.as_ref().ok_or_else(|| {
        anyhow::anyhow!("sample {} retained but has no AD values", call.sample_index)
    })?;
    let dp = call.dp.ok_or_else(|| {
        anyhow::anyhow!("sample {} retained but has no DP value", call.sample_index)
    })?;
    let ad_ref = *ad.first().ok_or_else(|| {
        anyhow::anyhow!("sample {} retained but has empty AD", call.sample_index)
    })?;
    let ad_alt = ad.iter().skip(1).sum::<i32>();
    let ab = if dp > 0 {
        f64::from(ad_alt) / f64::from(dp)
    } else {
        f64::NAN
    };

    Ok(SampleSummary::new(
        sample_id,
        call.gt.clone(),
        dp,
        call.gq,
        ad_ref,
        ad_alt,
        ab,
    ))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::seqvars::convert::vcf::GenotypeCall;

    fn call(sample_index: usize, gt: &str, gq: Option<i32>) -> GenotypeCall {
        GenotypeCall {
            sample_index,
            gt: gt.into(),
            gq,
            dp: Some(20),
            ad: Some(vec![12, 8]),
        }
    }

    #[test]
    fn only_het_and_hom_alt_calls_are_candidates() -> Result<(), anyhow::Error> {
        let calls = vec![
            call(0, "0/0", Some(10)),
            call(1, "./.", Some(10)),
            call(2, "0/1", Some(10)),
            call(3, "1/1", Some(10)),
            call(4, "1/2", Some(10)),
        ];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 5)?;

        assert_eq!(
            vec!["0/1".to_string(), "1/1".to_string()],
            samples.iter().map(|s| s.gt.clone()).collect::<Vec<_>>()
        );

        Ok(())
    }

    #[test]
    fn quota_applies_per_distinct_genotype() -> Result<(), anyhow::Error> {
        let mut calls = (0..7).map(|i| call(i, "0/1", Some(10))).collect::<Vec<_>>();
        calls.extend((7..10).map(|i| call(i, "1/1", Some(10))));

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 5)?;

        assert_eq!(5, samples.iter().filter(|s| s.gt == "0/1").count());
        assert_eq!(3, samples.iter().filter(|s| s.gt == "1/1").count());

        Ok(())
    }

    #[test]
    fn lowest_quality_calls_fill_the_quota_first() -> Result<(), anyhow::Error> {
        let calls = [10, 20, 30, 40, 50]
            .iter()
            .enumerate()
            .map(|(i, gq)| call(i, "0/1", Some(*gq)))
            .collect::<Vec<_>>();

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 2)?;

        assert_eq!(
            vec![Some(10), Some(20)],
            samples.iter().map(|s| s.gq).collect::<Vec<_>>()
        );

        Ok(())
    }

    #[test]
    fn absent_quality_sorts_lowest() -> Result<(), anyhow::Error> {
        let calls = vec![call(0, "0/1", Some(5)), call(1, "0/1", None)];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 1)?;

        assert_eq!(vec![None], samples.iter().map(|s| s.gq).collect::<Vec<_>>());

        Ok(())
    }

    #[test]
    fn equal_quality_calls_keep_input_order() -> Result<(), anyhow::Error> {
        let calls = vec![
            call(7, "0/1", Some(10)),
            call(3, "0/1", Some(10)),
            call(5, "0/1", Some(10)),
        ];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 2)?;

        // `sample_id` reflects insertion order, not the input column order.
        assert_eq!(vec![0, 1], samples.iter().map(|s| s.sample_id).collect::<Vec<_>>());
        assert_eq!(2, samples.len());

        Ok(())
    }

    #[test]
    fn sample_ids_stay_contiguous_across_rows() -> Result<(), anyhow::Error> {
        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &[call(0, "0/1", Some(10))], 5)?;
        super::extend_samples(
            &mut samples,
            &[call(0, "1/1", Some(20)), call(1, "0/1", Some(30))],
            5,
        )?;

        assert_eq!(
            vec![0, 1, 2],
            samples.iter().map(|s| s.sample_id).collect::<Vec<_>>()
        );

        Ok(())
    }

    #[test]
    fn quota_also_spans_rows() -> Result<(), anyhow::Error> {
        let mut samples = Vec::new();
        super::extend_samples(
            &mut samples,
            &(0..4).map(|i| call(i, "0/1", Some(10))).collect::<Vec<_>>(),
            5,
        )?;
        super::extend_samples(
            &mut samples,
            &(0..4).map(|i| call(i, "0/1", Some(10))).collect::<Vec<_>>(),
            5,
        )?;

        assert_eq!(5, samples.len());

        Ok(())
    }

    #[test]
    fn derived_depth_statistics() -> Result<(), anyhow::Error> {
        let calls = vec![GenotypeCall {
            sample_index: 0,
            gt: "0/1".into(),
            gq: Some(50),
            dp: Some(20),
            ad: Some(vec![12, 0, 8]),
        }];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 5)?;

        let sample = &samples[0];
        assert_eq!((12, 8, 20), (sample.ad_ref, sample.ad_alt, sample.dp));
        assert!(float_cmp::approx_eq!(f64, 0.4, sample.ab, ulps = 2));

        Ok(())
    }

    #[test]
    fn zero_depth_yields_nan_allele_balance() -> Result<(), anyhow::Error> {
        let calls = vec![GenotypeCall {
            sample_index: 0,
            gt: "0/1".into(),
            gq: Some(50),
            dp: Some(0),
            ad: Some(vec![0, 0]),
        }];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 5)?;

        assert!(samples[0].ab.is_nan());

        Ok(())
    }

    #[test]
    fn retained_call_without_depths_is_an_error() {
        let calls = vec![GenotypeCall {
            sample_index: 3,
            gt: "0/1".into(),
            gq: Some(50),
            dp: None,
            ad: Some(vec![12, 8]),
        }];

        let mut samples = Vec::new();
        let res = super::extend_samples(&mut samples, &calls, 5);

        assert!(res.is_err());
        assert!(res.err().unwrap().to_string().contains("no DP value"));
    }

    #[test]
    fn discarded_calls_never_need_depths() -> Result<(), anyhow::Error> {
        // A hom.-ref. call without any depth fields must not trip the
        // conversion, and neither must a candidate discarded by the quota.
        let calls = vec![
            GenotypeCall {
                sample_index: 0,
                gt: "0/0".into(),
                ..Default::default()
            },
            call(1, "0/1", Some(10)),
            GenotypeCall {
                sample_index: 2,
                gt: "0/1".into(),
                gq: Some(99),
                dp: None,
                ad: None,
            },
        ];

        let mut samples = Vec::new();
        super::extend_samples(&mut samples, &calls, 1)?;

        assert_eq!(1, samples.len());
        assert_eq!(Some(10), samples[0].gq);

        Ok(())
    }
}
