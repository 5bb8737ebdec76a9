//! Tukey HSD post-hoc comparisons.
//!
//! The studentized range distribution is evaluated with the Gauss-Legendre
//! scheme of Copenhaver & Holland (1988), as used by most statistics
//! packages; the critical value is found by bisection on the CDF.

use crate::error::{AnalyticsError, Result};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::{LN_2, PI};

/// One pairwise comparison. `mean_diff` is `mean(group2) - mean(group1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TukeyPair {
    pub group1: String,
    pub group2: String,
    pub mean_diff: f64,
    pub p_adj: f64,
    pub lower: f64,
    pub upper: f64,
    pub reject: bool,
}

/// All pairwise comparisons between `groups`, in input order.
#[allow(clippy::cast_precision_loss)]
pub fn tukey_hsd(groups: &[(String, Vec<f64>)], alpha: f64) -> Result<Vec<TukeyPair>> {
    let k = groups.len();
    let n: usize = groups.iter().map(|(_, v)| v.len()).sum();
    if k < 2 || groups.iter().any(|(_, v)| v.is_empty()) {
        return Err(AnalyticsError::InsufficientData(
            "Tukey HSD needs at least 2 non-empty groups".to_string(),
        ));
    }
    let df = n.saturating_sub(k);
    if df < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "Tukey HSD needs at least 2 residual degrees of freedom, got {df}"
        )));
    }

    let means: Vec<f64> = groups
        .iter()
        .map(|(_, v)| v.iter().sum::<f64>() / v.len() as f64)
        .collect();
    let ss_within: f64 = groups
        .iter()
        .zip(&means)
        .map(|((_, v), m)| v.iter().map(|x| (x - m).powi(2)).sum::<f64>())
        .sum();
    let mse = ss_within / df as f64;

    let q_crit = qtukey(1.0 - alpha, k as f64, df as f64)?;

    let mut pairs = Vec::with_capacity(k * (k - 1) / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let (ni, nj) = (groups[i].1.len() as f64, groups[j].1.len() as f64);
            let se = (mse / 2.0 * (1.0 / ni + 1.0 / nj)).sqrt();
            let diff = means[j] - means[i];

            let p_adj = if se == 0.0 {
                if diff == 0.0 { 1.0 } else { 0.0 }
            } else {
                (1.0 - ptukey(diff.abs() / se, k as f64, df as f64)?).clamp(0.0, 1.0)
            };
            let half_width = q_crit * se;

            pairs.push(TukeyPair {
                group1: groups[i].0.clone(),
                group2: groups[j].0.clone(),
                mean_diff: diff,
                p_adj,
                lower: diff - half_width,
                upper: diff + half_width,
                reject: p_adj < alpha,
            });
        }
    }
    Ok(pairs)
}

// =============================================================================
// STUDENTIZED RANGE DISTRIBUTION
// =============================================================================

/// Probability integral of the range for `cc` normal means (one range).
fn wprob(w: f64, rr: f64, cc: f64, normal: &Normal) -> f64 {
    const NLEG: usize = 12;
    const IHALF: usize = 6;
    const C1: f64 = -30.0;
    const C2: f64 = -50.0;
    const C3: f64 = 60.0;
    const BB: f64 = 8.0;
    const WLAR: f64 = 3.0;
    const WINCR1: f64 = 2.0;
    const WINCR2: f64 = 3.0;
    const XLEG: [f64; IHALF] = [
        0.981_560_634_246_719_250_690_549_090_149,
        0.904_117_256_370_474_856_678_465_866_119,
        0.769_902_674_194_304_687_036_893_833_213,
        0.587_317_954_286_617_447_296_702_418_941,
        0.367_831_498_998_180_193_752_691_536_644,
        0.125_233_408_511_468_915_472_441_369_464,
    ];
    const ALEG: [f64; IHALF] = [
        0.047_175_336_386_511_827_194_615_961_485,
        0.106_939_325_995_318_430_960_254_718_194,
        0.160_078_328_543_346_226_334_652_529_543,
        0.203_167_426_723_065_921_749_064_455_810,
        0.233_492_536_538_354_808_760_849_898_925,
        0.249_147_045_813_402_785_000_562_436_043,
    ];

    let qsqz = w * 0.5;
    if qsqz >= BB {
        return 1.0;
    }

    let mut pr_w = 2.0f64.mul_add(normal.cdf(qsqz), -1.0);
    pr_w = if pr_w >= (C2 / cc).exp() {
        pr_w.powf(cc)
    } else {
        0.0
    };

    let wincr = if w > WLAR { WINCR1 } else { WINCR2 };
    let mut blb = qsqz;
    let binc = (BB - qsqz) / wincr;
    let mut bub = blb + binc;
    let mut einsum = 0.0;
    let cc1 = cc - 1.0;

    let mut wi = 1.0;
    while wi <= wincr {
        let mut elsum = 0.0;
        let a = 0.5 * (bub + blb);
        let b = 0.5 * (bub - blb);

        for jj in 1..=NLEG {
            let (j, xx) = if IHALF < jj {
                let j = NLEG - jj + 1;
                (j, XLEG[j - 1])
            } else {
                (jj, -XLEG[jj - 1])
            };
            let ac = b.mul_add(xx, a);
            let qexpo = ac * ac;
            if qexpo > C3 {
                break;
            }

            let pplus = 2.0 * normal.cdf(ac);
            let pminus = 2.0 * normal.cdf(ac - w);
            let rinsum = pplus.mul_add(0.5, -(pminus * 0.5));
            if rinsum >= (C1 / cc1).exp() {
                elsum += ALEG[j - 1] * (-(0.5 * qexpo)).exp() * rinsum.powf(cc1);
            }
        }
        elsum *= ((2.0 * b) * cc) / (2.0 * PI).sqrt();
        einsum += elsum;
        blb = bub;
        bub += binc;
        wi += 1.0;
    }

    pr_w += einsum;
    if pr_w <= (C1 / rr).exp() {
        return 0.0;
    }
    pr_w = pr_w.powf(rr);
    pr_w.min(1.0)
}

/// CDF of the studentized range for `cc` groups and `df` degrees of freedom.
pub fn ptukey(q: f64, cc: f64, df: f64) -> Result<f64> {
    const NLEGQ: usize = 16;
    const IHALFQ: usize = 8;
    const EPS1: f64 = -30.0;
    const EPS2: f64 = 1.0e-14;
    const DHAF: f64 = 100.0;
    const DQUAR: f64 = 800.0;
    const DEIGH: f64 = 5000.0;
    const DLARG: f64 = 25000.0;
    const XLEGQ: [f64; IHALFQ] = [
        0.989_400_934_991_649_932_596_154_173_450,
        0.944_575_023_073_232_576_077_988_415_535,
        0.865_631_202_387_831_743_880_467_897_712,
        0.755_404_408_355_003_033_895_101_194_847,
        0.617_876_244_402_643_748_446_671_764_049,
        0.458_016_777_657_227_386_342_419_442_984,
        0.281_603_550_779_258_913_230_460_501_460,
        0.950_125_098_376_374_401_853_193_354_250e-1,
    ];
    const ALEGQ: [f64; IHALFQ] = [
        0.271_524_594_117_540_948_517_805_724_560e-1,
        0.622_535_239_386_478_928_628_438_369_944e-1,
        0.951_585_116_824_927_848_099_251_076_022e-1,
        0.124_628_971_255_533_872_052_476_282_192,
        0.149_595_988_816_576_732_081_501_730_547,
        0.169_156_519_395_002_538_189_312_079_030,
        0.182_603_415_044_923_588_866_763_667_969,
        0.189_450_610_455_068_496_285_396_723_208,
    ];
    let rr = 1.0;

    if df < 2.0 || cc < 2.0 {
        return Err(AnalyticsError::Statistics(format!(
            "studentized range undefined for {cc} groups and {df} degrees of freedom"
        )));
    }
    if q <= 0.0 {
        return Ok(0.0);
    }
    if !q.is_finite() {
        return Ok(1.0);
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::Statistics(e.to_string()))?;
    if df > DLARG {
        return Ok(wprob(q, rr, cc, &normal));
    }

    let f2 = df * 0.5;
    let mut f2lf = f2.mul_add(df.ln(), -(df * LN_2)) - ln_gamma(f2);
    let f21 = f2 - 1.0;
    let ff4 = df * 0.25;
    let ulen: f64 = if df <= DHAF {
        1.0
    } else if df <= DQUAR {
        0.5
    } else if df <= DEIGH {
        0.25
    } else {
        0.125
    };
    f2lf += ulen.ln();

    let mut ans = 0.0;
    for i in 1..=50u32 {
        let mut otsum = 0.0;
        let twa1 = f64::from(2 * i - 1) * ulen;

        for jj in 1..=NLEGQ {
            let (j, t1) = if IHALFQ < jj {
                let j = jj - IHALFQ - 1;
                let t1 = f21.mul_add(XLEGQ[j].mul_add(ulen, twa1).ln(), f2lf)
                    - XLEGQ[j].mul_add(ulen, twa1) * ff4;
                (j, t1)
            } else {
                let j = jj - 1;
                let t1 = f21.mul_add((-XLEGQ[j]).mul_add(ulen, twa1).ln(), f2lf)
                    + XLEGQ[j].mul_add(ulen, -twa1) * ff4;
                (j, t1)
            };

            if t1 >= EPS1 {
                let qsqz = if IHALFQ < jj {
                    q * (XLEGQ[j].mul_add(ulen, twa1) * 0.5).sqrt()
                } else {
                    q * ((-XLEGQ[j]).mul_add(ulen, twa1) * 0.5).sqrt()
                };
                let wprb = wprob(qsqz, rr, cc, &normal);
                otsum += wprb * ALEGQ[j] * t1.exp();
            }
        }

        if f64::from(i) * ulen >= 1.0 && otsum <= EPS2 {
            break;
        }
        ans += otsum;
    }

    Ok(ans.min(1.0))
}

/// Quantile of the studentized range by bisection.
pub fn qtukey(p: f64, cc: f64, df: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&p) {
        return Err(AnalyticsError::Statistics(format!(
            "studentized range quantile needs 0 <= p < 1, got {p}"
        )));
    }
    let mut lo = 0.0;
    let mut hi = 1.0;
    while ptukey(hi, cc, df)? < p {
        hi *= 2.0;
        if hi > 1.0e4 {
            return Err(AnalyticsError::Statistics(
                "studentized range quantile did not bracket".to_string(),
            ));
        }
    }
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if ptukey(mid, cc, df)? < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-10 {
            break;
        }
    }
    Ok(0.5 * (lo + hi))
}
