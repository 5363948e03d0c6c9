use ndarray::ArrayView1;
use crate::error::{SurvivalError, Result};

/// Harrell's C-index with tie handling - how often does higher risk mean shorter survival?
pub fn harrell_c_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != times.len() || n != events.len() {
        return Err(SurvivalError::invalid_dimensions(
            "risk scores, times, and events must have same length",
        ));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    let mut tied_risk = 0.0;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs can't anchor a pair
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j is comparable to i if j outlived i
            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] < risk_scores[j] {
                    discordant += 1.0;
                } else {
                    tied_risk += 1.0;
                }
            }
        }
    }

    let total_pairs = concordant + discordant + tied_risk;
    if total_pairs == 0.0 {
        return Err(SurvivalError::numerical_error(
            "no comparable pairs for C-index calculation",
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / total_pairs)
}

/// round to `digits` significant digits, the way R's signif() reports p-values
pub fn signif(x: f64, digits: i32) -> f64 {
    if x == 0.0 || !x.is_finite() || digits <= 0 {
        return x;
    }

    let magnitude = x.abs().log10().floor() as i32;
    let shift = digits - 1 - magnitude;
    if shift >= 0 {
        let factor = 10f64.powi(shift);
        (x * factor).round() / factor
    } else {
        let factor = 10f64.powi(-shift);
        (x / factor).round() * factor
    }
}
