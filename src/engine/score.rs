// Two-pass composite scoring: collect → normalize across the population → rank

use crate::config::ScoreWeights;
use crate::engine::ScoredSpread;

/// Min-max normalization over the population. A degenerate axis
/// (max == min, e.g. a single-spread population) normalizes to 1.0, so a
/// lone spread scores exactly the sum of the weights before volume
/// dampening.
fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span <= f64::EPSILON {
        1.0
    } else {
        (value - min) / span
    }
}

/// Assign composite scores and sort descending. Probability counts
/// directly; VaR, Expected Shortfall and illiquidity are inverted so
/// smaller magnitudes score higher. The volume damper 1 + ln(1 + volume)
/// rewards tradable size. Ties break on raw probability, then credit, so
/// the order is a total order.
pub fn rank(mut population: Vec<ScoredSpread>, weights: &ScoreWeights) -> Vec<ScoredSpread> {
    if population.is_empty() {
        return population;
    }

    let prob: Vec<f64> = population.iter().map(|s| s.probability.average()).collect();
    let var: Vec<f64> = population.iter().map(|s| s.var95.abs()).collect();
    let es: Vec<f64> = population
        .iter()
        .map(|s| s.expected_shortfall.abs())
        .collect();
    let liq: Vec<f64> = population.iter().map(|s| s.liquidity).collect();

    let bounds = |xs: &[f64]| -> (f64, f64) {
        let min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    };
    let (prob_min, prob_max) = bounds(&prob);
    let (var_min, var_max) = bounds(&var);
    let (es_min, es_max) = bounds(&es);
    let (liq_min, liq_max) = bounds(&liq);

    for (i, scored) in population.iter_mut().enumerate() {
        let prob_hat = normalize(prob[i], prob_min, prob_max);
        // Inverted: smaller tail risk / tighter quotes are better
        let var_hat = invert(normalize(var[i], var_min, var_max), var_min, var_max);
        let es_hat = invert(normalize(es[i], es_min, es_max), es_min, es_max);
        let liq_hat = invert(normalize(liq[i], liq_min, liq_max), liq_min, liq_max);

        let base = weights.probability * prob_hat
            + weights.var * var_hat
            + weights.es * es_hat
            + weights.liquidity * liq_hat;
        let damper = 1.0 + (1.0 + scored.volume as f64).ln();
        scored.composite_score = base * damper;
    }

    population.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.probability
                    .average()
                    .partial_cmp(&a.probability.average())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                b.spread
                    .credit
                    .partial_cmp(&a.spread.credit)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    population
}

/// Flip a normalized value unless the axis was degenerate (where the
/// normalization already returned the neutral 1.0).
fn invert(normalized: f64, min: f64, max: f64) -> f64 {
    if (max - min) <= f64::EPSILON {
        normalized
    } else {
        1.0 - normalized
    }
}
