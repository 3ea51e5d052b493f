//! Shape-preserving (PCHIP) resampling of plotted curves.
//!
//! Monotone piecewise-cubic Hermite interpolation with Fritsch-Carlson
//! slopes: the curve never overshoots the samples, so drawn extremes match
//! the evaluated ones.

/// Sorts by time and drops repeated timestamps (first sample wins).
pub fn prepare_samples(samples: impl IntoIterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
    let mut points = samples
        .into_iter()
        .filter(|(t, v)| t.is_finite() && v.is_finite())
        .collect::<Vec<(f64, f64)>>();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.dedup_by(|later, earlier| later.0 == earlier.0);
    points
}

/// Resamples `points` (strictly increasing in time) at `count` evenly
/// spaced times across their own span. With fewer than three points, or a
/// `count` of 0, the points are returned as given.
pub fn pchip_resample(points: &[(f64, f64)], count: usize) -> Vec<(f64, f64)> {
    if count < 2 || points.len() < 3 {
        return points.to_vec();
    }

    let xs = points.iter().map(|p| p.0).collect::<Vec<f64>>();
    let ys = points.iter().map(|p| p.1).collect::<Vec<f64>>();
    let slopes = pchip_slopes(&xs, &ys);

    let first = xs[0];
    let last = xs[xs.len() - 1];
    let step = (last - first) / (count - 1) as f64;

    let mut segment = 0;
    let mut resampled = Vec::with_capacity(count);
    for i in 0..count {
        let x = if i == count - 1 { last } else { first + step * i as f64 };
        while segment + 2 < xs.len() && x > xs[segment + 1] {
            segment += 1;
        }
        resampled.push((x, hermite(&xs, &ys, &slopes, segment, x)));
    }
    resampled
}

fn hermite(xs: &[f64], ys: &[f64], slopes: &[f64], k: usize, x: f64) -> f64 {
    let h = xs[k + 1] - xs[k];
    let t = (x - xs[k]) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * ys[k] + h10 * h * slopes[k] + h01 * ys[k + 1] + h11 * h * slopes[k + 1]
}

fn pchip_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h = (0..n - 1).map(|k| xs[k + 1] - xs[k]).collect::<Vec<f64>>();
    let delta = (0..n - 1)
        .map(|k| (ys[k + 1] - ys[k]) / h[k])
        .collect::<Vec<f64>>();

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (left, right) = (delta[k - 1], delta[k]);
        if left == 0.0 || right == 0.0 || left.signum() != right.signum() {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / left + w2 / right);
    }

    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point estimate, clamped to stay shape-preserving.
fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_sorts_and_drops_repeated_times() {
        let points = prepare_samples(vec![(2.0, 5.0), (0.0, 1.0), (2.0, 9.0), (1.0, f64::NAN)]);
        assert_eq!(points, vec![(0.0, 1.0), (2.0, 5.0)]);
    }

    #[test]
    fn short_inputs_pass_through() {
        let points = vec![(0.0, 1.0), (1.0, 3.0)];
        assert_eq!(pchip_resample(&points, 100), points);
        let three = vec![(0.0, 1.0), (1.0, 3.0), (2.0, 2.0)];
        assert_eq!(pchip_resample(&three, 0), three);
    }

    #[test]
    fn resample_hits_endpoints_and_knots() {
        let points = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0), (4.0, 16.0)];
        let resampled = pchip_resample(&points, 9);

        assert_eq!(resampled.len(), 9);
        assert_eq!(resampled[0], (0.0, 0.0));
        assert_eq!(resampled[8], (4.0, 16.0));
        assert!((resampled[4].1 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn resample_never_overshoots_the_data() {
        let points = vec![
            (0.0, 10.0),
            (1.0, 10.0),
            (2.0, 45.0),
            (3.0, 45.0),
            (4.0, 12.0),
            (5.0, 30.0),
        ];
        let resampled = pchip_resample(&points, 501);

        let lo = resampled.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let hi = resampled.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        assert!(lo >= 10.0 - 1e-9, "undershoot: {lo}");
        assert!(hi <= 45.0 + 1e-9, "overshoot: {hi}");
    }

    #[test]
    fn monotone_data_stays_monotone() {
        let points = vec![(0.0, 0.0), (1.0, 0.1), (1.5, 5.0), (4.0, 5.2), (6.0, 20.0)];
        let resampled = pchip_resample(&points, 400);
        assert!(resampled.windows(2).all(|pair| pair[1].1 >= pair[0].1 - 1e-12));
    }
}
