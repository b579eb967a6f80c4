/// Stride decimation of dense routes.
use log::debug;

/// Reduce `points` to at most `max_count` entries by fixed-stride selection.
///
/// Sequences of up to `threshold` points come back unchanged. Longer ones keep
/// every Nth point with `N = ceil(len / max_count)`, starting at index 0. The
/// final point is always kept: it is appended when the stride misses it, or
/// replaces the last stride pick when the output is already full.
pub fn resample<T: Clone>(points: &[T], threshold: usize, max_count: usize) -> Vec<T> {
    let len = points.len();
    if len <= threshold || len <= max_count.max(1) {
        return points.to_vec();
    }
    let max_count = max_count.max(2);

    let stride = len.div_ceil(max_count);
    let mut indices: Vec<usize> = (0..len).step_by(stride).collect();

    let last = len - 1;
    if indices.last() != Some(&last) {
        if indices.len() < max_count {
            indices.push(last);
        } else if let Some(tail) = indices.last_mut() {
            *tail = last;
        }
    }

    debug!("Resampled {} points to {} (stride {})", len, indices.len(), stride);
    indices.into_iter().map(|i| points[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_unchanged() {
        let points: Vec<usize> = (0..450).collect();
        assert_eq!(resample(&points, 500, 500), points);
    }

    #[test]
    fn test_bound_and_endpoints() {
        for len in [501, 999, 1000, 1001, 2345, 10_000] {
            let points: Vec<usize> = (0..len).collect();
            let out = resample(&points, 500, 400);
            assert!(out.len() <= 400, "len {} gave {}", len, out.len());
            assert_eq!(out[0], 0);
            assert_eq!(*out.last().unwrap(), len - 1);
            assert!(out.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_uniform_stride() {
        let points: Vec<usize> = (0..1201).collect();
        let out = resample(&points, 600, 600);
        // stride 3: 0, 3, ..., 1200 lands exactly on the last index
        assert_eq!(out.len(), 401);
        assert!(out.windows(2).all(|w| w[1] - w[0] == 3));
    }

    #[test]
    fn test_last_point_replaces_final_pick_when_full() {
        let points: Vec<usize> = (0..10).collect();
        // stride 2 gives 0,2,4,6,8 which already fills max_count
        let out = resample(&points, 5, 5);
        assert_eq!(out, vec![0, 2, 4, 6, 9]);
    }

    #[test]
    fn test_deterministic() {
        let points: Vec<f64> = (0..5000).map(|i| i as f64 * 0.5).collect();
        assert_eq!(resample(&points, 500, 500), resample(&points, 500, 500));
    }
}
