//! Windowed median filtering.

/// Apply a centered median filter with an odd `window` to `data`.
///
/// Near the edges the window is truncated to the available samples, so the
/// output always has the same length as the input and the edge values are
/// not dragged toward zero.
///
/// # Panics
///
/// Panics if `window` is even or zero.
pub fn median_filter(data: &[f64], window: usize) -> Vec<f64> {
    assert!(window % 2 == 1, "median filter window must be odd");

    if data.is_empty() || window == 1 {
        return data.to_vec();
    }

    let half = window / 2;
    let mut scratch = Vec::with_capacity(window);
    let mut out = Vec::with_capacity(data.len());

    for i in 0..data.len() {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(data.len());

        scratch.clear();
        scratch.extend_from_slice(&data[lo..hi]);
        scratch.sort_by(|a, b| a.total_cmp(b));

        out.push(scratch[scratch.len() / 2]);
    }

    out
}
