/// Scale `values` to unit L2 length in place.
///
/// The squared norm accumulates in f64 so wide vectors don't lose
/// precision to cancellation; a zero norm leaves the vector untouched.
pub(crate) fn l2_normalize_in_place(values: &mut [f32]) {
    let norm_sq = values
        .iter()
        .fold(0.0_f64, |acc, &x| acc + f64::from(x) * f64::from(x));
    if norm_sq == 0.0 {
        return;
    }
    let scale = (1.0 / norm_sq.sqrt()) as f32;
    for value in values.iter_mut() {
        *value *= scale;
    }
}
