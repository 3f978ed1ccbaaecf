/// Squared Euclidean distance. Callers guarantee equal lengths.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
  debug_assert_eq!(a.len(), b.len());
  a.iter()
    .zip(b)
    .map(|(x, y)| {
      let d = x - y;
      d * d
    })
    .sum()
}
