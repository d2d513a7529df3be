/// `(a - b) / b * 100`, or `None` when `b` is zero or the result is not finite.
pub fn percent_lift(a: f64, b: f64) -> Option<f64> {
    if b == 0.0 {
        return None;
    }
    let lift = (a - b) / b * 100.0;
    lift.is_finite().then_some(lift)
}

/// `part / whole * 100`, guarded the same way as [`percent_lift`].
pub fn percent_share(part: f64, whole: f64) -> Option<f64> {
    ratio(part, whole).map(|value| value * 100.0)
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}
