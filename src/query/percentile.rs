/// Continuous median: the linear-interpolation percentile at 0.5.
///
/// Odd counts take the middle sorted value; even counts take the mean of
/// the two central values. An empty input has no median.
pub fn continuous_median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_count() {
        assert_eq!(continuous_median(vec![1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_even_count_interpolates() {
        assert_eq!(continuous_median(vec![1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(continuous_median(Vec::new()), None);
    }

    #[test]
    fn test_singleton() {
        assert_eq!(continuous_median(vec![16.0]), Some(16.0));
    }

    #[test]
    fn test_unsorted_input() {
        assert_eq!(continuous_median(vec![3.0, 1.0, 2.0, 4.0]), Some(2.5));
    }

    #[test]
    fn test_two_values() {
        assert_eq!(continuous_median(vec![10.0, 20.0]), Some(15.0));
    }
}
