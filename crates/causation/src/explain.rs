//! Plain-language rendering of correlation results for summaries.

use crate::correlation::{CorrelationDirection, CorrelationResult};

fn months(count: u32) -> String {
    if count == 1 {
        "1 month".to_string()
    } else {
        format!("{count} months")
    }
}

/// Deterministic one-paragraph explanation of a correlation result.
///
/// Only association is described; the wording never claims that one metric
/// causes the other.
pub fn get_correlation_explanation(result: &CorrelationResult) -> String {
    let a = &result.metric_a.name;
    let b = &result.metric_b.name;
    let sample = months(result.shared_months as u32);

    if result.low_confidence {
        return format!(
            "The relationship between {a} and {b} could not be measured reliably: \
             one of them did not change across the {sample} of shared data."
        );
    }

    let direction = match result.direction {
        CorrelationDirection::Positive => "positive",
        CorrelationDirection::Negative => "negative",
        CorrelationDirection::None => {
            return format!(
                "{a} and {b} show no measurable correlation \
                 (r = 0.00, {sample} of data)."
            );
        }
    };
    let summary = format!(
        "{} {direction} correlation (r = {:.2}, p = {:.3}, {sample} of data)",
        result.strength, result.coefficient, result.p_value,
    );

    if result.lag == 0 {
        let movement = if result.direction == CorrelationDirection::Positive {
            "they tend to rise and fall together in the same month".to_string()
        } else {
            format!("when {a} rises, {b} tends to fall in the same month")
        };
        return format!("{a} and {b} show a {summary}: {movement}.");
    }

    let (leader, follower) = if result.lag > 0 { (a, b) } else { (b, a) };
    let lead = months(result.lag.unsigned_abs());
    let change = if result.direction == CorrelationDirection::Positive {
        "changes in the same direction"
    } else {
        "opposite changes"
    };

    format!(
        "{leader} leads {follower} by {lead} with a {summary}: \
         changes in {leader} tend to be followed by {change} in {follower} {lead} later."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationStrength;
    use metricflow_core::types::MetricRef;

    fn metric(id: &str, name: &str) -> MetricRef {
        MetricRef {
            id: id.to_string(),
            name: name.to_string(),
            source: "test".to_string(),
        }
    }

    fn result(r: f64, lag: i32) -> CorrelationResult {
        CorrelationResult {
            metric_a: metric("ads", "Ad Spend"),
            metric_b: metric("rev", "Revenue"),
            coefficient: r,
            lag,
            strength: crate::correlation::classify_strength(r),
            direction: if r > 0.0 {
                CorrelationDirection::Positive
            } else {
                CorrelationDirection::Negative
            },
            shared_months: 12,
            p_value: 0.004,
            low_confidence: false,
        }
    }

    #[test]
    fn test_same_month_positive() {
        let text = get_correlation_explanation(&result(0.82, 0));
        assert_eq!(
            text,
            "Ad Spend and Revenue show a strong positive correlation \
             (r = 0.82, p = 0.004, 12 months of data): \
             they tend to rise and fall together in the same month."
        );
    }

    #[test]
    fn test_leading_metric() {
        let text = get_correlation_explanation(&result(0.55, 2));
        assert!(text.starts_with("Ad Spend leads Revenue by 2 months with a moderate positive"));
        assert!(text.contains("Revenue 2 months later"));
    }

    #[test]
    fn test_negative_lag_swaps_leader() {
        let text = get_correlation_explanation(&result(-0.75, -1));
        assert!(text.starts_with("Revenue leads Ad Spend by 1 month with a strong negative"));
        assert!(text.contains("opposite changes in Ad Spend"));
    }

    #[test]
    fn test_low_confidence() {
        let mut r = result(0.0, 0);
        r.low_confidence = true;
        r.strength = CorrelationStrength::Weak;
        r.direction = CorrelationDirection::None;
        let text = get_correlation_explanation(&r);
        assert!(text.contains("could not be measured reliably"));
    }

    #[test]
    fn test_deterministic() {
        let r = result(0.42, 3);
        assert_eq!(get_correlation_explanation(&r), get_correlation_explanation(&r));
    }
}
