// Tests for log-normal scoring

use pagesim_core::error::ScoringError;
use pagesim_core::metrics::Metric;
use pagesim_core::scoring::{FormFactor, ScoreCurve, log_normal_score};

fn create_test_curve() -> ScoreCurve {
    ScoreCurve::new(1800.0, 3000.0).unwrap()
}

// ============================================================================
// Calibration Tests
// ============================================================================

#[test]
fn test_median_scores_one_half() {
    let curve = create_test_curve();
    assert_eq!(curve.score(3000.0).unwrap(), 0.5);
}

#[test]
fn test_p10_scores_nine_tenths() {
    let curve = create_test_curve();
    assert_eq!(curve.score(1800.0).unwrap(), 0.9);
}

#[test]
fn test_non_positive_value_scores_one() {
    let curve = create_test_curve();
    assert_eq!(curve.score(0.0).unwrap(), 1.0);
    assert_eq!(curve.score(-50.0).unwrap(), 1.0);
}

#[test]
fn test_score_is_non_increasing() {
    let curve = create_test_curve();
    let mut previous = 1.0;
    for value in (0..=40).map(|i| i as f64 * 250.0) {
        let score = curve.score(value).unwrap();
        assert!(score <= previous, "score rose at {}", value);
        assert!((0.0..=1.0).contains(&score));
        previous = score;
    }
}

#[test]
fn test_score_bands_are_clamped() {
    let curve = create_test_curve();

    assert!(curve.score(1000.0).unwrap() >= 0.9);
    let between = curve.score(2400.0).unwrap();
    assert!(between >= 0.5 && between < 0.9);
    assert!(curve.score(3001.0).unwrap() < 0.5);
    assert!(curve.score(1_000_000.0).unwrap() < 0.01);
}

#[test]
fn test_free_function_matches_method() {
    let curve = create_test_curve();
    assert_eq!(
        log_normal_score(&curve, 2500.0).unwrap(),
        curve.score(2500.0).unwrap()
    );
}

// ============================================================================
// Curve Validation Tests
// ============================================================================

#[test]
fn test_non_positive_median_rejected() {
    assert_eq!(
        ScoreCurve::new(100.0, 0.0),
        Err(ScoringError::InvalidMedian(0.0))
    );
}

#[test]
fn test_non_positive_p10_rejected() {
    assert_eq!(
        ScoreCurve::new(-1.0, 100.0),
        Err(ScoringError::InvalidP10(-1.0))
    );
}

#[test]
fn test_p10_must_be_below_median() {
    assert_eq!(
        ScoreCurve::new(3000.0, 3000.0),
        Err(ScoringError::P10NotBelowMedian {
            p10: 3000.0,
            median: 3000.0
        })
    );
}

#[test]
fn test_invalid_curve_rejected_when_scoring() {
    let curve = ScoreCurve {
        p10: 5000.0,
        median: 3000.0,
    };
    assert!(log_normal_score(&curve, 1000.0).is_err());
}

// ============================================================================
// Default Curve Tests
// ============================================================================

#[test]
fn test_default_mobile_fcp_curve() {
    let curve = Metric::FirstContentfulPaint.default_curve(FormFactor::Mobile);
    assert_eq!(curve.p10, 1800.0);
    assert_eq!(curve.median, 3000.0);
}

#[test]
fn test_desktop_curves_are_stricter() {
    for metric in Metric::ALL {
        let mobile = metric.default_curve(FormFactor::Mobile);
        let desktop = metric.default_curve(FormFactor::Desktop);
        assert!(desktop.median <= mobile.median, "{}", metric);
    }
}

#[test]
fn test_form_factor_from_str() {
    assert_eq!("desktop".parse::<FormFactor>(), Ok(FormFactor::Desktop));
    assert_eq!("Mobile".parse::<FormFactor>(), Ok(FormFactor::Mobile));
    assert!("tablet".parse::<FormFactor>().is_err());
}
