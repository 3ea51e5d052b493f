use tracing::warn;

use super::data::Dataset;
use super::limits::LimitsTable;
use crate::model::{Component, EvaluationResult, LimitsRecord, Status, ZoomWindow};

/// Trailing window of `duration` minutes ending at the last time in the
/// data. A window longer than the data, or a non-positive duration, covers
/// the whole span.
pub fn zoom_window(span: Option<(f64, f64)>, duration: f64) -> ZoomWindow {
    let Some((first, last)) = span else {
        return ZoomWindow {
            start_min: 0.0,
            end_min: 0.0,
            clamped: true,
        };
    };

    if !duration.is_finite() || duration <= 0.0 || last - duration <= first {
        return ZoomWindow {
            start_min: first,
            end_min: last,
            clamped: true,
        };
    }

    ZoomWindow {
        start_min: last - duration,
        end_min: last,
        clamped: false,
    }
}

pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
    })
}

pub fn evaluate_component(
    component: &Component,
    limits: &LimitsRecord,
    window: &ZoomWindow,
) -> EvaluationResult {
    let full = min_max(component.series.samples().map(|(_, value)| value));
    let zoomed = min_max(
        component
            .series
            .samples()
            .filter(|(time, _)| window.contains(*time))
            .map(|(_, value)| value),
    );

    let (margin_min, margin_max, status) = match full {
        Some((observed_min, observed_max)) => {
            let cold = observed_min - limits.acceptance_min;
            let hot = limits.acceptance_max - observed_max;
            let status = if observed_min >= limits.acceptance_min
                && observed_max <= limits.acceptance_max
            {
                Status::Pass
            } else {
                Status::Fail
            };
            (Some(cold), Some(hot), status)
        }
        None => (None, None, Status::Undefined),
    };

    EvaluationResult {
        component_name: component.name.clone(),
        deck: component.deck.clone(),
        label: component.label.clone(),
        sample_count: component.series.sample_count(),
        observed_min: full.map(|(lo, _)| lo),
        observed_max: full.map(|(_, hi)| hi),
        observed_min_zoomed: zoomed.map(|(lo, _)| lo),
        observed_max_zoomed: zoomed.map(|(_, hi)| hi),
        acceptance_min: limits.acceptance_min,
        acceptance_max: limits.acceptance_max,
        margin_min,
        margin_max,
        status,
        placeholder_limits: limits.is_placeholder(),
    }
}

pub fn evaluate_all(
    dataset: &Dataset,
    limits: &LimitsTable,
    window: &ZoomWindow,
) -> (Vec<EvaluationResult>, Vec<String>) {
    let mut warnings = Vec::new();

    let results = dataset
        .components
        .iter()
        .map(|component| {
            let record = match limits.get(&component.name) {
                Some(record) => record.clone(),
                None => {
                    let message = format!(
                        "no limits for '{}'; evaluated against placeholder limits",
                        component.name
                    );
                    warn!("{message}");
                    warnings.push(message);
                    LimitsRecord::placeholder(&component.name)
                }
            };

            if record.is_inverted() {
                let message = format!(
                    "acceptance range for '{}' is inverted ({} > {}); evaluated as given",
                    component.name, record.acceptance_min, record.acceptance_max
                );
                warn!("{message}");
                warnings.push(message);
            }

            evaluate_component(component, &record, window)
        })
        .collect();

    (results, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeSeries;

    fn component(name: &str, points: Vec<(f64, Option<f64>)>) -> Component {
        Component {
            name: name.to_string(),
            deck: "VD01".to_string(),
            label: name.to_string(),
            series: TimeSeries { points },
            missing_cells: 0,
        }
    }

    fn limits(min: f64, max: f64) -> LimitsRecord {
        LimitsRecord {
            component_name: "x".to_string(),
            acceptance_min: min,
            acceptance_max: max,
            design_min: None,
            design_max: None,
        }
    }

    #[test]
    fn window_covers_trailing_duration() {
        let window = zoom_window(Some((0.0, 1000.0)), 190.0);
        assert_eq!(window.start_min, 810.0);
        assert_eq!(window.end_min, 1000.0);
        assert!(!window.clamped);
    }

    #[test]
    fn oversized_or_invalid_window_uses_whole_span() {
        for duration in [5000.0, 1000.0, 0.0, -1.0, f64::NAN] {
            let window = zoom_window(Some((10.0, 1000.0)), duration);
            assert_eq!((window.start_min, window.end_min), (10.0, 1000.0));
            assert!(window.clamped);
        }
    }

    #[test]
    fn pass_with_margins_in_the_safe_direction() {
        let fog = component(
            "VD01 FOG",
            vec![(0.0, Some(10.0)), (5.0, Some(45.0)), (10.0, Some(30.0))],
        );
        let window = zoom_window(Some((0.0, 10.0)), 2.0);
        let result = evaluate_component(&fog, &limits(-10.0, 60.0), &window);

        assert_eq!(result.status, Status::Pass);
        assert_eq!(result.observed_min, Some(10.0));
        assert_eq!(result.observed_max, Some(45.0));
        assert_eq!(result.margin_min, Some(20.0));
        assert_eq!(result.margin_max, Some(15.0));
        assert_eq!(result.observed_min_zoomed, Some(30.0));
        assert_eq!(result.observed_max_zoomed, Some(30.0));
        assert!(!result.placeholder_limits);
    }

    #[test]
    fn limit_boundaries_pass_and_excursions_fail() {
        let part = component("p", vec![(0.0, Some(-10.0)), (1.0, Some(60.0))]);
        let window = zoom_window(Some((0.0, 1.0)), 10.0);
        assert_eq!(
            evaluate_component(&part, &limits(-10.0, 60.0), &window).status,
            Status::Pass
        );

        let hot = evaluate_component(&part, &limits(-10.0, 59.5), &window);
        assert_eq!(hot.status, Status::Fail);
        assert_eq!(hot.margin_max, Some(-0.5));
    }

    #[test]
    fn no_readings_is_undefined() {
        let batt = component("VD01 BATT", vec![(0.0, None), (1.0, None)]);
        let window = zoom_window(Some((0.0, 1.0)), 10.0);
        let result = evaluate_component(&batt, &LimitsRecord::placeholder("VD01 BATT"), &window);

        assert_eq!(result.status, Status::Undefined);
        assert_eq!(result.sample_count, 0);
        assert_eq!(result.observed_min, None);
        assert_eq!(result.margin_min, None);
        assert!(result.placeholder_limits);
    }

    #[test]
    fn zoomed_extremes_come_only_from_the_window() {
        let part = component(
            "p",
            vec![
                (0.0, Some(-40.0)),
                (50.0, Some(90.0)),
                (80.0, Some(20.0)),
                (90.0, None),
                (100.0, Some(25.0)),
            ],
        );
        let window = zoom_window(Some((0.0, 100.0)), 20.0);
        let result = evaluate_component(&part, &limits(-50.0, 100.0), &window);

        assert_eq!(result.observed_min_zoomed, Some(20.0));
        assert_eq!(result.observed_max_zoomed, Some(25.0));
        assert_eq!(result.observed_min, Some(-40.0));
        assert_eq!(result.observed_max, Some(90.0));
    }

    #[test]
    fn inverted_limits_are_evaluated_not_rejected() {
        let part = component("p", vec![(0.0, Some(20.0))]);
        let window = zoom_window(Some((0.0, 0.0)), 10.0);
        let result = evaluate_component(&part, &limits(50.0, 0.0), &window);
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.margin_min, Some(-30.0));
        assert_eq!(result.margin_max, Some(-20.0));
    }

    #[test]
    fn min_max_handles_empty_input() {
        assert_eq!(min_max(Vec::<f64>::new()), None);
        assert_eq!(min_max(vec![3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
    }
}
