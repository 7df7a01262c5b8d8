//! Property-based tests for configuration validation

use super::error::ValidationError;
use super::tests::create_valid_spec;
use super::validator::validate_config;
use crate::config::schema::*;
use proptest::prelude::*;

fn arb_valid_spec() -> impl Strategy<Value = TrainMLModelSpec> {
    (
        0.01f64..0.99,                       // training_percentage
        proptest::option::of(2usize..10),    // split_count
        proptest::option::of(1usize..32),    // max_workers
        1usize..16,                          // number_of_processes
    )
        .prop_map(|(training_percentage, split_count, max_workers, number_of_processes)| {
            let mut spec = create_valid_spec();
            spec.selection.training_percentage = training_percentage;
            spec.assessment.split_count = split_count;
            spec.max_workers = max_workers;
            spec.number_of_processes = number_of_processes;
            spec
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_spec_passes(spec in arb_valid_spec()) {
        prop_assert!(validate_config(&spec).is_ok());
    }

    #[test]
    fn prop_training_percentage_outside_unit_interval_fails(
        spec in arb_valid_spec(),
        value in prop_oneof![-10.0f64..=0.0, 1.0f64..10.0],
    ) {
        let mut spec = spec;
        spec.assessment.training_percentage = value;
        let is_invalid_percentage = matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidTrainingPercentage { .. })
        );
        prop_assert!(is_invalid_percentage);
    }

    #[test]
    fn prop_repeated_setting_fails(spec in arb_valid_spec(), index in 0usize..2) {
        let mut spec = spec;
        let repeated = spec.settings[index].clone();
        spec.settings.push(repeated);
        let is_duplicate = matches!(
            validate_config(&spec),
            Err(ValidationError::DuplicateSetting(_))
        );
        prop_assert!(is_duplicate);
    }

    #[test]
    fn prop_yaml_round_trip_stays_valid(spec in arb_valid_spec()) {
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let parsed: TrainMLModelSpec = serde_yaml::from_str(&yaml).unwrap();
        prop_assert!(validate_config(&parsed).is_ok());
        prop_assert_eq!(parsed.settings, spec.settings);
    }
}
