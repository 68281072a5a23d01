//! Tests for the binary latent class model and its EM fit

#[cfg(test)]
mod tests {
    use crowdmosaic::PipelineError;
    use crowdmosaic::aggregation::latent_class::{EmConfig, LatentClassModel};
    use crowdmosaic::alignment::matrix::{Label, ResponseMatrix};

    fn worked_example() -> ResponseMatrix {
        ResponseMatrix::from_signed_rows(&[
            vec![1, 1, 1, 0, 0, -1, -1],
            vec![1, 1, 1, -1, 1, 1, 1],
            vec![-1, -1, 1, 0, 1, -1, 1],
        ])
        .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tolerance, "expected {expected:?}, got {actual:?}");
        }
    }

    // Tests the warm start equals the majority vote log-probabilities
    // Verified by running an E-step during construction
    #[test]
    fn test_initial_log_probabilities() {
        let matrix = worked_example();
        let model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();

        let initial: Vec<f64> = model.log_posteriors().row(0).to_vec();
        let expected = [(3.0_f64 / 5.0).ln(), (6.0_f64 / 7.0).ln(), (3.0_f64 / 6.0).ln()];
        assert_close(&initial, &expected, 1e-12);
        assert!(model.q_history().is_empty());
    }

    // Tests Q never decreases and the fit converges on the worked example
    // Verified by swapping the E-step and M-step order
    #[test]
    fn test_run_em_monotone() {
        let matrix = worked_example();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();
        let summary = model.run_em(1e-10).unwrap();

        assert!(summary.converged);
        assert!(summary.relative_change < 1e-10);
        assert_eq!(summary.iterations, model.q_history().len());
        assert_eq!(summary.degeneracies, 0);
        assert_eq!(summary.q_decreases, 0);

        for pair in model.q_history().windows(2) {
            if let [before, after] = pair {
                assert!(
                    *after >= before - 1e-12 * before.abs(),
                    "Q decreased: {:?}",
                    model.q_history()
                );
            }
        }
        assert!((summary.final_q - (-4.682_131_227_124_22)).abs() < 1e-6);
    }

    // Tests fitted labels and parameters of the worked example
    // Verified by normalizing sensitivity over the negative class
    #[test]
    fn test_fitted_parameters() {
        let matrix = worked_example();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();
        model.run_em(1e-10).unwrap();

        assert_eq!(
            model.estimated_labels(0.5),
            vec![Label::Positive, Label::Positive, Label::Negative]
        );
        assert!((model.prior() - 2.0 / 3.0).abs() < 1e-6);
        assert_close(&model.sensitivity(), &[1.0, 1.0, 1.0, 0.0, 1.0, 0.5, 0.5], 1e-6);
        assert_close(&model.specificity(), &[1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0], 1e-6);

        let posteriors = model.posteriors();
        assert!(posteriors[0] > 0.999_999);
        assert!(posteriors[1] > 0.999_999);
        assert!(posteriors[2] < 1e-6);
    }

    // Tests labels stay put when the converged fit is resumed
    #[test]
    fn test_labels_stable() {
        let matrix = worked_example();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();
        model.run_em(1e-10).unwrap();
        let first = model.estimated_labels(0.5);

        model.run_em(1e-10).unwrap();
        assert_eq!(model.estimated_labels(0.5), first);
    }

    // Tests a single adversarial worker is outvoted and recognised
    #[test]
    fn test_adversarial_worker() {
        let matrix = ResponseMatrix::from_signed_rows(&[
            vec![1, 1, 1, 1, 1, 1, -1],
            vec![-1, -1, -1, -1, -1, -1, 1],
            vec![1, 1, 1, 1, 1, 1, 1],
            vec![1, 1, 1, 1, 1, 1, -1],
            vec![1, 1, 1, 1, 1, 1, -1],
        ])
        .unwrap();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();
        let summary = model.run_em(1e-10).unwrap();

        assert!(summary.converged);
        assert!((model.prior() - 0.8).abs() < 1e-6);
        assert_eq!(
            model.estimated_labels(0.5),
            vec![
                Label::Positive,
                Label::Negative,
                Label::Positive,
                Label::Positive,
                Label::Positive
            ]
        );
        assert!(model.sensitivity()[6] < 0.5);
    }

    // Tests hitting the iteration cap reports a non-converged fit
    // Verified by ignoring max_iterations
    #[test]
    fn test_iteration_cap() {
        let matrix = worked_example();
        let config = EmConfig {
            max_iterations: 1,
            strict_validation: false,
        };
        let mut model = LatentClassModel::new(&matrix, config).unwrap();
        let summary = model.run_em(1e-10).unwrap();

        assert!(!summary.converged);
        assert_eq!(summary.iterations, 1);
        assert!(model.parameters().is_some_and(|p| !p.summary.converged));
    }

    // Tests parameters are only available after a fit
    #[test]
    fn test_parameters_after_fit() {
        let matrix = worked_example();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();

        assert!(model.parameters().is_none());

        model.run_em(1e-10).unwrap();
        let parameters = model.parameters().unwrap();
        assert_eq!(parameters.posteriors.len(), 3);
        assert_eq!(parameters.sensitivity.len(), 7);
        assert_eq!(parameters.q_history, model.q_history());
    }

    // Tests workers without any judgment keep their neutral parameters
    #[test]
    fn test_silent_worker_untouched() {
        let matrix =
            ResponseMatrix::from_signed_rows(&[vec![1, 1, 0], vec![-1, -1, 0], vec![1, 1, 0]])
                .unwrap();
        let strict = EmConfig {
            strict_validation: true,
            ..EmConfig::default()
        };
        let mut model = LatentClassModel::new(&matrix, strict).unwrap();
        model.run_em(1e-10).unwrap();

        assert!((model.sensitivity()[2] - 0.5).abs() < 1e-12);
        assert!((model.specificity()[2] - 0.5).abs() < 1e-12);
        assert_eq!(model.degeneracies(), 0);
    }

    // Tests a unanimous matrix holds the specificities that have no negative mass
    // Verified by failing on a zero normalizer under strict validation
    #[test]
    fn test_unanimous_matrix_holds_parameters() {
        let matrix = ResponseMatrix::from_signed_rows(&[vec![1, 1, 1], vec![1, 1, 1]]).unwrap();

        for strict_validation in [false, true] {
            let config = EmConfig {
                strict_validation,
                ..EmConfig::default()
            };
            let mut model = LatentClassModel::new(&matrix, config).unwrap();
            let summary = model.run_em(1e-10).unwrap();

            assert!(summary.converged);
            assert!(summary.degeneracies > 0);
            assert_eq!(summary.degeneracies, model.degeneracies());
            for posterior in model.posteriors() {
                assert!(posterior.is_finite() && posterior > 0.5);
            }
            assert_close(&model.specificity(), &[0.5, 0.5, 0.5], 1e-12);
            assert_close(&model.sensitivity(), &[1.0, 1.0, 1.0], 1e-12);
            assert_eq!(model.estimated_labels(0.5), vec![Label::Positive; 2]);
        }
    }

    // Tests a worker who only judged certain-positive cells keeps its specificity
    #[test]
    fn test_worker_on_zero_mass_cells() {
        let matrix =
            ResponseMatrix::from_signed_rows(&[vec![1, 1, 1], vec![-1, -1, 0]]).unwrap();
        let strict = EmConfig {
            strict_validation: true,
            ..EmConfig::default()
        };
        let mut model = LatentClassModel::new(&matrix, strict).unwrap();
        let summary = model.run_em(1e-10).unwrap();

        assert!(summary.converged);
        assert!(summary.degeneracies > 0);
        assert!((model.specificity()[2] - 0.5).abs() < 1e-12);
        assert!((model.sensitivity()[2] - 1.0).abs() < 1e-12);
        assert!(model.posteriors().iter().all(|p| p.is_finite()));
        assert_eq!(
            model.estimated_labels(0.5),
            vec![Label::Positive, Label::Negative]
        );
    }

    // Tests Q decreases are counted and never abort a strict fit
    // Verified by returning an error on the first decrease
    #[test]
    fn test_q_decrease_counted_under_strict() {
        let matrix =
            ResponseMatrix::from_signed_rows(&[vec![1, 1], vec![0, 1], vec![-1, 1], vec![0, 1]])
                .unwrap();
        let strict = EmConfig {
            strict_validation: true,
            ..EmConfig::default()
        };
        let mut model = LatentClassModel::new(&matrix, strict).unwrap();
        let summary = model.run_em(1e-10).unwrap();

        let decreases = model
            .q_history()
            .windows(2)
            .filter(|pair| matches!(pair, [before, after] if before - after > 1e-12 * before.abs()))
            .count();
        assert!(summary.q_decreases > 0);
        assert_eq!(summary.q_decreases, decreases);
        assert_eq!(model.q_decreases(), decreases);
        assert!(model.posteriors().iter().all(|p| p.is_finite()));
        assert!(model.parameters().is_some_and(|p| p.summary.q_decreases == decreases));
    }

    // Tests invalid inputs are rejected up front
    #[test]
    fn test_invalid_inputs() {
        let empty = ResponseMatrix::new(0, 3);
        assert!(matches!(
            LatentClassModel::new(&empty, EmConfig::default()),
            Err(PipelineError::InvalidParameter { .. })
        ));

        let matrix = worked_example();
        let mut model = LatentClassModel::new(&matrix, EmConfig::default()).unwrap();
        assert!(model.run_em(-1.0).is_err());
        assert!(model.run_em(f64::NAN).is_err());
    }
}
