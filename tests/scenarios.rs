#![cfg(not(loom))]

use sync_reductions::executor::Nesting;
use sync_reductions::generate::DataGenerator;
use sync_reductions::{
    Error, Granularity, Input, Matrix, MinMax, Schedule, Shape, Strategy, Trial, Value,
};

const SCHEDULES: [Schedule; 3] = [Schedule::Static, Schedule::DYNAMIC, Schedule::GUIDED];

fn strategies_for(input: &Input) -> Vec<Strategy> {
    Strategy::ALL
        .iter()
        .copied()
        .filter(|&s| s != Strategy::ExclusiveUpdate || matches!(input, Input::Pair(_)))
        .collect()
}

fn assert_matches_oracle(input: &Input, value: Value, context: &str) {
    match (input.sequential(), value) {
        (Value::Scalar(expected), Value::Scalar(actual)) if matches!(input, Input::Pair(_)) => {
            let tolerance = 1e-9 * expected.abs().max(1.0);
            assert!(
                (expected - actual).abs() <= tolerance,
                "{}: expected {}, got {}",
                context,
                expected,
                actual
            );
        }
        (expected, actual) => assert_eq!(expected, actual, "{}", context),
    }
}

#[test]
fn every_strategy_matches_the_oracle() {
    let mut gen = DataGenerator::with_seed(7);
    let inputs = vec![
        Input::Matrix(gen.matrix(37, Shape::Full, 1.0..1000.0)),
        Input::Matrix(gen.matrix(41, Shape::UpperTriangular, 1.0..1000.0)),
        Input::Vector(gen.vector(2_001, 1.0..1000.0)),
        Input::Pair(gen.vector_pair(2_001, 1.0..1000.0)),
    ];

    for input in &inputs {
        for strategy in strategies_for(input) {
            for &schedule in &SCHEDULES {
                for workers in 1..=16 {
                    let outcome = Trial::new(workers, strategy)
                        .with_schedule(schedule)
                        .run(input)
                        .unwrap();
                    let context = format!(
                        "{} {} {} W={}",
                        input.kernel_name(),
                        strategy,
                        schedule,
                        workers
                    );
                    assert_matches_oracle(input, outcome.value, &context);
                }
            }
        }
    }
}

#[test]
fn per_element_merges_match_per_worker_merges() {
    let mut gen = DataGenerator::with_seed(3);
    let input = Input::Vector(gen.vector(500, -50.0..50.0));

    for &strategy in &[Strategy::CriticalSection, Strategy::ExplicitLock] {
        let per_element = Trial::new(6, strategy)
            .with_granularity(Granularity::PerElement)
            .run(&input)
            .unwrap();
        let per_worker = Trial::new(6, strategy)
            .with_granularity(Granularity::PerWorker)
            .run(&input)
            .unwrap();

        assert_eq!(per_element.value, per_worker.value);
    }
}

#[test]
fn result_does_not_depend_on_worker_count() {
    let mut gen = DataGenerator::with_seed(19);
    let input = Input::Matrix(gen.matrix(64, Shape::Full, 1.0..1000.0));

    for &strategy in &[Strategy::CriticalSection, Strategy::BuiltinReduction] {
        let one = Trial::new(1, strategy).run(&input).unwrap();
        let sixteen = Trial::new(16, strategy).run(&input).unwrap();
        assert_eq!(one.value, sixteen.value);
    }
}

#[test]
fn triangular_ignores_cells_below_the_diagonal() {
    let mut gen = DataGenerator::with_seed(5);
    let n = 24;
    let clean = gen.matrix(n, Shape::UpperTriangular, 1.0..1000.0);

    let mut cells = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            if j < i {
                cells.push(f64::NAN);
            } else {
                cells.push(clean.row(i)[j - i]);
            }
        }
    }
    let poisoned = Input::Matrix(Matrix::from_flat(n, Shape::UpperTriangular, cells).unwrap());
    let expected = Input::Matrix(clean).sequential();

    for strategy in strategies_for(&poisoned) {
        let outcome = Trial::new(4, strategy).run(&poisoned).unwrap();
        let value = outcome.value.as_scalar().unwrap();

        assert!(!value.is_nan(), "{} read below the diagonal", strategy);
        assert_eq!(outcome.value, expected);
    }
}

#[test]
fn small_matrix_scenarios() {
    let full = Input::Matrix(
        Matrix::from_rows(Shape::Full, vec![vec![4.0, 2.0], vec![7.0, 1.0]]).unwrap(),
    );
    let triangular = Input::Matrix(
        Matrix::from_rows(
            Shape::UpperTriangular,
            vec![vec![3.0, 8.0], vec![f64::NAN, 5.0]],
        )
        .unwrap(),
    );

    for strategy in strategies_for(&full) {
        for workers in 1..=4 {
            let trial = Trial::new(workers, strategy);
            assert_eq!(trial.run(&full).unwrap().value, Value::Scalar(2.0));
            assert_eq!(trial.run(&triangular).unwrap().value, Value::Scalar(5.0));
        }
    }
}

#[test]
fn extremes_skip_the_first_element() {
    let input = Input::Vector(vec![5.0, 1.0, 9.0, 3.0]);

    for strategy in strategies_for(&input) {
        for workers in 1..=16 {
            let outcome = Trial::new(workers, strategy).run(&input).unwrap();
            assert_eq!(outcome.value, Value::Extremes(MinMax { min: 1.0, max: 9.0 }));
        }
    }

    // index 0 holds the only extreme and is never read
    let input = Input::Vector(vec![100.0, 1.0, 2.0]);
    let outcome = Trial::new(2, Strategy::CriticalSection).run(&input).unwrap();
    assert_eq!(outcome.value, Value::Extremes(MinMax { min: 1.0, max: 2.0 }));
}

#[test]
fn empty_vector_keeps_sentinels() {
    let outcome = Trial::new(3, Strategy::ExplicitLock)
        .run(&Input::Vector(Vec::new()))
        .unwrap();

    assert!(outcome.value.as_extremes().unwrap().is_empty());
}

#[test]
fn mismatched_dot_product_is_rejected() {
    let err = Input::dot(vec![1.0, 2.0, 3.0], vec![1.0, 2.0]).unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, Error::LengthMismatch { left: 3, right: 2 }));
}

#[test]
fn exclusive_update_on_min_max_is_a_hazard() {
    let inputs = [
        Input::Vector(vec![5.0, 1.0, 9.0, 3.0]),
        Input::Matrix(Matrix::from_rows(Shape::Full, vec![vec![1.0]]).unwrap()),
    ];

    for input in &inputs {
        let result = Trial::new(4, Strategy::ExclusiveUpdate).run(input);
        assert!(matches!(result, Err(Error::UnsupportedCombination { .. })));
    }
}

#[test]
fn nested_decomposition_matches_flat() {
    let mut gen = DataGenerator::with_seed(23);
    let input = Input::Matrix(gen.matrix(48, Shape::UpperTriangular, 1.0..1000.0));
    let expected = input.sequential();

    for &supported in &[true, false] {
        let trial = Trial::new(4, Strategy::ExplicitLock)
            .with_nesting(Nesting::Enabled { inner_workers: 3 })
            .with_nested_supported(supported);
        let executor = trial.executor().unwrap();

        assert_eq!(executor.is_nested(), supported);
        assert_eq!(executor.active_workers(), if supported { 12 } else { 4 });
        assert_eq!(trial.run_on(&executor, &input).unwrap().value, expected);
    }
}

#[test]
fn nan_row_minimums_follow_the_leading_cell() {
    let nan = f64::NAN;
    let matrix = Matrix::from_rows(
        Shape::Full,
        vec![
            vec![nan, 5.0, 2.0, 9.0],
            vec![3.0, nan, 4.0, 7.0],
            vec![8.0, 1.0, 6.0, nan],
            vec![4.0, 4.0, nan, 6.0],
        ],
    )
    .unwrap();
    let input = Input::Matrix(matrix);
    assert_eq!(input.sequential(), Value::Scalar(4.0));

    for strategy in strategies_for(&input) {
        for &nesting in &[Nesting::Disabled, Nesting::Enabled { inner_workers: 3 }] {
            for workers in 1..=4 {
                let outcome = Trial::new(workers, strategy)
                    .with_nesting(nesting)
                    .run(&input)
                    .unwrap();
                assert_eq!(
                    outcome.value,
                    Value::Scalar(4.0),
                    "{} {:?} W={}",
                    strategy,
                    nesting,
                    workers
                );
            }
        }
    }
}

#[test]
fn zero_chunk_is_a_configuration_error() {
    let err = Trial::new(2, Strategy::CriticalSection)
        .with_schedule(Schedule::Guided { min_chunk: 0 })
        .run(&Input::Vector(vec![1.0, 2.0]))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidSchedule(_)));
    assert!(err.is_configuration());
}
