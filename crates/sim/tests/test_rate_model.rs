//! Rate model validation: epochs, indices and dimensions.

use phylosse_sim::errors::RateModelError;
use phylosse_sim::evolution::{EpochIndex, EventKind, Rate, RateModel};

#[test]
fn test_epoch_count_must_match_age_ends() {
    for (n_epochs, age_ends) in [(1, vec![2.0]), (3, vec![2.0]), (2, vec![]), (4, vec![3.0, 1.0])] {
        let err = RateModel::with_epochs(1, n_epochs, age_ends.clone(), vec![]).unwrap_err();
        assert_eq!(
            err,
            RateModelError::DimensionMismatch {
                parameter: "epoch_age_ends".into(),
                expected: n_epochs - 1,
                actual: age_ends.len(),
            }
        );
    }
    assert!(RateModel::with_epochs(1, 3, vec![3.0, 1.0], vec![]).is_ok());
}

#[test]
fn test_epoch_index_zero_and_out_of_range() {
    assert_eq!(EpochIndex::new(0), Err(RateModelError::InvalidEpochIndex(0)));
    assert_eq!(EpochIndex::new(-2), Err(RateModelError::InvalidEpochIndex(-2)));
    assert!(matches!(
        EpochIndex::parse("one"),
        Err(RateModelError::EpochIndexParse(_))
    ));

    let rate = Rate::speciation(0, 1.0).in_epoch(EpochIndex::new(3).unwrap());
    assert_eq!(
        RateModel::new(1, vec![1.0], vec![rate]).unwrap_err(),
        RateModelError::EpochIndexOutOfRange {
            index: 3,
            n_epochs: 2
        }
    );
}

#[test]
fn test_rate_lookup_by_epoch() {
    let old = EpochIndex::new(2).unwrap();
    let model = RateModel::new(
        2,
        vec![5.0],
        vec![
            Rate::speciation(0, 1.0),
            Rate::speciation(0, 3.0).in_epoch(old),
            Rate::vectorized(EventKind::Extinction { state: 1 }, vec![0.1, 0.2]),
        ],
    )
    .unwrap();

    let speciation = EventKind::Speciation { state: 0 };
    assert_eq!(model.rate(speciation, EpochIndex::PRESENT, 0).unwrap(), 1.0);
    assert_eq!(model.rate(speciation, old, 0).unwrap(), 3.0);
    assert_eq!(
        model
            .rate(EventKind::Extinction { state: 1 }, EpochIndex::PRESENT, 1)
            .unwrap(),
        0.2
    );
    assert!(model
        .rate(speciation, EpochIndex::new(3).unwrap(), 0)
        .is_err());
}

#[test]
fn test_negative_rate_rejected() {
    assert!(matches!(
        RateModel::single_epoch(1, vec![Rate::extinction(0, -0.1)]),
        Err(RateModelError::NegativeRate { .. })
    ));
}

#[test]
fn test_rates_from_json() {
    let json = r#"[
        {"event": "speciation", "state": 0, "values": [1.0]},
        {"event": "cladogenesis", "from": 0, "left": 0, "right": 1, "values": [0.5], "epoch": 2},
        {"event": "transition", "from": 1, "to": 0, "values": [0.25, 0.5]}
    ]"#;
    let rates: Vec<Rate> = serde_json::from_str(json).unwrap();
    assert_eq!(rates[1].epoch, EpochIndex::new(2).unwrap());
    let model = RateModel::new(2, vec![1.0], rates).unwrap();
    assert_eq!(model.n_values(), 2);

    let zero: Result<Vec<Rate>, _> = serde_json::from_str(
        r#"[{"event": "speciation", "state": 0, "values": [1.0], "epoch": 0}]"#,
    );
    assert!(zero.is_err());
}
