mod common;
use common::sine_recording;

use lbci::epoch::{epoch_bounds, epoch_len, epoch_window, epochs};
use lbci::EpochRangeError;

#[test]
fn epoch_length_is_window_times_sfreq() {
    assert_eq!(epoch_len((0.0, 5.0), 250.0).unwrap(), 1250);
    assert_eq!(epoch_len((-0.5, 1.5), 100.0).unwrap(), 200);
    assert!(matches!(epoch_len((1.0, 1.0), 100.0), Err(EpochRangeError::EmptyWindow { .. })));
    assert!(matches!(epoch_len((2.0, 1.0), 100.0), Err(EpochRangeError::EmptyWindow { .. })));
}

#[test]
fn epochs_have_identical_length_for_fractional_onsets() {
    let rec = sine_recording(
        &["O1", "O2"],
        10.0,
        100.0,
        &[(1.004, 1.0, "True-SSVEP-1"), (3.006, 1.0, "True-SSVEP-2"), (5.5, 1.0, "False-SSVEP-1")],
    );
    let lens: Vec<usize> = (0..3)
        .map(|i| {
            let (a, b) = epoch_bounds(&rec, i, (0.0, 2.0)).unwrap();
            b - a
        })
        .collect();
    assert_eq!(lens, vec![200, 200, 200]);
    assert_eq!(epoch_bounds(&rec, 1, (0.0, 2.0)).unwrap(), (301, 501));
}

#[test]
fn epoch_window_copies_the_right_samples() {
    let rec = sine_recording(&["O1", "O2"], 10.0, 100.0, &[(2.0, 1.0, "True-SSVEP-1")]);
    let ep = epoch_window(&rec, 0, (-0.5, 1.0)).unwrap();
    assert_eq!(ep.dim(), (2, 150));
    assert_eq!(ep[[1, 0]], rec.data()[[1, 150]]);
    assert_eq!(ep[[0, 149]], rec.data()[[0, 299]]);
}

#[test]
fn stacked_epochs_shape() {
    let rec = sine_recording(
        &["O1", "O2", "P3"],
        10.0,
        100.0,
        &[(1.0, 1.0, "a"), (4.0, 1.0, "b"), (7.0, 1.0, "c")],
    );
    let e = epochs(&rec, &[0, 2], (0.0, 2.0)).unwrap();
    assert_eq!(e.dim(), (2, 3, 200));
    assert_eq!(e[[1, 2, 0]], rec.data()[[2, 700]]);
}

#[test]
fn epoch_reaching_past_end_fails_whole_stack() {
    let rec = sine_recording(&["O1"], 10.0, 100.0, &[(1.0, 1.0, "a"), (9.0, 1.0, "b")]);
    let err = epochs(&rec, &[0, 1], (0.0, 2.0)).unwrap_err();
    assert!(matches!(err, EpochRangeError::OutOfBounds { index: 1, .. }));
}

#[test]
fn epoch_ending_exactly_at_the_last_sample_is_allowed() {
    let rec = sine_recording(&["O1"], 10.0, 100.0, &[(8.0, 1.0, "a")]);
    assert_eq!(epoch_bounds(&rec, 0, (0.0, 2.0)).unwrap(), (800, 1000));
}
