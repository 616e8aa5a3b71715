mod common;
use common::{sine_recording, synthetic_ssvep_session};

use lbci::io::{load_recording, read_recording_safetensors, save_recording, StWriter};
use lbci::LoadError;

#[test]
fn safetensors_round_trip_keeps_everything() {
    let rec = sine_recording(
        &["O1", "O2", "P3"],
        4.0,
        125.0,
        &[(0.5, 1.0, "True-SSVEP-1"), (2.0, 1.5, "False-LMI-i-12")],
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.safetensors");
    save_recording(&rec, &path).unwrap();

    let back = load_recording(&path).unwrap();
    assert_eq!(back, rec);
}

#[test]
fn free_text_descriptions_round_trip() {
    let rec = sine_recording(
        &["O1"],
        4.0,
        100.0,
        &[(0.5, 0.5, ""), (1.0, 0.5, "True-SSVEP-1"), (2.0, 0.5, "note:\nsecond line"), (3.0, 0.2, "")],
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.safetensors");
    save_recording(&rec, &path).unwrap();

    let back = load_recording(&path).unwrap();
    assert_eq!(back.annotations().len(), 4);
    assert_eq!(back.annotations()[0].description, "");
    assert_eq!(back.annotations()[2].description, "note:\nsecond line");
    assert_eq!(back, rec);
}

#[test]
fn recording_without_annotations_round_trips() {
    let rec = sine_recording::<&str>(&["C3"], 2.0, 100.0, &[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.safetensors");
    save_recording(&rec, &path).unwrap();
    assert!(load_recording(&path).unwrap().annotations().is_empty());
}

#[test]
fn synthetic_session_survives_disk() {
    let rec = synthetic_ssvep_session(2, 3);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthetic.safetensors");
    save_recording(&rec, &path).unwrap();
    let back = load_recording(&path).unwrap();
    assert_eq!(back.ch_names(), rec.ch_names());
    assert_eq!(back.annotations(), rec.annotations());
}

#[test]
fn f32_data_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f32.safetensors");
    let mut w = StWriter::new();
    w.add_f32("data", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    w.add_f32("sfreq", &[200.0], &[1]);
    w.add_text("ch_names", &["Cz", "Pz"]);
    w.write(&path).unwrap();

    let rec = load_recording(&path).unwrap();
    assert_eq!(rec.data().row(1).to_vec(), vec![4.0, 5.0, 6.0]);
    approx::assert_abs_diff_eq!(rec.sfreq(), 200.0);
}

#[test]
fn missing_file_and_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_recording(&dir.path().join("nope.fif")),
        Err(LoadError::NotFound(_))
    ));

    let gz = dir.path().join("session_raw.fif.gz");
    std::fs::write(&gz, b"\x1f\x8b").unwrap();
    assert!(matches!(load_recording(&gz), Err(LoadError::UnsupportedFormat(_))));
}

#[test]
fn malformed_files_are_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();

    let fif = dir.path().join("broken.fif");
    std::fs::write(&fif, [0u8; 7]).unwrap();
    assert!(matches!(load_recording(&fif), Err(LoadError::Malformed { .. })));

    let st = dir.path().join("names.safetensors");
    let mut w = StWriter::new();
    w.add_f64("data", &[0.0; 6], &[2, 3]);
    w.add_f64("sfreq", &[100.0], &[1]);
    w.add_text("ch_names", &["only_one"]);
    w.write(&st).unwrap();
    let err = load_recording(&st).unwrap_err();
    assert!(matches!(&err, LoadError::Malformed { path, .. } if path == &st));
    assert!(err.to_string().contains("channel names"));
}

#[test]
fn annotation_length_mismatch_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annot.safetensors");
    let mut w = StWriter::new();
    w.add_f64("data", &[0.0; 400], &[1, 400]);
    w.add_f64("sfreq", &[100.0], &[1]);
    w.add_text("ch_names", &["O1"]);
    w.add_f64("annot_onset", &[0.5, 1.0], &[2]);
    w.add_f64("annot_duration", &[0.1], &[1]);
    w.add_text("annot_description", &["True-SSVEP-1", "False-SSVEP-1"]);
    w.write(&path).unwrap();
    assert!(read_recording_safetensors(&path).is_err());
    assert!(matches!(load_recording(&path), Err(LoadError::Malformed { .. })));
}

#[test]
fn annotation_past_end_is_inconsistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.safetensors");
    let mut w = StWriter::new();
    w.add_f64("data", &[0.0; 100], &[1, 100]);
    w.add_f64("sfreq", &[100.0], &[1]);
    w.add_text("ch_names", &["O1"]);
    w.add_f64("annot_onset", &[0.5], &[1]);
    w.add_f64("annot_duration", &[2.0], &[1]);
    w.add_text("annot_description", &["True-SSVEP-1"]);
    w.write(&path).unwrap();
    assert!(matches!(load_recording(&path), Err(LoadError::Inconsistent(_))));
}
