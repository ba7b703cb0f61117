// tests/pipeline_properties.rs
//
// Behavioural properties of the scoring pipeline against stub predictors:
// determinism, batch/single equivalence, threshold consistency, confidence
// convention, order preservation, strict category handling, aggregation and
// the end-to-end encoding example.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use attrition_scorer::{
    summarize, EmployeeRecord, EncodeError, FeatureVector, Predictor, PredictorError,
    ScoringError, ScoringPipeline,
};

/// Probability comes from a per-row lookup on `Age`; records every batch it sees.
struct RecordingPredictor {
    features: Vec<String>,
    seen: Mutex<Vec<Vec<FeatureVector>>>,
    calls: AtomicUsize,
}

impl RecordingPredictor {
    fn new(features: &[&str]) -> Self {
        Self {
            features: features.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn prob_for(fv: &FeatureVector) -> f64 {
        // Age sits in slot 0 for every feature order used here
        let age = fv.as_slice()[0];
        ((age - 18.0) / 50.0).clamp(0.0, 1.0)
    }
}

impl Predictor for RecordingPredictor {
    fn feature_order(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<u8>, PredictorError> {
        Ok(batch
            .iter()
            .map(|fv| u8::from(Self::prob_for(fv) >= 0.5))
            .collect())
    }

    fn predict_probability(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(batch.to_vec());
        Ok(batch.iter().map(Self::prob_for).collect())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Returns one probability too many.
struct ShortChangingPredictor(Vec<String>);

impl Predictor for ShortChangingPredictor {
    fn feature_order(&self) -> &[String] {
        &self.0
    }
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<u8>, PredictorError> {
        Ok(vec![0; batch.len()])
    }
    fn predict_probability(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, PredictorError> {
        Ok(vec![0.2; batch.len() + 1])
    }
}

const FULL_ORDER: [&str; 9] = [
    "Age",
    "BusinessTravel",
    "Department",
    "EducationField",
    "Gender",
    "JobRole",
    "MaritalStatus",
    "MonthlyIncome",
    "OverTime",
];

fn employee(age: i64, department: &str) -> EmployeeRecord {
    EmployeeRecord::new()
        .with("Name", "Test")
        .with("Age", age)
        .with("BusinessTravel", "Travel_Rarely")
        .with("Department", department)
        .with("EducationField", "Marketing")
        .with("Gender", "Female")
        .with("JobRole", "Sales Executive")
        .with("MaritalStatus", "Single")
        .with("MonthlyIncome", 3200)
        .with("OverTime", "Yes")
}

fn pipeline() -> (ScoringPipeline, Arc<RecordingPredictor>) {
    let stub = Arc::new(RecordingPredictor::new(&FULL_ORDER));
    (ScoringPipeline::new(stub.clone()), stub)
}

#[test]
fn end_to_end_example_encodes_in_declared_order() {
    let (p, stub) = pipeline();
    let record = EmployeeRecord::new()
        .with("BusinessTravel", "Travel_Rarely")
        .with("Department", "Sales")
        .with("EducationField", "Marketing")
        .with("Gender", "Female")
        .with("JobRole", "Sales Executive")
        .with("MaritalStatus", "Single")
        .with("OverTime", "Yes")
        .with("Age", 29)
        .with("MonthlyIncome", 3200);

    p.score_one(record).unwrap();

    let seen = stub.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0][0].as_slice(),
        &[29.0, 1.0, 2.0, 0.0, 0.0, 6.0, 2.0, 3200.0, 1.0]
    );
}

#[test]
fn scoring_is_deterministic() {
    let (p, _) = pipeline();
    let batch: Vec<_> = (20..40).map(|a| employee(a, "Sales")).collect();
    let a = p.score(batch.clone()).unwrap();
    let b = p.score(batch).unwrap();
    assert_eq!(a, b);
}

#[test]
fn batch_matches_single_record_scoring() {
    let (p, _) = pipeline();
    let batch: Vec<_> = [19, 33, 43, 44, 60, 67]
        .iter()
        .map(|a| employee(*a, "Research & Development"))
        .collect();

    let together = p.score(batch.clone()).unwrap();
    for (i, rec) in batch.into_iter().enumerate() {
        let alone = p.score_one(rec).unwrap();
        assert_eq!(together[i], alone, "row {i} differs between batch and single");
    }
}

#[test]
fn output_order_follows_input_order() {
    let (p, _) = pipeline();
    let ages = [55, 21, 48, 30, 62];
    let out = p
        .score(ages.iter().map(|a| employee(*a, "Sales")).collect())
        .unwrap();
    let got: Vec<String> = out.iter().map(|s| s.record.cell("Age")).collect();
    assert_eq!(got, vec!["55", "21", "48", "30", "62"]);
}

#[test]
fn label_and_confidence_follow_probability() {
    let (p, _) = pipeline();
    // prob = (age - 18) / 50 -> 0.0, 0.5, 0.98
    let out = p
        .score(vec![employee(18, "Sales"), employee(43, "Sales"), employee(67, "Sales")])
        .unwrap();

    for s in &out {
        let r = s.result;
        assert_eq!(r.label == 1, r.probability >= 0.5);
        let expected = if r.label == 1 { r.probability } else { 1.0 - r.probability };
        assert!((r.confidence() - expected).abs() < 1e-12);
        assert!((0.5..=1.0).contains(&r.confidence()));
    }
    // probability exactly at the threshold is positive
    assert_eq!(out[1].result.label, 1);
    assert_eq!(out[0].result.verdict().label(), "Likely to Stay");
    assert_eq!(out[2].result.verdict().label(), "Likely to Leave");
}

#[test]
fn custom_threshold_changes_labels_not_probabilities() {
    let stub = Arc::new(RecordingPredictor::new(&FULL_ORDER));
    let strict = ScoringPipeline::with_threshold(stub, 0.9);
    let s = strict.score_one(employee(53, "Sales")).unwrap(); // p = 0.7
    assert!((s.result.probability - 0.7).abs() < 1e-12);
    assert_eq!(s.result.label, 0);
    // the stub's own cutoff is 0.5, so the two labels disagree
    assert_eq!(s.predictor_label, 1);
    assert!(s.disagrees());
}

#[test]
fn unknown_department_fails_instead_of_defaulting() {
    let (p, stub) = pipeline();
    let err = p
        .score(vec![employee(30, "Sales"), employee(30, "Engineering")])
        .unwrap_err();
    assert_eq!(
        err,
        ScoringError::Encode(EncodeError::UnknownCategoryValue {
            row: 1,
            field: "Department".into(),
            value: "Engineering".into(),
        })
    );
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0, "predictor must not run");
}

#[test]
fn missing_required_feature_is_reported() {
    let (p, _) = pipeline();
    let mut rec = employee(30, "Sales");
    rec.insert("MonthlyIncome", "  ");
    let err = p.score_one(rec).unwrap_err();
    assert_eq!(
        err,
        ScoringError::Encode(EncodeError::MissingField {
            row: 0,
            field: "MonthlyIncome".into(),
        })
    );
}

#[test]
fn empty_batch_skips_predictor() {
    let (p, stub) = pipeline();
    assert!(p.score(Vec::new()).unwrap().is_empty());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn wrong_output_length_is_predictor_failure() {
    let order: Vec<String> = FULL_ORDER.iter().map(|s| s.to_string()).collect();
    let p = ScoringPipeline::new(Arc::new(ShortChangingPredictor(order)));
    let err = p.score(vec![employee(30, "Sales")]).unwrap_err();
    assert_eq!(err.kind(), "predictor_failure");
}

#[test]
fn summary_counts_three_leavers_of_ten() {
    let (p, _) = pipeline();
    // ages >= 43 land at or above 0.5
    let ages = [50, 60, 45, 20, 22, 25, 30, 33, 35, 40];
    let out = p
        .score(ages.iter().map(|a| employee(*a, "Sales")).collect())
        .unwrap();
    let summary = summarize(&out, Some("Department"));

    assert_eq!(summary.total, 10);
    assert_eq!(summary.count(1), 3);
    assert_eq!(summary.count(0), 7);
    assert_eq!(summary.count(1) + summary.count(0), 10);
    assert_eq!(summary.by_group["Sales"][&1u8], 3);
}
