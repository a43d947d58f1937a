use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestScore {
    pub student_id: u64,
    pub marks: f64,
}

/// A named assessment within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 2,
    "batchId": 1,
    "name": "Unit test 1",
    "maxMarks": 50.0,
    "date": "2024-02-01",
    "scores": [{"studentId": 11, "marks": 42.5}]
}))]
pub struct Test {
    pub id: u64,
    pub batch_id: u64,
    pub name: String,
    pub max_marks: f64,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub scores: Vec<TestScore>,
}

#[derive(Debug, Clone)]
pub struct NewTest {
    pub name: String,
    pub max_marks: f64,
    pub date: NaiveDate,
    pub scores: Vec<TestScore>,
}

#[derive(Debug, Clone, Default)]
pub struct TestChanges {
    pub name: Option<String>,
    pub max_marks: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Replaces the whole score sheet when present.
    pub scores: Option<Vec<TestScore>>,
}

/// A student's own result for one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentTestResult {
    pub test_id: u64,
    pub name: String,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub max_marks: f64,
    pub marks: Option<f64>,
}

impl Test {
    pub fn result_for(&self, student_id: u64) -> StudentTestResult {
        StudentTestResult {
            test_id: self.id,
            name: self.name.clone(),
            date: self.date,
            max_marks: self.max_marks,
            marks: self
                .scores
                .iter()
                .find(|s| s.student_id == student_id)
                .map(|s| s.marks),
        }
    }
}

pub fn check_scores(
    scores: &[TestScore],
    max_marks: f64,
    enrolled: &HashSet<u64>,
) -> Result<(), String> {
    if !(max_marks > 0.0) {
        return Err("maxMarks must be greater than zero".to_string());
    }

    let mut seen = HashSet::with_capacity(scores.len());
    for score in scores {
        if !enrolled.contains(&score.student_id) {
            return Err(format!(
                "Student {} is not enrolled in this batch",
                score.student_id
            ));
        }
        if !seen.insert(score.student_id) {
            return Err(format!("Duplicate score for student {}", score.student_id));
        }
        if !(0.0..=max_marks).contains(&score.marks) {
            return Err(format!(
                "Marks for student {} must be between 0 and {}",
                score.student_id, max_marks
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_must_fit_the_maximum() {
        let enrolled: HashSet<u64> = [1, 2].into_iter().collect();
        let ok = vec![TestScore { student_id: 1, marks: 50.0 }];
        assert!(check_scores(&ok, 50.0, &enrolled).is_ok());

        let over = vec![TestScore { student_id: 2, marks: 50.5 }];
        assert!(check_scores(&over, 50.0, &enrolled).is_err());

        let negative = vec![TestScore { student_id: 2, marks: -1.0 }];
        assert!(check_scores(&negative, 50.0, &enrolled).is_err());

        assert!(check_scores(&[], 0.0, &enrolled).is_err());
    }

    #[test]
    fn result_for_missing_student_has_no_marks() {
        let test = Test {
            id: 1,
            batch_id: 1,
            name: "Quiz".into(),
            max_marks: 10.0,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            scores: vec![TestScore { student_id: 5, marks: 8.0 }],
        };
        assert_eq!(test.result_for(5).marks, Some(8.0));
        assert_eq!(test.result_for(6).marks, None);
    }
}
