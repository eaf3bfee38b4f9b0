use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{ExamSession, ResultEntry, Submission};
use crate::db::types::SessionStatus;
use crate::services::timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeReason {
    Completed,
    ManualSubmit,
    AutoSubmit,
    TimerExpired,
    SecondDisconnect,
}

impl FinalizeReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FinalizeReason::Completed => "completed",
            FinalizeReason::ManualSubmit => "manual_submit",
            FinalizeReason::AutoSubmit => "auto_submit",
            FinalizeReason::TimerExpired => "timer_expired",
            FinalizeReason::SecondDisconnect => "second_disconnect",
        }
    }

    pub(crate) fn auto_submitted(self) -> bool {
        matches!(
            self,
            FinalizeReason::AutoSubmit
                | FinalizeReason::TimerExpired
                | FinalizeReason::SecondDisconnect
        )
    }
}

/// Grades a session and writes its submission exactly once. Safe to call
/// any number of times and from concurrent requests: the session row is
/// locked for the duration, an already-submitted session returns the stored
/// submission untouched, and the submission insert is guarded by the unique
/// session constraint.
pub(crate) async fn finalize_session(
    pool: &PgPool,
    session_id: &str,
    reason: FinalizeReason,
) -> Result<Submission> {
    let now = primitive_now_utc();

    let mut tx = pool.begin().await.context("Failed to begin finalize transaction")?;

    let session = crate::repositories::sessions::lock_by_id(&mut *tx, session_id)
        .await
        .context("Failed to lock session for finalize")?
        .ok_or_else(|| anyhow!("Session not found during finalize"))?;

    if session.status == SessionStatus::Submitted {
        let submission = crate::repositories::submissions::find_by_session(&mut *tx, &session.id)
            .await
            .context("Failed to fetch stored submission")?
            .ok_or_else(|| anyhow!("Submitted session has no submission row"))?;
        tx.commit().await.context("Failed to commit finalize transaction")?;
        return Ok(submission);
    }

    let (score, entries) = grade(&session);
    let total = session.questions_snapshot.0.len() as i32;
    let percentage = compute_percentage(score, total);

    let ended_at = if now < session.expires_at { now } else { session.expires_at };
    let time_taken_ms = timing::elapsed_ms(session.started_at, ended_at);

    let violation_count =
        crate::repositories::violations::count_for_session(&mut *tx, &session.id)
            .await
            .context("Failed to count violations")? as i32;

    let submission_id = Uuid::new_v4().to_string();
    crate::repositories::submissions::create_if_absent(
        &mut *tx,
        crate::repositories::submissions::CreateSubmission {
            id: &submission_id,
            session_id: &session.id,
            assessment_id: &session.assessment_id,
            student_external_id: &session.student_external_id,
            score,
            total,
            percentage,
            time_taken_ms,
            violation_count,
            auto_submitted: reason.auto_submitted(),
            termination_reason: reason.as_str(),
            result_payload: Json(entries),
            created_at: now,
        },
    )
    .await
    .context("Failed to create submission")?;

    crate::repositories::sessions::mark_submitted(&mut *tx, &session.id, reason.as_str(), now)
        .await
        .context("Failed to mark session submitted")?;

    let submission = crate::repositories::submissions::find_by_session(&mut *tx, &session.id)
        .await
        .context("Failed to fetch finalized submission")?
        .ok_or_else(|| anyhow!("Submission missing after finalize"))?;

    tx.commit().await.context("Failed to commit finalize transaction")?;

    tracing::info!(
        session_id = %session.id,
        reason = reason.as_str(),
        score,
        total,
        "session finalized"
    );

    Ok(submission)
}

/// Grading compares original stable option keys only; display labels never
/// participate. Later entries for the same question win.
fn grade(session: &ExamSession) -> (i32, Vec<ResultEntry>) {
    let mut selected: HashMap<&str, Option<&str>> = HashMap::new();
    for answer in &session.answers.0 {
        selected.insert(answer.question_id.as_str(), answer.selected_option.as_deref());
    }

    let mut score = 0;
    let mut entries = Vec::with_capacity(session.questions_snapshot.0.len());
    for question in &session.questions_snapshot.0 {
        let correct_key = question
            .options
            .iter()
            .find(|option| option.is_correct)
            .map(|option| option.key.clone());
        let picked = selected.get(question.question_id.as_str()).copied().flatten();
        let is_correct = match (&picked, &correct_key) {
            (Some(picked), Some(correct)) => *picked == correct.as_str(),
            _ => false,
        };
        if is_correct {
            score += 1;
        }

        entries.push(ResultEntry {
            question_id: question.question_id.clone(),
            bank_code: question.bank_code.clone(),
            bank_name: question.bank_name.clone(),
            stem: question.stem.clone(),
            selected_original_id: picked.map(str::to_owned),
            correct_original_id: correct_key,
            is_correct,
            explanation: question.explanation.clone(),
            difficulty: question.difficulty,
            topic_tag: question.topic_tag.clone(),
        });
    }

    (score, entries)
}

fn compute_percentage(score: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    (f64::from(score) * 100.0 / f64::from(total)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use time::macros::datetime;

    use crate::db::models::{AnswerEntry, SnapshotOption, SnapshotQuestion};
    use crate::db::types::DifficultyLevel;

    fn snapshot_question(id: &str, correct_key: &str) -> SnapshotQuestion {
        let options = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, key)| SnapshotOption {
                key: (*key).to_owned(),
                label: ["A", "B", "C", "D"][i].to_owned(),
                text: format!("option {key}"),
                is_correct: *key == correct_key,
            })
            .collect();
        SnapshotQuestion {
            question_id: id.to_owned(),
            external_id: format!("ext-{id}"),
            bank_code: "algebra".to_owned(),
            bank_name: "Algebra".to_owned(),
            category: "general".to_owned(),
            difficulty: DifficultyLevel::Medium,
            stem: format!("stem {id}"),
            explanation: None,
            image_url: None,
            topic_tag: None,
            options,
        }
    }

    fn session_with(
        questions: Vec<SnapshotQuestion>,
        answers: Vec<AnswerEntry>,
    ) -> ExamSession {
        let t = datetime!(2026-03-01 10:00:00);
        ExamSession {
            id: "sess-1".to_owned(),
            assessment_id: "assess-1".to_owned(),
            student_name: "Student".to_owned(),
            student_external_id: "s-1".to_owned(),
            student_email: None,
            user_agent: None,
            screen_info: None,
            seed: 7,
            questions_snapshot: Json(questions),
            answers: Json(answers),
            started_at: t,
            expires_at: datetime!(2026-03-01 11:00:00),
            window_end: datetime!(2026-03-01 12:00:00),
            submitted_at: None,
            status: SessionStatus::Active,
            disconnect_count: 0,
            termination_reason: None,
            created_at: t,
            updated_at: t,
        }
    }

    fn answer(question_id: &str, key: Option<&str>) -> AnswerEntry {
        AnswerEntry {
            question_id: question_id.to_owned(),
            selected_option: key.map(str::to_owned),
            answered_at: "2026-03-01T10:05:00Z".to_owned(),
        }
    }

    #[test]
    fn grades_by_original_key() {
        let session = session_with(
            vec![snapshot_question("q1", "b"), snapshot_question("q2", "a")],
            vec![answer("q1", Some("b")), answer("q2", Some("c"))],
        );
        let (score, entries) = grade(&session);
        assert_eq!(score, 1);
        assert!(entries[0].is_correct);
        assert_eq!(entries[0].selected_original_id.as_deref(), Some("b"));
        assert_eq!(entries[0].correct_original_id.as_deref(), Some("b"));
        assert!(!entries[1].is_correct);
    }

    #[test]
    fn skipped_answer_is_wrong_not_error() {
        let session = session_with(
            vec![snapshot_question("q1", "a")],
            vec![answer("q1", None)],
        );
        let (score, entries) = grade(&session);
        assert_eq!(score, 0);
        assert!(!entries[0].is_correct);
        assert_eq!(entries[0].selected_original_id, None);
    }

    #[test]
    fn unanswered_questions_still_appear_in_breakdown() {
        let session = session_with(
            vec![snapshot_question("q1", "a"), snapshot_question("q2", "d")],
            vec![answer("q1", Some("a"))],
        );
        let (score, entries) = grade(&session);
        assert_eq!(score, 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].selected_original_id, None);
        assert_eq!(entries[1].correct_original_id.as_deref(), Some("d"));
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(compute_percentage(1, 3), 33);
        assert_eq!(compute_percentage(2, 3), 67);
        assert_eq!(compute_percentage(1, 2), 50);
        assert_eq!(compute_percentage(17, 20), 85);
        assert_eq!(compute_percentage(0, 0), 0);
    }
}
