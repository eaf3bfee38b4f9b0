//! Builds the immutable per-session question snapshot from loaded bank
//! inventory: per-bank sampling, cross-bank ordering, option shuffling with
//! display relabeling. Pure given the inventory, so the draw path is testable
//! without a database.

use rand::Rng;

use crate::db::models::{
    AllocationSlice, Question, QuestionBank, QuestionOption, SnapshotOption, SnapshotQuestion,
};
use crate::services::draw;

pub(crate) struct BankInventory {
    pub(crate) bank: QuestionBank,
    pub(crate) questions: Vec<(Question, Vec<QuestionOption>)>,
}

/// Draws the full snapshot for one session. The caller has already validated
/// the plan via the allocation resolver; inventories are keyed in plan order.
pub(crate) fn draw_snapshot<R: Rng>(
    rng: &mut R,
    plan: &[AllocationSlice],
    inventories: Vec<BankInventory>,
) -> Vec<SnapshotQuestion> {
    let mut merged: Vec<SnapshotQuestion> = Vec::new();

    for (slice, inventory) in plan.iter().zip(inventories) {
        let drawn = draw::sample(rng, inventory.questions, slice.count as usize);
        for (question, options) in drawn {
            merged.push(snapshot_question(rng, &inventory.bank, question, options));
        }
    }

    draw::shuffle(rng, merged)
}

fn snapshot_question<R: Rng>(
    rng: &mut R,
    bank: &QuestionBank,
    question: Question,
    options: Vec<QuestionOption>,
) -> SnapshotQuestion {
    let shuffled = draw::shuffle(rng, options);
    let options = shuffled
        .into_iter()
        .enumerate()
        .map(|(index, option)| SnapshotOption {
            key: option.option_key,
            label: draw::option_label(index),
            text: option.option_text,
            is_correct: option.is_correct,
        })
        .collect();

    SnapshotQuestion {
        question_id: question.id,
        external_id: question.external_id,
        bank_code: bank.code.clone(),
        bank_name: bank.name.clone(),
        category: question.category,
        difficulty: question.difficulty,
        stem: question.stem,
        explanation: question.explanation,
        image_url: question.image_url,
        topic_tag: question.topic_tag,
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::DifficultyLevel;
    use std::collections::{HashMap, HashSet};

    fn bank(code: &str) -> QuestionBank {
        let now = primitive_now_utc();
        QuestionBank {
            id: format!("bank-{code}"),
            code: code.to_string(),
            name: code.to_uppercase(),
            created_at: now,
            updated_at: now,
        }
    }

    fn question(bank_code: &str, n: usize) -> (Question, Vec<QuestionOption>) {
        let now = primitive_now_utc();
        let id = format!("{bank_code}-q{n}");
        let options = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, key)| QuestionOption {
                id: format!("{id}-{key}"),
                question_id: id.clone(),
                option_key: key.to_string(),
                option_text: format!("option {key}"),
                is_correct: i == 1,
            })
            .collect();

        let question = Question {
            id: id.clone(),
            bank_id: format!("bank-{bank_code}"),
            external_id: format!("Q{n}"),
            category: "general".to_string(),
            difficulty: DifficultyLevel::Medium,
            stem: format!("stem {n}"),
            explanation: None,
            image_url: None,
            topic_tag: None,
            created_at: now,
            updated_at: now,
        };

        (question, options)
    }

    fn inventory(code: &str, size: usize) -> BankInventory {
        BankInventory {
            bank: bank(code),
            questions: (0..size).map(|n| question(code, n)).collect(),
        }
    }

    #[test]
    fn honors_per_bank_counts_and_total() {
        let mut rng = rand::thread_rng();
        let plan = vec![
            AllocationSlice { bank_code: "alpha".to_string(), count: 3 },
            AllocationSlice { bank_code: "beta".to_string(), count: 2 },
        ];
        let snapshot =
            draw_snapshot(&mut rng, &plan, vec![inventory("alpha", 10), inventory("beta", 2)]);

        assert_eq!(snapshot.len(), 5);
        let mut per_bank: HashMap<&str, usize> = HashMap::new();
        for entry in &snapshot {
            *per_bank.entry(entry.bank_code.as_str()).or_default() += 1;
        }
        assert_eq!(per_bank.get("alpha"), Some(&3));
        assert_eq!(per_bank.get("beta"), Some(&2));
    }

    #[test]
    fn draws_unique_questions() {
        let mut rng = rand::thread_rng();
        let plan = vec![AllocationSlice { bank_code: "alpha".to_string(), count: 8 }];
        let snapshot = draw_snapshot(&mut rng, &plan, vec![inventory("alpha", 8)]);

        let ids: HashSet<&str> = snapshot.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn relabels_options_in_shuffled_order_keeping_original_keys() {
        let mut rng = rand::thread_rng();
        let plan = vec![AllocationSlice { bank_code: "alpha".to_string(), count: 1 }];
        let snapshot = draw_snapshot(&mut rng, &plan, vec![inventory("alpha", 1)]);

        let options = &snapshot[0].options;
        assert_eq!(options.len(), 4);

        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);

        let keys: HashSet<&str> = options.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, HashSet::from(["a", "b", "c", "d"]));

        // Exactly one correct option survives the shuffle, addressed by its
        // original key, not its display label.
        let correct: Vec<&SnapshotOption> = options.iter().filter(|o| o.is_correct).collect();
        assert_eq!(correct.len(), 1);
        assert_eq!(correct[0].key, "b");
    }
}
