//! Conversion of loosely-shaped model JSON into strict draft types.
//!
//! Everything the model returns passes through here before it reaches the rest of the crate.
//! Shape problems that can be corrected are corrected (mapping options, letter answers, numeric
//! strings); items that cannot be are dropped with a validation log entry.

use serde_json::{Map, Value};

use crate::log_validation;
use crate::models::{
    ArenaDraft, ContentBundle, FlashcardDraft, GradingResult, QuizDraft, TopicDescriptor,
};

pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 5;
const DEFAULT_COMPLEXITY: u8 = 3;
const EXPECTED_OPTION_COUNT: usize = 4;

pub const SCENARIO_KEYS: &[&str] = &["scenario", "prompt", "problem"];
pub const IDEAL_KEYS: &[&str] = &["ideal_response", "ideal", "answer"];

/// Non-empty trimmed text of a string or number value.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First key in `keys` holding usable text.
pub fn pick_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(text_of))
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            // Accept "85", "85.5" and "85/100".
            let leading: String = s
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            leading.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// The array itself, or the first array found under one of `keys` when wrapped in an object.
fn list_in<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => keys
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

pub fn normalize_syllabus(value: &Value, max_topics: usize) -> Vec<TopicDescriptor> {
    let Some(items) = list_in(value, &["topics", "syllabus"]) else {
        log_validation!(failure, "syllabus", error = "expected a JSON list of topics");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let Some(topic) = pick_text(obj, &["topic", "name", "title"]) else {
                log_validation!(failure, "syllabus", error = "topic entry without a name");
                return None;
            };
            let complexity = ["complexity", "complexity_score"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(number_of))
                .map(|raw| raw.round().clamp(MIN_COMPLEXITY as f64, MAX_COMPLEXITY as f64) as u8)
                .unwrap_or(DEFAULT_COMPLEXITY);
            let context =
                pick_text(obj, &["context", "summary", "description"]).unwrap_or_default();
            Some(TopicDescriptor {
                topic,
                complexity,
                context,
            })
        })
        .take(max_topics)
        .collect()
}

pub fn normalize_flashcards(value: Option<&Value>, tag: &str) -> Vec<FlashcardDraft> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let question = pick_text(obj, &["question", "front", "q"])?;
            let answer = pick_text(obj, &["answer", "back", "a"])?;
            Some(FlashcardDraft {
                question,
                answer,
                tag: tag.to_string(),
            })
        })
        .collect()
}

/// Normalize one multiple-choice item. Options given as a labeled mapping become the list of
/// values in mapping order, and `correct_answer` is resolved to one of the option strings.
pub fn normalize_quiz(value: &Value, tag: &str) -> Result<QuizDraft, String> {
    let obj = value.as_object().ok_or("quiz is not an object")?;
    let question = pick_text(obj, &["question", "prompt"]).ok_or("quiz has no question")?;

    let raw_options = obj.get("options").or_else(|| obj.get("choices"));
    let (labels, options): (Vec<String>, Vec<String>) = match raw_options {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(text_of)
            .enumerate()
            .map(|(i, option)| (letter_label(i), option))
            .unzip(),
        Some(Value::Object(mapping)) => mapping
            .iter()
            .filter_map(|(label, option)| text_of(option).map(|text| (label.clone(), text)))
            .unzip(),
        _ => return Err("quiz has no options".to_string()),
    };

    if options.len() < 2 {
        return Err(format!("quiz has {} usable options", options.len()));
    }
    if options.len() != EXPECTED_OPTION_COUNT {
        log_validation!(
            failure,
            "quiz",
            error = format!("expected {} options, got {}", EXPECTED_OPTION_COUNT, options.len())
        );
    }

    let raw_answer = ["correct_answer", "answer", "correct"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(text_of))
        .ok_or("quiz has no correct_answer")?;
    let correct_answer = resolve_correct_answer(&raw_answer, &options, &labels)
        .ok_or_else(|| format!("correct_answer '{}' is not among the options", raw_answer))?;

    Ok(QuizDraft {
        question,
        options,
        correct_answer,
        tag: tag.to_string(),
    })
}

fn letter_label(index: usize) -> String {
    char::from(b'A' + (index % 26) as u8).to_string()
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Index of a bare letter label such as `B`, `b)`, `C.` or `Option D`.
fn letter_index(raw: &str) -> Option<usize> {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.strip_prefix("option").unwrap_or(lowered.as_str()).trim();
    let stripped = stripped.trim_end_matches([')', '.', ':']).trim();
    let mut chars = stripped.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_lowercase() => Some((c as u8 - b'a') as usize),
        _ => None,
    }
}

pub fn resolve_correct_answer(raw: &str, options: &[String], labels: &[String]) -> Option<String> {
    let raw = raw.trim();
    if let Some(exact) = options.iter().find(|option| option.as_str() == raw) {
        return Some(exact.clone());
    }

    let wanted = squash(raw);
    if let Some(loose) = options.iter().find(|option| squash(option) == wanted) {
        return Some(loose.clone());
    }

    if let Some(pos) = labels.iter().position(|label| squash(label) == wanted) {
        return options.get(pos).cloned();
    }

    if let Some(index) = letter_index(raw) {
        return options.get(index).cloned();
    }

    // "B) Paris" or "B. Paris": a label followed by the option text.
    let mut chars = raw.chars();
    if let (Some(letter), Some(sep)) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() && matches!(sep, ')' | '.' | ':') {
            let rest = squash(chars.as_str());
            return options.iter().find(|option| squash(option) == rest).cloned();
        }
    }

    None
}

pub fn normalize_arena(value: &Value, tag: &str) -> Option<ArenaDraft> {
    let obj = value.as_object()?;
    let scenario = pick_text(obj, SCENARIO_KEYS)?;
    let ideal_response = pick_text(obj, IDEAL_KEYS).unwrap_or_default();
    Some(ArenaDraft {
        scenario,
        ideal_response,
        related_topic_tag: tag.to_string(),
    })
}

/// Normalize a miner response. Returns `None` when nothing usable survived.
pub fn normalize_bundle(value: &Value, topic: &str) -> Option<ContentBundle> {
    let obj = value.as_object()?;

    let flashcards =
        normalize_flashcards(obj.get("flashcards").or_else(|| obj.get("cards")), topic);

    let quiz_value = match obj.get("quiz") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    let quiz = quiz_value.and_then(|q| match normalize_quiz(q, topic) {
        Ok(quiz) => Some(quiz),
        Err(reason) => {
            log_validation!(failure, "quiz", error = reason);
            None
        }
    });

    let arena = obj
        .get("arena")
        .or_else(|| obj.get("scenario").filter(|v| v.is_object()))
        .and_then(|a| normalize_arena(a, topic));

    if flashcards.is_empty() && quiz.is_none() && arena.is_none() {
        return None;
    }

    Some(ContentBundle {
        flashcards,
        quiz,
        arena,
    })
}

/// Normalize a list of quiz items, dropping the ones that fail validation.
pub fn normalize_quiz_list(value: &Value, default_tag: &str) -> Vec<QuizDraft> {
    let Some(items) = list_in(value, &["questions", "quiz", "items"]) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let tag = item
                .as_object()
                .and_then(|obj| pick_text(obj, &["tag", "topic"]))
                .unwrap_or_else(|| default_tag.to_string());
            match normalize_quiz(item, &tag) {
                Ok(quiz) => Some(quiz),
                Err(reason) => {
                    log_validation!(failure, "quiz", error = reason);
                    None
                }
            }
        })
        .collect()
}

pub fn normalize_grade(value: &Value) -> Option<GradingResult> {
    let obj = value.as_object()?;
    let score = obj.get("score").and_then(number_of)?;
    let feedback = pick_text(obj, &["feedback", "comment", "explanation"]).unwrap_or_default();
    Some(GradingResult {
        score: score.round().clamp(0.0, 100.0) as u8,
        feedback,
    })
}
