// src/authoring/parser.rs

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

use crate::models::question::Question;

/// Splits the response into blocks, one per "Question n" header.
static QUESTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s#*]*question\s*\d+\s*[:.)\-]?[\s*]*").expect("valid question header regex")
});

/// "A) text", "b. text", "C: text"
static CHOICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\**([A-Za-z])\**\s*[).:]\s*(.+?)\s*$").expect("valid choice regex")
});

static CORRECT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\**\s*correct\s*answer\s*\**\s*[:\-]\s*\**\s*\(?([A-Za-z])\b")
        .expect("valid correct answer regex")
});

static EXPLANATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\**\s*explanation\s*\**\s*[:\-]\s*\**\s*(.*)$").expect("valid explanation regex")
});

/// Parses generated text in the fixed layout:
///
/// ```text
/// Question 1: prompt
/// A) choice
/// B) choice
/// Correct Answer: B
/// Explanation: why
/// ```
///
/// Blocks that do not yield a well-formed question for `labels` are dropped.
/// Kept questions are renumbered 1..N in order.
pub fn parse_questions(text: &str, labels: &[char]) -> Vec<Question> {
    let mut questions = Vec::new();

    // Anything before the first header is preamble.
    for (index, block) in QUESTION_HEADER.split(text).skip(1).enumerate() {
        let position = questions.len() as u32 + 1;
        match parse_block(block, labels, position) {
            Ok(question) => questions.push(question),
            Err(reason) => {
                tracing::warn!("Dropping generated question block {}: {}", index + 1, reason)
            }
        }
    }

    questions
}

fn parse_block(block: &str, labels: &[char], position: u32) -> Result<Question, String> {
    let mut prompt_lines: Vec<&str> = Vec::new();
    let mut choices: HashMap<char, String> = HashMap::new();
    let mut correct: Option<char> = None;
    let mut explanation: Option<String> = None;

    for line in block.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(text) = explanation.as_mut() {
            // Explanation runs to the end of the block.
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line.trim());
            continue;
        }
        if let Some(caps) = CORRECT_LINE.captures(line) {
            correct = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
            continue;
        }
        if let Some(caps) = EXPLANATION_LINE.captures(line) {
            explanation = Some(caps[1].trim().to_string());
            continue;
        }
        if let Some(caps) = CHOICE_LINE.captures(line) {
            let label = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
            if let Some(label) = label.filter(|l| labels.contains(l)) {
                if correct.is_none() && !choices.contains_key(&label) {
                    choices.insert(label, caps[2].to_string());
                    continue;
                }
            }
        }
        if choices.is_empty() {
            prompt_lines.push(line.trim());
        }
    }

    let prompt = prompt_lines.join(" ").trim().trim_matches('*').trim().to_string();
    let choices = labels
        .iter()
        .map(|l| {
            choices
                .remove(l)
                .ok_or_else(|| format!("missing choice {}", l))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let correct_label = correct.ok_or_else(|| "missing correct answer".to_string())?;

    let question = Question {
        position,
        prompt,
        choices,
        correct_label,
        explanation: explanation.filter(|e| !e.is_empty()),
    };
    question.check_shape(labels)?;
    Ok(question)
}
