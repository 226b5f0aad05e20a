//! Parse the line-oriented `RESULT_*:` reply contract.

use crate::domain::{ExecutionOutcome, OutcomeStatus};
use crate::id::truncate_chars;

const SUMMARY_FALLBACK_CHARS: usize = 200;

fn normalize_status(value: &str) -> OutcomeStatus {
    match value.trim().to_lowercase().as_str() {
        "done" | "success" | "completed" => OutcomeStatus::Done,
        "failed" => OutcomeStatus::Failed,
        _ => OutcomeStatus::InProgress,
    }
}

/// Interpret a free-text reply.
///
/// Unparseable replies become in-progress outcomes carrying the full text, so
/// the next cycle gets another chance.
pub fn parse_response(text: &str) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::new(OutcomeStatus::InProgress, "")
        .with_output(text);
    outcome.remaining = "Unknown: reply had no RESULT_REMAINING line".to_string();

    for line in text.lines().map(str::trim) {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match field {
            "RESULT_STATUS" => outcome.status = normalize_status(&value),
            "RESULT_SUMMARY" => outcome.summary = value,
            "RESULT_OUTPUT" => outcome.output = value,
            "RESULT_DECISIONS" => outcome.decisions = value,
            "RESULT_ERRORS" => outcome.errors = value,
            "RESULT_REMAINING" => outcome.remaining = value,
            _ => {}
        }
    }

    if outcome.summary.is_empty() {
        outcome.summary = truncate_chars(text.trim(), SUMMARY_FALLBACK_CHARS);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reply() {
        let reply = "Thinking...\n\
            RESULT_STATUS: success\n\
            RESULT_SUMMARY: Wrote the report\n\
            RESULT_OUTPUT: report.md\n\
            RESULT_DECISIONS: Used the short template\n\
            RESULT_ERRORS: None\n\
            RESULT_REMAINING: None\n";
        let outcome = parse_response(reply);
        assert_eq!(outcome.status, OutcomeStatus::Done);
        assert_eq!(outcome.summary, "Wrote the report");
        assert_eq!(outcome.output, "report.md");
        assert_eq!(outcome.decisions, "Used the short template");
        assert_eq!(outcome.remaining, "None");
    }

    #[test]
    fn test_parse_failed_and_in_progress() {
        assert_eq!(parse_response("RESULT_STATUS: FAILED").status, OutcomeStatus::Failed);
        let partial = parse_response("RESULT_STATUS: in_progress\nRESULT_REMAINING: tests");
        assert_eq!(partial.status, OutcomeStatus::InProgress);
        assert_eq!(partial.remaining, "tests");
    }

    #[test]
    fn test_parse_unstructured_reply() {
        let reply = "x".repeat(300);
        let outcome = parse_response(&reply);
        assert_eq!(outcome.status, OutcomeStatus::InProgress);
        assert_eq!(outcome.summary.chars().count(), 200);
        assert_eq!(outcome.output, reply);
        assert!(outcome.remaining.starts_with("Unknown"));
    }
}
