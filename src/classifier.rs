use tracing::{debug, info};

use crate::error::{ClassificationParseError, ClassifierError};
use crate::llm::{LlmClient, LlmConfig};
use crate::models::{AgentMessage, Issue, Verdict};

const SUCCESS_MARKER: &str = "--- success";
const EXPLANATION_MARKER: &str = "--- explanation";
const NO_FEEDBACK_EXPLANATION: &str = "No feedback was found to process";

/// Judge whether the agent's recorded actions addressed each feedback item
/// on `issue`
///
/// Thread comments outrank review comments as the feedback source. With
/// neither present the verdict is a deterministic failure and the model is
/// never contacted.
pub async fn guess_success(
    llm: &LlmClient,
    issue: &Issue,
    history: &[AgentMessage],
    config: &LlmConfig,
) -> Result<Verdict, ClassifierError> {
    let feedback = match issue.feedback() {
        Some(items) => items,
        None => {
            info!(number = issue.number, "No feedback to classify");
            return Ok(Verdict {
                success: false,
                per_item: None,
                explanation: NO_FEEDBACK_EXPLANATION.to_string(),
            });
        }
    };

    let closing_issues = issue.closing_issues.as_deref().unwrap_or_default();
    let prompt = build_prompt(feedback, closing_issues, history);
    let response = llm.complete(&prompt, config).await?;
    let (per_item, explanation) = parse_response(&response, feedback.len())?;

    let success = per_item.iter().all(|addressed| *addressed);
    debug!(
        number = issue.number,
        success,
        items = per_item.len(),
        "Classified feedback"
    );

    Ok(Verdict {
        success,
        per_item: Some(per_item),
        explanation,
    })
}

fn build_prompt(
    feedback: &[String],
    closing_issues: &[String],
    history: &[AgentMessage],
) -> String {
    let mut prompt = String::from(
        "You are evaluating whether an automated agent's changes addressed \
         the feedback left on a GitHub issue or pull request.\n\n",
    );

    if closing_issues.is_empty() {
        prompt.push_str("No linked issues provide extra context.\n\n");
    } else {
        prompt.push_str("Context from issues this pull request claims to close:\n");
        for issue_text in closing_issues {
            prompt.push_str(&format!("- {}\n", issue_text.replace('\n', " ")));
        }
        prompt.push('\n');
    }

    prompt.push_str("Feedback items to evaluate:\n");
    for (index, item) in feedback.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", index + 1, item));
    }

    prompt.push_str("\nThe agent's actions, in order:\n");
    for message in history {
        prompt.push_str(&message.content);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nDecide, for each feedback item, whether the agent's actions \
         addressed it. Answer in exactly this format:\n\n\
         {}\n\
         [one line per feedback item, `true` or `false`, in the order listed above]\n\n\
         {}\n\
         [your reasoning]\n",
        SUCCESS_MARKER, EXPLANATION_MARKER
    ));

    prompt
}

/// Split the model's reply into per-item verdicts and the explanation
///
/// Strict on purpose: a malformed reply becomes a parse error carrying the
/// raw text, never a silently guessed verdict.
fn parse_response(
    raw: &str,
    expected: usize,
) -> Result<(Vec<bool>, String), ClassificationParseError> {
    let parse_error = |reason: String| ClassificationParseError {
        reason,
        raw: raw.to_string(),
    };

    let (_, after_success) = raw
        .split_once(SUCCESS_MARKER)
        .ok_or_else(|| parse_error(format!("missing `{}` section", SUCCESS_MARKER)))?;
    let (verdict_block, explanation) = after_success
        .split_once(EXPLANATION_MARKER)
        .ok_or_else(|| parse_error(format!("missing `{}` section", EXPLANATION_MARKER)))?;

    let mut per_item = Vec::new();
    for line in verdict_block.lines() {
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("true") {
            per_item.push(true);
        } else if token.eq_ignore_ascii_case("false") {
            per_item.push(false);
        } else {
            return Err(parse_error(format!("unrecognized verdict token `{}`", token)));
        }
    }

    if per_item.len() != expected {
        return Err(parse_error(format!(
            "expected {} verdicts, found {}",
            expected,
            per_item.len()
        )));
    }

    Ok((per_item, explanation.trim().to_string()))
}
