//! Prompt construction for language-model executors.

use super::ExecutionRequest;

const REPLY_CONTRACT: &str = "\
1. Analyze the task against the skill's execution steps.
2. Produce the outputs the skill requires.
3. A task is complete only when you report `RESULT_STATUS: done`. If work
   remains, report `in_progress` and describe what still needs to happen;
   you will be invoked again with that description.
4. Reply in exactly this format:

RESULT_STATUS: <done | in_progress | failed>
RESULT_SUMMARY: <one or two sentences>
RESULT_OUTPUT: <the output or artifact produced>
RESULT_DECISIONS: <choices you made>
RESULT_ERRORS: <None, or the issues encountered>
RESULT_REMAINING: <None if done, or the remaining work>
";

/// Render the full prompt: constitution, skill, recalled memory, task,
/// prior progress, reply contract
pub fn build_prompt(request: &ExecutionRequest) -> String {
    let mut prompt = String::from("You are a task executor operating under the rules below.\n");

    prompt.push_str("\n== CONSTITUTIONAL AUTHORITY ==\n");
    prompt.push_str("You must obey these rules.\n");
    prompt.push_str(request.constitution.trim_end());
    prompt.push('\n');

    prompt.push_str(&format!(
        "\n== ACTIVE SKILL: {} ({}) ==\n",
        request.skill.name, request.skill.skill_id
    ));
    prompt.push_str(request.skill_context.trim_end());
    prompt.push('\n');

    if let Some(note) = &request.memory_note {
        prompt.push_str("\n== MEMORY INFLUENCE ==\n");
        prompt.push_str("Lessons from earlier tasks. Apply them where they fit.\n");
        prompt.push_str(note.trim_end());
        prompt.push('\n');
    }

    prompt.push_str(&format!("\n== TASK TO PROCESS: {} ==\n", request.task_id));
    prompt.push_str(request.content.trim());
    prompt.push('\n');

    if let Some(remaining) = &request.prior_remaining {
        prompt.push_str(&format!(
            "\n== PROGRESS SO FAR (cycle {}) ==\nRemaining work from the previous cycle:\n{}\n",
            request.cycle, remaining
        ));
    }

    prompt.push_str("\n== INSTRUCTIONS ==\n");
    prompt.push_str(REPLY_CONTRACT);
    prompt
}
