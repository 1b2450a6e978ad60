//! Plain-language replies.
//!
//! Rendering is a pure function of the turn result. Every reply contains at
//! most one question, and errors are described by kind only, so nothing from
//! storage or the oracle ever reaches the user verbatim (validation details
//! are our own messages).

use crate::domain::errors::ErrorKind;
use crate::domain::models::{
    ClarificationNeed, Operation, OutcomeStatus, SkipReason, SmallTalk, Task, TaskFilter,
    ToolCallOutcome, ToolResult, TurnResult,
};

const GREETING: &str = "Hi! I can keep track of your to-do list. Tell me what to add, \
show, change, complete or delete.";

const HELP: &str = "Here's what I can do:\n\
- add tasks: \"add buy milk\" or \"remind me to call mom - about Sunday\"\n\
- show tasks: \"show my tasks\", \"what's pending\", \"list completed tasks\"\n\
- change a task: \"rename task 3 to buy oat milk\"\n\
- complete a task: \"mark task 3 as done\" or \"complete the second one\"\n\
- delete a task: \"delete task 3\"\n\
You can ask for several things at once, like \"add eggs and complete it\".";

const REASONING_UNAVAILABLE: &str =
    "Sorry, I'm having trouble understanding requests right now. Please try again in a moment.";

/// Render the reply for one turn.
pub fn format_reply(result: &TurnResult) -> String {
    match result {
        TurnResult::Executed { outcomes, follow_up } => {
            let mut lines: Vec<String> = outcomes
                .iter()
                .filter(|outcome| follow_up.is_none() || !is_not_found(outcome))
                .filter_map(outcome_line)
                .collect();
            if let Some(need) = follow_up {
                lines.push(question(need));
            }
            lines.join("\n")
        }
        TurnResult::ClarificationNeeded { need } => question(need),
        TurnResult::SmallTalk { kind } => match kind {
            SmallTalk::Greeting => GREETING.to_string(),
            SmallTalk::Help => HELP.to_string(),
            SmallTalk::Unclear => question(&ClarificationNeed::Unclear),
        },
        TurnResult::ReasoningUnavailable => REASONING_UNAVAILABLE.to_string(),
    }
}

fn is_not_found(outcome: &ToolCallOutcome) -> bool {
    matches!(
        outcome.status,
        OutcomeStatus::Failed {
            kind: ErrorKind::NotFound,
            ..
        }
    )
}

fn outcome_line(outcome: &ToolCallOutcome) -> Option<String> {
    match &outcome.status {
        OutcomeStatus::Succeeded { result } => Some(success_line(result)),
        OutcomeStatus::Failed { kind, detail } => Some(failure_line(outcome, *kind, detail.as_deref())),
        OutcomeStatus::Skipped {
            reason: SkipReason::DependencyFailed,
        } => Some(format!(
            "I didn't {} it because the step before it didn't work.",
            verb(outcome.operation)
        )),
        // The follow-up question already explains why the turn stopped.
        OutcomeStatus::Skipped {
            reason: SkipReason::AwaitingClarification,
        } => None,
    }
}

fn success_line(result: &ToolResult) -> String {
    match result {
        ToolResult::Created { task } => format!("Added {}.", name(task.id, &task.title)),
        ToolResult::Updated { task } => format!("Updated {}.", name(task.id, &task.title)),
        ToolResult::Completed {
            task,
            already_completed: false,
        } => format!("Marked {} as done.", name(task.id, &task.title)),
        ToolResult::Completed {
            task,
            already_completed: true,
        } => format!("{} was already done.", capitalize(&name(task.id, &task.title))),
        ToolResult::Deleted { task } => format!("Deleted {}.", name(task.id, &task.title)),
        ToolResult::Listed { filter, tasks } => listing(*filter, tasks),
    }
}

fn failure_line(outcome: &ToolCallOutcome, kind: ErrorKind, detail: Option<&str>) -> String {
    let action = verb(outcome.operation);
    let subject = outcome
        .target
        .map_or_else(|| "that task".to_string(), |id| format!("task #{id}"));
    match (kind, detail) {
        (ErrorKind::Validation, Some(detail)) => {
            format!("I couldn't {action} {subject}: {}.", detail.trim_end_matches('.'))
        }
        (ErrorKind::NotFound, _) => format!("I couldn't find {subject}."),
        _ => format!("Something went wrong while trying to {action} {subject}. Please try again."),
    }
}

fn listing(filter: TaskFilter, tasks: &[Task]) -> String {
    let adjective = match filter {
        TaskFilter::All => "",
        TaskFilter::Pending => "pending ",
        TaskFilter::Completed => "completed ",
    };
    if tasks.is_empty() {
        return format!("You have no {adjective}tasks.");
    }

    let mut lines = vec![format!("Your {adjective}tasks:")];
    for task in tasks {
        let mark = if task.completed { 'x' } else { ' ' };
        lines.push(format!("  #{} [{mark}] {}", task.id, single_line(&task.title)));
        if let Some(description) = &task.description {
            lines.push(format!("      - {}", single_line(description)));
        }
    }
    lines.join("\n")
}

fn question(need: &ClarificationNeed) -> String {
    match need {
        ClarificationNeed::MissingTitle => "What should the new task be called?".to_string(),
        ClarificationNeed::MissingTarget { operation } => format!(
            "Which task do you want to {}? You can say \"task 3\" or \"the second one\" after listing your tasks.",
            verb(*operation)
        ),
        ClarificationNeed::MissingChanges { task_id: Some(id) } => {
            format!("What should I change task #{id} to?")
        }
        ClarificationNeed::MissingChanges { task_id: None } => {
            "What should I change about that task?".to_string()
        }
        ClarificationNeed::TitleNotMatched { operation, title } => format!(
            "I couldn't find a task called \"{}\". Which task do you want to {}?",
            question_text(title),
            verb(*operation)
        ),
        ClarificationNeed::AmbiguousTitle { operation, title } => format!(
            "More than one task is called \"{}\". Which one do you want to {} (for example \"task 3\")?",
            question_text(title),
            verb(*operation)
        ),
        ClarificationNeed::TaskNotFound { task_id } => {
            format!("I couldn't find task #{task_id}. Which task did you mean?")
        }
        ClarificationNeed::Unclear => {
            "Sorry, I didn't catch that. What would you like to do with your tasks?".to_string()
        }
    }
}

fn verb(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "add",
        Operation::List => "list",
        Operation::Update => "change",
        Operation::Complete => "complete",
        Operation::Delete => "delete",
        Operation::None => "do",
    }
}

/// `task #3 "buy milk"`: the form the context builder reads back.
fn name(id: i64, title: &str) -> String {
    format!("task #{id} \"{}\"", single_line(title).replace('"', "'"))
}

/// Keep user text on one line.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// User text quoted inside a question; the question's own mark stays the only one.
fn question_text(text: &str) -> String {
    single_line(text).replace('?', "")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
