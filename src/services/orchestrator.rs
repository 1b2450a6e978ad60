//! Turn orchestration: resolve, validate, execute.
//!
//! A turn moves through `Resolving -> Validating -> Executing -> Done`, or
//! stops at `AwaitingClarification` when any intent is ambiguous. Tool calls
//! run one at a time in the order the user stated them.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::intent_resolver::{is_operational, resolve, small_talk_of};
use super::ownership_guard::OwnershipGuard;
use super::retry::RetryPolicy;
use crate::domain::errors::{DomainError, ErrorKind};
use crate::domain::models::{
    ClarificationNeed, ConversationContext, IntentTarget, Operation, OutcomeStatus,
    ResolvedIntent, SkipReason, SmallTalk, TaskId, ToolCall, ToolCallOutcome, TurnResult,
};
use crate::domain::ports::{ReasoningOracle, TaskRepository};

/// Lifecycle of one turn, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Resolving,
    Validating,
    Executing,
    AwaitingClarification,
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::AwaitingClarification => "awaiting_clarification",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator<T: TaskRepository> {
    oracle: Arc<dyn ReasoningOracle>,
    guard: OwnershipGuard<T>,
    retry: RetryPolicy,
}

impl<T: TaskRepository> Orchestrator<T> {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, guard: OwnershipGuard<T>, retry: RetryPolicy) -> Self {
        Self {
            oracle,
            guard,
            retry,
        }
    }

    /// Run one turn against an already-built context.
    #[instrument(skip_all, fields(conversation_id = %context.conversation_id, owner_id = %context.owner_id))]
    pub async fn run_turn(&self, context: &ConversationContext, message: &str) -> TurnResult {
        debug!(state = %TurnState::Resolving, oracle = self.oracle.name());
        let proposals = match self.oracle.interpret(context, message).await {
            Ok(proposals) => proposals,
            Err(err) => {
                warn!(error = %err, "reasoning oracle failed");
                return TurnResult::ReasoningUnavailable;
            }
        };
        let intents = resolve(context, &proposals);

        debug!(state = %TurnState::Validating, intents = intents.len());
        let operations: Vec<ResolvedIntent> = intents.iter().filter(|i| is_operational(i)).cloned().collect();
        if operations.is_empty() {
            let kind = small_talk_of(&intents);
            debug!(state = %TurnState::Done, ?kind, "no operations requested");
            return match kind {
                SmallTalk::Unclear => TurnResult::ClarificationNeeded {
                    need: ClarificationNeed::Unclear,
                },
                kind => TurnResult::SmallTalk { kind },
            };
        }

        if let Some(intent) = operations.iter().find(|i| i.ambiguous) {
            let need = intent.clarification.clone().unwrap_or(ClarificationNeed::Unclear);
            info!(state = %TurnState::AwaitingClarification, ?need, "turn needs clarification");
            return TurnResult::ClarificationNeeded { need };
        }

        debug!(state = %TurnState::Executing, steps = operations.len());
        let (outcomes, follow_up) = self.execute(&context.owner_id, &operations).await;

        let state = if follow_up.is_some() {
            TurnState::AwaitingClarification
        } else {
            TurnState::Done
        };
        info!(
            state = %state,
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            steps = outcomes.len(),
            "turn finished"
        );
        TurnResult::Executed { outcomes, follow_up }
    }

    async fn execute(
        &self,
        owner_id: &str,
        intents: &[ResolvedIntent],
    ) -> (Vec<ToolCallOutcome>, Option<ClarificationNeed>) {
        let mut outcomes = Vec::with_capacity(intents.len());
        let mut previous_task: Option<TaskId> = None;

        for (index, intent) in intents.iter().enumerate() {
            let Some(call) = tool_call(intent, previous_task) else {
                debug!(step = index, "dependency unavailable, skipping");
                outcomes.push(ToolCallOutcome::skipped(intent.operation, SkipReason::DependencyFailed));
                previous_task = None;
                continue;
            };

            let guard = &self.guard;
            let call = &call;
            let attempt = self
                .retry
                .execute(move || async move { guard.execute(owner_id, call).await })
                .await;

            let target = call.target();
            match attempt.result {
                Ok(result) => {
                    previous_task = result.produced_task();
                    outcomes.push(ToolCallOutcome {
                        operation: intent.operation,
                        target,
                        status: OutcomeStatus::Succeeded { result },
                        retried: attempt.retried,
                    });
                }
                Err(DomainError::TaskNotFound(task_id)) => {
                    debug!(step = index, task_id, "target not found, stopping turn");
                    outcomes.push(failed(intent.operation, target, ErrorKind::NotFound, None, attempt.retried));
                    outcomes.extend(intents[index + 1..].iter().map(|rest| {
                        ToolCallOutcome::skipped(rest.operation, SkipReason::AwaitingClarification)
                    }));
                    return (outcomes, Some(ClarificationNeed::TaskNotFound { task_id }));
                }
                Err(err) => {
                    warn!(step = index, error = %err, "tool call failed");
                    let kind = err.kind();
                    let detail = match err {
                        DomainError::ValidationFailed(detail) => Some(detail),
                        _ => None,
                    };
                    outcomes.push(failed(intent.operation, target, kind, detail, attempt.retried));
                    previous_task = None;
                }
            }
        }

        (outcomes, None)
    }
}

fn failed(
    operation: Operation,
    target: Option<TaskId>,
    kind: ErrorKind,
    detail: Option<String>,
    retried: bool,
) -> ToolCallOutcome {
    ToolCallOutcome {
        operation,
        target,
        status: OutcomeStatus::Failed { kind, detail },
        retried,
    }
}

/// Build the concrete call for a validated intent. `None` when it depends on
/// a previous result that does not exist.
fn tool_call(intent: &ResolvedIntent, previous_task: Option<TaskId>) -> Option<ToolCall> {
    let params = &intent.params;
    let target = || match params.target? {
        IntentTarget::Task(id) => Some(id),
        IntentTarget::PreviousResult => previous_task,
    };

    let call = match intent.operation {
        Operation::Create => ToolCall::Create {
            title: params.title.clone()?,
            description: params.description.clone(),
        },
        Operation::List => ToolCall::List {
            filter: params.filter,
        },
        Operation::Update => ToolCall::Update {
            task_id: target()?,
            title: params.title.clone(),
            description: params.description.clone(),
        },
        Operation::Complete => ToolCall::Complete { task_id: target()? },
        Operation::Delete => ToolCall::Delete { task_id: target()? },
        Operation::None => return None,
    };
    Some(call)
}
