//! Binds oracle proposals to concrete tasks.
//!
//! Resolution is a pure function of the conversation context and the
//! proposals. It never reads storage: a reference is bound only to a task id
//! the user typed or a task the assistant already showed them. Existence and
//! ownership are checked later by the ownership guard.

use std::collections::BTreeSet;

use crate::domain::models::{
    ClarificationNeed, ConversationContext, IntentField, IntentParams, IntentProposal,
    IntentTarget, Operation, ResolvedIntent, SmallTalk, TaskHandle, TaskReference,
};

/// Proposals below this confidence are treated as unclear.
pub const MIN_CONFIDENCE: f32 = 0.5;

/// Resolve every proposal of a turn, in order.
pub fn resolve(context: &ConversationContext, proposals: &[IntentProposal]) -> Vec<ResolvedIntent> {
    proposals
        .iter()
        .enumerate()
        .map(|(index, proposal)| {
            let previous = index.checked_sub(1).map(|i| &proposals[i]);
            resolve_one(context, proposal, previous)
        })
        .collect()
}

fn resolve_one(
    context: &ConversationContext,
    proposal: &IntentProposal,
    previous: Option<&IntentProposal>,
) -> ResolvedIntent {
    let mut resolved = ResolvedIntent {
        operation: proposal.operation,
        params: IntentParams {
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            target: None,
            filter: proposal.filter.unwrap_or_default(),
        },
        confidence: proposal.confidence,
        ambiguous: false,
        missing_fields: BTreeSet::new(),
        small_talk: proposal.small_talk,
        clarification: None,
    };

    if proposal.operation == Operation::None {
        return resolved;
    }

    if proposal.confidence.is_nan() || proposal.confidence < MIN_CONFIDENCE {
        return mark(resolved, ClarificationNeed::Unclear, None);
    }

    if proposal.operation.requires_target() {
        match bind_target(context, proposal, previous) {
            Ok(target) => resolved.params.target = Some(target),
            Err(need) => resolved = mark(resolved, need, Some(IntentField::Target)),
        }
    }

    match proposal.operation {
        Operation::Create if proposal.title.is_none() => {
            resolved = mark(resolved, ClarificationNeed::MissingTitle, Some(IntentField::Title));
        }
        Operation::Update if proposal.title.is_none() && proposal.description.is_none() => {
            let task_id = match resolved.params.target {
                Some(IntentTarget::Task(id)) => Some(id),
                _ => None,
            };
            resolved = mark(
                resolved,
                ClarificationNeed::MissingChanges { task_id },
                Some(IntentField::Changes),
            );
        }
        _ => {}
    }

    resolved
}

/// Flag the intent as ambiguous. The first need recorded is the one asked.
fn mark(
    mut resolved: ResolvedIntent,
    need: ClarificationNeed,
    field: Option<IntentField>,
) -> ResolvedIntent {
    resolved.ambiguous = true;
    resolved.missing_fields.extend(field);
    resolved.clarification.get_or_insert(need);
    resolved
}

fn bind_target(
    context: &ConversationContext,
    proposal: &IntentProposal,
    previous: Option<&IntentProposal>,
) -> Result<IntentTarget, ClarificationNeed> {
    let operation = proposal.operation;
    let missing = || ClarificationNeed::MissingTarget { operation };
    let surfaced = &context.surfaced;

    let Some(reference) = &proposal.target else {
        return Err(missing());
    };

    match reference {
        TaskReference::Id(id) => Ok(IntentTarget::Task(*id)),
        TaskReference::Pronoun => {
            let follows_task = previous.is_some_and(|p| p.operation.yields_task());
            if proposal.chained && follows_task {
                Ok(IntentTarget::PreviousResult)
            } else {
                surfaced
                    .latest_single()
                    .map(|handle| IntentTarget::Task(handle.id))
                    .ok_or_else(missing)
            }
        }
        TaskReference::Ordinal(position) => position
            .checked_sub(1)
            .and_then(|i| surfaced.listed.get(i))
            .map(|handle| IntentTarget::Task(handle.id))
            .ok_or_else(missing),
        TaskReference::Last => surfaced
            .listed
            .last()
            .map(|handle| IntentTarget::Task(handle.id))
            .ok_or_else(missing),
        TaskReference::Title(title) => {
            let wanted = title.trim().to_lowercase();
            let matches: Vec<&TaskHandle> = surfaced
                .all()
                .into_iter()
                .filter(|handle| handle.title.trim().to_lowercase() == wanted)
                .collect();
            match matches.as_slice() {
                [handle] => Ok(IntentTarget::Task(handle.id)),
                [] => Err(ClarificationNeed::TitleNotMatched {
                    operation,
                    title: title.clone(),
                }),
                _ => Err(ClarificationNeed::AmbiguousTitle {
                    operation,
                    title: title.clone(),
                }),
            }
        }
    }
}

/// Whether a resolved intent asks for any tool at all.
pub fn is_operational(intent: &ResolvedIntent) -> bool {
    intent.operation != Operation::None
}

/// The small talk a turn with no operations should answer with.
pub fn small_talk_of(intents: &[ResolvedIntent]) -> SmallTalk {
    if intents.iter().any(|i| i.small_talk == Some(SmallTalk::Help)) {
        SmallTalk::Help
    } else if !intents.is_empty()
        && intents.iter().all(|i| i.small_talk == Some(SmallTalk::Greeting))
    {
        SmallTalk::Greeting
    } else {
        SmallTalk::Unclear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskFilter;
    use uuid::Uuid;

    fn handle(id: i64, title: &str) -> TaskHandle {
        TaskHandle {
            id,
            title: title.to_string(),
        }
    }

    fn context() -> ConversationContext {
        let mut context = ConversationContext::empty(Uuid::new_v4(), "alice");
        context.surfaced.listed = vec![handle(4, "buy milk"), handle(7, "call mom"), handle(9, "Buy Milk")];
        context
    }

    fn resolve_single(context: &ConversationContext, proposal: IntentProposal) -> ResolvedIntent {
        resolve(context, &[proposal]).remove(0)
    }

    #[test]
    fn test_explicit_id_is_bound_without_context() {
        let context = ConversationContext::empty(Uuid::new_v4(), "alice");
        let resolved = resolve_single(
            &context,
            IntentProposal::new(Operation::Complete).with_target(TaskReference::Id(12)),
        );
        assert!(!resolved.ambiguous);
        assert_eq!(resolved.params.target, Some(IntentTarget::Task(12)));
    }

    #[test]
    fn test_ordinal_and_last_use_last_listing() {
        let context = context();
        let second = resolve_single(
            &context,
            IntentProposal::new(Operation::Delete).with_target(TaskReference::Ordinal(2)),
        );
        assert_eq!(second.params.target, Some(IntentTarget::Task(7)));

        let last = resolve_single(
            &context,
            IntentProposal::new(Operation::Delete).with_target(TaskReference::Last),
        );
        assert_eq!(last.params.target, Some(IntentTarget::Task(9)));

        let out_of_range = resolve_single(
            &context,
            IntentProposal::new(Operation::Delete).with_target(TaskReference::Ordinal(5)),
        );
        assert!(out_of_range.ambiguous);
        assert!(out_of_range.missing_fields.contains(&IntentField::Target));
    }

    #[test]
    fn test_duplicate_titles_are_ambiguous() {
        let resolved = resolve_single(
            &context(),
            IntentProposal::new(Operation::Complete).with_target(TaskReference::Title("buy milk".into())),
        );
        assert!(resolved.ambiguous);
        assert!(matches!(
            resolved.clarification,
            Some(ClarificationNeed::AmbiguousTitle { .. })
        ));
    }

    #[test]
    fn test_unique_title_is_bound() {
        let resolved = resolve_single(
            &context(),
            IntentProposal::new(Operation::Complete).with_target(TaskReference::Title("CALL MOM".into())),
        );
        assert_eq!(resolved.params.target, Some(IntentTarget::Task(7)));
    }

    #[test]
    fn test_pronoun_chains_on_previous_create() {
        let context = ConversationContext::empty(Uuid::new_v4(), "alice");
        let resolved = resolve(
            &context,
            &[
                IntentProposal::new(Operation::Create).with_title("milk"),
                IntentProposal::new(Operation::Complete)
                    .with_target(TaskReference::Pronoun)
                    .chained(),
            ],
        );
        assert!(resolved.iter().all(|r| !r.ambiguous));
        assert!(resolved[1].is_chained());
    }

    #[test]
    fn test_pronoun_without_referent_is_ambiguous() {
        let resolved = resolve_single(
            &context(),
            IntentProposal::new(Operation::Delete).with_target(TaskReference::Pronoun),
        );
        assert!(resolved.ambiguous);
        assert_eq!(
            resolved.clarification,
            Some(ClarificationNeed::MissingTarget {
                operation: Operation::Delete
            })
        );
    }

    #[test]
    fn test_pronoun_uses_single_task_of_latest_reply() {
        let mut context = context();
        context.surfaced.latest = vec![handle(7, "call mom")];
        let resolved = resolve_single(
            &context,
            IntentProposal::new(Operation::Delete).with_target(TaskReference::Pronoun),
        );
        assert_eq!(resolved.params.target, Some(IntentTarget::Task(7)));
    }

    #[test]
    fn test_missing_fields() {
        let context = context();
        let create = resolve_single(&context, IntentProposal::new(Operation::Create));
        assert_eq!(create.clarification, Some(ClarificationNeed::MissingTitle));

        let empty_title = resolve_single(&context, IntentProposal::new(Operation::Create).with_title(""));
        assert!(!empty_title.ambiguous);

        let update = resolve_single(
            &context,
            IntentProposal::new(Operation::Update).with_target(TaskReference::Id(4)),
        );
        assert_eq!(
            update.clarification,
            Some(ClarificationNeed::MissingChanges { task_id: Some(4) })
        );
    }

    #[test]
    fn test_low_confidence_is_unclear() {
        let resolved = resolve_single(
            &context(),
            IntentProposal::new(Operation::List).with_confidence(0.3),
        );
        assert!(resolved.ambiguous);
        assert_eq!(resolved.clarification, Some(ClarificationNeed::Unclear));
    }

    #[test]
    fn test_list_defaults_to_all() {
        let resolved = resolve_single(&context(), IntentProposal::new(Operation::List));
        assert_eq!(resolved.params.filter, TaskFilter::All);
    }

    #[test]
    fn test_small_talk_of() {
        let context = context();
        let greeting = resolve(&context, &[IntentProposal::small_talk(SmallTalk::Greeting, 0.9)]);
        assert_eq!(small_talk_of(&greeting), SmallTalk::Greeting);

        let help = resolve(
            &context,
            &[
                IntentProposal::small_talk(SmallTalk::Greeting, 0.9),
                IntentProposal::small_talk(SmallTalk::Help, 0.9),
            ],
        );
        assert_eq!(small_talk_of(&help), SmallTalk::Help);
        assert_eq!(small_talk_of(&[]), SmallTalk::Unclear);
    }
}
