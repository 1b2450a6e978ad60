//! Deterministic rule-based reasoning oracle.
//!
//! Splits a message into clauses and classifies each by its leading verb.
//! It needs no network and always answers, which makes it the default
//! provider and the one the test suite drives.

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ConversationContext, IntentProposal, Operation, SmallTalk, TaskFilter, TaskReference,
};
use crate::domain::ports::ReasoningOracle;

const VERB_CONFIDENCE: f32 = 0.9;
const INHERITED_CONFIDENCE: f32 = 0.8;
const UNCLEAR_CONFIDENCE: f32 = 0.2;

/// Marks a quoted span while clauses are split.
const QUOTE_MARK: char = '\u{1}';

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

struct Patterns {
    greeting: Regex,
    help: Regex,
    quoted: Regex,
    placeholder: Regex,
    separator: Regex,
    polite_prefix: Regex,
    polite_suffix: Regex,
    create: Regex,
    create_filler: Regex,
    list_suffix: Regex,
    quoted_title: Regex,
    dash_description: Regex,
    paren_description: Regex,
    with_description: Regex,
    list: Regex,
    list_noun: Regex,
    pending_words: Regex,
    completed_words: Regex,
    mark_done: Regex,
    is_done: Regex,
    complete: Regex,
    delete: Regex,
    update: Regex,
    update_field_of: Regex,
    update_field: Regex,
    update_to: Regex,
    id_ref: Regex,
    ordinal_ref: Regex,
    last_ref: Regex,
    pronoun_ref: Regex,
    title_noise: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            greeting: re(r"(?i)^(?:hi|hello|hey|hiya|howdy|good (?:morning|afternoon|evening))(?:\s+there)?$"),
            help: re(r"(?i)^(?:help|help me|what can you do|what do you do|how does this work|how do i use this|commands)$"),
            quoted: re(r#""([^"]*)""#),
            placeholder: re("\u{1}(\\d+)\u{1}"),
            separator: re(r"(?i)\s*;\s*|\s*,\s*(?:and\s+)?(?:then\s+)?|\s+and\s+then\s+|\s+then\s+|\s+and\s+|\s+also\s+"),
            polite_prefix: re(r"(?i)^(?:(?:please|pls|can you|could you|would you|kindly|now|also|ok|okay)[\s,]+)+"),
            polite_suffix: re(r"(?i)[\s,]+(?:please|pls|thanks|thank you)$"),
            create: re(r"(?i)^(?:add|create|new task|new|remember to|remind me to|i need to|i have to|make a (?:new\s+)?task(?:\s+to)?|put)\b\s*(.*)$"),
            create_filler: re(r"(?i)^(?:an?\s+)?(?:new\s+)?(?:task|item|todo|to-do)s?\b\s*(?:to|called|named|titled|for|:)?\s*"),
            list_suffix: re(r"(?i)\s+(?:to|on|in|onto|from|off)\s+(?:my|the)\s+(?:list|tasks|task list|todo list|to-do list|todos)$"),
            quoted_title: re("^\u{1}([^\u{1}]*)\u{1}\\s*(.*)$"),
            dash_description: re(r"^(.*?)\s+[-–]\s+(.+)$"),
            paren_description: re(r"^(.*?)\s*\(([^()]+)\)$"),
            with_description: re(r"(?i)^(.*?)\s+with (?:the )?(?:description|details?|note)\s*:?\s+(.+)$"),
            list: re(r"(?i)^(?:show|list|view|display|see|give me|what are|what's on|whats on|what is on|what's left|whats left|what do i have|what have i got)\b(.*)$"),
            list_noun: re(r"(?i)^(?:my\s+)?(?:(?:pending|open|remaining|completed|done|finished)\s+)?(?:tasks|todos|to-dos|list|todo list|to-do list)$"),
            pending_words: re(r"(?i)\b(?:pending|open|remaining|incomplete|unfinished|outstanding|left|not done|to do)\b"),
            completed_words: re(r"(?i)\b(?:completed|done|finished|complete)\b"),
            mark_done: re(r"(?i)^(?:mark|set|check)\s+(.+?)\s+(?:as\s+)?(?:done|complete|completed|finished)$"),
            is_done: re(r"(?i)^(.+?)\s+is\s+(?:done|complete|completed|finished)$"),
            complete: re(r"(?i)^(?:completed?|finish(?:ed)?|check off|tick off|done with|i(?:'ve| have)? finished|i(?:'ve| have)? completed|i(?:'ve| have)? done|i did)\b\s*(.*)$"),
            delete: re(r"(?i)^(?:delete|remove|cancel|drop|erase|get rid of|forget about|forget|trash)\b\s*(.*)$"),
            update: re(r"(?i)^(?:update|change|rename|edit|modify|set)\b\s*(.*)$"),
            update_field_of: re(r"(?i)^(?:the\s+)?(description|title|name)\s+(?:of|for|on)\s+(.+?)\s+to\s+(.*)$"),
            update_field: re(r"(?i)^(.+?)(?:'s)?\s+(description|title|name)\s+to\s+(.*)$"),
            update_to: re(r"(?i)^(.+?)\s+(?:to|into|as)\s+(.*)$"),
            id_ref: re(r"(?i)^(?:the\s+)?(?:task|item|todo|number|no\.?)?\s*(?:#|number\s+|no\.?\s*)?(\d+)$"),
            ordinal_ref: re(r"(?i)^(?:the\s+)?(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|\d+(?:st|nd|rd|th))(?:\s+(?:one|task|item))?(?:\s+(?:on|in)\s+(?:the|my)\s+list)?$"),
            last_ref: re(r"(?i)^(?:the\s+)?(?:last|final|latest|bottom)(?:\s+(?:one|task|item))?(?:\s+(?:on|in)\s+(?:the|my)\s+list)?$"),
            pronoun_ref: re(r"(?i)^(?:it|that|this|them|that one|this one|that task|this task|the task|it too|that too)$"),
            title_noise: re(r"(?i)^(?:the\s+)?(?:task|item|todo)\s+(?:called|named|titled)?\s*"),
        }
    }
}

/// Rule-based oracle. Cheap to construct; holds only compiled patterns.
pub struct PatternOracle {
    patterns: Patterns,
}

impl Default for PatternOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningOracle for PatternOracle {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn interpret(
        &self,
        _context: &ConversationContext,
        message: &str,
    ) -> DomainResult<Vec<IntentProposal>> {
        Ok(self.parse(message))
    }
}

impl PatternOracle {
    pub fn new() -> Self {
        Self {
            patterns: Patterns::new(),
        }
    }

    /// Interpret one message into proposals, in the order stated.
    pub fn parse(&self, message: &str) -> Vec<IntentProposal> {
        let p = &self.patterns;
        let text = normalize(message);

        if text.is_empty() {
            return vec![IntentProposal::small_talk(SmallTalk::Unclear, UNCLEAR_CONFIDENCE)];
        }
        if p.greeting.is_match(&text) {
            return vec![IntentProposal::small_talk(SmallTalk::Greeting, VERB_CONFIDENCE)];
        }
        if p.help.is_match(&text) {
            return vec![IntentProposal::small_talk(SmallTalk::Help, VERB_CONFIDENCE)];
        }

        let mut proposals: Vec<IntentProposal> = Vec::new();
        let mut carry: Option<Operation> = None;

        for (separator, clause) in self.split_clauses(&text) {
            let clause = self.strip_politeness(&clause);
            if clause.is_empty() {
                continue;
            }

            if let Some(proposal) = self.classify(&clause) {
                carry = Some(proposal.operation);
                proposals.push(self.link_pronoun(proposal, &proposals));
                continue;
            }

            // Verb-less fragments continue the previous clause.
            match carry {
                Some(Operation::Create) => {
                    proposals.push(
                        self.create_from_rest(&clause)
                            .with_confidence(INHERITED_CONFIDENCE),
                    );
                }
                Some(op @ (Operation::Complete | Operation::Delete)) => {
                    let proposal = self.targeted(op, &clause).with_confidence(INHERITED_CONFIDENCE);
                    proposals.push(self.link_pronoun(proposal, &proposals));
                }
                // "rename task 3 to salt and pepper": the fragment is part of the new value.
                Some(Operation::Update) => {
                    let joined = proposals.last_mut().and_then(|last| {
                        let field = if last.title.is_some() {
                            &mut last.title
                        } else {
                            &mut last.description
                        };
                        field.as_mut().map(|value| {
                            value.push_str(&separator);
                            value.push_str(&clause);
                        })
                    });
                    if joined.is_none() {
                        proposals.push(
                            self.targeted(Operation::Update, &clause)
                                .with_confidence(INHERITED_CONFIDENCE),
                        );
                    }
                }
                Some(Operation::List | Operation::None) | None => {
                    carry = Some(Operation::None);
                    proposals.push(IntentProposal::small_talk(
                        SmallTalk::Unclear,
                        UNCLEAR_CONFIDENCE,
                    ));
                }
            }
        }

        if proposals.is_empty() {
            proposals.push(IntentProposal::small_talk(SmallTalk::Unclear, UNCLEAR_CONFIDENCE));
        }
        proposals.into_iter().map(unmask).collect()
    }

    /// Parse a free-text task reference ("task 3", "the second one", "it", "buy milk").
    pub fn parse_reference(&self, text: &str) -> Option<TaskReference> {
        let p = &self.patterns;
        let text = text.trim().trim_matches(QUOTE_MARK).trim();
        if text.is_empty() {
            return None;
        }

        if let Some(caps) = p.id_ref.captures(text) {
            return caps[1].parse().ok().map(TaskReference::Id);
        }
        if let Some(caps) = p.ordinal_ref.captures(text) {
            return ordinal_value(&caps[1]).map(TaskReference::Ordinal);
        }
        if p.last_ref.is_match(text) {
            return Some(TaskReference::Last);
        }
        if p.pronoun_ref.is_match(text) {
            return Some(TaskReference::Pronoun);
        }

        let title = p.title_noise.replace(text, "");
        let title = title.trim().trim_matches(QUOTE_MARK).trim();
        if title.is_empty() {
            None
        } else {
            Some(TaskReference::Title(title.to_string()))
        }
    }

    /// Split on conjunctions and commas outside quotes. Each clause carries the
    /// separator that preceded it so fragments can be rejoined.
    fn split_clauses(&self, text: &str) -> Vec<(String, String)> {
        let p = &self.patterns;

        let mut quoted = Vec::new();
        let masked = p.quoted.replace_all(text, |caps: &regex::Captures<'_>| {
            quoted.push(caps[1].to_string());
            format!("{QUOTE_MARK}{}{QUOTE_MARK}", quoted.len() - 1)
        });

        // Single pass: restored text is never scanned for placeholders again.
        let restore = |s: &str| -> String {
            p.placeholder
                .replace_all(s, |caps: &regex::Captures<'_>| {
                    caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| quoted.get(index))
                        .map_or_else(String::new, |value| format!("{QUOTE_MARK}{value}{QUOTE_MARK}"))
                })
                .into_owned()
        };

        let mut clauses = Vec::new();
        let mut start = 0;
        let mut separator = String::new();
        for m in p.separator.find_iter(&masked) {
            clauses.push((separator, restore(&masked[start..m.start()])));
            separator = m.as_str().to_string();
            start = m.end();
        }
        clauses.push((separator, restore(&masked[start..])));
        clauses
    }

    fn strip_politeness(&self, clause: &str) -> String {
        let p = &self.patterns;
        let clause = p.polite_prefix.replace(clause.trim(), "");
        let clause = p.polite_suffix.replace(&clause, "");
        clause.trim().to_string()
    }

    /// Classify a clause by its leading verb.
    fn classify(&self, clause: &str) -> Option<IntentProposal> {
        let p = &self.patterns;

        if p.list_noun.is_match(clause) {
            return Some(self.list_with_filter(clause));
        }
        if let Some(caps) = p.mark_done.captures(clause).or_else(|| p.is_done.captures(clause)) {
            return Some(self.targeted(Operation::Complete, &caps[1]));
        }
        if let Some(caps) = p.complete.captures(clause) {
            return Some(self.targeted(Operation::Complete, &caps[1]));
        }
        if let Some(caps) = p.delete.captures(clause) {
            return Some(self.targeted(Operation::Delete, &caps[1]));
        }
        if let Some(caps) = p.update.captures(clause) {
            return Some(self.update_from_rest(&caps[1]));
        }
        if p.list.is_match(clause) {
            return Some(self.list_with_filter(clause));
        }
        if let Some(caps) = p.create.captures(clause) {
            return Some(self.create_from_rest(&caps[1]));
        }
        None
    }

    fn targeted(&self, operation: Operation, rest: &str) -> IntentProposal {
        let mut proposal = IntentProposal::new(operation).with_confidence(VERB_CONFIDENCE);
        let rest = self.patterns.list_suffix.replace(rest.trim(), "");
        proposal.target = self.parse_reference(&rest);
        proposal
    }

    fn list_with_filter(&self, clause: &str) -> IntentProposal {
        let p = &self.patterns;
        let filter = if p.pending_words.is_match(clause) {
            TaskFilter::Pending
        } else if p.completed_words.is_match(clause) {
            TaskFilter::Completed
        } else {
            TaskFilter::All
        };
        IntentProposal::new(Operation::List)
            .with_filter(filter)
            .with_confidence(VERB_CONFIDENCE)
    }

    fn create_from_rest(&self, rest: &str) -> IntentProposal {
        let p = &self.patterns;
        let mut proposal = IntentProposal::new(Operation::Create).with_confidence(VERB_CONFIDENCE);

        let rest = p.create_filler.replace(rest.trim(), "");
        let rest = rest.trim();

        // A quoted title is taken verbatim, even when empty.
        if let Some(caps) = p.quoted_title.captures(rest) {
            proposal.title = Some(caps[1].to_string());
            let tail = p.list_suffix.replace(caps[2].trim(), "");
            let tail = tail.trim().trim_start_matches(['-', '–', ':']).trim();
            let tail = tail.trim_start_matches('(').trim_end_matches(')').trim();
            if !tail.is_empty() {
                proposal.description = Some(tail.to_string());
            }
            return proposal;
        }

        let rest = p.list_suffix.replace(rest, "");
        let rest = rest.trim();
        let (title, description) = self.split_description(rest);
        let title = p.list_suffix.replace(title, "").trim().to_string();

        if !title.is_empty() {
            proposal.title = Some(title);
        }
        proposal.description = description;
        proposal
    }

    fn split_description<'a>(&self, text: &'a str) -> (&'a str, Option<String>) {
        let p = &self.patterns;
        for pattern in [&p.with_description, &p.dash_description, &p.paren_description] {
            if let Some(caps) = pattern.captures(text) {
                if let (Some(title), Some(description)) = (caps.get(1), caps.get(2)) {
                    return (title.as_str().trim(), Some(description.as_str().trim().to_string()));
                }
            }
        }
        (text, None)
    }

    fn update_from_rest(&self, rest: &str) -> IntentProposal {
        let p = &self.patterns;
        let mut proposal = IntentProposal::new(Operation::Update).with_confidence(VERB_CONFIDENCE);
        let rest = rest.trim();

        let (target, field, value) = if let Some(caps) = p.update_field_of.captures(rest) {
            (caps[2].to_string(), Some(caps[1].to_lowercase()), Some(caps[3].to_string()))
        } else if let Some(caps) = p.update_field.captures(rest) {
            (caps[1].to_string(), Some(caps[2].to_lowercase()), Some(caps[3].to_string()))
        } else if let Some(caps) = p.update_to.captures(rest) {
            (caps[1].to_string(), None, Some(caps[2].to_string()))
        } else {
            (rest.to_string(), None, None)
        };

        proposal.target = self.parse_reference(&target);
        if let Some(value) = value {
            let value = value.trim().trim_matches(QUOTE_MARK).to_string();
            match field.as_deref() {
                Some("description") => proposal.description = Some(value),
                _ => proposal.title = Some(value),
            }
        }
        proposal
    }

    /// A pronoun right after a clause that yields a task refers to that result.
    fn link_pronoun(&self, proposal: IntentProposal, earlier: &[IntentProposal]) -> IntentProposal {
        let follows_task = earlier
            .last()
            .is_some_and(|previous| previous.operation.yields_task());
        if proposal.target == Some(TaskReference::Pronoun) && follows_task {
            proposal.chained()
        } else {
            proposal
        }
    }
}

/// Put back literal quotes around spans that were masked for splitting.
fn unmask(mut proposal: IntentProposal) -> IntentProposal {
    let restore = |value: &mut Option<String>| {
        if let Some(text) = value.as_mut() {
            if text.contains(QUOTE_MARK) {
                *text = text.replace(QUOTE_MARK, "\"");
            }
        }
    };
    restore(&mut proposal.title);
    restore(&mut proposal.description);
    if let Some(TaskReference::Title(title)) = proposal.target.as_mut() {
        *title = title.replace(QUOTE_MARK, "\"");
    }
    proposal
}

/// Collapse whitespace and drop trailing sentence punctuation.
fn normalize(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string()
}

fn ordinal_value(word: &str) -> Option<usize> {
    let word = word.to_lowercase();
    let named = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
        "tenth",
    ];
    if let Some(index) = named.iter().position(|n| *n == word) {
        return Some(index + 1);
    }
    word.trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
        .filter(|n| *n > 0)
}
