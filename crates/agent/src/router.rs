use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use uranus_core::config::AgentConfig;
use uranus_core::{Arguments, Error, Result, RoutingDecision};
use uranus_storage::ConversationMemory;
use uranus_tools::{ParamKind, ParamSpec, ToolDescriptor, ToolRegistry, Trigger};

const NAME_SCORE: f64 = 1.0;
const TRIGGER_PREFIX_SCORE: f64 = 0.9;
const TRIGGER_CONTAINED_SCORE: f64 = 0.7;
const DESCRIPTION_WEIGHT: f64 = 0.6;
/// Added to a description match for a tool used within the recent window.
const CONTEXT_BONUS: f64 = 0.05;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "by", "can", "could", "do",
    "does", "for", "from", "get", "give", "how", "i", "in", "is", "it", "like", "me", "my",
    "of", "on", "or", "please", "show", "some", "such", "tell", "that", "the", "this", "to",
    "what", "with", "would", "you",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Name,
    TriggerPrefix,
    TriggerContained,
    Description,
}

struct Candidate<'r> {
    descriptor: &'r ToolDescriptor,
    score: f64,
    kind: MatchKind,
    /// Words of the input consumed by the matched name or trigger phrase.
    consumed_words: usize,
    trigger: Option<&'r Trigger>,
}

/// Maps free text to one tool plus its arguments.
///
/// Scoring per tool, highest wins:
/// - name invocation (`echo ...`, `system info ...` for `system_info`): 1.0
/// - trigger phrase at the start of the input: 0.9, longest phrase first
/// - trigger phrase elsewhere on a word boundary: 0.7
/// - description overlap: 0.6 × share of the input's content words found in
///   the description, plus a small bonus when the tool was used recently
///
/// Candidates are visited in registration order and only a strictly higher
/// score replaces the current best, so the earliest registered tool wins ties.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    match_threshold: f64,
    history_window: usize,
}

impl IntentRouter {
    pub fn new(match_threshold: f64, history_window: usize) -> Self {
        Self {
            match_threshold,
            history_window,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.match_threshold, config.history_window)
    }

    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    /// Route `input`. A score below the threshold is a no-match decision, not
    /// an error; errors mean a tool was chosen but its arguments could not be
    /// built.
    pub fn route(
        &self,
        input: &str,
        registry: &ToolRegistry,
        memory: &ConversationMemory,
    ) -> Result<RoutingDecision> {
        let normalized = normalize(input);
        let content = content_words(&normalized);
        let recent_tools: HashSet<&str> = memory
            .recent(self.history_window)
            .filter_map(|t| t.matched_tool.as_deref())
            .collect();

        let mut best: Option<Candidate<'_>> = None;
        for descriptor in registry.list_all() {
            let candidate = score_tool(descriptor, &normalized, &content, &recent_tools);
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            return Ok(RoutingDecision::no_match(0.0));
        };
        if best.score < self.match_threshold {
            debug!(
                best_tool = best.descriptor.name(),
                confidence = best.score,
                "No tool above threshold"
            );
            return Ok(RoutingDecision::no_match(best.score));
        }

        // Description matches have no phrase to split on, so only named
        // arguments are read from them.
        let (remainder, positional) = match best.kind {
            MatchKind::Name | MatchKind::TriggerPrefix | MatchKind::TriggerContained => {
                (skip_words(input.trim(), best.consumed_words), true)
            }
            MatchKind::Description => (input.trim(), false),
        };
        debug!(
            tool = best.descriptor.name(),
            kind = ?best.kind,
            confidence = best.score,
            "Routed input"
        );

        let arguments =
            extract_arguments(best.descriptor, best.trigger, remainder, positional, memory)?;
        Ok(RoutingDecision::matched(
            best.descriptor.name(),
            best.score,
            arguments,
        ))
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Trim, case-fold and collapse whitespace.
pub fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn content_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(text)
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn starts_with_phrase(input: &str, phrase: &str) -> bool {
    input == phrase
        || (input.starts_with(phrase) && input[phrase.len()..].starts_with(' '))
}

/// Word count up to the end of the first whole-word occurrence of `phrase`.
fn phrase_end(input: &str, phrase: &str) -> Option<usize> {
    let haystack: Vec<&str> = input.split(' ').collect();
    let needle: Vec<&str> = phrase.split(' ').collect();
    haystack
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map(|start| start + needle.len())
}

fn score_tool<'r>(
    descriptor: &'r ToolDescriptor,
    input: &str,
    content: &[String],
    recent_tools: &HashSet<&str>,
) -> Candidate<'r> {
    let mut best = Candidate {
        descriptor,
        score: 0.0,
        kind: MatchKind::Description,
        consumed_words: 0,
        trigger: None,
    };

    let name = descriptor.name().to_lowercase();
    let spaced = name.replace('_', " ");
    for phrase in [name.as_str(), spaced.as_str()] {
        if starts_with_phrase(input, phrase) {
            best.score = NAME_SCORE;
            best.kind = MatchKind::Name;
            best.consumed_words = phrase.split(' ').count();
            return best;
        }
    }

    let mut prefix: Option<(&Trigger, String)> = None;
    let mut contained: Option<(&Trigger, String, usize)> = None;
    for trigger in descriptor.triggers() {
        let phrase = normalize(trigger.phrase);
        if phrase.is_empty() {
            continue;
        }
        if starts_with_phrase(input, &phrase) {
            if prefix.as_ref().map_or(true, |(_, p)| phrase.len() > p.len()) {
                prefix = Some((trigger, phrase));
            }
        } else if phrase.chars().any(char::is_alphanumeric) {
            if let Some(end) = phrase_end(input, &phrase) {
                if contained.as_ref().map_or(true, |(_, p, _)| phrase.len() > p.len()) {
                    contained = Some((trigger, phrase, end));
                }
            }
        }
    }
    if let Some((trigger, phrase)) = prefix {
        best.score = TRIGGER_PREFIX_SCORE;
        best.kind = MatchKind::TriggerPrefix;
        best.consumed_words = phrase.split(' ').count();
        best.trigger = Some(trigger);
        return best;
    }
    if let Some((trigger, _, end)) = contained {
        best.score = TRIGGER_CONTAINED_SCORE;
        best.kind = MatchKind::TriggerContained;
        best.consumed_words = end;
        best.trigger = Some(trigger);
        return best;
    }

    if !content.is_empty() {
        let vocabulary: HashSet<String> = words(descriptor.description())
            .chain(words(&spaced))
            .collect();
        let hits = content.iter().filter(|w| vocabulary.contains(*w)).count();
        if hits > 0 {
            let mut score = DESCRIPTION_WEIGHT * hits as f64 / content.len() as f64;
            if recent_tools.contains(descriptor.name()) {
                score = (score + CONTEXT_BONUS).min(DESCRIPTION_WEIGHT);
            }
            best.score = score;
        }
    }
    best
}

/// The input after its first `n` whitespace-separated words, formatting intact.
fn skip_words(input: &str, n: usize) -> &str {
    let mut rest = input;
    for _ in 0..n {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest.trim()
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    start: usize,
    end: usize,
    /// The raw span was a single quoted group.
    quoted: bool,
}

/// Split on whitespace; a quote at the start of a token, or right after `=`,
/// groups until the matching quote. An unclosed quote runs to the end.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut text = String::new();
        let mut end = start;
        let mut quote: Option<char> = None;
        let mut quoted = false;
        let mut prev: Option<char> = None;
        while let Some(&(i, c)) = chars.peek() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => text.push(c),
                None if c.is_whitespace() => break,
                None if (c == '"' || c == '\'') && (prev.is_none() || prev == Some('=')) => {
                    quote = Some(c);
                    quoted = prev.is_none();
                }
                None => text.push(c),
            }
            prev = Some(c);
            end = i + c.len_utf8();
            chars.next();
        }
        let raw = &input[start..end];
        let fully_quoted = quoted
            && raw.len() >= 2
            && raw.ends_with(|c: char| c == '"' || c == '\'');
        tokens.push(Token {
            text,
            start,
            end,
            quoted: fully_quoted,
        });
    }
    tokens
}

fn convert(tool: &str, spec: &ParamSpec, raw: &str) -> Result<Value> {
    let value = spec
        .kind
        .convert(raw)
        .map_err(|e| Error::Validation(format!("{}.{}: {}", tool, spec.name, e)))?;
    spec.check(&value)
        .map_err(|e| Error::Validation(format!("{}: {}", tool, e)))?;
    Ok(value)
}

/// Original text from `first` through `last`, unquoted when it is a single
/// quoted token.
fn raw_run<'a>(remainder: &'a str, first: &'a Token, last: &'a Token) -> &'a str {
    if first == last && first.quoted {
        first.text.as_str()
    } else {
        &remainder[first.start..last.end]
    }
}

/// Build the argument map for `descriptor` from the remainder text.
///
/// Order of precedence: named arguments, trigger presets, positional tokens,
/// scratch memory (`"{tool}.{param}"` then `"{param}"`), declared defaults.
fn extract_arguments(
    descriptor: &ToolDescriptor,
    trigger: Option<&Trigger>,
    remainder: &str,
    positional_allowed: bool,
    memory: &ConversationMemory,
) -> Result<Arguments> {
    let tool = descriptor.name();
    let schema = descriptor.schema();
    let mut args = Arguments::new();

    if let Some(trigger) = trigger {
        for (param, value) in &trigger.preset {
            args.insert(param.to_string(), value.clone());
        }
    }

    let tokens = tokenize(remainder);
    let mut positional: Vec<(usize, &Token)> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let stripped = token.text.strip_prefix("--");
        let named = match stripped.unwrap_or(&token.text).split_once('=') {
            Some((key, value)) if !token.quoted => schema
                .param(key)
                .map(|spec| (spec, Some(value.to_string()))),
            _ => stripped.and_then(|key| schema.param(key)).map(|spec| (spec, None)),
        };

        match named {
            Some((spec, Some(value))) => {
                args.insert(spec.name.to_string(), convert(tool, spec, &value)?);
            }
            Some((spec, None)) => {
                // `--flag` with no value reads as true for booleans
                let next = tokens.get(i + 1);
                let takes_next = match spec.kind {
                    ParamKind::Boolean => next
                        .map(|t| ParamKind::Boolean.convert(&t.text).is_ok())
                        .unwrap_or(false),
                    _ => next.is_some(),
                };
                let raw = if takes_next {
                    i += 1;
                    tokens[i].text.clone()
                } else if spec.kind == ParamKind::Boolean {
                    "true".to_string()
                } else {
                    return Err(Error::Validation(format!(
                        "{}: --{} needs a value",
                        tool, spec.name
                    )));
                };
                args.insert(spec.name.to_string(), convert(tool, spec, &raw)?);
            }
            None if positional_allowed => positional.push((i, token)),
            None => {}
        }
        i += 1;
    }

    let mut queue = positional.into_iter();
    for spec in schema.parameters.iter() {
        if args.contains_key(spec.name) {
            continue;
        }
        let Some((first_idx, first)) = queue.next() else {
            break;
        };
        let value = if spec.greedy {
            // Keep the raw text of each run of positional tokens; named
            // arguments between runs are not part of the value.
            let mut pieces = Vec::new();
            let (mut run_start, mut run_end, mut run_idx) = (first, first, first_idx);
            for (idx, token) in queue.by_ref() {
                if idx != run_idx + 1 {
                    pieces.push(raw_run(remainder, run_start, run_end));
                    run_start = token;
                }
                run_end = token;
                run_idx = idx;
            }
            pieces.push(raw_run(remainder, run_start, run_end));
            convert(tool, spec, &pieces.join(" "))?
        } else {
            convert(tool, spec, &first.text)?
        };
        args.insert(spec.name.to_string(), value);
    }
    let surplus: Vec<&str> = queue.map(|(_, t)| t.text.as_str()).collect();
    if !surplus.is_empty() {
        debug!(tool, ignored = ?surplus, "Ignoring surplus positional arguments");
    }

    for spec in schema.parameters.iter() {
        if args.contains_key(spec.name) {
            continue;
        }
        if spec.required {
            let scoped = format!("{}.{}", tool, spec.name);
            let remembered = [scoped.as_str(), spec.name]
                .into_iter()
                .filter_map(|key| memory.get_scratch(key))
                .find(|value| spec.check(value).is_ok());
            match remembered {
                Some(value) => {
                    debug!(tool, param = spec.name, "Filled argument from scratch memory");
                    args.insert(spec.name.to_string(), value.clone());
                }
                None => {
                    return Err(Error::MissingArgument {
                        tool: tool.to_string(),
                        parameter: spec.name.to_string(),
                    })
                }
            }
        } else if let Some(default) = &spec.default {
            args.insert(spec.name.to_string(), default.clone());
        }
    }

    Ok(args)
}
