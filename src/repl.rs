// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL over a module loader.
//!
//! Every line runs in one script context with a top-level `require`, so
//! variables persist between lines while modules stay cached by the loader.
//! `.forget` drops a module so an edited file can be required again.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use sable_loader::{Loader, LoaderError};
use sable_script::runtime::json::to_json_lossy;
use sable_script::{ExecutionContext, Value};
use std::borrow::Cow;
use std::path::PathBuf;

const HISTORY_FILE: &str = ".sable_history";
const MAX_HISTORY_SIZE: usize = 1000;
const REPL_FILENAME: &str = "<repl>";

/// Words of the script dialect, for completion and highlighting.
const KEYWORDS: &[&str] = &[
    "break", "catch", "const", "continue", "delete", "do", "else", "finally", "for", "function",
    "if", "in", "instanceof", "let", "new", "return", "throw", "try", "typeof", "var", "void",
    "while",
];

const LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity", "this"];

const BUILTINS: &[&str] = &[
    "Array", "Boolean", "console", "Error", "Function", "JSON", "Math", "Number", "Object",
    "String", "TypeError", "RangeError", "require", "module", "exports",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Modules,
    Forget,
    Load,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let (cmd, arg) = match rest.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|arg| !arg.is_empty())),
            None => (rest, None),
        };

        let command = match cmd.to_lowercase().as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "modules" | "m" => ReplCommand::Modules,
            "forget" | "f" => ReplCommand::Forget,
            "load" | "l" => ReplCommand::Load,
            _ => return None,
        };
        Some((command, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".modules", "List cached modules"),
            (".forget <id>", "Drop a module so the next require() reloads it"),
            (".load <file>", "Evaluate a file in the REPL context"),
        ]
    }
}

/// Helper struct for rustyline that provides completion, hints, and validation
struct SableHelper {
    words: Vec<&'static str>,
}

impl SableHelper {
    fn new() -> Self {
        let commands = ReplCommand::all_commands()
            .iter()
            .map(|(cmd, _)| cmd.split_whitespace().next().unwrap_or(*cmd));
        let words = KEYWORDS
            .iter()
            .chain(LITERALS)
            .chain(BUILTINS)
            .copied()
            .chain(commands)
            .collect();
        Self { words }
    }

    fn matches<'a>(&'a self, word: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.words
            .iter()
            .copied()
            .filter(move |candidate| candidate.starts_with(word) && candidate.len() > word.len())
    }
}

/// Start of the word ending at `pos`.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for SableHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[word_start(line, pos)..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .matches(word)
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: candidate[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for SableHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        let word = &line[word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }
        self.matches(word)
            .next()
            .map(|candidate| (&candidate[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for SableHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();
        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                result.push_str(&highlight_word(&word));
                word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' => c.cyan().to_string(),
                '"' | '\'' => c.green().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }
        if !word.is_empty() {
            result.push_str(&highlight_word(&word));
        }
        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if BUILTINS.contains(&word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for SableHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        // A trailing operator or opener expects more input
        let continues = input
            .trim_end()
            .ends_with(['\\', '+', '-', '*', '/', '=', ',', '{', '(', '[']);
        if continues {
            return Ok(ValidationResult::Incomplete);
        }
        Ok(ValidationResult::Valid(None))
    }
}

/// Check if brackets, braces, and parentheses are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }

        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    if stack.pop() != Some(c) {
                        // Let the parser report it
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

impl Helper for SableHelper {}

/// The interactive REPL
pub struct Repl {
    loader: Loader,
    context: ExecutionContext,
    editor: Editor<SableHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a REPL evaluating against `loader`
    pub fn new(loader: Loader) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(SableHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sable")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::debug!(error = %e, "cannot create history directory");
            }
        }
        if editor.load_history(&history_path).is_err() {
            tracing::debug!(path = %history_path.display(), "no REPL history yet");
        }

        let context = loader.script_context(Some(REPL_FILENAME.to_string()));
        Ok(Self {
            loader,
            context,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "sable>".bright_green().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }
                    self.eval_and_print(trimmed, None);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_path) {
            tracing::warn!(error = %e, "failed to save REPL history");
        }
        self.loader.unload("shutdown");
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "sable".bright_cyan().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!(
            "  {} {}",
            "principal:".dimmed(),
            self.context.principal().yellow()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match (cmd, arg) {
            (ReplCommand::Help, _) => self.print_help(),
            (ReplCommand::Exit, _) => return CommandResult::Exit,
            (ReplCommand::Clear, _) => print!("\x1B[2J\x1B[H"),
            (ReplCommand::Modules, _) => self.print_modules(),
            (ReplCommand::Forget, Some(id)) => match self.loader.forget(id) {
                Ok(true) => println!("{} {}", "forgot".dimmed(), id.cyan()),
                Ok(false) => println!("{} {}", id.cyan(), "is not loaded".dimmed()),
                Err(e) => print_error(&e),
            },
            (ReplCommand::Load, Some(path)) => match std::fs::read_to_string(path) {
                Ok(source) => self.eval_and_print(&source, Some(path)),
                Err(e) => eprintln!("{}: {}: {e}", "Error".red().bold(), path),
            },
            (ReplCommand::Forget | ReplCommand::Load, None) => {
                eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    format!(".{cmd:?}").to_lowercase().cyan(),
                    "requires an argument".dimmed()
                );
            }
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
    }

    fn print_modules(&self) {
        let records = self.loader.cache().records();
        if records.is_empty() {
            println!("{}", "no modules loaded".dimmed());
        }
        for record in records {
            let state = if record.loaded { "" } else { " (loading)" };
            println!(
                "  {:16} {}{}",
                record.id.cyan(),
                record.canonical_path.dimmed(),
                state.yellow()
            );
        }
    }

    fn eval_and_print(&mut self, source: &str, filename: Option<&str>) {
        match self.context.evaluate(source, filename) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&LoaderError::from_script(e)),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Format a value for display with syntax coloring
fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Boolean(b) => b.yellow().to_string(),
        Value::Number(_) => value.to_js_string().yellow().to_string(),
        Value::String(s) => format!("'{s}'").green().to_string(),
        Value::Object(obj) if obj.is_callable() => "[Function]".magenta().to_string(),
        Value::Object(obj) if obj.error_kind().is_some() => value.to_js_string().red().to_string(),
        Value::Object(_) => to_json_lossy(value).to_string().cyan().to_string(),
    }
}

fn print_error(error: &LoaderError) {
    match error {
        LoaderError::Evaluation(err) => eprintln!(
            "{}: {} {}",
            err.kind.name().red().bold(),
            err.message,
            format!("({}:{})", err.filename, err.line).dimmed()
        ),
        other => eprintln!("{}: {other}", "Error".red().bold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert_eq!(ReplCommand::parse(".help"), Some((ReplCommand::Help, None)));
        assert_eq!(ReplCommand::parse(".exit"), Some((ReplCommand::Exit, None)));
        assert_eq!(
            ReplCommand::parse(".forget  lib/util "),
            Some((ReplCommand::Forget, Some("lib/util")))
        );
        assert_eq!(
            ReplCommand::parse(".load test.js"),
            Some((ReplCommand::Load, Some("test.js")))
        );
        assert_eq!(ReplCommand::parse(".modules"), Some((ReplCommand::Modules, None)));
        assert!(ReplCommand::parse(".bogus").is_none());
        assert!(ReplCommand::parse("not a command").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("{ a: 1 }"));
        assert!(is_balanced("function() { return 1; }"));
        assert!(!is_balanced("(1 + 2"));
        assert!(!is_balanced("{ a: 1"));
        assert!(is_balanced("'string with (unbalanced'"));
    }

    #[test]
    fn test_completion_words() {
        let helper = SableHelper::new();
        let found: Vec<_> = helper.matches("req").collect();
        assert_eq!(found, ["require"]);
        assert_eq!(helper.matches(".mod").next(), Some(".modules"));
        assert_eq!(helper.matches(".forget").next(), None);
    }

    #[test]
    fn test_keywords_are_reserved_words() {
        use sable_script::lexer::TokenKind;
        for word in KEYWORDS.iter().chain(&["true", "false", "null", "this"]) {
            assert!(TokenKind::keyword(word).is_some(), "{word} is not a keyword");
        }
        assert!(TokenKind::keyword("switch").is_none());
    }
}
