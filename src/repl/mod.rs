//! The interactive read-eval-print loop.
//!
//! Line input goes through rustyline with a persistent history file; a line
//! whose brackets are still open keeps collecting continuation lines before
//! anything is evaluated. Runtime errors print a message and the top of
//! each machine stack, then reset the machine; global definitions survive.
//! Ctrl-C behaves like a runtime error without the message.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::backend::interp::Interp;
use crate::backend::SchemeError;

const PROMPT: &str = "[=> ";
const CONTINUE_PROMPT: &str = "...  ";
const HISTORY_FILE: &str = ".schemetron_history";

/// True when `src` contains at least one complete expression: no unclosed
/// brackets or strings (comments ignored).
pub fn input_complete(src: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;
    let mut saw_anything = false;

    for c in src.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            ';' => in_comment = true,
            '"' => {
                in_string = true;
                saw_anything = true;
            }
            '(' | '[' => {
                depth += 1;
                saw_anything = true;
            }
            ')' | ']' => depth -= 1,
            c if !c.is_whitespace() => saw_anything = true,
            _ => {}
        }
    }
    saw_anything && depth <= 0 && !in_string
}

fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// Report a runtime error the way the machine always has: the message,
/// the stack tops, and a note that we are back at the prompt.
fn report(interp: &mut Interp, err: &SchemeError) {
    eprintln!("\nError: {}", err);
    eprint!("{}", interp.stack_dump());
    eprintln!("Returning to top-level.");
    interp.clear_stacks();
}

/// Evaluate one chunk of input, printing each result on its own line.
pub fn eval_and_print(interp: &mut Interp, src: &str) {
    match interp.eval_str(src) {
        Ok(results) => {
            for r in results {
                println!("{}", r);
            }
        }
        Err(err) => report(interp, &err),
    }
}

/// Run the interactive loop until end of input or `(exit)`.
pub fn run(interp: &mut Interp) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: can't initialize line editor: {}", e);
            return;
        }
    };
    if let Some(path) = history_path() {
        let _ = rl.load_history(&path);
    }

    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { PROMPT } else { CONTINUE_PROMPT };
        match rl.readline(prompt) {
            Ok(line) => {
                pending.push_str(&line);
                pending.push('\n');
                if !input_complete(&pending) {
                    continue;
                }
                let _ = rl.add_history_entry(pending.trim_end());
                let src = std::mem::take(&mut pending);
                eval_and_print(interp, &src);
            }
            Err(ReadlineError::Interrupted) => {
                // Abandon any pending work, keep the global environment.
                pending.clear();
                interp.clear_stacks();
                println!("*Return-to-Top-Level*");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = history_path() {
        let _ = rl.save_history(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_inputs() {
        assert!(input_complete("42"));
        assert!(input_complete("(+ 1 2)"));
        assert!(input_complete("(a (b) c)\n"));
        assert!(input_complete("\"a string\""));
        assert!(input_complete("[a b]"));
    }

    #[test]
    fn test_incomplete_inputs() {
        assert!(!input_complete("(+ 1"));
        assert!(!input_complete("(a (b)"));
        assert!(!input_complete("\"unterminated"));
        assert!(!input_complete(""));
        assert!(!input_complete("   ; only a comment\n"));
    }

    #[test]
    fn test_comments_do_not_open_brackets() {
        assert!(input_complete("(+ 1 2) ; ("));
        assert!(!input_complete("(+ 1 ; )\n"));
    }

    #[test]
    fn test_strings_hide_brackets() {
        assert!(input_complete("\"(\""));
        assert!(input_complete("(display \")\")"));
    }
}
