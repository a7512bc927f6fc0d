//! Interactive REPL.
//!
//! Features:
//! - Colored output for values and errors
//! - Command history with persistence
//! - Special commands: :help, :quit, :clear, :mem
//! - Multi-line input detection

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::memory;
use crate::runtime::Runtime;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HISTORY_FILE: &str = ".brisk-history";

pub struct Repl {
    runtime: Runtime,
}

enum CommandResult {
    Print(String),
    Clear,
    Quit,
}

impl Repl {
    pub fn new() -> Self {
        Repl { runtime: Runtime::new() }
    }

    /// Handles special REPL commands that start with `:`.
    fn handle_command(&self, command: &str) -> Option<CommandResult> {
        match command.trim() {
            ":help" | ":h" | ":?" => Some(CommandResult::Print(self.help_message())),
            ":clear" | ":cls" => Some(CommandResult::Clear),
            ":quit" | ":exit" | ":q" => Some(CommandResult::Quit),
            ":mem" => {
                let (objects, bytes, total) = memory::stats();
                Some(CommandResult::Print(format!(
                    "objects live: {}\nbytes live:   {}\nbytes total:  {}",
                    objects, bytes, total
                )))
            }
            other => Some(CommandResult::Print(format!(
                "Unknown command: {}",
                other
            ))),
        }
    }

    fn help_message(&self) -> String {
        format!(
            r#"{}

{}
  :help, :h, :?     Show this help message
  :clear, :cls      Clear the screen
  :quit, :exit, :q  Exit the REPL
  :mem              Show memory usage

{}
  x := 42           => declares a variable
  PI :: 3.14        => declares a constant
  fn f(x) {{ x * x }}
  @import "math.h"  => native C interop
"#,
            format!("Brisk REPL v{}", VERSION).bold(),
            "Commands:".yellow().bold(),
            "Examples:".yellow().bold()
        )
    }

    /// Whether the buffered input still needs more lines: some delimiter is
    /// unclosed or a string literal is open. Tracks openers on a stack so a
    /// mismatched closer cannot cancel a different kind of opener, and
    /// honors the grammar's lexical modes (`#` comments run to end of line,
    /// strings may escape quotes).
    fn is_incomplete(&self, input: &str) -> bool {
        #[derive(Clone, Copy)]
        enum Mode {
            Code,
            Str { escaped: bool },
            Comment,
        }

        let mut mode = Mode::Code;
        let mut open: Vec<char> = Vec::new();

        for c in input.chars() {
            match mode {
                Mode::Comment => {
                    if c == '\n' {
                        mode = Mode::Code;
                    }
                }
                Mode::Str { escaped: true } => {
                    mode = Mode::Str { escaped: false };
                }
                Mode::Str { escaped: false } => match c {
                    '\\' => mode = Mode::Str { escaped: true },
                    '"' => mode = Mode::Code,
                    _ => {}
                },
                Mode::Code => match c {
                    '#' => mode = Mode::Comment,
                    '"' => mode = Mode::Str { escaped: false },
                    '(' | '[' | '{' => open.push(c),
                    ')' => {
                        if open.last() == Some(&'(') {
                            open.pop();
                        }
                    }
                    ']' => {
                        if open.last() == Some(&'[') {
                            open.pop();
                        }
                    }
                    '}' => {
                        if open.last() == Some(&'{') {
                            open.pop();
                        }
                    }
                    _ => {}
                },
            }
        }

        !open.is_empty() || matches!(mode, Mode::Str { .. })
    }

    fn print_welcome(&self) {
        println!("{}", format!("Brisk {} - Interactive Mode", VERSION).cyan());
        println!(
            "Type {} for commands, {} to exit.\n",
            ":help".yellow(),
            ":quit".yellow()
        );
    }

    fn eval_and_print(&mut self, input: &str) {
        let program = match self.runtime.parse(input) {
            Ok(program) => program,
            Err(error) => {
                eprintln!("{}", error.to_string().red());
                return;
            }
        };

        let echo = Runtime::is_single_expression(&program);
        match self.runtime.exec_program(&program) {
            Ok(()) => {
                if echo {
                    let value = self.runtime.interp.last_value.clone();
                    if !matches!(value, crate::value::Value::Nil) {
                        println!("=> {}", self.colorize_output(&value.to_string()));
                    }
                }
            }
            Err(error) => eprintln!("{}", error.to_string().red()),
        }
    }

    pub fn run(&mut self) {
        let mut rl = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(error) => {
                eprintln!("Failed to start line editor: {}", error);
                return;
            }
        };
        let _ = rl.load_history(HISTORY_FILE);

        self.print_welcome();

        let mut input_buffer = String::new();

        'repl_loop: loop {
            let prompt = if input_buffer.is_empty() {
                "> ".to_string()
            } else {
                format!("{} ", "...".dimmed())
            };

            match rl.readline(&prompt) {
                Ok(line) => {
                    // Commands are only recognized at the start of an input.
                    if input_buffer.is_empty() && line.trim_start().starts_with(':') {
                        let _ = rl.add_history_entry(line.as_str());
                        if let Some(result) = self.handle_command(&line) {
                            match result {
                                CommandResult::Print(msg) => println!("{}", msg),
                                CommandResult::Clear => {
                                    print!("\x1B[2J\x1B[1;1H");
                                    self.print_welcome();
                                }
                                CommandResult::Quit => break 'repl_loop,
                            }
                        }
                        continue 'repl_loop;
                    }

                    if !input_buffer.is_empty() {
                        input_buffer.push('\n');
                    }
                    input_buffer.push_str(&line);

                    if self.is_incomplete(&input_buffer) {
                        continue 'repl_loop;
                    }

                    let _ = rl.add_history_entry(input_buffer.as_str());
                    let _ = rl.save_history(HISTORY_FILE);

                    if !input_buffer.trim().is_empty() {
                        let input = std::mem::take(&mut input_buffer);
                        self.eval_and_print(&input);
                    } else {
                        input_buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    if !input_buffer.is_empty() {
                        println!("{}", "Input cancelled".dimmed());
                        input_buffer.clear();
                    }
                    continue 'repl_loop;
                }
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(error) => {
                    eprintln!("{}: {:?}", "Error".red(), error);
                    break 'repl_loop;
                }
            }
        }

        // Top-level defers pushed during the session run at teardown.
        self.runtime.interp.unwind_all_defers();
        println!("{}", "Goodbye!".cyan());
    }

    /// Colorizes REPL output based on value type.
    fn colorize_output(&self, output: &str) -> String {
        if output == "nil" {
            return output.dimmed().to_string();
        }
        if output == "true" {
            return output.green().to_string();
        }
        if output == "false" {
            return output.red().to_string();
        }
        if output.starts_with('<') {
            return output.magenta().to_string();
        }
        if output.parse::<i64>().is_ok() || output.parse::<f64>().is_ok() {
            return output.blue().to_string();
        }

        output.to_string()
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
