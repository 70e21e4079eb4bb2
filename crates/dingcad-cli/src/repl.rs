//! Interactive REPL for dingcad scripting
//!
//! Provides an interactive environment for experimenting with solid operations.

use anyhow::Result;
use dingcad_engine::{Engine, ExportOptions, export};
use dingcad_script::SolidHandle;
use rhai::Scope;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::path::{Path, PathBuf};

/// REPL state
pub struct Repl {
    engine: Engine,
    scope: Scope<'static>,
    editor: Editor<(), DefaultHistory>,
    history_path: Option<PathBuf>,
    current_solid: Option<SolidHandle>,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(engine: Engine) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(config)?;

        let history_path = history_path();
        if let Some(ref path) = history_path {
            let _ = editor.load_history(path);
        }

        Ok(Self {
            engine,
            scope: Scope::new(),
            editor,
            history_path,
            current_solid: None,
        })
    }

    /// Run the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!("{}", WELCOME_MESSAGE);

        let mut multiline_buffer = String::new();
        let mut in_multiline = false;

        loop {
            let prompt = if in_multiline { "...> " } else { "ding> " };

            match self.editor.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.starts_with(':') && !in_multiline {
                        let _ = self.editor.add_history_entry(trimmed);
                        match self.handle_command(trimmed) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                            CommandResult::Error(e) => {
                                eprintln!("Error: {}", e);
                                continue;
                            }
                        }
                    }

                    if let Some(stripped) = line.trim_end().strip_suffix('\\') {
                        multiline_buffer.push_str(stripped);
                        multiline_buffer.push('\n');
                        in_multiline = true;
                        continue;
                    }

                    let full_input = if in_multiline {
                        multiline_buffer.push_str(&line);
                        in_multiline = false;
                        std::mem::take(&mut multiline_buffer)
                    } else {
                        line.clone()
                    };

                    if !is_balanced(&full_input) {
                        multiline_buffer = full_input;
                        multiline_buffer.push('\n');
                        in_multiline = true;
                        continue;
                    }

                    if full_input.trim().is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(&full_input);
                    self.eval_and_print(&full_input);
                }
                Err(ReadlineError::Interrupted) => {
                    if in_multiline {
                        println!("^C - input cancelled");
                        multiline_buffer.clear();
                        in_multiline = false;
                    } else {
                        println!("Use :quit or Ctrl+D to exit");
                    }
                }
                Err(ReadlineError::Eof) => {
                    println!("\nGoodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = self.editor.save_history(path);
        }

        Ok(())
    }

    /// Evaluate input and print result
    fn eval_and_print(&mut self, input: &str) {
        match self.engine.runtime().eval_with_scope(&mut self.scope, input) {
            Ok(result) => {
                if let Some(solid) = result.clone().try_cast::<SolidHandle>() {
                    println!("=> {solid}");
                    self.current_solid = Some(solid);
                } else if !result.is_unit() {
                    println!("=> {}", result);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
            }
        }
    }

    /// Handle REPL commands
    fn handle_command(&mut self, cmd: &str) -> CommandResult {
        let (command, args) = match cmd.split_once(' ') {
            Some((command, rest)) => (command, Some(rest.trim()).filter(|s| !s.is_empty())),
            None => (cmd, None),
        };

        match command {
            ":help" | ":h" | ":?" => {
                println!("{}", HELP_MESSAGE);
                CommandResult::Continue
            }
            ":quit" | ":q" | ":exit" => CommandResult::Exit,
            ":clear" | ":c" => {
                self.scope.clear();
                self.current_solid = None;
                self.engine.clear_scene();
                println!("Scope cleared");
                CommandResult::Continue
            }
            ":vars" | ":v" => {
                if self.scope.is_empty() {
                    println!("No variables defined");
                } else {
                    println!("Variables:");
                    for (name, _constant, value) in self.scope.iter() {
                        println!("  {} = {}", name, value);
                    }
                }
                CommandResult::Continue
            }
            ":info" | ":i" => {
                match &self.current_solid {
                    Some(solid) => print_solid(solid),
                    None => println!("No solid yet. Create one with e.g. cube()"),
                }
                CommandResult::Continue
            }
            ":export" | ":e" => match args {
                Some(path) => self.export_solid(Path::new(path)),
                None => {
                    println!("Usage: :export <filename>");
                    CommandResult::Continue
                }
            },
            ":load" | ":l" => match args {
                Some(path) => self.load_scene(Path::new(path)),
                None => {
                    println!("Usage: :load <filename>");
                    CommandResult::Continue
                }
            },
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type :help for available commands.",
                command
            )),
        }
    }

    /// Export the current solid as binary STL
    fn export_solid(&self, path: &Path) -> CommandResult {
        let Some(solid) = &self.current_solid else {
            println!("No solid to export. Create one first.");
            return CommandResult::Continue;
        };
        match export::export_solid(solid, &ExportOptions::new(path)) {
            Ok(result) => {
                println!("{result}");
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    /// Load a scene file and make its export the current solid
    fn load_scene(&mut self, path: &Path) -> CommandResult {
        println!("Loading {}...", path.display());
        match self.engine.load_scene(path) {
            Ok(scene) => {
                println!("=> {}", scene.solid);
                self.current_solid = Some(scene.solid.clone());
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

/// Result of handling a command
enum CommandResult {
    Continue,
    Exit,
    Error(String),
}

fn print_solid(solid: &SolidHandle) {
    let bounds = solid.bounding_box();
    println!("  status:      {}", solid.status().as_str());
    println!("  volume:      {:.6}", solid.volume());
    println!("  surfaceArea: {:.6}", solid.surface_area());
    println!("  triangles:   {}", solid.num_tri());
    println!("  genus:       {}", solid.genus());
    if !solid.is_empty() {
        println!("  bounds:      {:?} .. {:?}", bounds.min.to_array(), bounds.max.to_array());
    }
}

/// Check if braces/brackets/parens are balanced
fn is_balanced(input: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev_char = '\0';

    for c in input.chars() {
        if c == '"' && prev_char != '\\' {
            in_string = !in_string;
        }

        if !in_string {
            match c {
                '(' | '{' | '[' => depth += 1,
                ')' | '}' | ']' => depth -= 1,
                _ => {}
            }
        }

        prev_char = c;
    }

    depth <= 0
}

/// Get the history file path
fn history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("dingcad").join("repl_history"))
}

const WELCOME_MESSAGE: &str = r#"
dingcad interactive REPL
Type expressions to build solids, :help for commands.
"#;

const HELP_MESSAGE: &str = r#"
Commands:
  :help, :h, :?     - Show this help message
  :quit, :q, :exit  - Exit the REPL
  :clear, :c        - Clear all variables and the current solid
  :vars, :v         - Show defined variables
  :info, :i         - Measure the current solid
  :export <file>    - Export the current solid as binary STL
  :load <file>      - Load a scene file; its export becomes current

Tips:
  - End a line with \ for multiline input
  - Unfinished expressions (unbalanced braces) continue on next line
  - Variables persist between evaluations
  - Use Ctrl+C to cancel current input, Ctrl+D to exit
"#;

/// Entry point for the REPL command
pub fn run_repl(engine: Engine) -> Result<()> {
    let mut repl = Repl::new(engine)?;
    repl.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_input() {
        assert!(is_balanced("cube(#{ size: [1, 2, 3] })"));
        assert!(!is_balanced("let a = union(cube(),"));
        assert!(is_balanced("print(\"(\")"));
    }
}
