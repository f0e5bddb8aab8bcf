//! Printers: text, markdown (termimad) and execution results.

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::execution::ExecutionResult;

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "red" => println!("{}", text.red()),
                "yellow" => println!("{}", text.yellow()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) { self.skin.print_text(text); println!(); }
}

/// Console lines of a run, or the placeholder when there were none.
pub fn console_lines(result: &ExecutionResult) -> Vec<String> {
    if let Some(err) = &result.error {
        return vec![format!("R error: {}", err)];
    }
    if result.text_lines.is_empty() {
        return vec!["[no console output]".to_string()];
    }
    result.text_lines.clone()
}

pub fn print_result(result: &ExecutionResult) {
    let printer = TextPrinter { color: if result.success() { None } else { Some("red") } };
    for line in console_lines(result) {
        printer.print(&line);
    }
}
