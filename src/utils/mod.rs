//! Utilities (document and script loading, plot file naming).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

/// Read multiple document files and return their combined content as string.
pub fn read_documents(file_paths: &[String]) -> Result<String> {
    let mut combined_content = String::new();

    for (i, file_path) in file_paths.iter().enumerate() {
        let content = read_single_document(file_path)?;

        if i > 0 {
            combined_content.push_str("\n\n");
        }
        combined_content.push_str(&content);
    }

    Ok(combined_content)
}

/// Read a single text document: notes, saved console output or an R script.
pub fn read_single_document(file_path: &str) -> Result<String> {
    let path = Path::new(file_path);

    if !path.exists() {
        bail!("Document file '{}' does not exist", file_path);
    }
    if !path.is_file() {
        bail!("'{}' is not a file", file_path);
    }

    let extension = path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "md" | "txt" | "log" | "out" | "r" | "" => {
            fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", file_path))
        }
        _ => {
            bail!("Unsupported file type: .{}\nCurrently supported: .md, .txt, .log, .out, .R, and files without extension", extension);
        }
    }
}

/// Join piped stdin and the positional argument the way the CLI expects.
pub fn combine_inputs(from_stdin: &str, from_arg: &str) -> String {
    match (from_stdin.trim().is_empty(), from_arg.trim().is_empty()) {
        (false, false) => format!("{}\n\n{}", from_stdin, from_arg),
        (false, true) => from_stdin.to_string(),
        _ => from_arg.to_string(),
    }
}

/// A fresh file name for a saved plot inside `dir`.
pub fn plot_file_in(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    dir.join(format!("plot-{millis}.png"))
}
