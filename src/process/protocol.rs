//! Driver programs sent to the R process and parsing of its framed output.
//!
//! Everything the driver itself reports travels on stdout as a marker line
//! `\x1e<nonce>|<kind>|<payload>`. Lines without the session's marker are the
//! user program's own output. A marker may arrive in the middle of a line when
//! user code printed without a trailing newline; the line is split there.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::CaptureOptions;

const RECORD_SEPARATOR: char = '\u{1e}';

/// File name pattern of plots inside a run directory.
pub const PLOT_PATTERN: &str = "plot-%03d.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Output(String),
    Ready(String),
    Message(String),
    Warning(String),
    Error(String),
    Done,
}

#[derive(Debug, Clone)]
pub struct Protocol {
    nonce: String,
}

impl Protocol {
    pub fn new(nonce: impl Into<String>) -> Self {
        Self { nonce: nonce.into() }
    }

    /// A protocol with a nonce unlikely to collide with user output.
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self::new(format!("{:x}{:x}", std::process::id(), nanos))
    }

    fn prefix(&self) -> String {
        format!("{}{}|", RECORD_SEPARATOR, self.nonce)
    }

    /// Split one stdout line into frames.
    pub fn parse_line(&self, line: &str) -> Vec<Frame> {
        let prefix = self.prefix();
        let Some(pos) = line.find(&prefix) else {
            return vec![Frame::Output(line.to_string())];
        };

        let mut frames = Vec::with_capacity(2);
        if pos > 0 {
            frames.push(Frame::Output(line[..pos].to_string()));
        }
        let rest = &line[pos + prefix.len()..];
        let (kind, payload) = rest.split_once('|').unwrap_or((rest, ""));
        let payload = payload.to_string();
        frames.push(match kind {
            "ready" => Frame::Ready(payload),
            "message" => Frame::Message(payload),
            "warning" => Frame::Warning(payload),
            "error" => Frame::Error(payload),
            "done" => Frame::Done,
            _ => Frame::Output(rest.to_string()),
        });
        frames
    }

    /// Sent once after spawn; answers with a `ready` frame carrying the version.
    pub fn handshake_script(&self) -> String {
        format!(
            "local({{ cat({marker}, \"ready|\", R.version.string, \"\\n\", sep = \"\"); flush(stdout()) }})\n",
            marker = r_string(&self.prefix()),
        )
    }

    /// Wrap one submission. The source is parsed from `source_file` so user
    /// text never needs escaping; plots land in `plot_dir`.
    pub fn run_script(&self, source_file: &Path, plot_dir: &Path, options: &CaptureOptions) -> String {
        let source = r_string(&source_file.to_string_lossy());
        let plots = r_string(&plot_dir.join(PLOT_PATTERN).to_string_lossy());
        let evaluate = if options.autoprint {
            "withAutoprint(exprs = .exprs, evaluated = TRUE, local = globalenv(), echo = FALSE)"
        } else {
            "for (.e in .exprs) eval(.e, envir = globalenv())"
        };

        format!(
            r#"local({{
  .marker <- {marker}
  .emit <- function(kind, text) {{
    for (line in strsplit(paste(text, collapse = "\n"), "\n", fixed = TRUE)[[1]])
      cat(.marker, kind, "|", line, "\n", sep = "")
  }}
  tryCatch({{
    grDevices::png(filename = {plots}, width = {width}, height = {height},
                   type = if (isTRUE(capabilities("cairo"))) "cairo" else getOption("bitmapType"))
  }}, error = function(e) .emit("warning", paste("plot device unavailable:", conditionMessage(e))))
  .failure <- tryCatch({{
    withCallingHandlers({{
      .exprs <- parse(file = {source}, keep.source = FALSE)
      {evaluate}
      NULL
    }},
    message = function(m) {{ .emit("message", conditionMessage(m)); invokeRestart("muffleMessage") }},
    warning = function(w) {{ .emit("warning", conditionMessage(w)); invokeRestart("muffleWarning") }})
  }}, error = function(e) {{ msg <- conditionMessage(e); if (nzchar(msg)) msg else "error" }})
  try(grDevices::graphics.off(), silent = TRUE)
  if (!is.null(.failure)) .emit("error", .failure)
  cat(.marker, "done|", "\n", sep = "")
  flush(stdout())
  invisible(NULL)
}})
"#,
            marker = r_string(&self.prefix()),
            width = options.width,
            height = options.height,
        )
    }
}

/// Quote `s` as an R string literal.
pub fn r_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
