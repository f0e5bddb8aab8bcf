use std::path::Path;

use statlab::process::protocol::{r_string, Frame, Protocol, PLOT_PATTERN};
use statlab::process::{CaptureOptions, EngineConfig};

const MARK: &str = "\u{1e}abc|";

#[test]
fn plain_lines_are_output() {
    let p = Protocol::new("abc");
    assert_eq!(p.parse_line("[1] 2"), vec![Frame::Output("[1] 2".into())]);
    assert_eq!(p.parse_line(""), vec![Frame::Output(String::new())]);
}

#[test]
fn marker_lines_become_frames() {
    let p = Protocol::new("abc");
    assert_eq!(
        p.parse_line(&format!("{MARK}ready|R version 4.4.1 (2024-06-14)")),
        vec![Frame::Ready("R version 4.4.1 (2024-06-14)".into())]
    );
    assert_eq!(p.parse_line(&format!("{MARK}message|hello")), vec![Frame::Message("hello".into())]);
    assert_eq!(p.parse_line(&format!("{MARK}warning|careful")), vec![Frame::Warning("careful".into())]);
    assert_eq!(
        p.parse_line(&format!("{MARK}error|object 'x' not found")),
        vec![Frame::Error("object 'x' not found".into())]
    );
    assert_eq!(p.parse_line(&format!("{MARK}done|")), vec![Frame::Done]);
}

#[test]
fn payload_may_contain_separators() {
    let p = Protocol::new("abc");
    assert_eq!(p.parse_line(&format!("{MARK}message|a|b")), vec![Frame::Message("a|b".into())]);
}

#[test]
fn marker_mid_line_splits_output() {
    let p = Protocol::new("abc");
    assert_eq!(
        p.parse_line(&format!("no newline{MARK}done|")),
        vec![Frame::Output("no newline".into()), Frame::Done]
    );
}

#[test]
fn foreign_nonce_is_plain_output() {
    let p = Protocol::new("abc");
    let line = "\u{1e}other|done|";
    assert_eq!(p.parse_line(line), vec![Frame::Output(line.into())]);
}

#[test]
fn unknown_kind_is_output() {
    let p = Protocol::new("abc");
    assert_eq!(p.parse_line(&format!("{MARK}bogus|x")), vec![Frame::Output("bogus|x".into())]);
}

#[test]
fn generated_nonces_differ() {
    let a = Protocol::generate();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = Protocol::generate();
    assert_ne!(a.handshake_script(), b.handshake_script());
}

#[test]
fn r_strings_are_escaped() {
    assert_eq!(r_string("plain"), "\"plain\"");
    assert_eq!(r_string("a\"b"), "\"a\\\"b\"");
    assert_eq!(r_string("C:\\tmp"), "\"C:\\\\tmp\"");
    assert_eq!(r_string("x\ny"), "\"x\\ny\"");
    assert_eq!(r_string("\u{1e}"), "\"\\x1e\"");
}

#[test]
fn handshake_reports_ready() {
    let script = Protocol::new("abc").handshake_script();
    assert!(script.contains("\\x1eabc|"));
    assert!(script.contains("ready|"));
    assert!(script.contains("R.version.string"));
    assert!(script.ends_with('\n'));
}

#[test]
fn run_script_wires_device_and_source() {
    let options = CaptureOptions { width: 800, height: 600, autoprint: true };
    let script = Protocol::new("abc").run_script(
        Path::new("/tmp/run-0001/submission.R"),
        Path::new("/tmp/run-0001"),
        &options,
    );
    assert!(script.contains("parse(file = \"/tmp/run-0001/submission.R\""));
    assert!(script.contains(&format!("/tmp/run-0001/{PLOT_PATTERN}")));
    assert!(script.contains("width = 800, height = 600"));
    assert!(script.contains("withAutoprint"));
    assert!(script.contains("graphics.off()"));
    assert!(script.contains("done|"));
}

#[test]
fn plot_device_failure_stays_inside_the_run() {
    let script = Protocol::new("abc").run_script(Path::new("s.R"), Path::new("."), &CaptureOptions::default());
    let guard = script.find("tryCatch({").unwrap();
    let device = script.find("grDevices::png(").unwrap();
    let handler = script.find("plot device unavailable").unwrap();
    let body = script.find("parse(file =").unwrap();
    assert!(guard < device && device < handler && handler < body);
    assert!(script.contains("try(grDevices::graphics.off(), silent = TRUE)"));
}

#[test]
fn run_script_without_autoprint_evaluates_plainly() {
    let options = CaptureOptions { autoprint: false, ..CaptureOptions::default() };
    let script = Protocol::new("abc").run_script(Path::new("s.R"), Path::new("."), &options);
    assert!(!script.contains("withAutoprint"));
    assert!(script.contains("eval(.e, envir = globalenv())"));
}

#[test]
fn executable_honours_asset_path() {
    let bare = EngineConfig::default();
    assert_eq!(bare.executable(), Path::new("R"));

    let bundled = EngineConfig {
        base_path: Some("/opt/r/bin".into()),
        ..EngineConfig::default()
    };
    assert_eq!(bundled.executable(), Path::new("/opt/r/bin/R"));
}
