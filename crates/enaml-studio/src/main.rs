use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use enaml_runtime::logging::{LoggingConfig, init_logging};
use enaml_runtime::{ClassDef, Value};
use enaml_syntax::diagnostic::format_source_error;
use enaml_ui::Application;

const DEMO: &str = include_str!("../ui/main.enaml");

#[derive(Parser, Debug)]
#[command(name = "enaml-studio")]
#[command(about = "Build and show a component from an .enaml file")]
struct Cli {
    /// Path to an .enaml file; the bundled demo when omitted
    file: Option<PathBuf>,
    /// Component to show; the last one declared when omitted
    #[arg(short, long)]
    component: Option<String>,
    /// Context value as name=value (int, float, bool or string)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = split_assignment)]
    set: Vec<(String, String)>,
    /// Log at debug level (twice for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    init_logging(LoggingConfig::with_level(level));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (filename, source) = match &cli.file {
        Some(path) => {
            let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            (path.display().to_string(), source)
        }
        None => ("<demo>".to_string(), DEMO.to_string()),
    };

    let mut app = Application::new().context("model", Value::Object(ClassDef::model("Model").instantiate()));
    for (name, raw) in &cli.set {
        app = app.context(name.clone(), parse_value(raw));
    }

    let component = cli.component.as_deref();
    let view = match app.run(&source, component) {
        Ok(view) => view,
        Err(e) => {
            let block = component.unwrap_or("<module>");
            match e.line() {
                Some(line) => bail!("{}\n{}", format_source_error(&filename, &source, line, block), e.root()),
                None => bail!("{e}"),
            }
        }
    };
    print!("{}", view.dump());
    Ok(())
}

fn split_assignment(arg: &str) -> Result<(String, String)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("expected NAME=VALUE, got `{arg}`");
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        bail!("`{name}` is not a valid name");
    }
    Ok((name.to_string(), raw.to_string()))
}

/// Reads an int, a float, a bool, or else a string.
fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        Value::Int(int)
    } else if let Ok(float) = raw.parse::<f64>() {
        Value::Float(float)
    } else {
        match raw {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            _ => Value::str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_pick_a_type() {
        assert_eq!(parse_value("3"), Value::Int(3));
        assert_eq!(parse_value("0.5"), Value::Float(0.5));
        assert_eq!(parse_value("True"), Value::Bool(true));
        assert_eq!(parse_value("Hello"), Value::str("Hello"));
    }

    #[test]
    fn assignments_split_on_the_first_equals() {
        assert_eq!(split_assignment("title=a=b").unwrap(), ("title".to_string(), "a=b".to_string()));
        assert!(split_assignment("novalue").is_err());
        assert!(split_assignment("a b=1").is_err());
        assert!(split_assignment("=1").is_err());
    }

    #[test]
    fn set_values_are_collected() {
        let cli = Cli::parse_from(["enaml-studio", "--set", "start=7"]);
        assert_eq!(cli.set, vec![("start".to_string(), "7".to_string())]);
        run(&cli).unwrap();
    }

    #[test]
    fn the_demo_builds() {
        let cli = Cli::parse_from(["enaml-studio"]);
        run(&cli).unwrap();
    }

    #[test]
    fn syntax_errors_show_the_source() {
        let dir = std::env::temp_dir().join(format!("enaml-studio-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.enaml");
        std::fs::write(&path, "Window:\n    title = 'x'\nField:\n    value = \n").unwrap();
        let cli = Cli::parse_from(["enaml-studio", path.to_str().unwrap()]);
        let err = run(&cli).unwrap_err().to_string();
        assert!(err.contains("---->"), "{err}");
        assert!(err.contains("broken.enaml"), "{err}");
    }
}
