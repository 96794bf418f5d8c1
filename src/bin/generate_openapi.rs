//! Writes the OpenAPI document served at `/api-docs/openapi.json`.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json
//!   cargo run --bin generate_openapi -- --check openapi.json

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use sensor_log::api::handlers::ApiDoc;
use utoipa::OpenApi;

#[derive(Debug, PartialEq)]
enum Target {
    Stdout,
    File(PathBuf),
    /// Compare against a committed copy instead of writing.
    Check(PathBuf),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Target> {
    let mut args = args.into_iter();
    let target = match args.next().as_deref() {
        None => return Ok(Target::Stdout),
        Some("--output") => Target::File(path_arg(args.next(), "--output")?),
        Some("--check") => Target::Check(path_arg(args.next(), "--check")?),
        Some(other) => bail!("unknown argument {other:?}"),
    };
    if let Some(extra) = args.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(target)
}

fn path_arg(value: Option<String>, flag: &str) -> Result<PathBuf> {
    match value {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => bail!("{flag} needs a file path"),
    }
}

fn document() -> Result<String> {
    let mut json = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to serialise the OpenAPI document")?;
    json.push('\n');
    Ok(json)
}

fn run(target: Target) -> Result<bool> {
    let json = document()?;
    match target {
        Target::Stdout => {
            io::stdout()
                .write_all(json.as_bytes())
                .context("failed to write to stdout")?;
        }
        Target::File(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("OpenAPI document written to {}", path.display());
        }
        Target::Check(path) => {
            let existing = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if existing != json {
                eprintln!("{} is out of date; rerun with --output", path.display());
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn main() -> Result<ExitCode> {
    let target = parse_args(env::args().skip(1))?;
    Ok(if run(target)? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Target> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_prints_to_stdout() {
        assert_eq!(args(&[]).unwrap(), Target::Stdout);
    }

    #[test]
    fn output_and_check_take_a_path() {
        assert_eq!(
            args(&["--output", "openapi.json"]).unwrap(),
            Target::File("openapi.json".into())
        );
        assert_eq!(
            args(&["--check", "docs/openapi.json"]).unwrap(),
            Target::Check("docs/openapi.json".into())
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(args(&["--output"]).is_err());
        assert!(args(&["--check", ""]).is_err());
        assert!(args(&["--pretty"]).is_err());
        assert!(args(&["--output", "a.json", "b.json"]).is_err());
    }

    #[test]
    fn document_lists_every_route() {
        let json = document().unwrap();
        for path in ["/log", "/view", "/api/readings", "/download", "/health"] {
            assert!(json.contains(&format!("\"{path}\"")), "missing {path}");
        }
        assert!(json.ends_with("}\n"));
    }

    #[test]
    fn check_reports_a_stale_copy() {
        let path = env::temp_dir().join(format!("sensor_log_openapi_{}.json", std::process::id()));
        fs::write(&path, "{}\n").unwrap();
        assert!(!run(Target::Check(path.clone())).unwrap());

        fs::write(&path, document().unwrap()).unwrap();
        assert!(run(Target::Check(path.clone())).unwrap());
        fs::remove_file(&path).unwrap();
    }
}
