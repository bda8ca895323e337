//! CLI probe for the engine.
//!
//! # Responsibility
//! - Verify `abele_core` linkage (`ping`/version output).
//! - Evaluate recurrence phrases from the command line.
//!
//! Usage:
//! - `abele_cli`
//! - `abele_cli next <YYYY-MM-DD> <pattern...> [--completed <YYYY-MM-DD>]`
//! - `abele_cli rule <pattern...>`
//!
//! Set `ABELE_LOG_DIR` to an absolute directory to write engine logs and
//! `ABELE_LOG_LEVEL` to override the level.

use abele_core::dates::{format_date, parse_date};
use abele_core::RecurrenceParser;
use chrono::NaiveDate;
use std::process::ExitCode;

const USAGE: &str = "usage: abele_cli [next <YYYY-MM-DD> <pattern...> [--completed <YYYY-MM-DD>] | rule <pattern...>]";

fn main() -> ExitCode {
    if let Err(err) = abele_core::init_logging_from_env() {
        eprintln!("logging disabled: {err}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None => {
            println!("abele_core ping={}", abele_core::ping());
            println!("abele_core version={}", abele_core::core_version());
            Ok(())
        }
        Some("next") => run_next(&args[1..]),
        Some("rule") => run_rule(&args[1..]),
        Some(other) => Err(format!("unknown command `{other}`\n{USAGE}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run_next(args: &[String]) -> Result<(), String> {
    let (base, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
    let base = parse_day(base)?;

    let mut words = Vec::new();
    let mut completed = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        if arg == "--completed" {
            let value = iter.next().ok_or("--completed needs a date")?;
            completed = Some(parse_day(value)?);
        } else {
            words.push(arg.as_str());
        }
    }
    if words.is_empty() {
        return Err(USAGE.to_string());
    }

    let pattern = words.join(" ");
    let next = RecurrenceParser::new().get_next_date(
        base.and_time(Default::default()),
        &pattern,
        completed.map(|day| day.and_time(Default::default())),
    );
    match next {
        Some(next) => println!("next={}", format_date(next.date())),
        None => println!("next=none"),
    }
    Ok(())
}

fn run_rule(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err(USAGE.to_string());
    }
    let pattern = args.join(" ");
    match RecurrenceParser::new().parse(&pattern) {
        Some(rule) => {
            let json = serde_json::to_string(&rule).map_err(|err| err.to_string())?;
            println!("rule={json}");
        }
        None => println!("rule=none"),
    }
    Ok(())
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date `{value}`, expected YYYY-MM-DD"))
}
