// src/cli.rs
use anyhow::{anyhow, bail, Context, Result};
use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing::error;

use crate::config::{load_config, PipelineConfig};
use crate::error::PipelineError;
use crate::load::discover_years;
use crate::pipeline::{CacheKey, PipelineCache, PipelineOutput};
use crate::query::{lookup, search_titles, DEFAULT_TITLE_LIMIT};
use crate::rank::TrendResult;
use crate::render::{self, OutputFormat};

const DEFAULT_TOP_N: usize = 10;

pub const USAGE: &str = "\
Usage: occtrends [options] <command>

Options:
  --config <file.yaml>   read pipeline settings from YAML
  --data-dir <dir>       directory with national_M<year>_dl.csv files
  --years <from>-<to>    inclusive year range (default 2015-2024)
  --lenient              skip missing/unreadable years instead of failing
  --json                 print JSON instead of tables

Commands:
  top [N]                fastest-growing occupations (default 10)
  bottom [N]             fastest-shrinking occupations (default 10)
  search [TERM]          titles containing TERM (blank: first 100)
  show <CODE|TITLE>      rank, trend and employment history
  years                  years with an input file present
  shell                  interactive session (results are loaded once)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Top(usize),
    Bottom(usize),
    Search(String),
    Show(String),
    Years,
    Shell,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cli {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub years: Option<(i32, i32)>,
    pub lenient: bool,
    pub json: bool,
    pub command: Option<Command>,
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        }
    }

    /// Resolve the effective config: file (if any), then flag overrides.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config_path {
            Some(p) => load_config(p)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some((first, last)) = self.years {
            config.first_year = first;
            config.last_year = last;
        }
        if self.lenient {
            config.strict = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parse process arguments (without the program name).
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut args = args.into_iter();
    let mut rest: Vec<String> = Vec::new();

    while let Some(a) = args.next() {
        if !rest.is_empty() {
            rest.push(a);
            continue;
        }
        match a.as_str() {
            "--config" => {
                cli.config_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("Missing value for --config"))?,
                ))
            }
            "--data-dir" => {
                cli.data_dir = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("Missing value for --data-dir"))?,
                ))
            }
            "--years" => {
                let v = args.next().ok_or_else(|| anyhow!("Missing value for --years"))?;
                cli.years = Some(parse_year_range(&v)?);
            }
            "--lenient" => cli.lenient = true,
            "--json" => cli.json = true,
            "-h" | "--help" => cli.command = Some(Command::Help),
            other if other.starts_with('-') => bail!("Unknown option: {other}"),
            _ => rest.push(a),
        }
    }

    if !rest.is_empty() {
        cli.command = Some(parse_command(&rest)?);
    }
    Ok(cli)
}

/// `2015-2024` or a single `2019`.
pub fn parse_year_range(s: &str) -> Result<(i32, i32)> {
    let (a, b) = match s.split_once('-') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (s.trim(), s.trim()),
    };
    let first: i32 = a.parse().with_context(|| format!("Invalid year: {a:?}"))?;
    let last: i32 = b.parse().with_context(|| format!("Invalid year: {b:?}"))?;
    if first > last {
        bail!("Invalid range: {s}");
    }
    Ok((first, last))
}

/// Parse one command line: the command word plus its arguments.
pub fn parse_command(words: &[String]) -> Result<Command> {
    let Some((head, tail)) = words.split_first() else {
        bail!("Missing command");
    };
    let arg = tail.join(" ");
    let count = |default: usize| -> Result<usize> {
        if arg.is_empty() {
            Ok(default)
        } else {
            arg.parse().with_context(|| format!("Invalid count: {arg:?}"))
        }
    };
    Ok(match head.to_ascii_lowercase().as_str() {
        "top" => Command::Top(count(DEFAULT_TOP_N)?),
        "bottom" => Command::Bottom(count(DEFAULT_TOP_N)?),
        "search" => Command::Search(arg),
        "show" => {
            if arg.is_empty() {
                bail!("show needs an occupation code or title");
            }
            Command::Show(arg)
        }
        "years" => Command::Years,
        "shell" => Command::Shell,
        "reload" => Command::Reload,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("Unknown command: {other}"),
    })
}

/// One interactive or one-shot session over a single config.
///
/// All commands share one [`PipelineCache`], so only the first command that
/// needs data pays for loading the files.
pub struct Session {
    config: PipelineConfig,
    cache: PipelineCache,
    format: OutputFormat,
}

impl Session {
    pub fn new(config: PipelineConfig, format: OutputFormat) -> Self {
        Self {
            config,
            cache: PipelineCache::new(),
            format,
        }
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    fn output(&mut self) -> crate::error::Result<Arc<PipelineOutput>> {
        self.cache.get_or_run(&self.config)
    }

    /// Run one command. Returns `false` when the session should end.
    pub fn execute<W: Write>(&mut self, cmd: &Command, out: &mut W) -> Result<bool> {
        match cmd {
            Command::Top(n) => {
                let output = self.output()?;
                let rows: Vec<&TrendResult> = output.ranked.top(*n).iter().collect();
                let heading = format!("Top {} growing occupations", rows.len());
                render::write_ranking(out, &heading, &rows, self.format)?;
            }
            Command::Bottom(n) => {
                let output = self.output()?;
                let rows = output.ranked.bottom(*n);
                let heading = format!("Top {} shrinking occupations", rows.len());
                render::write_ranking(out, &heading, &rows, self.format)?;
            }
            Command::Search(term) => {
                let output = self.output()?;
                let ranked = &output.ranked;
                let matches: Vec<&TrendResult> = search_titles(ranked, term, DEFAULT_TITLE_LIMIT)
                    .into_iter()
                    .filter_map(|t| ranked.by_title(t))
                    .collect();
                render::write_matches(out, &matches, self.format)?;
            }
            Command::Show(key) => {
                let output = self.output()?;
                match lookup(&output, key) {
                    Some(detail) => render::write_detail(out, &detail, self.format)?,
                    None => writeln!(out, "No ranked occupation matches {key:?}.")?,
                }
            }
            Command::Years => {
                let years = discover_years(&self.config)?;
                render::write_years(out, &years, self.format)?;
            }
            Command::Reload => {
                let key = CacheKey::for_config(&self.config);
                if let Some(old) = self.cache.get(&key) {
                    writeln!(
                        out,
                        "Dropping results loaded at {}.",
                        old.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
                    )?;
                    self.cache.invalidate(&key);
                }
                writeln!(out, "Data will be reloaded on the next command.")?;
            }
            Command::Help => writeln!(out, "{USAGE}")?,
            Command::Shell => writeln!(out, "Already in a shell.")?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Read commands line by line until EOF or `quit`.
    ///
    /// Pipeline failures are reported and the command is skipped; nothing is
    /// rendered from a failed load.
    pub fn run_shell<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(out, "occtrends shell. Type 'help' for commands, 'quit' to leave.")?;
        for line in input.lines() {
            let line = line.context("reading command")?;
            let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if words.is_empty() {
                continue;
            }
            let cmd = match parse_command(&words) {
                Ok(c) => c,
                Err(e) => {
                    writeln!(out, "{e}")?;
                    continue;
                }
            };
            match self.execute(&cmd, out) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("{e:#}");
                    writeln!(out, "{}", diagnostic(&e))?;
                }
            }
        }
        Ok(())
    }
}

/// Human-readable failure summary naming the stage and, when known, the year.
pub fn diagnostic(err: &anyhow::Error) -> String {
    match err.downcast_ref::<PipelineError>() {
        Some(pe) => match pe.year() {
            Some(year) => format!("Data pipeline failed at {} stage (year {year}): {pe}", pe.stage()),
            None => format!("Data pipeline failed at {} stage: {pe}", pe.stage()),
        },
        None => format!("Error: {err:#}"),
    }
}

/// Entry point shared by the binary: parse, configure, dispatch.
pub fn run<I: IntoIterator<Item = String>>(args: I) -> Result<()> {
    let cli = parse_args(args)?;
    let command = cli.command.clone().unwrap_or(Command::Help);
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = cli.pipeline_config()?;
    let mut session = Session::new(config, cli.format());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if command == Command::Shell {
        let stdin = std::io::stdin();
        return session.run_shell(stdin.lock(), &mut out);
    }
    session.execute(&command, &mut out)?;
    Ok(())
}
