// file: src/utils/logging.rs
// description: Tracing subscriber initialization with optional ANSI coloring
// reference: llm calls are additionally appended to a daily log file

use chrono::{Local, NaiveDate};
use colored::*;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, filter, fmt, prelude::*};

const LLM_TARGET: &str = "repo_harvest::llm";

pub fn init_logger(colored_output: bool, verbose: bool, llm_log_dir: Option<&Path>) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .with_ansi(colored_output);

    let llm_layer = llm_log_dir.and_then(|dir| match open_llm_log(dir) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter::filter_fn(|meta| {
                    meta.target().starts_with(LLM_TARGET)
                })),
        ),
        Err(e) => {
            eprintln!(
                "{}",
                format_warning(&format!("LLM call log disabled ({}): {}", dir.display(), e))
            );
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(llm_layer)
        .init();
}

pub fn llm_log_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("llm_calls_{}.log", date.format("%Y%m%d")))
}

fn open_llm_log(dir: &Path) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(llm_log_path(dir, Local::now().date_naive()))
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}
