//! CLI entry point for `replyscribe`.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use replyscribe::config::{self, Config};
use replyscribe::llm::build_model;
use replyscribe::model::message::{GeneratedReply, IncomingMessage};
use replyscribe::model::profile::StyleProfile;
use replyscribe::pipeline::check::ConnectivityChecker;
use replyscribe::pipeline::collector::SampleCollector;
use replyscribe::pipeline::extractor::StyleExtractor;
use replyscribe::pipeline::respond::{Responder, Review};
use replyscribe::pipeline::{CancelToken, ItemOutcome};
use replyscribe::store::maildir::MaildirStore;
use replyscribe::store::profile::ProfileFile;
use replyscribe::store::samples::SampleDir;
use replyscribe::store::{MailStore, ProfileStore, SampleStore};
use replyscribe::ScribeError;

#[derive(Parser)]
#[command(
    name = "replyscribe",
    version,
    about = "Draft email replies in your own writing style",
    long_about = "Collects your past emails as writing samples, distills them into a \
                  style profile with a generative model, and files style-matched draft \
                  replies to unread mail. Nothing is ever sent."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect writing samples from the mailbox
    Collect {
        /// Collect mail received from this address instead of your sent mail
        #[arg(long, value_name = "ADDR")]
        from: Option<String>,
        /// Maximum number of messages to collect
        #[arg(long, value_name = "N")]
        max: Option<usize>,
        /// Remove existing samples first
        #[arg(long)]
        clear: bool,
    },
    /// Extract a style profile from the collected samples
    Extract,
    /// List unread messages that would get a reply
    Check {
        #[arg(long, value_name = "FOLDER")]
        folder: Option<String>,
        #[arg(long, value_name = "N")]
        max: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Generate draft replies to unread messages
    Respond {
        #[arg(long, value_name = "FOLDER")]
        folder: Option<String>,
        #[arg(long, value_name = "N")]
        max: Option<usize>,
        /// Accept every draft without asking
        #[arg(short, long)]
        yes: bool,
        /// Extra instructions for every reply
        #[arg(long, value_name = "TEXT")]
        instructions: Option<String>,
    },
    /// List mail folders with unread counts
    Folders,
    /// Check connectivity to the mail store and the model
    Test,
    /// Show the effective configuration, or save it as the config file
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
    /// Show the stored style profile
    Profile {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Collect { from, max, clear } => cmd_collect(&config, from.as_deref(), max, clear),
        Commands::Extract => cmd_extract(&config),
        Commands::Check { folder, max, json } => cmd_check(&config, folder, max, json),
        Commands::Respond {
            folder,
            max,
            yes,
            instructions,
        } => cmd_respond(&config, folder, max, yes, instructions),
        Commands::Folders => cmd_folders(&config),
        Commands::Test => cmd_test(&config),
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Profile { json } => cmd_profile(&config, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = config::log_file_path(config);
    let log_dir = log_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_file.file_name().unwrap_or_else(|| OsStr::new("replyscribe.log"));
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn bar(len: u64, verb: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {verb} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Copy authored mail into the sample store.
fn cmd_collect(
    config: &Config,
    from: Option<&str>,
    max: Option<usize>,
    clear: bool,
) -> anyhow::Result<ExitCode> {
    let mut mail = MaildirStore::from_config(config);
    let mut samples = SampleDir::new(config::samples_dir(config));
    let location = samples.location();

    if clear {
        let removed = samples.clear()?;
        println!("  Removed {removed} sample(s) from {}", location.display());
    }

    let max = max.unwrap_or(config.style.collect_limit);
    let pb = bar(max as u64, "Collecting");

    let mut collector = SampleCollector::new(&mut mail, &mut samples, &config.style)
        .on_progress(|r| pb.set_position((r.stored + r.duplicates) as u64));
    let result = match from {
        Some(sender) => collector.collect_from(sender, max),
        None => collector.collect(max),
    };
    let report = collector.report();
    drop(collector);
    pb.finish_and_clear();

    println!();
    println!("  {:<25} {}", "Samples stored", report.stored);
    println!("  {:<25} {}", "Already present", report.duplicates);
    println!("  {:<25} {}", "Too short", report.skipped_short);
    if report.failed > 0 {
        println!("  {:<25} {}", "Failed", report.failed);
    }
    println!("  {:<25} {}", "Sample directory", location.display());
    println!();

    result?;
    Ok(exit_code(report.failed == 0))
}

/// Analyze the samples and store a new style profile.
fn cmd_extract(config: &Config) -> anyhow::Result<ExitCode> {
    let samples = SampleDir::new(config::samples_dir(config));
    let mut profiles = ProfileFile::new(config::profile_path(config));
    let model = build_model(&config.model)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Analyzing writing style with {}", model.describe()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = StyleExtractor::new(
        &samples,
        &mut profiles,
        &*model,
        config.style.max_corpus_chars,
    )
    .extract();
    spinner.finish_and_clear();

    let profile = result?;
    print_profile_table(&profile);
    println!("  Saved to {}", profiles.path().display());
    println!();
    Ok(ExitCode::SUCCESS)
}

/// List unread messages without generating anything.
fn cmd_check(
    config: &Config,
    folder: Option<String>,
    max: Option<usize>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let mut mail = MaildirStore::from_config(config);
    let folder = folder.unwrap_or_else(|| config.mail.inbox_folder.clone());
    let messages = mail.list_unread(&folder, max.unwrap_or(config.mail.unread_limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("  {} unread message(s) in {folder}", messages.len());
    println!();
    if messages.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "  {:<4} {:<17} {:<25} {:<40}",
        "#", "Date", "From", "Subject"
    );
    println!("  {}", "-".repeat(88));
    for (i, m) in messages.iter().enumerate() {
        let from: String = m.sender.salutation_name().chars().take(24).collect();
        let subject: String = m.subject.chars().take(39).collect();
        println!(
            "  {:<4} {:<17} {:<25} {:<40}",
            i + 1,
            m.received.format("%Y-%m-%d %H:%M"),
            from,
            subject
        );
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

/// Generate and file draft replies.
fn cmd_respond(
    config: &Config,
    folder: Option<String>,
    max: Option<usize>,
    yes: bool,
    instructions: Option<String>,
) -> anyhow::Result<ExitCode> {
    let profiles = ProfileFile::new(config::profile_path(config));
    let model = build_model(&config.model)?;
    let mut mail = MaildirStore::from_config(config);
    let folder = folder.unwrap_or_else(|| config.mail.inbox_folder.clone());
    let max = max.unwrap_or(config.mail.unread_limit);
    let cancel = CancelToken::new();

    let pb = if yes {
        bar(0, "Drafting")
    } else {
        ProgressBar::hidden()
    };

    let mut responder = Responder::new(&mut mail, &*model, &profiles)?
        .instructions(instructions)
        .on_progress(|index, total, _| {
            pb.set_length(total as u64);
            pb.set_position(index as u64);
        });
    if !yes {
        responder = responder.reviewer(review_interactively);
    }
    let report = responder.respond(&folder, max, &cancel)?;
    drop(responder);
    pb.finish_and_clear();

    println!();
    if report.items.is_empty() && !report.cancelled {
        println!("  No unread messages in {folder}.");
        println!();
        return Ok(ExitCode::SUCCESS);
    }
    println!("  {:<4} {:<8} {:<40} {}", "#", "Result", "Subject", "Detail");
    println!("  {}", "-".repeat(88));
    for (i, item) in report.items.iter().enumerate() {
        let (label, detail) = match &item.outcome {
            ItemOutcome::Done(d) => ("drafted", d),
            ItemOutcome::Skipped(d) => ("skipped", d),
            ItemOutcome::Failed(d) => ("FAILED", d),
        };
        let subject: String = item.subject.chars().take(39).collect();
        println!("  {:<4} {:<8} {:<40} {}", i + 1, label, subject, detail);
    }
    println!();
    println!(
        "  {} drafted, {} skipped, {} failed{}",
        report.succeeded(),
        report.skipped(),
        report.failed(),
        if report.cancelled { " (stopped early)" } else { "" }
    );
    println!();
    Ok(exit_code(!report.has_failures()))
}

/// Show one reply and ask what to do with it.
fn review_interactively(message: &IncomingMessage, reply: &GeneratedReply) -> Review {
    println!();
    println!("{}", "=".repeat(60));
    println!("  From:    {}", message.sender);
    println!("  Subject: {}", message.subject);
    println!("{}", "-".repeat(60));
    println!("{}", message.preview(500));
    println!("{}", "=".repeat(60));
    println!("  DRAFT REPLY:");
    println!("{}", "-".repeat(60));
    println!("{}", reply.body);
    println!("{}", "-".repeat(60));

    loop {
        let Some(choice) = prompt("[A]ccept / [R]etry / [E]dit instructions / [S]kip / [Q]uit? ")
        else {
            return Review::Quit;
        };
        match choice.trim().to_ascii_uppercase().as_str() {
            "A" => return Review::Accept,
            "R" => return Review::Retry,
            "E" => return Review::Edit(prompt("New instructions: ").unwrap_or_default()),
            "S" => return Review::Skip,
            "Q" => return Review::Quit,
            _ => println!("Invalid choice. Please enter A, R, E, S or Q."),
        }
    }
}

/// Read one line from stdin; `None` on end of input.
fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn cmd_folders(config: &Config) -> anyhow::Result<ExitCode> {
    let mut mail = MaildirStore::from_config(config);
    let folders = mail.list_folders()?;
    println!();
    println!("  {:<30} {:>8}", "Folder", "Unread");
    println!("  {}", "-".repeat(39));
    for f in &folders {
        println!("  {:<30} {:>8}", f.name, f.unread);
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

/// Probe the mail store, the model and the profile.
fn cmd_test(config: &Config) -> anyhow::Result<ExitCode> {
    let mut mail = MaildirStore::from_config(config);
    let profiles = ProfileFile::new(config::profile_path(config));
    let model = build_model(&config.model);

    let report = match &model {
        Ok(model) => ConnectivityChecker::new(&mut mail, &**model),
        Err(e) => ConnectivityChecker::without_model(&mut mail, e.to_string()),
    }
    .with_profiles(&profiles)
    .check();

    let mark = |ok: bool| if ok { "ok" } else { "FAIL" };
    println!();
    println!("  {:<12} {}", "Mail store", mark(report.mail_store_ok));
    println!("  {:<12} {}", "Model", mark(report.model_ok));
    println!(
        "  {:<12} {}",
        "Profile",
        if report.profile_present { "present" } else { "missing" }
    );
    println!();
    for (what, detail) in &report.details {
        println!("  {what:<12} {detail}");
    }
    println!();
    Ok(exit_code(report.all_ok()))
}

/// Print the effective configuration, or save it.
fn cmd_config(config: &Config, write: bool) -> anyhow::Result<ExitCode> {
    let mut effective = config.clone();
    let key_from_env = std::env::var(config::API_KEY_ENV)
        .is_ok_and(|k| !k.trim().is_empty() && k.trim() == effective.model.api_key);

    if write {
        // Keys that only came from the environment stay out of the file.
        if key_from_env {
            effective.model.api_key.clear();
        }
        let path = config::save_config(&effective)?;
        println!("  Saved configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if !effective.model.api_key.is_empty() {
        effective.model.api_key = "********".to_string();
    }
    if let Some(path) = config::config_file_path() {
        println!("# {}", path.display());
    }
    println!("# maildir: {}", config::maildir_root(config).display());
    println!("# samples: {}", config::samples_dir(config).display());
    println!("# profile: {}", config::profile_path(config).display());
    println!("# log:     {}", config::log_file_path(config).display());
    println!();
    print!("{}", toml::to_string_pretty(&effective)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_profile(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let profiles = ProfileFile::new(config::profile_path(config));
    let profile = profiles
        .read_profile()?
        .ok_or_else(|| ScribeError::NoStyleProfile(profiles.location()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(ExitCode::SUCCESS);
    }

    use humansize::{format_size, BINARY};
    print_profile_table(&profile);
    let size = std::fs::metadata(profiles.path()).map(|m| m.len()).unwrap_or(0);
    println!(
        "  {} ({})",
        profiles.path().display(),
        format_size(size, BINARY)
    );
    println!();
    Ok(ExitCode::SUCCESS)
}

fn print_profile_table(profile: &StyleProfile) {
    println!();
    println!(
        "  Style profile from {} sample(s), created {}",
        profile.sample_count,
        profile.created_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    for (key, value) in profile.fields() {
        let flat: String = value.split_whitespace().collect::<Vec<_>>().join(" ");
        let shown: String = flat.chars().take(70).collect();
        let ellipsis = if flat.chars().count() > 70 { "..." } else { "" };
        println!("  {key:<25} {shown}{ellipsis}");
    }
    println!();
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "replyscribe", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<ExitCode> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(ExitCode::SUCCESS)
}
