use std::path::PathBuf;

use atty::Stream;
use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use silo_core::{
    self, AddRequest, CommandContext, CommandGroup, CommandInfo, CommandStatus, EnvCreateRequest,
    ExecutionOutcome, GlobalOptions, PinRequest,
};

mod style;

use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = SiloCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };

    let ctx = CommandContext::new(&global).map_err(|err| eyre!("{err:?}"))?;
    let (info, outcome) = dispatch(&ctx, &cli.command).map_err(|err| eyre!("{err:?}"))?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("silo={level},silo_core={level},silo_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn dispatch(
    ctx: &CommandContext,
    command: &Command,
) -> anyhow::Result<(CommandInfo, ExecutionOutcome)> {
    match command {
        Command::Add(args) => {
            let info = CommandInfo::new(CommandGroup::Add, "add");
            let request = AddRequest {
                name: args.name.clone(),
                version: args.version.clone(),
                source: args.path.clone(),
            };
            Ok((info, silo_core::store_add(ctx, &request)?))
        }
        Command::List => {
            let info = CommandInfo::new(CommandGroup::List, "list");
            Ok((info, silo_core::store_list(ctx)?))
        }
        Command::Info => {
            let info = CommandInfo::new(CommandGroup::Info, "info");
            Ok((info, silo_core::store_info(ctx)?))
        }
        Command::CreateEnv(args) => {
            let info = CommandInfo::new(CommandGroup::CreateEnv, "create-env");
            let request = EnvCreateRequest {
                name: args.name.clone(),
                description: args.description.clone().unwrap_or_default(),
            };
            Ok((info, silo_core::env_create(ctx, &request)?))
        }
        Command::Pin(args) => {
            let info = CommandInfo::new(CommandGroup::Pin, "pin");
            let request = PinRequest {
                environment: args.environment.clone(),
                package: args.package.clone(),
                version: args.version.clone(),
            };
            Ok((info, silo_core::env_pin(ctx, &request)?))
        }
        Command::ListEnvs => {
            let info = CommandInfo::new(CommandGroup::ListEnvs, "list-envs");
            Ok((info, silo_core::env_list(ctx)?))
        }
        Command::ShowEnv(args) => {
            let info = CommandInfo::new(CommandGroup::ShowEnv, "show-env");
            Ok((info, silo_core::env_show(ctx, &args.name)?))
        }
        Command::Verify(args) => {
            let info = CommandInfo::new(CommandGroup::Verify, "verify");
            Ok((info, silo_core::verify_env(ctx, &args.name)?))
        }
        Command::Resolve(args) => {
            let info = CommandInfo::new(CommandGroup::Resolve, "resolve");
            Ok((info, silo_core::resolve_env(ctx, &args.name)?))
        }
        Command::Gc => {
            let info = CommandInfo::new(CommandGroup::Gc, "gc");
            Ok((info, silo_core::store_gc(ctx)?))
        }
        Command::Doctor => {
            let info = CommandInfo::new(CommandGroup::Doctor, "doctor");
            Ok((info, silo_core::store_doctor(ctx)?))
        }
    }
}

fn emit_output(cli: &SiloCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = match outcome.status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    };

    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = silo_core::to_json_response(info, outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        let message = silo_core::format_status_message(info, &outcome.message);
        println!("{}", style.status(&outcome.status, &message));
        if let Some(hint) = hint_from_details(&outcome.details) {
            let hint_line = format!("Hint: {hint}");
            println!("{}", style.info(&hint_line));
        }
        if let Some(table) = render_table(&style, info, &outcome.details) {
            println!("{table}");
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn render_table(style: &Style, info: CommandInfo, details: &Value) -> Option<String> {
    match info.group {
        CommandGroup::List => {
            let rows = collect_rows(details, "packages", &["name", "version", "size_bytes"])?;
            Some(format_table(style, &["Package", "Version", "Bytes"], &rows))
        }
        CommandGroup::ListEnvs => {
            let rows = collect_rows(
                details,
                "environments",
                &["name", "package_count", "description"],
            )?;
            Some(format_table(
                style,
                &["Environment", "Packages", "Description"],
                &rows,
            ))
        }
        CommandGroup::ShowEnv => {
            let selections = details.get("selections")?.as_object()?;
            if selections.is_empty() {
                return None;
            }
            let rows: Vec<Vec<String>> = selections
                .iter()
                .map(|(name, version)| {
                    vec![
                        name.clone(),
                        version.as_str().unwrap_or_default().to_string(),
                    ]
                })
                .collect();
            Some(format_table(style, &["Package", "Version"], &rows))
        }
        CommandGroup::Verify => {
            let rows = collect_rows(details, "missing", &["name", "version"])?;
            Some(format_table(style, &["Missing", "Version"], &rows))
        }
        _ => None,
    }
}

fn collect_rows(details: &Value, key: &str, fields: &[&str]) -> Option<Vec<Vec<String>>> {
    let items = details.get(key)?.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        let mut row = Vec::with_capacity(fields.len());
        for field in fields {
            let cell = match obj.get(*field)? {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            row.push(cell);
        }
        rows.push(row);
    }
    Some(rows)
}

fn format_table(style: &Style, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.len());
        }
    }

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| format!("{cell:<width$}", width = widths[idx]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|header| (*header).to_string()).collect();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(style.table_header(&render_row(&header_cells)));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render_row(row));
    }
    lines.join("\n")
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Deduplicated package store with per-environment manifests",
    long_about = "Each (name, version) payload is stored once; environments pin versions \
                  through lightweight manifests and are verified against the store.",
    after_help = "Examples:\n  silo add calculator 1.0.0 ./build/calculator\n  silo verify web_app\n  silo --json list"
)]
struct SiloCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    json: bool,
    #[arg(long, help = "Disable colored human output")]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(
        about = "Copy a payload into the store under NAME VERSION (idempotent).",
        override_usage = "silo add <NAME> <VERSION> <PATH>",
        after_help = "Example:\n  silo add calculator 1.0.0 ./build/calculator\n"
    )]
    Add(AddArgs),
    #[command(about = "List every stored package version.")]
    List,
    #[command(about = "Show store statistics (versions, unique packages, size).")]
    Info,
    #[command(
        name = "create-env",
        about = "Register a new environment with empty selections.",
        after_help = "Example:\n  silo create-env web_app --description \"Web application\"\n"
    )]
    CreateEnv(CreateEnvArgs),
    #[command(
        about = "Pin a package version in an environment (replaces any prior pin).",
        override_usage = "silo pin <ENV> <PACKAGE> <VERSION>"
    )]
    Pin(PinArgs),
    #[command(name = "list-envs", about = "List registered environments.")]
    ListEnvs,
    #[command(name = "show-env", about = "Show one environment's manifest.")]
    ShowEnv(EnvNameArgs),
    #[command(
        about = "Check an environment's selections against the store.",
        after_help = "Exit status is 1 when any selection is missing from the store.\n"
    )]
    Verify(EnvNameArgs),
    #[command(about = "Resolve an environment's selections to read-only store paths.")]
    Resolve(EnvNameArgs),
    #[command(about = "Remove store entries no environment references.")]
    Gc,
    #[command(about = "Sweep staging leftovers and check payload integrity.")]
    Doctor,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(value_name = "NAME")]
    name: String,
    #[arg(value_name = "VERSION")]
    version: String,
    #[arg(value_name = "PATH", value_parser = value_parser!(PathBuf))]
    path: PathBuf,
}

#[derive(Args, Debug)]
struct CreateEnvArgs {
    #[arg(value_name = "NAME")]
    name: String,
    #[arg(long, help = "Human-readable description stored in the manifest")]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct PinArgs {
    #[arg(value_name = "ENV")]
    environment: String,
    #[arg(value_name = "PACKAGE")]
    package: String,
    #[arg(value_name = "VERSION")]
    version: String,
}

#[derive(Args, Debug)]
struct EnvNameArgs {
    #[arg(value_name = "NAME")]
    name: String,
}
