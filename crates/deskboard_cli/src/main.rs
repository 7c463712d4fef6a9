use clap::{CommandFactory, Parser};
use deskboard_cli::cli::{self, Cli, Command, TaskCommand, TicketCommand};
use deskboard_cli::render;
use deskboard_core::config::{self, Config, Palette, palette_for_theme};
use deskboard_core::error::AppError;
use deskboard_core::model::TaskStatus;
use deskboard_core::ollama::OllamaClient;
use deskboard_core::session::{Session, TaskBoard, TicketDesk};
use deskboard_core::storage::export;
use deskboard_core::task_api::{self, StatusChange};
use deskboard_core::ticket_api;
use std::io::{self, BufRead};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "DESKBOARD_LOG";

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn warn(message: &str) {
    eprintln!("WARNING: {message}");
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn load_base_config() -> Config {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        warn(&format!("using default configuration ({err})"));
    }
    loaded.config
}

fn run_command(cli: Cli, session: &mut Session, base: &Config) -> Result<(), AppError> {
    let overrides = cli::collect_overrides(&cli.config_override)?;
    let config = config::merge_overrides(base, &overrides);
    let palette = palette_for_theme(config.theme.as_deref());

    match cli.command {
        Command::Task { task } => run_task(task, &mut session.board, &palette, cli.json),
        Command::Ticket { ticket } => {
            run_ticket(ticket, &mut session.desk, &config, &palette, cli.json)
        }
    }
}

fn run_task(
    command: TaskCommand,
    board: &mut TaskBoard,
    palette: &Palette,
    json: bool,
) -> Result<(), AppError> {
    match command {
        TaskCommand::Add {
            project,
            description,
            due,
            status,
        } => {
            let status: TaskStatus = status.parse()?;
            let due = due.unwrap_or_else(|| task_api::today().to_string());
            let task = task_api::add_task(board, &project, &description, &due, status)?;
            if json {
                println!("{}", render::task_json(&task));
            } else {
                println!("Task added!");
                print!("{}", render::task_board(board, palette)?);
            }
        }
        TaskCommand::Status { position, status } => {
            let status: TaskStatus = status.parse()?;
            let change = task_api::update_status(board, position, status)?;
            if json {
                println!("{}", render::task_json(change.task()));
            } else {
                if matches!(change, StatusChange::Updated(_)) {
                    println!("Status updated!");
                }
                print!("{}", render::task_board(board, palette)?);
            }
        }
        TaskCommand::List => {
            if json {
                println!("{}", render::tasks_json(task_api::list_tasks(board)));
            } else {
                print!("{}", render::task_board(board, palette)?);
            }
        }
    }

    Ok(())
}

fn run_ticket(
    command: TicketCommand,
    desk: &mut TicketDesk,
    config: &Config,
    palette: &Palette,
    json: bool,
) -> Result<(), AppError> {
    match command {
        TicketCommand::Classify { text, model } => {
            let text = text.unwrap_or_default();
            ticket_api::require_ticket_text(&text)?;

            let backend = OllamaClient::new(config.ollama_url())?;
            let choice = ticket_api::resolve_model(
                desk,
                &backend,
                model.as_deref(),
                config.model(),
                config.fallback_model(),
            )?;
            if let Some(err) = choice.discovery.as_ref().and_then(|d| d.error.as_ref()) {
                warn(&format!(
                    "could not list models ({err}), falling back to {}",
                    choice.model
                ));
            }

            eprintln!("Classifying with {}...", choice.model);
            let entry = ticket_api::submit_ticket(desk, &backend, &text, &choice.model)?;
            if json {
                println!("{}", render::entry_json(&entry)?);
            } else {
                print!("{}", render::classification(&entry, palette));
                print!("{}", render::ticket_desk(desk, palette)?);
            }
        }
        TicketCommand::Models => {
            let backend = OllamaClient::new(config.ollama_url())?;
            let discovery = ticket_api::discover_models(&backend, config.fallback_model());
            if let Some(err) = discovery.error.as_ref() {
                warn(&format!(
                    "could not list models ({err}), falling back to {}",
                    config.fallback_model()
                ));
            }
            if json {
                let payload = serde_json::json!({
                    "models": discovery.models,
                    "error": discovery.error.as_ref().map(|err| err.to_string()),
                });
                println!("{payload}");
            } else {
                print!("{}", render::models(&discovery, palette));
            }
        }
        TicketCommand::Use { model } => {
            let selected = ticket_api::select_model(desk, &model)?;
            if json {
                println!("{}", render::desk_json(desk)?);
            } else {
                println!("Using model: {selected}");
            }
        }
        TicketCommand::History => {
            let shown = ticket_api::toggle_history(desk);
            if json {
                println!("{}", render::desk_json(desk)?);
            } else {
                if !shown {
                    println!("History hidden.");
                }
                print!("{}", render::ticket_desk(desk, palette)?);
            }
        }
        TicketCommand::Reset => {
            ticket_api::reset_history(desk);
            if json {
                println!("{}", render::desk_json(desk)?);
            } else {
                println!("History cleared.");
            }
        }
        TicketCommand::Export { dir } => match ticket_api::export_history(desk)? {
            Some(artifact) => {
                let path = export::write_export(&dir, &artifact)?;
                if json {
                    let payload = serde_json::json!({
                        "path": path.display().to_string(),
                        "mime_type": artifact.mime_type,
                        "records": artifact.records.len(),
                    });
                    println!("{payload}");
                } else {
                    println!(
                        "Exported {} tickets to {}",
                        artifact.records.len(),
                        path.display()
                    );
                }
            }
            None => warn("No tickets to export"),
        },
        TicketCommand::Stats => {
            if json {
                println!("{}", render::desk_json(desk)?);
            } else {
                print!("{}", render::ticket_desk(desk, palette)?);
            }
        }
    }

    Ok(())
}

fn run_interactive() -> Result<(), AppError> {
    let base = load_base_config();
    let mut session = Session::new();
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match cli::split_command_line(line)
            .and_then(|args| cli::expand_alias(args, &base.aliases))
        {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("deskboard".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = cli::check_interactive_flags(&cli)
            .and_then(|()| run_command(cli, &mut session, &base))
        {
            eprintln!("ERROR: {}", err);
        }
    }

    tracing::debug!(
        tasks = session.board.tasks.len(),
        tickets = session.desk.processed_tickets,
        "session ended"
    );
    Ok(())
}

fn main() {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        init_tracing(false);
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);
    let base = load_base_config();
    let mut session = Session::new();
    if let Err(err) = run_command(cli, &mut session, &base) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
