use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use secretty::cache::{Cache, DEFAULT_MAX_ENTRIES};
use secretty::clipboard::{self, Backend};
use secretty::config::{self, Config};
use secretty::detect::Engine;
use secretty::ipc::{self, CopyFn, Server};
use secretty::pty::{self, PtyOptions};
use secretty::stream::RedactStream;
use secretty::types::Mode;
use secretty::allowlist;

const USAGE: &str = "usage: secretty [--config <path>] [--] <command> [args...]
       secretty shell [--config <path>]
       secretty copy-last
       secretty copy <id>
       secretty list
       secretty version";

enum Cmd {
    /// Wrap a command (empty argv means the user's shell, interactively).
    Wrap,
    Shell,
    CopyLast,
    CopyById(u64),
    List,
    Version,
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let mut config_path: Option<PathBuf> = None;
    let mut command_args: Vec<OsString> = Vec::new();
    let mut cmd: Option<Cmd> = None;

    let mut args = env::args_os().skip(1);
    while let Some(arg) = args.next() {
        if cmd.is_some() {
            command_args.push(arg);
            continue;
        }
        let Some(flag) = arg.to_str() else {
            cmd = Some(Cmd::Wrap);
            command_args.push(arg);
            continue;
        };
        match flag {
            "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => return usage_error("--config requires a path"),
            },
            _ if flag.starts_with("--config=") => {
                config_path = Some(PathBuf::from(&flag["--config=".len()..]));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return 0;
            }
            "--" => cmd = Some(Cmd::Wrap),
            "shell" => cmd = Some(Cmd::Shell),
            "copy-last" => cmd = Some(Cmd::CopyLast),
            "copy" => match args.next().and_then(|v| v.to_str()?.parse::<u64>().ok()) {
                Some(id) if id > 0 => cmd = Some(Cmd::CopyById(id)),
                _ => return usage_error("copy requires a numeric id"),
            },
            "list" => cmd = Some(Cmd::List),
            "version" => cmd = Some(Cmd::Version),
            _ if flag.starts_with('-') => {
                return usage_error(&format!("unknown flag: {flag}"));
            }
            _ => {
                cmd = Some(Cmd::Wrap);
                command_args.push(arg);
            }
        }
    }

    match cmd.unwrap_or(Cmd::Shell) {
        Cmd::Version => {
            println!("secretty {}", env!("CARGO_PKG_VERSION"));
            0
        }
        Cmd::CopyLast => client_copy(None),
        Cmd::CopyById(id) => client_copy(Some(id)),
        Cmd::List => client_list(),
        Cmd::Shell => wrap_session(config_path.as_deref(), &[], true),
        Cmd::Wrap => {
            let interactive = command_args.is_empty();
            wrap_session(config_path.as_deref(), &command_args, interactive)
        }
    }
}

fn usage_error(msg: &str) -> i32 {
    eprintln!("secretty: {msg}");
    eprintln!("{USAGE}");
    2
}

/// Runs a PTY session with redaction, returning the child's exit code.
fn wrap_session(config_path: Option<&Path>, command_args: &[OsString], interactive: bool) -> i32 {
    let (mut cfg, found) = match config::load(config_path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("secretty: {err}");
            return 1;
        }
    };
    init_logging(&cfg);

    let resolved_config_path = if found {
        config_path
            .map(Path::to_path_buf)
            .or_else(config::default_path)
    } else {
        None
    };

    let mut command = build_command(command_args);
    if env::var_os("SECRETTY_HOOK_DEBUG").is_some_and(|v| !v.is_empty()) {
        eprintln!(
            "secretty wrapper: interactive={} stdin_tty={} cfg={} cmd={:?}",
            interactive,
            pty::term::is_tty(libc::STDIN_FILENO),
            resolved_config_path
                .as_deref()
                .unwrap_or(Path::new("<defaults>"))
                .display(),
            command.get_program(),
        );
    }

    let bypass = should_bypass_redaction(&cfg, &command);
    if env::var_os("SECRETTY_WRAPPED").is_none() {
        command.env("SECRETTY_WRAPPED", "1");
    }
    if let Some(path) = &resolved_config_path {
        if env::var_os("SECRETTY_CONFIG").is_none() {
            command.env("SECRETTY_CONFIG", path);
        }
    }

    let cache = if bypass { None } else { build_cache(&cfg) };
    let _ipc_server = match &cache {
        Some(cache) => start_ipc_server(&cfg, Arc::clone(cache), &mut command),
        None => None,
    };

    if interactive && !bypass {
        cfg.redaction.rolling_window_bytes = 0;
    }

    let opts = PtyOptions::default();
    let result = if bypass {
        pty::run_command(command, io::stdout(), opts)
    } else {
        let engine = match Engine::new(&cfg) {
            Ok(engine) => engine,
            Err(err) => {
                eprintln!("secretty: {err}");
                return 1;
            }
        };
        let stream = RedactStream::new(io::stdout(), &cfg, engine, cache);
        pty::run_command(command, stream, opts)
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("secretty: {err}");
            1
        }
    }
}

fn build_command(command_args: &[OsString]) -> Command {
    if command_args.is_empty() {
        let shell = env::var_os("SHELL").unwrap_or_else(|| OsString::from("/bin/sh"));
        return Command::new(shell);
    }
    let mut command = Command::new(&command_args[0]);
    command.args(&command_args[1..]);
    command
}

fn build_cache(cfg: &Config) -> Option<Arc<Cache>> {
    if !cfg.overrides.copy_without_render.enabled {
        return None;
    }
    if cfg.mode == Mode::Strict && cfg.strict.disable_copy_original {
        return None;
    }
    let ttl = Duration::from_secs(cfg.overrides.copy_without_render.ttl_seconds);
    Some(Arc::new(Cache::new(DEFAULT_MAX_ENTRIES, ttl)))
}

/// Starts the per-session IPC endpoint and exports its socket path to the
/// child. A failure here downgrades the session (no copy support) instead of
/// aborting it.
fn start_ipc_server(cfg: &Config, cache: Arc<Cache>, command: &mut Command) -> Option<Server> {
    let backend = match Backend::parse(&cfg.overrides.copy_without_render.backend) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("secretty: copy cache unavailable: {err}");
            return None;
        }
    };
    let copy_fn: CopyFn = Arc::new(move |payload| {
        clipboard::copy_bytes(backend, payload).map_err(|err| err.to_string())
    });
    let socket_path = match ipc::temp_socket_path() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("secretty: copy cache unavailable: {err}");
            return None;
        }
    };
    match Server::start(&socket_path, cache, copy_fn) {
        Ok(server) => {
            command.env("SECRETTY_SOCKET", &socket_path);
            Some(server)
        }
        Err(err) => {
            eprintln!("secretty: copy cache unavailable: {err}");
            None
        }
    }
}

fn should_bypass_redaction(cfg: &Config, command: &Command) -> bool {
    if !cfg.allowlist.enabled || cfg.allowlist.commands.is_empty() {
        return false;
    }
    let argv0 = command.get_program().to_string_lossy().into_owned();
    let resolved = resolve_command_path(&argv0);
    match allowlist::matches(&cfg.allowlist.commands, &argv0, &resolved) {
        Ok(matched) => {
            if matched {
                tracing::debug!(command = %argv0, resolved = %resolved, "allowlist bypass");
            }
            matched
        }
        Err(err) => {
            tracing::debug!(error = %err, "allowlist pattern rejected");
            false
        }
    }
}

fn resolve_command_path(argv0: &str) -> String {
    if argv0.is_empty() || argv0.contains('/') {
        return argv0.to_string();
    }
    let Some(path_var) = env::var_os("PATH") else {
        return argv0.to_string();
    };
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(argv0);
        if candidate.is_file() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    argv0.to_string()
}

fn init_logging(cfg: &Config) {
    let default_level = if cfg.debug.enabled { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// `copy-last` / `copy <id>` against the session named by SECRETTY_SOCKET.
fn client_copy(id: Option<u64>) -> i32 {
    let Some(socket) = session_socket() else {
        return 1;
    };
    let result = match id {
        Some(id) => ipc::copy_by_id(&socket, id),
        None => ipc::copy_last(&socket),
    };
    match result {
        Ok(resp) => {
            let what = if resp.label.is_empty() {
                resp.secret_type.clone()
            } else {
                format!("{} ({})", resp.label, resp.secret_type)
            };
            println!("secretty: copied {what} to clipboard");
            0
        }
        Err(err) => {
            eprintln!("secretty: {err}");
            1
        }
    }
}

fn client_list() -> i32 {
    let Some(socket) = session_socket() else {
        return 1;
    };
    match ipc::list_secrets(&socket) {
        Ok(records) if records.is_empty() => {
            println!("secretty: no secrets cached");
            0
        }
        Ok(records) => {
            let mut stdout = io::stdout().lock();
            for rec in records {
                let label = if rec.label.is_empty() {
                    "-".to_string()
                } else {
                    rec.label
                };
                let _ = writeln!(stdout, "#{}\t{}\t{}", rec.id, rec.secret_type, label);
            }
            0
        }
        Err(err) => {
            eprintln!("secretty: {err}");
            1
        }
    }
}

fn session_socket() -> Option<PathBuf> {
    match env::var_os("SECRETTY_SOCKET") {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => {
            eprintln!("secretty: no active session (SECRETTY_SOCKET is not set)");
            None
        }
    }
}
