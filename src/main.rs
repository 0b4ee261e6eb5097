mod app;
mod config;
mod engine;
mod ipc;
mod window;

use objc2::MainThreadMarker;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    std::path::PathBuf::from(runtime_dir).join("notchling.sock")
}

/// SIGINT/SIGTERM: ask the main loop to exit so teardown (OSD restore,
/// socket removal) runs normally.
fn install_signal_handler() {
    if let Err(e) = ctrlc::set_handler(app::request_shutdown) {
        log::warn!("Failed to install signal handler: {}", e);
    }
}

fn print_help() {
    println!(
        "notchling {}
A macOS overlay that turns the display notch into an interactive control surface

USAGE:
    notchling [OPTIONS]

OPTIONS:
    -h, --help       Print this help message
    -v, --version    Print version information

ENVIRONMENT:
    RUST_LOG         Set log level (error, warn, info, debug, trace)

CONFIG:
    ~/.config/notchling/config.toml

EXAMPLES:
    notchling                    Run with default config
    RUST_LOG=debug notchling     Run with debug logging
    echo toggle | nc -U \"$XDG_RUNTIME_DIR/notchling.sock\"

For more information, see: https://github.com/dungle-scrubs/notchling",
        VERSION
    );
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if !args.is_empty() {
        // Only the first argument is processed (flags don't combine)
        match args[0].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                println!("notchling {}", VERSION);
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[0]);
                eprintln!("Try 'notchling --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    // Initialize logging (flush each line for interactive debugging).
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {:>5} {}] {}",
                chrono::Utc::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )?;
            buf.flush()
        })
        .init();

    log::info!("Starting Notchling v{}", VERSION);

    let socket = socket_path();
    if let Err(err) = ipc::start_ipc_listener(&socket) {
        log::warn!("Failed to start IPC listener: {}", err);
    }
    install_signal_handler();

    let mtm = MainThreadMarker::new().expect("main() must run on the main thread");
    let app = app::App::new(mtm);
    app.run(mtm);

    let _ = std::fs::remove_file(&socket);
}
