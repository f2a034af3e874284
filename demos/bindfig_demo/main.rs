//! # bindfig demo application
//!
//! A sample CLI tool that binds one config struct to defaults, a TOML file,
//! environment variables and flags. It exists to demonstrate and manually
//! verify bindfig's features.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example bindfig_demo -- echo
//! cargo run --example bindfig_demo -- keys env
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature            | How to exercise it                                                        |
//! |--------------------|---------------------------------------------------------------------------|
//! | Defaults           | `cargo run --example bindfig_demo -- echo`                                |
//! | Config file        | Create `bindfig-demo.toml` in cwd, then run `echo`                        |
//! | Config file flag   | `cargo run --example bindfig_demo -- echo --config other.toml`            |
//! | Env var override   | `BINDFIG_DEMO_DISPLAY_COLOR=red cargo run --example bindfig_demo -- echo` |
//! | Nested flag        | `cargo run --example bindfig_demo -- echo --server.port 9999`             |
//! | Exact flag key     | `cargo run --example bindfig_demo -- echo --color blue`                   |
//! | Durations          | `cargo run --example bindfig_demo -- echo --server.idle_timeout 2m30s`    |
//! | Env template       | `cargo run --example bindfig_demo -- env-template`                        |
//! | Key listing        | `cargo run --example bindfig_demo -- keys toml`                           |
//! | Flag help          | `cargo run --example bindfig_demo -- help`                                |

mod config;

use bindfig::{Bindfig, BindfigBuilder};

use config::DemoConfig;

fn make_builder(args: Vec<String>) -> BindfigBuilder {
    Bindfig::builder()
        .command_name("bindfig-demo")
        .env_prefix("BINDFIG_DEMO")
        .file("bindfig-demo.toml")
        .file_flag("config")
        .args(args)
}

fn ansi_color_code(name: &str) -> &str {
    match name {
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        "white" => "\x1b[37m",
        _ => "\x1b[0m",
    }
}

const RESET: &str = "\x1b[0m";

fn echo_all(config: &DemoConfig) {
    let color = ansi_color_code(&config.display.color);

    if config.verbose {
        println!(
            "{color}[verbose] Resolved configuration for {:?}{RESET}",
            config.name
        );
        println!();
    }

    let entries = [
        ("name", config.name.clone()),
        ("verbose", config.verbose.to_string()),
        ("labels", config.labels.join(",")),
        ("server.host", config.server.host.clone()),
        ("server.port", config.server.port.to_string()),
        (
            "server.max_connections",
            config.server.max_connections.to_string(),
        ),
        (
            "server.idle_timeout",
            format!("{:?}", config.server.idle_timeout),
        ),
        ("display.color", config.display.color.clone()),
        ("display.format", config.display.format.clone()),
    ];

    if config.display.format == "plain" {
        for (key, value) in &entries {
            println!("{key}={value}");
        }
    } else {
        let max_key_len = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &entries {
            println!("{color}{key:<max_key_len$}{RESET}  {value}");
        }
    }
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{context}:\n{err}");
    std::process::exit(1);
}

fn main() {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "echo".to_string());
    let rest: Vec<String> = args.collect();

    let mut config = DemoConfig::default();
    match command.as_str() {
        "echo" => {
            make_builder(rest)
                .load(&mut config)
                .unwrap_or_else(|e| fail("Failed to load config", e));
            echo_all(&config);
        }
        "env-template" => {
            let loader = make_builder(vec![])
                .build(&mut config)
                .unwrap_or_else(|e| fail("Failed to read config", e));
            print!("{}", loader.env_template());
        }
        "keys" => {
            let namespace = rest.first().map(String::as_str).unwrap_or("env");
            let loader = make_builder(vec![])
                .build(&mut config)
                .unwrap_or_else(|e| fail("Failed to read config", e));
            println!("{}", loader.keys(namespace));
        }
        "help" => {
            let loader = make_builder(vec![])
                .build(&mut config)
                .unwrap_or_else(|e| fail("Failed to read config", e));
            println!("{}", loader.command().clone().render_help());
        }
        other => fail("Unknown command", other),
    }
}
