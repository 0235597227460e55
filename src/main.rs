use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use hostfacts::commands;
use hostfacts::commands::completions::SHELLS;

fn build_cli() -> Command {
    Command::new("hostfacts")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Collect user, uptime, inventory and monitor facts from Windows hosts")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .global(true)
                .help("Show debug logging")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("collect")
                .about("Probe hosts and collect facts from each reachable one")
                .arg(
                    Arg::new("hosts")
                        .help("Host names or addresses")
                        .value_name("HOSTS")
                        .num_args(0..)
                        .index(1),
                )
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("PATH")
                        .help("Read hosts from a file (one per line, # comments)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("providers")
                        .short('p')
                        .long("providers")
                        .value_name("LIST")
                        .help("Comma-separated providers to run (default: from config)"),
                )
                .arg(
                    Arg::new("console-sessions")
                        .long("console-sessions")
                        .help("Also list console session users")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .value_parser(["table", "csv", "json"])
                        .help("Output format (default: table, or from the --output extension)"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .help("Write results to a file instead of the console"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Hosts collected in parallel"),
                )
                .arg(
                    Arg::new("probe")
                        .long("probe")
                        .value_name("KIND")
                        .value_parser(["ping", "tcp"])
                        .help("Reachability probe"),
                ),
        )
        .subcommand(Command::new("providers").about("List fact providers"))
        .subcommand(
            Command::new("public-ip").about("Look up this machine's public IP address"),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change configuration")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the current configuration"))
                .subcommand(
                    Command::new("set")
                        .about("Set a configuration key")
                        .arg(Arg::new("key").required(true).index(1))
                        .arg(Arg::new("value").required(true).index(2)),
                )
                .subcommand(Command::new("reset").about("Restore default configuration"))
                .subcommand(Command::new("path").about("Print the configuration file path")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(SHELLS.to_vec())
                        .index(1),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}

fn main() -> Result<()> {
    let mut cli = build_cli();
    let matches = cli.clone().get_matches();

    hostfacts::init_logging(matches.get_flag("verbose"));

    if matches.get_flag("version") {
        return commands::version::execute();
    }

    match matches.subcommand() {
        Some(("collect", sub_matches)) => commands::collect::execute(sub_matches),
        Some(("providers", _)) => commands::providers::execute(),
        Some(("public-ip", _)) => commands::public_ip::execute(),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("completions", sub_matches)) => commands::completions::execute(sub_matches, &mut cli),
        Some(("version", _)) => commands::version::execute(),
        _ => {
            println!("hostfacts {}", env!("CARGO_PKG_VERSION"));
            println!("Use 'hostfacts --help' for more information.");
            Ok(())
        }
    }
}
