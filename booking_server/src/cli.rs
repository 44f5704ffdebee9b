use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument at all prints the readme and the current
/// environment configuration, then exits.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "TBS_HOST",
        "TBS_PORT",
        "TBS_SHUTDOWN_TIMEOUT",
        "TBS_DATABASE_URL",
        "TBS_HOLD_SECONDS",
        "TBS_SWEEP_INTERVAL_SECONDS",
        "TBS_AUTO_REFUNDS",
        "TBS_CATALOG_URL",
        "TBS_USE_X_FORWARDED_FOR",
        "TBS_USE_FORWARDED",
        "TBS_DISABLE_WEBHOOK_SIGNATURE",
        "TBS_QPAY_API_URL",
        "TBS_QPAY_CLIENT_ID",
    ];
    println!("Current environment settings:");
    for env_name in DISPLAY_ENVS {
        match env::var(env_name) {
            Ok(val) => println!("{env_name:<35} {val:<15}"),
            Err(VarError::NotPresent) => println!("{env_name:<35} Not set"),
            Err(VarError::NotUnicode(_)) => println!("{env_name:<35} Invalid unicode"),
        }
    }
}
