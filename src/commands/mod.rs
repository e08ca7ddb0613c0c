mod config;
mod proxy;

use std::io::Write;
use rustyline_async::{Readline, SharedWriter, ReadlineEvent};
use tokio::task::JoinHandle;
use crate::ServerContext;

type ArgSlice<'a> = &'a [&'a str];

macro_rules! commands {
    ($($category:ident::$action:ident $usage:tt $desc:tt;)*) => {
        async fn exec(state: &ServerContext, cmd: &str) -> String {
            let input = cmd.split_whitespace().collect::<Vec<&str>>();

            if input.len() == 1 && input[0] == "help" {
                return Self::help_message();
            }

            let (Some(category), Some(action)) = (input.get(0), input.get(1)) else {
                return String::from("Unrecognized command, enter `help` to view supported commands");
            };

            let args = &input[2..];
            match match (*category, *action) {
                $(
                    (stringify!($category), stringify!($action)) => {
                        $category::$action(args, state).await
                    }
                )*,
                _ => {
                    return String::from("Unrecognized command, enter `help` to view supported commands");
                }
            } {
                Ok(s) => s,
                Err(err) => format!("failed to execute command: {err}"),
            }
        }

        fn help_message() -> String {
            concat!("available commands:\n",
                $(stringify!($category), " ", stringify!($action), " ", $usage, " - ", $desc, "\n",)*
                "help - shows this message"
            ).to_string()
        }
    };
}

/// Read-only console on stdin. The configuration never changes after
/// startup, so every command only reports on it.
pub struct CommandManager {
    context: ServerContext,
}

impl CommandManager {
    pub fn new(context: ServerContext) -> Self {
        Self { context }
    }

    /// Runs until Ctrl+C or EOF. The returned handle finishing is the
    /// server's cue to shut down.
    pub fn run(self, mut rl: Readline, mut out: SharedWriter) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rl.readline().await {
                    Ok(ReadlineEvent::Line(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let str = Self::exec(&self.context, &line).await;
                        if let Err(err) = writeln!(&mut out, "{str}") {
                            tracing::warn!("Failed to write command output: {err}");
                        }
                        rl.add_history_entry(line);
                    }
                    Ok(ReadlineEvent::Eof) | Ok(ReadlineEvent::Interrupted) => {
                        tracing::info!("Received Ctrl+C, shutting down...");
                        break;
                    }
                    Err(err) => {
                        tracing::error!("Console error: {err}");
                        break;
                    }
                }
            }
            if let Err(err) = rl.flush() {
                tracing::warn!("Failed to flush console: {err}");
            }
        })
    }

    commands! {
        config::show "" "Show the loaded configuration";
        config::path "" "Show the build output directory";
        proxy::list "" "List proxy rules in evaluation order";
        proxy::test "[path]" "Show where a request path would be sent";
    }
}
