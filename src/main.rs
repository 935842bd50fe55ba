use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use groupbot::bots::auth;
use groupbot::db::{self, BotRepo, PatternRepo, PostRepo, SessionStateRepo};
use groupbot::{
    Bot, BotEngine, Config, IncomingPost, Pattern, ReqwestBatchClient, SessionStateStore,
};

/// Groupbot - chat-bot response engine for discussion groups
#[derive(Parser)]
#[command(name = "groupbot", version, about)]
struct Cli {
    /// Database path (overrides config)
    #[arg(long, env = "GROUPBOT_DB")]
    db: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot engine for one post and print the replies
    Post {
        /// Group the post belongs to
        #[arg(short, long)]
        group: String,
        /// Thread replies attach to
        #[arg(short, long)]
        thread: String,
        /// Session of the posting user
        #[arg(short, long, default_value = "cli")]
        session: String,
        /// Posting user's name
        #[arg(short, long, default_value = "cli")]
        user: String,
        /// Thread title
        #[arg(long, default_value = "")]
        title: String,
        /// Post text
        text: String,
    },
    /// Manage group bots
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },
    /// Manage bot pattern tables
    Pattern {
        #[command(subcommand)]
        command: PatternCommand,
    },
    /// Show a session's conversation state
    State {
        /// Session ID
        session: String,
        /// Forget the session's state instead of showing it
        #[arg(long)]
        clear: bool,
    },
    /// Print a callback auth tag for a message
    Sign {
        /// Bot token
        #[arg(long, env = "GROUPBOT_BOT_TOKEN")]
        token: String,
        /// Message segment being signed
        message: String,
    },
    /// Check a callback auth tag against the configured age window
    Verify {
        /// Bot token
        #[arg(long, env = "GROUPBOT_BOT_TOKEN")]
        token: String,
        /// Tag received in the `bot_token` field
        #[arg(long)]
        tag: String,
        /// Message segment received in the `post` field
        message: String,
    },
}

#[derive(Subcommand)]
enum BotCommand {
    /// Add a bot to a group (replaces an existing membership)
    Add {
        /// Group ID
        #[arg(short, long)]
        group: String,
        /// Bot user ID
        #[arg(long)]
        id: String,
        /// Bot name used in mentions
        #[arg(short, long)]
        name: String,
        /// Shared secret for callback auth
        #[arg(long)]
        token: String,
        /// Callback URL for forwarding patterns
        #[arg(long)]
        callback: Option<String>,
    },
    /// Show a bot's membership details
    Show {
        /// Bot user ID
        id: String,
    },
    /// Remove a bot from a group
    Remove {
        /// Group ID
        #[arg(short, long)]
        group: String,
        /// Bot user ID
        id: String,
    },
}

#[derive(Subcommand)]
enum PatternCommand {
    /// Append a pattern to a bot's table
    Add {
        /// Bot user ID
        #[arg(short, long)]
        bot: String,
        /// Request template, e.g. "echo $msg"
        #[arg(long)]
        request: String,
        /// Response template
        #[arg(long, default_value = "")]
        response: String,
        /// Required state (empty matches any)
        #[arg(long, default_value = "")]
        trigger_state: String,
        /// Next state
        #[arg(long, default_value = "")]
        result_state: String,
        /// Callback payload template
        #[arg(long, default_value = "")]
        remote_message: String,
    },
    /// List a bot's table in match order
    List {
        /// Bot user ID
        #[arg(short, long)]
        bot: String,
    },
    /// Delete a pattern row by ID
    Delete {
        /// Pattern ID, as shown by `pattern list`
        id: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,groupbot=info",
        1 => "info,groupbot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Sign { token, message } = &cli.command {
        println!("{}", auth::sign(token, chrono::Utc::now().timestamp(), message));
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(path) = cli.db {
        config.database_path = path;
    }

    if let Command::Verify {
        token,
        tag,
        message,
    } = &cli.command
    {
        let now = chrono::Utc::now().timestamp();
        auth::verify(token, message, tag, now, config.engine.token_max_age)?;
        println!("valid");
        return Ok(());
    }

    let pool = db::init(&config.database_path)?;

    match cli.command {
        Command::Post {
            group,
            thread,
            session,
            user,
            title,
            text,
        } => {
            let http = ReqwestBatchClient::new(
                config.engine.callback_timeout,
                &config.engine.user_agent,
            )?;
            let engine = BotEngine::new(
                Arc::new(BotRepo::new(pool.clone())),
                Arc::new(PatternRepo::new(pool.clone())),
                Arc::new(PostRepo::new(pool.clone())),
                Arc::new(http),
                config.engine.clone(),
            );
            let sessions = SessionStateRepo::new(pool);

            let post = IncomingPost {
                text,
                group_id: group,
                thread_id: thread,
                session_id: session,
                title,
                user_name: user,
            };

            let replies = engine.handle_post(&post, &sessions).await?;
            if replies.is_empty() {
                println!("No bot replies");
            }
            for reply in replies {
                println!("[{}] {}", reply.bot_id, reply.body);
            }
        }
        Command::Bot { command } => match command {
            BotCommand::Add {
                group,
                id,
                name,
                token,
                callback,
            } => {
                let bot = Bot {
                    user_id: id,
                    user_name: name,
                    bot_token: token,
                    callback_url: callback,
                };
                BotRepo::new(pool).add(&group, &bot)?;
                println!("Added bot @{} ({}) to group {group}", bot.user_name, bot.user_id);
            }
            BotCommand::Show { id } => match BotRepo::new(pool).find(&id)? {
                Some(bot) => {
                    println!("{} @{}", bot.user_id, bot.user_name);
                    println!("callback: {}", bot.callback().unwrap_or("(local only)"));
                }
                None => println!("No bot {id}"),
            },
            BotCommand::Remove { group, id } => {
                if BotRepo::new(pool).remove(&group, &id)? {
                    println!("Removed bot {id} from group {group}");
                } else {
                    println!("Bot {id} is not in group {group}");
                }
            }
        },
        Command::Pattern { command } => match command {
            PatternCommand::Add {
                bot,
                request,
                response,
                trigger_state,
                result_state,
                remote_message,
            } => {
                let pattern = Pattern {
                    request,
                    trigger_state,
                    result_state,
                    response,
                    remote_message,
                };
                let id = PatternRepo::new(pool).add(&bot, &pattern)?;
                println!("Added pattern {id} to bot {bot}");
            }
            PatternCommand::List { bot } => {
                let rows = PatternRepo::new(pool).list(&bot)?;
                if rows.is_empty() {
                    println!("No patterns for bot {bot}");
                }
                for row in rows {
                    let p = row.pattern;
                    let trigger = if p.trigger_state.is_empty() {
                        "*"
                    } else {
                        p.trigger_state.as_str()
                    };
                    println!(
                        "{:>4}  {:?} [{trigger}] -> {:?} [{}]{}",
                        row.id,
                        p.request,
                        p.response,
                        p.result_state,
                        if p.remote_message.is_empty() {
                            String::new()
                        } else {
                            format!(" remote={:?}", p.remote_message)
                        },
                    );
                }
            }
            PatternCommand::Delete { id } => {
                PatternRepo::new(pool).delete(id)?;
                println!("Deleted pattern {id}");
            }
        },
        Command::State {
            session,
            clear: true,
        } => {
            SessionStateRepo::new(pool).clear(&session)?;
            println!("Cleared conversation state for session {session}");
        }
        Command::State {
            session,
            clear: false,
        } => {
            let state = SessionStateRepo::new(pool).conversation_state(&session)?;
            if state.is_empty() {
                println!("No conversation state for session {session}");
            }
            for (bot, value) in state.iter() {
                println!("{bot}: {value}");
            }
        }
        Command::Sign { .. } | Command::Verify { .. } => {}
    }

    Ok(())
}
