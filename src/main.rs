use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use mailslot::cli::Cli;
use mailslot::config::{FileConfig, MailboxTarget, Role, Settings};
use mailslot::mailbox::{LocalMailbox, Mailbox};
use mailslot::pull::PullCoordinator;
use mailslot::push::PushCoordinator;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, file)?;

    let mailbox = open_mailbox(&settings.mailbox).await?;
    mailbox
        .prepare()
        .await
        .with_context(|| format!("mailbox {} is not usable", mailbox.location()))?;
    tracing::info!("Opened mailbox {}", mailbox.location());

    match settings.role {
        Role::Pull => {
            tokio::fs::create_dir_all(&settings.pull.local_dir)
                .await
                .with_context(|| {
                    format!(
                        "failed to create local dir {}",
                        settings.pull.local_dir.display()
                    )
                })?;
            let mut pull = PullCoordinator::new(mailbox, settings.pull);
            pull.run().await.context("pull stopped")?;
        }
        Role::Push => {
            let mut push = PushCoordinator::new(mailbox, settings.push);
            push.deliver(&settings.files).await.context("push stopped")?;
        }
    }

    Ok(())
}

async fn open_mailbox(target: &MailboxTarget) -> Result<Box<dyn Mailbox>> {
    match target {
        MailboxTarget::Local(dir) => Ok(Box::new(LocalMailbox::new(dir))),
        #[cfg(feature = "ssh")]
        MailboxTarget::Sftp(target) => {
            let mailbox = mailslot::mailbox::SftpMailbox::connect(target.clone()).await?;
            tracing::info!("Connected to {}", target.server());
            Ok(Box::new(mailbox))
        }
    }
}
