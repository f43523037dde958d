//! Send one email through the configured provider
//!
//! Run with: cargo run -p newsletter_api --bin send_test_email -- --to you@example.com

use clap::Parser;
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use email::{EmailServiceFactory, SendEmailParams};
use eyre::{Result, WrapErr};

#[derive(Parser)]
#[command(name = "send_test_email")]
#[command(about = "Send a test email through the provider selected by EMAIL_PROVIDER")]
struct Cli {
    /// Recipient address
    #[arg(short, long)]
    to: String,

    #[arg(short, long, default_value = "Test email")]
    subject: String,

    /// Sender override (defaults to FROM_EMAIL)
    #[arg(short, long)]
    from: Option<String>,

    /// Tags passed to the provider
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();
    init_tracing(&Environment::from_env());

    let cli = Cli::parse();

    let provider = EmailServiceFactory::from_process_env()
        .get()
        .wrap_err("Email provider is not configured")?;

    println!("Sending test email via {} to {}", provider.name(), cli.to);

    let mut params = SendEmailParams::new(
        cli.to,
        cli.subject,
        "<h1>Hello!</h1><p>This is a test email from the newsletter API.</p>",
    )
    .with_text("Hello! This is a test email from the newsletter API.")
    .with_tags(cli.tags);

    if let Some(from) = cli.from {
        params = params.with_from(from);
    }

    let result = provider
        .send_email(&params)
        .await
        .wrap_err("Failed to send test email")?;

    println!("Email sent successfully!");
    if let Some(message_id) = result.message_id {
        println!("Message ID: {}", message_id);
    }

    Ok(())
}
