use anyhow::{bail, Result};
use clap::Parser;
use qrcraft::{model::GenerationRequest, submitter::Submitter};

const DEFAULT_PROMPT: &str = "A cinematic shot of a an abandoned spaceship in a dark forest, 4k";

/// Ask a running qrcraft server for an AI-styled QR code.
#[derive(Parser, Debug)]
#[command(name = "qrcraft-submit", version)]
struct Args {
    /// Base URL of the qrcraft server.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    endpoint: String,

    /// URL the QR code should encode.
    #[arg(long)]
    url: String,

    /// Description of the image to blend into the code.
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let submitter = Submitter::new(args.endpoint);
    println!("Generating... this can take up to 30 seconds.");

    match submitter
        .submit(&GenerationRequest::new(args.url, args.prompt))
        .await
    {
        Ok(image_url) => {
            println!("Your QR code is ready: {image_url}");
            Ok(())
        }
        Err(err) => bail!("Error: {err}"),
    }
}
