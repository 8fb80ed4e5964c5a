use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct VerifyImageArgs {
    /// Image to check; defaults to the configured golden image
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Expected SHA-1; defaults to the configured Sha1Sum
    #[arg(long, value_name = "HEX")]
    pub sha1: Option<String>,
}

pub async fn execute(
    args: VerifyImageArgs,
    global: &crate::cli::GlobalFlags,
) -> anyhow::Result<()> {
    let (image, expected) = match (args.image, args.sha1) {
        (Some(image), Some(sha1)) => (image, sha1),
        (image, sha1) => {
            let config = global.load_config()?;
            let expected = sha1
                .or(config.sha1_sum)
                .context("No expected SHA-1: pass --sha1 or set Sha1Sum in the configuration")?;
            (image.unwrap_or(config.golden_image), expected)
        }
    };

    let path = image.clone();
    super::blocking(move || runvm::disk::verify_golden_image(&path, &expected)).await?;
    println!("OK {}", image.display());
    Ok(())
}
