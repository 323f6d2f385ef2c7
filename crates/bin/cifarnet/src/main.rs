use clap::Parser;
use log::error;

use cifarnet_core::error::Result;

use crate::session::builder::SessionBuilder;

mod session;

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
struct CliArgs {
    #[arg(short = 'c', long, value_name = "CONFIG_FILE")]
    config: String,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let start = std::time::Instant::now();
    let session = SessionBuilder::new(&args.config)?.build()?;
    if let Err(e) = session.run() {
        error!("Training aborted: {}", e);
        return Err(e);
    }
    let elapsed = start.elapsed();
    println!("Finished in {} ms.", elapsed.as_millis());
    Ok(())
}
