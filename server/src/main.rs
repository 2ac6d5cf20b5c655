use std::process::ExitCode;

use log::{error, info};
use model::compiler::serialize;

use server::{Result, ServerConfig, artifact::compile_artifact};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let builder = config.model_builder()?;

    let artifact = compile_artifact(&builder, config.seed)?;
    let bytes = serialize(&artifact)?;
    info!(
        "artifact v{} ready: {} layers, {} bytes",
        artifact.version(),
        artifact.ops().len(),
        bytes.len()
    );

    server::serve(
        &config.host,
        config.port,
        bytes.into(),
        config.mode,
        config.write_timeout,
    )
    .await?;

    info!("wrapping up, bye");
    Ok(())
}
