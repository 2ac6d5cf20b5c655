use std::{env, io};

use comms::recv_artifact;
use log::info;
use model::{compiler::Artifact, ops::CpuOps};
use ndarray::{ArrayD, IxDyn};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "12345";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string()),
    );

    let mut stream = TcpStream::connect(&addr).await?;
    info!("connected to {addr}");

    let buf = recv_artifact(&mut stream).await?;
    info!("received {} bytes", buf.len());

    let artifact = Artifact::from_bytes(&buf).map_err(io::Error::other)?;
    info!(
        "artifact v{}: {} layers, {} -> {}",
        artifact.version(),
        artifact.ops().len(),
        artifact.input(),
        artifact.output()
    );

    for tensor in artifact.tensors() {
        info!("{}: {}", tensor.name(), tensor.shape());
    }

    let x = ArrayD::zeros(IxDyn(artifact.input().dims()));
    let y = artifact.forward(&CpuOps, x).map_err(io::Error::other)?;
    info!("forward pass on a zero input produced {:?}", y.shape());

    Ok(())
}
