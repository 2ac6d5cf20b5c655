use std::borrow::Cow;

use comms::{ArtifactFrame, Deserialize, FORMAT_VERSION, LayerRecord, Serialize, TensorRecord};
use tokio::io::{self, AsyncWriteExt};

fn small_frame() -> ArtifactFrame<'static> {
    ArtifactFrame {
        version: FORMAT_VERSION,
        layers: vec![LayerRecord {
            name: "linear0".into(),
            kind: 3,
            act_fn: 0,
            attrs: vec![4, 2],
            input: vec![4],
            output: vec![2],
            params: vec![0, 1],
        }],
        tensors: vec![
            TensorRecord {
                name: "linear0.weight".into(),
                shape: vec![2, 4],
                data: Cow::Owned((0..8).map(|i| i as f32 * 0.25).collect()),
            },
            TensorRecord {
                name: "linear0.bias".into(),
                shape: vec![2],
                data: Cow::Owned(vec![-1.0, 1.0]),
            },
        ],
    }
}

#[tokio::test]
async fn send_recv() {
    const SIZE: usize = 16;

    let mut bytes = Vec::new();
    small_frame().serialize(&mut bytes).unwrap();

    let (mut client, mut server) = io::duplex(SIZE);

    let payload = bytes.clone();
    let sender = tokio::spawn(async move {
        server.write_all(&payload).await.unwrap();
        server.shutdown().await.unwrap();
    });

    let received = comms::recv_artifact(&mut client).await.unwrap();
    sender.await.unwrap();

    assert_eq!(received, bytes);
    let frame = ArtifactFrame::deserialize(&received).unwrap();
    assert_eq!(frame, small_frame());
}

#[tokio::test]
async fn recv_detects_cut_transfer() {
    let mut bytes = Vec::new();
    small_frame().serialize(&mut bytes).unwrap();

    let (mut client, mut server) = io::duplex(bytes.len());
    server.write_all(&bytes[..bytes.len() / 2]).await.unwrap();
    drop(server);

    let err = comms::recv_artifact(&mut client).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}
