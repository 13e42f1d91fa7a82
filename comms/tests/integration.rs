use std::io::ErrorKind;

use comms::{
    MAX_FRAME_LEN,
    msg::{Msg, status},
    specs::{TRAIN_PATH, TrainReply, TrainRequest},
};
use ndarray::{ArrayD, IxDyn};
use serde_json::json;
use tokio::io::{self, AsyncWriteExt};

#[tokio::test]
async fn send_recv() {
    const SIZE: usize = 128;

    let msg = Msg::request(TRAIN_PATH, json!({ "round": 1 }));

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let (two_rx, two_tx) = io::split(two);
    let (mut rx, _) = comms::channel(two_rx, two_tx);

    let sending = tokio::spawn(async move { tx.send(&msg).await });
    let received: Msg = rx.recv().await.unwrap();
    sending.await.unwrap().unwrap();

    assert_eq!(received, Msg::request(TRAIN_PATH, json!({ "round": 1 })));
}

#[tokio::test]
async fn consecutive_frames_keep_their_boundaries() {
    let (one, two) = io::duplex(4096);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (two_rx, two_tx) = io::split(two);
    let (mut rx, _) = comms::channel(two_rx, two_tx);

    tx.send(&Msg::response(status::OK, json!("first"))).await.unwrap();
    tx.send(&Msg::error(status::NOT_FOUND, "second")).await.unwrap();

    let first: Msg = rx.recv().await.unwrap();
    let second: Msg = rx.recv().await.unwrap();

    assert_eq!(first, Msg::response(status::OK, json!("first")));
    assert_eq!(
        second,
        Msg::response(status::NOT_FOUND, json!({ "error": "second" }))
    );
}

#[tokio::test]
async fn oversized_frame_header_is_rejected() {
    let (mut one, two) = io::duplex(64);
    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let header = ((MAX_FRAME_LEN + 1) as u64).to_be_bytes();
    one.write_all(&header).await.unwrap();

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[tokio::test]
async fn closed_peer_reports_eof() {
    let (one, two) = io::duplex(64);
    drop(one);

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

#[test]
fn train_payloads_carry_tensors() {
    let weights = vec![
        ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.5_f32, -1.0]).unwrap(),
        ArrayD::from_elem(IxDyn(&[1]), 0.25_f32),
    ];
    let request = TrainRequest {
        round: 3,
        epochs: 2,
        batch_size: 16,
        weights: weights.clone(),
    };

    let value = serde_json::to_value(&request).unwrap();
    let decoded: TrainRequest = serde_json::from_value(value).unwrap();
    assert_eq!(decoded.weights, weights);

    let reply = json!({
        "metrics": { "accuracy": 1.0, "precision": 1.0, "recall": 1.0, "f1_score": 1.0 },
        "weights": serde_json::to_value(&weights).unwrap(),
    });
    let reply: TrainReply = serde_json::from_value(reply).unwrap();
    assert_eq!(reply.metrics.accuracy, 1.0);
    assert_eq!(reply.metrics.f1_score, 1.0);
    assert!(reply.metrics.loss.is_nan());
    assert!(reply.client_id.is_empty());
}
