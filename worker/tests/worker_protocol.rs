use std::sync::Arc;

use comms::{
    FrameReceiver, FrameSender,
    msg::{Msg, status},
    specs::{
        HEALTH_PATH, HealthReply, MODEL_METRICS_PATH, ModelMetricsReply, TRAIN_PATH, TrainReply,
    },
};
use model::Dataset;
use ndarray::{ArrayD, IxDyn};
use serde_json::{Value, json};
use tokio::{
    io::{self, DuplexStream, ReadHalf, WriteHalf},
    task::JoinHandle,
};
use worker::Node;

type Rx = FrameReceiver<ReadHalf<DuplexStream>>;
type Tx = FrameSender<WriteHalf<DuplexStream>>;

fn dataset() -> Dataset {
    let data: Vec<f32> = (0..40)
        .flat_map(|i| {
            let x0 = (i as f32 - 19.5) / 10.0;
            let x1 = ((i * 7) % 5) as f32 / 5.0;
            let label = if x0 > 0.0 { 1.0 } else { 0.0 };
            [x0, x1, label]
        })
        .collect();

    Dataset::from_inline(data, 2).unwrap()
}

fn spawn_node() -> (Rx, Tx, JoinHandle<std::io::Result<()>>) {
    let split = dataset().split(0.25, 42).unwrap();
    let node = Arc::new(Node::new("client-7".into(), split, 0.5, 42).unwrap());

    let (ours, theirs) = io::duplex(1 << 16);
    let (rx, tx) = io::split(theirs);
    let (rx, tx) = comms::channel(rx, tx);
    let handle = tokio::spawn(node.serve(rx, tx));

    let (rx, tx) = io::split(ours);
    let (rx, tx) = comms::channel(rx, tx);
    (rx, tx, handle)
}

async fn call(rx: &mut Rx, tx: &mut Tx, path: &str, body: Value) -> (u16, Value) {
    tx.send(&Msg::request(path, body)).await.unwrap();

    match rx.recv().await.unwrap() {
        Msg::Response { status, body } => (status, body),
        msg => panic!("expected a response, got {msg:?}"),
    }
}

#[tokio::test]
async fn health_reports_the_node() {
    let (mut rx, mut tx, _) = spawn_node();

    let (status, body) = call(&mut rx, &mut tx, HEALTH_PATH, Value::Null).await;
    let reply: HealthReply = serde_json::from_value(body).unwrap();

    assert_eq!(status, status::OK);
    assert_eq!(reply.status, "online");
    assert_eq!(reply.client_id, "client-7");
    assert!(reply.data_loaded);
    assert!(!reply.model_trained);
}

#[tokio::test]
async fn train_from_fresh_then_from_global_weights() {
    let (mut rx, mut tx, _) = spawn_node();

    let request = json!({ "round": 1, "epochs": 50, "batch_size": 8, "weights": [] });
    let (status, body) = call(&mut rx, &mut tx, TRAIN_PATH, request).await;
    assert_eq!(status, status::OK);

    let reply: TrainReply = serde_json::from_value(body).unwrap();
    assert_eq!(reply.client_id, "client-7");
    assert_eq!(reply.round, 1);
    assert_eq!(reply.weights.len(), 2);
    assert_eq!(reply.weights[0].shape(), &[2]);
    assert_eq!(reply.weights[1].shape(), &[1]);
    assert!((0.0..=1.0).contains(&reply.metrics.accuracy));
    assert!(reply.metrics.loss.is_finite());

    let request = json!({ "round": 2, "epochs": 1, "batch_size": 4, "weights": reply.weights });
    let (status, body) = call(&mut rx, &mut tx, TRAIN_PATH, request).await;
    assert_eq!(status, status::OK);
    assert_eq!(body["round"], json!(2));

    let (_, body) = call(&mut rx, &mut tx, HEALTH_PATH, Value::Null).await;
    assert_eq!(body["model_trained"], json!(true));
}

#[tokio::test]
async fn model_metrics_follow_the_last_trained_round() {
    let (mut rx, mut tx, _) = spawn_node();

    let (status, body) = call(&mut rx, &mut tx, MODEL_METRICS_PATH, Value::Null).await;
    assert_eq!(status, status::OK);
    assert_eq!(body, json!({ "client_id": "client-7", "metrics": null }));

    let mut trained = None;
    for round in 1..=2 {
        let request = json!({ "round": round, "epochs": 5, "batch_size": 8 });
        let (_, body) = call(&mut rx, &mut tx, TRAIN_PATH, request).await;
        trained = Some(serde_json::from_value::<TrainReply>(body).unwrap().metrics);
    }

    let (status, body) = call(&mut rx, &mut tx, MODEL_METRICS_PATH, Value::Null).await;
    let reply: ModelMetricsReply = serde_json::from_value(body).unwrap();

    assert_eq!(status, status::OK);
    assert_eq!(reply.client_id, "client-7");
    assert_eq!(reply.metrics, trained);
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (mut rx, mut tx, _) = spawn_node();

    let missing_round = json!({ "epochs": 1, "batch_size": 4 });
    let (status, body) = call(&mut rx, &mut tx, TRAIN_PATH, missing_round).await;
    assert_eq!(status, status::BAD_REQUEST);
    assert!(body["error"].is_string());

    let zero_batch = json!({ "round": 1, "epochs": 1, "batch_size": 0 });
    let (status, _) = call(&mut rx, &mut tx, TRAIN_PATH, zero_batch).await;
    assert_eq!(status, status::BAD_REQUEST);

    let wrong_shape = json!({
        "round": 1,
        "epochs": 1,
        "batch_size": 4,
        "weights": vec![ArrayD::<f32>::zeros(IxDyn(&[5])), ArrayD::<f32>::zeros(IxDyn(&[1]))],
    });
    let (status, _) = call(&mut rx, &mut tx, TRAIN_PATH, wrong_shape).await;
    assert_eq!(status, status::BAD_REQUEST);

    let (_, body) = call(&mut rx, &mut tx, HEALTH_PATH, Value::Null).await;
    assert_eq!(body["model_trained"], json!(false));
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (mut rx, mut tx, _) = spawn_node();

    let (status, body) = call(&mut rx, &mut tx, "/api/predict", Value::Null).await;
    assert_eq!(status, status::NOT_FOUND);
    assert_eq!(body, json!({ "error": "no endpoint at /api/predict" }));
}

#[tokio::test]
async fn serve_ends_when_the_peer_closes() {
    let (rx, mut tx, handle) = spawn_node();

    tx.shutdown().await.unwrap();
    drop(rx);

    handle.await.unwrap().unwrap();
}

#[test]
fn node_needs_both_sides_of_the_split() {
    let split = dataset().split(0.0, 42).unwrap();
    assert!(Node::new("c".into(), split, 0.1, 42).is_err());
}
