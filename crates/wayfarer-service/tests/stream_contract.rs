//! Streaming-contract tests: ordering, single terminal frame, isolation.

use std::sync::Arc;
use wayfarer_agent::test_support::ScriptedProvider;
use wayfarer_agent::LoopConfig;
use wayfarer_config::{ModelEntry, ProviderKind};
use wayfarer_providers::ModelManager;
use wayfarer_service::{AgentService, ChunkType, MessageRequest, StreamChunk};

fn entry() -> ModelEntry {
    ModelEntry {
        model_id: "mock".into(),
        name: "Mock".into(),
        provider: ProviderKind::Openai,
        model: "mock-model".into(),
        api_base: None,
        api_key: "sk-test".into(),
        api_version: None,
        temperature: 0.7,
        max_tokens: 512,
        timeout: 5,
        max_retries: 0,
    }
}

fn service(responses: Vec<String>) -> AgentService {
    let models = Arc::new(ModelManager::with_provider(
        entry(),
        Arc::new(ScriptedProvider::new(responses)),
    ));
    AgentService::new(
        models,
        Arc::new(wayfarer_tools::default_registry()),
        LoopConfig::default(),
    )
}

fn request(input: &str, mode: &str) -> MessageRequest {
    MessageRequest {
        session_id: "test-session".into(),
        user_input: input.into(),
        model_id: "mock".into(),
        mode: mode.into(),
        stream: true,
    }
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<StreamChunk>) -> Vec<StreamChunk> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

fn positions(frames: &[StreamChunk], kind: ChunkType) -> Vec<usize> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, f)| f.chunk_type == kind)
        .map(|(i, _)| i)
        .collect()
}

#[tokio::test]
async fn direct_mode_stream_shape() {
    let service = service(vec!["你好！很高兴见到你。".into()]);
    let frames = drain(service.stream_message(request("你好", "direct"))).await;

    // answer_start, ≥1 answer, exactly one done.
    assert_eq!(frames[0].chunk_type, ChunkType::AnswerStart);
    assert!(positions(&frames, ChunkType::Answer).len() >= 1);
    let done = positions(&frames, ChunkType::Done);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0], frames.len() - 1);

    // Only the final frame is marked last.
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.is_last, i == frames.len() - 1);
    }

    // The answer reassembles.
    let answer: String = frames
        .iter()
        .filter(|f| f.chunk_type == ChunkType::Answer)
        .map(|f| f.content.as_str())
        .collect();
    assert_eq!(answer, "你好！很高兴见到你。");

    // No reasoning frames in direct mode.
    assert!(positions(&frames, ChunkType::ThinkingStart).is_empty());
}

#[tokio::test]
async fn react_mode_ordering_invariants() {
    let service = service(vec![
        "not json".into(),       // analysis → rule-based fallback
        "为您推荐成都。".into(), // synthesis
    ]);
    let frames = drain(service.stream_message(request("推荐适合美食游的城市", "react"))).await;

    let t_start = positions(&frames, ChunkType::ThinkingStart);
    let t_end = positions(&frames, ChunkType::ThinkingEnd);
    let a_start = positions(&frames, ChunkType::AnswerStart);
    let done = positions(&frames, ChunkType::Done);

    assert_eq!(t_start.len(), 1);
    assert_eq!(t_end.len(), 1);
    assert_eq!(a_start.len(), 1);
    assert_eq!(done.len(), 1);

    // thinking block, then answer block, then done — in that order.
    assert!(t_start[0] < t_end[0]);
    assert!(t_end[0] < a_start[0]);
    assert!(a_start[0] < done[0]);
    assert_eq!(done[0], frames.len() - 1);

    // All thinking chunks sit inside the thinking block.
    for i in positions(&frames, ChunkType::ThinkingChunk) {
        assert!(t_start[0] < i && i < t_end[0]);
    }

    // Done carries stats.
    let stats: serde_json::Value = serde_json::from_str(&frames[done[0]].content).unwrap();
    assert!(stats["steps_completed"].as_u64().unwrap() >= 1);
    assert!(stats["tools_used"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "search_cities"));
}

#[tokio::test]
async fn validation_failure_emits_error_then_done() {
    let service = service(vec!["unused".into()]);
    let frames = drain(service.stream_message(request("", "react"))).await;

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].chunk_type, ChunkType::Error);
    assert_eq!(frames[1].chunk_type, ChunkType::Done);
    assert!(frames[1].is_last);
}

#[tokio::test]
async fn concurrent_streams_do_not_cross_contaminate() {
    // Two services with distinct scripted answers, driven concurrently.
    let service_a = service(vec!["not json".into(), "回答A".into()]);
    let service_b = service(vec!["not json".into(), "回答B".into()]);

    let (frames_a, frames_b) = tokio::join!(
        drain(service_a.stream_message(request("推荐适合美食游的城市", "react"))),
        drain(service_b.stream_message(request("帮我规划北京3日游", "react"))),
    );

    for frames in [&frames_a, &frames_b] {
        let done = positions(frames, ChunkType::Done);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0], frames.len() - 1);
    }

    let answer_a: String = frames_a
        .iter()
        .filter(|f| f.chunk_type == ChunkType::Answer)
        .map(|f| f.content.as_str())
        .collect();
    let answer_b: String = frames_b
        .iter()
        .filter(|f| f.chunk_type == ChunkType::Answer)
        .map(|f| f.content.as_str())
        .collect();
    assert_eq!(answer_a, "回答A");
    assert_eq!(answer_b, "回答B");
}

#[tokio::test]
async fn dropping_receiver_cancels_the_turn() {
    let service = service(vec!["not json".into(), "回答".into()]);
    let mut rx = service.stream_message(request("推荐适合美食游的城市", "react"));

    // Read one frame, then walk away.
    let first = rx.recv().await.unwrap();
    assert_eq!(first.chunk_type, ChunkType::ThinkingStart);
    drop(rx);

    // Nothing to assert beyond "no hang": give the producer a moment to
    // observe the closed channel and wind down.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
