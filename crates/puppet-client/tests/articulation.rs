//! 嘴部驱动集成测试（Mock 串口）

use puppet_client::mouth::mouth_test;
use puppet_client::{ArticulationEngine, ArticulationError, ArticulationSession, AudioChunk};
use puppet_driver::{MotorBus, MotorBusBuilder, Servo, ServoTable};
use puppet_protocol::{ProtocolVariant, ServoId, ServoModel};
use puppet_serial::{MockBusHandle, MockSerialAdapter};
use puppet_tools::MouthConfig;
use std::sync::Arc;
use std::time::Duration;

const JAW: u8 = 6;
const CLOSED: u16 = 1200;
const OPEN: u16 = 2000;

fn mock_bus() -> (Arc<MotorBus>, MockBusHandle) {
    let adapter = MockSerialAdapter::new(ProtocolVariant::Feetech);
    let handle = adapter.handle();
    handle.set_position(JAW, CLOSED);
    let bus = MotorBusBuilder::new()
        .servo(Servo::new(
            ServoId::new(JAW).unwrap(),
            "servo6",
            ServoModel::Sts3215,
        ))
        .build_with_adapter(adapter);
    (Arc::new(bus), handle)
}

/// 默认参数，更新周期缩短以加快测试
fn engine() -> ArticulationEngine {
    ArticulationEngine::new(MouthConfig {
        update_delay_ms: 1,
        ..MouthConfig::default()
    })
    .unwrap()
}

/// 两个窗口：第一个响亮（元音），第二个中等
fn speech_chunk(index: u64) -> AudioChunk {
    let mut samples = vec![20_000i16; 882];
    samples.extend(std::iter::repeat_n(-4_000i16, 882));
    AudioChunk::new(samples, Duration::from_millis(40 * index))
}

#[test]
fn test_windows_applied_in_order_then_closed() {
    let (bus, handle) = mock_bus();
    let session = ArticulationSession::start(bus, engine()).unwrap();
    session.feed(speech_chunk(0)).unwrap();
    let snapshot = session.finish().unwrap();

    // 窗口 2 振幅 0.2 → 开合度 0.4 → 1200 + 800 * 0.4 ≈ 1520
    let writes = handle.written_positions(JAW);
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[0], OPEN);
    assert!((1519..=1520).contains(&writes[1]));
    // 块结束收尾 + 会话收尾
    assert_eq!(writes[2], CLOSED);
    assert_eq!(writes[3], CLOSED);

    assert_eq!(snapshot.chunks_processed, 1);
    assert_eq!(snapshot.windows_processed, 2);
    assert_eq!(snapshot.position, CLOSED);
    assert_eq!(snapshot.openness, 0.0);
}

#[test]
fn test_chunks_processed_in_arrival_order() {
    let (bus, handle) = mock_bus();
    let session = ArticulationSession::start(bus, engine()).unwrap();

    let silence = AudioChunk::new(vec![0; 1764], Duration::ZERO);
    session.feed(silence).unwrap();
    session.feed(speech_chunk(1)).unwrap();
    session.finish().unwrap();

    let writes = handle.written_positions(JAW);
    // 静音块: 闭、闭、收尾闭；语音块: 开、中、收尾闭；会话收尾
    assert_eq!(writes.len(), 7);
    assert_eq!(&writes[..3], &[CLOSED, CLOSED, CLOSED]);
    assert_eq!(writes[3], OPEN);
    assert_eq!(*writes.last().unwrap(), CLOSED);
}

#[test]
fn test_finalizer_after_cancel() {
    let (bus, handle) = mock_bus();
    let session = ArticulationSession::start(bus, engine()).unwrap();
    for i in 0..50 {
        session.feed(speech_chunk(i)).unwrap();
    }
    let snapshot = session.cancel().unwrap();

    assert!(snapshot.chunks_processed < 50);
    assert_eq!(handle.written_positions(JAW).last(), Some(&CLOSED));
    assert_eq!(handle.position(JAW), Some(CLOSED));
}

#[test]
fn test_finalizer_on_drop() {
    let (bus, handle) = mock_bus();
    {
        let session = ArticulationSession::start(bus, engine()).unwrap();
        for i in 0..10 {
            session.feed(speech_chunk(i)).unwrap();
        }
    }
    assert_eq!(handle.written_positions(JAW).last(), Some(&CLOSED));
}

#[test]
fn test_finalizer_when_every_write_fails() {
    let (bus, handle) = mock_bus();
    handle.set_fail_writes(true);

    let session = ArticulationSession::start(bus.clone(), engine()).unwrap();
    for i in 0..3 {
        session.feed(speech_chunk(i)).unwrap();
    }
    // 写入失败不会中断后续窗口
    let snapshot = session.finish().unwrap();
    assert_eq!(snapshot.chunks_processed, 3);
    assert_eq!(snapshot.windows_processed, 6);

    let writes = handle.written_positions(JAW);
    assert_eq!(writes.last(), Some(&CLOSED));
    assert!(bus.metrics().write_failures >= 9);
}

#[test]
fn test_cancel_handle_from_other_thread() {
    let (bus, handle) = mock_bus();
    let session = ArticulationSession::start(bus, engine()).unwrap();
    let cancel = session.cancel_handle();

    std::thread::spawn(move || cancel.cancel()).join().unwrap();
    assert!(matches!(
        session.feed(speech_chunk(0)),
        Err(ArticulationError::SessionClosed)
    ));
    session.cancel().unwrap();
    assert_eq!(handle.written_positions(JAW), vec![CLOSED]);
}

#[test]
fn test_resting_gap() {
    let (bus, handle) = mock_bus();
    let engine = ArticulationEngine::new(MouthConfig {
        update_delay_ms: 1,
        resting_openness: 0.25,
        ..MouthConfig::default()
    })
    .unwrap();

    let session = ArticulationSession::start(bus, engine).unwrap();
    session.feed(speech_chunk(0)).unwrap();
    session.finish().unwrap();
    assert_eq!(handle.written_positions(JAW).last(), Some(&1400));
}

#[test]
fn test_unavailable_bus_does_not_block() {
    let bus = Arc::new(MotorBus::unavailable(
        "/dev/missing",
        ProtocolVariant::Feetech,
        ServoTable::new(),
    ));
    let session = ArticulationSession::start(bus, engine()).unwrap();
    session.feed(speech_chunk(0)).unwrap();
    let snapshot = session.finish().unwrap();
    assert_eq!(snapshot.chunks_processed, 1);
}

#[test]
fn test_mouth_test_cycles() {
    let (bus, handle) = mock_bus();
    mouth_test(&bus, &engine(), 3, Duration::from_millis(1)).unwrap();
    assert_eq!(
        handle.written_positions(JAW),
        vec![OPEN, CLOSED, OPEN, CLOSED, OPEN, CLOSED, CLOSED]
    );
}

#[test]
fn test_mouth_test_failure_still_closes() {
    let (bus, handle) = mock_bus();
    handle.fail_next_writes(1);
    let err = mouth_test(&bus, &engine(), 3, Duration::from_millis(1)).unwrap_err();
    assert!(matches!(err, ArticulationError::Bus(_)));
    assert_eq!(handle.written_positions(JAW), vec![OPEN, CLOSED]);
}
