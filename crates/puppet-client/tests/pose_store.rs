//! PoseStore 集成测试（Mock 串口）

use puppet_client::{MoveTarget, PoseError, PoseStore};
use puppet_driver::{BusError, MotorBus, MotorBusBuilder, Servo};
use puppet_protocol::{ProtocolVariant, ServoId, ServoModel};
use puppet_serial::{MockBusHandle, MockSerialAdapter};
use puppet_tools::{Pose, PoseFile};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn id(n: u8) -> ServoId {
    ServoId::new(n).unwrap()
}

struct Fixture {
    store: PoseStore,
    handle: MockBusHandle,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let adapter = MockSerialAdapter::new(ProtocolVariant::Feetech);
    let handle = adapter.handle();
    let bus = MotorBusBuilder::new()
        .servo(Servo::new(id(1), "servo1", ServoModel::Sts3215))
        .servo(Servo::new(id(6), "servo6", ServoModel::Sts3215).with_range(1100, 2100))
        .reply_timeout(Duration::from_millis(20))
        .build_with_adapter(adapter);

    let dir = tempfile::tempdir().unwrap();
    let store = PoseStore::new(Arc::new(bus), dir.path().join("poses.json"))
        .with_settle_delay(Duration::from_millis(1));
    Fixture {
        store,
        handle,
        _dir: dir,
    }
}

fn write_pose(store: &PoseStore, name: &str, entries: &[(&str, u16)]) {
    let pose: Pose = entries.iter().map(|&(k, v)| (k, v)).collect();
    PoseFile::upsert(store.path(), name, pose).unwrap();
}

#[test]
fn test_apply_example_rest_pose() {
    let f = fixture();
    f.handle.set_position(1, 1800);
    write_pose(&f.store, "rest", &[("servo1", 1200)]);

    let start = Instant::now();
    f.store.apply("rest", Duration::from_millis(400)).unwrap();
    // 100 步均匀分布在整个时长上，最后一步落在 400ms
    assert!(start.elapsed() >= Duration::from_millis(400));

    let writes = f.handle.written_positions(1);
    assert_eq!(writes.len(), 100);
    assert_eq!(writes[0], 1794);
    assert_eq!(writes[99], 1200);
    assert!(writes.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(f.handle.position(1), Some(1200));
}

#[test]
fn test_final_step_lands_at_duration() {
    let f = fixture();
    let store = f.store.with_steps(NonZeroU32::new(4).unwrap());
    f.handle.set_position(1, 1000);

    let start = Instant::now();
    store
        .move_single(id(1), MoveTarget::Absolute(1400), Duration::from_millis(80))
        .unwrap();

    // 第一步在 20ms 处写出，而不是 0ms；最后一步在 80ms 处
    assert!(start.elapsed() >= Duration::from_millis(80));
    assert_eq!(f.handle.written_positions(1), vec![1100, 1200, 1300, 1400]);
}

#[test]
fn test_apply_moves_servos_together() {
    let f = fixture();
    let store = f.store.with_steps(NonZeroU32::new(10).unwrap());
    f.handle.set_position(1, 1000);
    f.handle.set_position(6, 2000);
    write_pose(&store, "wide", &[("servo1", 1100), ("servo6", 1500)]);

    store.apply("wide", Duration::ZERO).unwrap();

    assert_eq!(f.handle.written_positions(1).len(), 10);
    assert_eq!(f.handle.written_positions(6).len(), 10);
    assert_eq!(f.handle.position(1), Some(1100));
    assert_eq!(f.handle.position(6), Some(1500));
}

#[test]
fn test_record_then_apply_round_trip() {
    let f = fixture();
    f.handle.set_position(1, 1234);
    f.handle.set_position(6, 1650);

    let pose = f.store.record("talk").unwrap();
    assert_eq!(pose.get("servo1"), Some(1234));
    assert_eq!(pose.get("servo6"), Some(1650));
    assert_eq!(f.store.load("talk").unwrap(), pose);

    f.handle.set_position(1, 2000);
    f.handle.set_position(6, 2000);
    f.store.apply("talk", Duration::ZERO).unwrap();
    assert_eq!(f.handle.position(1), Some(1234));
    assert_eq!(f.handle.position(6), Some(1650));
}

#[test]
fn test_record_preserves_other_poses() {
    let f = fixture();
    f.handle.set_position(1, 1000);
    f.handle.set_position(6, 1200);
    f.store.record("rest").unwrap();

    f.handle.set_position(1, 3000);
    f.store.record("wave").unwrap();

    assert_eq!(f.store.list().unwrap(), vec!["rest", "wave"]);
    assert_eq!(f.store.load("rest").unwrap().get("servo1"), Some(1000));
    assert_eq!(f.store.load("wave").unwrap().get("servo1"), Some(3000));
}

#[test]
fn test_record_fails_without_writing_file() {
    let f = fixture();
    f.handle.set_position(1, 1000);
    // servo6 不在线

    let err = f.store.record("rest").unwrap_err();
    assert!(matches!(err, PoseError::Bus(ref e) if e.is_timeout()));
    assert!(!f.store.path().exists());
}

#[test]
fn test_load_missing_pose() {
    let f = fixture();
    write_pose(&f.store, "rest", &[("servo1", 1200)]);

    let err = f.store.load("dance").unwrap_err();
    assert!(matches!(err, PoseError::NotFound(ref name) if name == "dance"));
    assert!(f.store.apply("dance", Duration::ZERO).unwrap_err().is_not_found());
}

#[test]
fn test_apply_unknown_servo_moves_nothing() {
    let f = fixture();
    f.handle.set_position(1, 1500);
    write_pose(&f.store, "odd", &[("neck", 900), ("servo1", 1200)]);

    let err = f.store.apply("odd", Duration::ZERO).unwrap_err();
    assert!(matches!(err, PoseError::UnknownServo { ref servo, .. } if servo == "neck"));
    assert!(f.handle.written_frames().is_empty());
}

#[test]
fn test_apply_read_failure_moves_nothing() {
    let f = fixture();
    f.handle.set_position(1, 1500);
    write_pose(&f.store, "both", &[("servo1", 1200), ("servo6", 1500)]);

    assert!(f.store.apply("both", Duration::ZERO).is_err());
    assert!(f.handle.written_positions(1).is_empty());
}

#[test]
fn test_move_single_relative_is_clamped_before_ramp() {
    let f = fixture();
    let store = f.store.with_steps(NonZeroU32::new(20).unwrap());
    f.handle.set_position(6, 2000);

    let final_position = store
        .move_single(id(6), MoveTarget::Relative(500), Duration::ZERO)
        .unwrap();
    assert_eq!(final_position, 2100);

    let writes = f.handle.written_positions(6);
    assert_eq!(writes.len(), 20);
    assert_eq!(*writes.last().unwrap(), 2100);
    assert!(writes.iter().all(|&p| (2000..=2100).contains(&p)));
}

#[test]
fn test_move_single_absolute() {
    let f = fixture();
    let store = f.store.with_steps(NonZeroU32::new(5).unwrap());
    f.handle.set_position(1, 100);

    store
        .move_single(id(1), MoveTarget::Absolute(600), Duration::ZERO)
        .unwrap();
    assert_eq!(f.handle.written_positions(1), vec![200, 300, 400, 500, 600]);
}

#[test]
fn test_serial_failure_is_reported() {
    let f = fixture();
    f.handle.set_position(1, 100);
    write_pose(&f.store, "rest", &[("servo1", 400)]);
    f.handle.set_fail_writes(true);

    let err = f.store.apply("rest", Duration::ZERO).unwrap_err();
    assert!(matches!(err, PoseError::Bus(BusError::Serial(_))));
    assert_eq!(f.handle.position(1), Some(100));
}

#[test]
fn test_unavailable_bus() {
    let dir = tempfile::tempdir().unwrap();
    let bus = MotorBus::unavailable(
        "/dev/missing",
        ProtocolVariant::Feetech,
        [Servo::new(id(1), "servo1", ServoModel::Sts3215)]
            .into_iter()
            .collect(),
    );
    let store = PoseStore::new(Arc::new(bus), dir.path().join("poses.json"));

    assert!(matches!(
        store.record("rest"),
        Err(PoseError::Bus(BusError::Unavailable))
    ));
    assert!(matches!(
        store.move_single(id(1), MoveTarget::Relative(10), Duration::ZERO),
        Err(PoseError::Bus(BusError::Unavailable))
    ));
}
