//! 参数解析工具

use anyhow::{Context, Result};
use puppet_driver::MotorBus;
use puppet_protocol::ServoId;

/// 解析舵机引用：数字按地址解析，否则按舵机表中的名称查找
pub fn resolve_servo(bus: &MotorBus, servo: &str) -> Result<ServoId> {
    if let Ok(raw) = servo.parse::<u8>() {
        return ServoId::new(raw).with_context(|| format!("非法舵机地址: {}", raw));
    }
    Ok(bus.servo_by_name(servo)?.id)
}

/// 舵机列表：未指定时使用舵机表中的全部舵机
pub fn resolve_servos(bus: &MotorBus, servos: &[String]) -> Result<Vec<ServoId>> {
    if servos.is_empty() {
        let all: Vec<ServoId> = bus.servos().iter().map(|s| s.id).collect();
        if all.is_empty() {
            anyhow::bail!("配置中没有舵机，请指定舵机地址");
        }
        return Ok(all);
    }
    servos.iter().map(|s| resolve_servo(bus, s)).collect()
}

/// 舵机显示名：`servo6 (#6)`，不在舵机表中时只显示地址
pub fn display_servo(bus: &MotorBus, id: ServoId) -> String {
    match bus.servos().get(id) {
        Some(servo) => format!("{} ({})", servo.name, id),
        None => id.to_string(),
    }
}
