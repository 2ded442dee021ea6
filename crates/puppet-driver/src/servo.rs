//! 舵机表
//!
//! 记录总线上每个舵机的地址、名称、型号和安全位置范围。
//! 所有发往舵机的目标位置在编码前都按这里的范围钳位。

use puppet_protocol::{ServoId, ServoModel};
use tracing::debug;

/// 总线上的一个舵机
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Servo {
    pub id: ServoId,
    /// 姿态文件中使用的名称
    pub name: String,
    pub model: ServoModel,
    /// 安全范围下限（厂商单位）
    pub min: u16,
    /// 安全范围上限（厂商单位）
    pub max: u16,
}

impl Servo {
    /// 使用型号默认范围创建
    pub fn new(id: ServoId, name: impl Into<String>, model: ServoModel) -> Self {
        let (min, max) = model.default_range();
        Self {
            id,
            name: name.into(),
            model,
            min,
            max,
        }
    }

    /// 设置安全范围（上下限顺序颠倒时自动交换）
    pub fn with_range(mut self, min: u16, max: u16) -> Self {
        self.min = min.min(max);
        self.max = min.max(max);
        self
    }

    /// 将请求位置钳位到安全范围
    ///
    /// 越界不是错误：略微超出范围的请求很常见，不能因此中断动作序列。
    pub fn clamp(&self, requested: i32) -> u16 {
        let clamped = requested.clamp(i32::from(self.min), i32::from(self.max)) as u16;
        if i32::from(clamped) != requested {
            debug!(
                "{} ({}): position {} clamped to {}",
                self.name, self.id, requested, clamped
            );
        }
        clamped
    }

    /// 位置是否在安全范围内
    pub fn contains(&self, position: u16) -> bool {
        (self.min..=self.max).contains(&position)
    }
}

/// 有序舵机表（保持配置中的顺序，姿态录制按此顺序逐个读取）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServoTable {
    servos: Vec<Servo>,
}

impl ServoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入舵机；同一地址已存在时替换
    pub fn insert(&mut self, servo: Servo) {
        match self.servos.iter_mut().find(|s| s.id == servo.id) {
            Some(existing) => *existing = servo,
            None => self.servos.push(servo),
        }
    }

    pub fn get(&self, id: ServoId) -> Option<&Servo> {
        self.servos.iter().find(|s| s.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Servo> {
        self.servos.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Servo> {
        self.servos.iter()
    }

    pub fn len(&self) -> usize {
        self.servos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servos.is_empty()
    }
}

impl FromIterator<Servo> for ServoTable {
    fn from_iter<I: IntoIterator<Item = Servo>>(iter: I) -> Self {
        let mut table = ServoTable::new();
        for servo in iter {
            table.insert(servo);
        }
        table
    }
}

impl<'a> IntoIterator for &'a ServoTable {
    type Item = &'a Servo;
    type IntoIter = std::slice::Iter<'a, Servo>;

    fn into_iter(self) -> Self::IntoIter {
        self.servos.iter()
    }
}
