//! 舵机型号标签

/// 舵机型号（决定默认位置范围）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ServoModel {
    /// Feetech STS3215（12 位磁编码器，0-4095）
    #[default]
    Sts3215,
    /// Feetech SCS0009（10 位电位器，0-1023）
    Scs0009,
    /// LX-16A 总线舵机（0-1000）
    Lx16a,
}

impl ServoModel {
    /// 型号的物理位置范围 `(min, max)`（厂商单位）
    pub const fn default_range(self) -> (u16, u16) {
        match self {
            ServoModel::Sts3215 => (0, 4095),
            ServoModel::Scs0009 => (0, 1023),
            ServoModel::Lx16a => (0, 1000),
        }
    }

    /// 型号名称（日志与配置使用）
    pub const fn name(self) -> &'static str {
        match self {
            ServoModel::Sts3215 => "sts3215",
            ServoModel::Scs0009 => "scs0009",
            ServoModel::Lx16a => "lx16a",
        }
    }
}

impl std::fmt::Display for ServoModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
