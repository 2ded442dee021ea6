//! 短窗口振幅
//!
//! 每个音频块先按自身峰值归一化，再切成固定长度的窗口，
//! 每个窗口取平均绝对振幅。归一化让阈值与音频块的整体响度无关。

/// 音频块的峰值（绝对值）
pub fn peak(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

/// 按峰值归一化后，前 `max_windows` 个窗口的平均绝对振幅
///
/// - 峰值为 0（全静音）时所有窗口振幅为 0
/// - 块尾不足一个窗口的样本仍作为一个短窗口计算
/// - 样本不足 `max_windows` 个窗口时返回的窗口更少
pub fn window_amplitudes(samples: &[i16], window: usize, max_windows: usize) -> Vec<f32> {
    let peak = f64::from(peak(samples));
    samples
        .chunks(window.max(1))
        .take(max_windows)
        .map(|w| {
            if peak == 0.0 {
                0.0
            } else {
                (mean_abs(w) / peak) as f32
            }
        })
        .collect()
}

fn mean_abs(window: &[i16]) -> f64 {
    let sum: u64 = window.iter().map(|s| u64::from(s.unsigned_abs())).sum();
    sum as f64 / window.len() as f64
}
