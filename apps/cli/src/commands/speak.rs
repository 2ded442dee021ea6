//! 用 WAV 文件驱动嘴部
//!
//! 按音频块时长节拍投递（模拟播放线程），Ctrl-C 取消时嘴部仍会闭合。

use crate::context::CliContext;
use anyhow::{Context, Result};
use clap::Args;
use puppet_client::{ArticulationEngine, ArticulationError, AudioChunk, Pacer};
use puppet_tools::MouthConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// speak 命令参数
#[derive(Args, Debug)]
pub struct SpeakCommand {
    /// WAV 文件
    pub wav: PathBuf,

    /// 不按音频时长节拍投递（尽快处理）
    #[arg(long)]
    pub no_pace: bool,
}

impl SpeakCommand {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let (samples, sample_rate) = read_wav(&self.wav)?;
        let puppet = ctx.connect()?;

        let engine = ArticulationEngine::new(MouthConfig {
            sample_rate,
            ..puppet.engine().config().clone()
        })?;
        let chunk_len = engine.chunk_samples();
        let chunk_duration = Duration::from_secs_f64(chunk_len as f64 / f64::from(sample_rate));

        println!(
            "🔊 {} ({} Hz, {:.1}s, {} 个音频块)",
            self.wav.display(),
            sample_rate,
            samples.len() as f64 / f64::from(sample_rate),
            samples.len().div_ceil(chunk_len)
        );

        let session = puppet.speak_with(engine)?;
        let cancel = session.cancel_handle();
        {
            let cancel = cancel.clone();
            ctrlc::set_handler(move || {
                cancel.cancel();
                println!("\n收到退出信号，正在闭嘴...");
            })?;
        }

        let mut pacer = Pacer::new(if self.no_pace {
            Duration::ZERO
        } else {
            chunk_duration
        });
        for (index, chunk) in samples.chunks(chunk_len).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let timestamp = chunk_duration.saturating_mul(index as u32);
            match session.feed(AudioChunk::new(chunk.to_vec(), timestamp)) {
                Ok(()) => {},
                Err(ArticulationError::SessionClosed) => break,
                Err(e) => return Err(e.into()),
            }
            pacer.wait();
        }

        let snapshot = if cancel.is_cancelled() {
            session.cancel()?
        } else {
            session.finish()?
        };
        println!(
            "✅ 完成: {} 个音频块, {} 个窗口, 嘴部停在 {}",
            snapshot.chunks_processed, snapshot.windows_processed, snapshot.position
        );

        let metrics = puppet.bus().metrics();
        if metrics.write_failures > 0 {
            println!("⚠️  {} 次写入失败", metrics.write_failures);
        }
        Ok(())
    }
}

/// 读取 WAV，多声道取平均，统一为 16 位
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("无法打开 WAV 文件: {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader.samples::<i16>().collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, bits) if bits <= 32 => reader
            .samples::<i32>()
            .map(|s| s.map(|v| scale_int(v, bits)))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<Result<_, _>>()?,
        (format, bits) => anyhow::bail!("不支持的 WAV 格式: {:?} {} bit", format, bits),
    };

    let channels = usize::from(spec.channels.max(1));
    let mono = interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect();
    Ok((mono, spec.sample_rate))
}

fn scale_int(value: i32, bits: u16) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, bits: u16, samples: &[i32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 16_000,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_mono_16bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 1, 16, &[0, 1000, -1000, 32767]);

        let (samples, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(samples, vec![0, 1000, -1000, 32767]);
    }

    #[test]
    fn test_stereo_is_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.wav");
        write_wav(&path, 2, 16, &[1000, 3000, -2000, 0]);

        let (samples, _) = read_wav(&path).unwrap();
        assert_eq!(samples, vec![2000, -1000]);
    }

    #[test]
    fn test_24bit_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.wav");
        write_wav(&path, 1, 24, &[256 * 1000]);

        let (samples, _) = read_wav(&path).unwrap();
        assert_eq!(samples, vec![1000]);
    }

    #[test]
    fn test_missing_file() {
        assert!(read_wav(Path::new("/nonexistent/speech.wav")).is_err());
    }
}
