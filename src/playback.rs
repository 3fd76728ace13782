use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// デコード済みの音声クリップ
///
/// サンプルは -1.0～1.0 に正規化したインターリーブ形式。
#[derive(Clone, Debug)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedClip {
    /// 再生時間（秒）
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// WAVファイルを読み込んで正規化
pub fn decode_wav<P: AsRef<Path>>(path: P) -> Result<DecodedClip> {
    let mut reader = hound::WavReader::open(path.as_ref())
        .with_context(|| format!("WAVファイルを開けません: {:?}", path.as_ref()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| "WAVサンプルの読み込みに失敗")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| "WAVサンプルの読み込みに失敗")?
        }
    };

    Ok(DecodedClip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// 音声参照をファイルパスに解決
///
/// 相対パスはカレントディレクトリを優先し、存在しなければ入力ファイルのディレクトリから探す。
pub fn resolve_audio_path(audio_ref: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(audio_ref.strip_prefix("file://").unwrap_or(audio_ref));
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }

    match base_dir {
        Some(dir) if dir.join(path).exists() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// 音声再生プレイヤー
pub struct AudioPlayer {
    device: Device,
    stream: Option<Stream>,
    finished: Arc<AtomicBool>,
}

impl AudioPlayer {
    /// 新しいAudioPlayerを作成
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        // 名前の指定があれば一致するデバイス、なければ既定のデバイス
        let device = if let Some(name) = device_name {
            host.output_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow::anyhow!("出力デバイス '{}' が見つかりません", name))?
        } else {
            host.default_output_device()
                .ok_or_else(|| anyhow::anyhow!("デフォルト出力デバイスが見つかりません"))?
        };

        log::info!("出力デバイス: {}", device.name()?);

        // 再生前は「再生終了」扱い
        Ok(Self {
            device,
            stream: None,
            finished: Arc::new(AtomicBool::new(true)),
        })
    }

    /// デバイス一覧を表示
    pub fn list_devices() -> Result<()> {
        let host = cpal::default_host();
        println!("=== 利用可能な出力デバイス ===");

        for (idx, device) in host.output_devices()?.enumerate() {
            let name = device.name()?;
            let is_default = host
                .default_output_device()
                .and_then(|d| d.name().ok())
                .map(|default_name| default_name == name)
                .unwrap_or(false);

            // 既定のデバイスには印を付ける
            let marker = if is_default { " (デフォルト)" } else { "" };
            println!("{}. {}{}", idx, name, marker);

            // 既定の出力設定
            if let Ok(config) = device.default_output_config() {
                println!(
                    "   サンプルレート: {} Hz, チャンネル数: {}",
                    config.sample_rate().0,
                    config.channels()
                );
            }
        }

        Ok(())
    }

    /// WAVファイルを再生（再生中のものは停止する）
    ///
    /// # Returns
    ///
    /// 再生時間（秒）
    pub fn play<P: AsRef<Path>>(&mut self, path: P) -> Result<f64> {
        self.stop();

        // ファイル全体を先に読み込む
        let clip = decode_wav(path.as_ref())?;
        let duration = clip.duration_secs();

        let default_config = self
            .device
            .default_output_config()
            .context("デフォルト出力設定が取得できません")?;

        // リサンプリングはしない（ファイルのレートとチャンネル数のまま出力）
        let config = StreamConfig {
            channels: clip.channels,
            sample_rate: cpal::SampleRate(clip.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        log::info!(
            "再生開始: {:?} ({}Hz, {}ch, {:.2}秒)",
            path.as_ref(),
            config.sample_rate.0,
            config.channels,
            duration
        );

        // デバイスのサンプル形式に合わせてストリームを構築
        let stream = match default_config.sample_format() {
            SampleFormat::F32 => self.build_stream::<f32>(config, clip.samples)?,
            SampleFormat::I16 => self.build_stream::<i16>(config, clip.samples)?,
            SampleFormat::U16 => self.build_stream::<u16>(config, clip.samples)?,
            _ => anyhow::bail!(
                "サポートされていないサンプルフォーマット: {:?}",
                default_config.sample_format()
            ),
        };

        stream.play().context("ストリームの再生開始に失敗")?;
        self.stream = Some(stream);

        Ok(duration)
    }

    /// 指定されたサンプルフォーマットで出力ストリームを構築
    fn build_stream<T>(&mut self, config: StreamConfig, samples: Vec<f32>) -> Result<Stream>
    where
        T: SizedSample + Sample + FromSample<f32> + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        self.finished = finished.clone();

        let mut position = 0;
        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = match samples.get(position) {
                            Some(&s) => {
                                position += 1;
                                T::from_sample(s)
                            }
                            None => Sample::EQUILIBRIUM,
                        };
                    }
                    // 最後まで出力したら終了を通知
                    if position >= samples.len() {
                        finished.store(true, Ordering::SeqCst);
                    }
                },
                move |err| {
                    log::error!("出力ストリームエラー: {}", err);
                },
                None,
            )
            .context("出力ストリームの構築に失敗")?;

        Ok(stream)
    }

    /// 再生中かどうか
    pub fn is_playing(&self) -> bool {
        self.stream.is_some() && !self.finished.load(Ordering::SeqCst)
    }

    /// 再生を停止
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::debug!("再生を停止しました");
        }
        self.finished.store(true, Ordering::SeqCst);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
