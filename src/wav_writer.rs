use crate::types::{AudioClip, SampleI16};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 固定パスへのWAVファイル書き出し
///
/// キャプチャした全バイト列をモノラル16ビットPCMのWAVファイルとして保存する。
/// 既存のファイルは上書きされる。
pub struct WavFileWriter {
    path: PathBuf,
    spec: hound::WavSpec,
}

impl WavFileWriter {
    pub fn new<P: AsRef<Path>>(path: P, sample_rate: u32) -> Self {
        let spec = hound::WavSpec {
            channels: 1, // モノラル
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        Self {
            path: path.as_ref().to_path_buf(),
            spec,
        }
    }

    /// 音声クリップを書き込む
    ///
    /// # Errors
    ///
    /// 出力先に書き込めない場合にエラーを返す。
    pub fn write(&self, clip: &AudioClip) -> Result<()> {
        // 出力先の親ディレクトリが存在しない場合は作成
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", parent))?;
            }
        }

        // 16ビットコンテナには半端な1バイトを格納できない
        if clip.bytes.len() % 2 != 0 {
            log::warn!(
                "バッファが奇数長 ({}バイト) のため、末尾の1バイトを切り捨てます",
                clip.bytes.len()
            );
        }

        let mut writer = hound::WavWriter::create(&self.path, self.spec)
            .with_context(|| format!("WAVファイルの作成に失敗: {:?}", self.path))?;

        for sample in clip.samples() {
            writer
                .write_sample(sample)
                .with_context(|| "WAVファイルへのサンプル書き込みに失敗")?;
        }

        writer
            .finalize()
            .with_context(|| "WAVファイルのファイナライズに失敗")?;

        log::info!(
            "WAVファイル書き込み完了: {:?} ({}バイト, {:.2}秒)",
            self.path,
            clip.bytes.len(),
            clip.duration_seconds()
        );

        Ok(())
    }
}

/// WAVファイルからサンプル列を読み込む
///
/// スペクトログラム生成とテストの読み戻しに使用する。
///
/// # Returns
/// (サンプル列, サンプリングレート)
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<(Vec<SampleI16>, u32)> {
    let mut reader = hound::WavReader::open(path.as_ref())
        .with_context(|| format!("WAVファイルを開けません: {:?}", path.as_ref()))?;

    let sample_rate = reader.spec().sample_rate;
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| "WAVファイルのサンプル読み込みに失敗")?;

    Ok((samples, sample_rate))
}
