use crate::config::SpectrogramConfig;
use crate::wav_writer;
use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::path::Path;

/// dBスケールの下限。これより小さい値は黒にクリップする
const DB_FLOOR: f32 = -80.0;

/// パワー値の下限（log10に0を渡さないため）
const POWER_FLOOR: f32 = 1e-10;

/// メルスペクトログラム画像の生成
///
/// WAVファイルを読み込み、対数パワーのメルスペクトログラムを
/// 軸・ラベルなしのグレースケールPNGとして出力する。
///
/// # アルゴリズム
///
/// 1. サンプルを -1.0 ~ 1.0 に正規化
/// 2. Hann窓を掛けてフレームごとにFFT
/// 3. パワースペクトル (`n_fft/2 + 1` ビン) を計算
/// 4. メルフィルタバンク (HTK式) を適用
/// 5. デシベル変換 (基準値 = 最大パワー、下限 -80dB)
/// 6. 幅 = フレーム数、高さ = メルバンド数の画像に描画（低域が下）
pub struct SpectrogramRenderer {
    n_fft: usize,
    hop_length: usize,
    n_mels: usize,
}

impl SpectrogramRenderer {
    pub fn new(config: &SpectrogramConfig) -> Self {
        Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
        }
    }

    /// WAVファイルからスペクトログラム画像を生成
    ///
    /// # Errors
    ///
    /// 入力ファイルが存在しない、デコードできない、または音声データが
    /// 空の場合にエラーを返す。失敗してもパイプラインは継続する前提。
    pub fn render<P: AsRef<Path>, Q: AsRef<Path>>(&self, wav_path: P, image_path: Q) -> Result<()> {
        // ゼロのパラメータはゼロ除算や空の出力につながるため先に弾く
        if self.n_fft == 0 || self.hop_length == 0 || self.n_mels == 0 {
            anyhow::bail!(
                "スペクトログラム設定が不正です (n_fft={}, hop_length={}, n_mels={})",
                self.n_fft,
                self.hop_length,
                self.n_mels
            );
        }

        let (samples, sample_rate) = wav_writer::read_samples(wav_path.as_ref())?;

        if samples.is_empty() {
            anyhow::bail!("音声データが空のためスペクトログラムを生成できません");
        }

        let signal: Vec<f32> = samples
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect();

        let mel_db = self.log_mel_spectrogram(&signal, sample_rate);

        let num_frames = mel_db[0].len();
        let mut img = GrayImage::new(num_frames as u32, self.n_mels as u32);
        for (mel_idx, row) in mel_db.iter().enumerate() {
            // 低域が画像の下端に来るよう上下を反転
            let y = (self.n_mels - 1 - mel_idx) as u32;
            for (frame_idx, &db) in row.iter().enumerate() {
                let value = ((db - DB_FLOOR) / -DB_FLOOR * 255.0).clamp(0.0, 255.0) as u8;
                img.put_pixel(frame_idx as u32, y, Luma([value]));
            }
        }

        img.save(image_path.as_ref())
            .with_context(|| format!("スペクトログラム画像の保存に失敗: {:?}", image_path.as_ref()))?;

        log::info!(
            "スペクトログラム画像を生成しました: {:?} ({}x{})",
            image_path.as_ref(),
            num_frames,
            self.n_mels
        );

        Ok(())
    }

    /// 対数パワーのメルスペクトログラムを計算
    ///
    /// 戻り値は `[n_mels][フレーム数]` のdB値 (-80.0 ~ 0.0)。
    fn log_mel_spectrogram(&self, signal: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
        // 1フレームに満たない入力はゼロパディング
        let mut padded = signal.to_vec();
        if padded.len() < self.n_fft {
            padded.resize(self.n_fft, 0.0);
        }
        let num_frames = 1 + (padded.len() - self.n_fft) / self.hop_length;

        let window = hann_window_periodic(self.n_fft);
        let num_bins = self.n_fft / 2 + 1;
        let filters = mel_filter_bank(num_bins, self.n_mels, sample_rate, self.n_fft);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.n_fft);

        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut power = vec![0.0f32; num_bins];
        let mut mel = vec![vec![0.0f32; num_frames]; self.n_mels];

        for frame in 0..num_frames {
            let offset = frame * self.hop_length;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(padded[offset + i] * window[i], 0.0);
            }
            fft.process(&mut buf);

            for (bin, p) in power.iter_mut().enumerate() {
                *p = buf[bin].norm_sqr();
            }

            for (mel_idx, filter) in filters.iter().enumerate() {
                let sum: f32 = filter.iter().zip(power.iter()).map(|(f, p)| f * p).sum();
                mel[mel_idx][frame] = sum;
            }
        }

        // パワー→dB変換（基準値 = 全体の最大パワー）
        let max_power = mel
            .iter()
            .flatten()
            .copied()
            .fold(POWER_FLOOR, f32::max);
        for row in mel.iter_mut() {
            for v in row.iter_mut() {
                *v = (10.0 * (v.max(POWER_FLOOR) / max_power).log10()).max(DB_FLOOR);
            }
        }

        mel
    }
}

/// 周期的Hann窓
fn hann_window_periodic(n: usize) -> Vec<f32> {
    let two_pi = std::f32::consts::PI * 2.0;
    (0..n)
        .map(|i| 0.5 - 0.5 * (two_pi * i as f32 / n as f32).cos())
        .collect()
}

/// 周波数 (Hz) → メル (HTK式)
fn hz_to_mel(freq_hz: f32) -> f32 {
    2595.0 * (1.0 + freq_hz / 700.0).log10()
}

/// メル → 周波数 (Hz)
fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

fn linspace(start: f32, end: f32, n: usize) -> Vec<f32> {
    if n == 0 {
        return vec![];
    }
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n as f32 - 1.0);
    (0..n).map(|i| start + step * i as f32).collect()
}

/// 三角形メルフィルタバンクを構築
///
/// 戻り値は `[n_mels][num_bins]`。各フィルタは 0 Hz ~ ナイキスト周波数の
/// 範囲をメル尺度で等分した三角窓。
fn mel_filter_bank(
    num_bins: usize,
    n_mels: usize,
    sample_rate: u32,
    n_fft: usize,
) -> Vec<Vec<f32>> {
    let nyquist = sample_rate as f32 / 2.0;
    let mel_points = linspace(hz_to_mel(0.0), hz_to_mel(nyquist), n_mels + 2);
    let hz_points: Vec<f32> = mel_points.into_iter().map(mel_to_hz).collect();

    let bin_freqs: Vec<f32> = (0..num_bins)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mut filters = vec![vec![0.0f32; num_bins]; n_mels];
    for (m, filter) in filters.iter_mut().enumerate() {
        let lower = hz_points[m];
        let center = hz_points[m + 1];
        let upper = hz_points[m + 2];

        for (k, &freq) in bin_freqs.iter().enumerate() {
            if freq > lower && freq < center && center > lower {
                filter[k] = (freq - lower) / (center - lower);
            } else if freq >= center && freq < upper && upper > center {
                filter[k] = (upper - freq) / (upper - center);
            }
        }
    }

    filters
}
