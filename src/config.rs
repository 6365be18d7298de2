use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub line: LineConfig,
}

/// シリアルポート設定
///
/// Arduino等からの音声バイト列を受信するシリアル接続に関する設定。
///
/// # デフォルト値
///
/// - `port`: "/dev/ttyUSB0"
/// - `baud_rate`: 115200
/// - `read_timeout_ms`: 1000 ms (読み取りがこの時間でブロック解除され、
///   無音タイムアウト判定が停滞しないようにする)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// 録音設定
///
/// キャプチャループの動作に関する設定。
///
/// # デフォルト値
///
/// - `sample_rate`: 16000 Hz (Arduino側の出力レートに合わせる)
/// - `inactivity_timeout_secs`: 5 秒 (この時間新しいデータが来なければ録音終了)
/// - `poll_interval_ms`: 50 ms (ポーリング間のスリープ。ビジーループ防止)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// 出力設定
///
/// WAVファイルの出力先と後始末に関する設定。
///
/// # デフォルト値
///
/// - `wav_path`: "baby.wav"
/// - `cleanup`: true (通知後にローカルファイルを削除する)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_wav_path")]
    pub wav_path: String,
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

/// メルスペクトログラム設定
///
/// 録音からの時間-周波数画像生成に関する設定。
///
/// # デフォルト値
///
/// - `enabled`: true
/// - `n_fft`: 2048
/// - `hop_length`: 512
/// - `n_mels`: 128
/// - `image_path`: "baby_spectrogram.png"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpectrogramConfig {
    #[serde(default = "default_spectrogram_enabled")]
    pub enabled: bool,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "default_image_path")]
    pub image_path: String,
}

/// アップロード設定
///
/// 公開ファイルホストへのHTTP PUTに関する設定。
///
/// # デフォルト値
///
/// - `base_url`: "https://transfer.sh"
/// - `timeout_seconds`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_base_url")]
    pub base_url: String,
    #[serde(default = "default_upload_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// LINE Messaging API 設定
///
/// プッシュ通知の送信先と認証情報。トークンとユーザーIDは必須で、
/// 未設定のまま起動すると `validate()` が失敗する。
///
/// # デフォルト値
///
/// - `api_base`: "https://api.line.me"
/// - `timeout_seconds`: 10 秒
#[derive(Clone, Deserialize, Serialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
    #[serde(default = "default_line_timeout_seconds")]
    pub timeout_seconds: u64,
}

// 起動時の設定ダンプにアクセストークンが出ないよう伏せ字にする
impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field(
                "channel_access_token",
                &if self.channel_access_token.is_empty() {
                    "(未設定)"
                } else {
                    "***"
                },
            )
            .field("user_id", &self.user_id)
            .field("api_base", &self.api_base)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// Default functions
fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_sample_rate() -> u32 {
    16000 // Arduino録音で一般的な16kHz
}

fn default_inactivity_timeout_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_wav_path() -> String {
    "baby.wav".to_string()
}

fn default_cleanup() -> bool {
    true
}

fn default_spectrogram_enabled() -> bool {
    true
}

fn default_n_fft() -> usize {
    2048
}

fn default_hop_length() -> usize {
    512
}

fn default_n_mels() -> usize {
    128
}

fn default_image_path() -> String {
    "baby_spectrogram.png".to_string()
}

fn default_upload_base_url() -> String {
    "https://transfer.sh".to_string()
}

fn default_upload_timeout_seconds() -> u64 {
    30
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_line_timeout_seconds() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            audio: AudioConfig::default(),
            output: OutputConfig::default(),
            spectrogram: SpectrogramConfig::default(),
            upload: UploadConfig::default(),
            line: LineConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            wav_path: default_wav_path(),
            cleanup: default_cleanup(),
        }
    }
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            enabled: default_spectrogram_enabled(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
            image_path: default_image_path(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: default_upload_base_url(),
            timeout_seconds: default_upload_timeout_seconds(),
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: String::new(),
            user_id: String::new(),
            api_base: default_line_api_base(),
            timeout_seconds: default_line_timeout_seconds(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cry_relay::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// デフォルト値を持つ設定ファイルを生成する。
    /// 既存のファイルは上書きされる。
    ///
    /// # Arguments
    ///
    /// * `path` - 出力先のパス
    ///
    /// # Errors
    ///
    /// ファイルの書き込みに失敗した場合にエラーを返す。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }

    /// 必須項目の検証
    ///
    /// LINEのトークンとユーザーIDが未設定のまま動かすと、
    /// パイプラインの最後で必ず通知に失敗するため起動前に弾く。
    pub fn validate(&self) -> Result<()> {
        if self.line.channel_access_token.is_empty() {
            anyhow::bail!("line.channel_access_token が設定されていません");
        }
        if self.line.user_id.is_empty() {
            anyhow::bail!("line.user_id が設定されていません");
        }
        Ok(())
    }
}
