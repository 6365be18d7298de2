//! cry-relay - シリアル録音からLINE通知までの一括パイプライン
//!
//! このクレートは、Arduino等からシリアルポート経由でストリーミングされる
//! 音声バイト列を無音タイムアウト方式で録音し、WAVファイルとして保存、
//! メルスペクトログラム画像を生成した上で公開ファイルホストへアップロードし、
//! LINE Messaging APIでプッシュ通知を送るバッチプログラムを提供します。
//!
//! # 主な機能
//!
//! - **無音タイムアウト録音**: 最後のデータ受信から一定時間静寂が続いたら録音終了
//! - **WAVファイル出力**: モノラル16ビットPCMとして保存
//! - **メルスペクトログラム**: 録音の時間-周波数画像をPNGとして生成（ベストエフォート）
//! - **アップロード**: HTTP PUTで公開ファイルホストへ送信し、取得URLを受け取る
//! - **LINE通知**: 各ステージの成否を反映したメッセージをプッシュ送信
//!
//! # アーキテクチャ
//!
//! ```text
//! [Serial Port] → [Capture Loop] → [WavFileWriter]
//!                                        ↓
//!                              ┌─────────┴─────────┐
//!                              │                   │
//!                    [SpectrogramRenderer]    [Uploader]
//!                              │                   │
//!                              ↓                   ↓
//!                         [PNG画像]         [LineNotifier]
//! ```
//!
//! 制御フローは完全に直列で、各ステージの失敗は縮退して継続します。
//! どの経路でも最後に必ずLINE通知を試みます。
//!
//! # 使用例
//!
//! ```no_run
//! use cry_relay::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod capture;
pub mod config;
pub mod notifier;
pub mod pipeline;
pub mod serial_source;
pub mod spectrogram;
pub mod types;
pub mod uploader;
pub mod wav_writer;
