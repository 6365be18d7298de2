mod capture;
mod config;
mod notifier;
mod pipeline;
mod serial_source;
mod spectrogram;
mod types;
mod uploader;
mod wav_writer;

use anyhow::Result;
use config::Config;
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            &args[2]
        } else {
            "config.toml"
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    // 設定ファイルのパス
    let config_path = if args.len() > 1 && !args[1].starts_with("--") {
        &args[1]
    } else {
        "config.toml"
    };

    // 設定を読み込み
    let config = Config::load_or_default(config_path)?;
    config.validate()?;

    log::info!("cry-relay を起動します");
    log::info!("設定: {:?}", config);

    // パイプラインを1回実行して終了（常駐しない）
    pipeline::run(&config).await?;

    log::info!("cry-relay を終了しました");

    Ok(())
}
