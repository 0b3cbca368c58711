use clap::Parser;
use small_ingest::utils::logger::{self, LoggerOptions};
use small_ingest::utils::monitor::RunMonitor;
use small_ingest::utils::validation::Validate;
use small_ingest::{
    CliArgs, ConnectionSettings, EnvSecretProvider, FormatParser, IngestConfig, IngestEngine,
    IngestError, IngestionPipeline, LoadStrategy, LogNotifier, PgWarehouse, SourceConnector,
    StagingArea,
};
use std::sync::Arc;

fn report(e: &IngestError) -> i32 {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    e.severity().exit_code()
}

fn print_plan(config: &IngestConfig) -> small_ingest::Result<()> {
    let target = config.target();
    let pattern = config.file_pattern();
    println!("📋 Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("   {}", description);
    }
    println!("   Source:   {:?}", config.source.kind);
    println!("   Staging:  {}", config.staging.download_path);
    println!("   Archive:  {}", config.staging.archive_path);
    println!(
        "   Files:    prefix '{}', ending '{}', extensions {:?}",
        pattern.prefix,
        pattern.expected_ending(),
        pattern.extensions
    );
    println!("   Parser:   {:?}", config.file_kind()?);
    println!("   Strategy: {:?}", config.load.strategy);
    println!(
        "   Target:   {}.{} (view {}), reset: {}",
        target.schema,
        target.table,
        target.view(),
        config.reset_table()
    );
    Ok(())
}

async fn run(args: &CliArgs, config: IngestConfig) -> small_ingest::Result<()> {
    let secrets = EnvSecretProvider::new();
    let connection = ConnectionSettings::from_config(&config, &secrets)?;
    tracing::debug!("Database connection: {:?}", connection);

    let warehouse = Arc::new(PgWarehouse::connect_lazy(&connection));
    let source = SourceConnector::from_config(&config, &secrets).await?;
    let pipeline = IngestionPipeline::new(
        FormatParser::from_config(&config)?,
        LoadStrategy::from_config(&config, &connection)?,
        config.target(),
        config.file_pattern(),
        config.archive_path(),
        warehouse,
    );
    let notifier = Arc::new(LogNotifier::new(
        config.subject_prefix().map(str::to_string),
    ));

    let mut engine = IngestEngine::new(
        StagingArea::new(config.download_path()),
        source,
        pipeline,
        notifier,
        config.reset_table(),
    )
    .with_monitor(RunMonitor::new(args.monitor));

    let outcome = engine.run().await?;
    println!(
        "✅ Loaded {} files ({} rows), {} failed, {} skipped in {:.2}s",
        outcome.loaded_files(),
        outcome.total_rows(),
        outcome.failed_files(),
        outcome.skipped,
        outcome.elapsed.as_secs_f64()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match IngestConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            // 日誌尚未初始化
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code());
        }
    };

    let guard = logger::init_logger(&LoggerOptions {
        verbose: args.verbose,
        json: args.json_logs || config.json_logs(),
        level: config.log_level(),
        file: config.log_file(),
    });

    tracing::info!("Starting small-ingest pipeline '{}'", config.pipeline.name);
    if args.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        let code = report(&e);
        drop(guard);
        std::process::exit(code);
    }

    if args.dry_run {
        match print_plan(&config) {
            Ok(()) => println!("✅ Configuration is valid (dry run, nothing executed)"),
            Err(e) => {
                let code = report(&e);
                drop(guard);
                std::process::exit(code);
            }
        }
        return;
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = run(&args, config).await {
        // 執行失敗一律非零結束
        let code = report(&e).max(1);
        // exit 前先 flush 檔案日誌
        drop(guard);
        std::process::exit(code);
    }
}
