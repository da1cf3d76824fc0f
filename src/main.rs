mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use ef_av::{FfprobeProber, Prober, ToolRegistry};
use ef_core::config::Config;
use ef_core::error::exit_code_for;
use ef_core::PresetCatalog;
use ef_pipeline::{
    build_stages, check_compliance, EpisodeProducer, EpisodeRequest, ProductionResult,
    ProgressSender,
};
use tokio_util::sync::CancellationToken;

struct ProduceArgs {
    request: PathBuf,
    output: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    quality: Option<String>,
    profile: Option<String>,
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "episodeforge=debug,ef_pipeline=debug,ef_av=debug,ef_core=debug".to_string()
        } else {
            "episodeforge=info,ef_pipeline=info,ef_av=warn,ef_core=info".to_string()
        }
    });

    // Logs go to stderr so `--json` output stays machine readable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<ef_core::Error>()
                .map_or(1, ef_core::Error::exit_code);
            exit_code(code)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Produce {
            request,
            output,
            working_dir,
            quality,
            profile,
            json,
        } => {
            let args = ProduceArgs {
                request,
                output,
                working_dir,
                quality,
                profile,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(produce(args, config_path))
        }
        Commands::Validate { request } => validate_request(&request, config_path),
        Commands::Check { file, profile } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_file(&file, profile.as_deref(), config_path))
        }
        Commands::Presets => list_presets(config_path),
        Commands::CheckTools => check_tools(config_path),
        Commands::Version => {
            println!("episodeforge {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load_or_default(path)?;
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }
    Ok(config)
}

async fn produce(args: ProduceArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.working_dir {
        config.pipeline.working_dir = Some(dir);
    }

    let mut request = EpisodeRequest::from_path(&args.request)
        .with_context(|| format!("loading request {}", args.request.display()))?;
    if let Some(output) = args.output {
        request.output = output;
    }
    if args.quality.is_some() {
        request.quality = args.quality;
    }
    if args.profile.is_some() {
        request.profile = args.profile;
    }

    let producer = EpisodeProducer::with_ffmpeg(config)?;

    // Ctrl-C stops the run at the next stage boundary.
    let cancellation = CancellationToken::new();
    let signal_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current stage");
            signal_token.cancel();
        }
    });

    let progress = ProgressSender::new(|pct, step| {
        tracing::debug!("progress {:.0}%: {}", pct, step);
    });

    let result = producer
        .produce_episode_with(request, cancellation, progress)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(match &result.failure {
        None => ExitCode::SUCCESS,
        Some(failure) => exit_code(exit_code_for(failure.kind)),
    })
}

fn print_result(result: &ProductionResult) {
    println!("Run: {}", result.run_id);
    println!("Status: {}", result.status);
    println!(
        "Started: {}",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(ref output) = result.output {
        println!("Output: {}", output.display());
    }
    if let Some(duration) = result.episode_duration {
        println!("Duration: {:.2}s", duration.as_secs_f64());
    }
    println!("Elapsed: {:.2}s", result.elapsed.as_secs_f64());

    println!("\nStages:");
    for timing in &result.stage_timings {
        println!("  {:<20} {:>8.2}s", timing.stage.to_string(), timing.elapsed.as_secs_f64());
    }

    if let Some(ref failure) = result.failure {
        println!("\nFailed: {}", failure);
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning);
    }
}

fn validate_request(path: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = PresetCatalog::from_config(&config);

    println!("Validating request: {}", path.display());
    let request = EpisodeRequest::from_path(path)?;
    let plan = build_stages(&request, &catalog, &config.pipeline)?;

    println!("✓ Request is valid");
    println!(
        "  Episode: {} {} \"{}\"",
        request.show_title,
        request.episode_code(),
        request.episode_title
    );
    println!("  Scenes: {}", request.scenes.len());
    println!("  Quality: {}", plan.quality);
    println!("  Profile: {}", plan.profile);
    println!("  Transitions: {}", plan.transitions);
    println!("  Output: {}", request.output.display());
    println!("\nStages:");
    for (i, id) in plan.ids().iter().enumerate() {
        println!("  {}. {}", i + 1, id);
    }

    let missing: Vec<_> = request
        .scenes
        .iter()
        .flat_map(|s| [&s.animation, &s.audio])
        .filter(|p| !p.exists())
        .collect();
    if !missing.is_empty() {
        println!("\nNot found yet (checked again when each scene runs):");
        for path in missing {
            println!("  {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn check_file(
    file: &Path,
    profile: Option<&str>,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = load_config(config_path)?;
    let catalog = PresetCatalog::from_config(&config);
    let profile_name = profile.unwrap_or(&config.pipeline.default_profile);
    let compliance = catalog.profile(profile_name)?;

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let info = prober.probe(file).await?;

    println!("File: {}", file.display());
    if let Some(container) = info.container {
        println!("Container: {}", container);
    }
    if let Some(ref video) = info.video {
        print!("Video: {} {}", video.codec_name, video.resolution());
        if let Some(fps) = video.frame_rate {
            print!(" @ {:.3} fps", fps);
        }
        println!();
    }
    if let Some(ref audio) = info.audio {
        print!("Audio: {} {}ch", audio.codec_name, audio.channels);
        if let Some(rate) = audio.sample_rate {
            print!(" {} Hz", rate);
        }
        println!();
    }
    if let Some(duration) = info.duration {
        println!("Duration: {:.2}s", duration.as_secs_f64());
    }
    println!("Size: {} bytes", info.file_size);

    let violations = check_compliance(&info, compliance);
    println!();
    if violations.is_empty() {
        println!("✓ Compliant with profile '{}'", profile_name);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("✗ Not compliant with profile '{}':", profile_name);
        for violation in &violations {
            println!("  - {}", violation);
        }
        Ok(exit_code(exit_code_for(ef_core::ErrorKind::ComplianceViolation)))
    }
}

fn list_presets(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = PresetCatalog::from_config(&config);

    println!("Quality presets:");
    for (name, p) in catalog.quality_presets() {
        println!(
            "  {:<12} {} @ {} fps, {} crf {} ({}), {} {}",
            name,
            p.resolution,
            p.frame_rate,
            p.video_codec,
            p.crf,
            p.speed,
            p.audio_codec,
            p.audio_bitrate
        );
    }

    println!("\nCompliance profiles:");
    for (name, p) in catalog.compliance_profiles() {
        let resolutions: Vec<String> = p.resolutions.iter().map(|r| r.to_string()).collect();
        println!(
            "  {:<12} {} {}/{}, {}, max {}s",
            name,
            p.container,
            p.video_codec,
            p.audio_codec,
            resolutions.join(" "),
            p.max_duration_secs
        );
    }

    println!("\nTransitions:");
    for (name, t) in catalog.transitions() {
        println!("  {:<12} {} {:.2}s", name, t.kind, t.duration_secs);
    }

    println!("\nColour grades:");
    for (name, g) in catalog.grades() {
        println!(
            "  {:<12} brightness {:+.2} contrast {:.2} saturation {:.2} gamma {:.2}{}",
            name,
            g.brightness,
            g.contrast,
            g.saturation,
            g.gamma,
            if g.vignette { " vignette" } else { "" }
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn check_tools(config_path: Option<&Path>) -> Result<ExitCode> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let registry = ToolRegistry::discover(&config.tools);
    let tools = registry.check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to produce episodes.");
    }

    Ok(ExitCode::SUCCESS)
}
