//! sdgen - Stable Diffusion client CLI.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sdgen::cli::Cli;
use sdgen::config::{self, Config};
use sdgen::context::ServiceContext;
use sdgen::error::GenError;
use sdgen::output::save_image_with_timestamp;
use sdgen::params::{validate_guidance_scale, validate_steps};
use sdgen::ports::{GenerationRequest, ImageGenerator};
use sdgen::session::{Command, Form, Session};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "sdgen=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), GenError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(GenError::Config)?;
    debug!(path = %config_path.display(), "config loaded");

    // Validate parameters before touching any backend
    if let Some(steps) = cli.steps {
        validate_steps(steps).map_err(GenError::InvalidArgument)?;
    }
    if let Some(scale) = cli.guidance_scale {
        validate_guidance_scale(scale).map_err(GenError::InvalidArgument)?;
    }

    let output_dir = PathBuf::from(cli.resolve_output_dir(&config));
    let mode = if cli.interactive {
        Mode::Interactive(cli.build_form(&config).map_err(GenError::InvalidArgument)?)
    } else {
        Mode::Once(cli.build_request(&config).map_err(GenError::InvalidArgument)?)
    };

    // Live / recording / replaying
    let replay_path = std::env::var("SDGEN_REPLAY").ok();
    let is_recording = std::env::var("SDGEN_REC").is_ok_and(|v| v == "true" || v == "1");

    let (ctx, recording_session) = if let Some(ref cassette_path) = replay_path {
        debug!(cassette = %cassette_path, "replaying");
        (ServiceContext::replaying(Path::new(cassette_path))?, None)
    } else {
        let live = ServiceContext::live(&config, cli.base_url.as_deref());
        if is_recording {
            debug!("recording mode enabled");
            let (ctx, session) = live.recording();
            (ctx, Some(session))
        } else {
            (live, None)
        }
    };

    // A recording generator shares the recorder; it must be gone before finish()
    let ServiceContext { generator } = ctx;
    let result = match mode {
        Mode::Once(request) => {
            let result = generate_once(generator.as_ref(), &request, &output_dir).await;
            drop(generator);
            result
        }
        Mode::Interactive(form) => {
            run_interactive(generator, form, cli.prompt.as_deref(), &output_dir).await
        }
    };

    if let Some(session) = recording_session {
        match session.finish() {
            Ok(Some(path)) => eprintln!("Cassette saved: {}", path.display()),
            Ok(None) => eprintln!("Nothing recorded; no cassette written"),
            Err(e) => eprintln!("Warning: failed to save cassette: {e}"),
        }
    }

    result
}

/// What the binary was asked to do, resolved before any backend is built.
enum Mode {
    Once(GenerationRequest),
    Interactive(Form),
}

async fn generate_once(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    output_dir: &Path,
) -> Result<(), GenError> {
    let generated = generator.generate(request).await?;
    debug!(width = generated.width(), height = generated.height(), "image decoded");
    let artifact = save_image_with_timestamp(&generated.image, &request.prompt, output_dir)?;
    println!("Image saved as: {}", artifact.filepath.display());
    Ok(())
}

async fn run_interactive(
    generator: Box<dyn ImageGenerator>,
    mut form: Form,
    first_prompt: Option<&str>,
    output_dir: &Path,
) -> Result<(), GenError> {
    let session = Session::new(generator, output_dir);

    println!("Stable Diffusion - enter a prompt, or :steps N, :guidance X, :negative TEXT, :show, :quit");
    if let Some(prompt) = first_prompt {
        submit(&session, &form, prompt).await;
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else { break };

        match form.apply(&line?) {
            Ok(Command::Generate(prompt)) => submit(&session, &form, &prompt).await,
            Ok(Command::Updated(msg)) => println!("{msg}"),
            Ok(Command::Show) => println!(
                "steps = {}, guidance scale = {}, negative prompt = '{}'",
                form.steps, form.guidance_scale, form.negative_prompt
            ),
            Ok(Command::Quit) => break,
            Ok(Command::Empty) => {}
            Err(msg) => println!("{msg}"),
        }
    }
    Ok(())
}

async fn submit(session: &Session, form: &Form, prompt: &str) {
    let outcome = session.submit(&form.request(prompt)).await;
    println!("{}", outcome.message);
    if outcome.is_success() {
        println!("({}x{})", outcome.image.width(), outcome.image.height());
    }
}
