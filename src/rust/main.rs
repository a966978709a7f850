use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use emotive::classifier::DEFAULT_MAX_SEQUENCE_LENGTH;
use emotive::models::{DEFAULT_REPO_ID, DEFAULT_REVISION};
use emotive::{
    EmotionClassifier, Endpoint, EndpointConfig, HubModel, LazyClassifier, ModelManager,
    ModelSource, RuntimeConfig,
};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the emotion classification endpoint over HTTP
    Serve {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Classify one text and print every label score
    Classify {
        #[command(flatten)]
        model: ModelArgs,
        /// Text to classify
        text: String,
    },
    /// Download and verify the hub model into the local cache
    Download {
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Fetch from the Hugging Face hub into the local cache
    Hub,
    /// Load from --model-dir
    Local,
}

#[derive(clap::Args, Debug)]
struct ModelArgs {
    /// Where the model files come from
    #[arg(long, value_enum, env = "EMOTIVE_SOURCE", default_value_t = SourceKind::Hub)]
    source: SourceKind,

    /// Directory holding model.onnx, tokenizer.json and config.json (local source)
    #[arg(long, env = "EMOTIVE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Hub repository id (hub source)
    #[arg(long, env = "EMOTIVE_REPO_ID", default_value = DEFAULT_REPO_ID)]
    repo_id: String,

    /// Hub revision: branch, tag or commit
    #[arg(long, env = "EMOTIVE_REVISION", default_value = DEFAULT_REVISION)]
    revision: String,

    /// Path of the ONNX export inside the hub repository
    #[arg(long, env = "EMOTIVE_MODEL_FILE", default_value = "model.onnx")]
    model_file: String,

    /// Cache root for downloaded models
    #[arg(long, env = "EMOTIVE_CACHE")]
    cache_dir: Option<PathBuf>,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Tokens kept per input before truncation
    #[arg(long, default_value_t = DEFAULT_MAX_SEQUENCE_LENGTH)]
    max_sequence_length: usize,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,

    /// ONNX Runtime inter-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    inter_threads: usize,
}

#[derive(clap::Args, Debug)]
struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "EMOTIVE_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind
    #[arg(long, env = "EMOTIVE_PORT", default_value_t = 8000)]
    port: u16,

    /// Load the model on the first request instead of at startup
    #[arg(long, env = "EMOTIVE_LAZY")]
    lazy: bool,

    /// Per-request timeout in seconds, queueing included
    #[arg(long, env = "EMOTIVE_TIMEOUT_SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Maximum concurrent inferences (defaults to available parallelism)
    #[arg(long, env = "EMOTIVE_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "EMOTIVE_MAX_BODY_BYTES", default_value_t = emotive::endpoint::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

impl ModelArgs {
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::default().with_threads(self.inter_threads, self.intra_threads)
    }

    fn hub_model(&self) -> HubModel {
        HubModel::new(self.repo_id.clone())
            .with_revision(self.revision.clone())
            .with_model_file(self.model_file.clone())
    }

    fn manager(&self) -> anyhow::Result<ModelManager> {
        let manager = match &self.cache_dir {
            Some(dir) => ModelManager::new(dir.join("models")),
            None => ModelManager::new_default(),
        };
        manager.context("failed to prepare the model cache directory")
    }

    fn source(&self) -> anyhow::Result<ModelSource> {
        match self.source {
            SourceKind::Hub => Ok(ModelSource::Hub {
                model: self.hub_model(),
                manager: self.manager()?,
                fresh: self.fresh,
            }),
            SourceKind::Local => match &self.model_dir {
                Some(dir) => Ok(ModelSource::Local { dir: dir.clone() }),
                None => bail!("--model-dir is required with --source local"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    emotive::init_logger();
    let args = Args::parse();

    match args.command {
        Command::Serve { model, server } => serve(model, server).await,
        Command::Classify { model, text } => classify(model, &text).await,
        Command::Download { model } => download(model).await,
    }
}

async fn serve(model: ModelArgs, server: ServerArgs) -> anyhow::Result<()> {
    let source = model.source()?;
    let runtime_config = model.runtime_config();

    let classifier: Arc<dyn EmotionClassifier> = if server.lazy {
        info!("Lazy loading enabled; {} loads on the first request", source.describe());
        Arc::new(LazyClassifier::new(source, runtime_config, model.max_sequence_length))
    } else {
        let start_time = Instant::now();
        info!("Loading classifier from {}...", source.describe());
        let classifier = source
            .load(&runtime_config, model.max_sequence_length)
            .await
            .context("failed to load the classifier")?;
        info!(
            "=== Classifier loaded (took {:.2?}): {:?} ===",
            start_time.elapsed(),
            classifier.info().labels
        );
        Arc::new(classifier)
    };

    let mut config = EndpointConfig::default()
        .with_request_timeout(Duration::from_secs(server.timeout_secs))
        .with_max_body_bytes(server.max_body_bytes);
    if let Some(max_concurrency) = server.max_concurrency {
        config = config.with_max_concurrency(max_concurrency);
    }
    info!(
        "Request timeout {:?}, up to {} concurrent inferences",
        config.request_timeout, config.max_concurrency
    );

    let addr = SocketAddr::new(server.host, server.port);
    emotive::serve(Endpoint::new(classifier, config), addr)
        .await
        .context("server error")
}

async fn classify(model: ModelArgs, text: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        bail!("text must not be empty");
    }
    let source = model.source()?;
    let classifier = source
        .load(&model.runtime_config(), model.max_sequence_length)
        .await
        .context("failed to load the classifier")?;

    let start_time = Instant::now();
    let scores = classifier.classify(text).await?;
    info!("Classified in {:.2?}", start_time.elapsed());

    println!("\nResults for: {}", text);
    for score in scores {
        println!("  {}: {:.1}%", score.label, score.score * 100.0);
    }
    Ok(())
}

async fn download(model: ModelArgs) -> anyhow::Result<()> {
    if model.source != SourceKind::Hub {
        bail!("download only applies to --source hub");
    }
    let manager = model.manager()?;
    let hub_model = model.hub_model();

    if model.fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(&hub_model).await?;
    }
    manager.ensure_model_downloaded(&hub_model).await?;

    println!("{}", manager.model_dir(&hub_model).display());
    Ok(())
}
