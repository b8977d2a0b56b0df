use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use knowledge_ranker::agent::hf_tokenizer::HfTokenizerVectorizer;
use knowledge_ranker::agent::{
    AgentArgs, BaselineFactory, Dictionary, KnowledgeRankerAgent, Observation, TextVectorizer,
};
use knowledge_ranker::core::config::{AppPaths, ConfigService};
use knowledge_ranker::core::logging;
use knowledge_ranker::data::personalized_dialog;

/// Dataset fetcher and knowledge-grounded ranking agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config.yml, logs and (by default) datasets
    #[arg(long, env = "KNOWLEDGE_RANKER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and unpack the personalized dialog dataset
    Build {
        /// Base directory datasets are built into
        #[arg(long)]
        datapath: Option<PathBuf>,
    },
    /// Rank candidates for JSONL observations read from a file or stdin
    Rank(RankArgs),
}

#[derive(Args, Debug)]
struct RankArgs {
    /// JSONL file with one observation per line; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Dictionary file (token<TAB>count per line)
    #[arg(long, conflicts_with = "tokenizer")]
    dict_file: Option<PathBuf>,

    /// HuggingFace tokenizer.json
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    #[arg(long, default_value = "[CLS]")]
    start_token: String,

    #[arg(long, default_value = "[SEP]")]
    end_token: String,

    #[command(flatten)]
    agent: AgentArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.data_dir.clone() {
        Some(dir) => AppPaths::from_data_dir(dir),
        None => AppPaths::new(),
    };
    logging::init(&paths);
    let config_service = ConfigService::new(Arc::new(paths));

    match cli.command {
        Command::Build { datapath } => {
            let config = config_service
                .load(&serde_json::json!({}))
                .context("Failed to load configuration")?;
            let mut opt = config_service.data_options(&config);
            if let Some(datapath) = datapath {
                opt.datapath = datapath;
            }
            personalized_dialog::build(&opt)
                .await
                .with_context(|| format!("Failed to build dataset in {}", opt.datapath.display()))?;
            tracing::info!(datapath = %opt.datapath.display(), "dataset ready");
        }
        Command::Rank(args) => {
            let config = config_service
                .load(&args.agent.to_overrides())
                .context("Failed to load configuration")?;
            run_rank(args, config.agent)?;
        }
    }

    Ok(())
}

fn run_rank(
    args: RankArgs,
    config: knowledge_ranker::core::config::AgentConfig,
) -> anyhow::Result<()> {
    let reader = open_input(args.input.as_ref())?;

    // Without a dictionary or tokenizer the vocabulary comes from the input
    // itself, so only that case reads everything up front.
    let (vectorizer, observations): (Arc<dyn TextVectorizer>, Observations) =
        if let Some(path) = &args.tokenizer {
            let vectorizer =
                HfTokenizerVectorizer::from_file(path, &args.start_token, &args.end_token)?;
            (
                Arc::new(vectorizer) as Arc<dyn TextVectorizer>,
                Box::new(parse_observations(reader)) as Observations,
            )
        } else if let Some(path) = &args.dict_file {
            (
                Arc::new(Dictionary::load(path)?) as Arc<dyn TextVectorizer>,
                Box::new(parse_observations(reader)) as Observations,
            )
        } else {
            let buffered = parse_observations(reader).collect::<anyhow::Result<Vec<_>>>()?;
            tracing::info!(count = buffered.len(), "observations loaded");
            let dict = dictionary_from_observations(&buffered);
            (
                Arc::new(dict) as Arc<dyn TextVectorizer>,
                Box::new(buffered.into_iter().map(Ok::<_, anyhow::Error>)) as Observations,
            )
        };

    let factory = BaselineFactory::new(vectorizer);
    let mut agent = KnowledgeRankerAgent::new(config, None, &factory)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut ranked = 0usize;
    for observation in observations {
        agent.observe(observation?)?;
        let reply = agent.act()?;
        serde_json::to_writer(&mut out, &reply)?;
        out.write_all(b"\n")?;
        ranked += 1;
    }
    out.flush()?;
    tracing::info!(count = ranked, "observations ranked");
    Ok(())
}

type Observations = Box<dyn Iterator<Item = anyhow::Result<Observation>>>;

fn open_input(input: Option<&PathBuf>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match input {
        Some(path) => Box::new(io::BufReader::new(
            fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::BufReader::new(io::stdin())),
    })
}

/// One observation per non-blank JSONL line, parsed lazily.
fn parse_observations(
    reader: Box<dyn BufRead>,
) -> impl Iterator<Item = anyhow::Result<Observation>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(lineno, line)| match line {
            Err(err) => Some(Err(err.into())),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                serde_json::from_str::<Observation>(&line)
                    .with_context(|| format!("Invalid observation on line {}", lineno + 1)),
            ),
        })
}

fn dictionary_from_observations(observations: &[Observation]) -> Dictionary {
    let mut dict = Dictionary::new();
    for obs in observations {
        let texts = obs
            .text
            .iter()
            .chain(obs.knowledge.iter())
            .chain(obs.checked_sentence.iter())
            .chain(obs.labels.iter().flatten())
            .chain(obs.eval_labels.iter().flatten())
            .chain(obs.label_candidates.iter().flatten());
        for text in texts {
            dict.add_text(text);
        }
    }
    dict.add_text(knowledge_ranker::agent::history::P1_TOKEN);
    dict.add_text(knowledge_ranker::agent::history::P2_TOKEN);
    tracing::info!(size = dict.len(), "dictionary built from input");
    dict
}
