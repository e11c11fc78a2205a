use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use tracing::info;

mod actions;
mod config;
mod flow;
mod llm;
mod tasks;
mod tools;
mod utils;

use actions::{
    analyze_face_action, analyze_product_action, get_explanation_action, iterate_look_action,
    recognize_product_action, ActionResult,
};
use llm::GeminiClient;
use utils::data_uri::file_to_data_uri;
use utils::logging::init_logging;

fn usage() -> &'static str {
    "Usage:\n  glamtutor analyze-face --image <path>\n  glamtutor recognize-product --image <path>\n  glamtutor iterate-look --look <text> --feedback <text>\n  glamtutor explain --topic <text> [--context <text>]\n  glamtutor analyze-product --image <path>"
}

#[derive(Debug)]
enum Command {
    AnalyzeFace { image: PathBuf },
    RecognizeProduct { image: PathBuf },
    IterateLook { look: String, feedback: String },
    Explain { topic: String, context: Option<String> },
    AnalyzeProduct { image: PathBuf },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let subcommand = args
        .get(1)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing subcommand"))?;

    let mut image: Option<PathBuf> = None;
    let mut look: Option<String> = None;
    let mut feedback: Option<String> = None;
    let mut topic: Option<String> = None;
    let mut context: Option<String> = None;

    let mut index = 2;
    while index < args.len() {
        let flag = args[index].as_str();
        index += 1;
        let value = args
            .get(index)
            .ok_or_else(|| anyhow!("Missing value for {}", flag))?;
        match flag {
            "--image" => image = Some(PathBuf::from(value)),
            "--look" => look = Some(value.clone()),
            "--feedback" => feedback = Some(value.clone()),
            "--topic" => topic = Some(value.clone()),
            "--context" => context = Some(value.clone()),
            other => return Err(anyhow!("Unknown flag {}", other)),
        }
        index += 1;
    }

    let require_image = |image: Option<PathBuf>| image.ok_or_else(|| anyhow!("--image is required"));
    match subcommand {
        "analyze-face" => Ok(Command::AnalyzeFace {
            image: require_image(image)?,
        }),
        "recognize-product" => Ok(Command::RecognizeProduct {
            image: require_image(image)?,
        }),
        "iterate-look" => Ok(Command::IterateLook {
            look: look.ok_or_else(|| anyhow!("--look is required"))?,
            feedback: feedback.ok_or_else(|| anyhow!("--feedback is required"))?,
        }),
        "explain" => Ok(Command::Explain {
            topic: topic.ok_or_else(|| anyhow!("--topic is required"))?,
            context,
        }),
        "analyze-product" => Ok(Command::AnalyzeProduct {
            image: require_image(image)?,
        }),
        other => Err(anyhow!("Unknown subcommand '{}'", other)),
    }
}

async fn run(command: Command) -> Result<ActionResult> {
    let registry = tasks::build_registry()?;
    let model = GeminiClient::new();
    info!(tasks = ?registry.task_names(), "flow registry ready");

    let result = match command {
        Command::AnalyzeFace { image } => {
            let data_uri = file_to_data_uri(&image)?;
            analyze_face_action(&registry, &model, &data_uri).await
        }
        Command::RecognizeProduct { image } => {
            let data_uri = file_to_data_uri(&image)?;
            recognize_product_action(&registry, &model, &data_uri).await
        }
        Command::IterateLook { look, feedback } => {
            iterate_look_action(&registry, &model, &look, &feedback).await
        }
        Command::Explain { topic, context } => {
            get_explanation_action(&registry, &model, &topic, context.as_deref()).await
        }
        Command::AnalyzeProduct { image } => {
            let data_uri = file_to_data_uri(&image)?;
            analyze_product_action(&registry, &model, &data_uri).await
        }
    };

    Ok(result)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let _guards = init_logging();

    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}\n\n{}", usage());
            return ExitCode::FAILURE;
        }
    };

    match run(command).await {
        Ok(result) => {
            let rendered = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|_| "{\"success\":false,\"error\":\"serialization failed\"}".to_string());
            println!("{rendered}");
            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
