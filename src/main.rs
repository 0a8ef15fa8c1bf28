//! Bee Reflexion 命令行
//!
//! 入口：初始化日志、加载配置、创建 LLM 与编排器，运行一个任务。
//! 批量模式打印 TaskResult（JSON）；--stream 时每行打印一个事件（JSON Lines）。

use std::path::PathBuf;

use anyhow::Context;
use bee_reflexion::{
    agent::{create_llm_from_config, create_orchestrator, run_task},
    config::{load_config, AppConfig},
    llm::LlmClient,
    observability,
    reflexion::{ReflexionEvent, TaskRequest, TaskType},
};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "bee-reflexion", version, about = "Run a Reflexion trial loop on a task")]
struct Args {
    /// 任务描述
    task: String,

    /// decision | reasoning | programming | general
    #[arg(long = "type", default_value = "general")]
    task_type: TaskType,

    /// 最大试验次数（默认取配置）
    #[arg(long)]
    trials: Option<i64>,

    /// 记忆窗口（默认取配置）
    #[arg(long)]
    window: Option<i64>,

    /// 评估标准，逗号分隔，顺序有意义
    #[arg(long, value_delimiter = ',', default_value = "correctness,completeness,clarity")]
    criteria: Vec<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    model: Option<String>,

    /// 逐步输出进度事件
    #[arg(long)]
    stream: bool,

    /// 额外的配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = Args::parse();

    let cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let llm = create_llm_from_config(&cfg);
    let orchestrator = create_orchestrator(&cfg, llm.clone());

    let request = TaskRequest {
        task: args.task,
        task_type: args.task_type,
        max_trials: args.trials,
        evaluation_criteria: args.criteria,
        memory_window: args.window,
        temperature: args.temperature,
        model_name: args.model,
        stream: Some(args.stream),
    };

    // Ctrl-C：不再发起新的补全调用，也不再推送事件
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    if !args.stream {
        let result = run_task(&orchestrator, &cfg, &request, None, &cancel).await;
        log_token_usage(llm.as_ref());
        let result = result.context("Reflexion run failed")?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ReflexionEvent>();
    let printer = async move {
        while let Some(ev) = rx.recv().await {
            match serde_json::to_string(&ev) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!("Failed to serialize event: {}", e),
            }
            if ev.is_terminal() {
                break;
            }
        }
    };
    let (result, _) = tokio::join!(
        run_task(&orchestrator, &cfg, &request, Some(&tx), &cancel),
        printer
    );
    log_token_usage(llm.as_ref());
    result.context("Reflexion run failed")?;
    Ok(())
}

fn log_token_usage(llm: &dyn LlmClient) {
    let (prompt, completion, total) = llm.token_usage();
    tracing::info!(prompt, completion, total, "LLM token usage");
}
