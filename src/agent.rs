//! Headless Reflexion 运行时
//!
//! 供 CLI / HTTP 等前端调用：create_llm_from_config 选择补全后端（并按配置施加超时），
//! create_orchestrator 组装 Actor / Evaluator / Reflector，run_task 校验请求后以批量或流式方式运行。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::ReflexionError;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, TimeoutLlmClient};
use crate::reflexion::prompts::{
    load_system_prompt, ACTOR_SYSTEM, EVALUATOR_SYSTEM, REFLECTOR_SYSTEM,
};
use crate::reflexion::{
    Actor, EventSender, Evaluator, Reflector, SystemClock, TaskDefaults, TaskRequest, TaskResult,
    TrialOrchestrator,
};

/// 根据配置与环境变量选择 LLM 后端：DeepSeek > OpenAI > Mock；[llm.timeouts].request > 0 时包装超时
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();
    let use_deepseek =
        provider != "mock" && (has_deepseek_key || (provider == "deepseek" && has_openai_key));
    let use_openai = provider != "mock" && has_openai_key && provider != "deepseek";

    let llm: Arc<dyn LlmClient> = if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider is mock, using Mock LLM");
        Arc::new(MockLlmClient::new())
    };

    if cfg.llm.timeouts.request == 0 {
        tracing::info!("LLM request timeout disabled");
    }
    TimeoutLlmClient::wrap(llm, cfg.llm.timeouts.request)
}

/// 组装编排器：system prompt 可由 config/prompts/{actor,evaluator,reflector}.txt 覆盖
pub fn create_orchestrator(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> TrialOrchestrator {
    let clock = Arc::new(SystemClock);
    let actor = Actor::with_system_prompt(
        llm.clone(),
        clock.clone(),
        load_system_prompt("actor", ACTOR_SYSTEM),
    );
    let evaluator = Evaluator::new(llm.clone())
        .with_temperature(cfg.reflexion.evaluation_temperature)
        .with_system_prompt(load_system_prompt("evaluator", EVALUATOR_SYSTEM));
    let reflector =
        Reflector::with_system_prompt(llm, load_system_prompt("reflector", REFLECTOR_SYSTEM));
    TrialOrchestrator::from_parts(actor, evaluator, reflector, clock)
}

/// 运行一个 TaskRequest：先校验（失败时不会开始任何试验），
/// 请求 stream=true 且提供 event_tx 时逐步推送事件，否则只返回聚合结果。
pub async fn run_task(
    orchestrator: &TrialOrchestrator,
    cfg: &AppConfig,
    request: &TaskRequest,
    event_tx: Option<&EventSender>,
    cancel: &CancellationToken,
) -> Result<TaskResult, ReflexionError> {
    let defaults = TaskDefaults::from(&cfg.reflexion);
    let task = match request.validate(&defaults) {
        Ok(t) => t,
        Err(e) => {
            if let Some(tx) = event_tx.filter(|_| request.streaming()) {
                let _ = tx.send(crate::reflexion::ReflexionEvent::Error { text: e.to_string() });
            }
            return Err(e);
        }
    };
    let tx = event_tx.filter(|_| request.streaming());
    orchestrator.run(&task, tx, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflexion::{ReflexionEvent, TaskType};

    #[tokio::test]
    async fn test_run_task_validation_error_before_any_call() {
        let mock = Arc::new(MockLlmClient::new());
        let cfg = AppConfig::default();
        let orchestrator = create_orchestrator(&cfg, mock.clone());
        let mut request = TaskRequest::new("t", TaskType::General, vec![]);
        request.stream = Some(true);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let err = run_task(&orchestrator, &cfg, &request, Some(&tx), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReflexionError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
        assert!(matches!(rx.try_recv(), Ok(ReflexionEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_run_task_batch_emits_no_events() {
        let mock = Arc::new(MockLlmClient::new());
        let cfg = AppConfig::default();
        let orchestrator = create_orchestrator(&cfg, mock.clone());
        let request = TaskRequest::new("t", TaskType::General, vec!["a".into()]).with_max_trials(2);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let result = run_task(&orchestrator, &cfg, &request, Some(&tx), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.trials.len(), 2);
        assert!(rx.try_recv().is_err());
        // 2 次 actor + 2 次 evaluator + 1 次 reflector
        assert_eq!(mock.call_count(), 5);
    }

    #[test]
    fn test_mock_provider_selected() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.llm.timeouts.request = 0;
        let _llm = create_llm_from_config(&cfg);
    }
}
