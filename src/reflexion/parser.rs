//! ResponseParser：把补全文本解析为结构化记录
//!
//! 逐行扫描，识别 `NAME:` 段头，累积内容直到下一个段头或文本结束。
//! 所有函数都不会失败：缺失的字段用固定默认值替代，并通过 degraded 标记暴露出来。
//!
//! 三种文法：
//! - 动作：`ACTION_n:` / `REASONING_n:` 成对出现
//! - 评估：`SCORE:`、`SUCCESS:`、每条标准一行 `- <criterion>: <int> - <feedback>`、`FEEDBACK:`
//! - 反思：`INSIGHTS`、`IMPROVEMENTS`、`ACTION_PLAN`、`LEARNING_POINTS` 四段

/// 评估缺失分数时的默认总分
pub const DEFAULT_REWARD_SCORE: u32 = 50;
/// 评估缺失反馈时的默认文本
pub const DEFAULT_FEEDBACK: &str = "needs improvement";
/// 反思缺失 ACTION_PLAN 时的默认计划
pub const DEFAULT_ACTION_PLAN: &str = "continue trying to improve";

const SCORE: &str = "SCORE";
const SUCCESS: &str = "SUCCESS";
const FEEDBACK: &str = "FEEDBACK";
const EVALUATION_HEADERS: &[&str] = &[SCORE, SUCCESS, FEEDBACK];

const INSIGHTS: &str = "INSIGHTS";
const IMPROVEMENTS: &str = "IMPROVEMENTS";
const ACTION_PLAN: &str = "ACTION_PLAN";
const LEARNING_POINTS: &str = "LEARNING_POINTS";
const REFLECTION_HEADERS: &[&str] = &[INSIGHTS, IMPROVEMENTS, ACTION_PLAN, LEARNING_POINTS];

/// 段头的规范化键：去掉 markdown 修饰（#、*、>），空格转下划线，大写
fn header_key(line: &str) -> Option<(String, &str)> {
    let trimmed = line
        .trim()
        .trim_start_matches(|c: char| c == '#' || c == '*' || c == '>' || c.is_whitespace());
    let (key, rest) = match trimmed.find(':') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => (trimmed, ""),
    };
    let key = key.trim().trim_matches('*').trim();
    if key.is_empty() {
        return None;
    }
    let key = key
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase();
    let rest = rest.trim().trim_start_matches('*').trim();
    Some((key, rest))
}

/// 若该行是 names 中某个段头，返回 (段名, 冒号后的内容)
pub fn match_header<'a>(line: &'a str, names: &[&'static str]) -> Option<(&'static str, &'a str)> {
    let (key, rest) = header_key(line)?;
    names.iter().find(|n| **n == key).map(|n| (*n, rest))
}

/// 带序号的段头，如 `ACTION_2:` → (2, 内容)
fn match_indexed_header<'a>(line: &'a str, prefix: &str) -> Option<(u32, &'a str)> {
    let (key, rest) = header_key(line)?;
    let idx = key.strip_prefix(prefix)?.strip_prefix('_')?;
    if idx.is_empty() || !idx.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    idx.parse().ok().map(|n| (n, rest))
}

/// 读取开头的整数（"85/100" → 85），返回 (值, 剩余部分)
fn leading_int(s: &str) -> Option<(u32, &str)> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok().map(|n| (n, &s[end..]))
}

/// 列表项前缀：`-`、`•`、`* `、`1.`、`1)`
fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('•')) {
        return Some(rest.trim());
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return Some(rest.trim());
    }
    let digits = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(0);
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(r) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(r.trim());
        }
    }
    None
}

/// 把一段文本拆成列表项：每个列表项前缀开启新项，非列表行续接上一项，空行丢弃
pub fn split_bullets(lines: &[&str]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match strip_bullet(trimmed) {
            Some(item) if !item.is_empty() => items.push(item.to_string()),
            Some(_) => {}
            None => match items.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(trimmed);
                }
                None => items.push(trimmed.to_string()),
            },
        }
    }
    items
}

// ---------------------------------------------------------------------------
// 动作
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub index: u32,
    pub content: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Action,
    Reasoning,
}

struct Segment {
    kind: SegmentKind,
    index: u32,
    body: Vec<String>,
    open: bool,
}

impl Segment {
    fn text(&self) -> String {
        self.body.join("\n").trim().to_string()
    }
}

/// 解析 `ACTION_n` / `REASONING_n` 对，保持出现顺序。
///
/// 只有紧跟在 `ACTION_n` 之后、序号相同的 `REASONING_n` 才构成一对；正文可以跨行，遇到空行或下一个段头结束。
pub fn parse_actions(text: &str) -> Vec<ParsedAction> {
    let mut segments: Vec<Segment> = Vec::new();
    for line in text.lines() {
        let header = match_indexed_header(line, "ACTION")
            .map(|(i, r)| (SegmentKind::Action, i, r))
            .or_else(|| {
                match_indexed_header(line, "REASONING").map(|(i, r)| (SegmentKind::Reasoning, i, r))
            });
        match header {
            Some((kind, index, rest)) => {
                let mut body = Vec::new();
                if !rest.is_empty() {
                    body.push(rest.to_string());
                }
                segments.push(Segment {
                    kind,
                    index,
                    body,
                    open: true,
                });
            }
            None => {
                let Some(seg) = segments.last_mut() else {
                    continue;
                };
                if line.trim().is_empty() {
                    // 段头与正文之间的空行不结束该段
                    if !seg.body.is_empty() {
                        seg.open = false;
                    }
                } else if seg.open {
                    seg.body.push(line.trim().to_string());
                }
            }
        }
    }

    let mut actions = Vec::new();
    let mut iter = segments.iter().peekable();
    while let Some(seg) = iter.next() {
        if seg.kind != SegmentKind::Action {
            continue;
        }
        let Some(next) = iter.peek() else {
            break;
        };
        if next.kind == SegmentKind::Reasoning && next.index == seg.index {
            let content = seg.text();
            let reasoning = next.text();
            iter.next();
            if !content.is_empty() {
                actions.push(ParsedAction {
                    index: seg.index,
                    content,
                    reasoning,
                });
            }
        }
    }
    actions
}

// ---------------------------------------------------------------------------
// 评估
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCriterion {
    pub criterion: String,
    pub score: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvaluation {
    pub reward_score: u32,
    pub success: bool,
    pub criteria_scores: Vec<ParsedCriterion>,
    pub overall_feedback: String,
    /// 任一字段使用了默认值
    pub degraded: bool,
}

/// 每条标准缺失时的默认分：floor(50 / 标准数)
pub fn default_criterion_score(count: usize) -> u32 {
    if count == 0 {
        return 0;
    }
    DEFAULT_REWARD_SCORE / count as u32
}

/// `- <criterion>: <int> - <feedback>`，按标准原文精确匹配（允许 `**criterion**` 加粗）
fn match_criterion_line(content: &str, criterion: &str) -> Option<(u32, String)> {
    let rest = content.trim_start_matches('*').strip_prefix(criterion)?;
    let rest = rest.trim_start_matches('*').trim_start().strip_prefix(':')?;
    let (score, rest) = leading_int(rest)?;
    // "8/10" 之类的分母忽略
    let rest = match rest.strip_prefix('/') {
        Some(r) => leading_int(r).map(|(_, r)| r).unwrap_or(r),
        None => rest,
    };
    let feedback = rest
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '–' || c == '—' || c == ':')
        .trim();
    Some((score, feedback.to_string()))
}

/// 解析评估块；criteria_scores 与传入的 criteria 顺序一一对应
pub fn parse_evaluation(text: &str, criteria: &[String]) -> ParsedEvaluation {
    let mut reward: Option<u32> = None;
    let mut success: Option<bool> = None;
    let mut found: Vec<Option<(u32, String)>> = vec![None; criteria.len()];
    let mut feedback_lines: Vec<String> = Vec::new();
    let mut in_feedback = false;

    for line in text.lines() {
        if let Some(content) = strip_bullet(line) {
            let hit = criteria.iter().enumerate().find_map(|(i, c)| {
                if found[i].is_some() {
                    return None;
                }
                match_criterion_line(content, c).map(|m| (i, m))
            });
            if let Some((i, m)) = hit {
                found[i] = Some(m);
                in_feedback = false;
                continue;
            }
        }

        match match_header(line, EVALUATION_HEADERS) {
            Some((SCORE, rest)) => {
                in_feedback = false;
                if reward.is_none() {
                    reward = leading_int(rest).map(|(n, _)| n.min(crate::reflexion::types::MAX_SCORE));
                }
            }
            Some((SUCCESS, rest)) => {
                in_feedback = false;
                if success.is_none() {
                    let v = rest.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
                    success = match v.as_str() {
                        "true" | "yes" => Some(true),
                        "false" | "no" => Some(false),
                        _ => None,
                    };
                }
            }
            Some((_, rest)) => {
                in_feedback = true;
                feedback_lines.clear();
                if !rest.is_empty() {
                    feedback_lines.push(rest.to_string());
                }
            }
            None => {
                if in_feedback && !line.trim().is_empty() {
                    feedback_lines.push(line.trim().to_string());
                }
            }
        }
    }

    let mut degraded = reward.is_none() || success.is_none();
    let fallback_score = default_criterion_score(criteria.len());
    let criteria_scores = criteria
        .iter()
        .zip(found)
        .map(|(criterion, hit)| {
            let (score, feedback) = match hit {
                Some((score, feedback)) if !feedback.is_empty() => (score, feedback),
                Some((score, _)) => {
                    degraded = true;
                    (score, DEFAULT_FEEDBACK.to_string())
                }
                None => {
                    degraded = true;
                    (fallback_score, DEFAULT_FEEDBACK.to_string())
                }
            };
            ParsedCriterion {
                criterion: criterion.clone(),
                score,
                feedback,
            }
        })
        .collect();

    let overall_feedback = feedback_lines.join("\n").trim().to_string();
    let overall_feedback = if overall_feedback.is_empty() {
        degraded = true;
        DEFAULT_FEEDBACK.to_string()
    } else {
        overall_feedback
    };

    ParsedEvaluation {
        reward_score: reward.unwrap_or(DEFAULT_REWARD_SCORE),
        success: success.unwrap_or(false),
        criteria_scores,
        overall_feedback,
        degraded,
    }
}

// ---------------------------------------------------------------------------
// 反思
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReflection {
    pub insights: Vec<String>,
    pub improvements: Vec<String>,
    pub action_plan: String,
    pub learning_points: Vec<String>,
    /// 任一段缺失或 ACTION_PLAN 为空
    pub degraded: bool,
}

fn section_list(lines: Option<Vec<&str>>) -> Vec<String> {
    lines.map(|l| split_bullets(&l)).unwrap_or_default()
}

/// 解析四段反思；每段到下一个段头或文本结束为止
pub fn parse_reflection(text: &str) -> ParsedReflection {
    let mut sections: [Option<Vec<&str>>; 4] = Default::default();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some((name, rest)) = match_header(line, REFLECTION_HEADERS) {
            let idx = REFLECTION_HEADERS
                .iter()
                .position(|h| *h == name)
                .unwrap_or_default();
            let body = sections[idx].get_or_insert_with(Vec::new);
            if !rest.is_empty() {
                body.push(rest);
            }
            current = Some(idx);
            continue;
        }
        if let Some(idx) = current {
            if let Some(body) = sections[idx].as_mut() {
                body.push(line);
            }
        }
    }

    let mut degraded = sections.iter().any(Option::is_none);
    let [insights, improvements, plan, learning] = sections;

    let action_plan = plan
        .map(|l| {
            l.iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    let action_plan = if action_plan.is_empty() {
        degraded = true;
        DEFAULT_ACTION_PLAN.to_string()
    } else {
        action_plan
    };

    ParsedReflection {
        insights: section_list(insights),
        improvements: section_list(improvements),
        action_plan,
        learning_points: section_list(learning),
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_header_tolerates_markdown() {
        assert_eq!(
            match_header("**SCORE:** 85", EVALUATION_HEADERS),
            Some((SCORE, "85"))
        );
        assert_eq!(
            match_header("## Action Plan:", REFLECTION_HEADERS),
            Some((ACTION_PLAN, ""))
        );
        assert_eq!(match_header("INSIGHTS", REFLECTION_HEADERS), Some((INSIGHTS, "")));
        assert_eq!(match_header("Scoring rubric: x", EVALUATION_HEADERS), None);
    }

    #[test]
    fn test_parse_two_action_pairs_in_order() {
        let text = "Let me think.\n\
                    ACTION_1: Read the input\n\
                    REASONING_1: Need to know the data\n\
                    \n\
                    ACTION_2: Sort it\n\
                    with quicksort\n\
                    REASONING_2: Fast on average\n";
        let actions = parse_actions(text);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].content, "Read the input");
        assert_eq!(actions[0].reasoning, "Need to know the data");
        assert_eq!(actions[1].content, "Sort it\nwith quicksort");
        assert_eq!(actions[1].index, 2);
    }

    #[test]
    fn test_parse_actions_requires_matching_reasoning() {
        let text = "ACTION_1: orphan\nREASONING_2: mismatched\nACTION_3: ok\nREASONING_3: because";
        let actions = parse_actions(text);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].content, "ok");
    }

    #[test]
    fn test_parse_actions_none() {
        assert!(parse_actions("I will just answer directly.").is_empty());
        assert!(parse_actions("").is_empty());
    }

    #[test]
    fn test_parse_evaluation_full() {
        let text = "SCORE: 85\nSUCCESS: true\n- A: 8 - good\n- B: 9 - great\nFEEDBACK: nice job";
        let eval = parse_evaluation(text, &criteria(&["A", "B"]));
        assert_eq!(eval.reward_score, 85);
        assert!(eval.success);
        assert_eq!(
            eval.criteria_scores,
            vec![
                ParsedCriterion {
                    criterion: "A".into(),
                    score: 8,
                    feedback: "good".into()
                },
                ParsedCriterion {
                    criterion: "B".into(),
                    score: 9,
                    feedback: "great".into()
                },
            ]
        );
        assert_eq!(eval.overall_feedback, "nice job");
        assert!(!eval.degraded);
    }

    #[test]
    fn test_parse_evaluation_fallback() {
        let eval = parse_evaluation("The answer looks fine to me.", &criteria(&["A", "B"]));
        assert_eq!(eval.reward_score, 50);
        assert!(!eval.success);
        assert_eq!(eval.criteria_scores.len(), 2);
        for (c, name) in eval.criteria_scores.iter().zip(["A", "B"]) {
            assert_eq!(c.criterion, name);
            assert_eq!(c.score, 25);
            assert_eq!(c.feedback, "needs improvement");
        }
        assert!(eval.degraded);
    }

    #[test]
    fn test_parse_evaluation_orders_by_criteria_not_text() {
        let text = "SCORE: 60/100\nSUCCESS: false\n- clarity: 7/10 - ok\n- accuracy: 5 - wrong total\nFEEDBACK: fix the sum";
        let eval = parse_evaluation(text, &criteria(&["accuracy", "clarity", "style"]));
        assert_eq!(eval.reward_score, 60);
        assert_eq!(eval.criteria_scores[0].score, 5);
        assert_eq!(eval.criteria_scores[0].feedback, "wrong total");
        assert_eq!(eval.criteria_scores[1].score, 7);
        assert_eq!(eval.criteria_scores[1].feedback, "ok");
        assert_eq!(eval.criteria_scores[2].score, 16);
        assert!(eval.degraded);
    }

    #[test]
    fn test_parse_evaluation_exact_criterion_match() {
        let text = "SCORE: 70\nSUCCESS: false\n- AB: 3 - x\nFEEDBACK: y";
        let eval = parse_evaluation(text, &criteria(&["A"]));
        assert_eq!(eval.criteria_scores[0].score, 50);
    }

    #[test]
    fn test_parse_evaluation_clamps_score() {
        let eval = parse_evaluation("SCORE: 250\nSUCCESS: yes", &criteria(&["A"]));
        assert_eq!(eval.reward_score, 100);
        assert!(eval.success);
    }

    #[test]
    fn test_parse_evaluation_multiline_feedback() {
        let text = "SCORE: 40\nSUCCESS: false\n- A: 4 - weak\nFEEDBACK: first line\nsecond line";
        let eval = parse_evaluation(text, &criteria(&["A"]));
        assert_eq!(eval.overall_feedback, "first line\nsecond line");
    }

    #[test]
    fn test_parse_reflection_sections() {
        let text = "INSIGHTS:\n- missed edge case\n- too verbose\n\n\
                    IMPROVEMENTS:\n- handle empty input\n  and null values\n\
                    ACTION_PLAN: Validate input first, then sort.\n\
                    LEARNING_POINTS:\n- check boundaries";
        let r = parse_reflection(text);
        assert_eq!(r.insights, vec!["missed edge case", "too verbose"]);
        assert_eq!(r.improvements, vec!["handle empty input and null values"]);
        assert_eq!(r.action_plan, "Validate input first, then sort.");
        assert_eq!(r.learning_points, vec!["check boundaries"]);
        assert!(!r.degraded);
    }

    #[test]
    fn test_parse_reflection_fallbacks() {
        let r = parse_reflection("INSIGHTS:\n- only this");
        assert_eq!(r.insights, vec!["only this"]);
        assert!(r.improvements.is_empty());
        assert!(r.learning_points.is_empty());
        assert_eq!(r.action_plan, DEFAULT_ACTION_PLAN);
        assert!(r.degraded);

        let empty = parse_reflection("");
        assert!(empty.insights.is_empty());
        assert_eq!(empty.action_plan, DEFAULT_ACTION_PLAN);
    }

    #[test]
    fn test_split_bullets_numbered() {
        let items = split_bullets(&["1. first", "2) second", "", "continued"]);
        assert_eq!(items, vec!["first", "second continued"]);
    }
}
