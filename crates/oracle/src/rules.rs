//! Deterministic rule-engine fallback for intent resolution.
//!
//! When the oracle is unreachable, unconfigured, or returns text no
//! extraction attempt can parse, resolution falls through to these
//! keyword heuristics. Categories are checked in a fixed priority order:
//! news > weather > stock > calculate > document. The keyword sets target
//! the Chinese-market inputs the service was built for.
//!
//! All scanning is plain character walking — no regex.

use lingxi_core::tool::{ParamMap, ToolKind};
use serde_json::json;

/// Cities the weather heuristic recognizes.
const CITIES: &[&str] = &[
    "北京", "上海", "广州", "深圳", "杭州", "南京", "成都", "武汉", "西安", "天津", "重庆",
    "苏州", "长沙", "郑州", "青岛", "大连", "济南", "福州", "厦门", "合肥", "石家庄", "哈尔滨",
    "长春", "沈阳",
];

/// Company names mapped to ticker codes. Longer names precede their
/// abbreviations so substring scans match the most specific entry.
const STOCK_NAMES: &[(&str, &str)] = &[
    ("贵州茅台", "600519"),
    ("茅台", "600519"),
    ("平安银行", "000001"),
    ("平安", "000001"),
    ("腾讯控股", "00700"),
    ("腾讯", "00700"),
    ("阿里巴巴", "09988"),
    ("阿里", "09988"),
    ("万科A", "000002"),
    ("万科", "000002"),
    ("招商银行", "600036"),
    ("五粮液", "000858"),
];

/// Ticker codes mapped back to display names.
const STOCK_CODE_NAMES: &[(&str, &str)] = &[
    ("600519", "贵州茅台"),
    ("000001", "平安银行"),
    ("00700", "腾讯控股"),
    ("09988", "阿里巴巴"),
    ("000002", "万科A"),
    ("600036", "招商银行"),
    ("000858", "五粮液"),
];

const NEWS_VERBS: &[&str] = &[
    "抓取", "检索", "搜索", "找", "看看", "查", "列出", "总结", "最近的",
];
const NEWS_NOUNS: &[&str] = &["新闻", "资讯", "news", "News", "NEWS", "条"];
const DOCUMENT_VERBS: &[&str] = &["生成", "写", "创建", "制作"];
const TODAY_WORDS: &[&str] = &["现在", "今天", "当前", "今日"];

/// Resolve an input with keyword heuristics.
///
/// Returns the winning tool and its extracted parameters, or `None` when
/// no category matches.
pub fn resolve(input: &str) -> Option<(ToolKind, ParamMap)> {
    let lower = input.to_lowercase();

    if lower.contains("新闻") || lower.contains("资讯") || lower.contains("news") {
        return Some((ToolKind::News, news_params(input, &lower)));
    }
    if lower.contains("天气") || lower.contains("气温") || lower.contains("weather") {
        return Some((ToolKind::Weather, weather_params(input)));
    }
    if lower.contains("股票") || lower.contains("stock") {
        return Some((ToolKind::Stock, stock_params(input)));
    }
    if lower.contains("计算")
        || lower.contains("算")
        || ['+', '-', '*', '/'].iter().any(|op| input.contains(*op))
    {
        return Some((ToolKind::Calculate, calculate_params(input)));
    }
    if lower.contains("生成") || lower.contains("写") || lower.contains("文档") {
        return Some((ToolKind::Document, document_params(input, &lower)));
    }

    None
}

/// Which task categories the input mentions, for multi-task detection.
/// Order of the returned list is fixed; duplicates never appear.
pub fn detect_categories(input: &str) -> Vec<ToolKind> {
    let lower = input.to_lowercase();
    let mut found = Vec::new();

    let weather = ["天气", "气温", "温度", "weather"];
    let calculate = [
        "计算", "算", "+", "-", "*", "/", "加", "减", "乘", "除",
    ];
    let news = ["新闻", "资讯", "news"];
    let stock = ["股票", "stock"];

    if weather.iter().any(|k| lower.contains(k)) {
        found.push(ToolKind::Weather);
    }
    if calculate.iter().any(|k| lower.contains(k)) {
        found.push(ToolKind::Calculate);
    }
    if news.iter().any(|k| lower.contains(k)) {
        found.push(ToolKind::News);
    }
    if stock.iter().any(|k| lower.contains(k)) {
        found.push(ToolKind::Stock);
    }

    found
}

/// Extract the first recognized city name, if any.
pub fn extract_city(input: &str) -> Option<&'static str> {
    CITIES.iter().find(|city| input.contains(*city)).copied()
}

/// Look up a ticker code for an exact company name.
pub fn stock_code_for_name(name: &str) -> Option<&'static str> {
    STOCK_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// A display name for a ticker code.
pub fn stock_name_for_code(code: &str) -> String {
    STOCK_CODE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("股票{code}"))
}

/// Find the longest run of arithmetic-expression characters that contains
/// at least one digit and one operator; whitespace is squeezed out.
pub fn find_arithmetic_expression(input: &str) -> Option<String> {
    let chars: Vec<char> = input.chars().collect();
    let is_expr_char =
        |c: char| c.is_ascii_digit() || "+-*/().".contains(c) || c.is_whitespace();

    let mut best: Option<String> = None;
    let mut i = 0;
    while i < chars.len() {
        if is_expr_char(chars[i]) {
            let start = i;
            while i < chars.len() && is_expr_char(chars[i]) {
                i += 1;
            }
            let run: String = chars[start..i]
                .iter()
                .filter(|c| !c.is_whitespace())
                .collect();
            let has_digit = run.chars().any(|c| c.is_ascii_digit());
            let has_operator = run.chars().any(|c| "+-*/".contains(c));
            if has_digit && has_operator {
                let longer = best.as_ref().map(|b| run.len() > b.len()).unwrap_or(true);
                if longer {
                    best = Some(run);
                }
            }
        } else {
            i += 1;
        }
    }
    best
}

fn news_params(input: &str, lower: &str) -> ParamMap {
    let mut query = strip_terms(input, NEWS_VERBS);
    query = strip_terms(&query, NEWS_NOUNS);
    let query = query.trim();

    let limit = number_before(input, &['条'])
        .map(|n| n.clamp(1, 50))
        .unwrap_or(10);

    // Too little left after cleanup: fall back to a domain keyword.
    let query = if query.chars().count() < 2 {
        if lower.contains("ai") || lower.contains("人工智能") {
            "AI"
        } else if lower.contains("科技") {
            "科技"
        } else if lower.contains("国内") {
            "国内"
        } else {
            "科技"
        }
    } else {
        query
    };

    let mut params = ParamMap::new();
    params.insert("query".into(), json!(query));
    params.insert("limit".into(), json!(limit));
    params
}

fn weather_params(input: &str) -> ParamMap {
    let location = extract_city(input).unwrap_or("北京");

    let days = if TODAY_WORDS.iter().any(|w| input.contains(w)) {
        1
    } else {
        number_before(input, &['天'])
            .map(|n| n.clamp(1, 7))
            .unwrap_or(7)
    };

    let mut params = ParamMap::new();
    params.insert("location".into(), json!(location));
    params.insert("days".into(), json!(days));
    params
}

fn stock_params(input: &str) -> ParamMap {
    let symbol = six_digit_code(input)
        .or_else(|| {
            STOCK_NAMES
                .iter()
                .find(|(name, _)| input.contains(name))
                .map(|(_, code)| code.to_string())
        })
        .unwrap_or_else(|| "000001".to_string());

    let days = number_before(input, &['天', '日'])
        .map(|n| n.clamp(1, 30))
        .unwrap_or(5);

    let mut params = ParamMap::new();
    params.insert("symbol".into(), json!(symbol));
    params.insert("days".into(), json!(days));
    params
}

fn calculate_params(input: &str) -> ParamMap {
    let expression = find_arithmetic_expression(input).unwrap_or_else(|| {
        strip_terms(input, &["计算", "算", "等于", "是多少"])
            .trim()
            .to_string()
    });

    let mut params = ParamMap::new();
    params.insert("expression".into(), json!(expression));
    params
}

fn document_params(input: &str, lower: &str) -> ParamMap {
    let template = if lower.contains("报告") {
        "report"
    } else if lower.contains("邮件") || lower.contains("email") {
        "email"
    } else if lower.contains("总结") || lower.contains("摘要") {
        "summary"
    } else {
        "report"
    };

    let content = strip_terms(input, DOCUMENT_VERBS).trim().to_string();

    let mut params = ParamMap::new();
    params.insert("template".into(), json!(template));
    params.insert("content".into(), json!(content));
    params
}

/// Remove every occurrence of the given terms.
fn strip_terms(input: &str, terms: &[&str]) -> String {
    let mut out = input.to_string();
    for term in terms {
        out = out.replace(term, "");
    }
    out
}

/// Find a digit run directly followed (modulo whitespace) by one of the
/// given unit characters, e.g. `5` in `"5条"` or `"3 天"`.
fn number_before(input: &str, units: &[char]) -> Option<u32> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && units.contains(&chars[j]) {
                let digits: String = chars[start..i].iter().collect();
                if let Ok(n) = digits.parse() {
                    return Some(n);
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Find a run of exactly six digits (an A-share ticker code).
fn six_digit_code(input: &str) -> Option<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 6 {
                return Some(chars[start..i].iter().collect());
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_tool(input: &str) -> Option<ToolKind> {
        resolve(input).map(|(tool, _)| tool)
    }

    #[test]
    fn weather_query_with_city() {
        let (tool, params) = resolve("查北京天气").unwrap();
        assert_eq!(tool, ToolKind::Weather);
        assert_eq!(params["location"], "北京");
        assert_eq!(params["days"], 7);
    }

    #[test]
    fn weather_today_is_one_day() {
        let (_, params) = resolve("今天上海天气怎么样").unwrap();
        assert_eq!(params["location"], "上海");
        assert_eq!(params["days"], 1);
    }

    #[test]
    fn weather_explicit_days_clamped() {
        let (_, params) = resolve("查深圳未来3天天气").unwrap();
        assert_eq!(params["days"], 3);
        let (_, params) = resolve("查深圳未来15天天气").unwrap();
        assert_eq!(params["days"], 7);
    }

    #[test]
    fn weather_without_city_defaults_to_beijing() {
        let (_, params) = resolve("明天天气如何").unwrap();
        assert_eq!(params["location"], "北京");
    }

    #[test]
    fn news_takes_priority_over_weather() {
        // "天气" also appears, but the news keyword wins.
        assert_eq!(resolve_tool("查天气相关的新闻"), Some(ToolKind::News));
    }

    #[test]
    fn news_query_and_limit() {
        let (tool, params) = resolve("抓取5条AI新闻").unwrap();
        assert_eq!(tool, ToolKind::News);
        assert_eq!(params["limit"], 5);
    }

    #[test]
    fn news_limit_clamped_to_fifty() {
        let (_, params) = resolve("查100条科技新闻").unwrap();
        assert_eq!(params["limit"], 50);
    }

    #[test]
    fn news_short_query_falls_back_to_domain_keyword() {
        let (_, params) = resolve("查新闻").unwrap();
        assert_eq!(params["query"], "科技");
        // Digits-only leftovers also fall back.
        let (_, params) = resolve("查3条新闻").unwrap();
        assert_eq!(params["query"], "科技");
    }

    #[test]
    fn news_substantive_query_is_kept() {
        let (_, params) = resolve("查人工智能新闻").unwrap();
        assert_eq!(params["query"], "人工智能");
    }

    #[test]
    fn stock_by_company_name() {
        let (tool, params) = resolve("查贵州茅台股票").unwrap();
        assert_eq!(tool, ToolKind::Stock);
        assert_eq!(params["symbol"], "600519");
        assert_eq!(params["days"], 5);
    }

    #[test]
    fn stock_by_six_digit_code() {
        let (_, params) = resolve("查600036股票走势").unwrap();
        assert_eq!(params["symbol"], "600036");
    }

    #[test]
    fn stock_days_clamped() {
        let (_, params) = resolve("查股票最近90天数据").unwrap();
        assert_eq!(params["days"], 30);
    }

    #[test]
    fn calculate_extracts_expression() {
        let (tool, params) = resolve("计算 2+3*4").unwrap();
        assert_eq!(tool, ToolKind::Calculate);
        assert_eq!(params["expression"], "2+3*4");
    }

    #[test]
    fn calculate_bare_expression() {
        let (tool, params) = resolve("(1 + 2) * 3").unwrap();
        assert_eq!(tool, ToolKind::Calculate);
        assert_eq!(params["expression"], "(1+2)*3");
    }

    #[test]
    fn document_template_detection() {
        let (tool, params) = resolve("写一份周报总结").unwrap();
        assert_eq!(tool, ToolKind::Document);
        assert_eq!(params["template"], "summary");

        let (_, params) = resolve("生成一份项目报告").unwrap();
        assert_eq!(params["template"], "report");

        let (_, params) = resolve("写一封感谢邮件").unwrap();
        assert_eq!(params["template"], "email");
    }

    #[test]
    fn unmatched_input_is_none() {
        assert!(resolve("你好").is_none());
        assert!(resolve("hello there").is_none());
    }

    #[test]
    fn every_category_resolves_to_a_plan() {
        // Whenever at least one keyword category matches, the rule engine
        // must produce a tool, never nothing.
        for input in [
            "查新闻",
            "查北京天气",
            "查股票",
            "计算 1+1",
            "写一份文档",
        ] {
            assert!(resolve(input).is_some(), "expected a tool for {input}");
        }
    }

    #[test]
    fn multi_task_detection() {
        let categories = detect_categories("查北京天气，再计算 2+3");
        assert!(categories.contains(&ToolKind::Weather));
        assert!(categories.contains(&ToolKind::Calculate));
        assert_eq!(detect_categories("你好").len(), 0);
    }

    #[test]
    fn arithmetic_expression_scanning() {
        assert_eq!(
            find_arithmetic_expression("先算 2 + 3 * 4 吧").as_deref(),
            Some("2+3*4")
        );
        assert_eq!(find_arithmetic_expression("没有数字").as_deref(), None);
        // An operator without digits is not an expression.
        assert_eq!(find_arithmetic_expression("a+b").as_deref(), None);
    }

    #[test]
    fn number_scanning_requires_the_unit() {
        assert_eq!(number_before("查5条新闻", &['条']), Some(5));
        assert_eq!(number_before("查 5 条新闻", &['条']), Some(5));
        assert_eq!(number_before("查600519股票", &['条']), None);
    }

    #[test]
    fn six_digit_code_requires_exact_length() {
        assert_eq!(six_digit_code("代码600519如何").as_deref(), Some("600519"));
        assert_eq!(six_digit_code("12345"), None);
        assert_eq!(six_digit_code("1234567"), None);
    }

    #[test]
    fn stock_name_lookups() {
        assert_eq!(stock_code_for_name("茅台"), Some("600519"));
        assert_eq!(stock_name_for_code("000001"), "平安银行");
        assert_eq!(stock_name_for_code("999999"), "股票999999");
    }
}
